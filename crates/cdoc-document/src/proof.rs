//! # Proof Generator
//!
//! Selective disclosure of single fields against the document root. A proof
//! carries the literal value, its salt, the salted leaf hash and the sibling
//! hashes up to the document root, so a verifier who knows only the anchored
//! root can check one field without seeing any other.
//!
//! A field proof walks three levels:
//!
//! 1. from the leaf to the root of its own tree,
//! 2. for data and core fields, across the signing tree to the signing root,
//! 3. across the root tree to the document root.
//!
//! Proofs are produced for the current state only. If the document root has
//! not been calculated for that state there is nothing to prove against and
//! the whole request fails.

use cdoc_core::{AccountId, DocumentId, Hash32, NftTokenId, RegistryId, VersionId};
use cdoc_crypto::{fold_path, salted_leaf_hash, ProofStep};
use serde::{Deserialize, Serialize};

use crate::engine::CoreDocument;
use crate::error::DocumentError;
use crate::paths::{self, cd, CD_TREE, SIGNATURES_TREE};
use crate::tree::DocumentTree;

/// Proof of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProof {
    /// Readable path.
    pub property: String,
    /// Compact path.
    #[serde(with = "cdoc_core::serde_hex")]
    pub compact: Vec<u8>,
    /// Literal leaf value.
    #[serde(with = "cdoc_core::serde_hex")]
    pub value: Vec<u8>,
    /// Leaf salt.
    #[serde(with = "cdoc_core::serde_hex")]
    pub salt: Vec<u8>,
    /// Salted leaf hash.
    pub hash: Hash32,
    /// Sibling hashes from the leaf to the document root.
    pub path: Vec<ProofStep>,
}

/// A batch of field proofs and the roots they were produced against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProof {
    /// Document proven.
    pub document_id: DocumentId,
    /// Version proven.
    pub version: VersionId,
    /// Field proofs, in request order.
    pub fields: Vec<FieldProof>,
    /// Root of the scheme data tree.
    pub data_root: Hash32,
    /// Root signed by collaborators.
    pub signing_root: Hash32,
    /// Root of the signatures tree.
    pub signatures_root: Hash32,
    /// Anchored root.
    pub document_root: Hash32,
}

impl DocumentProof {
    /// Verify every field proof against the document root.
    pub fn verify(&self) -> Result<(), DocumentError> {
        self.fields
            .iter()
            .try_for_each(|f| verify_field_proof(f, &self.document_root))
    }
}

/// Recompute the leaf hash from value and salt, fold the sibling path and
/// compare with `document_root`.
///
/// # Errors
///
/// `ProofVerification` on any mismatch.
pub fn verify_field_proof(proof: &FieldProof, document_root: &Hash32) -> Result<(), DocumentError> {
    let salt: [u8; 32] = proof.salt.as_slice().try_into().map_err(|_| {
        DocumentError::ProofVerification(format!("{}: salt must be 32 bytes", proof.property))
    })?;
    let leaf = salted_leaf_hash(&proof.compact, &proof.value, &salt);
    if leaf != proof.hash {
        return Err(DocumentError::ProofVerification(format!(
            "{}: value does not hash to the proven leaf",
            proof.property
        )));
    }
    if fold_path(leaf, &proof.path) != *document_root {
        return Err(DocumentError::ProofVerification(format!(
            "{}: path does not lead to document root {document_root}",
            proof.property
        )));
    }
    Ok(())
}

struct ProofTrees<'a> {
    data: &'a DocumentTree,
    cd: DocumentTree,
    signatures: DocumentTree,
    signing: DocumentTree,
    dr: DocumentTree,
}

impl ProofTrees<'_> {
    fn prove(&self, field: &str) -> Result<FieldProof, DocumentError> {
        let tree_name = field.split(|c: char| c == '.' || c == '[').next().unwrap_or_default();
        let (leaf_tree, upper): (&DocumentTree, Vec<(&DocumentTree, String)>) =
            if tree_name == self.data.name() {
                (
                    self.data,
                    vec![
                        (&self.signing, hashed(paths::SIGNING_TREE, "data_root")),
                        (&self.dr, hashed(paths::DR_TREE, "signing_root")),
                    ],
                )
            } else if tree_name == CD_TREE {
                (
                    &self.cd,
                    vec![
                        (&self.signing, hashed(paths::SIGNING_TREE, "cd_root")),
                        (&self.dr, hashed(paths::DR_TREE, "signing_root")),
                    ],
                )
            } else if tree_name == SIGNATURES_TREE {
                (
                    &self.signatures,
                    vec![(&self.dr, hashed(paths::DR_TREE, "signatures_root"))],
                )
            } else {
                return Err(DocumentError::DocumentProof(format!(
                    "field {field} is not in a provable tree"
                )));
            };

        let (leaf, mut path) = leaf_tree.leaf_proof(field)?;
        let salt = leaf.salt.ok_or_else(|| {
            DocumentError::DocumentProof(format!("field {field} is a hashed leaf"))
        })?;
        for (tree, name) in upper {
            let (_, steps) = tree.leaf_proof(&name)?;
            path.extend(steps);
        }
        Ok(FieldProof {
            property: field.to_string(),
            compact: leaf.path.compact().to_vec(),
            value: leaf.value.clone(),
            salt: salt.to_vec(),
            hash: leaf.hash,
            path,
        })
    }
}

fn hashed(tree: &str, leaf: &str) -> String {
    format!("{tree}.{leaf}")
}

impl CoreDocument {
    fn proof_trees<'a>(&self, data_tree: &'a DocumentTree) -> Result<ProofTrees<'a>, DocumentError> {
        let document_root = self.document_root().map_err(|_| {
            DocumentError::DocumentProof("document root has not been calculated".into())
        })?;
        let data_root = self.data_root()?;
        if data_tree.root_hash() != data_root {
            return Err(DocumentError::DocumentProof(
                "data tree does not match the calculated data root".into(),
            ));
        }
        let cd = self.core_tree()?;
        let signatures = self.signatures_tree()?;
        let signing = self.signing_tree(data_root, cd.root_hash())?;
        let dr = self.dr_tree(signing.root_hash(), signatures.root_hash())?;
        if dr.root_hash() != document_root {
            return Err(DocumentError::DocumentProof(
                "document state does not match the calculated document root".into(),
            ));
        }
        Ok(ProofTrees {
            data: data_tree,
            cd,
            signatures,
            signing,
            dr,
        })
    }

    /// Proofs for `fields` against the document root.
    ///
    /// # Errors
    ///
    /// `DocumentProof` if the document root has not been calculated for the
    /// current state or any field does not exist. No partial batches.
    pub fn create_proofs(
        &self,
        data_tree: &DocumentTree,
        fields: &[&str],
    ) -> Result<DocumentProof, DocumentError> {
        let trees = self.proof_trees(data_tree)?;
        let proofs = fields
            .iter()
            .map(|f| trees.prove(f))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentProof {
            document_id: self.document_id(),
            version: self.current_version(),
            fields: proofs,
            data_root: trees.data.root_hash(),
            signing_root: trees.signing.root_hash(),
            signatures_root: trees.signatures.root_hash(),
            document_root: trees.dr.root_hash(),
        })
    }

    /// Proofs backing an NFT mint.
    ///
    /// `nft_unique` proves the token bound under `registry`; since the
    /// registry is the map key, this also proves no second token of that
    /// registry is bound. `read_access` proves `account` is a collaborator.
    pub fn create_nft_proofs(
        &self,
        data_tree: &DocumentTree,
        account: &AccountId,
        registry: &RegistryId,
        token_id: &NftTokenId,
        nft_unique: bool,
        read_access: bool,
    ) -> Result<DocumentProof, DocumentError> {
        let mut fields = Vec::new();
        if nft_unique {
            if !self.is_nft_minted(registry, token_id) {
                return Err(DocumentError::NftNotFound(format!("{registry}/{token_id}")));
            }
            let path = paths::nft_prefix(registry.as_bytes()).field(paths::nft::TOKEN_ID, "token_id");
            fields.push(path.readable().to_string());
        }
        if read_access {
            fields.push(self.collaborator_field(account)?);
        }
        if fields.is_empty() {
            return Err(DocumentError::DocumentProof("no nft proofs requested".into()));
        }
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        self.create_proofs(data_tree, &refs)
    }

    fn collaborator_field(&self, account: &AccountId) -> Result<String, DocumentError> {
        let root = paths::cd_root();
        let collaborators = self.collaborators();
        if let Some(i) = collaborators.read_only().position(|a| a == account) {
            return Ok(root
                .field(cd::READ_COLLABORATORS, "read_collaborators")
                .index(i)
                .readable()
                .to_string());
        }
        if let Some(i) = collaborators.read_write().position(|a| a == account) {
            return Ok(root
                .field(cd::READ_WRITE_COLLABORATORS, "read_write_collaborators")
                .index(i)
                .readable()
                .to_string());
        }
        Err(DocumentError::AccessDenied(account.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, AttributeValue};
    use crate::collaborators::CollaboratorsAccess;
    use crate::scheme::Scheme;
    use cdoc_core::AttrKey;
    use cdoc_crypto::Ed25519KeyPair;
    use proptest::prelude::*;

    fn anchored(name: &str) -> (CoreDocument, DocumentTree, AccountId) {
        let author = AccountId::random();
        let mut core = CoreDocument::new(
            Scheme::Generic,
            None,
            author,
            &CollaboratorsAccess::read([AccountId::random()]),
            vec![Attribute::new("ref", AttributeValue::String("a".into())).unwrap()],
        )
        .unwrap();
        let mut b = core.data_tree_builder();
        let root = b.root().clone();
        b.add(root.field(1, "name"), name);
        b.add(root.field(2, "city"), "Lagos");
        let tree = b.build().unwrap();
        core.calculate_data_root(&tree).unwrap();
        core.calculate_signing_root().unwrap();
        core.sign(author, &Ed25519KeyPair::generate()).unwrap();
        core.calculate_document_root().unwrap();
        (core, tree, author)
    }

    #[test]
    fn test_proofs_from_every_tree_verify() {
        let (core, tree, _) = anchored("Acme");
        let attr = paths::attribute_prefix(AttrKey::from_label("ref").unwrap().as_bytes())
            .field(paths::attribute::VALUE, "value");
        let proof = core
            .create_proofs(
                &tree,
                &[
                    "generic.name",
                    "cd_tree.document_identifier",
                    attr.readable(),
                    "signatures_tree.signatures[0].signer_id",
                ],
            )
            .unwrap();
        assert_eq!(proof.fields.len(), 4);
        assert_eq!(proof.document_root, core.document_root().unwrap());
        proof.verify().unwrap();
        assert_eq!(proof.fields[0].value, b"Acme".to_vec());
    }

    #[test]
    fn test_unknown_field_fails_whole_batch() {
        let (core, tree, _) = anchored("Acme");
        assert!(matches!(
            core.create_proofs(&tree, &["generic.name", "generic.nope"]),
            Err(DocumentError::DocumentProof(_))
        ));
        assert!(matches!(
            core.create_proofs(&tree, &["signing_tree.data_root"]),
            Err(DocumentError::DocumentProof(_))
        ));
    }

    #[test]
    fn test_proof_before_document_root_fails() {
        let (mut core, tree, _) = anchored("Acme");
        core.invalidate_roots();
        assert!(matches!(
            core.create_proofs(&tree, &["generic.name"]),
            Err(DocumentError::DocumentProof(_))
        ));
    }

    #[test]
    fn test_stale_proof_fails_after_mutation() {
        let (core, tree, _) = anchored("Acme");
        let mut proof = core.create_proofs(&tree, &["generic.name"]).unwrap();
        proof.fields[0].value = b"Acme Ltd".to_vec();
        assert!(matches!(proof.verify(), Err(DocumentError::ProofVerification(_))));

        let (other, other_tree, _) = anchored("Other");
        let fresh = other.create_proofs(&other_tree, &["generic.name"]).unwrap();
        assert!(verify_field_proof(&fresh.fields[0], &core.document_root().unwrap()).is_err());
    }

    #[test]
    fn test_nft_proofs() {
        let (mut core, _, author) = anchored("Acme");
        let registry = RegistryId::random();
        let token = NftTokenId::random();
        core.add_nft(true, registry, token).unwrap();
        let mut b = core.data_tree_builder();
        let root = b.root().clone();
        b.add(root.field(1, "name"), "Acme");
        let tree = b.build().unwrap();
        core.calculate_data_root(&tree).unwrap();
        core.calculate_signing_root().unwrap();
        core.sign(author, &Ed25519KeyPair::generate()).unwrap();
        core.calculate_document_root().unwrap();

        let proof = core
            .create_nft_proofs(&tree, &author, &registry, &token, true, true)
            .unwrap();
        assert_eq!(proof.fields.len(), 2);
        assert_eq!(proof.fields[0].value, token.to_vec());
        proof.verify().unwrap();

        assert!(matches!(
            core.create_nft_proofs(&tree, &author, &registry, &NftTokenId::random(), true, false),
            Err(DocumentError::NftNotFound(_))
        ));
        assert!(matches!(
            core.create_nft_proofs(&tree, &AccountId::random(), &registry, &token, false, true),
            Err(DocumentError::AccessDenied(_))
        ));
    }

    proptest! {
        #[test]
        fn every_data_field_round_trips(values in prop::collection::vec("[a-z]{0,12}", 1..12)) {
            let author = AccountId::from_bytes([7; 32]);
            let mut core = CoreDocument::new(
                Scheme::Generic, None, author, &CollaboratorsAccess::default(), vec![],
            ).unwrap();
            let mut b = core.data_tree_builder();
            let root = b.root().clone();
            b.add_list(&root.field(1, "values"), &values, |b, p, v| b.add(p, v));
            let tree = b.build().unwrap();
            core.calculate_data_root(&tree).unwrap();
            core.calculate_signing_root().unwrap();
            core.sign(author, &Ed25519KeyPair::from_seed(&[1; 32])).unwrap();
            let document_root = core.calculate_document_root().unwrap();
            for leaf in tree.leaves() {
                let proof = core.create_proofs(&tree, &[leaf.path.readable()]).unwrap();
                prop_assert!(verify_field_proof(&proof.fields[0], &document_root).is_ok());
            }
        }
    }
}
