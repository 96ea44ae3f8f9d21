//! # Entity Relationship Scheme
//!
//! An owner shares one of their entity documents with a target account. The
//! relationship document carries a single access token, signed by the owner,
//! that lets the target fetch the entity version current at creation time
//! without becoming a collaborator of the entity.
//!
//! Only the owner may update a relationship, in every version. Revoking
//! deletes the target's token in a new version.

use cdoc_core::{AccountId, DocumentId, RoleKey};
use cdoc_crypto::Ed25519KeyPair;
use cdoc_document::{
    issue_token, AccessToken, CollaboratorsAccess, CoreDocument, Document, DocumentError,
    DocumentTree, KeyRegistry, PackedDocument, Scheme, TokenGrant,
};
use serde::{Deserialize, Serialize};

/// Relationship payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipData {
    /// Account sharing the entity.
    pub owner_identity: AccountId,
    /// Account the entity is shared with.
    pub target_identity: AccountId,
    /// The shared entity document.
    pub entity_identifier: DocumentId,
}

/// An entity relationship document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRelationship {
    core: CoreDocument,
    data: RelationshipData,
}

impl EntityRelationship {
    /// Share `entity` with `target`.
    ///
    /// # Errors
    ///
    /// - `InvalidDocumentType` if `entity` is not an entity document.
    /// - `AccessDenied` if `owner` cannot read `entity`.
    /// - `SignatureInvalid` if `signer` is not registered to `owner`.
    pub fn create(
        owner: AccountId,
        signer: &Ed25519KeyPair,
        entity: &dyn Document,
        target: AccountId,
        keys: &dyn KeyRegistry,
    ) -> Result<Self, DocumentError> {
        if entity.scheme() != Scheme::Entity {
            return Err(DocumentError::InvalidDocumentType {
                expected: Scheme::Entity.to_string(),
                actual: entity.scheme().to_string(),
            });
        }
        if !entity.core().collaborators().can_read(&owner) {
            return Err(DocumentError::AccessDenied(owner.to_string()));
        }

        let mut core = CoreDocument::new(
            Scheme::EntityRelationship,
            None,
            owner,
            &CollaboratorsAccess::read([target]),
            vec![],
        )?;
        let role = RoleKey::random();
        core.add_role(role, vec![target])?;
        let token = issue_token(
            TokenGrant {
                granter: owner,
                grantee: target,
                role_identifier: role,
                document_identifier: entity.id(),
                document_version: entity.current_version(),
            },
            signer,
        );
        core.add_access_token(token, keys)?;

        tracing::debug!(
            relationship = %core.document_id(),
            entity = %entity.id(),
            target = %target,
            "entity shared"
        );
        Ok(Self {
            core,
            data: RelationshipData {
                owner_identity: owner,
                target_identity: target,
                entity_identifier: entity.id(),
            },
        })
    }

    /// A new version without the target's access token.
    ///
    /// # Errors
    ///
    /// `NotOwner` unless `author` owns the relationship; `InvalidStatus`
    /// unless this version is committed.
    pub fn revoke(&self, author: AccountId) -> Result<Self, DocumentError> {
        if author != self.data.owner_identity {
            return Err(DocumentError::NotOwner(author.to_string()));
        }
        let mut core = self
            .core
            .prepare_new_version(author, &CollaboratorsAccess::default(), vec![])?;
        core.delete_access_token(&self.data.target_identity)?;
        Ok(Self {
            core,
            data: self.data.clone(),
        })
    }

    /// The single token this relationship carries.
    ///
    /// # Errors
    ///
    /// `NoToken` unless exactly one token is present; `InvalidIdentifier` if
    /// it does not target the shared entity.
    pub fn shared_access_token(&self) -> Result<&AccessToken, DocumentError> {
        let token = match self.core.access_tokens() {
            [token] => token,
            tokens => return Err(DocumentError::NoToken(tokens.len())),
        };
        if token.document_identifier != self.data.entity_identifier {
            return Err(DocumentError::InvalidIdentifier {
                expected: self.data.entity_identifier.to_string(),
                actual: token.document_identifier.to_string(),
            });
        }
        Ok(token)
    }

    /// Rebuild from the stored form.
    pub fn from_packed(packed: PackedDocument) -> Result<Self, DocumentError> {
        let (core, payload) = packed.unpack_core(Scheme::EntityRelationship)?;
        let data = serde_json::from_value(payload)
            .map_err(|e| DocumentError::InvalidPayload(format!("entity_relationship: {e}")))?;
        Ok(Self { core, data })
    }

    /// Relationship payload.
    pub fn data(&self) -> &RelationshipData {
        &self.data
    }
}

impl Document for EntityRelationship {
    fn scheme(&self) -> Scheme {
        Scheme::EntityRelationship
    }

    fn core(&self) -> &CoreDocument {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CoreDocument {
        &mut self.core
    }

    fn data_tree(&self) -> Result<DocumentTree, DocumentError> {
        let mut b = self.core.data_tree_builder();
        let root = b.root().clone();
        b.add(root.field(1, "owner_identity"), &self.data.owner_identity);
        b.add(root.field(2, "target_identity"), &self.data.target_identity);
        b.add(root.field(3, "entity_identifier"), &self.data.entity_identifier);
        b.build()
    }

    fn payload(&self) -> Result<serde_json::Value, DocumentError> {
        Ok(serde_json::to_value(&self.data)?)
    }

    fn owner(&self) -> Option<AccountId> {
        Some(self.data.owner_identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityData};
    use cdoc_document::{collaborator_can_update, InMemoryKeyRegistry, KeyPurpose, Status};

    struct Fixture {
        owner: AccountId,
        owner_keys: Ed25519KeyPair,
        target: AccountId,
        registry: InMemoryKeyRegistry,
        entity: Entity,
    }

    fn fixture() -> Fixture {
        let owner = AccountId::random();
        let owner_keys = Ed25519KeyPair::generate();
        let registry = InMemoryKeyRegistry::new();
        registry.register(owner, owner_keys.public_key(), KeyPurpose::Signing);
        let entity = Entity::create(
            owner,
            EntityData {
                legal_name: "Acme".into(),
                ..Default::default()
            },
            &CollaboratorsAccess::default(),
            vec![],
        )
        .unwrap();
        Fixture {
            owner,
            owner_keys,
            target: AccountId::random(),
            registry,
            entity,
        }
    }

    fn commit(doc: &mut dyn Document, author: AccountId, keys: &Ed25519KeyPair) {
        doc.sign(author, keys).unwrap();
        doc.calculate_document_root().unwrap();
        doc.core_mut().set_status(Status::Committed).unwrap();
    }

    #[test]
    fn test_create_issues_one_token() {
        let f = fixture();
        let rel = EntityRelationship::create(f.owner, &f.owner_keys, &f.entity, f.target, &f.registry)
            .unwrap();
        let token = rel.shared_access_token().unwrap();
        assert_eq!(token.grantee, f.target);
        assert_eq!(token.document_identifier, f.entity.id());
        assert_eq!(token.document_version, f.entity.current_version());
        assert!(rel.core().collaborators().can_read(&f.target));
        assert!(!rel.core().collaborators().can_write(&f.target));
        rel.core()
            .grantee_can_read(&token.identifier, &f.entity.id(), &f.target, &f.registry)
            .unwrap();
    }

    #[test]
    fn test_create_requires_entity_reader() {
        let f = fixture();
        let stranger = AccountId::random();
        let keys = Ed25519KeyPair::generate();
        f.registry.register(stranger, keys.public_key(), KeyPurpose::Signing);
        assert!(matches!(
            EntityRelationship::create(stranger, &keys, &f.entity, f.target, &f.registry),
            Err(DocumentError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_unregistered_signer_rejected() {
        let f = fixture();
        let other = Ed25519KeyPair::generate();
        assert!(matches!(
            EntityRelationship::create(f.owner, &other, &f.entity, f.target, &f.registry),
            Err(DocumentError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_revoke_drops_token() {
        let f = fixture();
        let mut rel =
            EntityRelationship::create(f.owner, &f.owner_keys, &f.entity, f.target, &f.registry)
                .unwrap();
        commit(&mut rel, f.owner, &f.owner_keys);

        assert!(matches!(rel.revoke(f.target), Err(DocumentError::NotOwner(_))));
        let revoked = rel.revoke(f.owner).unwrap();
        assert!(matches!(
            revoked.shared_access_token(),
            Err(DocumentError::NoToken(0))
        ));
        collaborator_can_update(&rel, &revoked, &f.owner).unwrap();
        assert!(matches!(
            collaborator_can_update(&rel, &revoked, &f.target),
            Err(DocumentError::NotOwner(_))
        ));
    }

    #[test]
    fn test_pack_roundtrip() {
        let f = fixture();
        let rel = EntityRelationship::create(f.owner, &f.owner_keys, &f.entity, f.target, &f.registry)
            .unwrap();
        let packed = PackedDocument::from_bytes(&rel.pack_core().unwrap().to_bytes().unwrap()).unwrap();
        let back = EntityRelationship::from_packed(packed).unwrap();
        assert_eq!(back.data(), rel.data());
        assert_eq!(back.owner(), Some(f.owner));
    }
}
