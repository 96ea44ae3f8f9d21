//! # Document Capability Trait
//!
//! Scheme adapters hold a [`CoreDocument`] and implement [`Document`] by
//! supplying their scheme, their data tree and their payload. Everything
//! else (root computation, signing, proofs, packing, diffing) is provided
//! in terms of those hooks, so services handle every scheme through
//! `&dyn Document`.

use cdoc_core::{AccountId, DocumentId, Hash32, VersionId};
use cdoc_crypto::Ed25519KeyPair;
use serde::{Deserialize, Serialize};

use crate::engine::{CoreDocument, Status};
use crate::error::DocumentError;
use crate::proof::DocumentProof;
use crate::scheme::Scheme;
use crate::signature::DocumentSignature;
use crate::tree::{changed_fields, ChangedField, DocumentTree};

/// A scheme adapter over a core document.
pub trait Document: Send + Sync + std::fmt::Debug {
    /// Scheme of this document.
    fn scheme(&self) -> Scheme;

    /// The embedded core document.
    fn core(&self) -> &CoreDocument;

    /// Mutable access to the embedded core document.
    fn core_mut(&mut self) -> &mut CoreDocument;

    /// The scheme data tree of the current state.
    fn data_tree(&self) -> Result<DocumentTree, DocumentError>;

    /// Scheme payload as JSON.
    fn payload(&self) -> Result<serde_json::Value, DocumentError>;

    /// The single account allowed to update this document, if the scheme
    /// restricts updates to an owner.
    fn owner(&self) -> Option<AccountId> {
        None
    }

    /// Stable document identifier.
    fn id(&self) -> DocumentId {
        self.core().document_id()
    }

    /// Identifier of the current version.
    fn current_version(&self) -> VersionId {
        self.core().current_version()
    }

    /// Identifier of the previous version.
    fn previous_version(&self) -> Option<VersionId> {
        self.core().previous_version()
    }

    /// Author of the current version.
    fn author(&self) -> AccountId {
        self.core().author()
    }

    /// Lifecycle status.
    fn status(&self) -> Status {
        self.core().status()
    }

    /// Compute and cache the data root.
    fn calculate_data_root(&mut self) -> Result<Hash32, DocumentError> {
        let tree = self.data_tree()?;
        self.core_mut().calculate_data_root(&tree)
    }

    /// Compute and cache the data and signing roots.
    fn calculate_signing_root(&mut self) -> Result<Hash32, DocumentError> {
        self.calculate_data_root()?;
        self.core_mut().calculate_signing_root()
    }

    /// Compute and cache the document root. Needs the signing root and the
    /// author's signature.
    fn calculate_document_root(&mut self) -> Result<Hash32, DocumentError> {
        self.core_mut().calculate_document_root()
    }

    /// Sign the current signing root, computing it first.
    fn sign(&mut self, account: AccountId, keys: &Ed25519KeyPair) -> Result<DocumentSignature, DocumentError> {
        self.calculate_signing_root()?;
        self.core_mut().sign(account, keys)
    }

    /// Proofs of named fields against the document root.
    fn create_proofs(&self, fields: &[&str]) -> Result<DocumentProof, DocumentError> {
        let tree = self.data_tree()?;
        self.core().create_proofs(&tree, fields)
    }

    /// Serialisable form: the core document plus the scheme payload.
    fn pack_core(&self) -> Result<PackedDocument, DocumentError> {
        Ok(PackedDocument {
            scheme: self.scheme(),
            core: self.core().clone(),
            payload: self.payload()?,
        })
    }

    /// Changed scheme fields between this version and `updated`.
    fn payload_changes(&self, updated: &dyn Document) -> Result<Vec<ChangedField>, DocumentError> {
        Ok(changed_fields(&self.data_tree()?, &updated.data_tree()?))
    }

    /// Changed envelope fields between this version and `updated`.
    fn core_changes(&self, updated: &dyn Document) -> Result<Vec<ChangedField>, DocumentError> {
        Ok(changed_fields(
            &self.core().core_tree()?,
            &updated.core().core_tree()?,
        ))
    }
}

/// A document as stored and exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedDocument {
    /// Scheme of the payload.
    pub scheme: Scheme,
    /// Envelope.
    pub core: CoreDocument,
    /// Scheme payload.
    pub payload: serde_json::Value,
}

impl PackedDocument {
    /// Split into core and payload, checking the scheme.
    ///
    /// # Errors
    ///
    /// `InvalidDocumentType` if the packed or embedded scheme is not
    /// `expected`.
    pub fn unpack_core(self, expected: Scheme) -> Result<(CoreDocument, serde_json::Value), DocumentError> {
        for actual in [self.scheme, self.core.scheme()] {
            if actual != expected {
                return Err(DocumentError::InvalidDocumentType {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok((self.core, self.payload))
    }

    /// JSON bytes for storage and transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
