//! # Document Errors
//!
//! One error enum for the engine, the validators and the scheme adapters.
//! Every variant belongs to exactly one [`ErrorKind`], so callers can decide
//! between "fix the input", "run the missing step", "ask someone else" and
//! "create instead of update" without matching on strings.
//!
//! Engine operations never retry and never partially apply: a returned error
//! means document state is exactly as it was before the call.

use cdoc_core::{CanonicalizationError, CryptoError, IdentifierError};
use thiserror::Error;

/// Coarse classification of a [`DocumentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed payload, type mismatch, unknown field.
    Validation,
    /// Operation not allowed in the current status or root state.
    State,
    /// Collaborator or transition-rule check failed.
    Authorization,
    /// Signature, proof or token binding failure.
    Cryptographic,
    /// A referenced role, rule, attribute, token or NFT does not exist.
    NotFound,
}

/// Errors raised by the document engine and scheme adapters.
#[derive(Error, Debug)]
pub enum DocumentError {
    // ── Validation ──────────────────────────────────────────────────────
    /// Attribute declared type and payload disagree, or the attribute is malformed.
    #[error("invalid attribute {label:?}: {reason}")]
    InvalidAttribute {
        /// Attribute label.
        label: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Leaf assembly failed.
    #[error("data tree error: {0}")]
    DataTree(String),

    /// Scheme payload could not be decoded or fails scheme validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The scheme of an update differs from the scheme of the document.
    #[error("invalid document type: expected {expected}, got {actual}")]
    InvalidDocumentType {
        /// Scheme of the existing document.
        expected: String,
        /// Scheme offered.
        actual: String,
    },

    /// A role or collaborator list was empty where members are required.
    #[error("collaborators list must not be empty")]
    EmptyCollaborators,

    /// A malformed identifier was supplied.
    #[error("identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    /// Canonical serialization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    // ── State ───────────────────────────────────────────────────────────
    /// The document status does not allow the operation.
    #[error("document is {status}; {operation} is not allowed")]
    InvalidStatus {
        /// Current status.
        status: String,
        /// Attempted operation.
        operation: &'static str,
    },

    /// A status change would move backward.
    #[error("status cannot move from {from} to {to}")]
    StatusRegression {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A root was requested before the roots it depends on.
    #[error("{0} has not been calculated")]
    RootNotCalculated(&'static str),

    /// The document root needs the author's signature.
    #[error("missing signature: {0}")]
    MissingSignature(String),

    /// The role key is already in use.
    #[error("role {0} already exists")]
    RoleExists(String),

    /// The NFT pair is already attached.
    #[error("nft {token_id} of registry {registry} is already attached")]
    NftAlreadyAttached {
        /// Registry address.
        registry: String,
        /// Token id.
        token_id: String,
    },

    // ── Authorization ───────────────────────────────────────────────────
    /// The collaborator changed fields no rule lets them change.
    #[error("collaborator {collaborator} is not allowed to change: {}", .fields.join(", "))]
    UnauthorizedTransition {
        /// The mutating account.
        collaborator: String,
        /// Readable paths of every uncovered change.
        fields: Vec<String>,
    },

    /// Only the owner may update this document.
    #[error("account {0} is not the owner of the document")]
    NotOwner(String),

    /// The account has no read access to the document.
    #[error("account {0} cannot read the document")]
    AccessDenied(String),

    // ── Cryptographic ───────────────────────────────────────────────────
    /// A signature did not verify or its key does not belong to the signer.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// A token is bound to another document.
    #[error("invalid identifier: expected {expected}, got {actual}")]
    InvalidIdentifier {
        /// Identifier required.
        expected: String,
        /// Identifier found.
        actual: String,
    },

    /// A proof could not be produced.
    #[error("document proof error: {0}")]
    DocumentProof(String),

    /// A proof does not lead to the expected root.
    #[error("proof verification failed: {0}")]
    ProofVerification(String),

    /// Low level cryptographic failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    // ── Not found ───────────────────────────────────────────────────────
    /// No role with this key.
    #[error("role {0} not found")]
    RoleNotFound(String),

    /// No transition rule with this key.
    #[error("transition rule {0} not found")]
    TransitionRuleNotFound(String),

    /// No attribute with this key.
    #[error("attribute {0} not found")]
    AttributeNotFound(String),

    /// No access token with this identifier or grantee.
    #[error("access token {0} not found")]
    AccessTokenNotFound(String),

    /// No NFT with this registry and token.
    #[error("nft {0} not found")]
    NftNotFound(String),

    /// A sharing document must carry exactly one access token.
    #[error("expected exactly one access token, found {0}")]
    NoToken(usize),
}

impl DocumentError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        use DocumentError::*;
        match self {
            InvalidAttribute { .. }
            | DataTree(_)
            | InvalidPayload(_)
            | InvalidDocumentType { .. }
            | EmptyCollaborators
            | Identifier(_)
            | Canonicalization(_)
            | Serialization(_) => ErrorKind::Validation,
            InvalidStatus { .. }
            | StatusRegression { .. }
            | RootNotCalculated(_)
            | MissingSignature(_)
            | RoleExists(_)
            | NftAlreadyAttached { .. }
            | NoToken(_) => ErrorKind::State,
            UnauthorizedTransition { .. } | NotOwner(_) | AccessDenied(_) => {
                ErrorKind::Authorization
            }
            SignatureInvalid(_)
            | InvalidIdentifier { .. }
            | DocumentProof(_)
            | ProofVerification(_)
            | Crypto(_) => ErrorKind::Cryptographic,
            RoleNotFound(_)
            | TransitionRuleNotFound(_)
            | AttributeNotFound(_)
            | AccessTokenNotFound(_)
            | NftNotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(DocumentError::DataTree("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            DocumentError::RootNotCalculated("data root").kind(),
            ErrorKind::State
        );
        assert_eq!(
            DocumentError::UnauthorizedTransition {
                collaborator: "0x01".into(),
                fields: vec!["entity.legal_name".into()],
            }
            .kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            DocumentError::SignatureInvalid("bad".into()).kind(),
            ErrorKind::Cryptographic
        );
        assert_eq!(DocumentError::RoleNotFound("r".into()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unauthorized_lists_fields() {
        let err = DocumentError::UnauthorizedTransition {
            collaborator: "0xabc".into(),
            fields: vec!["entity.legal_name".into(), "entity.addresses[0].label".into()],
        };
        assert_eq!(
            err.to_string(),
            "collaborator 0xabc is not allowed to change: entity.legal_name, entity.addresses[0].label"
        );
    }
}
