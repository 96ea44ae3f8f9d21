//! # Node Errors
//!
//! One enum per service boundary plus [`NodeError`], which the document
//! service returns and which every boundary error converts into.
//!
//! Only the I/O-bound boundaries (anchoring, peer calls) have transient
//! failures; [`Transient`] marks which variants a retry may cure.

use cdoc_core::{AccountId, JobId};
use cdoc_document::DocumentError;
use thiserror::Error;

/// Errors from the key-value store and the document repository.
#[derive(Error, Debug)]
pub enum StoreError {
    /// `create` on a key that is already taken.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// `get`, `update` or `delete` on a missing key.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Stored bytes could not be turned back into a document.
    #[error("stored document is unreadable: {0}")]
    Document(#[from] DocumentError),
}

/// Errors from the job dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The dispatch queue is at capacity.
    #[error("job queue is full")]
    QueueFull,

    /// The dispatcher has shut down.
    #[error("job dispatcher is shut down")]
    Shutdown,

    /// Waiting was cancelled before the job finished.
    #[error("wait for {0} was cancelled")]
    Cancelled(JobId),

    /// No job with this id.
    #[error("{0} not found")]
    NotFound(JobId),

    /// The job belongs to another account.
    #[error("account {account} does not own {job}")]
    NotOwner {
        /// The job.
        job: JobId,
        /// The account that asked.
        account: AccountId,
    },

    /// The job ran and failed.
    #[error("job failed: {0}")]
    Failed(String),

    /// A completion webhook could not be delivered.
    #[error("webhook delivery failed: {0}")]
    Webhook(String),
}

/// Errors from the ledger boundary.
#[derive(Error, Debug)]
pub enum AnchorError {
    /// This anchor id is already on the ledger.
    #[error("anchor {0} is already committed")]
    AlreadyAnchored(String),

    /// The preimage does not hash to the anchor id.
    #[error("preimage does not match anchor {0}")]
    PreimageMismatch(String),

    /// No anchor with this id.
    #[error("anchor {0} not found")]
    NotFound(String),

    /// The anchored root differs from the document's root.
    #[error("anchored root mismatch for {0}")]
    RootMismatch(String),

    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Errors at the peer-to-peer boundary.
#[derive(Error, Debug)]
pub enum P2pError {
    /// The peers speak incompatible protocol versions.
    #[error("incompatible protocol version: local {local}, remote {remote}")]
    IncompatibleVersion {
        /// Our version.
        local: String,
        /// The peer's version.
        remote: String,
    },

    /// The peer is on another network.
    #[error("network mismatch: local {local}, remote {remote}")]
    NetworkMismatch {
        /// Our network id.
        local: u32,
        /// The peer's network id.
        remote: u32,
    },

    /// No route to the recipient.
    #[error("unknown peer {0}")]
    UnknownPeer(AccountId),

    /// The peer did not answer in time.
    #[error("request to {0} timed out")]
    Timeout(AccountId),

    /// An anchored document arrived without a pending version to supersede.
    #[error("no pending version {0} to supersede")]
    NoPendingVersion(String),

    /// The peer rejected the document.
    #[error("document rejected: {0}")]
    Document(#[from] DocumentError),

    /// The peer's store failed.
    #[error("peer storage error: {0}")]
    Store(#[from] StoreError),

    /// The peer could not confirm the anchor.
    #[error("peer anchor check failed: {0}")]
    Anchor(#[from] AnchorError),
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Path attempted.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The YAML is malformed.
    #[error("cannot parse config: {0}")]
    Parse(String),

    /// A value is out of range or malformed.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors returned by the document service.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Engine, validator or scheme failure.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Job dispatch failure.
    #[error(transparent)]
    Job(#[from] JobError),

    /// Ledger failure.
    #[error(transparent)]
    Anchor(#[from] AnchorError),

    /// Peer failure.
    #[error(transparent)]
    P2p(#[from] P2pError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A commit for this document is already running.
    #[error("a commit for document {0} is already in flight")]
    CommitInFlight(String),

    /// The document has the wrong scheme for the request.
    #[error("document {id} is not a {expected}")]
    WrongScheme {
        /// Document id.
        id: String,
        /// Scheme required.
        expected: &'static str,
    },
}

/// Failures a retry may cure.
pub trait Transient {
    /// True if the same call may succeed later.
    fn is_transient(&self) -> bool;
}

impl Transient for AnchorError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl Transient for P2pError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AnchorError::Unavailable("down".into()).is_transient());
        assert!(!AnchorError::AlreadyAnchored("0x01".into()).is_transient());
        assert!(P2pError::Timeout(AccountId::random()).is_transient());
        assert!(!P2pError::NetworkMismatch { local: 1, remote: 2 }.is_transient());
    }

    #[test]
    fn test_node_error_is_transparent() {
        let err = NodeError::from(StoreError::NotFound("doc".into()));
        assert_eq!(err.to_string(), "key not found: doc");
    }
}
