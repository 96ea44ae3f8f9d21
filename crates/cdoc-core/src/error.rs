//! # Error Types
//!
//! Base errors shared by every crate in the workspace. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Cryptographic errors fail loudly with full context.
//! - Identifier errors name the identifier kind and the expected width.

use thiserror::Error;

/// Top-level error type for `cdoc-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// An identifier failed to parse.
    #[error("identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    /// A timestamp failed to parse or was not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Error parsing a fixed-size identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Wrong number of bytes.
    #[error("{kind} must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Identifier type name.
        kind: &'static str,
        /// Required width.
        expected: usize,
        /// Width received.
        actual: usize,
    },

    /// The hex text was malformed.
    #[error("{kind} is not valid hex: {reason}")]
    InvalidHex {
        /// Identifier type name.
        kind: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A label-derived key was requested for an empty label.
    #[error("{kind} label must not be empty")]
    EmptyLabel {
        /// Identifier type name.
        kind: &'static str,
    },
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// A Merkle tree could not be built or walked.
    #[error("merkle error: {0}")]
    Merkle(String),
}
