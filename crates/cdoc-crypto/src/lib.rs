//! # cdoc-crypto: Cryptographic Primitives
//!
//! - **Ed25519** signing and verification of signing roots, access-token
//!   messages and signed attributes.
//! - **Merkle tree** with domain-separated SHA-256 and sibling paths, the
//!   shape every document tree (data, core, signing, signatures, root) uses.
//! - **Salted leaf codec**: per-leaf salts derived from a per-version seed,
//!   and the salted leaf hash that keeps siblings from revealing each other.
//!
//! ## Crate Policy
//!
//! - Depends only on `cdoc-core` internally.
//! - No mocking of cryptographic operations in tests: all tests use real
//!   SHA-256 and real Ed25519.

pub mod ed25519;
pub mod leaf;
pub mod merkle;

pub use ed25519::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use leaf::{derive_salt, salted_leaf_hash};
pub use merkle::{fold_path, verify_path, MerkleTree, ProofStep, Side};
