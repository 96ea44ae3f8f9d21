//! # Digests: SHA-256 over bytes and canonical structures
//!
//! Merkle roots, leaf hashes and version anchors are all [`Hash32`].
//!
//! ## Security Invariant
//!
//! Structured data is hashed only through [`sha256_digest()`], which accepts
//! `&CanonicalBytes`. Raw byte hashing ([`sha256()`], [`sha256_concat()`]) is
//! reserved for values that already have a fixed binary encoding: leaf
//! payloads, tree nodes, preimages.

use sha2::{Digest, Sha256};

use crate::bytes::fixed_bytes;
use crate::canonical::CanonicalBytes;

fixed_bytes!(
    /// A 32-byte SHA-256 output: Merkle roots, leaf hashes, fingerprints.
    Hash32,
    32
);

impl Hash32 {
    /// The all-zero hash, used only as a placeholder in fixtures.
    pub const ZERO: Hash32 = Hash32([0u8; 32]);
}

/// SHA-256 of a byte string.
pub fn sha256(data: &[u8]) -> Hash32 {
    let out = Sha256::digest(data);
    Hash32(out.into())
}

/// SHA-256 over the concatenation of `parts`, without an intermediate buffer.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash32(hasher.finalize().into())
}

/// SHA-256 of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> Hash32 {
    sha256(data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty_input() {
        assert_eq!(
            sha256(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_concat_matches_single_buffer() {
        let joined = sha256(b"leftright");
        let parts = sha256_concat(&[b"left", b"right"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn test_digest_of_canonical_bytes() {
        let a = CanonicalBytes::new(&serde_json::json!({"b": 1, "a": 2})).unwrap();
        let b = CanonicalBytes::new(&serde_json::json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(sha256_digest(&a), sha256_digest(&b));
    }
}
