//! # Salted Leaf Codec
//!
//! A document field becomes a Merkle leaf as
//! `SHA256(0x00 || len(compact) || compact || len(value) || value || salt)`
//! with big-endian `u32` lengths. The compact path binds the value to its
//! position in the document; the length prefixes make the concatenation
//! unambiguous.
//!
//! ## Salts
//!
//! Each leaf gets its own 32-byte salt, so revealing one leaf (with its salt)
//! in a proof says nothing about the values of its siblings, whose hashes are
//! indistinguishable from random. Salts are derived as
//! `SHA256(0x02 || seed || compact)` from the per-version [`SaltSeed`]: the
//! salt set is a pure function of the seed, and roots are a pure function of
//! document state.

use cdoc_core::{sha256_concat, Hash32, SaltSeed};

/// Domain byte for salted leaves.
pub const LEAF_DOMAIN: u8 = 0x00;

/// Domain byte for salt derivation.
pub const SALT_DOMAIN: u8 = 0x02;

/// Salt for the leaf at `compact` under `seed`.
pub fn derive_salt(seed: &SaltSeed, compact: &[u8]) -> [u8; 32] {
    sha256_concat(&[&[SALT_DOMAIN], seed.as_bytes(), compact]).0
}

/// Hash of a salted leaf.
pub fn salted_leaf_hash(compact: &[u8], value: &[u8], salt: &[u8; 32]) -> Hash32 {
    let compact_len = (compact.len() as u32).to_be_bytes();
    let value_len = (value.len() as u32).to_be_bytes();
    sha256_concat(&[&[LEAF_DOMAIN], &compact_len, compact, &value_len, value, salt])
}
