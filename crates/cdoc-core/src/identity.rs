//! # Identifier Newtypes
//!
//! Byte identifiers for documents, versions, accounts and the tables a core
//! document carries. These prevent accidental identifier confusion: you
//! cannot pass a `RoleKey` where an `AccountId` is expected.
//!
//! ## Security Invariant
//!
//! Every identifier has a fixed width that is checked on every parse path
//! (`from_slice`, `from_hex`, serde). A truncated or padded identifier never
//! reaches a Merkle leaf.
//!
//! ## Versions and preimages
//!
//! A version identifier is the SHA-256 of a random [`Preimage`]. A document
//! version carries its own preimage and the preimage of its successor, so the
//! anchor id of the next version is committed to before it exists.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bytes::fixed_bytes;
use crate::digest::sha256;
use crate::error::IdentifierError;

fixed_bytes!(
    /// Stable identifier of a logical document, shared by all its versions.
    DocumentId,
    32
);

fixed_bytes!(
    /// Identifier of one document version. Also the anchor id on the ledger.
    VersionId,
    32
);

fixed_bytes!(
    /// Secret whose SHA-256 is a [`VersionId`].
    Preimage,
    32
);

fixed_bytes!(
    /// A participant identity (the on-ledger identity address, left-aligned).
    AccountId,
    32
);

fixed_bytes!(
    /// Key of a role in the role table of a core document.
    RoleKey,
    32
);

fixed_bytes!(
    /// Key of a transition rule.
    RuleKey,
    32
);

fixed_bytes!(
    /// Key of an attribute, the SHA-256 of its label.
    AttrKey,
    32
);

fixed_bytes!(
    /// Random identifier of an issued access token.
    AccessTokenId,
    32
);

fixed_bytes!(
    /// Token id of an NFT minted against a document.
    NftTokenId,
    32
);

fixed_bytes!(
    /// Address of an NFT registry contract.
    RegistryId,
    20
);

fixed_bytes!(
    /// Per-version seed from which every leaf salt is derived.
    SaltSeed,
    32
);

impl Preimage {
    /// The version identifier this preimage commits to.
    pub fn version_id(&self) -> VersionId {
        VersionId(sha256(&self.0).0)
    }
}

impl VersionId {
    /// True iff `preimage` hashes to this version.
    pub fn matches_preimage(&self, preimage: &Preimage) -> bool {
        preimage.version_id() == *self
    }
}

impl DocumentId {
    /// The first version of a document uses its version id as document id.
    pub fn from_version(version: VersionId) -> Self {
        Self(version.0)
    }
}

impl AttrKey {
    /// Derive the attribute key for a human readable label.
    pub fn from_label(label: &str) -> Result<Self, IdentifierError> {
        if label.trim().is_empty() {
            return Err(IdentifierError::EmptyLabel { kind: "AttrKey" });
        }
        Ok(Self(sha256(label.as_bytes()).0))
    }
}

impl RoleKey {
    /// Accept a 32-byte hex key verbatim, otherwise hash the label.
    pub fn from_label(label: &str) -> Result<Self, IdentifierError> {
        if label.trim().is_empty() {
            return Err(IdentifierError::EmptyLabel { kind: "RoleKey" });
        }
        if let Ok(key) = Self::from_hex(label) {
            return Ok(key);
        }
        Ok(Self(sha256(label.as_bytes()).0))
    }
}

impl RegistryId {
    /// Registry addresses are stored left-aligned in 32-byte map keys.
    pub fn to_padded(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..20].copy_from_slice(&self.0);
        out
    }
}

/// Identifier of an asynchronous job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random job identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_is_prefixed_hex() {
        let id = AccountId::from_bytes([0xab; 32]);
        let shown = id.to_string();
        assert!(shown.starts_with("0x"));
        assert_eq!(shown.len(), 2 + 64);
    }

    #[test]
    fn test_from_hex_accepts_prefix_and_bare() {
        let id = DocumentId::random();
        let with = DocumentId::from_hex(&id.to_string()).unwrap();
        let bare = DocumentId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(with, id);
        assert_eq!(bare, id);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = RegistryId::from_slice(&[0u8; 32]).unwrap_err();
        assert!(matches!(
            err,
            IdentifierError::InvalidLength { expected: 20, actual: 32, .. }
        ));
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(RoleKey::from_hex("0xzz").is_err());
        assert!(RoleKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let key = RoleKey::from_bytes([1; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(32)));
        let back: RoleKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_serde_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(RoleKey::from_bytes([2; 32]), vec![AccountId::from_bytes([3; 32])]);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::BTreeMap<RoleKey, Vec<AccountId>> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_preimage_commits_to_version() {
        let preimage = Preimage::random();
        let version = preimage.version_id();
        assert!(version.matches_preimage(&preimage));
        assert!(!version.matches_preimage(&Preimage::random()));
    }

    #[test]
    fn test_attr_key_is_label_hash() {
        let a = AttrKey::from_label("invoice_amount").unwrap();
        let b = AttrKey::from_label("invoice_amount").unwrap();
        let c = AttrKey::from_label("invoice_total").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(AttrKey::from_label("  ").is_err());
    }

    #[test]
    fn test_role_key_accepts_hex_verbatim() {
        let raw = RoleKey::from_bytes([9; 32]);
        assert_eq!(RoleKey::from_label(&raw.to_string()).unwrap(), raw);
        let hashed = RoleKey::from_label("approvers").unwrap();
        assert_ne!(hashed, raw);
    }

    #[test]
    fn test_registry_padding() {
        let reg = RegistryId::from_bytes([7; 20]);
        let padded = reg.to_padded();
        assert_eq!(&padded[..20], &[7; 20]);
        assert_eq!(&padded[20..], &[0; 12]);
    }

    #[test]
    fn test_job_id_display() {
        let id = JobId::new();
        assert!(id.to_string().starts_with("job:"));
    }

    proptest! {
        #[test]
        fn hex_roundtrip(bytes in proptest::array::uniform32(any::<u8>())) {
            let id = AccountId::from_bytes(bytes);
            prop_assert_eq!(AccountId::from_hex(&id.to_string()).unwrap(), id);
        }
    }
}
