//! # Key Registry Boundary
//!
//! Signatures prove possession of a key; the registry says whose key it is.
//! On a live network the answer comes from the identity contracts on the
//! ledger. [`InMemoryKeyRegistry`] is the node-local view used by tests and
//! single-process deployments.

use std::collections::HashMap;

use cdoc_core::AccountId;
use cdoc_crypto::Ed25519PublicKey;
use parking_lot::RwLock;

use crate::error::DocumentError;

/// What a key is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Signing document roots, tokens and attributes.
    Signing,
}

/// Resolves whether a public key belongs to an account.
pub trait KeyRegistry: Send + Sync {
    /// `Ok(())` iff `key` is registered to `account` for `purpose`.
    fn validate_key(
        &self,
        account: &AccountId,
        key: &Ed25519PublicKey,
        purpose: KeyPurpose,
    ) -> Result<(), DocumentError>;
}

/// Process-local key registry.
#[derive(Debug, Default)]
pub struct InMemoryKeyRegistry {
    keys: RwLock<HashMap<AccountId, Vec<(Ed25519PublicKey, KeyPurpose)>>>,
}

impl InMemoryKeyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` for `account`.
    pub fn register(&self, account: AccountId, key: Ed25519PublicKey, purpose: KeyPurpose) {
        let mut keys = self.keys.write();
        let entry = keys.entry(account).or_default();
        if !entry.contains(&(key, purpose)) {
            entry.push((key, purpose));
        }
    }

    /// Revoke `key` for `account`.
    pub fn revoke(&self, account: &AccountId, key: &Ed25519PublicKey) {
        if let Some(entry) = self.keys.write().get_mut(account) {
            entry.retain(|(k, _)| k != key);
        }
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    fn validate_key(
        &self,
        account: &AccountId,
        key: &Ed25519PublicKey,
        purpose: KeyPurpose,
    ) -> Result<(), DocumentError> {
        let keys = self.keys.read();
        let known = keys
            .get(account)
            .is_some_and(|entry| entry.contains(&(*key, purpose)));
        if known {
            Ok(())
        } else {
            Err(DocumentError::SignatureInvalid(format!(
                "key {key} is not registered to {account}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdoc_crypto::Ed25519KeyPair;

    #[test]
    fn test_register_validate_revoke() {
        let registry = InMemoryKeyRegistry::new();
        let account = AccountId::random();
        let key = Ed25519KeyPair::generate().public_key();
        assert!(registry.validate_key(&account, &key, KeyPurpose::Signing).is_err());
        registry.register(account, key, KeyPurpose::Signing);
        registry.validate_key(&account, &key, KeyPurpose::Signing).unwrap();
        assert!(registry
            .validate_key(&AccountId::random(), &key, KeyPurpose::Signing)
            .is_err());
        registry.revoke(&account, &key);
        assert!(registry.validate_key(&account, &key, KeyPurpose::Signing).is_err());
    }
}
