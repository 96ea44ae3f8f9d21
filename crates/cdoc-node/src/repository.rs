//! # Document Storage
//!
//! [`KeyValueStore`] is the raw storage boundary. `create` is an atomic
//! test-and-set and `update` requires the key to exist, which is what keeps
//! at most one writer per key without the engine taking locks.
//!
//! [`DocumentRepository`] stores packed documents per hosting account:
//!
//! | Key | Value |
//! |---|---|
//! | `doc ‖ account ‖ version` | packed document bytes |
//! | `latest ‖ account ‖ document_id` | newest stored version id |

use std::collections::HashMap;
use std::sync::Arc;

use cdoc_core::{AccountId, DocumentId, VersionId};
use cdoc_document::Document;
use cdoc_schemes::{AnyDocument, SchemeRegistry};
use parking_lot::RwLock;

use crate::error::StoreError;

const DOC_PREFIX: &[u8] = b"doc";
const LATEST_PREFIX: &[u8] = b"latest";

/// Raw key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Insert `value` under a key that must not exist yet.
    fn create(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;

    /// Replace the value of a key that must exist.
    fn update(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;

    /// Value of a key.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Remove a key that must exist.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// True if the key is present.
    fn exists(&self, key: &[u8]) -> bool;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn show(key: &[u8]) -> String {
    hex::encode(key)
}

impl KeyValueStore for InMemoryStore {
    fn create(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(StoreError::KeyExists(show(key)));
        }
        entries.insert(key.to_vec(), value);
        Ok(())
    }

    fn update(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        let slot = entries
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(show(key)))?;
        *slot = value;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(show(key)))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.entries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(show(key)))
    }

    fn exists(&self, key: &[u8]) -> bool {
        self.entries.read().contains_key(key)
    }
}

fn document_key(account: &AccountId, version: &VersionId) -> Vec<u8> {
    [DOC_PREFIX, account.as_bytes(), version.as_bytes()].concat()
}

fn latest_key(account: &AccountId, document_id: &DocumentId) -> Vec<u8> {
    [LATEST_PREFIX, account.as_bytes(), document_id.as_bytes()].concat()
}

/// Typed document storage over a [`KeyValueStore`].
pub struct DocumentRepository {
    store: Arc<dyn KeyValueStore>,
    schemes: SchemeRegistry,
}

impl std::fmt::Debug for DocumentRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRepository")
            .field("schemes", &self.schemes)
            .finish_non_exhaustive()
    }
}

impl DocumentRepository {
    /// Repository over `store`, decoding with `schemes`.
    pub fn new(store: Arc<dyn KeyValueStore>, schemes: SchemeRegistry) -> Self {
        Self { store, schemes }
    }

    /// Store a version that is not stored yet and make it the latest.
    pub fn create(&self, account: &AccountId, doc: &dyn Document) -> Result<(), StoreError> {
        let bytes = doc.pack_core()?.to_bytes()?;
        self.store
            .create(&document_key(account, &doc.current_version()), bytes)?;
        self.set_latest(account, doc)?;
        tracing::debug!(
            account = %account,
            document_id = %doc.id(),
            version = %doc.current_version(),
            "document version stored"
        );
        Ok(())
    }

    /// Overwrite a stored version, e.g. after it was committed.
    pub fn update(&self, account: &AccountId, doc: &dyn Document) -> Result<(), StoreError> {
        let bytes = doc.pack_core()?.to_bytes()?;
        self.store
            .update(&document_key(account, &doc.current_version()), bytes)?;
        tracing::debug!(
            account = %account,
            document_id = %doc.id(),
            version = %doc.current_version(),
            status = %doc.status(),
            "document version updated"
        );
        Ok(())
    }

    /// A stored version.
    pub fn get(&self, account: &AccountId, version: &VersionId) -> Result<AnyDocument, StoreError> {
        let bytes = self.store.get(&document_key(account, version))?;
        Ok(self.schemes.decode(&bytes)?)
    }

    /// The newest stored version of a document.
    pub fn get_latest(
        &self,
        account: &AccountId,
        document_id: &DocumentId,
    ) -> Result<AnyDocument, StoreError> {
        let version = self.latest_version(account, document_id)?;
        self.get(account, &version)
    }

    /// Id of the newest stored version.
    pub fn latest_version(
        &self,
        account: &AccountId,
        document_id: &DocumentId,
    ) -> Result<VersionId, StoreError> {
        let raw = self.store.get(&latest_key(account, document_id))?;
        VersionId::from_slice(&raw).map_err(|e| StoreError::Document(e.into()))
    }

    /// True if this version is stored.
    pub fn exists(&self, account: &AccountId, version: &VersionId) -> bool {
        self.store.exists(&document_key(account, version))
    }

    fn set_latest(&self, account: &AccountId, doc: &dyn Document) -> Result<(), StoreError> {
        let key = latest_key(account, &doc.id());
        let value = doc.current_version().to_vec();
        if self.store.exists(&key) {
            self.store.update(&key, value)
        } else {
            self.store.create(&key, value)
        }
    }
}
