//! # Ledger Anchoring
//!
//! A version is anchored by revealing its preimage: the ledger stores the
//! document root under `anchor_id = SHA-256(preimage)`, which is the
//! version id, together with the pre-committed id of the next version.
//!
//! ## Architecture
//!
//! [`AnchorRepository`] is the ledger boundary. [`InMemoryLedger`] is the
//! process-local ledger used by tests and single-host networks.
//! [`AnchorTask`] drives one pending version to `Committed`:
//!
//! 1. sign the signing root as author,
//! 2. collect a signature from every other collaborator over P2P,
//! 3. verify them and compute the document root,
//! 4. commit the anchor, retrying transient ledger failures; an anchor id
//!    already holding this version's root counts as committed, so a run
//!    that failed after the ledger write can be repeated,
//! 5. mark the version committed, persist it, and forward it to the
//!    collaborators.
//!
//! ## Security Invariant
//!
//! `commit_anchor` only succeeds for a preimage that hashes to the anchor id,
//! and an anchor id is never overwritten.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cdoc_core::{AccountId, Hash32, Preimage, Timestamp, VersionId};
use cdoc_crypto::Ed25519KeyPair;
use cdoc_document::{verify_signing_state, Document, KeyRegistry, Status};
use cdoc_schemes::AnyDocument;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;
use crate::error::{AnchorError, NodeError};
use crate::p2p::{Header, P2pClient};
use crate::repository::DocumentRepository;
use crate::retry::{with_backoff, RetryPolicy};

/// What is submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCommitment {
    /// Revealed preimage of the anchored version.
    pub preimage: Preimage,
    /// Root being anchored.
    pub document_root: Hash32,
    /// Pre-committed id of the next version.
    pub next_anchor_id: VersionId,
    /// Fingerprint of the transition rules in force.
    pub rules_fingerprint: Hash32,
}

/// What the ledger holds for an anchor id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub anchor_id: VersionId,
    pub document_root: Hash32,
    pub next_anchor_id: VersionId,
    pub rules_fingerprint: Hash32,
    pub block_number: u64,
    pub anchored_at: Timestamp,
}

/// The ledger boundary.
#[async_trait]
pub trait AnchorRepository: Send + Sync {
    /// Anchor a version.
    ///
    /// # Errors
    ///
    /// - `PreimageMismatch` if the preimage does not hash to the anchor id.
    /// - `AlreadyAnchored` if the anchor id is taken.
    /// - `Unavailable` for transient ledger failures.
    async fn commit_anchor(&self, commitment: AnchorCommitment) -> Result<AnchorRecord, AnchorError>;

    /// Look up an anchor.
    async fn get_anchor(&self, anchor_id: &VersionId) -> Result<AnchorRecord, AnchorError>;
}

/// Process-local ledger.
#[derive(Debug)]
pub struct InMemoryLedger {
    anchors: RwLock<HashMap<VersionId, AnchorRecord>>,
    next_block: AtomicU64,
    outages: AtomicU32,
    lost_acks: AtomicU32,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self {
            anchors: RwLock::new(HashMap::new()),
            next_block: AtomicU64::new(1),
            outages: AtomicU32::new(0),
            lost_acks: AtomicU32::new(0),
        }
    }
}

impl InMemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.outages.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` commits succeed but report `Unavailable`, as if
    /// the response was lost.
    pub fn lose_next_ack(&self, n: u32) {
        self.lost_acks.store(n, Ordering::SeqCst);
    }

    /// Number of anchors held.
    pub fn len(&self) -> usize {
        self.anchors.read().len()
    }

    /// True if nothing is anchored.
    pub fn is_empty(&self) -> bool {
        self.anchors.read().is_empty()
    }
}

#[async_trait]
impl AnchorRepository for InMemoryLedger {
    async fn commit_anchor(&self, commitment: AnchorCommitment) -> Result<AnchorRecord, AnchorError> {
        let outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(AnchorError::Unavailable("simulated ledger outage".into()));
        }

        let anchor_id = commitment.preimage.version_id();
        let mut anchors = self.anchors.write();
        if anchors.contains_key(&anchor_id) {
            return Err(AnchorError::AlreadyAnchored(anchor_id.to_string()));
        }
        let record = AnchorRecord {
            anchor_id,
            document_root: commitment.document_root,
            next_anchor_id: commitment.next_anchor_id,
            rules_fingerprint: commitment.rules_fingerprint,
            block_number: self.next_block.fetch_add(1, Ordering::SeqCst),
            anchored_at: Timestamp::now(),
        };
        anchors.insert(anchor_id, record.clone());
        let lost = self
            .lost_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(AnchorError::Unavailable("ledger response lost".into()));
        }
        Ok(record)
    }

    async fn get_anchor(&self, anchor_id: &VersionId) -> Result<AnchorRecord, AnchorError> {
        self.anchors
            .read()
            .get(anchor_id)
            .cloned()
            .ok_or_else(|| AnchorError::NotFound(anchor_id.to_string()))
    }
}

/// Check that the ledger holds `document_root` for `version`.
pub async fn verify_anchor(
    ledger: &dyn AnchorRepository,
    version: &VersionId,
    document_root: &Hash32,
) -> Result<AnchorRecord, AnchorError> {
    let record = ledger.get_anchor(version).await?;
    if record.document_root != *document_root {
        return Err(AnchorError::RootMismatch(version.to_string()));
    }
    Ok(record)
}

/// Everything the anchoring job needs from its node.
pub struct AnchorTask {
    pub(crate) account: AccountId,
    pub(crate) keys: Arc<Ed25519KeyPair>,
    pub(crate) registry: Arc<dyn KeyRegistry>,
    pub(crate) repo: Arc<DocumentRepository>,
    pub(crate) ledger: Arc<dyn AnchorRepository>,
    pub(crate) peers: Arc<dyn P2pClient>,
    pub(crate) network: NetworkConfig,
    pub(crate) ledger_retry: RetryPolicy,
    pub(crate) peer_retry: RetryPolicy,
}

impl std::fmt::Debug for AnchorTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorTask")
            .field("account", &self.account)
            .field("ledger_retry", &self.ledger_retry)
            .field("peer_retry", &self.peer_retry)
            .finish_non_exhaustive()
    }
}

impl AnchorTask {
    /// Drive `doc` from pending to committed. Returns the document root.
    pub async fn run(&self, mut doc: AnyDocument) -> Result<Hash32, NodeError> {
        doc.core().ensure_pending("commit")?;
        let document_id = doc.id();
        doc.sign(self.account, &self.keys)?;

        let peers: Vec<AccountId> = doc
            .core()
            .collaborators()
            .all()
            .copied()
            .filter(|a| *a != self.account)
            .collect();

        let packed = doc.pack_core()?;
        let mut signatures = Vec::with_capacity(peers.len());
        for peer in &peers {
            let header = Header::new(&self.network, self.account, *peer);
            let client = self.peers.clone();
            let signature = with_backoff(self.peer_retry, "signature request", || {
                let client = client.clone();
                let header = header.clone();
                let packed = packed.clone();
                async move { client.request_document_signature(header, packed).await }
            })
            .await?;
            signatures.push(signature);
        }
        doc.core_mut().append_signatures(signatures)?;
        verify_signing_state(&mut doc, self.registry.as_ref())?;

        let document_root = doc.calculate_document_root()?;
        let commitment = AnchorCommitment {
            preimage: doc.core().current_preimage(),
            document_root,
            next_anchor_id: doc.core().next_version(),
            rules_fingerprint: doc.core().transition_rules_fingerprint()?,
        };
        let version = doc.current_version();
        let ledger = self.ledger.clone();
        let committed = with_backoff(self.ledger_retry, "anchor commit", || {
            metrics::counter!("cdoc_anchor_attempts_total").increment(1);
            let ledger = ledger.clone();
            let commitment = commitment.clone();
            async move { ledger.commit_anchor(commitment).await }
        })
        .await;
        let record = match committed {
            Ok(record) => record,
            Err(AnchorError::AlreadyAnchored(_)) => {
                let record = verify_anchor(self.ledger.as_ref(), &version, &document_root).await?;
                tracing::info!(version = %version, "version already anchored with this root");
                record
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            document_id = %document_id,
            version = %record.anchor_id,
            block = record.block_number,
            root = %document_root,
            "document anchored"
        );

        doc.core_mut().set_status(Status::Committed)?;
        self.repo.update(&self.account, &doc)?;

        let anchored = doc.pack_core()?;
        for peer in &peers {
            let header = Header::new(&self.network, self.account, *peer);
            let client = self.peers.clone();
            let sent = with_backoff(self.peer_retry, "anchored document delivery", || {
                let client = client.clone();
                let header = header.clone();
                let anchored = anchored.clone();
                async move { client.send_anchored_document(header, anchored).await }
            })
            .await;
            if let Err(e) = sent {
                tracing::warn!(document_id = %document_id, peer = %peer, error = %e, "anchored document not delivered");
            }
        }
        Ok(document_root)
    }
}
