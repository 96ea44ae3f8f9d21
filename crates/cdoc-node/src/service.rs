//! # Document Service
//!
//! The per-account entry point hosts call:
//!
//! - `create` / `update` store pending versions. An update is checked
//!   against the latest stored version with the caller's transition rules.
//! - `commit` queues the anchoring job for the latest pending version and
//!   returns a [`JobResult`]. At most one commit per document is in flight.
//! - `get_*` and `create_proofs` read stored versions.
//! - `get_entity_by_relationship` fetches a shared entity from its granter
//!   using the token in a received relationship document.

use std::collections::HashSet;
use std::sync::Arc;

use cdoc_core::{AccountId, DocumentId, JobId, VersionId};
use cdoc_document::{
    collaborator_can_update, verify_anchored, Document, DocumentError, DocumentProof, KeyRegistry,
    Scheme, Status,
};
use cdoc_schemes::{AnyDocument, SchemeRegistry};
use parking_lot::Mutex;

use crate::anchor::AnchorTask;
use crate::config::NetworkConfig;
use crate::error::{JobError, NodeError};
use crate::jobs::{JobDispatcher, JobResult, JobStatus};
use crate::p2p::{Header, P2pClient, TokenRequest};
use crate::repository::DocumentRepository;
use crate::retry::{with_backoff, RetryPolicy};

/// Removes a document from the in-flight set when the commit job ends,
/// however it ends.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<DocumentId>>>,
    id: DocumentId,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<DocumentId>>>, id: DocumentId) -> Result<Self, NodeError> {
        if !set.lock().insert(id) {
            return Err(NodeError::CommitInFlight(id.to_string()));
        }
        Ok(Self {
            set: set.clone(),
            id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

/// Document operations for one hosted account.
pub struct DocumentService {
    pub(crate) account: AccountId,
    pub(crate) registry: Arc<dyn KeyRegistry>,
    pub(crate) repo: Arc<DocumentRepository>,
    pub(crate) jobs: Arc<JobDispatcher>,
    pub(crate) anchor: Arc<AnchorTask>,
    pub(crate) peers: Arc<dyn P2pClient>,
    pub(crate) schemes: SchemeRegistry,
    pub(crate) network: NetworkConfig,
    pub(crate) peer_retry: RetryPolicy,
    pub(crate) in_flight: Arc<Mutex<HashSet<DocumentId>>>,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("account", &self.account)
            .field("in_flight", &self.in_flight.lock().len())
            .finish_non_exhaustive()
    }
}

impl DocumentService {
    /// The hosted account.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Store the first version of a new document.
    ///
    /// # Errors
    ///
    /// - `InvalidStatus` unless the version is pending.
    /// - `AccessDenied` unless the account can write the document.
    /// - `KeyExists` if this version is already stored.
    pub fn create(&self, doc: AnyDocument) -> Result<AnyDocument, NodeError> {
        doc.core().ensure_pending("create")?;
        if !doc.core().collaborators().can_write(&self.account) {
            return Err(DocumentError::AccessDenied(self.account.to_string()).into());
        }
        self.repo.create(&self.account, &doc)?;
        metrics::counter!("cdoc_documents_created_total", "scheme" => doc.scheme().as_str())
            .increment(1);
        tracing::info!(
            account = %self.account,
            document_id = %doc.id(),
            scheme = %doc.scheme(),
            "document created"
        );
        Ok(doc)
    }

    /// Store a new version of an existing document.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` unless `doc` succeeds the latest stored version.
    /// - `UnauthorizedTransition` if the account's rules do not cover the
    ///   changes.
    pub fn update(&self, doc: AnyDocument) -> Result<AnyDocument, NodeError> {
        doc.core().ensure_pending("update")?;
        let old = self.repo.get_latest(&self.account, &doc.id())?;
        if doc.previous_version() != Some(old.current_version()) {
            return Err(DocumentError::InvalidIdentifier {
                expected: old.current_version().to_string(),
                actual: doc
                    .previous_version()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            }
            .into());
        }
        collaborator_can_update(&old, &doc, &self.account)?;
        self.repo.create(&self.account, &doc)?;
        tracing::info!(
            account = %self.account,
            document_id = %doc.id(),
            version = %doc.current_version(),
            "document updated"
        );
        Ok(doc)
    }

    /// Queue anchoring of the latest version of `document_id`.
    ///
    /// # Errors
    ///
    /// - `InvalidStatus` if the latest version is already committed.
    /// - `CommitInFlight` if a commit for this document is still running.
    /// - `QueueFull` when the dispatcher is at capacity.
    pub fn commit(&self, document_id: &DocumentId) -> Result<JobResult, NodeError> {
        let doc = self.repo.get_latest(&self.account, document_id)?;
        doc.core().ensure_pending("commit")?;
        let guard = InFlightGuard::acquire(&self.in_flight, *document_id)?;
        let anchor = self.anchor.clone();
        let job = self.jobs.dispatch(
            self.account,
            format!("anchor document {document_id}"),
            async move {
                let _guard = guard;
                anchor
                    .run(doc)
                    .await
                    .map(|root| root.to_string())
                    .map_err(|e| JobError::Failed(e.to_string()))
            },
        )?;
        Ok(job)
    }

    /// Status of a job this account dispatched.
    pub fn job_status(&self, job: &JobId) -> Result<JobStatus, NodeError> {
        Ok(self.jobs.status(&self.account, job)?)
    }

    /// Handle on a job this account dispatched.
    pub fn job(&self, job: &JobId) -> Result<JobResult, NodeError> {
        Ok(self.jobs.result(&self.account, job)?)
    }

    /// Newest stored version.
    pub fn get_latest(&self, document_id: &DocumentId) -> Result<AnyDocument, NodeError> {
        Ok(self.repo.get_latest(&self.account, document_id)?)
    }

    /// A specific stored version.
    pub fn get_version(&self, version: &VersionId) -> Result<AnyDocument, NodeError> {
        Ok(self.repo.get(&self.account, version)?)
    }

    /// Field proofs against the document root of the latest version.
    ///
    /// # Errors
    ///
    /// `MissingSignature` if the latest version has no author signature yet.
    pub fn create_proofs(
        &self,
        document_id: &DocumentId,
        fields: &[&str],
    ) -> Result<DocumentProof, NodeError> {
        let mut doc = self.repo.get_latest(&self.account, document_id)?;
        doc.calculate_signing_root()?;
        doc.calculate_document_root()?;
        Ok(doc.create_proofs(fields)?)
    }

    /// Fetch the entity shared through a relationship document this account
    /// received as grantee.
    pub async fn get_entity_by_relationship(
        &self,
        relationship_id: &DocumentId,
    ) -> Result<AnyDocument, NodeError> {
        let stored = self.repo.get_latest(&self.account, relationship_id)?;
        let relationship = stored.as_relationship().ok_or_else(|| NodeError::WrongScheme {
            id: relationship_id.to_string(),
            expected: Scheme::EntityRelationship.as_str(),
        })?;
        let token = relationship.shared_access_token()?;
        let request = TokenRequest {
            relationship_id: *relationship_id,
            token_id: token.identifier,
            document_id: token.document_identifier,
        };
        let header = Header::new(&self.network, self.account, token.granter);
        let peers = self.peers.clone();
        let packed = with_backoff(self.peer_retry, "token document fetch", || {
            let peers = peers.clone();
            let header = header.clone();
            let request = request.clone();
            async move { peers.get_document_with_token(header, request).await }
        })
        .await?;

        let mut entity = self.schemes.unpack(packed)?;
        if entity.scheme() != Scheme::Entity {
            return Err(NodeError::WrongScheme {
                id: entity.id().to_string(),
                expected: Scheme::Entity.as_str(),
            });
        }
        if entity.id() != request.document_id {
            return Err(DocumentError::InvalidIdentifier {
                expected: request.document_id.to_string(),
                actual: entity.id().to_string(),
            }
            .into());
        }
        if entity.status() == Status::Committed {
            verify_anchored(&mut entity, self.registry.as_ref())?;
        }
        tracing::info!(
            account = %self.account,
            granter = %header.recipient,
            document_id = %entity.id(),
            "fetched shared entity"
        );
        Ok(entity)
    }
}
