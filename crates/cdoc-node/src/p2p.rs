//! # Peer-to-Peer Exchange
//!
//! Three requests travel between nodes:
//!
//! | Request | Receiver does |
//! |---|---|
//! | `request_document_signature` | validate the pending version, store it, sign its signing root |
//! | `send_anchored_document` | verify roots, signatures and the ledger anchor, then store it |
//! | `get_document_with_token` | serve a document to the grantee of an access token |
//!
//! Every request carries a [`Header`]. The receiving [`P2pHandler`] refuses
//! peers on another network or another protocol major version before it
//! looks at the body.
//!
//! [`P2pClient`] is the sending side. [`LocalNetwork`] routes requests to
//! handlers in the same process and applies the per-request timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdoc_core::{AccessTokenId, AccountId, DocumentId};
use cdoc_crypto::Ed25519KeyPair;
use cdoc_document::{
    collaborator_can_update, verify_anchored, verify_signing_state, Document, DocumentError,
    DocumentSignature, KeyRegistry, PackedDocument, Scheme,
};
use cdoc_schemes::SchemeRegistry;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::anchor::{verify_anchor, AnchorRepository};
use crate::config::{NetworkConfig, ProtocolVersion};
use crate::error::{ConfigError, P2pError, StoreError};
use crate::repository::DocumentRepository;

/// Envelope of every peer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Sender's `MAJOR.MINOR.PATCH`.
    pub protocol_version: String,
    /// Sender's network.
    pub network_id: u32,
    pub sender: AccountId,
    pub recipient: AccountId,
}

impl Header {
    /// Header for a request from `sender` to `recipient` on `network`.
    pub fn new(network: &NetworkConfig, sender: AccountId, recipient: AccountId) -> Self {
        Self {
            protocol_version: network.protocol_version.clone(),
            network_id: network.network_id,
            sender,
            recipient,
        }
    }
}

/// Body of `get_document_with_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Relationship document holding the token, as stored by the granter.
    pub relationship_id: DocumentId,
    pub token_id: AccessTokenId,
    /// Document the token grants.
    pub document_id: DocumentId,
}

/// Network and protocol admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeValidator {
    network_id: u32,
    version: ProtocolVersion,
}

impl HandshakeValidator {
    /// Validator for the local network settings.
    pub fn new(network: &NetworkConfig) -> Result<Self, ConfigError> {
        let version =
            ProtocolVersion::parse(&network.protocol_version).ok_or_else(|| ConfigError::Invalid {
                field: "network.protocol_version",
                reason: format!("{:?} is not MAJOR.MINOR.PATCH", network.protocol_version),
            })?;
        Ok(Self {
            network_id: network.network_id,
            version,
        })
    }

    /// Admit `header` or say why not.
    ///
    /// # Errors
    ///
    /// - `NetworkMismatch` for another network id.
    /// - `IncompatibleVersion` for an unparsable version or another major.
    pub fn validate(&self, header: &Header) -> Result<(), P2pError> {
        if header.network_id != self.network_id {
            return Err(P2pError::NetworkMismatch {
                local: self.network_id,
                remote: header.network_id,
            });
        }
        match ProtocolVersion::parse(&header.protocol_version) {
            Some(remote) if remote.major == self.version.major => Ok(()),
            _ => Err(P2pError::IncompatibleVersion {
                local: self.version.to_string(),
                remote: header.protocol_version.clone(),
            }),
        }
    }
}

/// Sending side of the peer protocol.
#[async_trait]
pub trait P2pClient: Send + Sync {
    /// Ask the recipient to sign a pending version.
    async fn request_document_signature(
        &self,
        header: Header,
        document: PackedDocument,
    ) -> Result<DocumentSignature, P2pError>;

    /// Deliver an anchored version.
    async fn send_anchored_document(
        &self,
        header: Header,
        document: PackedDocument,
    ) -> Result<(), P2pError>;

    /// Fetch a document with an access token.
    async fn get_document_with_token(
        &self,
        header: Header,
        request: TokenRequest,
    ) -> Result<PackedDocument, P2pError>;
}

/// Receiving side of the peer protocol for one hosted account.
pub struct P2pHandler {
    account: AccountId,
    keys: Arc<Ed25519KeyPair>,
    registry: Arc<dyn KeyRegistry>,
    repo: Arc<DocumentRepository>,
    ledger: Arc<dyn AnchorRepository>,
    schemes: SchemeRegistry,
    handshake: HandshakeValidator,
}

impl std::fmt::Debug for P2pHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2pHandler")
            .field("account", &self.account)
            .field("handshake", &self.handshake)
            .finish_non_exhaustive()
    }
}

impl P2pHandler {
    /// Handler answering for `account`.
    pub fn new(
        account: AccountId,
        keys: Arc<Ed25519KeyPair>,
        registry: Arc<dyn KeyRegistry>,
        repo: Arc<DocumentRepository>,
        ledger: Arc<dyn AnchorRepository>,
        schemes: SchemeRegistry,
        handshake: HandshakeValidator,
    ) -> Self {
        Self {
            account,
            keys,
            registry,
            repo,
            ledger,
            schemes,
            handshake,
        }
    }

    /// The hosted account.
    pub fn account(&self) -> AccountId {
        self.account
    }

    fn admit(&self, header: &Header, method: &'static str) -> Result<(), P2pError> {
        metrics::counter!("cdoc_p2p_requests_total", "method" => method).increment(1);
        self.handshake.validate(header)?;
        if header.recipient != self.account {
            return Err(P2pError::UnknownPeer(header.recipient));
        }
        Ok(())
    }

    /// Validate a pending version from its author, keep it, and sign it.
    ///
    /// The local copy of the version named as `previous_version` is the
    /// baseline the author's changes are checked against, on every request
    /// including repeats for a version already held. A version already
    /// committed here is never signed again.
    pub async fn request_document_signature(
        &self,
        header: Header,
        document: PackedDocument,
    ) -> Result<DocumentSignature, P2pError> {
        self.admit(&header, "request_document_signature")?;
        let mut doc = self.schemes.unpack(document)?;
        if doc.author() != header.sender {
            return Err(DocumentError::AccessDenied(header.sender.to_string()).into());
        }
        if !doc.core().collaborators().can_read(&self.account) {
            return Err(DocumentError::AccessDenied(self.account.to_string()).into());
        }
        verify_signing_state(&mut doc, self.registry.as_ref())?;

        let version = doc.current_version();
        match self.repo.get(&self.account, &version) {
            Ok(held) => {
                held.core().ensure_pending("request_document_signature")?;
                if held.author() != doc.author() {
                    return Err(DocumentError::AccessDenied(header.sender.to_string()).into());
                }
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let latest = match self.repo.get_latest(&self.account, &doc.id()) {
            Ok(latest) => Some(latest.current_version()),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        match (doc.previous_version(), latest) {
            // First sight of this document, or a repeat of its first version.
            (_, None) => {}
            (None, Some(latest)) if latest == version => {}
            (Some(previous), Some(latest)) if latest == previous || latest == version => {
                match self.repo.get(&self.account, &previous) {
                    Ok(baseline) => collaborator_can_update(&baseline, &doc, &header.sender)?,
                    // Joined the chain at this version: nothing to diff against.
                    Err(StoreError::NotFound(_)) if latest == version => {}
                    Err(e) => return Err(e.into()),
                }
            }
            (previous, Some(latest)) => {
                return Err(DocumentError::InvalidIdentifier {
                    expected: latest.to_string(),
                    actual: previous.map(|v| v.to_string()).unwrap_or_default(),
                }
                .into());
            }
        }

        let signature = doc.core().create_signature(self.account, &self.keys)?;
        if self.repo.exists(&self.account, &doc.current_version()) {
            self.repo.update(&self.account, &doc)?;
        } else {
            self.repo.create(&self.account, &doc)?;
        }
        tracing::info!(
            account = %self.account,
            author = %header.sender,
            document_id = %doc.id(),
            version = %doc.current_version(),
            "signed pending version"
        );
        Ok(signature)
    }

    /// Accept an anchored version that supersedes a pending one.
    pub async fn send_anchored_document(
        &self,
        header: Header,
        document: PackedDocument,
    ) -> Result<(), P2pError> {
        self.admit(&header, "send_anchored_document")?;
        let mut doc = self.schemes.unpack(document)?;
        let version = doc.current_version();
        if !self.repo.exists(&self.account, &version) {
            return Err(P2pError::NoPendingVersion(version.to_string()));
        }
        let document_root = verify_anchored(&mut doc, self.registry.as_ref())?;
        verify_anchor(self.ledger.as_ref(), &version, &document_root).await?;
        self.repo.update(&self.account, &doc)?;
        tracing::info!(
            account = %self.account,
            document_id = %doc.id(),
            version = %version,
            "stored anchored version"
        );
        Ok(())
    }

    /// Serve a document to the grantee of a token held in one of our
    /// relationship documents.
    ///
    /// Only the version the token was issued for is served, and only while it
    /// is still the latest.
    pub async fn get_document_with_token(
        &self,
        header: Header,
        request: TokenRequest,
    ) -> Result<PackedDocument, P2pError> {
        self.admit(&header, "get_document_with_token")?;
        let relationship = self.repo.get_latest(&self.account, &request.relationship_id)?;
        if relationship.scheme() != Scheme::EntityRelationship {
            return Err(DocumentError::InvalidDocumentType {
                expected: Scheme::EntityRelationship.to_string(),
                actual: relationship.scheme().to_string(),
            }
            .into());
        }
        let token = relationship.core().grantee_can_read(
            &request.token_id,
            &request.document_id,
            &header.sender,
            self.registry.as_ref(),
        )?;
        let document = self.repo.get_latest(&self.account, &request.document_id)?;
        if token.document_version != document.current_version() {
            return Err(DocumentError::AccessDenied(header.sender.to_string()).into());
        }
        tracing::info!(
            account = %self.account,
            grantee = %header.sender,
            document_id = %request.document_id,
            "served document by access token"
        );
        Ok(document.pack_core()?)
    }
}

/// In-process transport between handlers.
#[derive(Debug)]
pub struct LocalNetwork {
    peers: RwLock<HashMap<AccountId, Arc<P2pHandler>>>,
    timeout: Duration,
}

impl LocalNetwork {
    /// Network with a per-request timeout.
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
            timeout,
        })
    }

    /// Make `handler` reachable under its account.
    pub fn register(&self, handler: Arc<P2pHandler>) {
        self.peers.write().insert(handler.account(), handler);
    }

    /// Drop the route to `account`.
    pub fn disconnect(&self, account: &AccountId) {
        self.peers.write().remove(account);
    }

    fn route(&self, recipient: &AccountId) -> Result<Arc<P2pHandler>, P2pError> {
        self.peers
            .read()
            .get(recipient)
            .cloned()
            .ok_or(P2pError::UnknownPeer(*recipient))
    }
}

#[async_trait]
impl P2pClient for LocalNetwork {
    async fn request_document_signature(
        &self,
        header: Header,
        document: PackedDocument,
    ) -> Result<DocumentSignature, P2pError> {
        let recipient = header.recipient;
        let handler = self.route(&recipient)?;
        tokio::time::timeout(self.timeout, handler.request_document_signature(header, document))
            .await
            .map_err(|_| P2pError::Timeout(recipient))?
    }

    async fn send_anchored_document(
        &self,
        header: Header,
        document: PackedDocument,
    ) -> Result<(), P2pError> {
        let recipient = header.recipient;
        let handler = self.route(&recipient)?;
        tokio::time::timeout(self.timeout, handler.send_anchored_document(header, document))
            .await
            .map_err(|_| P2pError::Timeout(recipient))?
    }

    async fn get_document_with_token(
        &self,
        header: Header,
        request: TokenRequest,
    ) -> Result<PackedDocument, P2pError> {
        let recipient = header.recipient;
        let handler = self.route(&recipient)?;
        tokio::time::timeout(self.timeout, handler.get_document_with_token(header, request))
            .await
            .map_err(|_| P2pError::Timeout(recipient))?
    }
}
