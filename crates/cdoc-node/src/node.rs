//! Node assembly.
//!
//! [`Node::start`] wires one hosted account's storage, job dispatcher,
//! anchoring task, P2P handler and document service from a [`NodeConfig`]
//! and the shared boundaries in [`NodeDeps`].

use std::collections::HashSet;
use std::sync::Arc;

use cdoc_core::AccountId;
use cdoc_crypto::Ed25519KeyPair;
use cdoc_document::KeyRegistry;
use cdoc_schemes::SchemeRegistry;
use parking_lot::Mutex;

use crate::anchor::{AnchorRepository, AnchorTask};
use crate::cancel::CancellationToken;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::jobs::JobDispatcher;
use crate::p2p::{HandshakeValidator, P2pClient, P2pHandler};
use crate::repository::{DocumentRepository, KeyValueStore};
use crate::retry::RetryPolicy;
use crate::service::DocumentService;
use crate::webhook::WebhookSender;

/// Boundaries a node talks to.
pub struct NodeDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub registry: Arc<dyn KeyRegistry>,
    pub ledger: Arc<dyn AnchorRepository>,
    pub peers: Arc<dyn P2pClient>,
    pub webhooks: Arc<dyn WebhookSender>,
}

/// A running node for one account.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    service: Arc<DocumentService>,
    handler: Arc<P2pHandler>,
    jobs: Arc<JobDispatcher>,
    cancel: CancellationToken,
}

impl Node {
    /// Validate `config` and start the node. Must be called inside a Tokio
    /// runtime.
    pub fn start(
        config: NodeConfig,
        account: AccountId,
        keys: Ed25519KeyPair,
        deps: NodeDeps,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let keys = Arc::new(keys);
        let schemes = SchemeRegistry::with_defaults();
        let repo = Arc::new(DocumentRepository::new(deps.store, schemes.clone()));
        let cancel = CancellationToken::new();
        let jobs = JobDispatcher::start(&config.jobs, deps.webhooks, cancel.clone());
        let peer_retry = RetryPolicy::from(&config.p2p);

        let anchor = Arc::new(AnchorTask {
            account,
            keys: keys.clone(),
            registry: deps.registry.clone(),
            repo: repo.clone(),
            ledger: deps.ledger.clone(),
            peers: deps.peers.clone(),
            network: config.network.clone(),
            ledger_retry: RetryPolicy::from(&config.anchoring),
            peer_retry,
        });

        let handler = Arc::new(P2pHandler::new(
            account,
            keys,
            deps.registry.clone(),
            repo.clone(),
            deps.ledger,
            schemes.clone(),
            HandshakeValidator::new(&config.network)?,
        ));

        let service = Arc::new(DocumentService {
            account,
            registry: deps.registry,
            repo,
            jobs: jobs.clone(),
            anchor,
            peers: deps.peers,
            schemes,
            network: config.network.clone(),
            peer_retry,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        });

        tracing::info!(
            account = %account,
            network_id = config.network.network_id,
            protocol_version = %config.network.protocol_version,
            "node started"
        );
        Ok(Self {
            config,
            service,
            handler,
            jobs,
            cancel,
        })
    }

    /// The hosted account.
    pub fn account(&self) -> AccountId {
        self.service.account()
    }

    /// Configuration the node was started with.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The document service.
    pub fn service(&self) -> &Arc<DocumentService> {
        &self.service
    }

    /// The P2P handler, to be registered with a transport.
    pub fn handler(&self) -> Arc<P2pHandler> {
        self.handler.clone()
    }

    /// Stop background tasks. Running jobs are cancelled.
    pub fn shutdown(&self) {
        self.jobs.shutdown();
        self.cancel.cancel();
        tracing::info!(account = %self.account(), "node stopped");
    }
}
