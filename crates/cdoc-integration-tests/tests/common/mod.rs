//! Shared harness: a handful of nodes on one in-process network, sharing a
//! ledger and a key registry.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cdoc_core::AccountId;
use cdoc_crypto::Ed25519KeyPair;
use cdoc_document::{Document, InMemoryKeyRegistry, KeyPurpose};
use cdoc_node::{
    CancellationToken, InMemoryLedger, InMemoryStore, LocalNetwork, MemoryWebhookSender, Node,
    NodeConfig, NodeDeps,
};
use cdoc_schemes::{Address, AnyDocument, EntityData};

pub struct Harness {
    pub registry: Arc<InMemoryKeyRegistry>,
    pub ledger: Arc<InMemoryLedger>,
    pub network: Arc<LocalNetwork>,
    pub hooks: Arc<MemoryWebhookSender>,
}

/// A started node plus a copy of its key for signing outside the node.
pub struct Participant {
    pub node: Node,
    pub keys: Ed25519KeyPair,
}

impl Participant {
    pub fn account(&self) -> AccountId {
        self.node.account()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(InMemoryKeyRegistry::new()),
            ledger: Arc::new(InMemoryLedger::new()),
            network: LocalNetwork::new(Duration::from_secs(2)),
            hooks: Arc::new(MemoryWebhookSender::new()),
        }
    }

    pub fn join(&self) -> Participant {
        let account = AccountId::random();
        let keys = Ed25519KeyPair::generate();
        self.registry
            .register(account, keys.public_key(), KeyPurpose::Signing);
        let mut config = NodeConfig::default();
        config.anchoring.initial_backoff_ms = 1;
        config.anchoring.max_backoff_ms = 5;
        let node = Node::start(
            config,
            account,
            Ed25519KeyPair::from_seed(&keys.seed()),
            NodeDeps {
                store: Arc::new(InMemoryStore::new()),
                registry: self.registry.clone(),
                ledger: self.ledger.clone(),
                peers: self.network.clone(),
                webhooks: self.hooks.clone(),
            },
        )
        .unwrap();
        self.network.register(node.handler());
        Participant { node, keys }
    }
}

/// Store `doc` as a new document on `owner`'s node and anchor it.
pub async fn create_and_commit(owner: &Participant, doc: AnyDocument) -> AnyDocument {
    let doc = owner.node.service().create(doc).unwrap();
    commit(owner, &doc).await;
    owner.node.service().get_latest(&doc.id()).unwrap()
}

/// Anchor the latest version of `doc` and wait for it.
pub async fn commit(owner: &Participant, doc: &AnyDocument) -> String {
    owner
        .node
        .service()
        .commit(&doc.id())
        .unwrap()
        .await_completion(&CancellationToken::new())
        .await
        .unwrap()
}

pub fn acme() -> EntityData {
    EntityData {
        identity: None,
        legal_name: "Acme Trading Ltd".into(),
        addresses: vec![Address {
            label: "head office".into(),
            country: "DE".into(),
            is_main: true,
            ..Default::default()
        }],
        payment_details: vec![],
        contacts: vec![],
    }
}
