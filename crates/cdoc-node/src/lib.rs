//! # cdoc-node: Node Services
//!
//! Everything around the document model that does I/O or runs in the
//! background:
//!
//! - **Storage** ([`repository`]): versioned document storage per hosted
//!   account over a test-and-set key-value store.
//! - **Jobs** ([`jobs`], [`webhook`]): bounded asynchronous job dispatch with
//!   owner-scoped status and completion webhooks.
//! - **Anchoring** ([`anchor`]): the ledger boundary and the task that signs,
//!   collects signatures, anchors and distributes a version.
//! - **P2P** ([`p2p`]): handshake, the three peer requests, and an
//!   in-process transport.
//! - **Service** ([`service`]): the per-account document API.
//! - **Ambient** ([`config`], [`telemetry`], [`retry`], [`cancel`],
//!   [`error`]).
//!
//! [`Node`] wires all of it for one account.
//!
//! ## Metrics
//!
//! | Counter | Labels |
//! |---|---|
//! | `cdoc_documents_created_total` | `scheme` |
//! | `cdoc_jobs_dispatched_total` | |
//! | `cdoc_jobs_completed_total` | `status` |
//! | `cdoc_anchor_attempts_total` | |
//! | `cdoc_p2p_requests_total` | `method` |
//!
//! Counters go through the `metrics` facade; installing a recorder is up to
//! the host.

pub mod anchor;
pub mod cancel;
pub mod config;
pub mod error;
pub mod jobs;
pub mod node;
pub mod p2p;
pub mod repository;
pub mod retry;
pub mod service;
pub mod telemetry;
pub mod webhook;

pub use anchor::{AnchorCommitment, AnchorRecord, AnchorRepository, AnchorTask, InMemoryLedger};
pub use cancel::CancellationToken;
pub use config::{
    AccountConfig, AnchoringConfig, JobsConfig, NetworkConfig, NodeConfig, P2pConfig,
    ProtocolVersion, TelemetryConfig,
};
pub use error::{AnchorError, ConfigError, JobError, NodeError, P2pError, StoreError, Transient};
pub use jobs::{JobDispatcher, JobResult, JobStatus};
pub use node::{Node, NodeDeps};
pub use p2p::{Header, HandshakeValidator, LocalNetwork, P2pClient, P2pHandler, TokenRequest};
pub use repository::{DocumentRepository, InMemoryStore, KeyValueStore};
pub use retry::{with_backoff, RetryPolicy};
pub use service::DocumentService;
pub use telemetry::init_tracing;
pub use webhook::{
    EventType, HttpWebhookSender, MemoryWebhookSender, NotificationMessage, WebhookSender,
};
