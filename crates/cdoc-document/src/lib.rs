//! # cdoc-document: The Versioned Document Model
//!
//! Every document scheme holds a [`CoreDocument`] and implements
//! [`Document`]. This crate owns everything that is scheme independent:
//!
//! - **Tree builder** ([`tree`]): salted leaves under readable and compact
//!   paths, sorted into deterministic Merkle trees.
//! - **Core document engine** ([`engine`]): version chain, collaborators,
//!   roles, transition rules, attributes, NFTs, access tokens, signatures,
//!   and the data, signing and document roots.
//! - **Collaboration validator** ([`validator`]): diffs two versions and
//!   checks the diff against the mutator's rules.
//! - **Proof generator** ([`proof`]): field proofs against the document root,
//!   including NFT mint proofs.
//! - **Access token delegation** ([`access`]): signed, document-scoped grants.
//!
//! ## Crate Policy
//!
//! - No I/O and no async. Storage, anchoring and transport live in
//!   `cdoc-node`.
//! - Engine operations never retry and never partially apply.
//! - No `.unwrap()` outside tests.

pub mod access;
pub mod attribute;
pub mod collaborators;
pub mod engine;
pub mod error;
pub mod int256;
pub mod keys;
pub mod model;
pub mod nft;
pub mod paths;
pub mod proof;
pub mod rules;
pub mod scheme;
pub mod signature;
pub mod tree;
pub mod validator;

pub use access::{issue_token, token_message, validate_token, AccessToken, TokenGrant};
pub use attribute::{Attribute, AttributeType, AttributeValue, SignedValue};
pub use collaborators::{Collaborators, CollaboratorsAccess};
pub use crate::engine::{CoreDocument, Status};
pub use error::{DocumentError, ErrorKind};
pub use int256::Int256;
pub use keys::{InMemoryKeyRegistry, KeyPurpose, KeyRegistry};
pub use model::{Document, PackedDocument};
pub use nft::Nft;
pub use proof::{verify_field_proof, DocumentProof, FieldProof};
pub use rules::{validate_transitions, MatchType, Role, TransitionAction, TransitionRule};
pub use scheme::Scheme;
pub use signature::DocumentSignature;
pub use tree::{changed_fields, ChangedField, DocumentTree, FieldPath, LeafEncode, LeafNode, TreeBuilder};
pub use validator::{collaborator_can_update, verify_anchored, verify_signing_state};
