//! # cdoc-schemes: Document Schemes
//!
//! Typed adapters over [`cdoc_document::CoreDocument`]:
//!
//! - [`Entity`]: legal entity master data.
//! - [`EntityRelationship`]: shares an entity with a counterparty through a
//!   signed access token. Owner-only updates.
//! - [`Generic`]: envelope only.
//!
//! [`SchemeRegistry`] rebuilds any of them from a [`PackedDocument`].
//!
//! [`PackedDocument`]: cdoc_document::PackedDocument

pub mod entity;
pub mod generic;
pub mod registry;
pub mod relationship;

pub use entity::{
    Address, BankPaymentMethod, Contact, CryptoPaymentMethod, Entity, EntityData,
    OtherPaymentMethod, PaymentDetail, PaymentMethod,
};
pub use generic::Generic;
pub use registry::{AnyDocument, Constructor, SchemeRegistry};
pub use relationship::{EntityRelationship, RelationshipData};
