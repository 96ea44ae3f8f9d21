//! # cdoc-core: Foundational Types for the Document Node
//!
//! Every other crate in the workspace depends on `cdoc-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Fixed-size byte newtypes for identifiers.** `DocumentId`, `VersionId`,
//!    `AccountId`, `RoleKey`, `AttrKey` and friends are distinct types with
//!    validated constructors. A role key cannot be passed where an account is
//!    expected.
//!
//! 2. **One hash type.** Every Merkle root, leaf hash and version anchor is a
//!    [`Hash32`]. Structured data reaches a hash only through
//!    [`CanonicalBytes`].
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] enforces UTC with seconds
//!    precision so that document trees hash identically on every peer.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cdoc-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

mod bytes;

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod serde_hex;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256, sha256_concat, sha256_digest, Hash32};
pub use error::{CanonicalizationError, CoreError, CryptoError, IdentifierError};
pub use identity::{
    AccessTokenId, AccountId, AttrKey, DocumentId, JobId, NftTokenId, Preimage, RegistryId,
    RoleKey, RuleKey, SaltSeed, VersionId,
};
pub use temporal::Timestamp;
