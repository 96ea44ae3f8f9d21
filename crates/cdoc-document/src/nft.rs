//! NFT linkage metadata.
//!
//! A document can back at most one token per registry. The registry address
//! is the map key in `cd_tree.nfts`, so a proof of
//! `cd_tree.nfts[registry].token_id` is also a proof that no other token of
//! that registry is bound to the same document version.

use cdoc_core::{NftTokenId, RegistryId};
use serde::{Deserialize, Serialize};

/// A token minted against this document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    /// Registry contract address.
    pub registry: RegistryId,
    /// Token id inside the registry.
    pub token_id: NftTokenId,
    /// Whether the token owner may read the document.
    pub grants_read: bool,
}
