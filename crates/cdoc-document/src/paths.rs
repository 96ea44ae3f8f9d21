//! Tree prefixes and field numbers of the scheme-independent trees.

use crate::tree::FieldPath;

/// Core document tree.
pub const CD_TREE: &str = "cd_tree";
/// Compact prefix of the core document tree.
pub const CD_TREE_PREFIX: [u8; 4] = [1, 0, 0, 0];
/// Signing tree: data root and core root.
pub const SIGNING_TREE: &str = "signing_tree";
/// Compact prefix of the signing tree.
pub const SIGNING_TREE_PREFIX: [u8; 4] = [2, 0, 0, 0];
/// Signatures tree.
pub const SIGNATURES_TREE: &str = "signatures_tree";
/// Compact prefix of the signatures tree.
pub const SIGNATURES_TREE_PREFIX: [u8; 4] = [3, 0, 0, 0];
/// Document root tree: signing root and signatures root.
pub const DR_TREE: &str = "dr_tree";
/// Compact prefix of the document root tree.
pub const DR_TREE_PREFIX: [u8; 4] = [4, 0, 0, 0];

/// Field numbers inside `cd_tree`.
pub mod cd {
    pub const DOCUMENT_IDENTIFIER: u32 = 1;
    pub const CURRENT_VERSION: u32 = 3;
    pub const NEXT_VERSION: u32 = 4;
    pub const READ_COLLABORATORS: u32 = 5;
    pub const READ_WRITE_COLLABORATORS: u32 = 6;
    pub const ROLES: u32 = 13;
    pub const TRANSITION_RULES: u32 = 14;
    pub const PREVIOUS_VERSION: u32 = 16;
    pub const NFTS: u32 = 20;
    pub const ACCESS_TOKENS: u32 = 21;
    pub const AUTHOR: u32 = 25;
    pub const TIMESTAMP: u32 = 26;
    pub const ATTRIBUTES: u32 = 28;
    pub const DOCUMENT_TYPE: u32 = 100;
}

/// Field numbers inside the signing and root trees.
pub mod roots {
    pub const DATA_ROOT: u32 = 5;
    pub const SIGNATURES_ROOT: u32 = 6;
    pub const CD_ROOT: u32 = 7;
    pub const SIGNING_ROOT: u32 = 10;
}

/// Sub-fields of `cd_tree.roles[key]`.
pub mod role {
    pub const COLLABORATORS: u32 = 2;
}

/// Sub-fields of `cd_tree.transition_rules[key]`.
pub mod rule {
    pub const ROLES: u32 = 2;
    pub const MATCH_TYPE: u32 = 3;
    pub const FIELD: u32 = 4;
    pub const ACTION: u32 = 5;
}

/// Sub-fields of `cd_tree.nfts[registry]`.
pub mod nft {
    pub const TOKEN_ID: u32 = 1;
    pub const GRANTS_READ: u32 = 2;
}

/// Sub-fields of `cd_tree.access_tokens[identifier]`.
pub mod token {
    pub const GRANTER: u32 = 1;
    pub const GRANTEE: u32 = 2;
    pub const ROLE_IDENTIFIER: u32 = 3;
    pub const DOCUMENT_IDENTIFIER: u32 = 4;
    pub const DOCUMENT_VERSION: u32 = 5;
    pub const KEY: u32 = 6;
    pub const SIGNATURE: u32 = 7;
}

/// Sub-fields of `cd_tree.attributes[key]`.
pub mod attribute {
    pub const KEY_LABEL: u32 = 1;
    pub const TYPE: u32 = 2;
    pub const VALUE: u32 = 3;
}

/// Fields of `signatures_tree`.
pub mod signature {
    pub const SIGNATURES: u32 = 1;
    pub const SIGNER_ID: u32 = 1;
    pub const PUBLIC_KEY: u32 = 2;
    pub const SIGNATURE: u32 = 3;
}

/// Root of `cd_tree`.
pub fn cd_root() -> FieldPath {
    FieldPath::root(CD_TREE, CD_TREE_PREFIX)
}

/// Root of `signing_tree`.
pub fn signing_root() -> FieldPath {
    FieldPath::root(SIGNING_TREE, SIGNING_TREE_PREFIX)
}

/// Root of `signatures_tree`.
pub fn signatures_root() -> FieldPath {
    FieldPath::root(SIGNATURES_TREE, SIGNATURES_TREE_PREFIX)
}

/// Root of `dr_tree`.
pub fn dr_root() -> FieldPath {
    FieldPath::root(DR_TREE, DR_TREE_PREFIX)
}

/// `cd_tree.attributes[key]`: the compact prefix of every leaf of one attribute.
pub fn attribute_prefix(key: &[u8]) -> FieldPath {
    cd_root().field(cd::ATTRIBUTES, "attributes").key(key)
}

/// `cd_tree.nfts[registry]`.
pub fn nft_prefix(registry: &[u8]) -> FieldPath {
    cd_root().field(cd::NFTS, "nfts").key(registry)
}

/// Compact paths of the version bookkeeping fields every successor changes.
pub fn version_fields() -> Vec<Vec<u8>> {
    let root = cd_root();
    [
        (cd::CURRENT_VERSION, "current_version"),
        (cd::NEXT_VERSION, "next_version"),
        (cd::PREVIOUS_VERSION, "previous_version"),
        (cd::AUTHOR, "author"),
        (cd::TIMESTAMP, "timestamp"),
    ]
    .into_iter()
    .map(|(num, name)| root.field(num, name).compact().to_vec())
    .collect()
}
