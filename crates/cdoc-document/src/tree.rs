//! # Document Tree Builder
//!
//! Turns structured document state into a sorted list of salted leaves and
//! the Merkle tree over them.
//!
//! ## Paths
//!
//! Every leaf has two names. The readable path (`entity.addresses[0].label`)
//! is what callers, proofs and transition-rule diagnostics speak. The compact
//! path (`00030000 00000003 0000000000000000 00000005`) is what gets hashed
//! and what transition rules match on:
//!
//! - a tree starts with a 4-byte prefix,
//! - a field appends its 4-byte field number,
//! - a list element appends its 8-byte index,
//! - a map entry appends its raw key bytes,
//! - a list length leaf appends `FFFFFFFF`.
//!
//! Leaves are ordered by compact path, so the root depends only on field
//! values, never on the order a scheme happened to emit them.
//!
//! ## Hashed leaves
//!
//! The signing and root trees combine the roots of other trees. Those leaves
//! carry the sub-root itself as their hash and have no salt.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cdoc_core::{
    AccessTokenId, AccountId, AttrKey, DocumentId, Hash32, NftTokenId, RegistryId, RoleKey,
    RuleKey, SaltSeed, Timestamp, VersionId,
};
use cdoc_crypto::{derive_salt, salted_leaf_hash, Ed25519PublicKey, Ed25519Signature};
use cdoc_crypto::{MerkleTree, ProofStep};

use crate::error::DocumentError;

/// Compact suffix of a list length leaf.
pub const LENGTH_SUFFIX: [u8; 4] = [0xff; 4];

/// Readable and compact name of a leaf or of a subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    readable: String,
    compact: Vec<u8>,
    boundaries: Vec<(usize, usize)>,
    length: bool,
}

impl FieldPath {
    /// The root of a tree.
    pub fn root(name: &str, prefix: [u8; 4]) -> Self {
        Self {
            readable: name.to_string(),
            compact: prefix.to_vec(),
            boundaries: vec![(name.len(), prefix.len())],
            length: false,
        }
    }

    /// A named field with its scheme-assigned number.
    pub fn field(&self, number: u32, name: &str) -> Self {
        self.extend(&format!(".{name}"), &number.to_be_bytes())
    }

    /// An element of a list.
    pub fn index(&self, index: usize) -> Self {
        self.extend(&format!("[{index}]"), &(index as u64).to_be_bytes())
    }

    /// An entry of a map keyed by raw bytes.
    pub fn key(&self, key: &[u8]) -> Self {
        self.extend(&format!("[0x{}]", hex::encode(key)), key)
    }

    /// The length leaf of a list.
    pub fn length(&self) -> Self {
        let mut path = self.extend(".length", &LENGTH_SUFFIX);
        path.length = true;
        path
    }

    /// Readable path.
    pub fn readable(&self) -> &str {
        &self.readable
    }

    /// Compact path.
    pub fn compact(&self) -> &[u8] {
        &self.compact
    }

    /// True for list length leaves.
    pub fn is_length(&self) -> bool {
        self.length
    }

    /// Compact prefix corresponding to a readable prefix of this path, if
    /// `readable_prefix` ends on a segment boundary.
    pub fn compact_prefix_for(&self, readable_prefix: &str) -> Option<&[u8]> {
        self.boundaries
            .iter()
            .find(|(r, _)| self.readable.get(..*r) == Some(readable_prefix))
            .map(|(_, c)| &self.compact[..*c])
    }

    fn extend(&self, readable: &str, compact: &[u8]) -> Self {
        let mut next = self.clone();
        next.readable.push_str(readable);
        next.compact.extend_from_slice(compact);
        next.boundaries.push((next.readable.len(), next.compact.len()));
        next.length = false;
        next
    }
}

/// Fixed binary encoding of a leaf value.
pub trait LeafEncode {
    /// The bytes hashed into the leaf.
    fn leaf_bytes(&self) -> Vec<u8>;
}

impl LeafEncode for str {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl LeafEncode for String {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl LeafEncode for [u8] {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl LeafEncode for Vec<u8> {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.clone()
    }
}

impl LeafEncode for bool {
    fn leaf_bytes(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }
}

impl LeafEncode for u64 {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

impl LeafEncode for Timestamp {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.to_canonical_string().into_bytes()
    }
}

impl<T: LeafEncode> LeafEncode for Option<T> {
    fn leaf_bytes(&self) -> Vec<u8> {
        self.as_ref().map(|v| v.leaf_bytes()).unwrap_or_default()
    }
}

macro_rules! leaf_encode_bytes {
    ($($ty:ty),* $(,)?) => {
        $(impl LeafEncode for $ty {
            fn leaf_bytes(&self) -> Vec<u8> {
                self.as_bytes().to_vec()
            }
        })*
    };
}

leaf_encode_bytes!(
    DocumentId,
    VersionId,
    AccountId,
    RoleKey,
    RuleKey,
    AttrKey,
    AccessTokenId,
    NftTokenId,
    RegistryId,
    Hash32,
    Ed25519PublicKey,
    Ed25519Signature,
);

/// A leaf of a document tree.
#[derive(Debug, Clone)]
pub struct LeafNode {
    /// Where the leaf sits.
    pub path: FieldPath,
    /// Encoded value; empty for hashed leaves.
    pub value: Vec<u8>,
    /// Salt; `None` for hashed leaves.
    pub salt: Option<[u8; 32]>,
    /// Leaf hash.
    pub hash: Hash32,
}

impl LeafNode {
    /// Hashed leaves carry a sub-tree root and no value.
    pub fn is_hashed(&self) -> bool {
        self.salt.is_none()
    }
}

/// Collects leaves for one tree.
#[derive(Debug)]
pub struct TreeBuilder {
    root: FieldPath,
    seed: SaltSeed,
    leaves: Vec<LeafNode>,
}

impl TreeBuilder {
    /// Start a tree at `root`, salting leaves from `seed`.
    pub fn new(root: FieldPath, seed: SaltSeed) -> Self {
        Self {
            root,
            seed,
            leaves: Vec::new(),
        }
    }

    /// Root path of the tree under construction.
    pub fn root(&self) -> &FieldPath {
        &self.root
    }

    /// Add a salted leaf.
    pub fn add<V: LeafEncode + ?Sized>(&mut self, path: FieldPath, value: &V) {
        let value = value.leaf_bytes();
        let salt = derive_salt(&self.seed, path.compact());
        let hash = salted_leaf_hash(path.compact(), &value, &salt);
        self.leaves.push(LeafNode {
            path,
            value,
            salt: Some(salt),
            hash,
        });
    }

    /// Add the length leaf of a list.
    pub fn add_length(&mut self, path: &FieldPath, len: usize) {
        self.add(path.length(), &(len as u64));
    }

    /// Add a list: its length leaf, then `each` for every element.
    pub fn add_list<T>(
        &mut self,
        path: &FieldPath,
        items: &[T],
        mut each: impl FnMut(&mut Self, FieldPath, &T),
    ) {
        self.add_length(path, items.len());
        for (i, item) in items.iter().enumerate() {
            each(self, path.index(i), item);
        }
    }

    /// Add a leaf whose hash is a sub-tree root.
    pub fn add_hashed(&mut self, path: FieldPath, hash: Hash32) {
        self.leaves.push(LeafNode {
            path,
            value: Vec::new(),
            salt: None,
            hash,
        });
    }

    /// Sort the leaves by compact path and build the Merkle tree.
    ///
    /// # Errors
    ///
    /// `DataTree` if the tree is empty or two leaves share a compact path.
    pub fn build(mut self) -> Result<DocumentTree, DocumentError> {
        if self.leaves.is_empty() {
            return Err(DocumentError::DataTree(format!(
                "tree {} has no leaves",
                self.root.readable()
            )));
        }
        self.leaves.sort_by(|a, b| a.path.compact().cmp(b.path.compact()));
        if let Some(pair) = self
            .leaves
            .windows(2)
            .find(|w| w[0].path.compact() == w[1].path.compact())
        {
            return Err(DocumentError::DataTree(format!(
                "duplicate leaf path {} / {}",
                pair[0].path.readable(),
                pair[1].path.readable()
            )));
        }
        let merkle = MerkleTree::from_leaves(self.leaves.iter().map(|l| l.hash).collect())
            .map_err(|e| DocumentError::DataTree(e.to_string()))?;
        let index = self
            .leaves
            .iter()
            .enumerate()
            .map(|(i, l)| (l.path.readable().to_string(), i))
            .collect();
        Ok(DocumentTree {
            name: self.root.readable().to_string(),
            leaves: self.leaves,
            index,
            merkle,
        })
    }
}

/// A built tree: sorted leaves and their Merkle tree.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    name: String,
    leaves: Vec<LeafNode>,
    index: HashMap<String, usize>,
    merkle: MerkleTree,
}

impl DocumentTree {
    /// Root segment of every readable path in this tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merkle root.
    pub fn root_hash(&self) -> Hash32 {
        self.merkle.root()
    }

    /// Leaves in compact order.
    pub fn leaves(&self) -> &[LeafNode] {
        &self.leaves
    }

    /// Leaf by readable path.
    pub fn leaf(&self, readable: &str) -> Option<&LeafNode> {
        self.index.get(readable).map(|&i| &self.leaves[i])
    }

    /// True if `readable` names a leaf of this tree.
    pub fn contains(&self, readable: &str) -> bool {
        self.index.contains_key(readable)
    }

    /// Leaf and its sibling path up to this tree's root.
    pub fn leaf_proof(&self, readable: &str) -> Result<(&LeafNode, Vec<ProofStep>), DocumentError> {
        let &i = self
            .index
            .get(readable)
            .ok_or_else(|| DocumentError::DocumentProof(format!("no such field {readable}")))?;
        let path = self.merkle.path(i)?;
        Ok((&self.leaves[i], path))
    }

    /// Compact path (or compact prefix) for a readable field selector.
    ///
    /// `entity.legal_name` resolves to that leaf's compact path,
    /// `entity.addresses` to the compact prefix shared by every address leaf.
    pub fn resolve_selector(&self, readable: &str) -> Option<Vec<u8>> {
        self.leaves
            .iter()
            .find_map(|leaf| leaf.path.compact_prefix_for(readable))
            .map(<[u8]>::to_vec)
    }
}

/// A field that differs between two versions of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedField {
    /// Readable path.
    pub property: String,
    /// Compact path.
    pub compact: Vec<u8>,
    /// Value in the old version, `None` if the field was added.
    pub old: Option<Vec<u8>>,
    /// Value in the new version, `None` if the field was removed.
    pub new: Option<Vec<u8>>,
}

/// Every leaf that was added, removed or changed between `old` and `new`.
///
/// Length leaves are skipped: a list that grows or shrinks also adds or
/// removes element leaves, which are reported individually.
pub fn changed_fields(old: &DocumentTree, new: &DocumentTree) -> Vec<ChangedField> {
    let old_leaves: BTreeMap<&str, &LeafNode> = old
        .leaves()
        .iter()
        .filter(|l| !l.path.is_length())
        .map(|l| (l.path.readable(), l))
        .collect();
    let new_leaves: BTreeMap<&str, &LeafNode> = new
        .leaves()
        .iter()
        .filter(|l| !l.path.is_length())
        .map(|l| (l.path.readable(), l))
        .collect();
    let names: BTreeSet<&str> = old_leaves.keys().chain(new_leaves.keys()).copied().collect();

    names
        .into_iter()
        .filter_map(|name| {
            let before = old_leaves.get(name);
            let after = new_leaves.get(name);
            let changed = match (before, after) {
                (Some(a), Some(b)) if a.is_hashed() || b.is_hashed() => a.hash != b.hash,
                (Some(a), Some(b)) => a.value != b.value,
                _ => true,
            };
            if !changed {
                return None;
            }
            let compact = before
                .or(after)
                .map(|l| l.path.compact().to_vec())
                .unwrap_or_default();
            Some(ChangedField {
                property: name.to_string(),
                compact,
                old: before.map(|l| l.value.clone()),
                new: after.map(|l| l.value.clone()),
            })
        })
        .collect()
}
