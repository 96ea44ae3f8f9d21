//! # Binary Merkle Tree
//!
//! The tree behind every document root. Leaves are supplied already hashed
//! (salted leaf hashes, or sub-tree roots for the signing and root trees).
//!
//! ## Algorithm
//!
//! - Node: `SHA256(0x01 || left || right)`.
//! - Levels are built pairwise left to right. An odd trailing node is
//!   promoted to the next level unchanged; it is never duplicated, so no two
//!   distinct leaf lists share a root by padding.
//! - A proof is the list of siblings met on the way up, each tagged with the
//!   side it sits on. Promotions contribute no step.
//!
//! ## Security Invariant
//!
//! Leaf hashes produced by [`crate::leaf`] use the `0x00` domain byte and
//! interior nodes use `0x01`, so a leaf can never be reinterpreted as an
//! interior node of another tree.

use cdoc_core::{sha256_concat, CryptoError, Hash32};
use serde::{Deserialize, Serialize};

/// Domain byte for interior nodes.
pub const NODE_DOMAIN: u8 = 0x01;

/// Interior node hash.
pub fn node_hash(left: &Hash32, right: &Hash32) -> Hash32 {
    sha256_concat(&[&[NODE_DOMAIN], left.as_bytes(), right.as_bytes()])
}

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sibling is hashed on the left.
    Left,
    /// Sibling is hashed on the right.
    Right,
}

/// One step of a sibling path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Side of the sibling.
    pub side: Side,
    /// Sibling hash.
    pub hash: Hash32,
}

/// A fully materialised binary Merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    /// Build a tree over `leaves` in the given order.
    ///
    /// # Errors
    ///
    /// `CryptoError::Merkle` if `leaves` is empty.
    pub fn from_leaves(leaves: Vec<Hash32>) -> Result<Self, CryptoError> {
        if leaves.is_empty() {
            return Err(CryptoError::Merkle("cannot build a tree without leaves".into()));
        }
        let mut levels = vec![leaves];
        while let Some(level) = levels.last() {
            if level.len() == 1 {
                break;
            }
            let next: Vec<Hash32> = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => node_hash(left, right),
                    _ => pair[0],
                })
                .collect();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// The root hash.
    pub fn root(&self) -> Hash32 {
        // from_leaves guarantees a final single-element level.
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash32::ZERO)
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Sibling path for the leaf at `index`.
    pub fn path(&self, index: usize) -> Result<Vec<ProofStep>, CryptoError> {
        if index >= self.leaf_count() {
            return Err(CryptoError::Merkle(format!(
                "leaf index {index} out of range for {} leaves",
                self.leaf_count()
            )));
        }
        let mut steps = Vec::new();
        let mut pos = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = pos ^ 1;
            if let Some(hash) = level.get(sibling) {
                let side = if sibling < pos { Side::Left } else { Side::Right };
                steps.push(ProofStep { side, hash: *hash });
            }
            pos /= 2;
        }
        Ok(steps)
    }
}

/// Walk `path` upward from `leaf`, returning the candidate root.
pub fn fold_path(leaf: Hash32, path: &[ProofStep]) -> Hash32 {
    path.iter().fold(leaf, |acc, step| match step.side {
        Side::Left => node_hash(&step.hash, &acc),
        Side::Right => node_hash(&acc, &step.hash),
    })
}

/// True iff `path` leads from `leaf` to `root`.
pub fn verify_path(leaf: Hash32, path: &[ProofStep], root: &Hash32) -> bool {
    fold_path(leaf, path) == *root
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdoc_core::sha256;
    use proptest::prelude::*;

    fn leaves(n: usize) -> Vec<Hash32> {
        (0..n).map(|i| sha256(&(i as u64).to_be_bytes())).collect()
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(MerkleTree::from_leaves(vec![]).is_err());
    }

    #[test]
    fn test_single_leaf_is_root() {
        let l = leaves(1);
        let tree = MerkleTree::from_leaves(l.clone()).unwrap();
        assert_eq!(tree.root(), l[0]);
        assert!(tree.path(0).unwrap().is_empty());
    }

    #[test]
    fn test_two_leaves() {
        let l = leaves(2);
        let tree = MerkleTree::from_leaves(l.clone()).unwrap();
        assert_eq!(tree.root(), node_hash(&l[0], &l[1]));
    }

    #[test]
    fn test_odd_node_promoted_not_duplicated() {
        let l = leaves(3);
        let tree = MerkleTree::from_leaves(l.clone()).unwrap();
        let expected = node_hash(&node_hash(&l[0], &l[1]), &l[2]);
        assert_eq!(tree.root(), expected);
        let path = tree.path(2).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].side, Side::Left);
    }

    #[test]
    fn test_path_out_of_range() {
        let tree = MerkleTree::from_leaves(leaves(4)).unwrap();
        assert!(tree.path(4).is_err());
    }

    #[test]
    fn test_wrong_leaf_fails_verification() {
        let l = leaves(5);
        let tree = MerkleTree::from_leaves(l.clone()).unwrap();
        let path = tree.path(1).unwrap();
        assert!(verify_path(l[1], &path, &tree.root()));
        assert!(!verify_path(l[2], &path, &tree.root()));
    }

    #[test]
    fn test_order_matters() {
        let mut l = leaves(4);
        let a = MerkleTree::from_leaves(l.clone()).unwrap().root();
        l.swap(0, 1);
        let b = MerkleTree::from_leaves(l).unwrap().root();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn every_leaf_proves_to_root(n in 1usize..40, pick in any::<prop::sample::Index>()) {
            let l = leaves(n);
            let tree = MerkleTree::from_leaves(l.clone()).unwrap();
            let index = pick.index(n);
            let path = tree.path(index).unwrap();
            prop_assert!(verify_path(l[index], &path, &tree.root()));
        }
    }
}
