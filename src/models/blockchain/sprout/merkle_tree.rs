//! Incremental Merkle tree over Sprout note commitments.
//!
//! The tree is append-only and stores only the frontier: the two leftmost
//! unpaired leaves and one optional node per level. Empty subtrees hash to
//! [`empty_root`] of their depth, starting from the all-zero leaf. Inner
//! nodes are the SHA-256 compression of their two children.
//!
//! An [`IncrementalWitness`] follows one leaf while later leaves are appended,
//! so that the authentication path of that leaf can be produced against the
//! current root at any time.

use std::collections::VecDeque;
use std::sync::OnceLock;

use serde::Deserialize;
use serde::Serialize;

use crate::models::blockchain::digest::sha256_compress;
use crate::models::blockchain::digest::Hash256;

pub const SPROUT_TREE_DEPTH: usize = 29;

/// The largest depth for which empty roots are precomputed.
const MAX_DEPTH: usize = 32;

pub type SproutMerkleTree = IncrementalMerkleTree<SPROUT_TREE_DEPTH>;
pub type SproutWitness = IncrementalWitness<SPROUT_TREE_DEPTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum MerkleTreeError {
    #[error("note commitment tree is full")]
    TreeFull,

    #[error("note commitment tree is empty")]
    TreeEmpty,
}

fn combine(left: &Hash256, right: &Hash256) -> Hash256 {
    sha256_compress(left.as_bytes(), right.as_bytes())
}

/// Root of a subtree of `depth` levels whose leaves are all empty.
pub fn empty_root(depth: usize) -> Hash256 {
    static EMPTY_ROOTS: OnceLock<Vec<Hash256>> = OnceLock::new();
    let roots = EMPTY_ROOTS.get_or_init(|| {
        let mut roots = vec![Hash256::ZERO];
        for d in 0..MAX_DEPTH {
            roots.push(combine(&roots[d], &roots[d]));
        }
        roots
    });
    roots[depth]
}

/// Supplies the sibling hashes that are not stored in a tree frontier:
/// queued hashes first, then empty roots.
struct PathFiller {
    queue: VecDeque<Hash256>,
}

impl PathFiller {
    fn new(queue: VecDeque<Hash256>) -> Self {
        Self { queue }
    }

    fn next(&mut self, depth: usize) -> Hash256 {
        self.queue.pop_front().unwrap_or_else(|| empty_root(depth))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    /// Sibling hashes, ordered from the root down to the leaf.
    pub authentication_path: Vec<Hash256>,

    /// `true` when the node on the path is a right child.
    pub index: Vec<bool>,
}

impl MerklePath {
    /// Recompute the root reached by hashing `leaf` up this path.
    pub fn root(&self, leaf: Hash256) -> Hash256 {
        self.authentication_path
            .iter()
            .rev()
            .zip(self.index.iter().rev())
            .fold(leaf, |node, (sibling, is_right)| {
                if *is_right {
                    combine(sibling, &node)
                } else {
                    combine(&node, sibling)
                }
            })
    }

    /// Position of the leaf, counted from the left.
    pub fn position(&self) -> u64 {
        self.index
            .iter()
            .fold(0u64, |acc, is_right| (acc << 1) | u64::from(*is_right))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalMerkleTree<const DEPTH: usize> {
    left: Option<Hash256>,
    right: Option<Hash256>,
    parents: Vec<Option<Hash256>>,
}

impl<const DEPTH: usize> IncrementalMerkleTree<DEPTH> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn empty_root() -> Hash256 {
        empty_root(DEPTH)
    }

    pub fn append(&mut self, leaf: Hash256) -> Result<(), MerkleTreeError> {
        if self.is_complete(DEPTH) {
            return Err(MerkleTreeError::TreeFull);
        }

        let (Some(left), Some(right)) = (self.left, self.right) else {
            if self.left.is_none() {
                self.left = Some(leaf);
            } else {
                self.right = Some(leaf);
            }
            return Ok(());
        };

        // both leaves are occupied: carry their combination up the frontier.
        let mut combined = combine(&left, &right);
        self.left = Some(leaf);
        self.right = None;

        for parent in self.parents.iter_mut() {
            match parent.take() {
                Some(p) => combined = combine(&p, &combined),
                None => {
                    *parent = Some(combined);
                    return Ok(());
                }
            }
        }
        self.parents.push(Some(combined));
        Ok(())
    }

    /// Whether the subtree of `depth` levels rooted at the frontier is full.
    pub(crate) fn is_complete(&self, depth: usize) -> bool {
        self.left.is_some()
            && self.right.is_some()
            && self.parents.len() == depth - 1
            && self.parents.iter().all(Option::is_some)
    }

    /// The most recently appended leaf.
    pub fn last(&self) -> Result<Hash256, MerkleTreeError> {
        self.right.or(self.left).ok_or(MerkleTreeError::TreeEmpty)
    }

    pub fn size(&self) -> u64 {
        let leaves = u64::from(self.left.is_some()) + u64::from(self.right.is_some());
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_some())
            .fold(leaves, |acc, (i, _)| acc + (1u64 << (i + 1)))
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none()
    }

    pub fn root(&self) -> Hash256 {
        self.root_with(DEPTH, VecDeque::new())
    }

    fn root_with(&self, depth: usize, filler_hashes: VecDeque<Hash256>) -> Hash256 {
        let mut filler = PathFiller::new(filler_hashes);

        let combine_left = self.left.unwrap_or_else(|| filler.next(0));
        let combine_right = self.right.unwrap_or_else(|| filler.next(0));
        let mut root = combine(&combine_left, &combine_right);

        let mut d = 1;
        for parent in &self.parents {
            root = match parent {
                Some(p) => combine(p, &root),
                None => combine(&root, &filler.next(d)),
            };
            d += 1;
        }
        while d < depth {
            root = combine(&root, &filler.next(d));
            d += 1;
        }
        root
    }

    fn path_with(&self, filler_hashes: VecDeque<Hash256>) -> Result<MerklePath, MerkleTreeError> {
        let left = self.left.ok_or(MerkleTreeError::TreeEmpty)?;
        let mut filler = PathFiller::new(filler_hashes);

        let mut path = Vec::with_capacity(DEPTH);
        let mut index = Vec::with_capacity(DEPTH);

        if self.right.is_some() {
            index.push(true);
            path.push(left);
        } else {
            index.push(false);
            path.push(filler.next(0));
        }

        let mut d = 1;
        for parent in &self.parents {
            match parent {
                Some(p) => {
                    index.push(true);
                    path.push(*p);
                }
                None => {
                    index.push(false);
                    path.push(filler.next(d));
                }
            }
            d += 1;
        }
        while d < DEPTH {
            index.push(false);
            path.push(filler.next(d));
            d += 1;
        }

        path.reverse();
        index.reverse();
        Ok(MerklePath {
            authentication_path: path,
            index,
        })
    }

    /// Depth of the next subtree a witness has to fill, after skipping the
    /// first `skip` empty frontier slots.
    fn next_depth(&self, mut skip: usize) -> usize {
        if self.left.is_none() {
            if skip == 0 {
                return 0;
            }
            skip -= 1;
        }
        if self.right.is_none() {
            if skip == 0 {
                return 0;
            }
            skip -= 1;
        }

        let mut d = 1;
        for parent in &self.parents {
            if parent.is_none() {
                if skip == 0 {
                    return d;
                }
                skip -= 1;
            }
            d += 1;
        }
        d + skip
    }

    /// A witness to the most recently appended leaf.
    pub fn witness(&self) -> IncrementalWitness<DEPTH> {
        IncrementalWitness::from_tree(self.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalWitness<const DEPTH: usize> {
    tree: IncrementalMerkleTree<DEPTH>,
    filled: Vec<Hash256>,
    cursor: Option<IncrementalMerkleTree<DEPTH>>,
    cursor_depth: usize,
}

impl<const DEPTH: usize> IncrementalWitness<DEPTH> {
    fn from_tree(tree: IncrementalMerkleTree<DEPTH>) -> Self {
        Self {
            tree,
            filled: vec![],
            cursor: None,
            cursor_depth: 0,
        }
    }

    fn partial_path(&self) -> VecDeque<Hash256> {
        let mut uncles: VecDeque<Hash256> = self.filled.iter().copied().collect();
        if let Some(cursor) = &self.cursor {
            uncles.push_back(cursor.root_with(self.cursor_depth, VecDeque::new()));
        }
        uncles
    }

    /// The witnessed leaf.
    pub fn element(&self) -> Result<Hash256, MerkleTreeError> {
        self.tree.last()
    }

    pub fn root(&self) -> Hash256 {
        self.tree.root_with(DEPTH, self.partial_path())
    }

    pub fn path(&self) -> Result<MerklePath, MerkleTreeError> {
        self.tree.path_with(self.partial_path())
    }

    /// Record a leaf appended to the tree after the witnessed one.
    pub fn append(&mut self, leaf: Hash256) -> Result<(), MerkleTreeError> {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.append(leaf)?;
            if cursor.is_complete(self.cursor_depth) {
                self.filled
                    .push(cursor.root_with(self.cursor_depth, VecDeque::new()));
                self.cursor = None;
            }
            return Ok(());
        }

        self.cursor_depth = self.tree.next_depth(self.filled.len());
        if self.cursor_depth >= DEPTH {
            return Err(MerkleTreeError::TreeFull);
        }

        if self.cursor_depth == 0 {
            self.filled.push(leaf);
        } else {
            let mut cursor = IncrementalMerkleTree::new();
            cursor.append(leaf)?;
            self.cursor = Some(cursor);
        }
        Ok(())
    }
}
