use std::collections::HashMap;
use std::fmt;

use crate::models::blockchain::digest::Hash256;
use crate::models::blockchain::sprout::merkle_tree::SproutMerkleTree;

/// Read access to the Sprout note commitment trees the chain has committed
/// to, keyed by their root.
pub trait SproutTreeView: fmt::Debug + Send + Sync {
    fn sprout_tree_at(&self, anchor: &Hash256) -> Option<SproutMerkleTree>;
}

/// Committed trees held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySproutTrees {
    trees: HashMap<Hash256, SproutMerkleTree>,
}

impl InMemorySproutTrees {
    pub fn new() -> Self {
        Default::default()
    }

    /// Record `tree` under its current root, returning that root.
    pub fn insert(&mut self, tree: SproutMerkleTree) -> Hash256 {
        let root = tree.root();
        self.trees.insert(root, tree);
        root
    }
}

impl SproutTreeView for InMemorySproutTrees {
    fn sprout_tree_at(&self, anchor: &Hash256) -> Option<SproutMerkleTree> {
        self.trees.get(anchor).cloned()
    }
}
