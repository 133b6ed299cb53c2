//! Structural checks over a whole tree, run as a `DiskTreeVisitor`.

use std::collections::HashSet;
use std::marker::PhantomData;

use super::node::{IndexEntry, TreeNode};
use super::variant::TreeVariant;
use super::visit::{DiskTreeVisitor, TreeInfo};
use crate::container::NodeKey;
use crate::data::DataItem;
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;

/// Verifies the structure of every node it is handed.
///
/// Index entries must describe their node exactly. Leaf entries only have
/// to lie inside the entry of their leaf: deletions piggybacked by a query
/// shrink a leaf without tightening the entry above it.
pub struct InvariantChecker<E, V> {
    keys: HashSet<NodeKey>,
    leaf_entries: usize,
    index_nodes: usize,
    leaves: usize,
    _marker: PhantomData<fn() -> (E, V)>,
}

impl<E: DataItem, V: TreeVariant<E>> InvariantChecker<E, V> {
    pub fn new() -> Self {
        Self {
            keys: HashSet::new(),
            leaf_entries: 0,
            index_nodes: 0,
            leaves: 0,
            _marker: PhantomData,
        }
    }

    /// Entries found in all leaves visited so far.
    pub fn leaf_entries(&self) -> usize {
        self.leaf_entries
    }

    pub fn index_nodes(&self) -> usize {
        self.index_nodes
    }

    pub fn leaves(&self) -> usize {
        self.leaves
    }

    fn check_key(&mut self, entry: &IndexEntry<E::Desc>) -> RRTreeResult<()> {
        if !self.keys.insert(entry.key) {
            return Err(RRTreeError::invariant(format!("node {} is referenced twice", entry.key)));
        }
        Ok(())
    }

    fn check_size(
        &self,
        tree: &TreeInfo<E::Desc>,
        entry: &IndexEntry<E::Desc>,
        node: &TreeNode<E, V>,
    ) -> RRTreeResult<()> {
        if node.overflows(&tree.config) {
            return Err(RRTreeError::invariant(format!(
                "node {} overflows with {} entries",
                entry.key,
                node.len()
            )));
        }
        if tree.is_root(entry) {
            if node.is_empty() {
                return Err(RRTreeError::invariant("root node is empty"));
            }
            return Ok(());
        }
        // update leaves shrink through annihilation
        let may_underflow = node.is_leaf() && V::DELETIONS_LIKE_INSERTIONS;
        if node.underflows(&tree.config) && !may_underflow {
            return Err(RRTreeError::invariant(format!(
                "node {} underflows with {} entries",
                entry.key,
                node.len()
            )));
        }
        Ok(())
    }
}

impl<E: DataItem, V: TreeVariant<E>> Default for InvariantChecker<E, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DataItem, V: TreeVariant<E>> DiskTreeVisitor<E, V> for InvariantChecker<E, V> {
    fn visit_index_node(
        &mut self,
        tree: &TreeInfo<E::Desc>,
        entry: &IndexEntry<E::Desc>,
        node: &TreeNode<E, V>,
    ) -> RRTreeResult<()> {
        self.index_nodes += 1;
        self.check_key(entry)?;
        if node.is_leaf() || node.level() != entry.node_level() {
            return Err(RRTreeError::invariant(format!(
                "entry {} at level {} points to a node at level {}",
                entry.key,
                entry.level,
                node.level()
            )));
        }
        self.check_size(tree, entry, node)?;
        if tree.is_root(entry) && node.len() < 2 {
            return Err(RRTreeError::invariant("root index node has a single child"));
        }

        if let Some(child) = node.children().iter().find(|c| c.level != node.level()) {
            return Err(RRTreeError::invariant(format!(
                "child {} of node {} has level {}, expected {}",
                child.key,
                entry.key,
                child.level,
                node.level()
            )));
        }

        let descriptor = crate::geometry::union_all(node.children().iter().map(|c| &c.descriptor));
        if descriptor.as_ref() != Some(&entry.descriptor) {
            return Err(RRTreeError::invariant(format!(
                "entry {} does not match the union of its children",
                entry.key
            )));
        }
        Ok(())
    }

    fn visit_leaf_node(
        &mut self,
        tree: &TreeInfo<E::Desc>,
        entry: &IndexEntry<E::Desc>,
        node: &TreeNode<E, V>,
    ) -> RRTreeResult<()> {
        self.leaves += 1;
        self.check_key(entry)?;
        if !node.is_leaf() || !entry.points_to_leaf() {
            return Err(RRTreeError::invariant(format!(
                "entry {} at level {} does not point to a leaf",
                entry.key, entry.level
            )));
        }
        self.check_size(tree, entry, node)?;

        let entries = node.leaf_entries();
        if let Some(outside) = entries
            .iter()
            .find(|leaf| !entry.descriptor.contains(&V::leaf_descriptor(leaf)))
        {
            return Err(RRTreeError::invariant(format!(
                "{:?} lies outside the entry of leaf {}",
                outside, entry.key
            )));
        }

        for (i, a) in entries.iter().enumerate() {
            if entries[i + 1..].iter().any(|b| V::do_entries_annihilate(a, b)) {
                return Err(RRTreeError::invariant(format!(
                    "leaf {} holds {:?} together with its opposite",
                    entry.key, a
                )));
            }
        }

        self.leaf_entries += entries.len();
        Ok(())
    }
}
