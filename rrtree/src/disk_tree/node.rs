//! Nodes, index entries and the per-node operation primitives.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

use super::variant::TreeVariant;
use crate::config::DiskTreeConfig;
use crate::container::NodeKey;
use crate::data::{DataItem, Operation};
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;
use crate::piggyback::LeafPiggybackingInfo;

// ============================================================================
// Index Entries
// ============================================================================

/// Reference from a parent to a node stored in the container.
///
/// `level` is always the referenced node's level plus one, so an entry
/// pointing at a leaf has level 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry<D> {
    pub descriptor: D,
    pub key: NodeKey,
    pub level: u32,
}

impl<D> IndexEntry<D> {
    pub fn new(descriptor: D, key: NodeKey, level: u32) -> Self {
        Self {
            descriptor,
            key,
            level,
        }
    }

    /// Level of the referenced node.
    pub fn node_level(&self) -> u32 {
        self.level.saturating_sub(1)
    }

    pub fn points_to_leaf(&self) -> bool {
        self.level <= 1
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A tree node: leaves hold variant-specific entries, index nodes hold
/// `IndexEntry` children. Leaves are at level 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node<L, D> {
    Leaf { entries: Vec<L> },
    Index { level: u32, children: Vec<IndexEntry<D>> },
}

/// Node type of a tree over items `E` with leaf variant `V`.
pub type TreeNode<E, V> = Node<<V as TreeVariant<E>>::Leaf, <E as DataItem>::Desc>;

impl<L, D: Descriptor> Node<L, D> {
    pub fn new_leaf() -> Self {
        Node::Leaf {
            entries: Vec::new(),
        }
    }

    pub fn leaf(entries: Vec<L>) -> Self {
        Node::Leaf { entries }
    }

    pub fn index(level: u32, children: Vec<IndexEntry<D>>) -> Self {
        Node::Index { level, children }
    }

    pub fn level(&self) -> u32 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Index { level, .. } => *level,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf { entries } => entries.len(),
            Node::Index { children, .. } => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaf entries; empty for index nodes.
    pub fn leaf_entries(&self) -> &[L] {
        match self {
            Node::Leaf { entries } => entries,
            Node::Index { .. } => &[],
        }
    }

    /// Child entries; empty for leaves.
    pub fn children(&self) -> &[IndexEntry<D>] {
        match self {
            Node::Leaf { .. } => &[],
            Node::Index { children, .. } => children,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<IndexEntry<D>>> {
        match self {
            Node::Leaf { .. } => None,
            Node::Index { children, .. } => Some(children),
        }
    }

    pub fn into_children(self) -> Vec<IndexEntry<D>> {
        match self {
            Node::Leaf { .. } => Vec::new(),
            Node::Index { children, .. } => children,
        }
    }

    pub fn overflows(&self, config: &DiskTreeConfig) -> bool {
        self.len() > config.max_node_capacity
    }

    pub fn underflows(&self, config: &DiskTreeConfig) -> bool {
        self.len() < config.min_node_capacity
    }

    /// Minimum number of entries each part of a split must receive.
    pub fn split_min_number(&self, config: &DiskTreeConfig) -> usize {
        config.min_node_capacity
    }

    /// Union of the entry descriptors, `None` for an empty node.
    pub fn compute_descriptor_with<F>(&self, leaf_descriptor: F) -> Option<D>
    where
        F: Fn(&L) -> D,
    {
        match self {
            Node::Leaf { entries } => {
                let mut iter = entries.iter();
                let mut result = leaf_descriptor(iter.next()?);
                for entry in iter {
                    result = result.union(&leaf_descriptor(entry));
                }
                Some(result)
            }
            Node::Index { children, .. } => {
                crate::geometry::union_all(children.iter().map(|c| &c.descriptor))
            }
        }
    }

    /// Children whose descriptor overlaps `descriptor`.
    pub fn query<'a>(&'a self, descriptor: &'a D) -> impl Iterator<Item = &'a IndexEntry<D>> + 'a {
        self.children()
            .iter()
            .filter(move |child| child.descriptor.overlaps(descriptor))
    }

    /// Position of the child to descend into for an object with the given
    /// descriptor. `None` for leaves.
    pub fn choose_subtree(&self, descriptor: &D) -> Option<usize> {
        choose_subtree(self.children(), descriptor)
    }
}

/// Least area enlargement, ties broken by the smaller area.
pub fn choose_subtree<D: Descriptor>(children: &[IndexEntry<D>], descriptor: &D) -> Option<usize> {
    let mut best: Option<(usize, f64, f64)> = None;
    for (i, child) in children.iter().enumerate() {
        let enlargement = child.descriptor.enlargement(descriptor);
        let area = child.descriptor.area();
        let better = match best {
            None => true,
            Some((_, best_enlargement, best_area)) => {
                enlargement < best_enlargement
                    || (enlargement == best_enlargement && area < best_area)
            }
        };
        if better {
            best = Some((i, enlargement, area));
        }
    }
    best.map(|(i, _, _)| i)
}

// ============================================================================
// Entry Index
// ============================================================================

/// Hash index over a leaf's entries, answering membership in O(1).
#[derive(Debug, Clone)]
pub struct EntryIndex<L> {
    entries: HashSet<L>,
}

impl<L: Clone + Eq + Hash> EntryIndex<L> {
    pub fn build(entries: &[L]) -> Self {
        Self {
            entries: entries.iter().cloned().collect(),
        }
    }

    pub fn contains(&self, entry: &L) -> bool {
        self.entries.contains(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Bound Nodes
// ============================================================================

/// A node bound to the capacity bounds and item counter of its tree.
///
/// All piggyback primitives go through this handle so that every executed
/// operation is reflected in the tree's data item count.
pub struct NodeMut<'a, E: DataItem, V: TreeVariant<E>> {
    node: &'a mut TreeNode<E, V>,
    config: DiskTreeConfig,
    data_items: &'a mut usize,
}

impl<'a, E: DataItem, V: TreeVariant<E>> NodeMut<'a, E, V> {
    pub fn new(
        node: &'a mut TreeNode<E, V>,
        config: DiskTreeConfig,
        data_items: &'a mut usize,
    ) -> Self {
        Self {
            node,
            config,
            data_items,
        }
    }

    pub fn node(&self) -> &TreeNode<E, V> {
        self.node
    }

    pub fn level(&self) -> u32 {
        self.node.level()
    }

    pub fn len(&self) -> usize {
        self.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    pub fn config(&self) -> &DiskTreeConfig {
        &self.config
    }

    pub fn overflows(&self) -> bool {
        self.node.overflows(&self.config)
    }

    pub fn underflows(&self) -> bool {
        self.node.underflows(&self.config)
    }

    pub fn split_min_number(&self) -> usize {
        self.node.split_min_number(&self.config)
    }

    pub fn compute_descriptor(&self) -> Option<E::Desc> {
        self.node.compute_descriptor_with(V::leaf_descriptor)
    }

    /// Appends a leaf entry without any capacity check.
    pub fn grow(&mut self, entry: V::Leaf) -> RRTreeResult<()> {
        self.leaf_entries_mut()?.push(entry);
        Ok(())
    }

    /// Removes the first entry equal to `entry`.
    pub fn remove(&mut self, entry: &V::Leaf) -> RRTreeResult<bool> {
        let entries = self.leaf_entries_mut()?;
        match entries.iter().position(|e| e == entry) {
            Some(position) => {
                entries.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Keeps the candidates that fit this node. The candidate stream is
    /// drained completely; index nodes accept no operation.
    pub fn select_fitting_operations<I>(
        &self,
        candidates: I,
        outside_mbr_allowed: bool,
    ) -> Vec<Operation<E>>
    where
        I: IntoIterator<Item = Operation<E>>,
    {
        if !self.node.is_leaf() {
            return Vec::new();
        }
        let descriptor = self.compute_descriptor();
        let entries = self.node.leaf_entries();
        candidates
            .into_iter()
            .filter(|op| V::does_operation_fit(entries, descriptor.as_ref(), op, outside_mbr_allowed))
            .collect()
    }

    /// Clamps the candidate counts in `info` so that applying them keeps the
    /// node within `[min, max]` capacity.
    pub fn limit_number_of_operations(&self, info: &mut LeafPiggybackingInfo) {
        let potential = self.len() as isize + info.node_size_change();
        let min = self.config.min_node_capacity as isize;
        let max = self.config.max_node_capacity as isize;
        if potential < min {
            info.limit_size_decreasing_ops((min - potential) as usize);
        } else if potential > max {
            info.limit_size_increasing_ops((potential - max) as usize);
        }
    }

    /// Applies every operation without capacity limiting, returning the
    /// ones that were executed.
    pub fn execute_ops(
        &mut self,
        operations: &[Operation<E>],
        insertion_removes_old_insertion: bool,
    ) -> RRTreeResult<Vec<Operation<E>>> {
        let mut executed = Vec::with_capacity(operations.len());
        let mut change = 0isize;
        {
            let entries = self.leaf_entries_mut()?;
            for op in operations {
                if let Some(delta) = V::execute_op(entries, op, insertion_removes_old_insertion) {
                    change += delta;
                    executed.push(op.clone());
                }
            }
        }
        self.adjust_data_items(change);
        Ok(executed)
    }

    /// Moves all entries of `other` (a node of the same level) into this
    /// node. Update leaves annihilate matching pairs on the way.
    pub fn add_entries_from(&mut self, other: TreeNode<E, V>) -> RRTreeResult<()> {
        if other.level() != self.level() {
            return Err(RRTreeError::invariant(format!(
                "cannot merge a level {} node into a level {} node",
                other.level(),
                self.level()
            )));
        }
        let change = match (&mut *self.node, other) {
            (Node::Leaf { entries }, Node::Leaf { entries: others }) => {
                V::add_entries_from(entries, others)
            }
            (Node::Index { children, .. }, Node::Index { children: others, .. }) => {
                children.extend(others);
                0
            }
            _ => return Err(RRTreeError::invariant("cannot merge a leaf with an index node")),
        };
        self.adjust_data_items(change);
        Ok(())
    }

    /// Builds the entry hash index for a batch of size queries. The index
    /// lives exactly as long as the returned guard.
    pub fn index_entries(&mut self) -> IndexedNode<'_, 'a, E, V> {
        let index = EntryIndex::build(self.node.leaf_entries());
        IndexedNode { node: self, index }
    }

    fn leaf_entries_mut(&mut self) -> RRTreeResult<&mut Vec<V::Leaf>> {
        match &mut *self.node {
            Node::Leaf { entries } => Ok(entries),
            Node::Index { level, .. } => Err(RRTreeError::invariant(format!(
                "leaf operation on an index node at level {}",
                level
            ))),
        }
    }

    fn adjust_data_items(&mut self, change: isize) {
        if change == 0 {
            return;
        }
        *self.data_items = self.data_items.saturating_add_signed(change);
    }
}

/// A bound node together with a hash index of its entries.
pub struct IndexedNode<'g, 'a, E: DataItem, V: TreeVariant<E>> {
    node: &'g mut NodeMut<'a, E, V>,
    index: EntryIndex<V::Leaf>,
}

impl<E: DataItem, V: TreeVariant<E>> IndexedNode<'_, '_, E, V> {
    pub fn node(&self) -> &NodeMut<'_, E, V> {
        self.node
    }

    /// Answered from the index, without touching the node.
    pub fn operation_will_increase_node_size(&self, op: &Operation<E>) -> bool {
        V::operation_will_increase_node_size(&self.index, op)
    }

    pub fn limit_number_of_operations(&self, info: &mut LeafPiggybackingInfo) {
        self.node.limit_number_of_operations(info)
    }

    /// Applies candidates in order until `max_insertions` size-increasing
    /// and `max_deletions` size-decreasing operations have been executed.
    pub fn execute_constrained_subset_of_ops(
        &mut self,
        candidates: &[Operation<E>],
        max_insertions: usize,
        max_deletions: usize,
    ) -> RRTreeResult<Vec<Operation<E>>> {
        let (executed, change) = {
            let entries = self.node.leaf_entries_mut()?;
            V::execute_constrained_subset_of_ops(
                entries,
                &self.index,
                candidates,
                max_insertions,
                max_deletions,
            )?
        };
        self.node.adjust_data_items(change);
        Ok(executed)
    }
}
