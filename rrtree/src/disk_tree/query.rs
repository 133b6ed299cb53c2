//! Two-phase region queries.
//!
//! Phase one walks the tree with one cursor per level and yields every leaf
//! entry overlapping the query, running the leaf modifier on each leaf it
//! reads. Phase two hands the leaf entries to the variant, which reconciles
//! them with the buffered operations the caller supplies.

use std::collections::VecDeque;
use std::sync::Arc;

use super::engine::DiskTree;
use super::node::{IndexEntry, Node, TreeNode};
use super::variant::TreeVariant;
use crate::container::Container;
use crate::data::{DataItem, Operation};
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;
use crate::piggyback::{LeafNodeModifier, LeafPiggybackingInfo, NoopModifier, OperationTypeStat};
use crate::tracer::ObjectTracer;

impl<E, V, C> DiskTree<E, V, C>
where
    E: DataItem,
    V: TreeVariant<E>,
    C: Container<TreeNode<E, V>>,
{
    /// Answers a region query, letting `modifier` piggyback onto the leaves
    /// read. `external` produces the buffered operations overlapping the
    /// query; it runs after the modifier has been finalized, so operations
    /// applied to leaves are no longer part of it.
    pub fn rr_query<M, F>(
        &mut self,
        query: &E::Desc,
        modifier: &mut M,
        stats: &mut OperationTypeStat,
        external: F,
    ) -> RRTreeResult<Vec<E>>
    where
        M: LeafNodeModifier<E, V>,
        F: FnOnce(&M) -> Vec<Operation<E>>,
    {
        self.initial_query(query, modifier)
            .process_query_results(stats, external)
    }

    /// Region query without buffered operations or piggybacking.
    pub fn query(&mut self, query: &E::Desc) -> RRTreeResult<Vec<E>> {
        let mut stats = OperationTypeStat::default();
        self.rr_query(query, &mut NoopModifier, &mut stats, |_| Vec::new())
    }

    /// Phase one: a lazy walk over the leaf entries overlapping `query`.
    pub fn initial_query<'q, M>(
        &'q mut self,
        query: &E::Desc,
        modifier: &'q mut M,
    ) -> InitialQuery<'q, E, V, C, M>
    where
        M: LeafNodeModifier<E, V>,
    {
        InitialQuery::new(self, query.clone(), modifier)
    }
}

/// Cursor state of phase one.
///
/// `cursors[l]` holds the pending index entries of level `l`, and `leaves`
/// the pending entries of the current leaf. Once a node is fully contained
/// in the query, everything below it is taken without overlap tests; the
/// level where that started is kept in `query_all_level`.
pub struct InitialQuery<'q, E, V, C, M>
where
    E: DataItem,
    V: TreeVariant<E>,
{
    tree: &'q mut DiskTree<E, V, C>,
    modifier: &'q mut M,
    query: E::Desc,
    cursors: Vec<VecDeque<IndexEntry<E::Desc>>>,
    leaves: VecDeque<V::Leaf>,
    level: usize,
    height: usize,
    query_all_level: Option<usize>,
    finished: bool,
}

impl<'q, E, V, C, M> InitialQuery<'q, E, V, C, M>
where
    E: DataItem,
    V: TreeVariant<E>,
    C: Container<TreeNode<E, V>>,
    M: LeafNodeModifier<E, V>,
{
    fn new(tree: &'q mut DiskTree<E, V, C>, query: E::Desc, modifier: &'q mut M) -> Self {
        let height = tree.height() as usize;
        let mut cursors = vec![VecDeque::new(); height + 1];
        let mut finished = true;
        if let Some(root) = tree.root_entry() {
            if root.descriptor.overlaps(&query) {
                cursors[height].push_back(root.clone());
                finished = false;
            }
        }
        Self {
            tree,
            modifier,
            query,
            cursors,
            leaves: VecDeque::new(),
            level: height,
            height,
            query_all_level: None,
            finished,
        }
    }

    /// Phase two: drains the walk, finalizes the modifier, then reconciles
    /// the disk results with the operations `external` returns.
    pub fn process_query_results<F>(
        mut self,
        stats: &mut OperationTypeStat,
        external: F,
    ) -> RRTreeResult<Vec<E>>
    where
        F: FnOnce(&M) -> Vec<Operation<E>>,
    {
        let tracer: Arc<dyn ObjectTracer<E>> = self.tree.tracer();
        let disk = self.by_ref().collect::<RRTreeResult<Vec<_>>>()?;
        let found = disk.len();
        let pending = V::collect_disk_results(disk, tracer.as_ref())?;

        let modifier = self.into_modifier();
        modifier.finalize_modifications(stats);
        let external = external(&*modifier);
        log::trace!(
            "Reconciling {} disk results with {} buffered operations",
            found,
            external.len()
        );
        V::reconcile(pending, external, tracer.as_ref())
    }

    /// Ends the walk and releases the modifier.
    pub fn into_modifier(self) -> &'q mut M {
        self.modifier
    }

    fn descend(&mut self, entry: IndexEntry<E::Desc>) -> RRTreeResult<()> {
        let parent_level = self.level;
        let mut node = self.tree.fetch_node(&entry)?;
        if node.level() + 1 != entry.level {
            return Err(RRTreeError::invariant(format!(
                "entry of level {} references a level {} node",
                entry.level,
                node.level()
            )));
        }

        if node.is_leaf() {
            let mut info = LeafPiggybackingInfo::default();
            let modified = {
                let mut bound = self.tree.bind(&mut node);
                self.modifier.modify(&mut bound, false, 0.0, &mut info)?
            };
            if modified {
                self.tree.update_node(&entry, node.clone())?;
            }
        }

        let node_level = node.level() as usize;
        let take_all = self.query_all_level.is_some_and(|level| parent_level <= level)
            || self.query.contains(&entry.descriptor);
        if take_all
            && self.query_all_level.map_or(true, |level| parent_level > level)
            && self.is_level_exhausted(node_level)
        {
            self.query_all_level = Some(node_level);
        }

        let query = &self.query;
        match node {
            Node::Leaf { entries } => {
                let selected: VecDeque<_> = if take_all {
                    entries.into()
                } else {
                    entries
                        .into_iter()
                        .filter(|leaf| V::leaf_descriptor(leaf).overlaps(query))
                        .collect()
                };
                prepend(&mut self.leaves, selected);
            }
            Node::Index { children, .. } => {
                let selected: VecDeque<_> = if take_all {
                    children.into()
                } else {
                    children
                        .into_iter()
                        .filter(|child| child.descriptor.overlaps(query))
                        .collect()
                };
                prepend(&mut self.cursors[node_level], selected);
            }
        }
        self.level = node_level;
        Ok(())
    }

    fn is_level_exhausted(&self, level: usize) -> bool {
        if level == 0 {
            self.leaves.is_empty()
        } else {
            self.cursors[level].is_empty()
        }
    }
}

impl<E, V, C, M> Iterator for InitialQuery<'_, E, V, C, M>
where
    E: DataItem,
    V: TreeVariant<E>,
    C: Container<TreeNode<E, V>>,
    M: LeafNodeModifier<E, V>,
{
    type Item = RRTreeResult<V::Leaf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if self.level == 0 {
                if let Some(leaf) = self.leaves.pop_front() {
                    return Some(Ok(leaf));
                }
            } else if let Some(entry) = self.cursors[self.level].pop_front() {
                if let Err(e) = self.descend(entry) {
                    self.finished = true;
                    return Some(Err(e));
                }
                continue;
            }

            // current level exhausted
            if self.level >= self.height {
                self.finished = true;
                return None;
            }
            if self.query_all_level == Some(self.level) {
                self.query_all_level = None;
            }
            self.level += 1;
        }
    }
}

fn prepend<T>(pending: &mut VecDeque<T>, mut front: VecDeque<T>) {
    if pending.is_empty() {
        *pending = front;
    } else {
        front.append(pending);
        *pending = front;
    }
}
