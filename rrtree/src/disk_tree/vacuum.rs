//! Garbage vacuuming for update trees.
//!
//! An insertion and the deletion of the same item can end up in two leaves
//! whose regions overlap. A vacuum pass visits every leaf once, cancels such
//! pairs against the leaves overlapping it and piggybacks the buffered
//! operations its region covers. Leaves are cleaned in place: no node is
//! split, merged or re-described, so index entries stay valid.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use super::engine::DiskTree;
use super::node::{IndexEntry, Node, TreeNode};
use super::update_tree::UpdateLeaves;
use super::variant::TreeVariant;
use super::visit::IndexNodeCache;
use crate::container::{Container, NodeKey};
use crate::data::{DataItem, Operation};
use crate::errors::RRTreeResult;
use crate::geometry::Descriptor;
use crate::piggyback::{OperationBuffer, OperationTypeStat};
use crate::tracer::TracePoint;

type UpdateNode<E> = TreeNode<E, UpdateLeaves>;

/// Outcome of `DiskTree::vacuum_garbage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VacuumStats {
    pub leaves_cleaned: usize,
    /// Opposite operations found in two different leaves.
    pub annihilated_pairs: usize,
    /// Buffered operations moved into leaves.
    pub piggybacked: OperationTypeStat,
    /// Most leaves held in memory at the same time.
    pub peak_loaded_leaves: usize,
}

impl<E, C> DiskTree<E, UpdateLeaves, C>
where
    E: DataItem,
    C: Container<UpdateNode<E>>,
{
    /// Cancels opposite operations stored in different leaves, then drains
    /// from `buffer` what each leaf can take.
    ///
    /// A leaf is loaded once and kept in memory until its own turn, so a
    /// leaf overlapping many others may hold several of them at once.
    pub fn vacuum_garbage<B>(
        &mut self,
        buffer: &mut B,
        mut index_cache: Option<&mut IndexNodeCache<UpdateNode<E>>>,
    ) -> RRTreeResult<VacuumStats>
    where
        B: OperationBuffer<E>,
    {
        let mut stats = VacuumStats::default();
        let mut leaves = Vec::new();
        self.visit_tree(
            index_cache.as_deref_mut(),
            |_, _| Ok(true),
            |entry, _| {
                leaves.push(entry.clone());
                Ok(())
            },
        )?;

        let mut in_progress: HashMap<NodeKey, UpdateNode<E>> = HashMap::new();
        let mut cleaned: HashSet<NodeKey> = HashSet::new();
        for entry in leaves {
            let intersecting =
                self.fetch_intersecting_leaf_node_ids(index_cache.as_deref_mut(), &entry.descriptor)?;
            let mut node = match in_progress.remove(&entry.key) {
                Some(node) => node,
                None => self.container.get(entry.key, true)?,
            };

            for key in intersecting {
                if key == entry.key || cleaned.contains(&key) {
                    continue;
                }
                let other = match in_progress.entry(key) {
                    Entry::Occupied(occupied) => occupied.into_mut(),
                    Entry::Vacant(vacant) => vacant.insert(self.container.get(key, true)?),
                };
                let pairs = cancel_pairs(&mut node, other);
                stats.annihilated_pairs += pairs;
                self.data_items = self.data_items.saturating_sub(2 * pairs);
                stats.peak_loaded_leaves = stats.peak_loaded_leaves.max(in_progress.len() + 1);
            }
            stats.peak_loaded_leaves = stats.peak_loaded_leaves.max(1);

            self.piggyback_buffered(&entry, &mut node, buffer, &mut stats.piggybacked)?;
            self.write_back_leaf(&entry, node)?;
            cleaned.insert(entry.key);
            stats.leaves_cleaned += 1;
        }

        log::debug!(
            "Vacuumed {} leaves: {} pairs annihilated, {} buffered operations piggybacked, peak {} leaves loaded",
            stats.leaves_cleaned,
            stats.annihilated_pairs,
            stats.piggybacked.total(),
            stats.peak_loaded_leaves
        );
        Ok(stats)
    }

    /// Executes the buffered operations overlapping a non-empty leaf:
    /// every one that annihilates, then contained insertions while the leaf
    /// has room.
    fn piggyback_buffered<B: OperationBuffer<E>>(
        &mut self,
        entry: &IndexEntry<E::Desc>,
        node: &mut UpdateNode<E>,
        buffer: &mut B,
        stats: &mut OperationTypeStat,
    ) -> RRTreeResult<()> {
        if node.is_empty() {
            return Ok(());
        }
        let candidates = buffer.query_operations(&entry.descriptor);
        if candidates.is_empty() {
            return Ok(());
        }

        let max = self.config.max_node_capacity;
        let tracer = self.tracer();
        let mut applied: Vec<Operation<E>> = Vec::new();
        let mut insertions = Vec::new();
        let mut bound = self.bind(node);
        for op in candidates {
            if <UpdateLeaves as TreeVariant<E>>::holds_counterpart(bound.node().leaf_entries(), &op) {
                applied.extend(bound.execute_ops(std::slice::from_ref(&op), false)?);
            } else if op.is_insertion() && entry.descriptor.contains(&op.descriptor()) {
                insertions.push(op);
            }
        }
        let room = max.saturating_sub(bound.len());
        for op in insertions.into_iter().take(room) {
            applied.extend(bound.execute_ops(std::slice::from_ref(&op), false)?);
        }

        for op in &applied {
            tracer.trace_operation(op, TracePoint::LeafNodePiggybacking);
            stats.register(op);
            buffer.remove_exact(op);
        }
        Ok(())
    }

    fn write_back_leaf(&mut self, entry: &IndexEntry<E::Desc>, node: UpdateNode<E>) -> RRTreeResult<()> {
        let is_root = self.root_entry.as_ref().is_some_and(|root| root.key == entry.key);
        if is_root && node.is_empty() {
            // an empty root leaf empties the tree
            return self.set_new_root_node(node);
        }
        self.update_node(entry, node)
    }
}

/// Removes every operation of `other` that annihilates one of `node`,
/// together with its partner. Returns the number of removed pairs.
fn cancel_pairs<E: DataItem>(node: &mut UpdateNode<E>, other: &mut UpdateNode<E>) -> usize {
    let (Node::Leaf { entries }, Node::Leaf { entries: others }) = (node, other) else {
        return 0;
    };
    let before = others.len();
    others.retain(|op| match entries.iter().position(|e| e.annihilates(op)) {
        Some(position) => {
            entries.remove(position);
            false
        }
        None => true,
    });
    before - others.len()
}
