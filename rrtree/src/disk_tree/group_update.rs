//! Applying operations directly to the tree.
//!
//! Each operation descends to a leaf, is executed there, and the path is
//! repaired bottom-up: overflowing nodes are split, underflowing ones are
//! merged into a sibling, emptied ones are released. The root is finished
//! with `grow_tree`.

use std::slice;

use super::engine::DiskTree;
use super::node::{choose_subtree, IndexEntry, Node, TreeNode};
use super::variant::TreeVariant;
use crate::container::Container;
use crate::data::{DataItem, Operation};
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;
use crate::split::GroupSplitter;
use crate::tracer::TracePoint;

impl<E, V, C> DiskTree<E, V, C>
where
    E: DataItem,
    V: TreeVariant<E>,
    C: Container<TreeNode<E, V>>,
{
    /// Applies `operations` in order. Returns the operations that could not
    /// be executed, i.e. data-tree deletions of items that are not stored.
    pub fn apply_operations<I, S>(
        &mut self,
        operations: I,
        splitter: &S,
    ) -> RRTreeResult<Vec<Operation<E>>>
    where
        I: IntoIterator<Item = Operation<E>>,
        S: GroupSplitter<E, V> + ?Sized,
    {
        let mut rejected = Vec::new();
        let mut applied = 0usize;
        for op in operations {
            self.tracer.trace_operation(&op, TracePoint::GroupUpdate);
            if self.apply_operation(&op, splitter)? {
                applied += 1;
            } else {
                rejected.push(op);
            }
        }
        log::debug!(
            "Group update on {} tree: {} applied, {} rejected, height {}",
            V::NAME,
            applied,
            rejected.len(),
            self.height()
        );
        Ok(rejected)
    }

    fn apply_operation<S>(&mut self, op: &Operation<E>, splitter: &S) -> RRTreeResult<bool>
    where
        S: GroupSplitter<E, V> + ?Sized,
    {
        let Some(mut root_entry) = self.root_entry.clone() else {
            if op.is_deletion() && !V::DELETIONS_LIKE_INSERTIONS {
                return Ok(false);
            }
            let mut leaf = Node::new_leaf();
            let executed = self.bind(&mut leaf).execute_ops(slice::from_ref(op), false)?;
            if executed.is_empty() {
                return Ok(false);
            }
            self.set_new_root_node(leaf)?;
            return Ok(true);
        };

        let height = self.height();
        let mut root = self.fetch_node(&root_entry)?;
        let applied = if V::DELETIONS_LIKE_INSERTIONS {
            // cancel against a stored opposite first, wherever it sits
            self.update_subtree(&mut root, op, Descent::Counterpart, splitter)?
                || self.update_subtree(&mut root, op, Descent::Chosen, splitter)?
        } else if op.is_deletion() {
            self.update_subtree(&mut root, op, Descent::Counterpart, splitter)?
        } else {
            self.update_subtree(&mut root, op, Descent::Chosen, splitter)?
        };
        if !applied {
            return Ok(false);
        }

        while !root.is_leaf() && root.len() == 1 {
            let child = root.children()[0].clone();
            log::debug!("Root {} has a single child, {} becomes the root", root_entry.key, child.key);
            self.container.remove(root_entry.key)?;
            root = self.fetch_node(&child)?;
            self.root_entry = Some(child.clone());
            root_entry = child;
        }
        self.refresh_fixed_nodes(height)?;

        let pieces = splitter.group_split(root, &self.config)?;
        self.grow_tree(pieces, Some(0), splitter)?;
        Ok(true)
    }

    /// Executes `op` in the subtree below `node`. On success `node` holds
    /// the repaired entries but has not been written; on failure it is
    /// untouched.
    fn update_subtree<S>(
        &mut self,
        node: &mut TreeNode<E, V>,
        op: &Operation<E>,
        descent: Descent,
        splitter: &S,
    ) -> RRTreeResult<bool>
    where
        S: GroupSplitter<E, V> + ?Sized,
    {
        if node.is_leaf() {
            if descent == Descent::Counterpart && !V::holds_counterpart(node.leaf_entries(), op) {
                return Ok(false);
            }
            let executed = self.bind(node).execute_ops(slice::from_ref(op), false)?;
            return Ok(!executed.is_empty());
        }

        let descriptor = op.descriptor();
        let candidates: Vec<usize> = if descent == Descent::Counterpart {
            // the counterpart may be below any child covering it
            node.children()
                .iter()
                .enumerate()
                .filter(|(_, child)| child.descriptor.contains(&descriptor))
                .map(|(position, _)| position)
                .collect()
        } else {
            node.choose_subtree(&descriptor).into_iter().collect()
        };

        for position in candidates {
            let child_entry = node.children()[position].clone();
            let mut child = self.fetch_node(&child_entry)?;
            if self.update_subtree(&mut child, op, descent, splitter)? {
                self.integrate_child(node, position, child_entry, child, splitter)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Replaces the entry at `position` of `parent` by the entries of the
    /// modified `child`.
    fn integrate_child<S>(
        &mut self,
        parent: &mut TreeNode<E, V>,
        position: usize,
        child_entry: IndexEntry<E::Desc>,
        child: TreeNode<E, V>,
        splitter: &S,
    ) -> RRTreeResult<()>
    where
        S: GroupSplitter<E, V> + ?Sized,
    {
        let config = self.config;
        let children = parent
            .children_mut()
            .ok_or_else(|| RRTreeError::invariant("integrating a child into a leaf"))?;
        children.remove(position);

        if child.is_empty() {
            self.container.remove(child_entry.key)?;
            return Ok(());
        }

        if child.underflows(&config) && !children.is_empty() {
            let descriptor = Self::node_descriptor(&child)
                .ok_or_else(|| RRTreeError::invariant("non-empty node without descriptor"))?;
            let sibling_position = choose_subtree(children, &descriptor).unwrap_or(0);
            let sibling_entry = children.remove(sibling_position);
            let mut sibling = self.fetch_node(&sibling_entry)?;
            self.container.remove(child_entry.key)?;
            self.bind(&mut sibling).add_entries_from(child)?;
            log::trace!("Merged underflowing node {} into {}", child_entry.key, sibling_entry.key);

            let pieces = splitter.group_split(sibling, &config)?;
            let entries = self.store_nodes(pieces, Some((&sibling_entry, 0)))?;
            push_entries(parent, entries)?;
            return Ok(());
        }

        let pieces = splitter.group_split(child, &config)?;
        let entries = self.store_nodes(pieces, Some((&child_entry, 0)))?;
        push_entries(parent, entries)
    }
}

/// How an operation looks for its leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descent {
    /// Every covering child, accepting only a leaf that holds what the
    /// operation cancels.
    Counterpart,
    /// The single child picked by `choose_subtree`.
    Chosen,
}

fn push_entries<L, D: Descriptor>(
    parent: &mut Node<L, D>,
    entries: Vec<IndexEntry<D>>,
) -> RRTreeResult<()> {
    parent
        .children_mut()
        .ok_or_else(|| RRTreeError::invariant("adding index entries to a leaf"))?
        .extend(entries);
    Ok(())
}
