//! Disk I/O and growth for the shared disk tree engine.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

use super::caching::CachingStrategy;
use super::node::{IndexEntry, Node, NodeMut, TreeNode};
use super::variant::TreeVariant;
use crate::config::DiskTreeConfig;
use crate::container::Container;
use crate::data::DataItem;
use crate::errors::{RRTreeError, RRTreeResult};
use crate::split::GroupSplitter;
use crate::tracer::{NoopTracer, ObjectTracer};

/// Persistent part of a tree handle. Together with the container it is
/// everything needed to reopen the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeState<D> {
    pub root_entry: Option<IndexEntry<D>>,
    pub data_items: u64,
}

/// Container accesses made by `DiskTree::clear`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearStats {
    pub gets: u64,
    pub removes: u64,
}

/// A disk-resident R-tree whose nodes live in a `Container`.
///
/// The handle owns the root entry and the item count; nodes are only
/// materialized while an operation works on them. Leaf semantics come from
/// the variant `V`.
pub struct DiskTree<E: DataItem, V: TreeVariant<E>, C> {
    pub(crate) container: C,
    pub(crate) config: DiskTreeConfig,
    pub(crate) root_entry: Option<IndexEntry<E::Desc>>,
    pub(crate) data_items: usize,
    pub(crate) tracer: Arc<dyn ObjectTracer<E>>,
    _variant: PhantomData<V>,
}

impl<E, V, C> DiskTree<E, V, C>
where
    E: DataItem,
    V: TreeVariant<E>,
    C: Container<TreeNode<E, V>>,
{
    /// Creates an empty tree on top of `container`.
    pub fn new(container: C, config: DiskTreeConfig) -> RRTreeResult<Self> {
        config.validate()?;
        Ok(Self {
            container,
            config,
            root_entry: None,
            data_items: 0,
            tracer: Arc::new(NoopTracer),
            _variant: PhantomData,
        })
    }

    /// Reattaches a tree to a container that already holds its nodes.
    pub fn from_state(
        container: C,
        config: DiskTreeConfig,
        state: TreeState<E::Desc>,
    ) -> RRTreeResult<Self> {
        let mut tree = Self::new(container, config)?;
        if let Some(root) = &state.root_entry {
            if !tree.container.contains(root.key) {
                return Err(RRTreeError::NodeNotFound(root.key));
            }
        }
        tree.root_entry = state.root_entry;
        tree.data_items = state.data_items as usize;
        log::debug!(
            "Reopened {} tree: height {}, {} data items",
            V::NAME,
            tree.height(),
            tree.data_items
        );
        Ok(tree)
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn ObjectTracer<E>>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn state(&self) -> TreeState<E::Desc> {
        TreeState {
            root_entry: self.root_entry.clone(),
            data_items: self.data_items as u64,
        }
    }

    pub fn config(&self) -> &DiskTreeConfig {
        &self.config
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut C {
        &mut self.container
    }

    pub fn into_container(self) -> C {
        self.container
    }

    pub fn tracer(&self) -> Arc<dyn ObjectTracer<E>> {
        Arc::clone(&self.tracer)
    }

    /// Number of data items (data tree) or stored operations (update tree).
    pub fn data_items(&self) -> usize {
        self.data_items
    }

    pub fn is_empty(&self) -> bool {
        self.root_entry.is_none()
    }

    pub fn root_entry(&self) -> Option<&IndexEntry<E::Desc>> {
        self.root_entry.as_ref()
    }

    pub fn root_descriptor(&self) -> Option<&E::Desc> {
        self.root_entry.as_ref().map(|entry| &entry.descriptor)
    }

    /// Root level plus one; 0 for an empty tree.
    pub fn height(&self) -> u32 {
        self.root_entry.as_ref().map_or(0, |entry| entry.level)
    }

    pub fn caching_strategy(&self) -> CachingStrategy {
        CachingStrategy::new(self.height())
    }

    /// Binds `node` to this tree's capacity bounds and item counter.
    pub fn bind<'n>(&'n mut self, node: &'n mut TreeNode<E, V>) -> NodeMut<'n, E, V> {
        NodeMut::new(node, self.config, &mut self.data_items)
    }

    pub fn node_descriptor(node: &TreeNode<E, V>) -> Option<E::Desc> {
        node.compute_descriptor_with(V::leaf_descriptor)
    }

    pub fn fetch_node(&mut self, entry: &IndexEntry<E::Desc>) -> RRTreeResult<TreeNode<E, V>> {
        let evictable = self.caching_strategy().evictable(entry);
        self.container.get(entry.key, evictable)
    }

    /// The root node, or a fresh empty leaf for an empty tree.
    pub fn get_root_node(&mut self) -> RRTreeResult<TreeNode<E, V>> {
        match self.root_entry.clone() {
            Some(entry) => self.fetch_node(&entry),
            None => Ok(Node::new_leaf()),
        }
    }

    /// Writes a modified node back to its slot without touching its entry.
    pub fn update_node(
        &mut self,
        entry: &IndexEntry<E::Desc>,
        node: TreeNode<E, V>,
    ) -> RRTreeResult<()> {
        let evictable = self.caching_strategy().evictable(entry);
        self.container.update(entry.key, node, evictable)
    }

    // ========================================================================
    // Disk I/O
    // ========================================================================

    /// Inserts `node` into the container. Returns `None` for an empty node.
    pub fn store_node(
        &mut self,
        node: TreeNode<E, V>,
        always_unfix: bool,
    ) -> RRTreeResult<Option<IndexEntry<E::Desc>>> {
        self.check_not_overflowing(&node)?;
        let Some(descriptor) = Self::node_descriptor(&node) else {
            return Ok(None);
        };
        let level = node.level() + 1;
        let evictable = always_unfix || !self.caching_strategy().should_fix_node(&node);
        let key = self.container.insert(node, evictable)?;
        Ok(Some(IndexEntry::new(descriptor, key, level)))
    }

    /// Overwrites the slot of `old` with `node`, keeping the key and
    /// recomputing the descriptor. An empty node releases the slot and
    /// yields `None`.
    pub fn take_over_node(
        &mut self,
        node: TreeNode<E, V>,
        old: &IndexEntry<E::Desc>,
        always_unfix: bool,
    ) -> RRTreeResult<Option<IndexEntry<E::Desc>>> {
        self.check_not_overflowing(&node)?;
        let Some(descriptor) = Self::node_descriptor(&node) else {
            self.container.remove(old.key)?;
            return Ok(None);
        };
        let level = node.level() + 1;
        let evictable = always_unfix || !self.caching_strategy().should_fix_node(&node);
        self.container.update(old.key, node, evictable)?;
        Ok(Some(IndexEntry::new(descriptor, old.key, level)))
    }

    /// Stores the nodes produced by a split. The node at the given position
    /// is the pre-split node and takes over its slot; the rest are new.
    /// Empty nodes produce no entry.
    pub fn store_nodes(
        &mut self,
        nodes: Vec<TreeNode<E, V>>,
        original: Option<(&IndexEntry<E::Desc>, usize)>,
    ) -> RRTreeResult<Vec<IndexEntry<E::Desc>>> {
        let count = nodes.len();
        let mut entries = Vec::with_capacity(count);
        for (position, node) in nodes.into_iter().enumerate() {
            let stored = match original {
                Some((entry, original_position)) if original_position == position => {
                    self.take_over_node(node, entry, true)?
                }
                _ => self.store_node(node, true)?,
            };
            entries.extend(stored);
        }
        if let Some((entry, position)) = original {
            if position >= count {
                self.container.remove(entry.key)?;
            }
        }
        Ok(entries)
    }

    // ========================================================================
    // Growth
    // ========================================================================

    /// Installs the nodes that replace the current root.
    ///
    /// `root_position` names the sibling that is the current root node, if
    /// any; otherwise the old root slot is released. While more than one
    /// sibling remains they are stored and wrapped in a new index node one
    /// level up, which is split again if needed.
    pub fn grow_tree<S>(
        &mut self,
        mut siblings: Vec<TreeNode<E, V>>,
        root_position: Option<usize>,
        splitter: &S,
    ) -> RRTreeResult<()>
    where
        S: GroupSplitter<E, V> + ?Sized,
    {
        let old_height = self.height();
        let mut original = None;
        if let Some(entry) = self.root_entry.take() {
            match root_position {
                Some(position) if position < siblings.len() => original = Some((entry, position)),
                _ => self.container.remove(entry.key)?,
            }
        }

        while siblings.len() > 1 {
            let level = siblings[0].level() + 1;
            let previous = original.take();
            let entries = self.store_nodes(
                siblings,
                previous.as_ref().map(|(entry, position)| (entry, *position)),
            )?;
            log::debug!("Growing {} tree to level {} over {} nodes", V::NAME, level, entries.len());
            siblings = splitter.group_split(Node::index(level, entries), &self.config)?;
        }

        if let Some((entry, _)) = original {
            self.root_entry = Some(entry);
        }
        match siblings.pop() {
            Some(top) => self.set_new_root_node(top)?,
            None => {
                if let Some(entry) = self.root_entry.take() {
                    self.container.remove(entry.key)?;
                }
            }
        }
        self.refresh_fixed_nodes(old_height)
    }

    /// Re-hints the container after the height changed from `old_height`.
    ///
    /// Nodes stored while the root was detached got a hint for the wrong
    /// height, and the level kept fixed moves with the root. Every entry
    /// down to the lower of the two fixed levels is fetched with the current
    /// strategy's hint.
    pub(crate) fn refresh_fixed_nodes(&mut self, old_height: u32) -> RRTreeResult<()> {
        let height = self.height();
        if height == old_height {
            return Ok(());
        }
        let Some(root) = self.root_entry.clone() else {
            return Ok(());
        };
        let old = CachingStrategy::new(old_height);
        let current = self.caching_strategy();
        let lowest = old_height.min(height).saturating_sub(1).max(1);

        let mut pending = vec![root];
        while let Some(entry) = pending.pop() {
            if entry.level <= lowest || entry.points_to_leaf() {
                if old.should_be_fixed(&entry) != current.should_be_fixed(&entry) {
                    self.container.get(entry.key, current.evictable(&entry))?;
                }
                continue;
            }
            let node = self.fetch_node(&entry)?;
            pending.extend(node.into_children());
        }
        log::debug!(
            "Moved the fixed level of the {} tree from height {} to {}",
            V::NAME,
            old_height,
            height
        );
        Ok(())
    }

    /// Makes `node` the root, reusing the current root slot if there is
    /// one. An empty node empties the tree.
    pub fn set_new_root_node(&mut self, node: TreeNode<E, V>) -> RRTreeResult<()> {
        self.root_entry = match self.root_entry.take() {
            Some(old) => self.take_over_node(node, &old, false)?,
            None => self.store_node(node, false)?,
        };
        Ok(())
    }

    /// Removes every node of the tree from the container. Only leaves are
    /// not fetched; nothing is written.
    pub fn clear(&mut self) -> RRTreeResult<ClearStats> {
        let mut stats = ClearStats::default();
        let Some(root) = self.root_entry.take() else {
            return Ok(stats);
        };

        let mut pending = vec![root];
        while let Some(entry) = pending.pop() {
            if !entry.points_to_leaf() {
                let node = self.container.get(entry.key, true)?;
                stats.gets += 1;
                pending.extend(node.into_children());
            }
            self.container.remove(entry.key)?;
            stats.removes += 1;
        }
        self.data_items = 0;
        log::debug!(
            "Cleared {} tree: {} gets, {} removes",
            V::NAME,
            stats.gets,
            stats.removes
        );
        Ok(stats)
    }

    fn check_not_overflowing(&self, node: &TreeNode<E, V>) -> RRTreeResult<()> {
        if node.overflows(&self.config) {
            return Err(RRTreeError::invariant(format!(
                "storing a level {} node with {} entries (max {})",
                node.level(),
                node.len(),
                self.config.max_node_capacity
            )));
        }
        Ok(())
    }
}
