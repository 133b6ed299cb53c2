//! Top-down tree walks with subtree pruning.

use lru::LruCache;
use std::num::NonZeroUsize;

use super::caching::CachingStrategy;
use super::engine::DiskTree;
use super::node::{IndexEntry, TreeNode};
use super::variant::TreeVariant;
use crate::config::DiskTreeConfig;
use crate::constants::DEFAULT_INDEX_CACHE_NODES;
use crate::container::{Container, NodeKey};
use crate::data::DataItem;
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;

/// Intermediate buffer for index nodes fetched during a walk.
///
/// Only valid while the tree is not modified; call `clear` after any
/// update.
pub struct IndexNodeCache<N> {
    nodes: LruCache<NodeKey, N>,
    hits: u64,
    misses: u64,
}

impl<N: Clone> IndexNodeCache<N> {
    pub fn new(capacity: usize) -> RRTreeResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            RRTreeError::InvalidConfiguration("index node cache needs room for one node".into())
        })?;
        Ok(Self {
            nodes: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        })
    }

    /// Cache sized for `DEFAULT_INDEX_CACHE_NODES` index nodes.
    pub fn with_default_capacity() -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_INDEX_CACHE_NODES).unwrap_or(NonZeroUsize::MIN);
        Self {
            nodes: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    fn get_or_fetch<F>(&mut self, key: NodeKey, fetch: F) -> RRTreeResult<N>
    where
        F: FnOnce() -> RRTreeResult<N>,
    {
        if let Some(node) = self.nodes.get(&key) {
            self.hits += 1;
            return Ok(node.clone());
        }
        self.misses += 1;
        let node = fetch()?;
        self.nodes.put(key, node.clone());
        Ok(node)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

/// Snapshot of the tree handed to a `DiskTreeVisitor`.
#[derive(Debug, Clone)]
pub struct TreeInfo<D> {
    pub root_entry: Option<IndexEntry<D>>,
    pub height: u32,
    pub config: DiskTreeConfig,
}

impl<D> TreeInfo<D> {
    pub fn is_root(&self, entry: &IndexEntry<D>) -> bool {
        self.root_entry.as_ref().is_some_and(|root| root.key == entry.key)
    }
}

/// Receives every node of the tree, parents before children.
pub trait DiskTreeVisitor<E: DataItem, V: TreeVariant<E>> {
    fn visit_index_node(
        &mut self,
        tree: &TreeInfo<E::Desc>,
        entry: &IndexEntry<E::Desc>,
        node: &TreeNode<E, V>,
    ) -> RRTreeResult<()>;

    fn visit_leaf_node(
        &mut self,
        tree: &TreeInfo<E::Desc>,
        entry: &IndexEntry<E::Desc>,
        node: &TreeNode<E, V>,
    ) -> RRTreeResult<()>;

    fn finish_visiting(&mut self) -> RRTreeResult<()> {
        Ok(())
    }
}

/// Both callbacks of a walk. Kept in one value so that they can share
/// mutable state.
trait Walk<E: DataItem, V: TreeVariant<E>, C> {
    fn index(&mut self, entry: &IndexEntry<E::Desc>, node: &TreeNode<E, V>) -> RRTreeResult<bool>;

    fn leaf(&mut self, entry: &IndexEntry<E::Desc>, container: &mut C) -> RRTreeResult<()>;
}

struct FnWalk<I, L> {
    index: I,
    leaf: L,
}

impl<E, V, C, I, L> Walk<E, V, C> for FnWalk<I, L>
where
    E: DataItem,
    V: TreeVariant<E>,
    I: FnMut(&IndexEntry<E::Desc>, &TreeNode<E, V>) -> RRTreeResult<bool>,
    L: FnMut(&IndexEntry<E::Desc>, &mut C) -> RRTreeResult<()>,
{
    fn index(&mut self, entry: &IndexEntry<E::Desc>, node: &TreeNode<E, V>) -> RRTreeResult<bool> {
        (self.index)(entry, node)
    }

    fn leaf(&mut self, entry: &IndexEntry<E::Desc>, container: &mut C) -> RRTreeResult<()> {
        (self.leaf)(entry, container)
    }
}

struct VisitorWalk<'v, E: DataItem, V: TreeVariant<E>> {
    visitor: &'v mut dyn DiskTreeVisitor<E, V>,
    info: TreeInfo<E::Desc>,
}

impl<E, V, C> Walk<E, V, C> for VisitorWalk<'_, E, V>
where
    E: DataItem,
    V: TreeVariant<E>,
    C: Container<TreeNode<E, V>>,
{
    fn index(&mut self, entry: &IndexEntry<E::Desc>, node: &TreeNode<E, V>) -> RRTreeResult<bool> {
        self.visitor.visit_index_node(&self.info, entry, node)?;
        Ok(true)
    }

    fn leaf(&mut self, entry: &IndexEntry<E::Desc>, container: &mut C) -> RRTreeResult<()> {
        let evictable = CachingStrategy::new(self.info.height).evictable(entry);
        let node = container.get(entry.key, evictable)?;
        self.visitor.visit_leaf_node(&self.info, entry, &node)
    }
}

impl<E, V, C> DiskTree<E, V, C>
where
    E: DataItem,
    V: TreeVariant<E>,
    C: Container<TreeNode<E, V>>,
{
    /// Walks the tree top-down. `index_visit` sees every index node reached
    /// and returns false to skip its subtree; `leaf_visit` gets the entry of
    /// every leaf reached, and may fetch the leaf through the container.
    pub fn visit_tree<I, L>(
        &mut self,
        index_cache: Option<&mut IndexNodeCache<TreeNode<E, V>>>,
        index_visit: I,
        leaf_visit: L,
    ) -> RRTreeResult<()>
    where
        I: FnMut(&IndexEntry<E::Desc>, &TreeNode<E, V>) -> RRTreeResult<bool>,
        L: FnMut(&IndexEntry<E::Desc>, &mut C) -> RRTreeResult<()>,
    {
        let mut walk = FnWalk {
            index: index_visit,
            leaf: leaf_visit,
        };
        self.walk(index_cache, &mut walk)
    }

    /// Hands every node to `visitor`, then calls `finish_visiting`.
    pub fn visit_tree_nodes(
        &mut self,
        index_cache: Option<&mut IndexNodeCache<TreeNode<E, V>>>,
        visitor: &mut dyn DiskTreeVisitor<E, V>,
    ) -> RRTreeResult<()> {
        let info = TreeInfo {
            root_entry: self.root_entry.clone(),
            height: self.height(),
            config: self.config,
        };
        let mut walk = VisitorWalk { visitor, info };
        self.walk(index_cache, &mut walk)?;
        walk.visitor.finish_visiting()
    }

    /// Keys of the leaves whose entry descriptor overlaps `region`.
    pub fn fetch_intersecting_leaf_node_ids(
        &mut self,
        index_cache: Option<&mut IndexNodeCache<TreeNode<E, V>>>,
        region: &E::Desc,
    ) -> RRTreeResult<Vec<NodeKey>> {
        let mut keys = Vec::new();
        if !self.root_descriptor().is_some_and(|d| d.overlaps(region)) {
            return Ok(keys);
        }
        self.visit_tree(
            index_cache,
            |entry, _node| Ok(entry.descriptor.overlaps(region)),
            |entry, _container| {
                if entry.descriptor.overlaps(region) {
                    keys.push(entry.key);
                }
                Ok(())
            },
        )?;
        Ok(keys)
    }

    fn walk<W>(
        &mut self,
        mut index_cache: Option<&mut IndexNodeCache<TreeNode<E, V>>>,
        walk: &mut W,
    ) -> RRTreeResult<()>
    where
        W: Walk<E, V, C>,
    {
        let Some(root) = self.root_entry.clone() else {
            return Ok(());
        };

        let mut stack = vec![vec![root].into_iter()];
        loop {
            let next = match stack.last_mut() {
                Some(top) => top.next(),
                None => break,
            };
            let Some(entry) = next else {
                stack.pop();
                continue;
            };

            if entry.points_to_leaf() {
                walk.leaf(&entry, &mut self.container)?;
                continue;
            }

            let node = match index_cache.as_deref_mut() {
                Some(cache) => cache.get_or_fetch(entry.key, || self.fetch_node(&entry))?,
                None => self.fetch_node(&entry)?,
            };
            if walk.index(&entry, &node)? {
                stack.push(node.into_children().into_iter());
            }
        }
        Ok(())
    }
}
