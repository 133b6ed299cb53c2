//! In-memory container: a hash-map arena with access counters.

use std::collections::{HashMap, HashSet};

use super::{Container, ContainerStats, NodeKey};
use crate::errors::{RRTreeError, RRTreeResult};

/// Keeps nodes in a `HashMap`, counting every access.
///
/// Nothing is ever evicted; the cache hints are recorded so callers can
/// observe which nodes the tree asked to keep fixed.
#[derive(Debug)]
pub struct MemoryContainer<N> {
    nodes: HashMap<NodeKey, N>,
    fixed: HashSet<NodeKey>,
    next_key: u64,
    stats: ContainerStats,
}

impl<N> MemoryContainer<N> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            fixed: HashSet::new(),
            next_key: 1,
            stats: ContainerStats::default(),
        }
    }

    /// True if the last access to `key` asked for the node to stay resident.
    pub fn is_fixed(&self, key: NodeKey) -> bool {
        self.fixed.contains(&key)
    }

    pub fn fixed_count(&self) -> usize {
        self.fixed.len()
    }

    pub fn reset_stats(&mut self) {
        self.stats = ContainerStats::default();
    }

    fn record_hint(&mut self, key: NodeKey, evictable: bool) {
        if evictable {
            self.fixed.remove(&key);
        } else {
            self.fixed.insert(key);
        }
    }
}

impl<N> Default for MemoryContainer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Clone> Container<N> for MemoryContainer<N> {
    fn insert(&mut self, node: N, evictable: bool) -> RRTreeResult<NodeKey> {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        self.nodes.insert(key, node);
        self.record_hint(key, evictable);
        self.stats.inserts += 1;
        Ok(key)
    }

    fn get(&mut self, key: NodeKey, evictable: bool) -> RRTreeResult<N> {
        let node = self
            .nodes
            .get(&key)
            .cloned()
            .ok_or(RRTreeError::NodeNotFound(key))?;
        self.record_hint(key, evictable);
        self.stats.gets += 1;
        Ok(node)
    }

    fn update(&mut self, key: NodeKey, node: N, evictable: bool) -> RRTreeResult<()> {
        match self.nodes.get_mut(&key) {
            Some(slot) => *slot = node,
            None => return Err(RRTreeError::NodeNotFound(key)),
        }
        self.record_hint(key, evictable);
        self.stats.updates += 1;
        Ok(())
    }

    fn remove(&mut self, key: NodeKey) -> RRTreeResult<()> {
        self.nodes
            .remove(&key)
            .ok_or(RRTreeError::NodeNotFound(key))?;
        self.fixed.remove(&key);
        self.stats.removes += 1;
        Ok(())
    }

    fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn stats(&self) -> ContainerStats {
        self.stats
    }
}
