//! Keyed node stores ("containers") the disk tree keeps its nodes in.
//!
//! The tree never holds node references: every access goes through a
//! container by `NodeKey`, and each access carries a hint telling the
//! container whether the node may be evicted from its cache.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::RRTreeResult;

mod cache;
mod file;
mod memory;
mod storage;

pub use cache::{CachedPage, PageCache};
pub use file::FileContainer;
pub use memory::MemoryContainer;
pub use storage::{FileHeader, PageRecord, PageStorage};

/// Opaque handle of a node inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Access counters kept by every container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub inserts: u64,
    pub gets: u64,
    pub updates: u64,
    pub removes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

/// A keyed object store with cache hints.
///
/// `evictable == false` asks the container to keep the node resident
/// ("fixed"); `true` makes it eligible for eviction again.
pub trait Container<N> {
    fn insert(&mut self, node: N, evictable: bool) -> RRTreeResult<NodeKey>;

    /// Materialises a copy of the node stored under `key`.
    fn get(&mut self, key: NodeKey, evictable: bool) -> RRTreeResult<N>;

    /// Overwrites the node stored under `key`, keeping the key.
    fn update(&mut self, key: NodeKey, node: N, evictable: bool) -> RRTreeResult<()>;

    fn remove(&mut self, key: NodeKey) -> RRTreeResult<()>;

    fn contains(&self, key: NodeKey) -> bool;

    /// Number of stored nodes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> ContainerStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_key_display() {
        assert_eq!(NodeKey(42).to_string(), "#42");
    }

    #[test]
    fn test_node_key_ordering() {
        let mut keys = vec![NodeKey(3), NodeKey(1), NodeKey(2)];
        keys.sort();
        assert_eq!(keys, vec![NodeKey(1), NodeKey(2), NodeKey(3)]);
    }
}
