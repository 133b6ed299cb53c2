use super::node::{IndexEntry, Node};
use crate::geometry::Descriptor;

/// Decides which nodes the container should keep resident.
///
/// The children of the root stay fixed; every other node may be evicted.
/// The strategy is a snapshot of the height it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachingStrategy {
    height: u32,
}

impl CachingStrategy {
    pub fn new(height: u32) -> Self {
        Self { height }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn should_be_fixed<D>(&self, entry: &IndexEntry<D>) -> bool {
        self.should_fix_entry_level(entry.level)
    }

    /// Same decision for a node that has no entry yet.
    pub fn should_fix_node<L, D: Descriptor>(&self, node: &Node<L, D>) -> bool {
        self.should_fix_entry_level(node.level() + 1)
    }

    /// Container hint for an access through `entry`.
    pub fn evictable<D>(&self, entry: &IndexEntry<D>) -> bool {
        !self.should_be_fixed(entry)
    }

    fn should_fix_entry_level(&self, entry_level: u32) -> bool {
        self.height == entry_level + 1
    }
}
