//! # RR-tree - a disk-based R-tree with buffered updates
//!
//! This crate provides a disk-resident R-tree whose insertions and
//! deletions may be buffered outside the tree and applied lazily, when a
//! query happens to read the leaf an operation belongs to
//! ("piggybacking").
//!
//! ## Features
//!
//! - **Two leaf variants**: a data tree storing items and an update tree
//!   storing the pending operations themselves
//! - **Annihilation**: an insertion and a deletion of the same item cancel
//!   when they meet in a leaf
//! - **Pluggable storage**: nodes live in a `Container`, either in memory or
//!   in a paged file with an LRU page cache
//! - **Two-phase queries**: a disk phase reading the tree, reconciled with
//!   the operations still waiting in an external buffer
//! - **Tracing**: every object passing a query or update step can be traced
//!
//! ## Usage
//!
//! ```rust
//! use rrtree::{
//!     DataLeaves, DiskDataTree, DiskTreeConfig, LeafNodePiggybacker, MemoryContainer,
//!     Operation, OperationBuffer, OperationTypeStat, Rectangle, RecursiveTwoWaySplitter,
//!     SpatialObject, TreeNode,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let container = MemoryContainer::<TreeNode<SpatialObject, DataLeaves>>::new();
//! let mut tree: DiskDataTree<SpatialObject, _> = DiskDataTree::new(container, DiskTreeConfig::new(2, 8))?;
//!
//! // Build the tree directly
//! let items = (0..100).map(|i| {
//!     SpatialObject::new(i, Rectangle::interval(i as f64, i as f64 + 1.0))
//! });
//! tree.apply_operations(items.map(Operation::insertion), &RecursiveTwoWaySplitter)?;
//!
//! // Buffer further updates and let a query piggyback them
//! let mut buffer = vec![Operation::insertion(SpatialObject::new(
//!     1000,
//!     Rectangle::interval(10.2, 10.4),
//! ))];
//! let mut piggybacker = LeafNodePiggybacker::new(&mut buffer);
//! let mut stats = OperationTypeStat::default();
//! let query = Rectangle::interval(10.0, 11.0);
//! let results = tree.rr_query(&query, &mut piggybacker, &mut stats, |p| {
//!     p.buffer().query_operations(&query)
//! })?;
//! assert!(results.iter().any(|o| o.id == 1000));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod container;
pub mod data;
pub mod disk_tree;
pub mod errors;
pub mod geometry;
pub mod piggyback;
pub mod split;
pub mod tracer;

pub use config::{DiskTreeConfig, FileContainerConfig};
pub use container::{Container, ContainerStats, FileContainer, MemoryContainer, NodeKey};
pub use data::{DataItem, Operation, OperationKind, SpatialObject};
pub use disk_tree::{
    CachingStrategy, ClearStats, DataLeaves, DiskDataTree, DiskTree, DiskTreeVisitor,
    DiskUpdateTree, IndexEntry, IndexNodeCache, InvariantChecker, Node, TreeInfo, TreeNode,
    TreeState, TreeVariant, UpdateLeaves, VacuumStats,
};
pub use errors::{RRTreeError, RRTreeResult};
pub use geometry::{Descriptor, Rectangle};
pub use piggyback::{
    LeafNodeModifier, LeafNodePiggybacker, LeafPiggybackingInfo, NoopModifier, OperationBuffer,
    OperationTypeStat, UnpiggybackedStats,
};
pub use split::{GroupSplitter, RecursiveTwoWaySplitter};
pub use tracer::{LogTracer, NoopTracer, ObjectTracer, TraceClass, TracePoint};

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
