//! The disk-resident RR-tree.
//!
//! A single engine, `DiskTree`, is shared by both leaf variants:
//! - `DataLeaves`: leaves hold data items; the tree is the data store.
//! - `UpdateLeaves`: leaves hold pending operations; an insertion and a
//!   deletion of the same item annihilate when they meet in a leaf.
//!
//! Nodes live in a `Container` and are addressed by key only. Queries
//! descend from the root and hand every reached leaf to a
//! `LeafNodeModifier`, which may piggyback buffered operations onto it
//! before the leaf is scanned.

mod caching;
mod data_tree;
mod engine;
mod group_update;
mod invariants;
mod node;
mod query;
mod update_tree;
mod vacuum;
mod variant;
mod visit;

pub use caching::CachingStrategy;
pub use data_tree::{DataLeaves, DiskDataTree};
pub use engine::{ClearStats, DiskTree, TreeState};
pub use invariants::InvariantChecker;
pub use node::{choose_subtree, EntryIndex, IndexEntry, IndexedNode, Node, NodeMut, TreeNode};
pub use query::InitialQuery;
pub use update_tree::{DiskUpdateTree, UpdateLeaves};
pub use vacuum::VacuumStats;
pub use variant::TreeVariant;
pub use visit::{DiskTreeVisitor, IndexNodeCache, TreeInfo};
