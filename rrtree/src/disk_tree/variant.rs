use std::fmt::Debug;
use std::hash::Hash;

use super::node::EntryIndex;
use crate::data::{DataItem, Operation};
use crate::errors::RRTreeResult;
use crate::tracer::ObjectTracer;

/// Leaf semantics of a disk tree.
///
/// The tree engine is shared; what a leaf stores, when an operation fits a
/// leaf and how query results are reconciled with the external buffer are
/// decided here. `DataLeaves` stores data items, `UpdateLeaves` stores the
/// operations themselves.
pub trait TreeVariant<E: DataItem>: Sized + 'static {
    type Leaf: Clone + Eq + Hash + Debug;

    /// Disk results grouped by item id, waiting for the external stream.
    type Pending;

    /// True if a deletion is stored in a leaf the same way an insertion is.
    const DELETIONS_LIKE_INSERTIONS: bool;

    const NAME: &'static str;

    fn leaf_descriptor(leaf: &Self::Leaf) -> E::Desc;

    /// True if `op` may be executed against a leaf holding `entries` with
    /// MBR `descriptor`. `outside_mbr_allowed` admits operations that
    /// would enlarge the leaf.
    fn does_operation_fit(
        entries: &[Self::Leaf],
        descriptor: Option<&E::Desc>,
        op: &Operation<E>,
        outside_mbr_allowed: bool,
    ) -> bool;

    fn operation_will_increase_node_size(index: &EntryIndex<Self::Leaf>, op: &Operation<E>) -> bool;

    /// True if `entries` hold what `op` cancels: the item of a deletion in
    /// a data leaf, the opposite operation in an update leaf.
    fn holds_counterpart(entries: &[Self::Leaf], op: &Operation<E>) -> bool;

    /// Executes `op` against a leaf. Returns the change in stored data
    /// items, or `None` if nothing was executed.
    fn execute_op(
        entries: &mut Vec<Self::Leaf>,
        op: &Operation<E>,
        insertion_removes_old_insertion: bool,
    ) -> Option<isize>;

    /// Executes candidates in order under the given caps. Returns the
    /// executed operations and the change in stored data items.
    fn execute_constrained_subset_of_ops(
        entries: &mut Vec<Self::Leaf>,
        index: &EntryIndex<Self::Leaf>,
        candidates: &[Operation<E>],
        max_insertions: usize,
        max_deletions: usize,
    ) -> RRTreeResult<(Vec<Operation<E>>, isize)>;

    /// Moves `others` into `entries`, returning the change in data items.
    fn add_entries_from(entries: &mut Vec<Self::Leaf>, others: Vec<Self::Leaf>) -> isize;

    fn do_entries_annihilate(a: &Self::Leaf, b: &Self::Leaf) -> bool;

    /// Groups the leaf entries found by the disk phase of a query.
    fn collect_disk_results(
        results: Vec<Self::Leaf>,
        tracer: &dyn ObjectTracer<E>,
    ) -> RRTreeResult<Self::Pending>;

    /// Combines grouped disk results with the external operations that
    /// overlap the query into the final answer.
    fn reconcile(
        pending: Self::Pending,
        external: Vec<Operation<E>>,
        tracer: &dyn ObjectTracer<E>,
    ) -> RRTreeResult<Vec<E>>;
}
