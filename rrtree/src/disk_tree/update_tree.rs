//! Update-tree leaves: leaves hold insertion and deletion operations, and a
//! pair of opposite operations on the same item annihilates.

use indexmap::IndexMap;

use super::engine::DiskTree;
use super::node::EntryIndex;
use super::variant::TreeVariant;
use crate::data::{DataItem, Operation};
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;
use crate::tracer::{ObjectTracer, TracePoint};

/// Leaf variant storing operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateLeaves;

/// Disk tree whose leaves hold buffered operations.
pub type DiskUpdateTree<E, C> = DiskTree<E, UpdateLeaves, C>;

impl<E: DataItem> TreeVariant<E> for UpdateLeaves {
    type Leaf = Operation<E>;
    type Pending = IndexMap<E::Id, Vec<Operation<E>>>;

    const DELETIONS_LIKE_INSERTIONS: bool = true;
    const NAME: &'static str = "update";

    fn leaf_descriptor(leaf: &Operation<E>) -> E::Desc {
        leaf.descriptor()
    }

    fn does_operation_fit(
        _entries: &[Operation<E>],
        descriptor: Option<&E::Desc>,
        op: &Operation<E>,
        outside_mbr_allowed: bool,
    ) -> bool {
        outside_mbr_allowed || descriptor.is_some_and(|d| d.contains(&op.descriptor()))
    }

    /// The index is built before a batch and not refreshed while it runs.
    fn operation_will_increase_node_size(
        index: &EntryIndex<Operation<E>>,
        op: &Operation<E>,
    ) -> bool {
        !index.contains(&op.make_opposite())
    }

    fn holds_counterpart(entries: &[Operation<E>], op: &Operation<E>) -> bool {
        entries.contains(&op.make_opposite())
    }

    fn execute_op(
        entries: &mut Vec<Operation<E>>,
        op: &Operation<E>,
        _insertion_removes_old_insertion: bool,
    ) -> Option<isize> {
        let opposite = op.make_opposite();
        match entries.iter().position(|e| *e == opposite) {
            Some(position) => {
                entries.remove(position);
                Some(-1)
            }
            None => {
                entries.push(op.clone());
                Some(1)
            }
        }
    }

    fn execute_constrained_subset_of_ops(
        entries: &mut Vec<Operation<E>>,
        index: &EntryIndex<Operation<E>>,
        candidates: &[Operation<E>],
        mut max_insertions: usize,
        mut max_deletions: usize,
    ) -> RRTreeResult<(Vec<Operation<E>>, isize)> {
        let mut executed = Vec::new();
        let mut change = 0isize;
        for op in candidates {
            if Self::operation_will_increase_node_size(index, op) {
                if max_insertions > 0 {
                    entries.push(op.clone());
                    max_insertions -= 1;
                    change += 1;
                    executed.push(op.clone());
                }
            } else if max_deletions > 0 {
                let opposite = op.make_opposite();
                let position = entries.iter().position(|e| *e == opposite).ok_or_else(|| {
                    RRTreeError::invariant(format!(
                        "piggybacked {:?} of {:?} finds nothing to annihilate",
                        op.kind, op.data
                    ))
                })?;
                entries.remove(position);
                max_deletions -= 1;
                change -= 1;
                executed.push(op.clone());
            }
            if max_insertions == 0 && max_deletions == 0 {
                break;
            }
        }
        Ok((executed, change))
    }

    fn add_entries_from(entries: &mut Vec<Operation<E>>, others: Vec<Operation<E>>) -> isize {
        let mut change = 0isize;
        for other in others {
            match entries.iter().position(|e| e.annihilates(&other)) {
                Some(position) => {
                    entries.remove(position);
                    change -= 2;
                }
                None => entries.push(other),
            }
        }
        change
    }

    fn do_entries_annihilate(a: &Operation<E>, b: &Operation<E>) -> bool {
        a.annihilates(b)
    }

    fn collect_disk_results(
        results: Vec<Operation<E>>,
        tracer: &dyn ObjectTracer<E>,
    ) -> RRTreeResult<Self::Pending> {
        let mut by_id: IndexMap<E::Id, Vec<Operation<E>>> = IndexMap::new();
        for op in results {
            tracer.trace_operation(&op, TracePoint::UpdateQueryInitialResult);
            merge_into_group(by_id.entry(op.id()).or_default(), op);
        }
        Ok(by_id)
    }

    fn reconcile(
        mut pending: Self::Pending,
        external: Vec<Operation<E>>,
        tracer: &dyn ObjectTracer<E>,
    ) -> RRTreeResult<Vec<E>> {
        for op in external {
            tracer.trace_operation(&op, TracePoint::UpdateQueryExternalResult);
            merge_into_group(pending.entry(op.id()).or_default(), op);
        }

        let mut results = Vec::with_capacity(pending.len());
        for (_, mut group) in pending {
            if group.len() > 1 {
                return Err(RRTreeError::invariant(format!(
                    "Unannihilated query results: {:?}",
                    group
                )));
            }
            match group.pop() {
                Some(op) if op.is_insertion() => {
                    tracer.trace_object(&op.data, TracePoint::UpdateQueryFinalResult);
                    results.push(op.data);
                }
                Some(op) => {
                    log::debug!("Dropping unmatched deletion {:?} from query results", op.data);
                }
                None => {}
            }
        }
        Ok(results)
    }
}

/// Cancels `op` against an annihilating member of `group`, or adds it.
fn merge_into_group<E: DataItem>(group: &mut Vec<Operation<E>>, op: Operation<E>) {
    match group.iter().position(|other| other.annihilates(&op)) {
        Some(position) => {
            group.remove(position);
        }
        None => group.push(op),
    }
}
