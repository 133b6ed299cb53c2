//! Data-tree leaves: leaves hold the data items themselves.

use indexmap::IndexMap;

use super::engine::DiskTree;
use super::node::EntryIndex;
use super::variant::TreeVariant;
use crate::data::{DataItem, Operation};
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;
use crate::tracer::{ObjectTracer, TracePoint};

/// Leaf variant storing data items. A deletion removes its item.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataLeaves;

/// Disk tree whose leaves hold data items.
pub type DiskDataTree<E, C> = DiskTree<E, DataLeaves, C>;

impl<E: DataItem> TreeVariant<E> for DataLeaves {
    type Leaf = E;
    type Pending = IndexMap<E::Id, Vec<E>>;

    const DELETIONS_LIKE_INSERTIONS: bool = false;
    const NAME: &'static str = "data";

    fn leaf_descriptor(leaf: &E) -> E::Desc {
        leaf.descriptor()
    }

    fn does_operation_fit(
        entries: &[E],
        descriptor: Option<&E::Desc>,
        op: &Operation<E>,
        outside_mbr_allowed: bool,
    ) -> bool {
        if op.is_deletion() {
            return entries.contains(&op.data);
        }
        outside_mbr_allowed || descriptor.is_some_and(|d| d.contains(&op.descriptor()))
    }

    fn operation_will_increase_node_size(_index: &EntryIndex<E>, op: &Operation<E>) -> bool {
        op.is_insertion()
    }

    fn holds_counterpart(entries: &[E], op: &Operation<E>) -> bool {
        op.is_deletion() && entries.contains(&op.data)
    }

    fn execute_op(
        entries: &mut Vec<E>,
        op: &Operation<E>,
        insertion_removes_old_insertion: bool,
    ) -> Option<isize> {
        if op.is_deletion() {
            let position = entries.iter().position(|e| *e == op.data)?;
            entries.remove(position);
            return Some(-1);
        }
        entries.push(op.data.clone());
        if insertion_removes_old_insertion {
            // the oldest entry goes, which is the new one in an empty leaf
            entries.remove(0);
            return Some(0);
        }
        Some(1)
    }

    fn execute_constrained_subset_of_ops(
        entries: &mut Vec<E>,
        _index: &EntryIndex<E>,
        candidates: &[Operation<E>],
        mut max_insertions: usize,
        mut max_deletions: usize,
    ) -> RRTreeResult<(Vec<Operation<E>>, isize)> {
        let mut executed = Vec::new();
        let mut change = 0isize;
        for op in candidates {
            if max_insertions == 0 && max_deletions == 0 {
                break;
            }
            if op.is_deletion() {
                if max_deletions == 0 {
                    continue;
                }
                let position = entries
                    .iter()
                    .position(|e| *e == op.data)
                    .ok_or_else(|| {
                        RRTreeError::invariant(format!(
                            "piggybacked deletion of {:?} finds no item in the leaf",
                            op.data
                        ))
                    })?;
                entries.remove(position);
                max_deletions -= 1;
                change -= 1;
                executed.push(op.clone());
            } else if max_insertions > 0 && !entries.contains(&op.data) {
                entries.push(op.data.clone());
                max_insertions -= 1;
                change += 1;
                executed.push(op.clone());
            }
        }
        Ok((executed, change))
    }

    fn add_entries_from(entries: &mut Vec<E>, others: Vec<E>) -> isize {
        entries.extend(others);
        0
    }

    fn do_entries_annihilate(_a: &E, _b: &E) -> bool {
        false
    }

    fn collect_disk_results(
        results: Vec<E>,
        tracer: &dyn ObjectTracer<E>,
    ) -> RRTreeResult<Self::Pending> {
        let mut by_id: IndexMap<E::Id, Vec<E>> = IndexMap::new();
        for item in results {
            tracer.trace_object(&item, TracePoint::DataQueryDiskResult);
            by_id.entry(item.id()).or_default().push(item);
        }
        Ok(by_id)
    }

    fn reconcile(
        mut pending: Self::Pending,
        external: Vec<Operation<E>>,
        tracer: &dyn ObjectTracer<E>,
    ) -> RRTreeResult<Vec<E>> {
        let mut results = Vec::new();
        for op in external {
            tracer.trace_operation(&op, TracePoint::DataQueryBufferResult);
            if op.is_insertion() {
                results.push(op.data);
                continue;
            }
            let same_id = pending.get_mut(&op.id());
            let position = same_id
                .as_ref()
                .and_then(|items| items.iter().position(|item| *item == op.data));
            match (same_id, position) {
                (Some(items), Some(position)) => {
                    items.remove(position);
                }
                _ => {
                    return Err(RRTreeError::invariant(format!(
                        "buffered deletion of {:?} matches no disk result",
                        op.data
                    )))
                }
            }
        }

        for (id, mut items) in pending {
            if items.len() > 1 {
                return Err(RRTreeError::invariant(format!(
                    "{} disk results share id {:?}",
                    items.len(),
                    id
                )));
            }
            if let Some(item) = items.pop() {
                tracer.trace_object(&item, TracePoint::DataQueryFinalResult);
                results.push(item);
            }
        }
        Ok(results)
    }
}
