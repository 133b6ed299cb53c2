//! Piggybacking buffered operations onto leaves visited by a query.
//!
//! A `LeafNodeModifier` is handed every leaf the disk phase of a query
//! reads. `LeafNodePiggybacker` applies the buffered operations that fit
//! such a leaf, limited so the leaf stays within its capacity bounds, and
//! removes the applied operations from the buffer once the query is done
//! with the tree.

use indexmap::IndexSet;
use std::sync::Arc;

use crate::data::{DataItem, Operation};
use crate::disk_tree::{NodeMut, TreeVariant};
use crate::errors::RRTreeResult;
use crate::geometry::Descriptor;
use crate::tracer::{NoopTracer, ObjectTracer, TracePoint};

// ============================================================================
// Statistics
// ============================================================================

/// Counts of operations by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationTypeStat {
    pub insertions: u64,
    pub deletions: u64,
}

impl OperationTypeStat {
    pub fn register<E: DataItem>(&mut self, op: &Operation<E>) {
        if op.is_insertion() {
            self.insertions += 1;
        } else {
            self.deletions += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.insertions + self.deletions
    }
}

/// Per-leaf tally of candidate operations by their effect on the leaf size.
///
/// Limiting moves candidates into the unpiggybackable buckets; what stays
/// in the main buckets is what may be executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeafPiggybackingInfo {
    size_increasing: usize,
    size_decreasing: usize,
    unpiggybackable_size_increasing: usize,
    unpiggybackable_size_decreasing: usize,
}

impl LeafPiggybackingInfo {
    pub fn add_potential_size_increasing_op(&mut self) {
        self.size_increasing += 1;
    }

    pub fn add_potential_size_decreasing_op(&mut self) {
        self.size_decreasing += 1;
    }

    pub fn size_increasing_ops(&self) -> usize {
        self.size_increasing
    }

    pub fn size_decreasing_ops(&self) -> usize {
        self.size_decreasing
    }

    pub fn unpiggybackable_size_increasing_ops(&self) -> usize {
        self.unpiggybackable_size_increasing
    }

    pub fn unpiggybackable_size_decreasing_ops(&self) -> usize {
        self.unpiggybackable_size_decreasing
    }

    pub fn limit_size_increasing_ops(&mut self, count: usize) {
        let count = count.min(self.size_increasing);
        self.size_increasing -= count;
        self.unpiggybackable_size_increasing += count;
    }

    pub fn limit_size_decreasing_ops(&mut self, count: usize) {
        let count = count.min(self.size_decreasing);
        self.size_decreasing -= count;
        self.unpiggybackable_size_decreasing += count;
    }

    pub fn node_size_change(&self) -> isize {
        self.size_increasing as isize - self.size_decreasing as isize
    }

    pub fn is_node_changed(&self) -> bool {
        self.size_increasing != 0 || self.size_decreasing != 0
    }
}

// ============================================================================
// Modifiers
// ============================================================================

/// Hook run on every leaf read during the disk phase of a query.
pub trait LeafNodeModifier<E: DataItem, V: TreeVariant<E>> {
    /// Possibly modifies `node`; returns true if it changed and must be
    /// written back.
    fn modify(
        &mut self,
        node: &mut NodeMut<'_, E, V>,
        allow_reorganization: bool,
        epsilon: f64,
        info: &mut LeafPiggybackingInfo,
    ) -> RRTreeResult<bool>;

    /// Commits the modifications made since the last call, registering
    /// them in `stats`.
    fn finalize_modifications(&mut self, stats: &mut OperationTypeStat);
}

/// Leaves every node untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopModifier;

impl<E: DataItem, V: TreeVariant<E>> LeafNodeModifier<E, V> for NoopModifier {
    fn modify(
        &mut self,
        _node: &mut NodeMut<'_, E, V>,
        _allow_reorganization: bool,
        _epsilon: f64,
        _info: &mut LeafPiggybackingInfo,
    ) -> RRTreeResult<bool> {
        Ok(false)
    }

    fn finalize_modifications(&mut self, _stats: &mut OperationTypeStat) {}
}

// ============================================================================
// Operation Buffer
// ============================================================================

/// The in-memory buffer of pending operations.
pub trait OperationBuffer<E: DataItem> {
    /// Buffered operations whose descriptor overlaps `descriptor`.
    fn query_operations(&self, descriptor: &E::Desc) -> Vec<Operation<E>>;

    /// Removes exactly this operation; false if it was not buffered.
    fn remove_exact(&mut self, operation: &Operation<E>) -> bool;
}

impl<E: DataItem> OperationBuffer<E> for Vec<Operation<E>> {
    fn query_operations(&self, descriptor: &E::Desc) -> Vec<Operation<E>> {
        self.iter()
            .filter(|op| op.descriptor().overlaps(descriptor))
            .cloned()
            .collect()
    }

    fn remove_exact(&mut self, operation: &Operation<E>) -> bool {
        match self.iter().position(|op| op == operation) {
            Some(position) => {
                self.remove(position);
                true
            }
            None => false,
        }
    }
}

/// Operations that fit a visited leaf but were held back by its capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpiggybackedStats {
    pub size_increasing: u64,
    pub size_decreasing: u64,
}

/// Applies buffered operations to the leaves a query visits.
pub struct LeafNodePiggybacker<'b, E: DataItem, B: OperationBuffer<E>> {
    buffer: &'b mut B,
    piggybacked: IndexSet<Operation<E>>,
    unpiggybacked: UnpiggybackedStats,
    tracer: Arc<dyn ObjectTracer<E>>,
}

impl<'b, E: DataItem, B: OperationBuffer<E>> LeafNodePiggybacker<'b, E, B> {
    pub fn new(buffer: &'b mut B) -> Self {
        Self {
            buffer,
            piggybacked: IndexSet::new(),
            unpiggybacked: UnpiggybackedStats::default(),
            tracer: Arc::new(NoopTracer),
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn ObjectTracer<E>>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn buffer(&self) -> &B {
        &*self.buffer
    }

    /// Operations applied to leaves and not yet finalized.
    pub fn pending(&self) -> impl Iterator<Item = &Operation<E>> {
        self.piggybacked.iter()
    }

    pub fn unpiggybacked(&self) -> UnpiggybackedStats {
        self.unpiggybacked
    }
}

impl<E, V, B> LeafNodeModifier<E, V> for LeafNodePiggybacker<'_, E, B>
where
    E: DataItem,
    V: TreeVariant<E>,
    B: OperationBuffer<E>,
{
    fn modify(
        &mut self,
        node: &mut NodeMut<'_, E, V>,
        allow_reorganization: bool,
        epsilon: f64,
        info: &mut LeafPiggybackingInfo,
    ) -> RRTreeResult<bool> {
        let Some(mut descriptor) = node.compute_descriptor() else {
            return Ok(false);
        };
        if allow_reorganization && epsilon > 0.0 {
            descriptor = descriptor.expanded(epsilon);
        }

        let candidates = self.buffer.query_operations(&descriptor);
        let mut fitting = node.select_fitting_operations(candidates, epsilon > 0.0);
        fitting.retain(|op| !self.piggybacked.contains(op));
        if fitting.is_empty() {
            return Ok(false);
        }

        let mut indexed = node.index_entries();
        for op in &fitting {
            self.tracer
                .trace_operation(op, TracePoint::LeafNodePiggybacking);
            if indexed.operation_will_increase_node_size(op) {
                info.add_potential_size_increasing_op();
            } else {
                info.add_potential_size_decreasing_op();
            }
        }

        if !allow_reorganization {
            indexed.limit_number_of_operations(info);
            self.unpiggybacked.size_increasing += info.unpiggybackable_size_increasing_ops() as u64;
            self.unpiggybacked.size_decreasing += info.unpiggybackable_size_decreasing_ops() as u64;
        }

        if !info.is_node_changed() {
            return Ok(false);
        }

        let executed = indexed.execute_constrained_subset_of_ops(
            &fitting,
            info.size_increasing_ops(),
            info.size_decreasing_ops(),
        )?;
        log::trace!(
            "Piggybacked {} of {} fitting operations onto a {} leaf",
            executed.len(),
            fitting.len(),
            V::NAME
        );
        let changed = !executed.is_empty();
        self.piggybacked.extend(executed);
        Ok(changed)
    }

    fn finalize_modifications(&mut self, stats: &mut OperationTypeStat) {
        for op in self.piggybacked.drain(..) {
            stats.register(&op);
            if !self.buffer.remove_exact(&op) {
                log::warn!("Piggybacked operation {:?} was no longer buffered", op);
            }
        }
    }
}
