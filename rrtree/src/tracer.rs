//! Object tracing at named points of the query and update paths.
//!
//! A tracer sees every object or operation that passes a trace point. The
//! default `NoopTracer` discards everything; `LogTracer` forwards to the
//! `log` facade under the `rrtree::trace` target.

use std::fmt;

use crate::data::{DataItem, Operation};

/// Target used by `LogTracer` so trace output can be filtered separately.
pub const TRACE_TARGET: &str = "rrtree::trace";

/// Groups of trace points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceClass {
    Query,
    Piggybacking,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracePoint {
    /// A data item returned by the disk phase of a query
    DataQueryDiskResult,
    /// A buffered operation seen while reconciling a data tree query
    DataQueryBufferResult,
    /// A data item in the final answer of a data tree query
    DataQueryFinalResult,
    /// A leaf operation returned by the disk phase of an update tree query
    UpdateQueryInitialResult,
    /// An external operation reconciled into an update tree query
    UpdateQueryExternalResult,
    /// A data item in the final answer of an update tree query
    UpdateQueryFinalResult,
    /// An operation selected for piggybacking onto a leaf
    LeafNodePiggybacking,
    /// An operation applied by a group update
    GroupUpdate,
}

impl TracePoint {
    pub fn class(self) -> TraceClass {
        match self {
            TracePoint::DataQueryDiskResult
            | TracePoint::DataQueryBufferResult
            | TracePoint::DataQueryFinalResult
            | TracePoint::UpdateQueryInitialResult
            | TracePoint::UpdateQueryExternalResult
            | TracePoint::UpdateQueryFinalResult => TraceClass::Query,
            TracePoint::LeafNodePiggybacking => TraceClass::Piggybacking,
            TracePoint::GroupUpdate => TraceClass::Update,
        }
    }
}

impl fmt::Display for TracePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub trait ObjectTracer<E: DataItem> {
    fn trace_object(&self, object: &E, point: TracePoint);

    fn trace_operation(&self, operation: &Operation<E>, point: TracePoint);
}

/// Discards every traced object.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl<E: DataItem> ObjectTracer<E> for NoopTracer {
    fn trace_object(&self, _object: &E, _point: TracePoint) {}

    fn trace_operation(&self, _operation: &Operation<E>, _point: TracePoint) {}
}

/// Writes traced objects at `trace` level, restricted to some classes.
#[derive(Debug, Clone)]
pub struct LogTracer {
    classes: Vec<TraceClass>,
}

impl LogTracer {
    pub fn new(classes: impl IntoIterator<Item = TraceClass>) -> Self {
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn all() -> Self {
        Self::new([TraceClass::Query, TraceClass::Piggybacking, TraceClass::Update])
    }

    pub fn is_enabled(&self, point: TracePoint) -> bool {
        self.classes.contains(&point.class())
    }
}

impl<E: DataItem> ObjectTracer<E> for LogTracer {
    fn trace_object(&self, object: &E, point: TracePoint) {
        if self.is_enabled(point) {
            log::trace!(target: TRACE_TARGET, "{}: {:?}", point, object);
        }
    }

    fn trace_operation(&self, operation: &Operation<E>, point: TracePoint) {
        if self.is_enabled(point) {
            log::trace!(
                target: TRACE_TARGET,
                "{}: {:?} {:?}",
                point,
                operation.kind,
                operation.data
            );
        }
    }
}
