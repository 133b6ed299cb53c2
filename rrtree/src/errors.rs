//! Error and result types shared by the disk tree and its containers.

use std::io;
use thiserror::Error;

use crate::container::NodeKey;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the RR-tree engine and its node containers.
///
/// `InvariantViolated` is the fatal class: it means a capacity or
/// annihilation contract was broken by the caller and the surrounding
/// operation must be abandoned. Everything else is an environmental failure.
#[derive(Debug, Error)]
pub enum RRTreeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    #[error("Node {0} not found in container")]
    NodeNotFound(NodeKey),

    #[error("Node buffer is full: all {capacity} slots hold fixed nodes")]
    BufferFull { capacity: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Container is closed")]
    Closed,
}

impl RRTreeError {
    /// Builds an invariant violation and logs it before it is surfaced.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("RR-tree invariant violated: {}", message);
        RRTreeError::InvariantViolated(message)
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, RRTreeError::InvariantViolated(_))
    }
}

/// Result type for RR-tree operations
pub type RRTreeResult<T> = Result<T, RRTreeError>;
