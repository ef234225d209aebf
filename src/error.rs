//! Error types for the node graph.

use crate::types::{NodeId, Sequence};
use thiserror::Error;

/// Main error type for graph and history operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Reconstruction index outside `[0, timeline length)`.
    #[error("Invalid history index: {index:?} (timeline length {len})")]
    InvalidIndex { index: Sequence, len: u64 },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        ChainError::Serialization(e.to_string())
    }
}

/// Result type for graph and history operations.
pub type Result<T> = std::result::Result<T, ChainError>;
