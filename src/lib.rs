//! # Lineage
//!
//! A versioned node graph: every node is simultaneously an element of a
//! doubly-linked, possibly branching chain and the head of its own
//! append-only change ledger, able to reconstruct any prior state and
//! fork new independent timelines from it.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Graph vertices with a payload, metadata, primary
//!   `previous`/`next` pointers, and cumulative ancestor/progeny sets
//! - **History**: Per-lineage ledger of shallow field deltas and
//!   full-state checkpoints
//! - **Reconstruction**: Replay from the nearest checkpoint to any
//!   timeline position
//! - **Branches**: Fork an independent node (own ledger) from any past
//!   state
//!
//! ## Example
//!
//! ```ignore
//! use lineage::{ChainGraph, NodeConfig, NodeUpdate, Sequence};
//! use serde_json::json;
//!
//! let mut graph = ChainGraph::new();
//! let root = graph.create(NodeConfig::new().data(json!({"value": 0})))?;
//!
//! graph.update(root, NodeUpdate::new().data(json!({"value": 10})))?;
//! graph.update(root, NodeUpdate::new().data(json!({"value": 20})))?;
//!
//! // Fork an independent timeline from the original state.
//! let branch = graph.branch_from_history(root, Sequence(0))?;
//!
//! // Rewind the live node; the revert is itself recorded.
//! graph.revert_to_history(root, Sequence(0))?;
//! ```

pub mod clone;
pub mod error;
pub mod graph;
pub mod history;
pub mod types;

// Re-exports
pub use clone::detached_copy;
pub use error::{ChainError, Result};
pub use graph::{ChainGraph, ChainIter, ChainNode, NodeConfig, NodeUpdate};
pub use history::{History, HistoryEntry, MetadataDelta, NodeSnapshot, SharedHistory};
pub use types::*;
