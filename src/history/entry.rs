//! Ledger records.

use crate::clone;
use crate::error::Result;
use crate::types::{Metadata, Payload, Sequence, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A detached, node-shaped value: payload plus metadata, no graph
/// pointers and no ledger handle.
///
/// This is the form checkpoints are stored in and reconstructions are
/// returned in. It is always fully owned; mutating the live node it was
/// taken from cannot reach it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSnapshot<T> {
    pub data: Option<T>,
    pub metadata: Option<Metadata>,
}

impl<T: Payload> NodeSnapshot<T> {
    pub fn new(data: Option<T>, metadata: Option<Metadata>) -> Self {
        Self { data, metadata }
    }

    /// Structurally independent copy, payload included.
    pub fn detached(&self) -> Result<Self> {
        let data = match &self.data {
            Some(data) => Some(clone::detached_copy(data)?),
            None => None,
        };
        Ok(Self {
            data,
            metadata: self.metadata.clone(),
        })
    }
}

/// Changed descriptive fields, as recorded in the ledger.
///
/// Only `title` and `description` participate in history; `id` and the
/// open extension map are descriptive-only and never replayed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDelta {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl MetadataDelta {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// One immutable record in a timeline.
///
/// In normal operation an entry carries either deltas or a checkpoint,
/// never both; the schema allows both, and an entry with neither is never
/// appended.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry<T> {
    /// Position in the timeline, assigned at append.
    pub sequence: Sequence,

    /// When the entry was appended.
    pub timestamp: Timestamp,

    /// Changed payload fields (shallow, top-level).
    pub data_delta: Option<Value>,

    /// Changed descriptive fields.
    pub metadata_delta: Option<MetadataDelta>,

    /// Full-state snapshot, when this entry is a checkpoint.
    pub checkpoint: Option<NodeSnapshot<T>>,
}

impl<T> HistoryEntry<T> {
    pub fn is_checkpoint(&self) -> bool {
        self.checkpoint.is_some()
    }
}
