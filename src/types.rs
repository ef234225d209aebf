//! Core types for the node graph.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable handle for a node in the graph arena.
///
/// Nodes are never removed, so a `NodeId` stays valid for the lifetime of
/// the [`ChainGraph`](crate::ChainGraph) that issued it. Handles are plain
/// indices and carry no ownership: holding one does not keep anything
/// alive, and a handle from another graph will simply not resolve.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position in a timeline (per-ledger).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }

    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(Sequence(self.0 - 1))
        } else {
            None
        }
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Walk direction along the primary chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Follow `next` pointers.
    Forward,
    /// Follow `previous` pointers.
    Backward,
}

/// Descriptive metadata attached to a node.
///
/// Never participates in graph logic. The `extra` map is an open extension
/// point for application-defined annotations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Application-defined identifier.
    pub id: Option<String>,

    /// Human-readable title.
    pub title: Option<String>,

    /// Longer free-form description.
    pub description: Option<String>,

    /// Open extension map.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Metadata {
    /// Metadata carrying only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Field-by-field patch for a node's metadata.
///
/// Each set field overwrites the corresponding metadata field; unset
/// fields keep their existing values. `extra` entries merge key-by-key.
#[derive(Clone, Debug, Default)]
pub struct MetadataPatch {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

impl MetadataPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.extra.is_empty()
    }

    /// Merge this patch into `target`, creating metadata if absent.
    pub fn apply_to(&self, target: &mut Option<Metadata>) {
        if self.is_empty() {
            return;
        }
        let meta = target.get_or_insert_with(Metadata::default);
        if let Some(id) = &self.id {
            meta.id = Some(id.clone());
        }
        if let Some(title) = &self.title {
            meta.title = Some(title.clone());
        }
        if let Some(description) = &self.description {
            meta.description = Some(description.clone());
        }
        for (key, value) in &self.extra {
            meta.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Bound for node payloads.
///
/// Payloads are diffed field-by-field through their JSON form, so they
/// must round-trip through `serde_json`.
pub trait Payload: Serialize + DeserializeOwned + Clone {}

impl<T: Serialize + DeserializeOwned + Clone> Payload for T {}
