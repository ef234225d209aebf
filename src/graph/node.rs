//! The graph vertex.

use crate::history::{NodeSnapshot, SharedHistory};
use crate::types::{Metadata, NodeId, Payload};
use serde::Serialize;
use std::collections::BTreeSet;

/// A vertex in the graph: payload, metadata, primary chain pointers,
/// cumulative relationship sets, and a handle to its lineage's ledger.
///
/// Nodes live in a [`ChainGraph`](crate::ChainGraph) arena and are
/// addressed by [`NodeId`]; all mutation goes through the graph. The
/// serialized form is the shallow projection `{data, metadata,
/// is_snapshot}`; relationship pointers and history are never part of
/// it.
#[derive(Serialize)]
pub struct ChainNode<T> {
    #[serde(skip)]
    pub(crate) id: NodeId,

    /// Current payload, replaced wholesale on update.
    pub(crate) data: Option<T>,

    pub(crate) metadata: Option<Metadata>,

    /// Primary chain pointers. Non-owning: plain arena indices.
    #[serde(skip)]
    pub(crate) previous: Option<NodeId>,
    #[serde(skip)]
    pub(crate) next: Option<NodeId>,

    /// Every node ever connected behind this one. Monotonic, never pruned.
    #[serde(skip)]
    pub(crate) ancestors: BTreeSet<NodeId>,

    /// Every node ever connected ahead of this one. Monotonic, never pruned.
    #[serde(skip)]
    pub(crate) progeny: BTreeSet<NodeId>,

    /// The node this one was branched or derived from. Set once.
    #[serde(skip)]
    pub(crate) origin: Option<NodeId>,

    /// Immutable point-in-time copy rather than a live node.
    pub(crate) is_snapshot: bool,

    #[serde(skip)]
    pub(crate) history: SharedHistory<T>,
}

impl<T: Payload> ChainNode<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn previous(&self) -> Option<NodeId> {
        self.previous
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn ancestors(&self) -> &BTreeSet<NodeId> {
        &self.ancestors
    }

    pub fn progeny(&self) -> &BTreeSet<NodeId> {
        &self.progeny
    }

    pub fn origin(&self) -> Option<NodeId> {
        self.origin
    }

    pub fn is_snapshot(&self) -> bool {
        self.is_snapshot
    }

    /// The ledger this node appends to. Shared with any snapshot nodes
    /// reconstructed from it.
    pub fn history(&self) -> &SharedHistory<T> {
        &self.history
    }

    /// Detached copy of this node's state, ready for the ledger.
    pub(crate) fn snapshot_state(&self) -> NodeSnapshot<T> {
        NodeSnapshot::new(self.data.clone(), self.metadata.clone())
    }
}
