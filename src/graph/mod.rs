//! The node arena and its mutation contract.
//!
//! A [`ChainGraph`] owns every vertex of one graph and hands out stable
//! [`NodeId`] handles. Mutation goes through the graph so that pointer
//! rewrites, relationship-set registration, and ledger appends stay
//! coordinated: every mutating operation appends at most one entry per
//! ledger touched, and only when the computed delta is non-empty.

mod node;
mod traversal;

pub use node::ChainNode;
pub use traversal::ChainIter;

use crate::error::{ChainError, Result};
use crate::history::{History, NodeSnapshot, SharedHistory};
use crate::types::{Metadata, MetadataPatch, NodeId, Payload, Sequence};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Configuration for [`ChainGraph::create`].
///
/// Every field is independently optional. Defaults: no payload, no
/// metadata, null pointers, no origin, `is_snapshot = false`, and a fresh
/// ledger seeded from the node's own initial state. A supplied ledger is
/// only shared when `is_snapshot` is set; otherwise it is ignored and the
/// node owns a new one.
pub struct NodeConfig<T> {
    pub data: Option<T>,
    pub metadata: Option<Metadata>,
    pub previous: Option<NodeId>,
    pub next: Option<NodeId>,
    pub origin: Option<NodeId>,
    pub is_snapshot: bool,
    pub history: Option<SharedHistory<T>>,
}

impl<T> Default for NodeConfig<T> {
    fn default() -> Self {
        Self {
            data: None,
            metadata: None,
            previous: None,
            next: None,
            origin: None,
            is_snapshot: false,
            history: None,
        }
    }
}

impl<T> NodeConfig<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn previous(mut self, previous: NodeId) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn next(mut self, next: NodeId) -> Self {
        self.next = Some(next);
        self
    }

    pub fn origin(mut self, origin: NodeId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn is_snapshot(mut self, is_snapshot: bool) -> Self {
        self.is_snapshot = is_snapshot;
        self
    }

    pub fn shared_history(mut self, history: SharedHistory<T>) -> Self {
        self.history = Some(history);
        self
    }
}

/// Ingredients for [`ChainGraph::update`].
///
/// Unset fields leave the node untouched. `data` replaces the payload
/// wholesale; `metadata` merges field-by-field; pointer fields re-point
/// without recording their own ledger entry (the whole update is exactly
/// one append, skipped when the net change is empty).
pub struct NodeUpdate<T> {
    pub data: Option<T>,
    pub metadata: Option<MetadataPatch>,
    pub next: Option<Option<NodeId>>,
    pub previous: Option<Option<NodeId>>,
}

impl<T> Default for NodeUpdate<T> {
    fn default() -> Self {
        Self {
            data: None,
            metadata: None,
            next: None,
            previous: None,
        }
    }
}

impl<T> NodeUpdate<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn metadata(mut self, patch: MetadataPatch) -> Self {
        self.metadata = Some(patch);
        self
    }

    pub fn next(mut self, next: NodeId) -> Self {
        self.next = Some(Some(next));
        self
    }

    pub fn clear_next(mut self) -> Self {
        self.next = Some(None);
        self
    }

    pub fn previous(mut self, previous: NodeId) -> Self {
        self.previous = Some(Some(previous));
        self
    }

    pub fn clear_previous(mut self) -> Self {
        self.previous = Some(None);
        self
    }
}

/// Arena of [`ChainNode`]s plus every operation on them.
///
/// Nodes are addressed by stable index and never removed, so handles
/// never dangle. Non-owning references between nodes (pointers, the
/// ancestor/progeny sets, origin) are plain indices into this arena.
pub struct ChainGraph<T> {
    nodes: Vec<ChainNode<T>>,
}

impl<T: Payload> ChainGraph<T> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of nodes ever created, snapshots included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node. `None` for a handle this graph never issued.
    pub fn get(&self, id: NodeId) -> Option<&ChainNode<T>> {
        self.nodes.get(id.index())
    }

    /// Create a node from `config`.
    ///
    /// When `previous`/`next` are given, the node registers itself into
    /// both endpoints' ancestor/progeny sets immediately; the endpoints'
    /// own pointers are left alone (splicing is what the link operations
    /// are for).
    pub fn create(&mut self, mut config: NodeConfig<T>) -> Result<NodeId> {
        let previous = config.previous;
        let next = config.next;
        for referenced in [previous, next, config.origin].into_iter().flatten() {
            self.try_index(referenced)?;
        }

        let shared = if config.is_snapshot {
            config.history.take()
        } else {
            None
        };
        let history = match shared {
            Some(history) => history,
            None => Arc::new(History::new(NodeSnapshot::new(
                config.data.clone(),
                config.metadata.clone(),
            ))?),
        };

        let id = NodeId(self.nodes.len() as u64);
        let mut node = ChainNode {
            id,
            data: config.data,
            metadata: config.metadata,
            previous,
            next,
            ancestors: BTreeSet::new(),
            progeny: BTreeSet::new(),
            origin: config.origin,
            is_snapshot: config.is_snapshot,
            history,
        };
        if let Some(previous) = previous {
            node.ancestors.insert(previous);
        }
        if let Some(next) = next {
            node.progeny.insert(next);
        }
        self.nodes.push(node);

        if let Some(previous) = previous {
            self.nodes[previous.index()].progeny.insert(id);
        }
        if let Some(next) = next {
            self.nodes[next.index()].ancestors.insert(id);
        }

        debug!(node = id.0, snapshot = self.nodes[id.index()].is_snapshot, "node created");
        Ok(id)
    }

    /// Apply an update: wholesale data replacement, field-by-field
    /// metadata merge, optional re-pointing. The whole call is at most
    /// one ledger append, capturing the net change; an update that
    /// changes nothing appends nothing.
    pub fn update(&mut self, id: NodeId, update: NodeUpdate<T>) -> Result<()> {
        self.try_index(id)?;
        if let Some(next) = update.next {
            self.set_next(id, next, false)?;
        }
        if let Some(previous) = update.previous {
            self.set_previous(id, previous, false)?;
        }

        let node = &mut self.nodes[id.index()];
        if let Some(data) = update.data {
            node.data = Some(data);
        }
        if let Some(patch) = &update.metadata {
            patch.apply_to(&mut node.metadata);
        }

        self.record(id)?;
        Ok(())
    }

    /// Rewrite the `next` pointer and register the new neighbor into both
    /// sides' relationship sets. The old neighbor keeps its sets: they
    /// are cumulative "ever connected", not "currently connected".
    pub fn set_next(
        &mut self,
        id: NodeId,
        target: Option<NodeId>,
        record_history: bool,
    ) -> Result<()> {
        self.try_index(id)?;
        if let Some(target) = target {
            self.try_index(target)?;
            self.nodes[id.index()].next = Some(target);
            self.nodes[id.index()].progeny.insert(target);
            self.nodes[target.index()].ancestors.insert(id);
        } else {
            self.nodes[id.index()].next = None;
        }
        if record_history {
            self.record(id)?;
        }
        Ok(())
    }

    /// Mirror of [`set_next`](Self::set_next) for the `previous` pointer.
    pub fn set_previous(
        &mut self,
        id: NodeId,
        target: Option<NodeId>,
        record_history: bool,
    ) -> Result<()> {
        self.try_index(id)?;
        if let Some(target) = target {
            self.try_index(target)?;
            self.nodes[id.index()].previous = Some(target);
            self.nodes[id.index()].ancestors.insert(target);
            self.nodes[target.index()].progeny.insert(id);
        } else {
            self.nodes[id.index()].previous = None;
        }
        if record_history {
            self.record(id)?;
        }
        Ok(())
    }

    /// Register an extra forward edge into the relationship sets without
    /// touching the primary pointers: `other` joins `id`'s progeny, `id`
    /// joins `other`'s ancestors.
    pub fn add_link(&mut self, id: NodeId, other: NodeId) -> Result<()> {
        self.try_index(id)?;
        self.try_index(other)?;
        self.nodes[id.index()].progeny.insert(other);
        self.nodes[other.index()].ancestors.insert(id);
        Ok(())
    }

    /// Splice `other` in directly after `id`, displacing the current
    /// `next` (if any) to come after `other`. Three or four pointers are
    /// rewritten; each distinct ledger among the touched nodes gets at
    /// most one append.
    pub fn link_next(&mut self, id: NodeId, other: NodeId) -> Result<()> {
        self.try_index(id)?;
        self.try_index(other)?;

        let displaced = self.nodes[id.index()].next;
        self.set_next(id, Some(other), false)?;
        self.set_previous(other, Some(id), false)?;
        if let Some(displaced) = displaced {
            self.set_next(other, Some(displaced), false)?;
            self.set_previous(displaced, Some(other), false)?;
        }
        self.record_each_history_once(&[Some(id), Some(other), displaced])
    }

    /// Splice `other` in directly before `id`, displacing the current
    /// `previous` (if any) to come before `other`.
    pub fn link_previous(&mut self, id: NodeId, other: NodeId) -> Result<()> {
        self.try_index(id)?;
        self.try_index(other)?;

        let displaced = self.nodes[id.index()].previous;
        self.set_previous(id, Some(other), false)?;
        self.set_next(other, Some(id), false)?;
        if let Some(displaced) = displaced {
            self.set_previous(other, Some(displaced), false)?;
            self.set_next(displaced, Some(other), false)?;
        }
        self.record_each_history_once(&[Some(id), Some(other), displaced])
    }

    /// Construct a fresh node carrying `data` and splice it in after
    /// `id`. The new node's origin is inherited: `id`'s origin if it has
    /// one, else `id` itself.
    pub fn new_next_link(
        &mut self,
        id: NodeId,
        data: T,
        metadata: Option<Metadata>,
    ) -> Result<NodeId> {
        self.try_index(id)?;
        let child = self.create_linked(id, data, metadata)?;
        self.link_next(id, child)?;
        Ok(child)
    }

    /// Mirror of [`new_next_link`](Self::new_next_link), splicing before.
    pub fn new_previous_link(
        &mut self,
        id: NodeId,
        data: T,
        metadata: Option<Metadata>,
    ) -> Result<NodeId> {
        self.try_index(id)?;
        let child = self.create_linked(id, data, metadata)?;
        self.link_previous(id, child)?;
        Ok(child)
    }

    /// Overwrite the node's data and metadata with the state at `at`.
    ///
    /// Reverting is itself a recorded, forward-moving event: the ledger
    /// is never rewound or truncated. An invalid index propagates and
    /// leaves the node untouched.
    pub fn revert_to_history(&mut self, id: NodeId, at: Sequence) -> Result<()> {
        self.try_index(id)?;
        let state = self.nodes[id.index()].history.rebuild_at(at)?;

        let node = &mut self.nodes[id.index()];
        node.data = state.data;
        node.metadata = state.metadata;
        self.record(id)?;
        debug!(node = id.0, at = at.0, "reverted to past state");
        Ok(())
    }

    /// Fork an independent node from the state at `at`.
    ///
    /// The branch gets its own fresh ledger seeded from the reconstructed
    /// state, a title decorated to mark the fork, and `origin` inherited
    /// from `id`. The fork is noted on the source ledger; the two
    /// timelines share nothing from here on.
    pub fn branch_from_history(&mut self, id: NodeId, at: Sequence) -> Result<NodeId> {
        self.try_index(id)?;
        let state = self.nodes[id.index()].history.rebuild_at(at)?;
        let origin = self.nodes[id.index()].origin.unwrap_or(id);

        let mut metadata = state.metadata.unwrap_or_default();
        metadata.title = Some(match metadata.title.take() {
            Some(title) => format!("{} (branch)", title),
            None => "(branch)".to_string(),
        });

        let mut config = NodeConfig::new().metadata(metadata).origin(origin);
        if let Some(data) = state.data {
            config = config.data(data);
        }
        let branch = self.create(config)?;

        // Recorded as a checkpoint entry: one append, no delta, so the
        // source's replay sequence is undisturbed.
        self.nodes[id.index()].history.save_checkpoint()?;
        debug!(source = id.0, branch = branch.0, at = at.0, "branched from history");
        Ok(branch)
    }

    /// Materialize the state at `at` as an immutable snapshot node
    /// sharing the source's ledger by reference.
    pub fn snapshot_at(&mut self, id: NodeId, at: Sequence) -> Result<NodeId> {
        self.try_index(id)?;
        let history = Arc::clone(&self.nodes[id.index()].history);
        let state = history.rebuild_at(at)?;

        let mut config = NodeConfig::new()
            .origin(id)
            .is_snapshot(true)
            .shared_history(history);
        if let Some(data) = state.data {
            config = config.data(data);
        }
        if let Some(metadata) = state.metadata {
            config = config.metadata(metadata);
        }
        self.create(config)
    }

    /// Shallow JSON projection of a node: `{data, metadata, is_snapshot}`.
    pub fn to_json(&self, id: NodeId) -> Result<Value> {
        let node = self.get(id).ok_or(ChainError::NodeNotFound(id))?;
        serde_json::to_value(node).map_err(|e| ChainError::Serialization(e.to_string()))
    }

    fn create_linked(
        &mut self,
        id: NodeId,
        data: T,
        metadata: Option<Metadata>,
    ) -> Result<NodeId> {
        let origin = self.nodes[id.index()].origin.unwrap_or(id);
        let mut config = NodeConfig::new().data(data).origin(origin);
        if let Some(metadata) = metadata {
            config = config.metadata(metadata);
        }
        self.create(config)
    }

    /// Append the node's current state to its ledger (no-op suppressed).
    fn record(&self, id: NodeId) -> Result<()> {
        let node = &self.nodes[id.index()];
        node.history
            .add_entry(node.data.as_ref(), node.metadata.as_ref())?;
        Ok(())
    }

    /// One append attempt per distinct ledger among `ids`.
    fn record_each_history_once(&self, ids: &[Option<NodeId>]) -> Result<()> {
        let mut touched: Vec<&SharedHistory<T>> = Vec::new();
        for id in ids.iter().flatten() {
            let history = &self.nodes[id.index()].history;
            if touched.iter().any(|seen| Arc::ptr_eq(seen, history)) {
                continue;
            }
            touched.push(history);
            self.record(*id)?;
        }
        Ok(())
    }

    fn try_index(&self, id: NodeId) -> Result<usize> {
        if id.index() < self.nodes.len() {
            Ok(id.index())
        } else {
            Err(ChainError::NodeNotFound(id))
        }
    }
}

impl<T: Payload> Default for ChainGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn graph() -> ChainGraph<Value> {
        ChainGraph::new()
    }

    #[test]
    fn test_create_with_defaults() {
        let mut g = graph();
        let id = g.create(NodeConfig::new()).unwrap();

        let node = g.get(id).unwrap();
        assert!(node.data().is_none());
        assert!(node.metadata().is_none());
        assert!(node.previous().is_none());
        assert!(node.next().is_none());
        assert!(node.origin().is_none());
        assert!(!node.is_snapshot());
        // Fresh ledger, seeded: genesis checkpoint only.
        assert_eq!(node.history().len(), 1);
    }

    #[test]
    fn test_create_registers_both_endpoints() {
        let mut g = graph();
        let a = g.create(NodeConfig::new().data(json!({"n": 1}))).unwrap();
        let b = g.create(NodeConfig::new().previous(a)).unwrap();

        assert_eq!(g.get(b).unwrap().previous(), Some(a));
        assert!(g.get(b).unwrap().ancestors().contains(&a));
        assert!(g.get(a).unwrap().progeny().contains(&b));
        // The endpoint's own pointer is untouched.
        assert!(g.get(a).unwrap().next().is_none());
    }

    #[test]
    fn test_snapshot_shares_supplied_history() {
        let mut g = graph();
        let live = g.create(NodeConfig::new().data(json!({"n": 1}))).unwrap();
        let shared = Arc::clone(g.get(live).unwrap().history());

        let snap = g
            .create(
                NodeConfig::new()
                    .data(json!({"n": 1}))
                    .is_snapshot(true)
                    .shared_history(shared),
            )
            .unwrap();

        assert!(Arc::ptr_eq(
            g.get(live).unwrap().history(),
            g.get(snap).unwrap().history()
        ));
    }

    #[test]
    fn test_non_snapshot_ignores_supplied_history() {
        let mut g = graph();
        let live = g.create(NodeConfig::new().data(json!({"n": 1}))).unwrap();
        let shared = Arc::clone(g.get(live).unwrap().history());

        let other = g
            .create(NodeConfig::new().data(json!({"n": 2})).shared_history(shared))
            .unwrap();

        assert!(!Arc::ptr_eq(
            g.get(live).unwrap().history(),
            g.get(other).unwrap().history()
        ));
    }

    #[test]
    fn test_update_is_one_ledger_append() {
        let mut g = graph();
        let a = g.create(NodeConfig::new().data(json!({"n": 1}))).unwrap();
        let b = g.create(NodeConfig::new().data(json!({"n": 2}))).unwrap();

        g.update(
            a,
            NodeUpdate::new()
                .data(json!({"n": 10}))
                .metadata(MetadataPatch::title("renamed"))
                .next(b),
        )
        .unwrap();

        let node = g.get(a).unwrap();
        assert_eq!(node.data().unwrap(), &json!({"n": 10}));
        assert_eq!(node.metadata().unwrap().title.as_deref(), Some("renamed"));
        assert_eq!(node.next(), Some(b));
        // Genesis + exactly one net-change entry.
        assert_eq!(node.history().len(), 2);
    }

    #[test]
    fn test_set_next_keeps_old_neighbor_in_sets() {
        let mut g = graph();
        let a = g.create(NodeConfig::new()).unwrap();
        let b = g.create(NodeConfig::new()).unwrap();
        let c = g.create(NodeConfig::new()).unwrap();

        g.set_next(a, Some(b), true).unwrap();
        g.set_next(a, Some(c), true).unwrap();

        let node = g.get(a).unwrap();
        assert_eq!(node.next(), Some(c));
        // "Ever connected" is monotonic.
        assert!(node.progeny().contains(&b));
        assert!(node.progeny().contains(&c));
    }

    #[test]
    fn test_pointer_rewrite_alone_appends_nothing() {
        let mut g = graph();
        let a = g.create(NodeConfig::new().data(json!({"n": 1}))).unwrap();
        let b = g.create(NodeConfig::new().data(json!({"n": 2}))).unwrap();

        let before = g.get(a).unwrap().history().len();
        g.set_next(a, Some(b), true).unwrap();
        assert_eq!(g.get(a).unwrap().history().len(), before);
    }

    #[test]
    fn test_link_next_splices_displaced_node() {
        let mut g = graph();
        let a = g.create(NodeConfig::new()).unwrap();
        let c = g.create(NodeConfig::new()).unwrap();
        g.set_next(a, Some(c), false).unwrap();
        g.set_previous(c, Some(a), false).unwrap();

        let b = g.create(NodeConfig::new()).unwrap();
        g.link_next(a, b).unwrap();

        assert_eq!(g.get(a).unwrap().next(), Some(b));
        assert_eq!(g.get(b).unwrap().previous(), Some(a));
        assert_eq!(g.get(b).unwrap().next(), Some(c));
        assert_eq!(g.get(c).unwrap().previous(), Some(b));
    }

    #[test]
    fn test_add_link_registers_sets_only() {
        let mut g = graph();
        let a = g.create(NodeConfig::new()).unwrap();
        let b = g.create(NodeConfig::new()).unwrap();

        g.add_link(a, b).unwrap();

        assert!(g.get(a).unwrap().progeny().contains(&b));
        assert!(g.get(b).unwrap().ancestors().contains(&a));
        assert!(g.get(a).unwrap().next().is_none());
        assert!(g.get(b).unwrap().previous().is_none());
    }

    #[test]
    fn test_new_next_link_inherits_origin() {
        let mut g = graph();
        let root = g.create(NodeConfig::new().data(json!({"id": 1}))).unwrap();
        let mid = g.new_next_link(root, json!({"id": 2}), None).unwrap();
        let leaf = g.new_next_link(mid, json!({"id": 3}), None).unwrap();

        // root has no origin, so it becomes the origin of its chain.
        assert_eq!(g.get(mid).unwrap().origin(), Some(root));
        assert_eq!(g.get(leaf).unwrap().origin(), Some(root));
        assert_eq!(g.get(root).unwrap().origin(), None);
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let mut g = graph();
        let a = g.create(NodeConfig::new()).unwrap();
        let bogus = NodeId(99);

        assert!(matches!(
            g.set_next(a, Some(bogus), true),
            Err(ChainError::NodeNotFound(_))
        ));
        assert!(matches!(
            g.update(bogus, NodeUpdate::new()),
            Err(ChainError::NodeNotFound(_))
        ));
        assert!(g.get(bogus).is_none());
    }
}
