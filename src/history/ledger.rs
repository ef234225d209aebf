//! Per-lineage ledger with checkpointed reconstruction.

use crate::clone;
use crate::error::{ChainError, Result};
use crate::history::delta;
use crate::history::entry::{HistoryEntry, NodeSnapshot};
use crate::types::{Metadata, Payload, Sequence, Timestamp};
use lru::LruCache;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, trace};

/// Reconstructions kept around for repeat lookups. Safe to cache: the
/// timeline is append-only, so `rebuild_at(i)` is deterministic forever.
const REBUILD_CACHE_SIZE: usize = 32;

/// Shared handle to a ledger.
///
/// Shared ownership exists in exactly one place: between a live node and
/// the snapshot nodes it spawns. Any holder may append; normal flow only
/// appends through the originating live node.
pub type SharedHistory<T> = Arc<History<T>>;

/// Append-only change ledger for one lineage.
///
/// Index 0 is always a checkpoint of the state the ledger was seeded
/// with. Entries are never removed or reordered.
pub struct History<T> {
    /// Immutable snapshot taken at construction.
    original: NodeSnapshot<T>,

    inner: RwLock<Timeline<T>>,
}

struct Timeline<T> {
    /// The authoritative, insertion-ordered record sequence.
    entries: Vec<HistoryEntry<T>>,

    /// Cumulative result of every delta applied in order. Reference point
    /// for the next diff and fast path for "current" reconstruction.
    latest: NodeSnapshot<T>,

    /// Every full snapshot ever taken, in order. Duplicated inside the
    /// timeline as checkpoint entries.
    checkpoints: Vec<NodeSnapshot<T>>,

    rebuilds: LruCache<u64, NodeSnapshot<T>>,
}

impl<T: Payload> History<T> {
    /// Create a ledger seeded with `seed`: one checkpoint entry at
    /// index 0 capturing the seed state.
    pub fn new(seed: NodeSnapshot<T>) -> Result<Self> {
        let original = seed.detached()?;
        let history = Self {
            original: original.detached()?,
            inner: RwLock::new(Timeline {
                entries: Vec::new(),
                latest: original.detached()?,
                checkpoints: Vec::new(),
                rebuilds: LruCache::new(
                    NonZeroUsize::new(REBUILD_CACHE_SIZE).expect("cache size is non-zero"),
                ),
            }),
        };
        history.add_checkpoint(&original)?;
        Ok(history)
    }

    /// Number of entries in the timeline.
    pub fn len(&self) -> u64 {
        self.inner.read().entries.len() as u64
    }

    /// Always false after construction; the genesis checkpoint is entry 0.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Number of full snapshots taken so far.
    pub fn checkpoint_count(&self) -> usize {
        self.inner.read().checkpoints.len()
    }

    /// Copy of the entry at `at`, if it exists.
    pub fn entry(&self, at: Sequence) -> Option<HistoryEntry<T>> {
        self.inner.read().entries.get(at.0 as usize).cloned()
    }

    /// Copy of the state the ledger was seeded with.
    pub fn original(&self) -> NodeSnapshot<T> {
        self.original.clone()
    }

    /// Copy of the cumulative current state.
    pub fn latest(&self) -> NodeSnapshot<T> {
        self.inner.read().latest.clone()
    }

    /// Record the difference between `latest_state` and the given full
    /// state, then fold it forward.
    ///
    /// Returns the appended position, or `None` when both the data and
    /// metadata deltas came out empty (no-op updates are not recorded).
    pub fn add_entry(
        &self,
        data: Option<&T>,
        metadata: Option<&Metadata>,
    ) -> Result<Option<Sequence>> {
        let mut inner = self.inner.write();

        let old_data = value_of(inner.latest.data.as_ref())?;
        let new_data = match data {
            Some(data) => Some(clone::to_value(data)?),
            None => None,
        };

        let data_delta = delta::diff_data(old_data.as_ref(), new_data.as_ref());
        let metadata_delta = delta::diff_metadata(inner.latest.metadata.as_ref(), metadata);

        if data_delta.is_none() && metadata_delta.is_none() {
            trace!("no-op update skipped");
            return Ok(None);
        }

        // Fold before appending so a conversion failure leaves both the
        // timeline and latest_state untouched.
        let folded = match &data_delta {
            Some(delta) => {
                let mut base = old_data;
                delta::apply_data_delta(&mut base, delta);
                Some(payload_of(base)?)
            }
            None => None,
        };

        let seq = Sequence(inner.entries.len() as u64);
        if let Some(folded) = folded {
            inner.latest.data = folded;
        }
        if let Some(metadata_delta) = &metadata_delta {
            delta::apply_metadata_delta(&mut inner.latest.metadata, metadata_delta);
        }
        inner.entries.push(HistoryEntry {
            sequence: seq,
            timestamp: Timestamp::now(),
            data_delta,
            metadata_delta,
            checkpoint: None,
        });
        Ok(Some(seq))
    }

    /// Record a raw partial-payload delta.
    ///
    /// The delta is folded into `latest_state` and appended as given.
    /// Empty deltas are not recorded.
    pub fn add_delta_entry(&self, data_delta: Value) -> Result<Option<Sequence>> {
        let empty = match &data_delta {
            Value::Null => true,
            Value::Object(fields) => fields.is_empty(),
            _ => false,
        };
        if empty {
            return Ok(None);
        }

        let mut inner = self.inner.write();
        let mut base = value_of(inner.latest.data.as_ref())?;
        delta::apply_data_delta(&mut base, &data_delta);
        let folded = payload_of(base)?;

        let seq = Sequence(inner.entries.len() as u64);
        inner.latest.data = folded;
        inner.entries.push(HistoryEntry {
            sequence: seq,
            timestamp: Timestamp::now(),
            data_delta: Some(data_delta),
            metadata_delta: None,
            checkpoint: None,
        });
        Ok(Some(seq))
    }

    /// Snapshot `latest_state` and append it as a checkpoint entry.
    pub fn save_checkpoint(&self) -> Result<Sequence> {
        let mut inner = self.inner.write();
        let snapshot = inner.latest.detached()?;
        Ok(push_checkpoint(&mut inner, snapshot))
    }

    /// Snapshot an arbitrary supplied state and append it as a
    /// checkpoint entry. Seeds index 0 at construction.
    pub fn add_checkpoint(&self, state: &NodeSnapshot<T>) -> Result<Sequence> {
        let snapshot = state.detached()?;
        let mut inner = self.inner.write();
        Ok(push_checkpoint(&mut inner, snapshot))
    }

    /// Reconstruct the state at timeline position `at`.
    ///
    /// Replays forward from the nearest checkpoint at or before `at`
    /// (falling back to the original state), so cost is bounded by
    /// checkpoint spacing. The returned snapshot is detached: it shares
    /// nothing with the live node or the ledger's own copies.
    pub fn rebuild_at(&self, at: Sequence) -> Result<NodeSnapshot<T>> {
        let mut inner = self.inner.write();
        let len = inner.entries.len() as u64;
        if at.0 >= len {
            return Err(ChainError::InvalidIndex { index: at, len });
        }
        if let Some(hit) = inner.rebuilds.get(&at.0) {
            return Ok(hit.clone());
        }

        let target = at.0 as usize;
        let base = inner.entries[..=target]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(pos, entry)| entry.checkpoint.as_ref().map(|c| (pos, c.clone())));
        let (mut state, replay_from) = match base {
            Some((pos, snapshot)) => (snapshot, pos + 1),
            None => (self.original.clone(), 0),
        };

        let mut data = value_of(state.data.as_ref())?;
        let mut data_changed = false;
        for entry in &inner.entries[replay_from..=target] {
            if let Some(delta) = &entry.data_delta {
                delta::apply_data_delta(&mut data, delta);
                data_changed = true;
            }
            if let Some(delta) = &entry.metadata_delta {
                delta::apply_metadata_delta(&mut state.metadata, delta);
            }
        }
        if data_changed {
            state.data = payload_of(data)?;
        }

        trace!(
            at = at.0,
            replayed = target + 1 - replay_from,
            "state rebuilt"
        );
        inner.rebuilds.put(at.0, state.clone());
        Ok(state)
    }

    /// Union of all data deltas strictly after `start` through `end`
    /// inclusive, last write wins, in forward order.
    ///
    /// Returns an empty delta whenever `end <= start`: shallow field
    /// deltas carry no undo information, so backward differencing is not
    /// defined. An `end` past the last entry is clamped.
    pub fn delta_between_points(&self, start: Sequence, end: Sequence) -> Value {
        let inner = self.inner.read();
        if end <= start || inner.entries.is_empty() {
            return Value::Object(Map::new());
        }

        let from = start.0 as usize + 1;
        let last = (end.0 as usize).min(inner.entries.len() - 1);
        if from > last {
            return Value::Object(Map::new());
        }

        let mut acc = None;
        for entry in &inner.entries[from..=last] {
            if let Some(delta) = &entry.data_delta {
                delta::merge_data_delta(&mut acc, delta);
            }
        }
        acc.unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Resolve two entries to their timeline positions and delegate to
    /// [`delta_between_points`](Self::delta_between_points).
    pub fn delta_between_entries(&self, a: &HistoryEntry<T>, b: &HistoryEntry<T>) -> Value {
        self.delta_between_points(a.sequence, b.sequence)
    }
}

fn push_checkpoint<T: Payload>(inner: &mut Timeline<T>, snapshot: NodeSnapshot<T>) -> Sequence {
    let seq = Sequence(inner.entries.len() as u64);
    inner.checkpoints.push(snapshot.clone());
    inner.entries.push(HistoryEntry {
        sequence: seq,
        timestamp: Timestamp::now(),
        data_delta: None,
        metadata_delta: None,
        checkpoint: Some(snapshot),
    });
    debug!(at = seq.0, "checkpoint saved");
    seq
}

fn value_of<T: Payload>(data: Option<&T>) -> Result<Option<Value>> {
    match data {
        Some(data) => Ok(Some(clone::to_value(data)?)),
        None => Ok(None),
    }
}

fn payload_of<T: Payload>(value: Option<Value>) -> Result<Option<T>> {
    match value {
        Some(value) => Ok(Some(clone::from_value(value)?)),
        None => Ok(None),
    }
}
