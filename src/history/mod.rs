//! Per-lineage history: the append-only ledger and its reconstruction
//! algorithm.
//!
//! Every entry is either a shallow field delta or a full-state
//! checkpoint. Reconstruction replays forward from the nearest checkpoint,
//! so replay cost is O(distance to checkpoint) regardless of timeline
//! length; beyond the genesis entry, checkpoint placement is up to the
//! caller.

pub mod delta;
mod entry;
mod ledger;

pub use entry::{HistoryEntry, MetadataDelta, NodeSnapshot};
pub use ledger::{History, SharedHistory};
