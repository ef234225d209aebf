//! Shallow field-level diffing over JSON-shaped payloads.
//!
//! A delta contains exactly the top-level fields whose values differ; it
//! is applied by field overwrite, so replaying deltas in order is
//! last-write-wins. Diffing never recurses into field values.

use crate::history::entry::MetadataDelta;
use crate::types::Metadata;
use serde_json::{Map, Value};

/// Compute the shallow delta that turns `old` into `new`.
///
/// Returns `None` when nothing changed. When both sides are JSON objects
/// the delta is the map of changed top-level fields; otherwise the delta
/// is the whole new value. Two transitions are not representable and
/// record nothing: clearing the payload (`Some -> None`) and dropping a
/// field from an object. Checkpoints are the only way such states enter
/// reconstruction.
pub fn diff_data(old: Option<&Value>, new: Option<&Value>) -> Option<Value> {
    let new = new?;
    match old {
        None => Some(new.clone()),
        Some(old) if old == new => None,
        Some(Value::Object(old_fields)) => match new {
            Value::Object(new_fields) => {
                let mut changed = Map::new();
                for (key, value) in new_fields {
                    if old_fields.get(key) != Some(value) {
                        changed.insert(key.clone(), value.clone());
                    }
                }
                if changed.is_empty() {
                    None
                } else {
                    Some(Value::Object(changed))
                }
            }
            other => Some(other.clone()),
        },
        Some(_) => Some(new.clone()),
    }
}

/// Apply a delta by field overwrite.
///
/// Object deltas merge into an object base; anything else replaces the
/// base wholesale.
pub fn apply_data_delta(base: &mut Option<Value>, delta: &Value) {
    match (base.as_mut(), delta) {
        (Some(Value::Object(fields)), Value::Object(changed)) => {
            for (key, value) in changed {
                fields.insert(key.clone(), value.clone());
            }
        }
        _ => *base = Some(delta.clone()),
    }
}

/// Fold `delta` into a running union, last write wins.
pub fn merge_data_delta(acc: &mut Option<Value>, delta: &Value) {
    apply_data_delta(acc, delta);
}

/// Compute the recorded metadata delta (`title`/`description` only).
pub fn diff_metadata(old: Option<&Metadata>, new: Option<&Metadata>) -> Option<MetadataDelta> {
    let new = new?;
    let delta = MetadataDelta {
        title: changed_field(old.and_then(|m| m.title.as_ref()), new.title.as_ref()),
        description: changed_field(
            old.and_then(|m| m.description.as_ref()),
            new.description.as_ref(),
        ),
    };
    if delta.is_empty() {
        None
    } else {
        Some(delta)
    }
}

fn changed_field(old: Option<&String>, new: Option<&String>) -> Option<String> {
    match new {
        Some(new) if old != Some(new) => Some(new.clone()),
        _ => None,
    }
}

/// Apply a recorded metadata delta, creating metadata if absent.
pub fn apply_metadata_delta(base: &mut Option<Metadata>, delta: &MetadataDelta) {
    let meta = base.get_or_insert_with(Metadata::default);
    if let Some(title) = &delta.title {
        meta.title = Some(title.clone());
    }
    if let Some(description) = &delta.description {
        meta.description = Some(description.clone());
    }
}
