//! Deep-copy and JSON conversion helpers shared by the ledger.
//!
//! Checkpoints must be structurally independent of the live payload they
//! were taken from: a payload that aliases shared interior state (`Rc`,
//! `Arc`, interned buffers) would otherwise let a later mutation reach
//! back into a stored snapshot. Routing the copy through `serde_json`
//! materializes a fully owned value, at the cost of a round-trip.

use crate::error::{ChainError, Result};
use crate::types::Payload;
use serde_json::Value;

/// Produce a structurally independent copy of a payload.
pub fn detached_copy<T: Payload>(value: &T) -> Result<T> {
    from_value(to_value(value)?)
}

/// Serialize a payload to its JSON form.
pub fn to_value<T: Payload>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ChainError::Serialization(e.to_string()))
}

/// Rebuild a payload from its JSON form.
pub fn from_value<T: Payload>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ChainError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Nested {
        tags: BTreeSet<String>,
        counts: BTreeMap<String, Vec<u32>>,
    }

    #[test]
    fn test_detached_copy_duplicates_nested_collections() {
        let mut original = Nested {
            tags: BTreeSet::from(["a".to_string()]),
            counts: BTreeMap::from([("k".to_string(), vec![1, 2])]),
        };

        let copy = detached_copy(&original).unwrap();
        original.tags.insert("b".into());
        original.counts.get_mut("k").unwrap().push(3);

        assert_eq!(copy.tags.len(), 1);
        assert_eq!(copy.counts["k"], vec![1, 2]);
    }

    #[test]
    fn test_value_roundtrip() {
        let value = serde_json::json!({"status": "planning", "depth": 3});
        let copied: serde_json::Value = detached_copy(&value).unwrap();
        assert_eq!(copied, value);
    }
}
