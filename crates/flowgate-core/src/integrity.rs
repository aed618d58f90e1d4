//! Integrity id of a workflow document.
//!
//! The id is the first [`INTEGRITY_ID_LEN`] hex characters of a hash over
//! the canonical JSON of the document's `nodes` and `edges`. The hash
//! algorithm is a port; the SHA-256 adapter lives in flowgate-infra.

use flowgate_types::error::MalformedInputError;
use serde_json::{Map, Value};

use crate::graph::document::collections;

pub const INTEGRITY_ID_LEN: usize = 12;

/// Abstraction over content hashing.
pub trait IntegrityHasher: Send + Sync {
    /// Lowercase hex digest of `content`.
    fn compute_hash(&self, content: &str) -> String;
}

/// Compute the integrity id of `document`.
///
/// Object keys are sorted recursively before hashing, so key order in the
/// source file does not change the id. Top-level metadata (including any
/// stored integrity id) is not part of the hash.
pub fn integrity_id<H: IntegrityHasher + ?Sized>(
    document: &Value,
    hasher: &H,
) -> Result<String, MalformedInputError> {
    let (nodes, edges) = collections(document)?;
    let mut body = Map::new();
    body.insert("edges".to_string(), canonical(&Value::Array(edges.clone())));
    body.insert("nodes".to_string(), canonical(&Value::Array(nodes.clone())));
    let canonical_json = Value::Object(body).to_string();

    let digest = hasher.compute_hash(&canonical_json);
    Ok(digest.chars().take(INTEGRITY_ID_LEN).collect())
}

/// Rebuild `value` with every object's keys inserted in sorted order.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
