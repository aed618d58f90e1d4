//! Lenient workflow document parsing.
//!
//! Documents arrive as arbitrary JSON (or YAML converted to JSON) from an
//! external store, so parsing never rejects semantic problems: a node without
//! an id becomes a node with the empty id, a non-numeric position is dropped,
//! and the validator reports all of it. Only a document whose shape cannot be
//! interpreted at all is a [`MalformedInputError`].

use flowgate_types::error::MalformedInputError;
use flowgate_types::workflow::{Approval, Edge, Node, NodeClass, Position};
use serde_json::{Map, Value};

use super::classify::NodeClassifier;

/// A parsed workflow document.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDocument {
    pub workflow_id: Option<String>,
    pub version: Option<String>,
    pub integrity_id: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl WorkflowDocument {
    /// Parse a document, classifying nodes without an explicit class.
    pub fn from_value(
        value: &Value,
        classifier: &NodeClassifier,
    ) -> Result<Self, MalformedInputError> {
        let (raw_nodes, raw_edges) = collections(value)?;

        let nodes = raw_nodes
            .iter()
            .map(|raw| parse_node(raw, classifier))
            .collect();
        let edges = raw_edges.iter().map(parse_edge).collect();

        Ok(Self {
            workflow_id: str_field(value, "workflow_id"),
            version: str_field(value, "version"),
            integrity_id: str_field(value, "integrity_id").or_else(|| str_field(value, "ssot_id")),
            nodes,
            edges,
        })
    }
}

/// Check the document shape and return its node and edge arrays.
///
/// The root is checked first, then `nodes`, then `edges`; the first failure
/// is reported.
pub fn collections(value: &Value) -> Result<(&Vec<Value>, &Vec<Value>), MalformedInputError> {
    let root = value.as_object().ok_or(MalformedInputError::NotAnObject)?;
    let nodes = root
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or(MalformedInputError::MissingCollection("nodes"))?;
    let edges = root
        .get("edges")
        .and_then(Value::as_array)
        .ok_or(MalformedInputError::MissingCollection("edges"))?;
    Ok((nodes, edges))
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Non-empty string field.
pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// First non-empty string among `keys`.
pub(crate) fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| str_field(value, key))
}

/// `{x, y}` with both coordinates numeric.
pub(crate) fn numeric_position(value: &Value) -> Option<Position> {
    let position = value.get("position")?;
    let x = position.get("x")?.as_f64()?;
    let y = position.get("y")?.as_f64()?;
    Some(Position::new(x, y))
}

fn parse_node(raw: &Value, classifier: &NodeClassifier) -> Node {
    let id = str_field(raw, "id").unwrap_or_default();
    let kind = first_str(raw, &["kind", "type"]).unwrap_or_default();
    let label = first_str(raw, &["label", "name"]).unwrap_or_default();

    let node_class = first_str(raw, &["nodeClass", "node_class"])
        .and_then(|tag| tag.parse::<NodeClass>().ok())
        .unwrap_or_else(|| classifier.classify(&kind, &label));

    let params = raw
        .get("params")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    let approval = raw.get("approval").and_then(|a| {
        a.as_object().map(|_| Approval {
            required: a.get("required").and_then(Value::as_bool).unwrap_or(false),
            message: str_field(a, "message"),
        })
    });

    Node {
        id,
        label,
        kind,
        node_class,
        params,
        position: numeric_position(raw),
        timeout_secs: raw.get("timeout").and_then(Value::as_f64),
        approval,
    }
}

fn parse_edge(raw: &Value) -> Edge {
    Edge {
        id: str_field(raw, "id").unwrap_or_default(),
        source: str_field(raw, "source").unwrap_or_default(),
        target: str_field(raw, "target").unwrap_or_default(),
        condition: str_field(raw, "condition"),
        label: str_field(raw, "label"),
    }
}
