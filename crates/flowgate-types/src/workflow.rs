//! Workflow graph domain types.
//!
//! A workflow is a set of typed [`Node`]s connected by directed [`Edge`]s.
//! Nodes are immutable once parsed; runtime state for a node lives in a
//! separate [`ExecutionStep`](crate::execution::ExecutionStep) record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::UnknownNodeClass;

// ---------------------------------------------------------------------------
// Node class
// ---------------------------------------------------------------------------

/// Closed classification of what a node does to the outside world.
///
/// Drives write gating at execution time and visual grouping in the
/// presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeClass {
    ReadOnly,
    WriteSensitive,
    LlmDelegation,
    Computation,
    Utility,
}

impl NodeClass {
    /// All classes in their canonical order.
    pub const ALL: [NodeClass; 5] = [
        NodeClass::ReadOnly,
        NodeClass::WriteSensitive,
        NodeClass::LlmDelegation,
        NodeClass::Computation,
        NodeClass::Utility,
    ];

    /// Canonical upper-case tag (e.g. `WRITE_SENSITIVE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeClass::ReadOnly => "READ_ONLY",
            NodeClass::WriteSensitive => "WRITE_SENSITIVE",
            NodeClass::LlmDelegation => "LLM_DELEGATION",
            NodeClass::Computation => "COMPUTATION",
            NodeClass::Utility => "UTILITY",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeClass {
    type Err = UnknownNodeClass;

    /// Case-insensitive; accepts `-` in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        NodeClass::ALL
            .into_iter()
            .find(|class| class.as_str() == normalized)
            .ok_or_else(|| UnknownNodeClass(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// 2D coordinate for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Human approval requirement declared on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A single node of the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within a workflow. May be empty in malformed
    /// documents; the validator reports that.
    pub id: String,
    /// Display name. Not semantic.
    pub label: String,
    /// Free-form type tag, usually a tool or operation name. Selects the
    /// executor at run time.
    pub kind: String,
    /// Resolved class (explicit override or classification table).
    pub node_class: NodeClass,
    /// Opaque parameters handed to the executor.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    /// Preset position; layout fills it in when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Declared per-node deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<Approval>,
}

impl Node {
    /// Create a node with the given id, kind and class; the label defaults
    /// to the id.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, node_class: NodeClass) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind: kind.into(),
            node_class,
            params: Map::new(),
            position: None,
            timeout_secs: None,
            approval: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_approval(mut self, message: impl Into<String>) -> Self {
        self.approval = Some(Approval {
            required: true,
            message: Some(message.into()),
        });
        self
    }

    /// Whether the node declares a required approval.
    pub fn requires_approval(&self) -> bool {
        self.approval.as_ref().is_some_and(|a| a.required)
    }

    /// Label if present, otherwise the id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A directed connection between two nodes.
///
/// `source` and `target` are not checked against the node set at
/// construction; dangling references are a validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Guard expression, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            condition: None,
            label: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}
