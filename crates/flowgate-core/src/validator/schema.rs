//! Schema-tier rules.
//!
//! Active only when a schema document is supplied. The schema may override
//! the identifier patterns and numeric limits; anything it does not set
//! uses the built-in defaults below.

use flowgate_types::validation::ValidationIssue;
use regex::Regex;
use serde_json::Value;

use crate::graph::document::{first_str, numeric_position, str_field};

const DEFAULT_WORKFLOW_ID: &str = "wf-[a-z0-9-]+";
const DEFAULT_VERSION: &str = r"[0-9]+\.[0-9]+\.[0-9]+";
const DEFAULT_INTEGRITY_ID: &str = "[0-9a-f]{12}";
const DEFAULT_NODE_ID: &str = "node-[a-z0-9-]+";
const DEFAULT_EDGE_ID: &str = "edge-[a-z0-9-]+";

/// Why a schema document could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum SchemaProcessingError {
    #[error("schema document must be an object")]
    NotAnObject,

    #[error("schema pattern '{name}' is not a string")]
    PatternNotString { name: String },

    #[error("schema pattern '{name}' does not compile: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("schema limit '{name}' must be a non-negative number")]
    InvalidLimit { name: String },

    #[error("schema timeout range is empty ({min} > {max})")]
    EmptyTimeoutRange { min: f64, max: f64 },
}

/// Compiled schema rules.
#[derive(Debug, Clone)]
pub struct SchemaRules {
    pub version: String,
    workflow_id: Regex,
    version_pattern: Regex,
    integrity_id: Regex,
    node_id: Regex,
    edge_id: Regex,
    min_timeout_secs: f64,
    max_timeout_secs: f64,
    max_parallel_warning: f64,
}

impl SchemaRules {
    pub fn from_schema(schema: &Value) -> Result<Self, SchemaProcessingError> {
        let root = schema
            .as_object()
            .ok_or(SchemaProcessingError::NotAnObject)?;
        let patterns = root.get("patterns").unwrap_or(&Value::Null);
        let limits = root.get("limits").unwrap_or(&Value::Null);

        let min_timeout_secs = limit(limits, "min_timeout_secs", 1.0)?;
        let max_timeout_secs = limit(limits, "max_timeout_secs", 600.0)?;
        if min_timeout_secs > max_timeout_secs {
            return Err(SchemaProcessingError::EmptyTimeoutRange {
                min: min_timeout_secs,
                max: max_timeout_secs,
            });
        }

        Ok(Self {
            version: str_field(schema, "version").unwrap_or_else(|| "unknown".to_string()),
            workflow_id: pattern(patterns, "workflow_id", DEFAULT_WORKFLOW_ID)?,
            version_pattern: pattern(patterns, "version", DEFAULT_VERSION)?,
            integrity_id: pattern(patterns, "integrity_id", DEFAULT_INTEGRITY_ID)?,
            node_id: pattern(patterns, "node_id", DEFAULT_NODE_ID)?,
            edge_id: pattern(patterns, "edge_id", DEFAULT_EDGE_ID)?,
            min_timeout_secs,
            max_timeout_secs,
            max_parallel_warning: limit(limits, "max_parallel_warning", 5.0)?,
        })
    }

    /// Apply the rules to a shape-checked document.
    pub fn issues(&self, doc: &Value, nodes: &[Value], edges: &[Value]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.check_header(doc, &mut issues);
        for (i, node) in nodes.iter().enumerate() {
            self.check_node(i, node, &mut issues);
        }
        for (i, edge) in edges.iter().enumerate() {
            self.check_edge(i, edge, &mut issues);
        }
        check_policies(doc, self.max_parallel_warning, &mut issues);
        issues
    }

    fn check_header(&self, doc: &Value, issues: &mut Vec<ValidationIssue>) {
        let fields = [
            ("workflow_id", "Workflow ID", "format: wf-name-variant", &self.workflow_id),
            ("version", "Version", "format: x.y.z", &self.version_pattern),
            (
                "integrity_id",
                "Integrity ID",
                "12-char SHA-256 prefix",
                &self.integrity_id,
            ),
        ];
        for (key, name, hint, re) in fields {
            let value = match key {
                "integrity_id" => first_str(doc, &["integrity_id", "ssot_id"]),
                _ => str_field(doc, key),
            };
            match value {
                None => issues.push(ValidationIssue::error(
                    key,
                    format!("{name} is required ({hint})"),
                )),
                Some(v) if !re.is_match(&v) => issues.push(ValidationIssue::error(
                    key,
                    format!("{name} must match pattern: {}", display_pattern(re)),
                )),
                Some(_) => {}
            }
        }
    }

    fn check_node(&self, i: usize, node: &Value, issues: &mut Vec<ValidationIssue>) {
        let path = format!("nodes[{i}]");
        match str_field(node, "id") {
            None => issues.push(ValidationIssue::error(
                &path,
                "Node must have an ID (format: node-name)",
            )),
            Some(id) if !self.node_id.is_match(&id) => issues.push(ValidationIssue::error(
                &path,
                format!("Node ID must match pattern: {}", display_pattern(&self.node_id)),
            )),
            Some(_) => {}
        }

        if first_str(node, &["type", "kind"]).is_none() {
            issues.push(ValidationIssue::error(&path, "Node must have a type"));
        }

        if numeric_position(node).is_none() {
            issues.push(ValidationIssue::error(
                format!("{path}.position"),
                "Node must have numeric x and y coordinates",
            ));
        }

        let approval = node.get("approval");
        let required = approval
            .and_then(|a| a.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if required {
            let message = approval
                .and_then(|a| str_field(a, "message"))
                .unwrap_or_else(|| "No message specified".to_string());
            issues.push(ValidationIssue::info(
                format!("{path}.approval"),
                format!("Node requires approval: {message}"),
            ));
        }

        if let Some(timeout) = node.get("timeout").and_then(Value::as_f64) {
            if timeout < self.min_timeout_secs || timeout > self.max_timeout_secs {
                issues.push(ValidationIssue::warning(
                    format!("{path}.timeout"),
                    format!(
                        "Timeout should be between {}-{} seconds",
                        self.min_timeout_secs, self.max_timeout_secs
                    ),
                ));
            }
        }
    }

    fn check_edge(&self, i: usize, edge: &Value, issues: &mut Vec<ValidationIssue>) {
        let path = format!("edges[{i}]");
        match str_field(edge, "id") {
            None => issues.push(ValidationIssue::error(
                &path,
                "Edge must have an ID (format: edge-name)",
            )),
            Some(id) if !self.edge_id.is_match(&id) => issues.push(ValidationIssue::error(
                &path,
                format!("Edge ID must match pattern: {}", display_pattern(&self.edge_id)),
            )),
            Some(_) => {}
        }

        if str_field(edge, "source").is_none() || str_field(edge, "target").is_none() {
            issues.push(ValidationIssue::error(&path, "Edge must have source and target"));
        }

        if let Some(condition) = str_field(edge, "condition") {
            issues.push(ValidationIssue::info(
                format!("{path}.condition"),
                format!("Edge has conditional logic: {condition}"),
            ));
        }
    }
}

/// Document-level approval and execution policy notes.
fn check_policies(doc: &Value, max_parallel_warning: f64, issues: &mut Vec<ValidationIssue>) {
    let approvals = &doc["approvals"];
    if approvals["default_policy"].as_str() == Some("deny_writes") {
        issues.push(ValidationIssue::info(
            "approvals.default_policy",
            "Default policy: Write operations require explicit approval",
        ));
    }
    if approvals["write_nodes_require_approval"].as_bool() == Some(true) {
        issues.push(ValidationIssue::info(
            "approvals.write_nodes_require_approval",
            "Write nodes require approval",
        ));
    }

    let execution = &doc["execution"];
    if execution["dry_run"].as_bool() == Some(true) {
        issues.push(ValidationIssue::info(
            "execution.dry_run",
            "Dry-run mode enabled - no actual changes will be made",
        ));
    }
    let parallel = execution["mode"].as_str() == Some("parallel");
    let max_parallel = execution["max_parallel"].as_f64().unwrap_or(0.0);
    if parallel && max_parallel > max_parallel_warning {
        issues.push(ValidationIssue::warning(
            "execution.max_parallel",
            "High parallel execution may impact system performance",
        ));
    }
}

/// Compile `patterns.<name>` (or the default), anchored at both ends.
fn pattern(patterns: &Value, name: &str, default: &str) -> Result<Regex, SchemaProcessingError> {
    let source = match patterns.get(name) {
        None | Some(Value::Null) => default,
        Some(Value::String(s)) => s.as_str(),
        Some(_) => {
            return Err(SchemaProcessingError::PatternNotString {
                name: name.to_string(),
            });
        }
    };
    let anchored = format!("^(?:{})$", source.trim_start_matches('^').trim_end_matches('$'));
    Regex::new(&anchored).map_err(|source| SchemaProcessingError::InvalidPattern {
        name: name.to_string(),
        source,
    })
}

/// The pattern as written, without the anchoring wrapper.
fn display_pattern(re: &Regex) -> &str {
    re.as_str()
        .strip_prefix("^(?:")
        .and_then(|s| s.strip_suffix(")$"))
        .unwrap_or(re.as_str())
}

fn limit(limits: &Value, name: &str, default: f64) -> Result<f64, SchemaProcessingError> {
    match limits.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|n| *n >= 0.0)
            .ok_or_else(|| SchemaProcessingError::InvalidLimit {
                name: name.to_string(),
            }),
    }
}
