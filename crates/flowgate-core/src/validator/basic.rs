//! Basic-tier rules. Need no schema document.

use std::collections::{HashMap, HashSet};

use flowgate_types::validation::ValidationIssue;
use serde_json::Value;

use crate::graph::document::{first_str, numeric_position, str_field};
use crate::graph::{GraphModel, NodeClassifier, WorkflowDocument};

/// Per-node and per-edge presence checks plus the orphan check.
///
/// `nodes` and `edges` are the already shape-checked collections.
pub fn basic_issues(nodes: &[Value], edges: &[Value]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        if str_field(node, "id").is_none() {
            issues.push(ValidationIssue::error(
                format!("nodes[{i}]"),
                "Node must have an ID",
            ));
        }
        if first_str(node, &["kind", "type", "label", "name"]).is_none() {
            issues.push(ValidationIssue::warning(
                format!("nodes[{i}]"),
                "Node should have a type or name",
            ));
        }
        let has_position = node.get("position").is_some_and(|p| !p.is_null());
        if has_position && numeric_position(node).is_none() {
            issues.push(ValidationIssue::warning(
                format!("nodes[{i}].position"),
                "Node position should have numeric x and y coordinates",
            ));
        }
    }

    for (i, edge) in edges.iter().enumerate() {
        if str_field(edge, "source").is_none() || str_field(edge, "target").is_none() {
            issues.push(ValidationIssue::error(
                format!("edges[{i}]"),
                "Edge must have source and target",
            ));
        }
    }

    if let Some(issue) = orphan_issue(nodes, edges) {
        issues.push(issue);
    }

    issues
}

/// One warning listing every node id that no edge touches.
fn orphan_issue(nodes: &[Value], edges: &[Value]) -> Option<ValidationIssue> {
    let connected: HashSet<String> = edges
        .iter()
        .flat_map(|e| [str_field(e, "source"), str_field(e, "target")])
        .flatten()
        .collect();

    let mut seen = HashSet::new();
    let orphaned: Vec<String> = nodes
        .iter()
        .filter_map(|n| str_field(n, "id"))
        .filter(|id| !connected.contains(id) && seen.insert(id.clone()))
        .collect();

    if orphaned.is_empty() {
        return None;
    }
    Some(ValidationIssue::warning(
        "connectivity",
        format!(
            "Found {} orphaned nodes: {}",
            orphaned.len(),
            orphaned.join(", ")
        ),
    ))
}

/// Checks shared by both tiers: unique ids, known edge endpoints, acyclicity.
pub fn graph_issues(document: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    // Class assignment is irrelevant here.
    let Ok(doc) = WorkflowDocument::from_value(document, &NodeClassifier::new(Vec::new())) else {
        return issues;
    };
    let graph = GraphModel::from_document(doc);

    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (i, node) in graph.nodes().iter().enumerate() {
        if node.id.is_empty() {
            continue;
        }
        if let Some(&first) = first_seen.get(node.id.as_str()) {
            issues.push(ValidationIssue::error(
                format!("nodes[{i}].id"),
                format!("Duplicate node id '{}' (first declared at nodes[{first}])", node.id),
            ));
        } else {
            first_seen.insert(node.id.as_str(), i);
        }
    }

    for (i, edge) in graph.edges().iter().enumerate() {
        for (end, id) in [("source", &edge.source), ("target", &edge.target)] {
            if !id.is_empty() && !first_seen.contains_key(id.as_str()) {
                issues.push(ValidationIssue::error(
                    format!("edges[{i}]"),
                    format!("Edge {end} '{id}' does not match any node"),
                ));
            }
        }
    }

    if graph.has_cycle() {
        issues.push(ValidationIssue::warning(
            "edges",
            "Workflow graph contains a cycle; it cannot be executed in dependency order",
        ));
    }

    issues
}
