//! `GraphModel`: nodes in declaration order plus adjacency indices.
//!
//! Adjacency is built once in [`GraphModel::build`] and never updated; a
//! structural change means building a new model. Edges whose endpoints do
//! not both name a node are kept in the edge list but excluded from the
//! adjacency indices. When ids are duplicated, edges attach to the first
//! node with that id.

use std::collections::HashMap;

use flowgate_types::error::MalformedInputError;
use flowgate_types::workflow::{Edge, Node};
use serde_json::Value;

use super::classify::NodeClassifier;
use super::document::WorkflowDocument;

#[derive(Debug, Clone)]
pub struct GraphModel {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// id -> position in `nodes` (first occurrence).
    index: HashMap<String, usize>,
    /// Per node, indices into `edges` leaving it, in edge order.
    out_adj: Vec<Vec<usize>>,
    /// Per node, indices into `edges` entering it, in edge order.
    in_adj: Vec<Vec<usize>>,
}

impl GraphModel {
    /// Build the model and its adjacency indices.
    pub fn build(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(i);
        }

        let mut out_adj = vec![Vec::new(); nodes.len()];
        let mut in_adj = vec![Vec::new(); nodes.len()];
        for (e, edge) in edges.iter().enumerate() {
            if let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) {
                out_adj[s].push(e);
                in_adj[t].push(e);
            }
        }

        Self {
            nodes,
            edges,
            index,
            out_adj,
            in_adj,
        }
    }

    /// Parse a JSON document and build the model from it.
    pub fn from_value(
        value: &Value,
        classifier: &NodeClassifier,
    ) -> Result<Self, MalformedInputError> {
        Ok(Self::from_document(WorkflowDocument::from_value(
            value, classifier,
        )?))
    }

    pub fn from_document(document: WorkflowDocument) -> Self {
        Self::build(document.nodes, document.edges)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Declaration-order position of `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn out_edges(&self, id: &str) -> Vec<&Edge> {
        self.adjacent(&self.out_adj, id)
    }

    pub fn in_edges(&self, id: &str) -> Vec<&Edge> {
        self.adjacent(&self.in_adj, id)
    }

    fn adjacent<'a>(&'a self, adj: &[Vec<usize>], id: &str) -> Vec<&'a Edge> {
        self.index
            .get(id)
            .map(|&i| adj[i].iter().map(|&e| &self.edges[e]).collect())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Nodes with no incoming edge, in declaration order.
    pub fn roots(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| self.in_adj[*i].is_empty())
            .map(|(_, n)| n)
            .collect()
    }

    /// Targets of the outgoing edges of `id`, in edge order.
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.out_edges(id)
            .into_iter()
            .filter_map(|e| self.node(&e.target))
            .collect()
    }

    /// Sources of the incoming edges of `id`, in edge order.
    pub fn parents(&self, id: &str) -> Vec<&Node> {
        self.in_edges(id)
            .into_iter()
            .filter_map(|e| self.node(&e.source))
            .collect()
    }

    /// Index-based children, for algorithms that work on positions.
    pub(crate) fn child_indices(&self, i: usize) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.out_adj[i]
            .iter()
            .filter_map(|&e| self.index.get(&self.edges[e].target).copied())
    }

    pub(crate) fn is_root_index(&self, i: usize) -> bool {
        self.in_adj[i].is_empty()
    }

    /// Three-color DFS over every node. Iterative, so deep graphs cannot
    /// overflow the stack.
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color = vec![Color::White; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if color[start] != Color::White {
                continue;
            }
            // (node, next out-edge slot to inspect)
            let mut stack = vec![(start, 0usize)];
            color[start] = Color::Gray;
            while let Some(top) = stack.last_mut() {
                let (node, slot) = *top;
                if slot < self.out_adj[node].len() {
                    top.1 += 1;
                    let edge = &self.edges[self.out_adj[node][slot]];
                    let Some(&child) = self.index.get(&edge.target) else {
                        continue;
                    };
                    match color[child] {
                        Color::Gray => return true,
                        Color::White => {
                            color[child] = Color::Gray;
                            stack.push((child, 0));
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_types::workflow::NodeClass;

    fn node(id: &str) -> Node {
        Node::new(id, "tool", NodeClass::ReadOnly)
    }

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> GraphModel {
        GraphModel::build(
            ids.iter().map(|id| node(id)).collect(),
            edges
                .iter()
                .enumerate()
                .map(|(i, (s, t))| Edge::new(format!("e{i}"), *s, *t))
                .collect(),
        )
    }

    fn ids(nodes: Vec<&Node>) -> Vec<&str> {
        nodes.into_iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn roots_children_parents() {
        let g = graph(&["a", "b", "c", "d"], &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        assert_eq!(ids(g.roots()), vec!["a"]);
        assert_eq!(ids(g.children("a")), vec!["b", "c"]);
        assert_eq!(ids(g.parents("d")), vec!["b", "c"]);
        assert!(g.children("d").is_empty());
        assert!(g.children("missing").is_empty());
        assert_eq!(g.out_edges("a").len(), 2);
        assert_eq!(g.in_edges("d")[1].id, "e3");
    }

    #[test]
    fn dangling_edges_are_not_indexed() {
        let g = graph(&["a", "b"], &[("a", "ghost"), ("", "b")]);
        assert_eq!(g.edges().len(), 2);
        assert!(g.children("a").is_empty());
        assert_eq!(ids(g.roots()), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_ids_resolve_to_first_occurrence() {
        let g = graph(&["a", "a", "b"], &[("a", "b")]);
        assert_eq!(g.len(), 3);
        assert_eq!(g.position_of("a"), Some(0));
        assert_eq!(ids(g.parents("b")), vec!["a"]);
    }

    #[test]
    fn detects_cycles() {
        assert!(!graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]).has_cycle());
        assert!(graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]).has_cycle());
        assert!(graph(&["a"], &[("a", "a")]).has_cycle());
        assert!(!graph(&[], &[]).has_cycle());
    }

    #[test]
    fn cycle_in_second_component_is_found() {
        let g = graph(&["a", "b", "x", "y"], &[("a", "b"), ("x", "y"), ("y", "x")]);
        assert!(g.has_cycle());
    }

    #[test]
    fn long_chain_does_not_overflow() {
        let ids: Vec<String> = (0..50_000).map(|i| format!("n{i}")).collect();
        let nodes = ids.iter().map(|id| node(id)).collect();
        let edges = ids
            .windows(2)
            .enumerate()
            .map(|(i, w)| Edge::new(format!("e{i}"), &w[0], &w[1]))
            .collect();
        let g = GraphModel::build(nodes, edges);
        assert!(!g.has_cycle());
        assert_eq!(g.roots().len(), 1);
    }

    #[test]
    fn from_value_builds_model() {
        let doc = serde_json::json!({
            "nodes": [{"id": "n1"}, {"id": "n2"}],
            "edges": [{"id": "e1", "source": "n1", "target": "n2"}]
        });
        let g = GraphModel::from_value(&doc, &NodeClassifier::default()).unwrap();
        assert_eq!(ids(g.children("n1")), vec!["n2"]);

        let err = GraphModel::from_value(&serde_json::json!({"nodes": []}), &NodeClassifier::default())
            .unwrap_err();
        assert_eq!(err.path(), "edges");
    }
}
