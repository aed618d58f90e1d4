//! Deterministic layered layout.
//!
//! Depths come from a depth-first walk from every root (node with no
//! incoming edge). A node is re-entered only when reached along a longer
//! path, and never while it is already on the current path, so cyclic
//! graphs still terminate. Nodes are then grouped into layers by depth and
//! placed in columns; small graphs bypass layering and use a fixed
//! three-column grid instead.
//!
//! No randomness: identical input order gives identical output.

use std::collections::BTreeMap;

use flowgate_types::config::LayoutConfig;
use flowgate_types::workflow::Position;
use serde::Serialize;

use crate::graph::GraphModel;

/// Graphs with at most this many nodes use the grid.
pub const SMALL_GRAPH_THRESHOLD: usize = 5;

/// Column count of the small-graph grid.
pub const GRID_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStrategy {
    Grid,
    Layered,
}

/// One node with its computed placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNode {
    pub id: String,
    pub depth: usize,
    pub position: Position,
    /// The position came from the document rather than the layout.
    pub preset: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub strategy: LayoutStrategy,
    /// Declaration order.
    pub nodes: Vec<PlacedNode>,
    /// Node ids per depth, in declaration order within a layer.
    pub layers: Vec<Vec<String>>,
}

impl Layout {
    pub fn get(&self, id: &str) -> Option<&PlacedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayeredLayoutEngine {
    config: LayoutConfig,
}

impl LayeredLayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Place every node. Nodes with a preset position keep it.
    pub fn layout(&self, graph: &GraphModel) -> Layout {
        let depths = compute_depths(graph);
        let layers = group_layers(&depths);

        let strategy = if graph.len() <= SMALL_GRAPH_THRESHOLD {
            LayoutStrategy::Grid
        } else {
            LayoutStrategy::Layered
        };

        let computed = match strategy {
            LayoutStrategy::Grid => self.grid_positions(graph.len()),
            LayoutStrategy::Layered => self.layered_positions(&depths, &layers),
        };

        let nodes = graph
            .nodes()
            .iter()
            .zip(computed)
            .zip(&depths)
            .map(|((node, computed), &depth)| PlacedNode {
                id: node.id.clone(),
                depth,
                position: node.position.unwrap_or(computed),
                preset: node.position.is_some(),
            })
            .collect();

        let layers = layers
            .into_values()
            .map(|members| {
                members
                    .into_iter()
                    .map(|i| graph.nodes()[i].id.clone())
                    .collect()
            })
            .collect();

        tracing::debug!(
            nodes = graph.len(),
            ?strategy,
            "computed workflow layout"
        );

        Layout {
            strategy,
            nodes,
            layers,
        }
    }

    fn grid_positions(&self, count: usize) -> Vec<Position> {
        let c = &self.config;
        (0..count)
            .map(|i| {
                Position::new(
                    c.grid_origin_x + (i % GRID_COLUMNS) as f64 * c.grid_column_gap,
                    c.grid_origin_y + (i / GRID_COLUMNS) as f64 * c.grid_row_gap,
                )
            })
            .collect()
    }

    fn layered_positions(
        &self,
        depths: &[usize],
        layers: &BTreeMap<usize, Vec<usize>>,
    ) -> Vec<Position> {
        let c = &self.config;
        let mut positions = vec![Position::new(0.0, 0.0); depths.len()];
        for (&depth, members) in layers {
            let n = members.len() as f64;
            let x = c.margin_x + depth as f64 * c.column_gap;
            for (i, &node) in members.iter().enumerate() {
                let y = c.margin_y + i as f64 * c.row_gap - (n - 1.0) * c.row_gap / 2.0
                    + c.baseline_offset;
                positions[node] = Position::new(x, y);
            }
        }
        positions
    }
}

/// Depth per node, indexed by declaration order.
///
/// Every node starts at depth 0. With no roots (empty or fully cyclic
/// graph) all nodes stay at 0.
pub fn compute_depths(graph: &GraphModel) -> Vec<usize> {
    enum Frame {
        Enter(usize, usize),
        Exit(usize),
    }

    let n = graph.len();
    let mut depth = vec![0usize; n];
    let mut visited = vec![false; n];
    let mut on_path = vec![false; n];

    let mut stack: Vec<Frame> = (0..n)
        .rev()
        .filter(|&i| graph.is_root_index(i))
        .map(|i| Frame::Enter(i, 0))
        .collect();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node, d) => {
                if on_path[node] || (visited[node] && depth[node] >= d) {
                    continue;
                }
                visited[node] = true;
                depth[node] = d;
                on_path[node] = true;
                stack.push(Frame::Exit(node));
                for child in graph.child_indices(node).rev() {
                    stack.push(Frame::Enter(child, d + 1));
                }
            }
            Frame::Exit(node) => on_path[node] = false,
        }
    }
    depth
}

fn group_layers(depths: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut layers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &d) in depths.iter().enumerate() {
        layers.entry(d).or_default().push(i);
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_types::workflow::{Edge, Node, NodeClass};

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> GraphModel {
        GraphModel::build(
            ids.iter()
                .map(|id| Node::new(*id, "tool", NodeClass::ReadOnly))
                .collect(),
            edges
                .iter()
                .enumerate()
                .map(|(i, (s, t))| Edge::new(format!("e{i}"), *s, *t))
                .collect(),
        )
    }

    fn chain(n: usize) -> GraphModel {
        let ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let edges: Vec<(&str, &str)> = refs.windows(2).map(|w| (w[0], w[1])).collect();
        graph(&refs, &edges)
    }

    #[test]
    fn six_node_chain_gets_one_node_per_layer() {
        let layout = LayeredLayoutEngine::default().layout(&chain(6));
        assert_eq!(layout.strategy, LayoutStrategy::Layered);

        let depths: Vec<usize> = layout.nodes.iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(layout.layers.len(), 6);
        assert!(layout.layers.iter().all(|l| l.len() == 1));

        let xs: Vec<f64> = layout.nodes.iter().map(|n| n.position.x).collect();
        assert_eq!(xs, vec![50.0, 250.0, 450.0, 650.0, 850.0, 1050.0]);
        // Single-node layers sit on the baseline.
        assert!(layout.nodes.iter().all(|n| n.position.y == 250.0));
    }

    #[test]
    fn layer_members_are_centered_around_baseline() {
        // a -> {b, c, d}, then d -> e -> f so the graph exceeds the grid threshold.
        let g = graph(
            &["a", "b", "c", "d", "e", "f"],
            &[("a", "b"), ("a", "c"), ("a", "d"), ("d", "e"), ("e", "f")],
        );
        let layout = LayeredLayoutEngine::default().layout(&g);
        assert_eq!(layout.layers[1], vec!["b", "c", "d"]);

        let y = |id: &str| layout.get(id).unwrap().position.y;
        // margin 50 + baseline 200, three members spaced 100 apart around it.
        assert_eq!(y("b"), 150.0);
        assert_eq!(y("c"), 250.0);
        assert_eq!(y("d"), 350.0);
        assert_eq!(layout.get("c").unwrap().position.x, 250.0);
    }

    #[test]
    fn small_graphs_use_grid() {
        let g = graph(&["a", "b", "c", "d", "e"], &[("a", "b"), ("b", "c")]);
        let layout = LayeredLayoutEngine::default().layout(&g);
        assert_eq!(layout.strategy, LayoutStrategy::Grid);

        let positions: Vec<(f64, f64)> = layout
            .nodes
            .iter()
            .map(|n| (n.position.x, n.position.y))
            .collect();
        assert_eq!(
            positions,
            vec![
                (100.0, 100.0),
                (350.0, 100.0),
                (600.0, 100.0),
                (100.0, 250.0),
                (350.0, 250.0),
            ]
        );
        // Depth is still reported in grid mode.
        assert_eq!(layout.get("c").unwrap().depth, 2);
    }

    #[test]
    fn depth_is_longest_path_on_dags() {
        // a -> b -> d, a -> c, c -> b: b must sit below c.
        let g = graph(
            &["a", "b", "c", "d", "x", "y"],
            &[("a", "b"), ("b", "d"), ("a", "c"), ("c", "b")],
        );
        let depths = compute_depths(&g);
        assert_eq!(depths, vec![0, 2, 1, 3, 0, 0]);
        for edge in g.edges() {
            let s = g.position_of(&edge.source).unwrap();
            let t = g.position_of(&edge.target).unwrap();
            assert!(depths[t] >= depths[s] + 1);
        }
    }

    #[test]
    fn cycles_terminate() {
        // r -> a -> b -> a
        let g = graph(&["r", "a", "b"], &[("r", "a"), ("a", "b"), ("b", "a")]);
        assert_eq!(compute_depths(&g), vec![0, 1, 2]);

        // Fully cyclic: no roots, everything at depth 0.
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(compute_depths(&g), vec![0, 0, 0]);
    }

    #[test]
    fn preset_positions_are_kept() {
        let nodes = vec![
            Node::new("a", "tool", NodeClass::ReadOnly).with_position(7.0, 9.0),
            Node::new("b", "tool", NodeClass::ReadOnly),
        ];
        let layout = LayeredLayoutEngine::default().layout(&GraphModel::build(nodes, vec![]));
        let a = layout.get("a").unwrap();
        assert!(a.preset);
        assert_eq!(a.position, Position::new(7.0, 9.0));
        assert!(!layout.get("b").unwrap().preset);
    }

    #[test]
    fn layout_is_deterministic() {
        let g = chain(12);
        let engine = LayeredLayoutEngine::default();
        assert_eq!(engine.layout(&g), engine.layout(&g));
    }

    #[test]
    fn empty_graph() {
        let layout = LayeredLayoutEngine::default().layout(&graph(&[], &[]));
        assert!(layout.nodes.is_empty());
        assert!(layout.layers.is_empty());
    }

    #[test]
    fn custom_geometry() {
        let engine = LayeredLayoutEngine::new(LayoutConfig {
            column_gap: 300.0,
            ..LayoutConfig::default()
        });
        let layout = engine.layout(&chain(6));
        assert_eq!(layout.get("n1").unwrap().position.x, 350.0);
    }
}
