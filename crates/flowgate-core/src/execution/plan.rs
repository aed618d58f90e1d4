//! Wave planning for the parallel executor.
//!
//! Uses `petgraph` to model node dependencies as a directed graph.
//! Topological sort rejects cycles, and depth-based grouping produces waves
//! where every node's dependencies sit in earlier waves. The waves are the
//! level sets of Kahn's algorithm.

use flowgate_types::workflow::Node;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::graph::GraphModel;

use super::EngineError;

/// Group node positions into dependency waves.
///
/// Index 0 is the first wave to execute. Within a wave, positions are in
/// declaration order. Edges with unknown endpoints are ignored.
pub fn build_waves(graph: &GraphModel) -> Result<Vec<Vec<usize>>, EngineError> {
    if graph.is_empty() {
        return Ok(vec![]);
    }

    let mut dag = DiGraph::<usize, ()>::with_capacity(graph.len(), graph.edges().len());
    let indices: Vec<_> = (0..graph.len()).map(|i| dag.add_node(i)).collect();
    for from in 0..graph.len() {
        for to in graph.child_indices(from) {
            dag.add_edge(indices[from], indices[to], ());
        }
    }

    // Topological sort -- detects cycles
    let sorted = toposort(&dag, None).map_err(|cycle| {
        let node: &Node = &graph.nodes()[dag[cycle.node_id()]];
        EngineError::CyclicGraph(node.id.clone())
    })?;

    // Longest distance from any root
    let mut depth = vec![0usize; graph.len()];
    for idx in sorted {
        let from = dag[idx];
        for to in graph.child_indices(from) {
            depth[to] = depth[to].max(depth[from] + 1);
        }
    }

    let max_depth = depth.iter().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<usize>> = vec![vec![]; max_depth + 1];
    for (i, &d) in depth.iter().enumerate() {
        waves[d].push(i);
    }
    Ok(waves)
}
