//! Eager-cycle detection over a built dependency graph.
//!
//! The graph builder already rejects cycles as it walks, but the walk is
//! path-relative and node reuse across shared lifetimes can stitch together
//! an eager loop the per-path check never saw on a single path. This pass
//! runs over the finished graph: a cycle reachable without traversing any
//! lazy edge is fatal.

use crate::graph::{DependencyGraph, NodeId};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Finds a cycle composed entirely of eager edges, if one exists.
///
/// Returns the cycle as a node sequence starting and ending at the same
/// node. Lazy edges never participate; a cycle broken by a deferred block
/// is a legal construction.
pub fn find_eager_cycle(graph: &DependencyGraph) -> Option<Vec<NodeId>> {
    let mut colors = vec![Color::White; graph.nodes.len()];
    let mut stack: Vec<NodeId> = Vec::new();

    for start in 0..graph.nodes.len() {
        let start = NodeId(start as u32);
        if colors[start.index()] == Color::White {
            if let Some(cycle) = visit(graph, start, &mut colors, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    graph: &DependencyGraph,
    node: NodeId,
    colors: &mut [Color],
    stack: &mut Vec<NodeId>,
) -> Option<Vec<NodeId>> {
    colors[node.index()] = Color::Gray;
    stack.push(node);

    for edge in graph.dependencies(node) {
        if edge.lazy {
            continue;
        }
        match colors[edge.target.index()] {
            Color::Gray => {
                let pos = stack.iter().position(|&n| n == edge.target).unwrap_or(0);
                let mut cycle: Vec<NodeId> = stack[pos..].to_vec();
                cycle.push(edge.target);
                return Some(cycle);
            }
            Color::White => {
                if let Some(cycle) = visit(graph, edge.target, colors, stack) {
                    return Some(cycle);
                }
            }
            Color::Black => {}
        }
    }

    stack.pop();
    colors[node.index()] = Color::Black;
    None
}
