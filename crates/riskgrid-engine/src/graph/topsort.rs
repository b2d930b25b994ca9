//! Tarjan SCC over the vertex arena.
//!
//! Cycles are diagnosed structurally: every non-trivial strongly connected
//! component (or self-loop) is reported so the recompute pass can mark its
//! members `#CYCLE!` without evaluating them.

use super::vertex::NodeId;
use super::DependencyGraph;

/// Result of [`top_sort_with_scc`].
#[derive(Clone, Debug, Default)]
pub struct TopSortResult {
    /// Acyclic vertices in dependency order (precedents before dependents).
    pub order: Vec<NodeId>,
    /// Each non-trivial SCC (including self-loops), members sorted.
    pub cycles: Vec<Vec<NodeId>>,
}

struct Frame {
    node: NodeId,
    neighbors: Vec<NodeId>,
    next: usize,
}

/// Iterative Tarjan over the whole graph, deterministic for a given graph
/// shape (roots and neighbors are visited in ascending id order).
#[must_use]
pub fn top_sort_with_scc(graph: &DependencyGraph) -> TopSortResult {
    let capacity = graph.arena_capacity();
    let mut index: Vec<Option<u32>> = vec![None; capacity];
    let mut low: Vec<u32> = vec![0; capacity];
    let mut on_stack: Vec<bool> = vec![false; capacity];
    let mut stack: Vec<NodeId> = Vec::new();
    let mut next_index: u32 = 0;

    // SCCs in Tarjan emission order: every component is emitted after the
    // components it points to (its dependents).
    let mut emitted: Vec<Vec<NodeId>> = Vec::new();

    let roots: Vec<NodeId> = graph.live_ids().collect();
    for root in roots {
        if index[root.index()].is_some() {
            continue;
        }

        let mut frames = vec![Frame {
            node: root,
            neighbors: graph.dependent_ids(root),
            next: 0,
        }];
        index[root.index()] = Some(next_index);
        low[root.index()] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root.index()] = true;

        while let Some(frame) = frames.last_mut() {
            let v = frame.node;
            if frame.next < frame.neighbors.len() {
                let w = frame.neighbors[frame.next];
                frame.next += 1;
                match index[w.index()] {
                    None => {
                        index[w.index()] = Some(next_index);
                        low[w.index()] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w.index()] = true;
                        frames.push(Frame {
                            node: w,
                            neighbors: graph.dependent_ids(w),
                            next: 0,
                        });
                    }
                    Some(w_index) => {
                        if on_stack[w.index()] {
                            low[v.index()] = low[v.index()].min(w_index);
                        }
                    }
                }
                continue;
            }

            // All neighbors explored.
            let finished = frames.pop().expect("frame exists");
            let v = finished.node;
            if let Some(parent) = frames.last() {
                let p = parent.node;
                low[p.index()] = low[p.index()].min(low[v.index()]);
            }
            if low[v.index()] == index[v.index()].expect("visited") {
                let mut component = Vec::new();
                loop {
                    let w = stack.pop().expect("SCC member on stack");
                    on_stack[w.index()] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                emitted.push(component);
            }
        }
    }

    let mut order = Vec::new();
    let mut cycles = Vec::new();
    // Reverse emission order puts precedents before dependents.
    for mut component in emitted.into_iter().rev() {
        let trivial = component.len() == 1 && {
            let only = component[0];
            !graph.has_edge(only, only)
        };
        if trivial {
            order.push(component[0]);
        } else {
            component.sort();
            cycles.push(component);
        }
    }

    TopSortResult { order, cycles }
}

impl DependencyGraph {
    pub(crate) fn arena_capacity(&self) -> usize {
        self.arena_len()
    }

    #[must_use]
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.dependent_set(from).contains(&to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FormulaInstall, GraphDep};
    use crate::parser::Ast;
    use riskgrid_model::SimpleCellAddress;
    use std::sync::Arc;

    fn addr(col: u32, row: u32) -> SimpleCellAddress {
        SimpleCellAddress::new(0, col, row)
    }

    fn install(deps: Vec<GraphDep>) -> FormulaInstall {
        FormulaInstall {
            ast: Arc::new(Ast::Number(0.0)),
            raw_text: "=0".to_string(),
            version: 0,
            deps,
            volatile: false,
            structural: false,
            array: false,
        }
    }

    #[test]
    fn chain_orders_precedents_first() {
        let mut graph = DependencyGraph::new();
        let a = graph.set_formula(addr(0, 0), install(vec![]));
        let b = graph.set_formula(addr(1, 0), install(vec![GraphDep::Cell(addr(0, 0))]));
        let c = graph.set_formula(addr(2, 0), install(vec![GraphDep::Cell(addr(1, 0))]));

        let result = top_sort_with_scc(&graph);
        assert!(result.cycles.is_empty());
        let pos = |id: NodeId| result.order.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn two_cycle_is_reported_not_ordered() {
        let mut graph = DependencyGraph::new();
        let a = graph.set_formula(addr(0, 0), install(vec![GraphDep::Cell(addr(1, 0))]));
        let b = graph.set_formula(addr(1, 0), install(vec![GraphDep::Cell(addr(0, 0))]));

        let result = top_sort_with_scc(&graph);
        assert_eq!(result.cycles.len(), 1);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(result.cycles[0], expected);
        assert!(!result.order.contains(&a));
        assert!(!result.order.contains(&b));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        let a = graph.set_formula(addr(0, 0), install(vec![GraphDep::Cell(addr(0, 0))]));
        let result = top_sort_with_scc(&graph);
        assert_eq!(result.cycles, vec![vec![a]]);
    }

    #[test]
    fn cycle_does_not_poison_unrelated_vertices() {
        let mut graph = DependencyGraph::new();
        graph.set_formula(addr(0, 0), install(vec![GraphDep::Cell(addr(1, 0))]));
        graph.set_formula(addr(1, 0), install(vec![GraphDep::Cell(addr(0, 0))]));
        let ok = graph.set_formula(addr(5, 5), install(vec![]));

        let result = top_sort_with_scc(&graph);
        assert!(result.order.contains(&ok));
        assert_eq!(result.cycles.len(), 1);
    }
}
