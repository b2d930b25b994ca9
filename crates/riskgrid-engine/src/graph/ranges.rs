//! Range vertex installation and the hierarchical sharing machinery.

use riskgrid_model::{AbsoluteCellRange, SimpleCellAddress};

use super::vertex::{NodeId, RangeVertex, Vertex};
use super::DependencyGraph;

impl DependencyGraph {
    /// The vertex for a range dependency, installing it on first use.
    ///
    /// Finite ranges first look for the largest already-materialised
    /// sub-range to lean on; only the remainder gets cell-level edges. With
    /// no sub-range available the vertex is flagged brute-force and every
    /// covered cell is wired directly. Infinite ranges connect the cells
    /// that currently exist and register in the per-sheet index so later
    /// cells are wired on creation.
    pub fn ensure_range_vertex(&mut self, range: AbsoluteCellRange) -> NodeId {
        if let Some(&id) = self.ranges.get(&range) {
            return id;
        }

        let id = self.alloc(Vertex::Range(RangeVertex::new(range)));
        self.ranges.insert(range, id);

        if range.is_finite() {
            self.wire_finite_range(id, range);
            self.upgrade_containing_brute_force_ranges(id, range);
        } else {
            self.wire_infinite_range(id, range);
        }
        id
    }

    fn wire_finite_range(&mut self, id: NodeId, range: AbsoluteCellRange) {
        match self.find_smaller_range(&range) {
            Some(sub_id) => {
                let sub_range = match self.vertex(sub_id) {
                    Some(Vertex::Range(rv)) => rv.range,
                    _ => unreachable!("find_smaller_range returns range vertices"),
                };
                self.add_edge(sub_id, id);
                for addr in range.addresses_outside(&sub_range) {
                    let cell = self.ensure_cell_vertex(addr);
                    self.add_edge(cell, id);
                }
                if let Some(Vertex::Range(rv)) = self.vertex_mut(id) {
                    rv.brute_force = false;
                    rv.smaller_range = Some(sub_id);
                }
            }
            None => {
                for addr in range.addresses() {
                    let cell = self.ensure_cell_vertex(addr);
                    self.add_edge(cell, id);
                }
                if let Some(Vertex::Range(rv)) = self.vertex_mut(id) {
                    rv.brute_force = true;
                    rv.smaller_range = None;
                }
            }
        }
    }

    fn wire_infinite_range(&mut self, id: NodeId, range: AbsoluteCellRange) {
        let members: Vec<NodeId> = self
            .cells
            .iter()
            .filter(|(addr, _)| range.contains(**addr))
            .map(|(_, &cell_id)| cell_id)
            .collect();
        for cell_id in members {
            self.add_edge(cell_id, id);
        }
        if let Some(Vertex::Range(rv)) = self.vertex_mut(id) {
            rv.brute_force = true;
        }
        self.infinite_ranges.entry(range.sheet()).or_default().insert(id);
    }

    /// The largest materialised finite range strictly inside `range`.
    ///
    /// Ties break on coordinates so installation order cannot change the
    /// resulting topology.
    pub(crate) fn find_smaller_range(&self, range: &AbsoluteCellRange) -> Option<NodeId> {
        let mut best: Option<(usize, AbsoluteCellRange, NodeId)> = None;
        for (&candidate, &id) in &self.ranges {
            if candidate == *range || !candidate.is_finite() {
                continue;
            }
            if !range.contains_range(&candidate) {
                continue;
            }
            let size = candidate.size();
            let key = (
                candidate.start.row,
                candidate.start.col,
                candidate.end.row,
                candidate.end.col,
            );
            let better = match &best {
                None => true,
                Some((best_size, best_range, _)) => {
                    let best_key = (
                        best_range.start.row,
                        best_range.start.col,
                        best_range.end.row,
                        best_range.end.col,
                    );
                    size > *best_size || (size == *best_size && key < best_key)
                }
            };
            if better {
                best = Some((size, candidate, id));
            }
        }
        best.map(|(_, _, id)| id)
    }

    /// A newly materialised sub-range lets brute-force supersets shed their
    /// covered cell edges and take the hierarchical edge instead.
    fn upgrade_containing_brute_force_ranges(
        &mut self,
        new_id: NodeId,
        new_range: AbsoluteCellRange,
    ) {
        let candidates: Vec<(AbsoluteCellRange, NodeId)> = self
            .ranges
            .iter()
            .filter(|(r, &id)| {
                id != new_id
                    && r.is_finite()
                    && **r != new_range
                    && r.contains_range(&new_range)
            })
            .map(|(r, &id)| (*r, id))
            .collect();

        for (_, super_id) in candidates {
            let is_brute = matches!(
                self.vertex(super_id),
                Some(Vertex::Range(rv)) if rv.brute_force
            );
            if !is_brute {
                continue;
            }
            for addr in new_range.addresses() {
                if let Some(&cell_id) = self.cells.get(&addr) {
                    self.remove_edge(cell_id, super_id);
                }
            }
            self.add_edge(new_id, super_id);
            if let Some(Vertex::Range(rv)) = self.vertex_mut(super_id) {
                rv.brute_force = false;
                rv.smaller_range = Some(new_id);
            }
        }
    }

    /// Wire a freshly created cell vertex into every infinite range covering
    /// it.
    pub(crate) fn correct_infinite_ranges_dependency(
        &mut self,
        addr: SimpleCellAddress,
        id: NodeId,
    ) {
        let Some(set) = self.infinite_ranges.get(&addr.sheet) else {
            return;
        };
        let mut matching: Vec<NodeId> = set
            .iter()
            .copied()
            .filter(|&range_id| match self.vertex(range_id) {
                Some(Vertex::Range(rv)) => rv.range.contains(addr),
                _ => false,
            })
            .collect();
        matching.sort();
        for range_id in matching {
            self.add_edge(id, range_id);
        }
    }

    /// Drop and rebuild a range vertex's incoming edges. Used after
    /// structural edits change what the range covers.
    pub(crate) fn rewire_range_vertex(&mut self, id: NodeId) {
        let Some(Vertex::Range(rv)) = self.vertex(id) else {
            return;
        };
        let range = rv.range;

        let preds: Vec<NodeId> = self.precedents[id.index()].drain().collect();
        for p in preds {
            self.dependents[p.index()].remove(&id);
        }
        if let Some(Vertex::Range(rv)) = self.vertex_mut(id) {
            rv.smaller_range = None;
            rv.cached_fns.clear();
        }

        if range.is_finite() {
            self.wire_finite_range(id, range);
        } else {
            self.wire_infinite_range(id, range);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FormulaInstall, GraphDep};
    use crate::parser::Ast;
    use std::sync::Arc;

    fn addr(col: u32, row: u32) -> SimpleCellAddress {
        SimpleCellAddress::new(0, col, row)
    }

    fn range(start: (u32, u32), end: (u32, u32)) -> AbsoluteCellRange {
        AbsoluteCellRange::new(addr(start.0, start.1), addr(end.0, end.1))
    }

    fn formula_over(graph: &mut DependencyGraph, at: (u32, u32), dep: GraphDep) -> NodeId {
        graph.set_formula(
            addr(at.0, at.1),
            FormulaInstall {
                ast: Arc::new(Ast::Number(0.0)),
                raw_text: "=0".to_string(),
                version: 0,
                deps: vec![dep],
                volatile: false,
                structural: false,
                array: false,
            },
        )
    }

    #[test]
    fn first_range_is_brute_force() {
        let mut graph = DependencyGraph::new();
        let r = range((0, 0), (0, 9)); // A1:A10
        formula_over(&mut graph, (1, 0), GraphDep::Range(r));

        let rv = graph.range_vertex(&r).expect("range vertex exists");
        assert!(rv.brute_force);
        assert_eq!(rv.smaller_range, None);
        let id = graph.range_vertex_id(&r).unwrap();
        assert_eq!(graph.precedent_ids(id).len(), 10);
    }

    #[test]
    fn sub_range_shares_hierarchically() {
        let mut graph = DependencyGraph::new();
        let small = range((0, 0), (0, 4)); // A1:A5
        let large = range((0, 0), (0, 9)); // A1:A10
        formula_over(&mut graph, (1, 0), GraphDep::Range(small));
        formula_over(&mut graph, (1, 1), GraphDep::Range(large));

        let small_id = graph.range_vertex_id(&small).unwrap();
        let large_id = graph.range_vertex_id(&large).unwrap();

        let large_rv = graph.range_vertex(&large).unwrap();
        assert!(!large_rv.brute_force);
        assert_eq!(large_rv.smaller_range, Some(small_id));

        // Edge small -> large, plus cell edges only for A6:A10.
        let preds = graph.precedent_ids(large_id);
        assert!(preds.contains(&small_id));
        assert_eq!(preds.len(), 6);
    }

    #[test]
    fn later_sub_range_upgrades_brute_force_superset() {
        let mut graph = DependencyGraph::new();
        let large = range((0, 0), (0, 9));
        let small = range((0, 0), (0, 4));
        formula_over(&mut graph, (1, 0), GraphDep::Range(large));
        assert!(graph.range_vertex(&large).unwrap().brute_force);

        formula_over(&mut graph, (1, 1), GraphDep::Range(small));
        let small_id = graph.range_vertex_id(&small).unwrap();
        let large_rv = graph.range_vertex(&large).unwrap();
        assert!(!large_rv.brute_force, "superset upgraded to hierarchical");
        assert_eq!(large_rv.smaller_range, Some(small_id));
    }

    #[test]
    fn infinite_ranges_pick_up_new_cells() {
        let mut graph = DependencyGraph::new();
        let column = AbsoluteCellRange::whole_columns(0, 0, 0); // A:A
        let f = formula_over(&mut graph, (1, 0), GraphDep::Range(column));
        graph.clear_dirty();

        // A new cell in column A is wired into the range on creation.
        graph.set_value(
            addr(0, 99),
            riskgrid_model::RawCellContent::Number(5.0),
            crate::value::Value::number(5.0),
        );
        assert!(graph.is_dirty(f), "formula over A:A sees the new cell");

        let range_id = graph.range_vertex_id(&column).unwrap();
        let cell_id = graph.id_at(addr(0, 99)).unwrap();
        assert!(graph.precedent_ids(range_id).contains(&cell_id));
    }

    #[test]
    fn unreferenced_ranges_are_collected() {
        let mut graph = DependencyGraph::new();
        let r = range((0, 0), (0, 4));
        formula_over(&mut graph, (1, 0), GraphDep::Range(r));
        assert!(graph.range_vertex(&r).is_some());

        graph.set_empty(addr(1, 0));
        assert!(
            graph.range_vertex(&r).is_none(),
            "range vertex released with its last dependent"
        );
    }
}
