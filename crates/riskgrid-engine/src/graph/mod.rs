//! The dependency graph: an arena of vertices indexed by [`NodeId`], with
//! adjacency stored as hash sets of ids. Ownership of every vertex lies with
//! the arena; cells, ranges and the infinite-range index hold only handles.
//!
//! Edges point from a precedent to its dependents (`dep -> formula`), so
//! dirty marking and the volatile closure walk forwards.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use riskgrid_model::{
    AbsoluteCellRange, ErrorKind, RawCellContent, SheetId, SimpleCellAddress,
};

use crate::parser::{Ast, ParsingError};
use crate::value::{CellError, Value};

pub mod edits;
mod ranges;
mod topsort;
mod vertex;

pub use topsort::{top_sort_with_scc, TopSortResult};
pub use vertex::{ArrayVertex, FormulaVertex, NodeId, RangeVertex, Vertex};

/// A resolved dependency ready for edge installation.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphDep {
    Cell(SimpleCellAddress),
    Range(AbsoluteCellRange),
}

/// Everything needed to install a formula vertex.
#[derive(Clone, Debug)]
pub struct FormulaInstall {
    pub ast: Arc<Ast>,
    pub raw_text: String,
    pub version: u32,
    pub deps: Vec<GraphDep>,
    pub volatile: bool,
    pub structural: bool,
    /// Entered as an array formula (`{=…}`): owns a spill rectangle.
    pub array: bool,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    arena: Vec<Option<Vertex>>,
    /// Out-edges: vertex -> vertices that depend on it.
    dependents: Vec<HashSet<NodeId>>,
    /// In-edges: vertex -> its precedents.
    precedents: Vec<HashSet<NodeId>>,
    free: Vec<NodeId>,
    cells: HashMap<SimpleCellAddress, NodeId>,
    ranges: HashMap<AbsoluteCellRange, NodeId>,
    /// Infinite ranges per sheet, so newly created cells can be wired in.
    infinite_ranges: HashMap<SheetId, HashSet<NodeId>>,
    dirty: HashSet<NodeId>,
    volatile: HashSet<NodeId>,
    structural: HashSet<NodeId>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ----- arena plumbing -------------------------------------------------

    fn alloc(&mut self, vertex: Vertex) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.arena[id.index()] = Some(vertex);
            self.dependents[id.index()].clear();
            self.precedents[id.index()].clear();
            return id;
        }
        let id = NodeId(self.arena.len() as u32);
        self.arena.push(Some(vertex));
        self.dependents.push(HashSet::new());
        self.precedents.push(HashSet::new());
        id
    }

    fn dealloc(&mut self, id: NodeId) {
        self.arena[id.index()] = None;
        self.dependents[id.index()].clear();
        self.precedents[id.index()].clear();
        self.dirty.remove(&id);
        self.volatile.remove(&id);
        self.structural.remove(&id);
        self.free.push(id);
    }

    #[must_use]
    pub fn vertex(&self, id: NodeId) -> Option<&Vertex> {
        self.arena.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn vertex_mut(&mut self, id: NodeId) -> Option<&mut Vertex> {
        self.arena.get_mut(id.index()).and_then(Option::as_mut)
    }

    #[must_use]
    pub fn id_at(&self, addr: SimpleCellAddress) -> Option<NodeId> {
        self.cells.get(&addr).copied()
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn dependent_set(&self, id: NodeId) -> &HashSet<NodeId> {
        &self.dependents[id.index()]
    }

    /// Every live vertex id, ascending. Used by the scheduler.
    pub(crate) fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.arena
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|_| NodeId(i as u32)))
    }

    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.dependents[from.index()].insert(to);
        self.precedents[to.index()].insert(from);
    }

    pub(crate) fn remove_edge(&mut self, from: NodeId, to: NodeId) {
        self.dependents[from.index()].remove(&to);
        self.precedents[to.index()].remove(&from);
    }

    /// Direct dependents, sorted for deterministic iteration.
    #[must_use]
    pub fn dependent_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.dependents[id.index()].iter().copied().collect();
        out.sort();
        out
    }

    /// Direct precedents, sorted for deterministic iteration.
    #[must_use]
    pub fn precedent_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.precedents[id.index()].iter().copied().collect();
        out.sort();
        out
    }

    // ----- cell vertex lifecycle -----------------------------------------

    /// The vertex for `addr`, creating an `Empty` placeholder if the cell
    /// has never been written. New vertices are wired into any infinite
    /// ranges covering them.
    pub fn ensure_cell_vertex(&mut self, addr: SimpleCellAddress) -> NodeId {
        if let Some(id) = self.cells.get(&addr) {
            return *id;
        }
        let id = self.alloc(Vertex::Empty);
        self.cells.insert(addr, id);
        self.correct_infinite_ranges_dependency(addr, id);
        id
    }

    /// Replace the vertex at `addr`, preserving its dependents (anything
    /// that referenced the address keeps its edge) and dropping its old
    /// precedents.
    fn replace_cell_vertex(&mut self, addr: SimpleCellAddress, vertex: Vertex) -> NodeId {
        if let Some(&id) = self.cells.get(&addr) {
            if matches!(self.vertex(id), Some(Vertex::Array(_))) {
                self.release_array_rectangle(id);
                self.cells.insert(addr, id);
            }
            self.detach_precedents(id);
            self.volatile.remove(&id);
            self.structural.remove(&id);
            self.arena[id.index()] = Some(vertex);
            return id;
        }
        let id = self.alloc(vertex);
        self.cells.insert(addr, id);
        self.correct_infinite_ranges_dependency(addr, id);
        id
    }

    fn detach_precedents(&mut self, id: NodeId) {
        let preds: Vec<NodeId> = self.precedents[id.index()].drain().collect();
        for p in preds {
            self.dependents[p.index()].remove(&id);
            self.collect_unused_range(p);
            self.collect_unused_empty(p);
        }
    }

    /// An `Empty` placeholder exists only while something depends on it.
    fn collect_unused_empty(&mut self, id: NodeId) {
        if !matches!(self.vertex(id), Some(Vertex::Empty)) {
            return;
        }
        if !self.dependents[id.index()].is_empty() {
            return;
        }
        if let Some(addr) = self.find_address_of(id) {
            self.cells.remove(&addr);
        }
        self.dealloc(id);
    }

    /// A range vertex with no remaining dependents is garbage.
    fn collect_unused_range(&mut self, id: NodeId) {
        if !matches!(self.vertex(id), Some(Vertex::Range(_))) {
            return;
        }
        if !self.dependents[id.index()].is_empty() {
            return;
        }
        let Some(Vertex::Range(rv)) = self.vertex(id) else {
            return;
        };
        let range = rv.range;
        self.ranges.remove(&range);
        if !range.is_finite() {
            if let Some(set) = self.infinite_ranges.get_mut(&range.sheet()) {
                set.remove(&id);
            }
        }
        self.detach_precedents(id);
        self.dealloc(id);
    }

    /// Install a literal value cell.
    pub fn set_value(&mut self, addr: SimpleCellAddress, raw: RawCellContent, parsed: Value) {
        let id = self.replace_cell_vertex(addr, Vertex::Value { raw, parsed });
        self.mark_vertex_dirty(id);
    }

    /// Install a formula (or array formula) cell and its edges.
    pub fn set_formula(&mut self, addr: SimpleCellAddress, install: FormulaInstall) -> NodeId {
        let vertex = if install.array {
            Vertex::Array(ArrayVertex {
                corner: addr,
                width: 1,
                height: 1,
                ast: install.ast,
                raw_text: install.raw_text,
                version: install.version,
                no_space: false,
                cached_result: None,
            })
        } else {
            Vertex::Formula(FormulaVertex {
                address: addr,
                ast: install.ast,
                raw_text: install.raw_text,
                version: install.version,
                cached_value: None,
            })
        };
        let id = self.replace_cell_vertex(addr, vertex);

        for dep in &install.deps {
            match dep {
                GraphDep::Cell(cell) => {
                    let dep_id = self.ensure_cell_vertex(*cell);
                    self.add_edge(dep_id, id);
                }
                GraphDep::Range(range) => {
                    let dep_id = self.ensure_range_vertex(*range);
                    self.add_edge(dep_id, id);
                }
            }
        }

        if install.volatile {
            self.volatile.insert(id);
        }
        if install.structural {
            self.structural.insert(id);
        }
        self.mark_vertex_dirty(id);
        id
    }

    /// Install a retained parse failure.
    pub fn set_parsing_error(
        &mut self,
        addr: SimpleCellAddress,
        errors: Vec<ParsingError>,
        raw_text: String,
    ) {
        let id = self.replace_cell_vertex(addr, Vertex::ParsingError { errors, raw_text });
        self.mark_vertex_dirty(id);
    }

    /// Clear a cell. The vertex survives as an `Empty` placeholder while
    /// anything still depends on it, and disappears entirely otherwise.
    pub fn set_empty(&mut self, addr: SimpleCellAddress) {
        let Some(&id) = self.cells.get(&addr) else {
            return;
        };
        if matches!(self.vertex(id), Some(Vertex::Array(_))) {
            self.release_array_rectangle(id);
            self.cells.insert(addr, id);
        }
        self.detach_precedents(id);
        self.volatile.remove(&id);
        self.structural.remove(&id);
        if self.dependents[id.index()].is_empty() {
            self.cells.remove(&addr);
            self.dealloc(id);
        } else {
            self.arena[id.index()] = Some(Vertex::Empty);
            self.mark_vertex_dirty(id);
        }
    }

    // ----- dirtiness and recompute sets ----------------------------------

    /// Mark a vertex and every transitive dependent dirty. Range caches
    /// along the way are invalidated.
    pub fn mark_vertex_dirty(&mut self, id: NodeId) {
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !self.dirty.insert(current) {
                continue;
            }
            if let Some(Vertex::Range(rv)) = self.vertex_mut(current) {
                rv.cached_fns.clear();
            }
            for &dep in &self.dependents[current.index()] {
                if !self.dirty.contains(&dep) {
                    queue.push_back(dep);
                }
            }
        }
    }

    pub fn mark_cell_dirty(&mut self, addr: SimpleCellAddress) {
        if let Some(&id) = self.cells.get(&addr) {
            self.mark_vertex_dirty(id);
        }
    }

    /// Mark every structural-change-dependent vertex dirty (after row or
    /// column edits).
    pub fn mark_structural_dependents_dirty(&mut self) {
        let ids: Vec<NodeId> = self.structural.iter().copied().collect();
        for id in ids {
            self.mark_vertex_dirty(id);
        }
    }

    /// The set of vertices the next recompute must evaluate: the dirty set
    /// plus the volatile closure (volatile vertices re-evaluate even when
    /// their inputs are unchanged).
    #[must_use]
    pub fn verts_to_recompute(&mut self) -> HashSet<NodeId> {
        let mut seed: Vec<NodeId> = self.volatile.iter().copied().collect();
        seed.sort();
        for id in seed {
            self.mark_vertex_dirty(id);
        }
        self.dirty.clone()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    #[must_use]
    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.dirty.contains(&id)
    }

    #[must_use]
    pub fn volatile_ids(&self) -> &HashSet<NodeId> {
        &self.volatile
    }

    // ----- value access ---------------------------------------------------

    /// The scalar value visible at a cell address.
    #[must_use]
    pub fn get_scalar_value(&self, addr: SimpleCellAddress) -> Value {
        let Some(&id) = self.cells.get(&addr) else {
            return Value::Empty;
        };
        match self.vertex(id) {
            Some(Vertex::Value { parsed, .. }) => parsed.clone(),
            Some(Vertex::Formula(f)) => f.cached_value.clone().unwrap_or(Value::Empty),
            Some(Vertex::Array(a)) => a.value_at(addr),
            Some(Vertex::Empty) | None => Value::Empty,
            Some(Vertex::ParsingError { errors, .. }) => {
                let detail = errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "malformed formula".to_string());
                Value::Error(CellError::with_message(
                    ErrorKind::Error,
                    format!("parse error: {detail}"),
                ))
            }
            Some(Vertex::Range(_)) => Value::Empty,
        }
    }

    /// Store a computed scalar result on a formula vertex.
    pub fn set_formula_value(&mut self, id: NodeId, value: Value) {
        if let Some(Vertex::Formula(f)) = self.vertex_mut(id) {
            f.cached_value = Some(value);
        }
    }

    // ----- sheet geometry -------------------------------------------------

    /// One past the last occupied row, or 0 for an untouched sheet.
    #[must_use]
    pub fn get_sheet_height(&self, sheet: SheetId) -> u32 {
        self.cells
            .keys()
            .filter(|addr| addr.sheet == sheet)
            .map(|addr| addr.row + 1)
            .max()
            .unwrap_or(0)
    }

    /// One past the last occupied column, or 0 for an untouched sheet.
    #[must_use]
    pub fn get_sheet_width(&self, sheet: SheetId) -> u32 {
        self.cells
            .keys()
            .filter(|addr| addr.sheet == sheet)
            .map(|addr| addr.col + 1)
            .max()
            .unwrap_or(0)
    }

    /// All occupied addresses of a sheet, sorted row-major.
    #[must_use]
    pub fn sheet_addresses(&self, sheet: SheetId) -> Vec<SimpleCellAddress> {
        let mut out: Vec<SimpleCellAddress> = self
            .cells
            .keys()
            .filter(|addr| addr.sheet == sheet)
            .copied()
            .collect();
        out.sort_by_key(|a| (a.row, a.col));
        out
    }

    // ----- array spill management ----------------------------------------

    /// Try to claim the rectangle for an array result. Returns `false`
    /// (leaving the vertex `no_space`) when any non-corner cell is occupied
    /// by a non-empty vertex.
    pub fn claim_array_rectangle(&mut self, id: NodeId, width: u32, height: u32) -> bool {
        let Some(Vertex::Array(array)) = self.vertex(id) else {
            return false;
        };
        let corner = array.corner;
        let old_rect = array.rectangle();

        let end = SimpleCellAddress::new(
            corner.sheet,
            corner.col + width.saturating_sub(1),
            corner.row + height.saturating_sub(1),
        );
        let rect = AbsoluteCellRange::new(corner, end);

        // Check occupancy before touching anything.
        for addr in rect.addresses() {
            if addr == corner {
                continue;
            }
            match self.cells.get(&addr).map(|&cid| (cid, self.vertex(cid))) {
                None => {}
                Some((cid, _)) if cid == id => {}
                Some((_, Some(Vertex::Empty))) => {}
                _ => {
                    if let Some(Vertex::Array(array)) = self.vertex_mut(id) {
                        array.no_space = true;
                        array.width = 1;
                        array.height = 1;
                    }
                    return false;
                }
            }
        }

        // Release cells of the old rectangle no longer covered.
        for addr in old_rect.addresses() {
            if addr != corner && !rect.contains(addr) && self.cells.get(&addr) == Some(&id) {
                self.cells.remove(&addr);
            }
        }

        // Claim, migrating edges from any placeholder vertices swallowed by
        // the rectangle.
        for addr in rect.addresses() {
            if addr == corner {
                continue;
            }
            match self.cells.get(&addr).copied() {
                Some(existing) if existing != id => {
                    let deps: Vec<NodeId> =
                        self.dependents[existing.index()].iter().copied().collect();
                    for dep in deps {
                        self.remove_edge(existing, dep);
                        self.add_edge(id, dep);
                    }
                    self.dealloc(existing);
                    self.cells.insert(addr, id);
                }
                Some(_) => {}
                None => {
                    self.cells.insert(addr, id);
                    self.correct_infinite_ranges_dependency(addr, id);
                }
            }
        }

        if let Some(Vertex::Array(array)) = self.vertex_mut(id) {
            array.no_space = false;
            array.width = width;
            array.height = height;
        }
        true
    }

    /// Give back every non-corner cell of an array's rectangle.
    fn release_array_rectangle(&mut self, id: NodeId) {
        let Some(Vertex::Array(array)) = self.vertex(id) else {
            return;
        };
        let corner = array.corner;
        let rect = array.rectangle();
        for addr in rect.addresses() {
            if addr != corner && self.cells.get(&addr) == Some(&id) {
                self.cells.remove(&addr);
            }
        }
    }

    // ----- introspection --------------------------------------------------

    /// The range vertex id for an exact range, if one is materialised.
    #[must_use]
    pub fn range_vertex_id(&self, range: &AbsoluteCellRange) -> Option<NodeId> {
        self.ranges.get(range).copied()
    }

    #[must_use]
    pub fn range_vertex(&self, range: &AbsoluteCellRange) -> Option<&RangeVertex> {
        let id = self.range_vertex_id(range)?;
        match self.vertex(id) {
            Some(Vertex::Range(rv)) => Some(rv),
            _ => None,
        }
    }

    /// Reverse lookup of a vertex's cell address. Linear; intended for
    /// introspection, not hot paths.
    #[must_use]
    pub fn find_address_of(&self, id: NodeId) -> Option<SimpleCellAddress> {
        self.cells
            .iter()
            .find(|(_, &cid)| cid == id)
            .map(|(addr, _)| *addr)
    }

    /// Number of live vertices (all kinds).
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.arena.iter().filter(|v| v.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Ast;

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
    fn empty_vertex_exists_only_while_referenced() {
        let mut graph = DependencyGraph::new();
        // B1 = =A1 creates an Empty vertex for A1.
        graph.set_formula(addr(1, 0), install(vec![GraphDep::Cell(addr(0, 0))]));
        let a1 = graph.id_at(addr(0, 0)).expect("A1 vertex must exist");
        assert!(graph.vertex(a1).unwrap().is_empty_placeholder());

        // Clearing B1 releases A1 as well.
        graph.set_empty(addr(1, 0));
        assert_eq!(graph.id_at(addr(0, 0)), None);
    }

    #[test]
    fn formula_predecessors_match_installed_deps() {
        let mut graph = DependencyGraph::new();
        let f = graph.set_formula(
            addr(2, 0),
            install(vec![
                GraphDep::Cell(addr(0, 0)),
                GraphDep::Cell(addr(1, 0)),
            ]),
        );
        let preds = graph.precedent_ids(f);
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0], graph.id_at(addr(0, 0)).unwrap());
        assert_eq!(preds[1], graph.id_at(addr(1, 0)).unwrap());
    }

    #[test]
    fn reinstalling_a_formula_rewires_edges() {
        let mut graph = DependencyGraph::new();
        let f = graph.set_formula(addr(2, 0), install(vec![GraphDep::Cell(addr(0, 0))]));
        let f2 = graph.set_formula(addr(2, 0), install(vec![GraphDep::Cell(addr(1, 0))]));
        assert_eq!(f, f2, "the vertex id is reused for the same cell");
        let preds = graph.precedent_ids(f);
        assert_eq!(preds, vec![graph.id_at(addr(1, 0)).unwrap()]);
        // The old dependency was an unreferenced Empty vertex; it is gone.
        assert_eq!(graph.id_at(addr(0, 0)), None);
    }

    #[test]
    fn dirty_propagates_to_transitive_dependents() {
        let mut graph = DependencyGraph::new();
        graph.set_value(addr(0, 0), RawCellContent::Number(1.0), Value::number(1.0));
        let b = graph.set_formula(addr(1, 0), install(vec![GraphDep::Cell(addr(0, 0))]));
        let c = graph.set_formula(addr(2, 0), install(vec![GraphDep::Cell(addr(1, 0))]));
        graph.clear_dirty();

        graph.mark_cell_dirty(addr(0, 0));
        assert!(graph.is_dirty(b));
        assert!(graph.is_dirty(c));
    }

    #[test]
    fn volatile_vertices_always_recompute() {
        let mut graph = DependencyGraph::new();
        let mut volatile_install = install(vec![]);
        volatile_install.volatile = true;
        let rand = graph.set_formula(addr(0, 0), volatile_install);
        let dep = graph.set_formula(addr(1, 0), install(vec![GraphDep::Cell(addr(0, 0))]));
        graph.clear_dirty();

        let to_recompute = graph.verts_to_recompute();
        assert!(to_recompute.contains(&rand));
        assert!(
            to_recompute.contains(&dep),
            "dependents of volatile vertices recompute too"
        );
    }

    #[test]
    fn sheet_dimensions() {
        let mut graph = DependencyGraph::new();
        graph.set_value(addr(3, 9), RawCellContent::Number(1.0), Value::number(1.0));
        assert_eq!(graph.get_sheet_width(0), 4);
        assert_eq!(graph.get_sheet_height(0), 10);
        assert_eq!(graph.get_sheet_width(7), 0);
    }
}
