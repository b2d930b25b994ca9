//! Structural edits: inserting and removing rows/columns, removing and
//! clearing sheets, moving cell blocks — plus the lazy AST-transform
//! service that rewrites stored formulas to match.
//!
//! Edits adjust the address mapping, vertex-internal addresses and range
//! vertices eagerly (edges are `NodeId`-based and move with their
//! vertices). Formula ASTs are rewritten lazily: each vertex carries a
//! version, and [`LazyTransformService::ensure_recent`] replays the changes
//! it has missed right before evaluation.

use std::collections::HashSet;

use riskgrid_model::{
    AbsoluteCellRange, CellAddress, CellCoord, ErrorKind, SheetId, SimpleCellAddress, UNBOUNDED,
};

use super::vertex::{NodeId, Vertex};
use super::DependencyGraph;
use crate::parser::{Ast, ColumnAddress, RowAddress};

/// The axis a row/column edit operates on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

impl Axis {
    fn get(self, addr: SimpleCellAddress) -> u32 {
        match self {
            Axis::Row => addr.row,
            Axis::Column => addr.col,
        }
    }

    fn set(self, addr: SimpleCellAddress, value: u32) -> SimpleCellAddress {
        match self {
            Axis::Row => SimpleCellAddress::new(addr.sheet, addr.col, value),
            Axis::Column => SimpleCellAddress::new(addr.sheet, value, addr.row),
        }
    }
}

/// One recorded structural change, replayable against stored ASTs.
#[derive(Clone, Debug, PartialEq)]
pub enum StructuralChange {
    Added {
        sheet: SheetId,
        axis: Axis,
        at: u32,
        count: u32,
    },
    Removed {
        sheet: SheetId,
        axis: Axis,
        at: u32,
        count: u32,
    },
    RemovedSheet {
        sheet: SheetId,
    },
    /// Same-sheet block move; `target` is the new top-left corner.
    Moved {
        source: AbsoluteCellRange,
        target: SimpleCellAddress,
    },
}

/// What a structural change did to a concrete address.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AddressUpdate {
    Unchanged,
    Moved(SimpleCellAddress),
    Removed,
}

impl StructuralChange {
    /// Map an address forward across this change.
    #[must_use]
    pub fn apply_to_address(&self, addr: SimpleCellAddress) -> AddressUpdate {
        match *self {
            StructuralChange::Added {
                sheet,
                axis,
                at,
                count,
            } => {
                if addr.sheet != sheet {
                    return AddressUpdate::Unchanged;
                }
                let coord = axis.get(addr);
                if coord >= at {
                    AddressUpdate::Moved(axis.set(addr, coord + count))
                } else {
                    AddressUpdate::Unchanged
                }
            }
            StructuralChange::Removed {
                sheet,
                axis,
                at,
                count,
            } => {
                if addr.sheet != sheet {
                    return AddressUpdate::Unchanged;
                }
                let coord = axis.get(addr);
                if coord >= at + count {
                    AddressUpdate::Moved(axis.set(addr, coord - count))
                } else if coord >= at {
                    AddressUpdate::Removed
                } else {
                    AddressUpdate::Unchanged
                }
            }
            StructuralChange::RemovedSheet { sheet } => {
                if addr.sheet == sheet {
                    AddressUpdate::Removed
                } else {
                    AddressUpdate::Unchanged
                }
            }
            StructuralChange::Moved { source, target } => {
                let (col_delta, row_delta) = move_delta(source, target);
                if source.contains(addr) {
                    let moved = addr
                        .moved(col_delta, row_delta)
                        .expect("move target fits the sheet");
                    return AddressUpdate::Moved(moved);
                }
                let target_rect = moved_rectangle(source, target);
                if target_rect.contains(addr) {
                    // Overwritten by the moved block.
                    AddressUpdate::Removed
                } else {
                    AddressUpdate::Unchanged
                }
            }
        }
    }

    /// Recover the address a *surviving* vertex had before this change.
    #[must_use]
    pub fn address_before(&self, addr: SimpleCellAddress) -> SimpleCellAddress {
        match *self {
            StructuralChange::Added {
                sheet,
                axis,
                at,
                count,
            } => {
                if addr.sheet != sheet {
                    return addr;
                }
                let coord = axis.get(addr);
                if coord >= at + count {
                    axis.set(addr, coord - count)
                } else {
                    addr
                }
            }
            StructuralChange::Removed {
                sheet,
                axis,
                at,
                count,
            } => {
                if addr.sheet != sheet {
                    return addr;
                }
                let coord = axis.get(addr);
                if coord >= at {
                    axis.set(addr, coord + count)
                } else {
                    addr
                }
            }
            StructuralChange::RemovedSheet { .. } => addr,
            StructuralChange::Moved { source, target } => {
                let target_rect = moved_rectangle(source, target);
                if target_rect.contains(addr) {
                    let (col_delta, row_delta) = move_delta(source, target);
                    addr.moved(-col_delta, -row_delta)
                        .expect("moved block came from the sheet")
                } else {
                    addr
                }
            }
        }
    }

    /// Rewrite an AST for this change. `formula_addr` is the owning
    /// formula's address *at the time of the change* (before it applied).
    #[must_use]
    pub fn transform_ast(&self, ast: &Ast, formula_addr: SimpleCellAddress) -> Ast {
        let formula_after = match self.apply_to_address(formula_addr) {
            AddressUpdate::Unchanged => formula_addr,
            AddressUpdate::Moved(a) => a,
            // A formula in a removed region has no vertex left to transform.
            AddressUpdate::Removed => formula_addr,
        };
        let ctx = TransformCtx {
            change: self,
            before: formula_addr,
            after: formula_after,
        };
        ctx.node(ast)
    }
}

fn move_delta(source: AbsoluteCellRange, target: SimpleCellAddress) -> (i64, i64) {
    (
        i64::from(target.col) - i64::from(source.start.col),
        i64::from(target.row) - i64::from(source.start.row),
    )
}

fn moved_rectangle(source: AbsoluteCellRange, target: SimpleCellAddress) -> AbsoluteCellRange {
    let end = SimpleCellAddress::new(
        target.sheet,
        target.col + source.width() - 1,
        target.row + source.height() - 1,
    );
    AbsoluteCellRange::new(target, end)
}

struct TransformCtx<'a> {
    change: &'a StructuralChange,
    before: SimpleCellAddress,
    after: SimpleCellAddress,
}

impl TransformCtx<'_> {
    fn node(&self, ast: &Ast) -> Ast {
        match ast {
            Ast::CellReference(addr) => self.cell_reference(*addr),
            Ast::CellRange { start, end } => self.cell_range(*start, *end),
            Ast::ColumnRange { start, end } => self.column_range(*start, *end),
            Ast::RowRange { start, end } => self.row_range(*start, *end),
            Ast::FunctionCall { name, args } => Ast::FunctionCall {
                name: name.clone(),
                args: args.iter().map(|a| self.node(a)).collect(),
            },
            Ast::ArrayLiteral(rows) => Ast::ArrayLiteral(
                rows.iter()
                    .map(|row| row.iter().map(|el| self.node(el)).collect())
                    .collect(),
            ),
            Ast::Parenthesis(inner) => Ast::Parenthesis(Box::new(self.node(inner))),
            Ast::Unary { op, expr } => Ast::Unary {
                op: *op,
                expr: Box::new(self.node(expr)),
            },
            Ast::Binary { op, left, right } => Ast::Binary {
                op: *op,
                left: Box::new(self.node(left)),
                right: Box::new(self.node(right)),
            },
            other => other.clone(),
        }
    }

    fn cell_reference(&self, reference: CellAddress) -> Ast {
        let Some(target) = reference.resolve(self.before) else {
            return Ast::CellReference(reference);
        };
        let new_target = match self.change.apply_to_address(target) {
            AddressUpdate::Removed => return Ast::Error(ErrorKind::Ref),
            AddressUpdate::Moved(t) => t,
            AddressUpdate::Unchanged => target,
        };
        Ast::CellReference(self.rebuild(reference, new_target))
    }

    fn rebuild(&self, reference: CellAddress, target: SimpleCellAddress) -> CellAddress {
        CellAddress {
            sheet: reference.sheet,
            col: match reference.col {
                CellCoord::Absolute(_) => CellCoord::Absolute(target.col),
                CellCoord::Relative(_) => {
                    CellCoord::Relative(i64::from(target.col) - i64::from(self.after.col))
                }
            },
            row: match reference.row {
                CellCoord::Absolute(_) => CellCoord::Absolute(target.row),
                CellCoord::Relative(_) => {
                    CellCoord::Relative(i64::from(target.row) - i64::from(self.after.row))
                }
            },
        }
    }

    fn cell_range(&self, start: CellAddress, end: CellAddress) -> Ast {
        let (Some(s), Some(e)) = (start.resolve(self.before), end.resolve(self.before)) else {
            return Ast::CellRange { start, end };
        };

        match self.change {
            StructuralChange::RemovedSheet { sheet } => {
                if s.sheet == *sheet {
                    return Ast::Error(ErrorKind::Ref);
                }
                Ast::CellRange { start, end }
            }
            StructuralChange::Added {
                sheet, axis, at, count,
            } => {
                if s.sheet != *sheet {
                    return Ast::CellRange { start, end };
                }
                let (lo, hi) = insert_span(axis.get(s), axis.get(e), *at, *count);
                self.rebuild_range(start, end, axis.set(s, lo), axis.set(e, hi))
            }
            StructuralChange::Removed {
                sheet, axis, at, count,
            } => {
                if s.sheet != *sheet {
                    return Ast::CellRange { start, end };
                }
                match remove_span(axis.get(s), axis.get(e), *at, *count) {
                    Some((lo, hi)) => {
                        self.rebuild_range(start, end, axis.set(s, lo), axis.set(e, hi))
                    }
                    None => Ast::Error(ErrorKind::Ref),
                }
            }
            StructuralChange::Moved { source, .. } => {
                let resolved = AbsoluteCellRange::new(s, e);
                if source.contains_range(&resolved) {
                    let AddressUpdate::Moved(new_s) = self.change.apply_to_address(s) else {
                        return Ast::CellRange { start, end };
                    };
                    let AddressUpdate::Moved(new_e) = self.change.apply_to_address(e) else {
                        return Ast::CellRange { start, end };
                    };
                    return self.rebuild_range(start, end, new_s, new_e);
                }
                Ast::CellRange { start, end }
            }
        }
    }

    fn rebuild_range(
        &self,
        start: CellAddress,
        end: CellAddress,
        new_start: SimpleCellAddress,
        new_end: SimpleCellAddress,
    ) -> Ast {
        Ast::CellRange {
            start: self.rebuild(start, new_start),
            end: self.rebuild(end, new_end),
        }
    }

    fn column_range(&self, start: ColumnAddress, end: ColumnAddress) -> Ast {
        let unchanged = Ast::ColumnRange { start, end };
        let (edit_sheet, axis, at, count) = match self.change {
            StructuralChange::Added {
                sheet, axis, at, count,
            }
            | StructuralChange::Removed {
                sheet, axis, at, count,
            } => (*sheet, *axis, *at, *count),
            StructuralChange::RemovedSheet { sheet } => {
                if start.sheet.resolve(self.before.sheet) == *sheet {
                    return Ast::Error(ErrorKind::Ref);
                }
                return unchanged;
            }
            StructuralChange::Moved { .. } => return unchanged,
        };
        if axis != Axis::Column || start.sheet.resolve(self.before.sheet) != edit_sheet {
            return unchanged;
        }
        let (Some(s), Some(e)) = (
            start.col.resolve(self.before.col),
            end.col.resolve(self.before.col),
        ) else {
            return unchanged;
        };
        let span = if matches!(self.change, StructuralChange::Added { .. }) {
            Some(insert_span(s, e, at, count))
        } else {
            remove_span(s, e, at, count)
        };
        match span {
            Some((lo, hi)) => Ast::ColumnRange {
                start: ColumnAddress {
                    sheet: start.sheet,
                    col: self.rebuild_axis_coord(start.col, lo, self.after.col),
                },
                end: ColumnAddress {
                    sheet: end.sheet,
                    col: self.rebuild_axis_coord(end.col, hi, self.after.col),
                },
            },
            None => Ast::Error(ErrorKind::Ref),
        }
    }

    fn row_range(&self, start: RowAddress, end: RowAddress) -> Ast {
        let unchanged = Ast::RowRange { start, end };
        let (edit_sheet, axis, at, count) = match self.change {
            StructuralChange::Added {
                sheet, axis, at, count,
            }
            | StructuralChange::Removed {
                sheet, axis, at, count,
            } => (*sheet, *axis, *at, *count),
            StructuralChange::RemovedSheet { sheet } => {
                if start.sheet.resolve(self.before.sheet) == *sheet {
                    return Ast::Error(ErrorKind::Ref);
                }
                return unchanged;
            }
            StructuralChange::Moved { .. } => return unchanged,
        };
        if axis != Axis::Row || start.sheet.resolve(self.before.sheet) != edit_sheet {
            return unchanged;
        }
        let (Some(s), Some(e)) = (
            start.row.resolve(self.before.row),
            end.row.resolve(self.before.row),
        ) else {
            return unchanged;
        };
        let span = if matches!(self.change, StructuralChange::Added { .. }) {
            Some(insert_span(s, e, at, count))
        } else {
            remove_span(s, e, at, count)
        };
        match span {
            Some((lo, hi)) => Ast::RowRange {
                start: RowAddress {
                    sheet: start.sheet,
                    row: self.rebuild_axis_coord(start.row, lo, self.after.row),
                },
                end: RowAddress {
                    sheet: end.sheet,
                    row: self.rebuild_axis_coord(end.row, hi, self.after.row),
                },
            },
            None => Ast::Error(ErrorKind::Ref),
        }
    }

    fn rebuild_axis_coord(&self, coord: CellCoord, target: u32, after_base: u32) -> CellCoord {
        match coord {
            CellCoord::Absolute(_) => CellCoord::Absolute(target),
            CellCoord::Relative(_) => {
                CellCoord::Relative(i64::from(target) - i64::from(after_base))
            }
        }
    }
}

/// Span arithmetic for insertions: coordinates at or past the insertion
/// point shift, so straddling spans extend.
fn insert_span(lo: u32, hi: u32, at: u32, count: u32) -> (u32, u32) {
    let lo = if lo >= at { lo + count } else { lo };
    let hi = if hi >= at && hi != UNBOUNDED {
        hi + count
    } else {
        hi
    };
    (lo, hi)
}

/// Span arithmetic for removals: straddling spans truncate; fully covered
/// spans vanish.
fn remove_span(lo: u32, hi: u32, at: u32, count: u32) -> Option<(u32, u32)> {
    let end = at + count;
    let new_lo = if lo >= end {
        lo - count
    } else if lo >= at {
        at
    } else {
        lo
    };
    let new_hi = if hi == UNBOUNDED {
        UNBOUNDED
    } else if hi >= end {
        hi - count
    } else if hi >= at {
        at.checked_sub(1)?
    } else {
        hi
    };
    if new_hi != UNBOUNDED && new_hi < new_lo {
        return None;
    }
    Some((new_lo, new_hi))
}

/// Versioned log of structural changes, replayed lazily against stored
/// formula ASTs.
#[derive(Debug, Default)]
pub struct LazyTransformService {
    changes: Vec<StructuralChange>,
}

impl LazyTransformService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version: the number of recorded changes.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.changes.len() as u32
    }

    /// Record a change, returning the new version.
    pub fn record(&mut self, change: StructuralChange) -> u32 {
        self.changes.push(change);
        self.version()
    }

    /// Bring an AST up to date. `addr_now` is the owning formula's current
    /// address; `from_version` the version stored on its vertex. Returns
    /// `None` when the AST is already recent.
    #[must_use]
    pub fn ensure_recent(
        &self,
        ast: &Ast,
        addr_now: SimpleCellAddress,
        from_version: u32,
    ) -> Option<Ast> {
        let current = self.version();
        if from_version >= current {
            return None;
        }

        // Reconstruct the formula's address at each pending version by
        // walking the change log backwards from its current address.
        let pending = &self.changes[from_version as usize..];
        let mut addresses = Vec::with_capacity(pending.len());
        let mut addr = addr_now;
        for change in pending.iter().rev() {
            addr = change.address_before(addr);
            addresses.push(addr);
        }
        addresses.reverse();

        let mut ast = ast.clone();
        for (change, &addr_at_change) in pending.iter().zip(addresses.iter()) {
            ast = change.transform_ast(&ast, addr_at_change);
        }
        Some(ast)
    }
}

// ----- graph-side structural edits ---------------------------------------

impl DependencyGraph {
    /// Insert `count` rows at `row` (0-indexed).
    pub fn add_rows(&mut self, sheet: SheetId, row: u32, count: u32) {
        self.insert_span_on_sheet(sheet, Axis::Row, row, count);
    }

    /// Insert `count` columns at `col`.
    pub fn add_columns(&mut self, sheet: SheetId, col: u32, count: u32) {
        self.insert_span_on_sheet(sheet, Axis::Column, col, count);
    }

    /// Remove `count` rows starting at `row`.
    pub fn remove_rows(&mut self, sheet: SheetId, row: u32, count: u32) {
        self.remove_span_on_sheet(sheet, Axis::Row, row, count);
    }

    /// Remove `count` columns starting at `col`.
    pub fn remove_columns(&mut self, sheet: SheetId, col: u32, count: u32) {
        self.remove_span_on_sheet(sheet, Axis::Column, col, count);
    }

    fn insert_span_on_sheet(&mut self, sheet: SheetId, axis: Axis, at: u32, count: u32) {
        if count == 0 {
            return;
        }

        // Shift the address mapping.
        let moved: Vec<(SimpleCellAddress, NodeId)> = self
            .cells
            .iter()
            .filter(|(addr, _)| addr.sheet == sheet && axis.get(**addr) >= at)
            .map(|(addr, &id)| (*addr, id))
            .collect();
        for (addr, _) in &moved {
            self.cells.remove(addr);
        }
        for (addr, id) in &moved {
            let new_addr = axis.set(*addr, axis.get(*addr) + count);
            self.cells.insert(new_addr, *id);
            self.update_vertex_address(*id, new_addr);
        }

        self.adjust_ranges_for_insert(sheet, axis, at, count);
        self.mark_structural_dependents_dirty();
    }

    fn remove_span_on_sheet(&mut self, sheet: SheetId, axis: Axis, at: u32, count: u32) {
        if count == 0 {
            return;
        }

        // Delete every vertex inside the removed slab.
        let doomed: Vec<(SimpleCellAddress, NodeId)> = self
            .cells
            .iter()
            .filter(|(addr, _)| {
                addr.sheet == sheet && axis.get(**addr) >= at && axis.get(**addr) < at + count
            })
            .map(|(addr, &id)| (*addr, id))
            .collect();
        for (addr, id) in doomed {
            self.force_remove_cell(addr, id);
        }

        // Shift survivors.
        let moved: Vec<(SimpleCellAddress, NodeId)> = self
            .cells
            .iter()
            .filter(|(addr, _)| addr.sheet == sheet && axis.get(**addr) >= at + count)
            .map(|(addr, &id)| (*addr, id))
            .collect();
        for (addr, _) in &moved {
            self.cells.remove(addr);
        }
        for (addr, id) in &moved {
            let new_addr = axis.set(*addr, axis.get(*addr) - count);
            self.cells.insert(new_addr, *id);
            self.update_vertex_address(*id, new_addr);
        }

        self.adjust_ranges_for_remove(sheet, axis, at, count);
        self.mark_structural_dependents_dirty();
    }

    /// Remove a cell vertex outright, waking its dependents. Safe to call
    /// repeatedly for array vertices that appear under several addresses.
    fn force_remove_cell(&mut self, addr: SimpleCellAddress, id: NodeId) {
        if self.vertex(id).is_none() {
            self.cells.remove(&addr);
            return;
        }
        self.detach_precedents(id);
        let dependents: Vec<NodeId> = self.dependent_set(id).iter().copied().collect();
        for dep in dependents {
            self.remove_edge(id, dep);
            self.mark_vertex_dirty(dep);
        }
        // Arrays occupy their whole rectangle in the mapping.
        let covered: Vec<SimpleCellAddress> = self
            .cells
            .iter()
            .filter(|(_, &cid)| cid == id)
            .map(|(a, _)| *a)
            .collect();
        for a in covered {
            self.cells.remove(&a);
        }
        self.cells.remove(&addr);
        self.dealloc(id);
    }

    fn adjust_ranges_for_insert(&mut self, sheet: SheetId, axis: Axis, at: u32, count: u32) {
        let affected: Vec<(AbsoluteCellRange, NodeId)> = self
            .ranges
            .iter()
            .filter(|(r, _)| r.sheet() == sheet)
            .map(|(r, &id)| (*r, id))
            .collect();

        let mut resized: HashSet<NodeId> = HashSet::new();
        for (old_range, id) in &affected {
            // A range unbounded on the edit axis covers every coordinate
            // already; its shape cannot change.
            if axis.get(old_range.end) == UNBOUNDED {
                continue;
            }
            let (lo, hi) = insert_span(
                axis.get(old_range.start),
                axis.get(old_range.end),
                at,
                count,
            );
            let new_range = AbsoluteCellRange {
                start: axis.set(old_range.start, lo),
                end: axis.set(old_range.end, hi),
            };
            if new_range != *old_range {
                self.ranges.remove(old_range);
                self.ranges.insert(new_range, *id);
                if let Some(Vertex::Range(rv)) = self.vertex_mut(*id) {
                    rv.range = new_range;
                }
                let grew = (hi - lo) != axis.get(old_range.end) - axis.get(old_range.start);
                if grew {
                    resized.insert(*id);
                }
            }
        }

        self.rewire_all_ranges_on_sheet(sheet);
        for id in resized {
            self.mark_vertex_dirty(id);
        }
    }

    fn adjust_ranges_for_remove(&mut self, sheet: SheetId, axis: Axis, at: u32, count: u32) {
        let affected: Vec<(AbsoluteCellRange, NodeId)> = self
            .ranges
            .iter()
            .filter(|(r, _)| r.sheet() == sheet)
            .map(|(r, &id)| (*r, id))
            .collect();

        let mut resized: Vec<NodeId> = Vec::new();
        for (old_range, id) in &affected {
            if axis.get(old_range.end) == UNBOUNDED {
                continue;
            }
            match remove_span(
                axis.get(old_range.start),
                axis.get(old_range.end),
                at,
                count,
            ) {
                Some((lo, hi)) => {
                    let new_range = AbsoluteCellRange {
                        start: axis.set(old_range.start, lo),
                        end: axis.set(old_range.end, hi),
                    };
                    if new_range != *old_range {
                        self.ranges.remove(old_range);
                        self.ranges.insert(new_range, *id);
                        if let Some(Vertex::Range(rv)) = self.vertex_mut(*id) {
                            rv.range = new_range;
                        }
                        resized.push(*id);
                    }
                }
                    None => {
                    // The whole range was removed: its dependents now hold
                    // `#REF!` formulas (after transform) with no edge here.
                    self.remove_range_vertex_outright(*old_range, *id);
                }
            }
        }

        self.rewire_all_ranges_on_sheet(sheet);
        for id in resized {
            if self.vertex(id).is_some() {
                self.mark_vertex_dirty(id);
            }
        }
    }

    fn remove_range_vertex_outright(&mut self, range: AbsoluteCellRange, id: NodeId) {
        let dependents: Vec<NodeId> = self.dependent_set(id).iter().copied().collect();
        for dep in dependents {
            self.remove_edge(id, dep);
            self.mark_vertex_dirty(dep);
        }
        self.detach_precedents(id);
        self.ranges.remove(&range);
        if !range.is_finite() {
            if let Some(set) = self.infinite_ranges.get_mut(&range.sheet()) {
                set.remove(&id);
            }
        }
        self.dealloc(id);
    }

    /// Rebuild the incoming edges of every range vertex on a sheet, smallest
    /// ranges first. Run after any edit that changes what ranges cover.
    fn rewire_all_ranges_on_sheet(&mut self, sheet: SheetId) {
        let mut ids: Vec<(usize, AbsoluteCellRange, NodeId)> = self
            .ranges
            .iter()
            .filter(|(r, _)| r.sheet() == sheet)
            .map(|(r, &id)| (r.size(), *r, id))
            .collect();
        ids.sort_by_key(|(size, r, _)| (*size, r.start.row, r.start.col, r.end.row, r.end.col));
        for (_, _, id) in ids {
            self.rewire_range_vertex(id);
        }
    }

    /// Drop a sheet and everything on it. Cross-sheet dependents are woken
    /// and will see `#REF!` after their pending transform.
    pub fn remove_sheet(&mut self, sheet: SheetId) {
        let doomed_cells: Vec<(SimpleCellAddress, NodeId)> = self
            .cells
            .iter()
            .filter(|(addr, _)| addr.sheet == sheet)
            .map(|(addr, &id)| (*addr, id))
            .collect();
        for (addr, id) in doomed_cells {
            // Array vertices appear once per covered cell; the first removal
            // deallocates, later ones are no-ops.
            if self.vertex(id).is_some() {
                self.force_remove_cell(addr, id);
            } else {
                self.cells.remove(&addr);
            }
        }

        let doomed_ranges: Vec<(AbsoluteCellRange, NodeId)> = self
            .ranges
            .iter()
            .filter(|(r, _)| r.sheet() == sheet)
            .map(|(r, &id)| (*r, id))
            .collect();
        for (range, id) in doomed_ranges {
            self.remove_range_vertex_outright(range, id);
        }
        self.infinite_ranges.remove(&sheet);
    }

    /// Clear every cell of a sheet, keeping the sheet itself.
    pub fn clear_sheet(&mut self, sheet: SheetId) {
        for addr in self.sheet_addresses(sheet) {
            self.set_empty(addr);
        }
    }

    /// Move a finite block to a new top-left corner on the same sheet.
    /// Overwritten target cells are removed; moved vertices keep their
    /// identity (and therefore their dependents).
    pub fn move_cells(&mut self, source: AbsoluteCellRange, target: SimpleCellAddress) {
        let (col_delta, row_delta) = move_delta(source, target);
        let target_rect = moved_rectangle(source, target);

        // Clear the landing area (cells not part of the moved block).
        let overwritten: Vec<(SimpleCellAddress, NodeId)> = self
            .cells
            .iter()
            .filter(|(addr, _)| target_rect.contains(**addr) && !source.contains(**addr))
            .map(|(addr, &id)| (*addr, id))
            .collect();
        for (addr, id) in overwritten {
            if self.vertex(id).is_some() {
                self.force_remove_cell(addr, id);
            } else {
                self.cells.remove(&addr);
            }
        }

        // Remap the moved block.
        let moved: Vec<(SimpleCellAddress, NodeId)> = self
            .cells
            .iter()
            .filter(|(addr, _)| source.contains(**addr))
            .map(|(addr, &id)| (*addr, id))
            .collect();
        for (addr, _) in &moved {
            self.cells.remove(addr);
        }
        for (addr, id) in &moved {
            let new_addr = addr
                .moved(col_delta, row_delta)
                .expect("move target fits the sheet");
            self.cells.insert(new_addr, *id);
            self.update_vertex_address(*id, new_addr);
            self.mark_vertex_dirty(*id);
        }

        self.rewire_all_ranges_on_sheet(source.sheet());
        self.mark_structural_dependents_dirty();
    }

    fn update_vertex_address(&mut self, id: NodeId, new_addr: SimpleCellAddress) {
        match self.vertex_mut(id) {
            Some(Vertex::Formula(f)) => f.address = new_addr,
            Some(Vertex::Array(a)) => {
                // Only the corner mapping drives the rectangle.
                if a.corner.sheet == new_addr.sheet {
                    a.corner = new_addr;
                }
            }
            _ => {}
        }
    }

}
