//! The engine facade: cell writes, structural edits, named expressions, and
//! the recomputation cycle that ties the parser, graph and evaluator
//! together.

use std::collections::HashSet;
use std::sync::Arc;

use riskgrid_model::{
    A1ParseError, AbsoluteCellRange, ErrorKind, RawCellContent, SheetId, SimpleCellAddress,
    SHEET_FOR_WORKBOOK_EXPRESSIONS,
};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::display;
use crate::dist::SeededRng;
use crate::eval::Interpreter;
use crate::graph::edits::{Axis, LazyTransformService, StructuralChange};
use crate::graph::{
    top_sort_with_scc, DependencyGraph, FormulaInstall, GraphDep, NodeId, Vertex,
};
use crate::literals;
use crate::named::NamedExpressions;
use crate::parser::{absolutize, parse_formula, Dep, ParserCache, ResolvedDep, SheetIndex};
use crate::value::{CellError, SimpleRangeValue, Value};

/// Errors surfaced by the engine's public API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Address(#[from] A1ParseError),
    #[error("unknown sheet `{0}`")]
    UnknownSheet(String),
    #[error("invalid named-expression name `{0}`")]
    InvalidName(String),
}

/// A recomputed (or directly written) cell value.
#[derive(Clone, Debug, PartialEq)]
pub struct CellValueChange {
    pub address: SimpleCellAddress,
    pub value: Value,
    /// Rendered form; `None` for cleared cells.
    pub display: Option<String>,
}

/// One externally visible change produced by an engine operation.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportedChange {
    Cell(CellValueChange),
    NamedExpression { name: String, value: Value },
}

#[derive(Debug, Default)]
struct SheetStore {
    names: Vec<Option<String>>,
}

impl SheetStore {
    fn ensure(&mut self, name: &str) -> SheetId {
        if let Some(id) = self.id_by_name(name) {
            return id;
        }
        self.names.push(Some(name.to_string()));
        (self.names.len() - 1) as SheetId
    }

    fn id_by_name(&self, name: &str) -> Option<SheetId> {
        self.names.iter().position(|entry| {
            entry
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        }).map(|idx| idx as SheetId)
    }

    fn remove(&mut self, id: SheetId) {
        if let Some(slot) = self.names.get_mut(id as usize) {
            *slot = None;
        }
    }
}

impl SheetIndex for SheetStore {
    fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        self.id_by_name(name)
    }
}

/// A headless spreadsheet engine with uncertainty arithmetic.
pub struct Engine {
    config: Config,
    graph: DependencyGraph,
    cache: ParserCache,
    named: NamedExpressions,
    transforms: LazyTransformService,
    rng: SeededRng,
    sheets: SheetStore,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default()).expect("default configuration is valid")
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = SeededRng::new(config.seed);
        Ok(Self {
            config,
            graph: DependencyGraph::new(),
            cache: ParserCache::new(),
            named: NamedExpressions::new(),
            transforms: LazyTransformService::new(),
            rng,
            sheets: SheetStore::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ----- sheets ---------------------------------------------------------

    pub fn add_sheet(&mut self, name: &str) -> SheetId {
        self.sheets.ensure(name)
    }

    #[must_use]
    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets.id_by_name(name)
    }

    #[must_use]
    pub fn sheet_height(&self, sheet: SheetId) -> u32 {
        self.graph.get_sheet_height(sheet)
    }

    #[must_use]
    pub fn sheet_width(&self, sheet: SheetId) -> u32 {
        self.graph.get_sheet_width(sheet)
    }

    // ----- cell writes ----------------------------------------------------

    /// Set a cell from raw text: formula, literal, or plain string. Creates
    /// the sheet on first use. Returns every change visible after the
    /// triggered recompute.
    pub fn set_cell_contents(
        &mut self,
        sheet: &str,
        a1: &str,
        text: &str,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self.sheets.ensure(sheet);
        let addr = SimpleCellAddress::from_a1(sheet_id, a1)?;
        Ok(self.set_cell_contents_at(addr, text))
    }

    /// As [`set_cell_contents`](Self::set_cell_contents), addressed
    /// directly.
    pub fn set_cell_contents_at(&mut self, addr: SimpleCellAddress, text: &str) -> Vec<ExportedChange> {
        self.install_cell(addr, text);
        let mut changes = self.recompute();
        // Literal writes are not evaluated, so the written cell itself may
        // not appear in the recompute output.
        let covers_written_cell = changes
            .iter()
            .any(|c| matches!(c, ExportedChange::Cell(change) if change.address == addr));
        if !covers_written_cell {
            changes.insert(0, self.export_at(addr));
        }
        changes
    }

    /// Clear a cell.
    pub fn set_cell_empty(&mut self, sheet: &str, a1: &str) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        let addr = SimpleCellAddress::from_a1(sheet_id, a1)?;
        self.graph.set_empty(addr);
        let mut changes = vec![self.export_at(addr)];
        changes.extend(self.recompute());
        Ok(changes)
    }

    fn install_cell(&mut self, addr: SimpleCellAddress, text: &str) {
        if text.is_empty() {
            self.graph.set_empty(addr);
            return;
        }

        if let Some(escaped) = text.strip_prefix('\'') {
            self.graph.set_value(
                addr,
                RawCellContent::Text(escaped.to_string()),
                Value::Text(escaped.to_string()),
            );
            return;
        }

        // `{=...}` enters an array formula owning a spill rectangle.
        if let Some(body) = text
            .strip_prefix("{=")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            self.install_formula(addr, text, &format!("={body}"), true);
            return;
        }

        if text.starts_with('=') {
            self.install_formula(addr, text, text, false);
            return;
        }

        match literals::parse_cell_literal(text, &self.config, &mut self.rng) {
            Some(Value::Empty) => self.graph.set_empty(addr),
            Some(value) => {
                self.graph
                    .set_value(addr, RawCellContent::from_text(text), value);
            }
            None => {
                self.graph.set_value(
                    addr,
                    RawCellContent::Text(text.to_string()),
                    Value::Text(text.to_string()),
                );
            }
        }
    }

    fn install_formula(&mut self, addr: SimpleCellAddress, raw_text: &str, body: &str, array: bool) {
        match parse_formula(body, addr, &self.sheets, &self.config) {
            Ok(parsed) => {
                let entry = self.cache.maybe_set_and_get(&parsed.hash, &parsed.ast);
                let mut deps: Vec<GraphDep> = Vec::new();
                for dep in &entry.dependencies {
                    match dep {
                        Dep::Name(name) => {
                            let name_addr = self.named.ensure_placeholder(name);
                            deps.push(GraphDep::Cell(name_addr));
                        }
                        other => match absolutize(other, addr) {
                            Some(ResolvedDep::Cell(cell)) => deps.push(GraphDep::Cell(cell)),
                            Some(ResolvedDep::Range(range)) => deps.push(GraphDep::Range(range)),
                            Some(ResolvedDep::Name(_)) | None => {}
                        },
                    }
                }
                self.graph.set_formula(
                    addr,
                    FormulaInstall {
                        ast: Arc::clone(&entry.ast),
                        raw_text: raw_text.to_string(),
                        version: self.transforms.version(),
                        deps,
                        volatile: entry.has_volatile_fn,
                        structural: entry.has_structural_fn,
                        array,
                    },
                );
            }
            Err(errors) => {
                self.graph
                    .set_parsing_error(addr, errors, raw_text.to_string());
            }
        }
    }

    // ----- reads ----------------------------------------------------------

    pub fn get_cell_value(&self, sheet: &str, a1: &str) -> Value {
        let Some(sheet_id) = self.sheets.id_by_name(sheet) else {
            return Value::Empty;
        };
        match SimpleCellAddress::from_a1(sheet_id, a1) {
            Ok(addr) => self.graph.get_scalar_value(addr),
            Err(_) => Value::Empty,
        }
    }

    #[must_use]
    pub fn get_cell_value_at(&self, addr: SimpleCellAddress) -> Value {
        self.graph.get_scalar_value(addr)
    }

    /// The stored formula text of a cell, if it holds one.
    pub fn get_cell_formula(&self, sheet: &str, a1: &str) -> Option<String> {
        let sheet_id = self.sheets.id_by_name(sheet)?;
        let addr = SimpleCellAddress::from_a1(sheet_id, a1).ok()?;
        let id = self.graph.id_at(addr)?;
        match self.graph.vertex(id)? {
            Vertex::Formula(f) => Some(f.raw_text.clone()),
            Vertex::Array(a) => Some(a.raw_text.clone()),
            _ => None,
        }
    }

    /// The rendered form of a cell (`None` for empty cells).
    pub fn get_cell_display(&self, sheet: &str, a1: &str) -> Option<String> {
        display::format_cell_value(&self.get_cell_value(sheet, a1), &self.config)
    }

    /// Render a whole sheet as rows of display strings (`None` for empty
    /// cells), covering the occupied rectangle.
    pub fn get_sheet_serialized(&self, sheet: &str) -> Result<Vec<Vec<Option<String>>>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        let height = self.graph.get_sheet_height(sheet_id);
        let width = self.graph.get_sheet_width(sheet_id);
        let mut rows = Vec::with_capacity(height as usize);
        for row in 0..height {
            let mut cells = Vec::with_capacity(width as usize);
            for col in 0..width {
                let value = self
                    .graph
                    .get_scalar_value(SimpleCellAddress::new(sheet_id, col, row));
                cells.push(display::format_cell_value(&value, &self.config));
            }
            rows.push(cells);
        }
        Ok(rows)
    }

    /// Direct access to the dependency graph for introspection and tests.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Precedent vertices of a cell, rendered as A1 cell or range text.
    pub fn precedents(&self, sheet: &str, a1: &str) -> Result<Vec<String>, EngineError> {
        let addr = self.resolve_a1(sheet, a1)?;
        let Some(id) = self.graph.id_at(addr) else {
            return Ok(Vec::new());
        };
        Ok(self.describe_nodes(self.graph.precedent_ids(id)))
    }

    /// Dependent vertices of a cell, rendered as A1 cell or range text.
    pub fn dependents(&self, sheet: &str, a1: &str) -> Result<Vec<String>, EngineError> {
        let addr = self.resolve_a1(sheet, a1)?;
        let Some(id) = self.graph.id_at(addr) else {
            return Ok(Vec::new());
        };
        Ok(self.describe_nodes(self.graph.dependent_ids(id)))
    }

    fn resolve_a1(&self, sheet: &str, a1: &str) -> Result<SimpleCellAddress, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        Ok(SimpleCellAddress::from_a1(sheet_id, a1)?)
    }

    fn describe_nodes(&self, ids: Vec<NodeId>) -> Vec<String> {
        ids.into_iter()
            .filter_map(|id| match self.graph.vertex(id)? {
                Vertex::Range(rv) => Some(rv.range.to_string()),
                Vertex::Formula(f) => Some(f.address.to_a1()),
                Vertex::Array(a) => Some(a.corner.to_a1()),
                Vertex::Value { .. } | Vertex::Empty | Vertex::ParsingError { .. } => {
                    self.address_of(id).map(|addr| addr.to_a1())
                }
            })
            .collect()
    }

    fn address_of(&self, id: NodeId) -> Option<SimpleCellAddress> {
        match self.graph.vertex(id)? {
            Vertex::Formula(f) => Some(f.address),
            Vertex::Array(a) => Some(a.corner),
            _ => self.graph.find_address_of(id),
        }
    }

    // ----- named expressions ----------------------------------------------

    /// Define (or redefine) a named expression.
    pub fn add_named_expression(
        &mut self,
        name: &str,
        content: &str,
        scope: Option<&str>,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        if !NamedExpressions::is_valid_name(name) {
            return Err(EngineError::InvalidName(name.to_string()));
        }
        let scope_id = match scope {
            Some(sheet) => Some(
                self.sheets
                    .id_by_name(sheet)
                    .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?,
            ),
            None => None,
        };
        let addr = self.named.define(name, scope_id);
        self.install_cell(addr, content);
        Ok(self.recompute())
    }

    /// Undefine a name; referencing formulas fall back to `#NAME?`.
    pub fn remove_named_expression(
        &mut self,
        name: &str,
        scope: Option<&str>,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        let scope_id = match scope {
            Some(sheet) => Some(
                self.sheets
                    .id_by_name(sheet)
                    .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?,
            ),
            None => None,
        };
        if let Some(addr) = self.named.remove(name, scope_id) {
            self.graph.set_empty(addr);
        }
        Ok(self.recompute())
    }

    /// The current value of a workbook-scope name.
    pub fn get_named_expression_value(&self, name: &str) -> Value {
        match self.named.resolve(name, 0) {
            Some(entry) if entry.added => self.graph.get_scalar_value(entry.address),
            _ => Value::Error(CellError::new(ErrorKind::Name)),
        }
    }

    // ----- structural edits -----------------------------------------------

    pub fn add_rows(
        &mut self,
        sheet: &str,
        row: u32,
        count: u32,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        self.graph.add_rows(sheet_id, row, count);
        self.transforms.record(StructuralChange::Added {
            sheet: sheet_id,
            axis: Axis::Row,
            at: row,
            count,
        });
        Ok(self.recompute())
    }

    pub fn remove_rows(
        &mut self,
        sheet: &str,
        row: u32,
        count: u32,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        self.graph.remove_rows(sheet_id, row, count);
        self.transforms.record(StructuralChange::Removed {
            sheet: sheet_id,
            axis: Axis::Row,
            at: row,
            count,
        });
        Ok(self.recompute())
    }

    pub fn add_columns(
        &mut self,
        sheet: &str,
        col: u32,
        count: u32,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        self.graph.add_columns(sheet_id, col, count);
        self.transforms.record(StructuralChange::Added {
            sheet: sheet_id,
            axis: Axis::Column,
            at: col,
            count,
        });
        Ok(self.recompute())
    }

    pub fn remove_columns(
        &mut self,
        sheet: &str,
        col: u32,
        count: u32,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        self.graph.remove_columns(sheet_id, col, count);
        self.transforms.record(StructuralChange::Removed {
            sheet: sheet_id,
            axis: Axis::Column,
            at: col,
            count,
        });
        Ok(self.recompute())
    }

    /// Move a rectangular block to a new top-left corner on the same sheet.
    pub fn move_cells(
        &mut self,
        sheet: &str,
        source_a1: &str,
        target_a1: &str,
    ) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        let source = parse_a1_range(sheet_id, source_a1)?;
        let target = SimpleCellAddress::from_a1(sheet_id, target_a1)?;
        self.graph.move_cells(source, target);
        self.transforms
            .record(StructuralChange::Moved { source, target });
        Ok(self.recompute())
    }

    pub fn remove_sheet(&mut self, sheet: &str) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        self.graph.remove_sheet(sheet_id);
        self.sheets.remove(sheet_id);
        self.transforms
            .record(StructuralChange::RemovedSheet { sheet: sheet_id });
        Ok(self.recompute())
    }

    pub fn clear_sheet(&mut self, sheet: &str) -> Result<Vec<ExportedChange>, EngineError> {
        let sheet_id = self
            .sheets
            .id_by_name(sheet)
            .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
        self.graph.clear_sheet(sheet_id);
        Ok(self.recompute())
    }

    // ----- recomputation --------------------------------------------------

    /// Evaluate everything dirty or volatile in topological order, mark
    /// cycles, and return the resulting changes.
    pub fn recompute(&mut self) -> Vec<ExportedChange> {
        let to_eval = self.graph.verts_to_recompute();
        if to_eval.is_empty() {
            return Vec::new();
        }

        let sort = top_sort_with_scc(&self.graph);
        let mut changes: Vec<ExportedChange> = Vec::new();

        // Cycle members hold a deterministic #CYCLE! and are not evaluated.
        let mut cycle_members: Vec<NodeId> = sort.cycles.iter().flatten().copied().collect();
        cycle_members.sort();
        for id in &cycle_members {
            self.mark_cycle_member(*id, &mut changes);
        }
        let cycle_set: HashSet<NodeId> = cycle_members.into_iter().collect();

        for id in sort.order {
            if !to_eval.contains(&id) || cycle_set.contains(&id) {
                continue;
            }
            match self.graph.vertex(id) {
                Some(Vertex::Formula(_)) => self.evaluate_formula_vertex(id, &mut changes),
                Some(Vertex::Array(_)) => self.evaluate_array_vertex(id, &mut changes),
                _ => {}
            }
        }

        self.graph.clear_dirty();
        changes
    }

    fn mark_cycle_member(&mut self, id: NodeId, changes: &mut Vec<ExportedChange>) {
        let addr = match self.graph.vertex(id) {
            Some(Vertex::Formula(f)) => f.address,
            Some(Vertex::Array(a)) => a.corner,
            _ => return,
        };
        let error = Value::Error(
            CellError::with_message(ErrorKind::Cycle, "circular reference").attributed(addr),
        );
        match self.graph.vertex_mut(id) {
            Some(Vertex::Formula(f)) => {
                if f.cached_value.as_ref() == Some(&error) {
                    return;
                }
                f.cached_value = Some(error.clone());
            }
            Some(Vertex::Array(a)) => {
                a.cached_result = Some(SimpleRangeValue::ad_hoc(1, 1, vec![error.clone()]));
            }
            _ => return,
        }
        changes.push(self.export_change(addr, error));
    }

    fn evaluate_formula_vertex(&mut self, id: NodeId, changes: &mut Vec<ExportedChange>) {
        let Some(Vertex::Formula(f)) = self.graph.vertex(id) else {
            return;
        };
        let addr = f.address;
        let version = f.version;
        let mut ast = Arc::clone(&f.ast);

        if let Some(fresh) = self.transforms.ensure_recent(&ast, addr, version) {
            let (_, entry) = self.cache.fetch_cached_for_ast(&fresh, &self.config);
            ast = Arc::clone(&entry.ast);
            if let Some(Vertex::Formula(f)) = self.graph.vertex_mut(id) {
                f.ast = Arc::clone(&ast);
                f.version = self.transforms.version();
            }
        }

        let value = {
            let mut interp = Interpreter::new(
                &mut self.graph,
                &self.config,
                &mut self.rng,
                &self.named,
                addr,
            );
            interp.evaluate(&ast)
        };
        let value = match value {
            Value::Range(_) => Value::Error(
                CellError::with_message(ErrorKind::Value, "expected a scalar, got a range")
                    .attributed(addr),
            ),
            Value::Error(e) => Value::Error(e.attributed(addr)),
            other => other,
        };

        let changed = match self.graph.vertex(id) {
            Some(Vertex::Formula(f)) => f.cached_value.as_ref() != Some(&value),
            _ => true,
        };
        self.graph.set_formula_value(id, value.clone());
        if changed {
            changes.push(self.export_change(addr, value));
        }
    }

    fn evaluate_array_vertex(&mut self, id: NodeId, changes: &mut Vec<ExportedChange>) {
        let Some(Vertex::Array(a)) = self.graph.vertex(id) else {
            return;
        };
        let corner = a.corner;
        let version = a.version;
        let mut ast = Arc::clone(&a.ast);

        if let Some(fresh) = self.transforms.ensure_recent(&ast, corner, version) {
            let (_, entry) = self.cache.fetch_cached_for_ast(&fresh, &self.config);
            ast = Arc::clone(&entry.ast);
            if let Some(Vertex::Array(a)) = self.graph.vertex_mut(id) {
                a.ast = Arc::clone(&ast);
                a.version = self.transforms.version();
            }
        }

        let value = {
            let mut interp = Interpreter::new(
                &mut self.graph,
                &self.config,
                &mut self.rng,
                &self.named,
                corner,
            );
            interp.evaluate(&ast)
        };

        let result = match value {
            Value::Range(range) => range,
            scalar => SimpleRangeValue::ad_hoc(1, 1, vec![scalar]),
        };
        let width = (result.width() as u32).max(1);
        let height = (result.height() as u32).max(1);

        if self.graph.claim_array_rectangle(id, width, height) {
            if let Some(Vertex::Array(a)) = self.graph.vertex_mut(id) {
                a.cached_result = Some(result);
            }
            let rect = match self.graph.vertex(id) {
                Some(Vertex::Array(a)) => a.rectangle(),
                _ => return,
            };
            for addr in rect.addresses() {
                changes.push(self.export_at(addr));
            }
        } else {
            // The rectangle is blocked: the corner reports a spill error.
            if let Some(Vertex::Array(a)) = self.graph.vertex_mut(id) {
                a.cached_result = None;
            }
            changes.push(self.export_change(
                corner,
                Value::Error(
                    CellError::with_message(ErrorKind::Spill, "array result blocked")
                        .attributed(corner),
                ),
            ));
        }
    }

    fn export_at(&self, addr: SimpleCellAddress) -> ExportedChange {
        self.export_change(addr, self.graph.get_scalar_value(addr))
    }

    fn export_change(&self, addr: SimpleCellAddress, value: Value) -> ExportedChange {
        if addr.sheet == SHEET_FOR_WORKBOOK_EXPRESSIONS {
            if let Some(name) = self.named.name_by_address(addr) {
                return ExportedChange::NamedExpression {
                    name: name.to_string(),
                    value,
                };
            }
        }
        let display = display::format_cell_value(&value, &self.config);
        ExportedChange::Cell(CellValueChange {
            address: addr,
            value,
            display,
        })
    }
}

fn parse_a1_range(sheet: SheetId, text: &str) -> Result<AbsoluteCellRange, A1ParseError> {
    match text.split_once(':') {
        Some((a, b)) => {
            let start = SimpleCellAddress::from_a1(sheet, a)?;
            let end = SimpleCellAddress::from_a1(sheet, b)?;
            Ok(AbsoluteCellRange::new(start, end))
        }
        None => {
            let addr = SimpleCellAddress::from_a1(sheet, text)?;
            Ok(AbsoluteCellRange::single(addr))
        }
    }
}
