#![forbid(unsafe_code)]

//! A headless spreadsheet formula engine with first-class uncertainty
//! arithmetic.
//!
//! Cells may hold scalars, dates/times/currencies/percentages, errors, or
//! probability distributions (confidence intervals, normals, log-normals,
//! uniforms, Monte-Carlo sampled results). Formulas referencing such cells
//! propagate uncertainty through arithmetic and built-in functions by
//! elementwise sample propagation with a deterministic, seedable generator.
//!
//! The crate is organised around four tightly-coupled subsystems:
//!
//! - [`value`] and [`arith`] — the rich-number type system and the rules by
//!   which operations produce scalar, parametric, or sampled results.
//! - [`parser`] — a locale-aware tokeniser/parser producing a
//!   reference-independent AST keyed by a canonical hash, so structurally
//!   identical formulas at different addresses share one parsed tree.
//! - [`graph`] — a dependency graph over cells, ranges and array formulas
//!   supporting incremental recomputation, structural edits and cycle
//!   detection.
//! - [`eval`] — the evaluator that walks ASTs against the graph, coercing
//!   values and dispatching to registered functions.
//!
//! [`Engine`] ties these together behind a `set_cell_contents` /
//! `recompute` facade.

pub mod arith;
pub mod config;
pub mod dist;
pub mod display;
pub mod eval;
pub mod functions;
pub mod graph;
pub mod literals;
pub mod locale;
pub mod named;
pub mod parser;
pub mod value;

mod engine;

pub use config::Config;
pub use engine::{CellValueChange, Engine, EngineError, ExportedChange};
pub use locale::TranslationPackage;
pub use riskgrid_model::{
    AbsoluteCellRange, CellAddress, CellCoord, ErrorKind, RawCellContent, ReferenceKind, SheetId,
    SheetSlot, SimpleCellAddress, SHEET_FOR_WORKBOOK_EXPRESSIONS, UNBOUNDED,
};
pub use value::{CellError, CiInterpretation, NumberType, RichNumber, SimpleRangeValue, Value};
