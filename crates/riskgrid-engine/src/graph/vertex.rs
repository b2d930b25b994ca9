use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use riskgrid_model::{AbsoluteCellRange, RawCellContent, SimpleCellAddress};

use crate::parser::{Ast, ParsingError};
use crate::value::{SimpleRangeValue, Value};

/// Handle into the graph's vertex arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A formula cell vertex. `version` tracks the lazy AST-transform service:
/// a vertex whose version lags the engine's has pending structural rewrites.
#[derive(Clone, Debug)]
pub struct FormulaVertex {
    pub address: SimpleCellAddress,
    pub ast: Arc<Ast>,
    /// Original formula text, kept for `FORMULATEXT` and serialization.
    pub raw_text: String,
    pub version: u32,
    pub cached_value: Option<Value>,
}

/// An array formula vertex owning a spill rectangle. Non-corner cells in the
/// rectangle map to the same vertex in the address mapping.
#[derive(Clone, Debug)]
pub struct ArrayVertex {
    pub corner: SimpleCellAddress,
    pub width: u32,
    pub height: u32,
    pub ast: Arc<Ast>,
    pub raw_text: String,
    pub version: u32,
    /// Set when the rectangle could not be claimed; the corner then reports
    /// a `#SPILL!` error.
    pub no_space: bool,
    pub cached_result: Option<SimpleRangeValue>,
}

impl ArrayVertex {
    /// The rectangle this array currently owns.
    #[must_use]
    pub fn rectangle(&self) -> AbsoluteCellRange {
        let end = SimpleCellAddress::new(
            self.corner.sheet,
            self.corner.col + self.width.saturating_sub(1),
            self.corner.row + self.height.saturating_sub(1),
        );
        AbsoluteCellRange::new(self.corner, end)
    }

    /// Value at an absolute address inside the rectangle.
    #[must_use]
    pub fn value_at(&self, addr: SimpleCellAddress) -> Value {
        if self.no_space {
            return if addr == self.corner {
                Value::error(riskgrid_model::ErrorKind::Spill)
            } else {
                Value::Empty
            };
        }
        let Some(result) = &self.cached_result else {
            return Value::Empty;
        };
        let row = (addr.row - self.corner.row) as usize;
        let col = (addr.col - self.corner.col) as usize;
        result.get(row, col).cloned().unwrap_or(Value::Empty)
    }
}

/// A materialised range dependency.
///
/// A hierarchical range leans on a covered sub-range vertex for most of its
/// cells and carries cell edges only for the remainder; a brute-force range
/// has a direct edge from every covered cell.
#[derive(Clone, Debug)]
pub struct RangeVertex {
    pub range: AbsoluteCellRange,
    pub brute_force: bool,
    pub smaller_range: Option<NodeId>,
    /// Cached per-function aggregates (e.g. `SUM`), invalidated whenever the
    /// range is marked dirty.
    pub cached_fns: HashMap<&'static str, Value>,
}

impl RangeVertex {
    #[must_use]
    pub fn new(range: AbsoluteCellRange) -> Self {
        Self {
            range,
            brute_force: false,
            smaller_range: None,
            cached_fns: HashMap::new(),
        }
    }
}

/// A vertex of the dependency graph.
#[derive(Clone, Debug)]
pub enum Vertex {
    /// A literal cell: the raw content and its parsed value.
    Value {
        raw: RawCellContent,
        parsed: Value,
    },
    Formula(FormulaVertex),
    Array(ArrayVertex),
    /// A referenced-but-empty cell. Exists only while something depends on
    /// it.
    Empty,
    Range(RangeVertex),
    /// A cell whose text failed to parse; the original text and error list
    /// are retained.
    ParsingError {
        errors: Vec<ParsingError>,
        raw_text: String,
    },
}

impl Vertex {
    #[must_use]
    pub fn is_empty_placeholder(&self) -> bool {
        matches!(self, Vertex::Empty)
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        matches!(self, Vertex::Range(_))
    }

    #[must_use]
    pub fn is_formula_like(&self) -> bool {
        matches!(self, Vertex::Formula(_) | Vertex::Array(_))
    }
}
