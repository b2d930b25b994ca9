use riskgrid_model::{CellAddress, CellCoord, ErrorKind, SheetSlot};

/// A column reference inside a column range (`A:C`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnAddress {
    pub sheet: SheetSlot,
    pub col: CellCoord,
}

/// A row reference inside a row range (`1:3`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RowAddress {
    pub sheet: SheetSlot,
    pub row: CellCoord,
}

/// A distribution literal recognised inside a formula.
///
/// Parameters are stored, not samples: each evaluation draws fresh buffers
/// from the engine generator, exactly like a literal entered as cell text.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DistributionLiteral {
    Gaussian { mean: f64, variance: f64 },
    Sampled { mean: f64, variance: f64 },
    LogNormal { mu: f64, sigma_sq: f64 },
    Uniform { lo: f64, hi: f64 },
    ConfidenceInterval { lo: f64, hi: f64, confidence: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    /// Postfix `%`.
    Percent,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// The operator's source spelling, used by the canonical printer.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// A parsed formula expression.
///
/// Cell references are stored in position-independent form (offsets from the
/// owning formula), which is what makes the hash cache reference-independent:
/// `=A1` in `B2` and `=B5` in `C6` produce identical trees.
#[derive(Clone, Debug, PartialEq)]
pub enum Ast {
    /// A missing argument slot (`IF(A1,,2)`).
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorKind),
    Distribution(DistributionLiteral),
    CellReference(CellAddress),
    CellRange {
        start: CellAddress,
        end: CellAddress,
    },
    ColumnRange {
        start: ColumnAddress,
        end: ColumnAddress,
    },
    RowRange {
        start: RowAddress,
        end: RowAddress,
    },
    NamedExpression(String),
    FunctionCall {
        /// Canonical (translated, uppercased) function name.
        name: String,
        args: Vec<Ast>,
    },
    /// `{1, 2; 3, 4}` — rows of argument expressions.
    ArrayLiteral(Vec<Vec<Ast>>),
    Parenthesis(Box<Ast>),
    Unary {
        op: UnaryOp,
        expr: Box<Ast>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
}

impl Ast {
    /// Walk the tree, invoking `visit` on every node.
    pub fn visit(&self, visit: &mut impl FnMut(&Ast)) {
        visit(self);
        match self {
            Ast::FunctionCall { args, .. } => {
                for arg in args {
                    arg.visit(visit);
                }
            }
            Ast::ArrayLiteral(rows) => {
                for row in rows {
                    for el in row {
                        el.visit(visit);
                    }
                }
            }
            Ast::Parenthesis(inner) => inner.visit(visit),
            Ast::Unary { expr, .. } => expr.visit(visit),
            Ast::Binary { left, right, .. } => {
                left.visit(visit);
                right.visit(visit);
            }
            _ => {}
        }
    }

    /// True when any function call in the tree satisfies `pred`.
    #[must_use]
    pub fn any_function(&self, pred: &impl Fn(&str) -> bool) -> bool {
        let mut found = false;
        self.visit(&mut |node| {
            if let Ast::FunctionCall { name, .. } = node {
                if pred(name) {
                    found = true;
                }
            }
        });
        found
    }
}
