//! The evaluator: walks ASTs against the dependency graph, coercing values
//! and dispatching to registered functions.

use riskgrid_model::{AbsoluteCellRange, ErrorKind, SimpleCellAddress, UNBOUNDED};

mod coerce;

pub use coerce::{
    coerce_complex, coerce_scalar_to_bool, coerce_scalar_to_number, coerce_scalar_to_string,
};

use crate::arith::ArithContext;
use crate::config::Config;
use crate::dist::{self, SeededRng};
use crate::functions;
use crate::graph::DependencyGraph;
use crate::named::NamedExpressions;
use crate::parser::{Ast, BinaryOp, DistributionLiteral, UnaryOp};
use crate::value::{
    compare_values, CellError, CiInterpretation, CiSource, RichNumber, SimpleRangeValue, Value,
};

/// One AST evaluation against the graph. Created per formula vertex; holds
/// mutable access to the graph (for range aggregation caches) and to the
/// engine's generator (for sampling and volatile functions).
pub struct Interpreter<'a> {
    pub(crate) graph: &'a mut DependencyGraph,
    pub(crate) config: &'a Config,
    pub(crate) rng: &'a mut SeededRng,
    pub(crate) named: &'a NamedExpressions,
    /// Address of the formula being evaluated.
    pub formula_address: SimpleCellAddress,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        graph: &'a mut DependencyGraph,
        config: &'a Config,
        rng: &'a mut SeededRng,
        named: &'a NamedExpressions,
        formula_address: SimpleCellAddress,
    ) -> Self {
        Self {
            graph,
            config,
            rng,
            named,
            formula_address,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.config
    }

    /// Evaluate an AST node to a value (scalar or range).
    pub fn evaluate(&mut self, ast: &Ast) -> Value {
        match ast {
            Ast::Empty => Value::Empty,
            Ast::Number(n) => Value::number(*n),
            Ast::Text(s) => Value::Text(s.clone()),
            Ast::Bool(b) => Value::Bool(*b),
            Ast::Error(kind) => Value::error(*kind),
            Ast::Distribution(literal) => self.distribution_value(literal),
            Ast::CellReference(reference) => {
                let Some(target) = reference.resolve(self.formula_address) else {
                    return Value::error(ErrorKind::Ref);
                };
                let value = self.graph.get_scalar_value(target);
                if matches!(value, Value::Range(_)) {
                    return Value::Error(CellError::with_message(
                        ErrorKind::Value,
                        "expected a scalar, got a range",
                    ));
                }
                value
            }
            Ast::CellRange { start, end } => {
                let (Some(s), Some(e)) = (
                    start.resolve(self.formula_address),
                    end.resolve(self.formula_address),
                ) else {
                    return Value::error(ErrorKind::Ref);
                };
                if s.sheet != e.sheet {
                    return Value::error(ErrorKind::Ref);
                }
                self.materialize_range(AbsoluteCellRange::new(s, e))
            }
            Ast::ColumnRange { start, end } => {
                let sheet = start.sheet.resolve(self.formula_address.sheet);
                let (Some(s), Some(e)) = (
                    start.col.resolve(self.formula_address.col),
                    end.col.resolve(self.formula_address.col),
                ) else {
                    return Value::error(ErrorKind::Ref);
                };
                self.materialize_range(AbsoluteCellRange::whole_columns(sheet, s, e))
            }
            Ast::RowRange { start, end } => {
                let sheet = start.sheet.resolve(self.formula_address.sheet);
                let (Some(s), Some(e)) = (
                    start.row.resolve(self.formula_address.row),
                    end.row.resolve(self.formula_address.row),
                ) else {
                    return Value::error(ErrorKind::Ref);
                };
                self.materialize_range(AbsoluteCellRange::whole_rows(sheet, s, e))
            }
            Ast::NamedExpression(name) => self.named_expression_value(name),
            Ast::FunctionCall { name, args } => functions::call_function(self, name, args),
            Ast::ArrayLiteral(rows) => self.array_literal(rows),
            Ast::Parenthesis(inner) => self.evaluate(inner),
            Ast::Unary { op, expr } => {
                let value = self.evaluate(expr);
                self.apply_unary(*op, value)
            }
            Ast::Binary { op, left, right } => {
                let lv = self.evaluate(left);
                if let Value::Error(e) = lv {
                    return Value::Error(e);
                }
                let rv = self.evaluate(right);
                if let Value::Error(e) = rv {
                    return Value::Error(e);
                }
                self.apply_binary(*op, lv, rv)
            }
        }
    }

    fn named_expression_value(&mut self, name: &str) -> Value {
        let sheet = self.formula_address.sheet;
        match self.named.resolve(name, sheet) {
            Some(entry) if entry.added => self.graph.get_scalar_value(entry.address),
            _ => Value::Error(CellError::with_message(
                ErrorKind::Name,
                format!("name `{name}` is not defined"),
            )),
        }
    }

    /// Materialise a range value lazily from the graph. Infinite ranges are
    /// clamped to the sheet's occupied extent.
    fn materialize_range(&mut self, range: AbsoluteCellRange) -> Value {
        let clamped = if range.is_finite() {
            range
        } else {
            let mut end = range.end;
            if end.row == UNBOUNDED {
                let height = self.graph.get_sheet_height(range.sheet());
                if height == 0 {
                    return Value::Range(SimpleRangeValue::ad_hoc(0, 0, Vec::new()));
                }
                end.row = height - 1;
            }
            if end.col == UNBOUNDED {
                let width = self.graph.get_sheet_width(range.sheet());
                if width == 0 {
                    return Value::Range(SimpleRangeValue::ad_hoc(0, 0, Vec::new()));
                }
                end.col = width - 1;
            }
            if end.row < range.start.row || end.col < range.start.col {
                return Value::Range(SimpleRangeValue::ad_hoc(0, 0, Vec::new()));
            }
            AbsoluteCellRange::new(range.start, end)
        };

        let values: Vec<Value> = clamped
            .addresses()
            .map(|addr| self.graph.get_scalar_value(addr))
            .collect();
        Value::Range(SimpleRangeValue::from_range(clamped, values))
    }

    fn array_literal(&mut self, rows: &[Vec<Ast>]) -> Value {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut values = Vec::with_capacity(width * height);
        for row in rows {
            for el in row {
                let v = self.evaluate(el);
                if matches!(v, Value::Range(_)) {
                    return Value::error(ErrorKind::Value);
                }
                values.push(v);
            }
        }
        Value::Range(SimpleRangeValue::ad_hoc(width, height, values))
    }

    fn distribution_value(&mut self, literal: &DistributionLiteral) -> Value {
        let size = self.config.sample_size;
        let samples = match *literal {
            DistributionLiteral::Gaussian { mean, variance } => {
                let samples = dist::gaussian_samples(mean, variance, size, self.rng);
                return finite_distribution(samples, |samples| RichNumber::Gaussian {
                    mean,
                    variance,
                    samples: Some(samples),
                });
            }
            DistributionLiteral::LogNormal { mu, sigma_sq } => {
                let samples = dist::lognormal_samples(mu, sigma_sq, size, self.rng);
                return finite_distribution(samples, |samples| RichNumber::LogNormal {
                    mu,
                    sigma_sq,
                    samples: Some(samples),
                });
            }
            DistributionLiteral::Uniform { lo, hi } => {
                let samples = dist::uniform_samples(lo, hi, size, self.rng);
                return finite_distribution(samples, |samples| RichNumber::Uniform {
                    lo,
                    hi,
                    samples: Some(samples),
                });
            }
            DistributionLiteral::ConfidenceInterval { lo, hi, confidence } => {
                return Value::Number(RichNumber::confidence_interval(
                    lo,
                    hi,
                    confidence,
                    CiInterpretation::Auto,
                    CiSource::Derived,
                ));
            }
            DistributionLiteral::Sampled { mean, variance } => {
                dist::gaussian_samples(mean, variance, size, self.rng)
            }
        };
        finite_distribution(samples, |samples| RichNumber::Sampled { samples })
    }

    /// Apply a unary operator, broadcasting over ranges.
    pub(crate) fn apply_unary(&mut self, op: UnaryOp, value: Value) -> Value {
        match value {
            Value::Error(e) => Value::Error(e),
            Value::Range(range) => {
                let mapped: Vec<Value> = range
                    .iter()
                    .map(|v| self.apply_unary(op, v.clone()))
                    .collect();
                Value::Range(SimpleRangeValue::ad_hoc(
                    range.width(),
                    range.height(),
                    mapped,
                ))
            }
            scalar => {
                let n = match coerce_scalar_to_number(&scalar, self.config) {
                    Ok(n) => n,
                    Err(e) => return Value::Error(e),
                };
                let mut arith = ArithContext::new(self.config, self.rng);
                let result = match op {
                    UnaryOp::Plus => arith.unary_plus(&n),
                    UnaryOp::Minus => arith.unary_minus(&n),
                    UnaryOp::Percent => arith.unary_percent(&n),
                };
                Value::Number(result)
            }
        }
    }

    /// Apply a binary operator, broadcasting elementwise when either side
    /// is a range.
    pub(crate) fn apply_binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Value {
        match (left, right) {
            (Value::Range(a), Value::Range(b)) => {
                if a.width() != b.width() || a.height() != b.height() {
                    return Value::Error(CellError::with_message(
                        ErrorKind::Value,
                        "range shapes do not match",
                    ));
                }
                let mapped: Vec<Value> = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| self.apply_binary(op, x.clone(), y.clone()))
                    .collect();
                Value::Range(SimpleRangeValue::ad_hoc(a.width(), a.height(), mapped))
            }
            (Value::Range(a), scalar) => {
                let mapped: Vec<Value> = a
                    .iter()
                    .map(|x| self.apply_binary(op, x.clone(), scalar.clone()))
                    .collect();
                Value::Range(SimpleRangeValue::ad_hoc(a.width(), a.height(), mapped))
            }
            (scalar, Value::Range(b)) => {
                let mapped: Vec<Value> = b
                    .iter()
                    .map(|y| self.apply_binary(op, scalar.clone(), y.clone()))
                    .collect();
                Value::Range(SimpleRangeValue::ad_hoc(b.width(), b.height(), mapped))
            }
            (l, r) => self.scalar_binary(op, l, r),
        }
    }

    fn scalar_binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Value {
        match op {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Pow => {
                let l = match coerce_scalar_to_number(&left, self.config) {
                    Ok(n) => n,
                    Err(e) => return Value::Error(e),
                };
                let r = match coerce_scalar_to_number(&right, self.config) {
                    Ok(n) => n,
                    Err(e) => return Value::Error(e),
                };
                let mut arith = ArithContext::new(self.config, self.rng);
                let result = match op {
                    BinaryOp::Add => arith.add(&l, &r),
                    BinaryOp::Sub => arith.sub(&l, &r),
                    BinaryOp::Mul => arith.mul(&l, &r),
                    BinaryOp::Div => arith.div(&l, &r),
                    BinaryOp::Pow => arith.pow(&l, &r),
                    _ => unreachable!("arithmetic operators handled above"),
                };
                match result {
                    Ok(n) => Value::Number(n),
                    Err(e) => Value::Error(e.attributed(self.formula_address)),
                }
            }
            BinaryOp::Concat => {
                let l = match coerce_scalar_to_string(&left, self.config) {
                    Ok(s) => s,
                    Err(e) => return Value::Error(e),
                };
                let r = match coerce_scalar_to_string(&right, self.config) {
                    Ok(s) => s,
                    Err(e) => return Value::Error(e),
                };
                Value::Text(format!("{l}{r}"))
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt
            | BinaryOp::Ge => match compare_values(&left, &right, self.config) {
                Ok(ordering) => {
                    use std::cmp::Ordering;
                    let result = match op {
                        BinaryOp::Eq => ordering == Ordering::Equal,
                        BinaryOp::Ne => ordering != Ordering::Equal,
                        BinaryOp::Lt => ordering == Ordering::Less,
                        BinaryOp::Le => ordering != Ordering::Greater,
                        BinaryOp::Gt => ordering == Ordering::Greater,
                        BinaryOp::Ge => ordering != Ordering::Less,
                        _ => unreachable!("comparison operators handled above"),
                    };
                    Value::Bool(result)
                }
                Err(e) => Value::Error(e),
            },
        }
    }

    // ----- helpers for built-in functions ---------------------------------

    /// Evaluate an argument to a full value (ranges stay ranges).
    pub fn eval_arg(&mut self, arg: &Ast) -> Value {
        self.evaluate(arg)
    }

    /// Evaluate an argument and coerce to a rich number. Ranges are
    /// rejected.
    pub fn number_arg(&mut self, arg: &Ast) -> Result<RichNumber, CellError> {
        let value = self.evaluate(arg);
        coerce_scalar_to_number(&value, self.config)
    }

    /// Evaluate an argument to a plain `f64` (the representative value).
    pub fn f64_arg(&mut self, arg: &Ast) -> Result<f64, CellError> {
        Ok(self.number_arg(arg)?.val())
    }

    /// Evaluate an argument and coerce to an integer by truncation.
    pub fn int_arg(&mut self, arg: &Ast) -> Result<i64, CellError> {
        Ok(self.f64_arg(arg)?.trunc() as i64)
    }

    pub fn bool_arg(&mut self, arg: &Ast) -> Result<bool, CellError> {
        let value = self.evaluate(arg);
        if let Value::Error(e) = &value {
            return Err(e.clone());
        }
        coerce_scalar_to_bool(&value).ok_or_else(|| CellError::new(ErrorKind::Value))
    }

    pub fn string_arg(&mut self, arg: &Ast) -> Result<String, CellError> {
        let value = self.evaluate(arg);
        coerce_scalar_to_string(&value, self.config)
    }

    /// Flatten arguments into scalar values: ranges expand in row-major
    /// order, scalars pass through.
    pub fn flatten_args(&mut self, args: &[Ast]) -> Result<Vec<Value>, CellError> {
        let mut out = Vec::new();
        for arg in args {
            match self.evaluate(arg) {
                Value::Error(e) => return Err(e),
                Value::Range(range) => {
                    for v in range.iter() {
                        if let Value::Error(e) = v {
                            return Err(e.clone());
                        }
                        out.push(v.clone());
                    }
                }
                scalar => out.push(scalar),
            }
        }
        Ok(out)
    }

    /// Sum a graph range using the hierarchical cache: a range that leans
    /// on a sub-range reuses the sub-range's cached sum and only walks its
    /// own remainder cells.
    pub fn sum_of_range(&mut self, range: AbsoluteCellRange) -> Result<f64, CellError> {
        const KEY: &str = "SUM";

        let Some(id) = self.graph.range_vertex_id(&range) else {
            // Ad-hoc range with no vertex: walk it directly.
            return self.sum_addresses(range);
        };

        if let Some(crate::graph::Vertex::Range(rv)) = self.graph.vertex(id) {
            if let Some(Value::Number(n)) = rv.cached_fns.get(KEY) {
                return Ok(n.val());
            }
            let smaller = rv.smaller_range;
            let own_range = rv.range;
            let total = match smaller {
                Some(sub_id) => {
                    let sub_range = match self.graph.vertex(sub_id) {
                        Some(crate::graph::Vertex::Range(sub)) => sub.range,
                        _ => return self.sum_addresses(own_range),
                    };
                    let mut total = self.sum_of_range(sub_range)?;
                    for addr in own_range.addresses_outside(&sub_range) {
                        total += self.cell_number_for_aggregate(addr)?;
                    }
                    total
                }
                None => self.sum_addresses(own_range)?,
            };
            if let Some(crate::graph::Vertex::Range(rv)) = self.graph.vertex_mut(id) {
                rv.cached_fns.insert(KEY, Value::number(total));
            }
            return Ok(total);
        }
        self.sum_addresses(range)
    }

    fn sum_addresses(&mut self, range: AbsoluteCellRange) -> Result<f64, CellError> {
        let mut total = 0.0;
        for addr in range.addresses() {
            total += self.cell_number_for_aggregate(addr)?;
        }
        Ok(total)
    }

    /// Numeric reading of a cell for reference aggregates: numbers count,
    /// text/booleans/empties are ignored, errors propagate.
    fn cell_number_for_aggregate(&mut self, addr: SimpleCellAddress) -> Result<f64, CellError> {
        match self.graph.get_scalar_value(addr) {
            Value::Number(n) => Ok(n.val()),
            Value::Error(e) => Err(e),
            _ => Ok(0.0),
        }
    }

    /// The stored formula text of a cell, for `FORMULATEXT`.
    #[must_use]
    pub fn formula_text_at(&self, addr: SimpleCellAddress) -> Option<String> {
        let id = self.graph.id_at(addr)?;
        match self.graph.vertex(id) {
            Some(crate::graph::Vertex::Formula(f)) => Some(f.raw_text.clone()),
            Some(crate::graph::Vertex::Array(a)) => Some(a.raw_text.clone()),
            _ => None,
        }
    }

    /// Fresh uniform draw for `RAND`/`RANDBETWEEN`.
    pub fn next_uniform(&mut self) -> f64 {
        self.rng.next_f64()
    }
}

fn finite_distribution(
    samples: Vec<f64>,
    build: impl FnOnce(std::sync::Arc<[f64]>) -> RichNumber,
) -> Value {
    if samples.iter().any(|x| !x.is_finite()) {
        return Value::Error(CellError::with_message(
            ErrorKind::Num,
            "sample generation overflowed",
        ));
    }
    Value::Number(build(samples.into()))
}
