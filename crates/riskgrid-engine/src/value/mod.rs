use std::cmp::Ordering;
use std::fmt;

use riskgrid_model::{ErrorKind, SimpleCellAddress};

use crate::config::Config;

mod range_value;
mod rich;

pub use range_value::SimpleRangeValue;
pub use rich::{
    additive_result_type, multiplicative_result_type, CiInterpretation, CiSource, NumberType,
    RichNumber,
};

/// An evaluated error with optional context.
///
/// `root` names the formula vertex the error originated at, so downstream
/// cells that merely propagate it can still report the true source.
#[derive(Clone, Debug, PartialEq)]
pub struct CellError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub root: Option<SimpleCellAddress>,
}

impl CellError {
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            root: None,
        }
    }

    #[must_use]
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            root: None,
        }
    }

    /// Record the originating formula address, keeping the first attribution.
    #[must_use]
    pub fn attributed(mut self, root: SimpleCellAddress) -> Self {
        if self.root.is_none() {
            self.root = Some(root);
        }
        self
    }
}

impl From<ErrorKind> for CellError {
    fn from(kind: ErrorKind) -> Self {
        CellError::new(kind)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{} {}", self.kind.as_code(), msg),
            None => f.write_str(self.kind.as_code()),
        }
    }
}

/// Coarse tag of a [`Value`], for introspection and dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Empty,
    Number,
    Text,
    Bool,
    Error,
    Range,
}

/// An evaluated cell value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The absence of a value: distinct from zero, empty string and false.
    Empty,
    Number(RichNumber),
    Text(String),
    Bool(bool),
    Error(CellError),
    Range(SimpleRangeValue),
}

impl Value {
    /// A plain numeric value.
    #[must_use]
    pub fn number(n: f64) -> Self {
        Value::Number(RichNumber::Raw(n))
    }

    #[must_use]
    pub fn error(kind: ErrorKind) -> Self {
        Value::Error(CellError::new(kind))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    #[must_use]
    pub fn type_of(&self) -> ValueType {
        match self {
            Value::Empty => ValueType::Empty,
            Value::Number(_) => ValueType::Number,
            Value::Text(_) => ValueType::Text,
            Value::Bool(_) => ValueType::Bool,
            Value::Error(_) => ValueType::Error,
            Value::Range(_) => ValueType::Range,
        }
    }

    /// The rich-number tag, when this value is a number.
    #[must_use]
    pub fn detailed_type_of(&self) -> Option<NumberType> {
        match self {
            Value::Number(n) => Some(n.number_type()),
            _ => None,
        }
    }

    /// Representative scalar of a numeric value.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.val()),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<RichNumber> for Value {
    fn from(value: RichNumber) -> Self {
        Value::Number(value)
    }
}

impl From<CellError> for Value {
    fn from(value: CellError) -> Self {
        Value::Error(value)
    }
}

/// Relative float comparison with a multiplicative tolerance band.
///
/// Two values compare equal when each lies within `1 + epsilon` of the other
/// (mirrored for negative right-hand sides).
#[must_use]
pub fn float_cmp(left: f64, right: f64, epsilon: f64) -> Ordering {
    let tolerance = 1.0 + epsilon;
    let equal = if right >= 0.0 {
        left * tolerance >= right && left <= right * tolerance
    } else {
        left * tolerance <= right && left >= right * tolerance
    };
    if equal {
        Ordering::Equal
    } else if left < right {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Ordered comparison across value kinds, for the `<`/`<=`/`>`/`>=`/`=`/`<>`
/// operators.
///
/// Numbers order by representative value under [`float_cmp`]; the type
/// precedence is numbers < text < booleans; `Empty` coerces to the other
/// operand's neutral element. Errors abort the comparison.
pub fn compare_values(left: &Value, right: &Value, config: &Config) -> Result<Ordering, CellError> {
    if let Value::Error(e) = left {
        return Err(e.clone());
    }
    if let Value::Error(e) = right {
        return Err(e.clone());
    }

    let (l, r) = match (left, right) {
        (Value::Empty, Value::Number(_)) => (Value::number(0.0), right.clone()),
        (Value::Number(_), Value::Empty) => (left.clone(), Value::number(0.0)),
        (Value::Empty, Value::Bool(_)) => (Value::Bool(false), right.clone()),
        (Value::Bool(_), Value::Empty) => (left.clone(), Value::Bool(false)),
        (Value::Empty, Value::Text(_)) => (Value::Text(String::new()), right.clone()),
        (Value::Text(_), Value::Empty) => (left.clone(), Value::Text(String::new())),
        _ => (left.clone(), right.clone()),
    };

    Ok(match (&l, &r) {
        (Value::Number(a), Value::Number(b)) => {
            float_cmp(a.val(), b.val(), config.precision_epsilon)
        }
        (Value::Text(a), Value::Text(b)) => {
            if config.case_sensitive {
                a.cmp(b)
            } else {
                let fold = |s: &str| s.chars().flat_map(char::to_uppercase).collect::<String>();
                fold(a).cmp(&fold(b))
            }
        }
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(_), Value::Text(_) | Value::Bool(_)) => Ordering::Less,
        (Value::Text(_), Value::Bool(_)) => Ordering::Less,
        (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        (Value::Bool(_), Value::Number(_) | Value::Text(_)) => Ordering::Greater,
        (Value::Empty, Value::Empty) => Ordering::Equal,
        (Value::Empty, _) => Ordering::Less,
        (_, Value::Empty) => Ordering::Greater,
        _ => return Err(CellError::new(ErrorKind::Value)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_cmp_tolerates_relative_error() {
        let eps = 1e-13;
        assert_eq!(float_cmp(1.0, 1.0 + 1e-14, eps), Ordering::Equal);
        assert_eq!(float_cmp(1.0, 1.0 + 1e-10, eps), Ordering::Less);
        assert_eq!(float_cmp(-1.0, -1.0 - 1e-14, eps), Ordering::Equal);
        assert_eq!(float_cmp(-1.0, -2.0, eps), Ordering::Greater);
    }

    #[test]
    fn type_precedence_orders_numbers_below_text_below_bools() {
        let config = Config::default();
        let n = Value::number(1e9);
        let t = Value::Text("a".to_string());
        let b = Value::Bool(false);
        assert_eq!(compare_values(&n, &t, &config), Ok(Ordering::Less));
        assert_eq!(compare_values(&t, &b, &config), Ok(Ordering::Less));
        assert_eq!(compare_values(&b, &n, &config), Ok(Ordering::Greater));
    }

    #[test]
    fn empty_coerces_to_neutral_element() {
        let config = Config::default();
        assert_eq!(
            compare_values(&Value::Empty, &Value::number(0.0), &config),
            Ok(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&Value::Empty, &Value::Text(String::new()), &config),
            Ok(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&Value::Bool(false), &Value::Empty, &config),
            Ok(Ordering::Equal)
        );
    }

    #[test]
    fn string_comparison_honours_case_sensitivity() {
        let insensitive = Config::default();
        let sensitive = Config {
            case_sensitive: true,
            ..Config::default()
        };
        let a = Value::Text("abc".to_string());
        let b = Value::Text("ABC".to_string());
        assert_eq!(compare_values(&a, &b, &insensitive), Ok(Ordering::Equal));
        assert_ne!(compare_values(&a, &b, &sensitive), Ok(Ordering::Equal));
    }

    #[test]
    fn errors_abort_comparison() {
        let config = Config::default();
        let err = Value::error(ErrorKind::Na);
        assert_eq!(
            compare_values(&err, &Value::number(1.0), &config),
            Err(CellError::new(ErrorKind::Na))
        );
    }
}
