//! Scalar coercion contracts used by operators and function arguments.

use riskgrid_model::ErrorKind;

use crate::config::Config;
use crate::display;
use crate::literals;
use crate::value::{CellError, RichNumber, Value};

/// Coerce a scalar value to a rich number.
///
/// Booleans map to 0/1, empties to 0, and strings are re-read through the
/// numeric literal forms (plain, percent, currency, date/time). Anything
/// else is a `#VALUE!` error; errors pass through.
pub fn coerce_scalar_to_number(value: &Value, config: &Config) -> Result<RichNumber, CellError> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        Value::Bool(b) => Ok(RichNumber::Raw(if *b { 1.0 } else { 0.0 })),
        Value::Empty => Ok(RichNumber::Raw(0.0)),
        Value::Text(s) => {
            let trimmed = s.trim();
            let parsed = literals::parse_numeric_literal(trimmed, config)
                .or_else(|| literals::parse_temporal_literal(trimmed));
            match parsed {
                Some(Value::Number(n)) => Ok(n),
                Some(Value::Error(e)) => Err(e),
                _ => Err(CellError::new(ErrorKind::Value)),
            }
        }
        Value::Error(e) => Err(e.clone()),
        Value::Range(_) => Err(CellError::with_message(
            ErrorKind::Value,
            "expected a scalar, got a range",
        )),
    }
}

/// Coerce a scalar to a boolean. Returns `None` for values with no boolean
/// reading (callers typically surface `#VALUE!`).
#[must_use]
pub fn coerce_scalar_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Empty => Some(false),
        Value::Number(n) => Some(n.val() != 0.0),
        Value::Text(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Some(false);
            }
            if t.eq_ignore_ascii_case("TRUE") {
                return Some(true);
            }
            if t.eq_ignore_ascii_case("FALSE") {
                return Some(false);
            }
            None
        }
        Value::Error(_) | Value::Range(_) => None,
    }
}

/// Coerce a scalar to text for `&`, `CONCATENATE` and friends.
pub fn coerce_scalar_to_string(value: &Value, config: &Config) -> Result<String, CellError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Number(n) => Ok(display::format_rich_number(n, config)),
        Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Empty => Ok(String::new()),
        Value::Error(e) => Err(e.clone()),
        Value::Range(_) => Err(CellError::new(ErrorKind::Value)),
    }
}

/// Parse a complex number of the form `a+bi` into `[re, im]`.
///
/// Accepted shapes: `a`, `bi`, `i`, `a+bi`, `a-bi`, with optional leading
/// signs and either `i` or `j` as the imaginary unit.
#[must_use]
pub fn coerce_complex(text: &str) -> Option<[f64; 2]> {
    let s: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }

    let unit = if s.contains('i') {
        'i'
    } else if s.contains('j') {
        'j'
    } else {
        // Pure real.
        return s.parse::<f64>().ok().map(|re| [re, 0.0]);
    };
    if !s.ends_with(unit) || s.matches(unit).count() != 1 {
        return None;
    }

    let body = &s[..s.len() - 1];

    // Split at the sign that separates the real and imaginary parts: the
    // last `+`/`-` that is not a leading sign and not an exponent sign.
    let bytes = body.as_bytes();
    let mut split = None;
    for idx in (1..bytes.len()).rev() {
        let b = bytes[idx];
        if (b == b'+' || b == b'-') && !matches!(bytes[idx - 1], b'e' | b'E') {
            split = Some(idx);
            break;
        }
    }

    match split {
        Some(idx) => {
            let re: f64 = body[..idx].parse().ok()?;
            let im_str = &body[idx..];
            let im = parse_signed_coefficient(im_str)?;
            Some([re, im])
        }
        None => {
            let im = parse_signed_coefficient(body)?;
            Some([0.0, im])
        }
    }
}

fn parse_signed_coefficient(s: &str) -> Option<f64> {
    match s {
        "" | "+" => Some(1.0),
        "-" => Some(-1.0),
        _ => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_booleans_and_empty() {
        let config = Config::default();
        assert_eq!(
            coerce_scalar_to_number(&Value::Bool(true), &config),
            Ok(RichNumber::Raw(1.0))
        );
        assert_eq!(
            coerce_scalar_to_number(&Value::Empty, &config),
            Ok(RichNumber::Raw(0.0))
        );
        assert_eq!(
            coerce_scalar_to_number(&Value::Text(" 5% ".to_string()), &config),
            Ok(RichNumber::Percent { val: 0.05 })
        );
        assert!(coerce_scalar_to_number(&Value::Text("abc".to_string()), &config).is_err());
    }

    #[test]
    fn bool_coercion() {
        assert_eq!(coerce_scalar_to_bool(&Value::Empty), Some(false));
        assert_eq!(
            coerce_scalar_to_bool(&Value::Text("".to_string())),
            Some(false)
        );
        assert_eq!(
            coerce_scalar_to_bool(&Value::Text("tRuE".to_string())),
            Some(true)
        );
        assert_eq!(coerce_scalar_to_bool(&Value::number(0.0)), Some(false));
        assert_eq!(coerce_scalar_to_bool(&Value::number(-3.0)), Some(true));
        assert_eq!(coerce_scalar_to_bool(&Value::Text("yes".to_string())), None);
    }

    #[test]
    fn complex_forms() {
        assert_eq!(coerce_complex("3+4i"), Some([3.0, 4.0]));
        assert_eq!(coerce_complex("3-4i"), Some([3.0, -4.0]));
        assert_eq!(coerce_complex("2.5"), Some([2.5, 0.0]));
        assert_eq!(coerce_complex("4i"), Some([0.0, 4.0]));
        assert_eq!(coerce_complex("-i"), Some([0.0, -1.0]));
        assert_eq!(coerce_complex("1e2+3i"), Some([100.0, 3.0]));
        assert_eq!(coerce_complex("i3"), None);
        assert_eq!(coerce_complex("abc"), None);
    }
}
