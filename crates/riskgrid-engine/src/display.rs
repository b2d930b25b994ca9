//! The serialization surface: rendering evaluated values for output.
//!
//! Distribution values render with their fitted parameters
//! (`N(μ=4.00, σ²=6.00)`, `S(μ=1.00, σ²=2.00)`, `CI[10, 20]`); plain
//! numbers honour smart rounding; errors go through the translation
//! package.

use crate::config::Config;
use crate::dist;
use crate::value::{CellError, RichNumber, Value};

/// Render a cell value. `Empty` renders as `None` (a JSON `null` at the
/// boundary); everything else is a string.
#[must_use]
pub fn format_cell_value(value: &Value, config: &Config) -> Option<String> {
    match value {
        Value::Empty => None,
        Value::Number(n) => Some(format_rich_number(n, config)),
        Value::Text(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Error(e) => Some(format_error(e, config)),
        Value::Range(range) => {
            // A bare range renders via its top-left value.
            match range.get(0, 0) {
                Some(v) => format_cell_value(v, config),
                None => None,
            }
        }
    }
}

/// Localized error code, with any retained message appended.
#[must_use]
pub fn format_error(error: &CellError, config: &Config) -> String {
    let code = config.translation.error_code(error.kind);
    match &error.message {
        Some(msg) => format!("{code} {msg}"),
        None => code,
    }
}

/// Render a rich number by its detailed type.
#[must_use]
pub fn format_rich_number(n: &RichNumber, config: &Config) -> String {
    match n {
        RichNumber::Raw(v) => format_number(*v, config),
        RichNumber::Currency { val, symbol } => {
            format!("{symbol}{}", format_number(*val, config))
        }
        RichNumber::Percent { val } => {
            format!("{}%", format_number(val * 100.0, config))
        }
        RichNumber::Date { val, .. } => format_date(*val),
        RichNumber::Time { val, .. } => format_time(*val),
        RichNumber::DateTime { val, .. } => {
            format!("{} {}", format_date(val.floor()), format_time(val.fract()))
        }
        RichNumber::Gaussian { mean, variance, .. } => {
            format!("N(μ={mean:.2}, σ²={variance:.2})")
        }
        RichNumber::LogNormal { mu, sigma_sq, .. } => {
            format!("LN(μ={mu:.2}, σ²={sigma_sq:.2})")
        }
        RichNumber::Uniform { lo, hi, .. } => format!("U({lo:.2}, {hi:.2})"),
        RichNumber::ConfidenceInterval { lo, hi, .. } => {
            format!("CI[{}, {}]", format_number(*lo, config), format_number(*hi, config))
        }
        RichNumber::Sampled { samples } => {
            let (mean, variance) = dist::fit_normal(samples);
            format!("S(μ={mean:.2}, σ²={variance:.2})")
        }
    }
}

/// Plain number formatting: smart rounding (half away from zero to the
/// configured number of significant digits), then the locale's decimal
/// separator.
#[must_use]
pub fn format_number(n: f64, config: &Config) -> String {
    let rounded = if config.smart_rounding {
        round_to_significant_digits(n, config.precision_rounding)
    } else {
        n
    };
    let text = format!("{rounded}");
    if config.decimal_separator == '.' {
        text
    } else {
        text.replace('.', &config.decimal_separator.to_string())
    }
}

/// Half-away-from-zero rounding to `digits` significant digits.
#[must_use]
pub fn round_to_significant_digits(n: f64, digits: u8) -> f64 {
    if n == 0.0 || !n.is_finite() || digits == 0 {
        return n;
    }
    let magnitude = n.abs().log10().floor() as i32;
    let scale = 10f64.powi(i32::from(digits) - 1 - magnitude);
    // `f64::round` is half-away-from-zero.
    (n * scale).round() / scale
}

fn format_date(serial: f64) -> String {
    let epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).expect("static epoch date is valid");
    match epoch.checked_add_days(chrono::Days::new(serial.max(0.0) as u64)) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => format!("{serial}"),
    }
}

fn format_time(fraction: f64) -> String {
    let total_seconds = (fraction.fract().abs() * 86_400.0).round() as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smart_rounding_kills_float_noise() {
        let config = Config::default();
        assert_eq!(format_number(0.1 + 0.2, &config), "0.3");
        assert_eq!(format_number(1.0, &config), "1");
    }

    #[test]
    fn significant_digit_rounding_is_half_away_from_zero() {
        assert_eq!(round_to_significant_digits(0.125, 2), 0.13);
        assert_eq!(round_to_significant_digits(-0.125, 2), -0.13);
        assert_eq!(round_to_significant_digits(123_456.0, 3), 123_000.0);
    }

    #[test]
    fn distribution_rendering() {
        let config = Config::default();
        let gaussian = RichNumber::Gaussian {
            mean: 4.0,
            variance: 6.0,
            samples: None,
        };
        assert_eq!(
            format_rich_number(&gaussian, &config),
            "N(μ=4.00, σ²=6.00)"
        );

        let ci = RichNumber::confidence_interval(
            10.0,
            20.0,
            90.0,
            crate::value::CiInterpretation::Auto,
            crate::value::CiSource::Brackets,
        );
        assert_eq!(format_rich_number(&ci, &config), "CI[10, 20]");
    }

    #[test]
    fn empty_renders_as_null() {
        let config = Config::default();
        assert_eq!(format_cell_value(&Value::Empty, &config), None);
        assert_eq!(
            format_cell_value(&Value::Bool(true), &config),
            Some("TRUE".to_string())
        );
    }

    #[test]
    fn rich_kinds_render_by_type() {
        let config = Config::default();
        assert_eq!(
            format_rich_number(
                &RichNumber::Currency {
                    val: 12.5,
                    symbol: "$".to_string()
                },
                &config
            ),
            "$12.5"
        );
        assert_eq!(
            format_rich_number(&RichNumber::Percent { val: 0.05 }, &config),
            "5%"
        );
        assert_eq!(
            format_rich_number(
                &RichNumber::Date {
                    val: 2.0,
                    format: None
                },
                &config
            ),
            "1900-01-01"
        );
    }
}
