//! Recognition of raw cell text: numbers (with locale separators), percents,
//! currencies, booleans, error codes, dates and times, and the distribution
//! literal forms (`N(μ=…, σ²=…)`, `CI[a, b]`, `a to b`, `LN(…)`, `U(…)`,
//! legacy `P95[a, b]`).
//!
//! Unrecognised text stays a string; a leading `=` never reaches this module
//! (formulas are routed to the parser), and a leading apostrophe suppresses
//! recognition entirely.

use chrono::NaiveDate;
use riskgrid_model::ErrorKind;

use crate::config::Config;
use crate::dist::{self, SeededRng};
use crate::value::{CellError, CiInterpretation, CiSource, RichNumber, Value};

/// Serial day number of the spreadsheet epoch (1899-12-30 is day 0).
fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("static epoch date is valid")
}

/// Try to recognise `text` as a typed literal.
///
/// Returns `None` when nothing matches, in which case the cell holds the
/// text verbatim. Distribution literals draw their sample buffers eagerly
/// from the engine generator, so every stored distribution value satisfies
/// the sample-length invariant; confidence intervals are input-only and
/// convert at operation time.
pub fn parse_cell_literal(text: &str, config: &Config, rng: &mut SeededRng) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Value::Empty);
    }

    if trimmed.eq_ignore_ascii_case("TRUE") {
        return Some(Value::Bool(true));
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return Some(Value::Bool(false));
    }

    if trimmed.starts_with('#') {
        return parse_error_literal(trimmed, config);
    }

    if let Some(value) = parse_distribution_literal(trimmed, config, rng) {
        return Some(value);
    }

    if let Some(value) = parse_numeric_literal(trimmed, config) {
        return Some(value);
    }

    parse_temporal_literal(trimmed)
}

/// `#...` codes matched against the translation package's error map.
///
/// Malformed `#` text (not matching `#[A-Za-z0-9/]+[?!]?`) stays a string.
fn parse_error_literal(text: &str, config: &Config) -> Option<Value> {
    let body = &text[1..];
    if body.is_empty() {
        return None;
    }
    let (main, tail) = match body.char_indices().last() {
        Some((idx, c)) if c == '?' || c == '!' => (&body[..idx], true),
        _ => (body, false),
    };
    if main.is_empty() && tail {
        return None;
    }
    if !main
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '/')
    {
        return None;
    }

    config
        .translation
        .parse_error_code(text)
        .map(|kind| Value::Error(CellError::new(kind)))
}

/// Plain numbers, percents and currency amounts under the configured
/// separators. Overflow (a literal that parses but is not finite) yields
/// `#NUM!` rather than storing a non-finite number.
pub(crate) fn parse_numeric_literal(text: &str, config: &Config) -> Option<Value> {
    if let Some(rest) = text.strip_suffix('%') {
        let n = parse_number(rest.trim_end(), config)?;
        return Some(finite_or_num_error(n / 100.0, |val| RichNumber::Percent {
            val,
        }));
    }

    for symbol in &config.currency_symbols {
        if let Some(rest) = text.strip_prefix(symbol.as_str()) {
            let n = parse_number(rest.trim_start(), config)?;
            return Some(finite_or_num_error(n, |val| RichNumber::Currency {
                val,
                symbol: symbol.clone(),
            }));
        }
        if let Some(rest) = text.strip_suffix(symbol.as_str()) {
            let n = parse_number(rest.trim_end(), config)?;
            return Some(finite_or_num_error(n, |val| RichNumber::Currency {
                val,
                symbol: symbol.clone(),
            }));
        }
    }

    let n = parse_number(text, config)?;
    Some(finite_or_num_error(n, RichNumber::Raw))
}

fn finite_or_num_error(n: f64, wrap: impl FnOnce(f64) -> RichNumber) -> Value {
    if n.is_finite() {
        Value::Number(wrap(n))
    } else {
        Value::Error(CellError::with_message(
            ErrorKind::Num,
            "numeric literal overflowed",
        ))
    }
}

/// Number scanning under the configured decimal/thousand separators.
///
/// Accepts an optional sign, digit groups, one decimal separator and a
/// decimal exponent. Rejects anything else so `1.2.3` or a stray `.` under
/// a `,` decimal locale stays text.
pub(crate) fn parse_number(text: &str, config: &Config) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut normalized = String::with_capacity(text.len());
    let mut digits = 0usize;
    let mut seen_decimal = false;
    let mut seen_exponent = false;
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if c.is_ascii_digit() {
            digits += 1;
            normalized.push(c);
        } else if c == config.decimal_separator && !seen_decimal && !seen_exponent {
            seen_decimal = true;
            normalized.push('.');
        } else if Some(c) == config.thousand_separator && !seen_decimal && !seen_exponent {
            if digits == 0 {
                return None;
            }
        } else if (c == 'e' || c == 'E') && digits > 0 && !seen_exponent {
            seen_exponent = true;
            normalized.push('e');
        } else if (c == '+' || c == '-') && matches!(prev, None | Some('e')) {
            normalized.push(c);
        } else {
            return None;
        }
        prev = Some(if c == 'e' || c == 'E' { 'e' } else { c });
    }

    if digits == 0 {
        return None;
    }
    normalized.parse::<f64>().ok()
}

/// The distribution literal grammar of §6.2.
fn parse_distribution_literal(text: &str, config: &Config, rng: &mut SeededRng) -> Option<Value> {
    // N(μ=a, σ²=b) — Gaussian.
    if let Some(args) = wrapped_args(text, "N", '(', ')', false, config) {
        let [mean, variance] = named_pair(&args, config)?;
        return Some(build_gaussian(mean, variance, config, rng));
    }

    // S(μ=a, σ²=b) — Sampled, generated from the given moments.
    if let Some(args) = wrapped_args(text, "S", '(', ')', false, config) {
        let [mean, variance] = named_pair(&args, config)?;
        let samples = dist::gaussian_samples(mean, variance, config.sample_size, rng);
        return Some(sampled_value(samples));
    }

    // LN(mu, sigma²) — log-normal via its underlying normal parameters.
    if let Some(args) = wrapped_args(text, "LN", '(', ')', true, config) {
        let [mu, sigma_sq] = plain_pair(&args, config)?;
        let samples = dist::lognormal_samples(mu, sigma_sq, config.sample_size, rng);
        return Some(distribution_value(samples, |samples| RichNumber::LogNormal {
            mu,
            sigma_sq,
            samples: Some(samples),
        }));
    }

    // U(a, b) — uniform over [a, b).
    if let Some(args) = wrapped_args(text, "U", '(', ')', true, config) {
        let [lo, hi] = plain_pair(&args, config)?;
        let samples = dist::uniform_samples(lo, hi, config.sample_size, rng);
        return Some(distribution_value(samples, |samples| RichNumber::Uniform {
            lo,
            hi,
            samples: Some(samples),
        }));
    }

    // CI[a, b] and bare [a, b] — 90% confidence interval.
    if let Some(args) = wrapped_args(text, "CI", '[', ']', false, config) {
        let [lo, hi] = plain_pair(&args, config)?;
        return Some(ci_value(lo, hi, 90.0, CiSource::Brackets));
    }
    if let Some(args) = wrapped_args(text, "", '[', ']', false, config) {
        let [lo, hi] = plain_pair(&args, config)?;
        return Some(ci_value(lo, hi, 90.0, CiSource::Brackets));
    }

    // Legacy P<conf>[a, b].
    if let Some(value) = parse_legacy_ci(text, config) {
        return Some(value);
    }

    // `a to b` (case-insensitive keyword).
    if let Some(value) = parse_to_interval(text, config) {
        return Some(value);
    }

    None
}

fn build_gaussian(mean: f64, variance: f64, config: &Config, rng: &mut SeededRng) -> Value {
    let samples = dist::gaussian_samples(mean, variance, config.sample_size, rng);
    distribution_value(samples, |samples| RichNumber::Gaussian {
        mean,
        variance,
        samples: Some(samples),
    })
}

fn distribution_value(
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

fn sampled_value(samples: Vec<f64>) -> Value {
    distribution_value(samples, |samples| RichNumber::Sampled { samples })
}

fn ci_value(lo: f64, hi: f64, confidence: f64, source: CiSource) -> Value {
    Value::Number(RichNumber::confidence_interval(
        lo,
        hi,
        confidence,
        CiInterpretation::Auto,
        source,
    ))
}

/// Strip `PREFIX(args)` / `PREFIX[args]` and return the raw argument text.
fn wrapped_args<'a>(
    text: &'a str,
    prefix: &str,
    open: char,
    close: char,
    case_insensitive: bool,
    _config: &Config,
) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    let matches_prefix = if case_insensitive {
        head.eq_ignore_ascii_case(prefix)
    } else {
        head == prefix
    };
    if !matches_prefix {
        return None;
    }
    let rest = &text[prefix.len()..];
    let inner = rest.strip_prefix(open)?.strip_suffix(close)?;
    Some(inner)
}

/// Exactly two comma-separated plain numbers; anything else unmatches.
fn plain_pair(args: &str, config: &Config) -> Option<[f64; 2]> {
    let mut parts = args.split(config.function_arg_separator);
    let first = parse_number(parts.next()?.trim(), config)?;
    let second = parse_number(parts.next()?.trim(), config)?;
    if parts.next().is_some() {
        return None;
    }
    Some([first, second])
}

/// Two arguments with optional `μ=` / `σ²=` markers.
fn named_pair(args: &str, config: &Config) -> Option<[f64; 2]> {
    let mut parts = args.split(config.function_arg_separator);
    let first = strip_moment_marker(parts.next()?.trim(), &["μ=", "mu="]);
    let second = strip_moment_marker(parts.next()?.trim(), &["σ²=", "σ2=", "var="]);
    if parts.next().is_some() {
        return None;
    }
    Some([
        parse_number(first, config)?,
        parse_number(second, config)?,
    ])
}

fn strip_moment_marker<'a>(arg: &'a str, markers: &[&str]) -> &'a str {
    for marker in markers {
        if let Some(rest) = arg.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    arg
}

/// Match a distribution literal at the start of formula text.
///
/// Returns the parsed literal and the number of bytes consumed. Only the
/// bracketed forms are recognised inside formulas (`N(…)`, `S(…)`, `LN(…)`,
/// `U(…)`, `CI[…]`, `P95[…]`); `a to b` and bare `[a, b]` are cell-input
/// forms only. A two-argument shape that fails to parse falls through, so
/// `LN(5)` still lexes as a call to the logarithm function.
pub(crate) fn match_formula_distribution(
    text: &str,
    config: &Config,
) -> Option<(crate::parser::DistributionLiteral, usize)> {
    use crate::parser::DistributionLiteral as Lit;

    let paren_forms: [(&str, bool); 4] = [
        ("N(", false),
        ("S(", false),
        ("LN(", true),
        ("U(", true),
    ];
    for (prefix, case_insensitive) in paren_forms {
        let head = match text.get(..prefix.len()) {
            Some(h) => h,
            None => continue,
        };
        let matched = if case_insensitive {
            head.eq_ignore_ascii_case(prefix)
        } else {
            head == prefix
        };
        if !matched {
            continue;
        }
        let close = text.find(')')?;
        let inner = &text[prefix.len()..close];
        let consumed = close + 1;
        let lit = match prefix {
            "N(" => {
                let [mean, variance] = named_pair(inner, config)?;
                Lit::Gaussian { mean, variance }
            }
            "S(" => {
                let [mean, variance] = named_pair(inner, config)?;
                Lit::Sampled { mean, variance }
            }
            "LN(" => {
                let [mu, sigma_sq] = plain_pair(inner, config)?;
                Lit::LogNormal { mu, sigma_sq }
            }
            _ => {
                let [lo, hi] = plain_pair(inner, config)?;
                Lit::Uniform { lo, hi }
            }
        };
        return Some((lit, consumed));
    }

    if let Some(rest) = text.strip_prefix("CI[") {
        let close = rest.find(']')?;
        let [lo, hi] = plain_pair(&rest[..close], config)?;
        return Some((
            Lit::ConfidenceInterval {
                lo,
                hi,
                confidence: 90.0,
            },
            3 + close + 1,
        ));
    }

    if let Some(rest) = text.strip_prefix('P') {
        let bracket = rest.find('[')?;
        let confidence: f64 = rest[..bracket].parse().ok()?;
        let close = rest[bracket + 1..].find(']')?;
        let [lo, hi] = plain_pair(&rest[bracket + 1..bracket + 1 + close], config)?;
        return Some((
            Lit::ConfidenceInterval { lo, hi, confidence },
            1 + bracket + 1 + close + 1,
        ));
    }

    None
}

/// Legacy `P<conf>[a, b]` form, e.g. `P95[10, 20]`.
fn parse_legacy_ci(text: &str, config: &Config) -> Option<Value> {
    let rest = text.strip_prefix('P')?;
    let bracket = rest.find('[')?;
    let conf: f64 = rest[..bracket].parse().ok()?;
    let inner = rest[bracket..].strip_prefix('[')?.strip_suffix(']')?;
    let [lo, hi] = plain_pair(inner, config)?;
    Some(ci_value(lo, hi, conf, CiSource::Legacy))
}

/// `a to b` with a case-insensitive keyword.
fn parse_to_interval(text: &str, config: &Config) -> Option<Value> {
    let lower = text.to_ascii_lowercase();
    let idx = lower.find(" to ")?;
    let lo = parse_number(text[..idx].trim(), config)?;
    let hi = parse_number(text[idx + 4..].trim(), config)?;
    Some(ci_value(lo, hi, 90.0, CiSource::Keyword))
}

/// ISO dates, slash dates, and clock times.
pub(crate) fn parse_temporal_literal(text: &str) -> Option<Value> {
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            let serial = (date - epoch()).num_days() as f64;
            return Some(Value::Number(RichNumber::Date {
                val: serial,
                format: Some(format.to_string()),
            }));
        }
    }

    if let Some(fraction) = parse_clock_time(text) {
        return Some(Value::Number(RichNumber::Time {
            val: fraction,
            format: Some("%H:%M:%S".to_string()),
        }));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, format) {
            let days = (dt.date() - epoch()).num_days() as f64;
            let fraction =
                f64::from(chrono::Timelike::num_seconds_from_midnight(&dt.time())) / 86_400.0;
            return Some(Value::Number(RichNumber::DateTime {
                val: days + fraction,
                format: Some(format.to_string()),
            }));
        }
    }

    None
}

fn parse_clock_time(text: &str) -> Option<f64> {
    let mut parts = text.split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some(f64::from(hours * 3600 + minutes * 60 + seconds) / 86_400.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NumberType;

    fn parse(text: &str) -> Option<Value> {
        let config = Config::default();
        let mut rng = SeededRng::new(1);
        parse_cell_literal(text, &config, &mut rng)
    }

    #[test]
    fn plain_and_signed_numbers() {
        assert_eq!(parse("42"), Some(Value::number(42.0)));
        assert_eq!(parse("-1.5"), Some(Value::number(-1.5)));
        assert_eq!(parse("1e3"), Some(Value::number(1000.0)));
        assert_eq!(parse("abc"), None);
        assert_eq!(parse("1.2.3"), None);
    }

    #[test]
    fn locale_separators() {
        let config = Config {
            decimal_separator: ',',
            thousand_separator: Some('.'),
            function_arg_separator: ';',
            ..Config::default()
        };
        assert_eq!(parse_number("1.234,5", &config), Some(1234.5));
        assert_eq!(parse_number("1,5", &config), Some(1.5));
    }

    #[test]
    fn percent_is_stored_as_fraction() {
        assert_eq!(
            parse("5%"),
            Some(Value::Number(RichNumber::Percent { val: 0.05 }))
        );
    }

    #[test]
    fn currency_keeps_its_symbol() {
        assert_eq!(
            parse("$12.50"),
            Some(Value::Number(RichNumber::Currency {
                val: 12.5,
                symbol: "$".to_string()
            }))
        );
    }

    #[test]
    fn booleans_and_errors() {
        assert_eq!(parse("true"), Some(Value::Bool(true)));
        assert_eq!(
            parse("#DIV/0!"),
            Some(Value::Error(CellError::new(ErrorKind::DivByZero)))
        );
        assert_eq!(parse("#not an error"), None);
    }

    #[test]
    fn gaussian_literal() {
        let value = parse("N(μ=3.5, σ²=0.25)").unwrap();
        match value {
            Value::Number(RichNumber::Gaussian {
                mean,
                variance,
                samples,
            }) => {
                assert_eq!(mean, 3.5);
                assert_eq!(variance, 0.25);
                assert_eq!(samples.unwrap().len(), 10_000);
            }
            other => panic!("expected Gaussian, got {other:?}"),
        }
    }

    #[test]
    fn one_argument_gaussian_stays_text() {
        assert_eq!(parse("N(1)"), None);
        assert_eq!(parse("N(1, 2, 3)"), None);
    }

    #[test]
    fn sampled_literal_draws_from_parameters() {
        let value = parse("S(μ=1, σ²=2)").unwrap();
        match value {
            Value::Number(RichNumber::Sampled { samples }) => {
                assert_eq!(samples.len(), 10_000);
                let (mean, variance) = crate::dist::fit_normal(&samples);
                assert!((mean - 1.0).abs() < 0.1, "mean = {mean}");
                assert!((variance - 2.0).abs() < 0.15, "variance = {variance}");
            }
            other => panic!("expected Sampled, got {other:?}"),
        }
    }

    #[test]
    fn confidence_interval_forms() {
        for text in ["CI[10, 20]", "[10, 20]", "10 to 20", "10 TO 20"] {
            let value = parse(text).unwrap_or_else(|| panic!("{text} did not parse"));
            match value {
                Value::Number(RichNumber::ConfidenceInterval {
                    lo,
                    hi,
                    confidence,
                    interpretation,
                    ..
                }) => {
                    assert_eq!((lo, hi), (10.0, 20.0), "{text}");
                    assert_eq!(confidence, 90.0);
                    assert_eq!(interpretation, CiInterpretation::Auto);
                }
                other => panic!("expected CI for {text}, got {other:?}"),
            }
        }
    }

    #[test]
    fn legacy_ci_carries_its_confidence() {
        let value = parse("P95[10, 20]").unwrap();
        match value {
            Value::Number(RichNumber::ConfidenceInterval {
                confidence, source, ..
            }) => {
                assert_eq!(confidence, 95.0);
                assert_eq!(source, CiSource::Legacy);
            }
            other => panic!("expected CI, got {other:?}"),
        }
    }

    #[test]
    fn lognormal_and_uniform_are_case_insensitive() {
        assert_eq!(
            parse("LN(0, 0.25)").unwrap().detailed_type_of(),
            Some(NumberType::LogNormal)
        );
        assert_eq!(
            parse("ln(0, 0.25)").unwrap().detailed_type_of(),
            Some(NumberType::LogNormal)
        );
        assert_eq!(
            parse("u(0, 1)").unwrap().detailed_type_of(),
            Some(NumberType::Uniform)
        );
    }

    #[test]
    fn iso_date_serial() {
        // 1900-01-01 is serial day 2 from the 1899-12-30 epoch.
        match parse("1900-01-01").unwrap() {
            Value::Number(RichNumber::Date { val, .. }) => assert_eq!(val, 2.0),
            other => panic!("expected Date, got {other:?}"),
        }
    }

    #[test]
    fn clock_time_is_day_fraction() {
        match parse("06:00").unwrap() {
            Value::Number(RichNumber::Time { val, .. }) => assert_eq!(val, 0.25),
            other => panic!("expected Time, got {other:?}"),
        }
    }

    #[test]
    fn numeric_overflow_is_num_error() {
        match parse("1e999").unwrap() {
            Value::Error(e) => assert_eq!(e.kind, ErrorKind::Num),
            other => panic!("expected error, got {other:?}"),
        }
    }
}
