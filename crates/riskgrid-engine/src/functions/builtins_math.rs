use std::collections::HashSet;

use riskgrid_model::ErrorKind;

use super::{ArgType, FunctionSpec, ParamSpec, VAR_ARGS};
use crate::eval::Interpreter;
use crate::parser::Ast;
use crate::value::{CellError, Value};

macro_rules! math_spec {
    ($name:literal, $min:expr, $max:expr, $params:expr, $impl:path) => {
        math_spec!($name, $min, $max, $params, $impl, expand_ranges = false);
    };
    ($name:literal, $min:expr, $max:expr, $params:expr, $impl:path, expand_ranges = $expand:expr) => {
        inventory::submit! {
            FunctionSpec {
                name: $name,
                min_args: $min,
                max_args: $max,
                parameters: $params,
                is_volatile: false,
                is_dependent_on_sheet_structure_change: false,
                expand_ranges: $expand,
                repeat_last_args: false,
                does_not_need_arguments_to_be_computed: false,
                vectorization_forbidden: false,
                implementation: $impl,
            }
        }
    };
}

const ONE_NUMBER: &[ParamSpec] = &[ParamSpec::required(ArgType::Number)];
const TWO_NUMBERS: &[ParamSpec] = &[
    ParamSpec::required(ArgType::Number),
    ParamSpec::required(ArgType::Number),
];
const ANY_VALUES: &[ParamSpec] = &[ParamSpec::required(ArgType::Any)];

math_spec!(
    "DELTA",
    1,
    2,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Number, 0.0),
    ],
    delta
);
math_spec!("MOD", 2, 2, TWO_NUMBERS, modulo);
math_spec!("INT", 1, 1, ONE_NUMBER, int);
math_spec!(
    "ROUND",
    1,
    2,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Integer, 0.0),
    ],
    round
);
math_spec!(
    "ROUNDUP",
    1,
    2,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Integer, 0.0),
    ],
    roundup
);
math_spec!(
    "ROUNDDOWN",
    1,
    2,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Integer, 0.0),
    ],
    rounddown
);
math_spec!("EVEN", 1, 1, ONE_NUMBER, even);
math_spec!("ODD", 1, 1, ONE_NUMBER, odd);
math_spec!("CEILING", 1, 2, TWO_NUMBERS, ceiling);
math_spec!(
    "CEILING.MATH",
    1,
    3,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Number, 1.0),
        ParamSpec::optional_with_default(ArgType::Number, 0.0),
    ],
    ceiling_math
);
math_spec!(
    "CEILING.PRECISE",
    1,
    2,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Number, 1.0),
    ],
    ceiling_precise
);
math_spec!("FLOOR", 1, 2, TWO_NUMBERS, floor);
math_spec!(
    "FLOOR.MATH",
    1,
    3,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Number, 1.0),
        ParamSpec::optional_with_default(ArgType::Number, 0.0),
    ],
    floor_math
);
math_spec!(
    "FLOOR.PRECISE",
    1,
    2,
    &[
        ParamSpec::required(ArgType::Number),
        ParamSpec::optional_with_default(ArgType::Number, 1.0),
    ],
    floor_precise
);
math_spec!("ABS", 1, 1, ONE_NUMBER, abs);
math_spec!("PI", 0, 0, &[], pi);
math_spec!("SQRTPI", 1, 1, ONE_NUMBER, sqrtpi);
math_spec!("RADIANS", 1, 1, ONE_NUMBER, radians);
math_spec!("DEGREES", 1, 1, ONE_NUMBER, degrees);
math_spec!("BITAND", 2, 2, TWO_NUMBERS, bitand);
math_spec!("BITOR", 2, 2, TWO_NUMBERS, bitor);
math_spec!("BITXOR", 2, 2, TWO_NUMBERS, bitxor);
math_spec!("LN", 1, 1, ONE_NUMBER, ln);
math_spec!("EXP", 1, 1, ONE_NUMBER, exp);
math_spec!("SQRT", 1, 1, ONE_NUMBER, sqrt);
math_spec!("SUM", 0, VAR_ARGS, ANY_VALUES, sum, expand_ranges = true);
math_spec!("AVERAGE", 1, VAR_ARGS, ANY_VALUES, average, expand_ranges = true);
math_spec!("MIN", 1, VAR_ARGS, ANY_VALUES, min, expand_ranges = true);
math_spec!("MAX", 1, VAR_ARGS, ANY_VALUES, max, expand_ranges = true);
math_spec!("COUNT", 1, VAR_ARGS, ANY_VALUES, count, expand_ranges = true);
math_spec!(
    "COUNTUNIQUE",
    1,
    VAR_ARGS,
    ANY_VALUES,
    countunique,
    expand_ranges = true
);

fn delta(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let a = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let b = match args.get(1) {
        Some(arg) => match interp.f64_arg(arg) {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        },
        None => 0.0,
    };
    Value::number(if a == b { 1.0 } else { 0.0 })
}

/// Sign follows the divisor, like spreadsheet MOD.
fn modulo(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let a = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let b = match interp.f64_arg(&args[1]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if b == 0.0 {
        return Value::error(ErrorKind::DivByZero);
    }
    Value::number(a - b * (a / b).floor())
}

fn int(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => Value::number(n.floor()),
        Err(e) => Value::Error(e),
    }
}

/// Half-away-from-zero rounding at a decimal position.
fn round_half_away(n: f64, places: i64) -> f64 {
    let factor = 10f64.powi(places as i32);
    (n * factor).round() / factor
}

fn round(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let n = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let places = match args.get(1) {
        Some(arg) => match interp.int_arg(arg) {
            Ok(p) => p,
            Err(e) => return Value::Error(e),
        },
        None => 0,
    };
    Value::number(round_half_away(n, places))
}

fn roundup(interp: &mut Interpreter, args: &[Ast]) -> Value {
    directional_round(interp, args, true)
}

fn rounddown(interp: &mut Interpreter, args: &[Ast]) -> Value {
    directional_round(interp, args, false)
}

fn directional_round(interp: &mut Interpreter, args: &[Ast], away: bool) -> Value {
    let n = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let places = match args.get(1) {
        Some(arg) => match interp.int_arg(arg) {
            Ok(p) => p,
            Err(e) => return Value::Error(e),
        },
        None => 0,
    };
    let factor = 10f64.powi(places as i32);
    let scaled = n * factor;
    let rounded = if away {
        scaled.abs().ceil() * scaled.signum()
    } else {
        scaled.abs().floor() * scaled.signum()
    };
    Value::number(rounded / factor)
}

fn even(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => Value::number(round_away_to_multiple(n, 2.0)),
        Err(e) => Value::Error(e),
    }
}

fn odd(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => {
            let sign = if n < 0.0 { -1.0 } else { 1.0 };
            let magnitude = n.abs();
            let mut candidate = magnitude.ceil();
            if candidate % 2.0 == 0.0 {
                candidate += 1.0;
            }
            // ODD(0) = 1.
            if magnitude == 0.0 {
                candidate = 1.0;
            }
            Value::number(sign * candidate)
        }
        Err(e) => Value::Error(e),
    }
}

fn round_away_to_multiple(n: f64, multiple: f64) -> f64 {
    let sign = if n < 0.0 { -1.0 } else { 1.0 };
    sign * (n.abs() / multiple).ceil() * multiple
}

/// Classic CEILING: operands must agree in sign.
fn ceiling(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let n = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let significance = match args.get(1) {
        Some(arg) => match interp.f64_arg(arg) {
            Ok(s) => s,
            Err(e) => return Value::Error(e),
        },
        None => 1.0,
    };
    if significance == 0.0 {
        return Value::number(0.0);
    }
    if n > 0.0 && significance < 0.0 {
        return Value::error(ErrorKind::Num);
    }
    Value::number((n / significance).ceil() * significance)
}

fn ceiling_math(interp: &mut Interpreter, args: &[Ast]) -> Value {
    directional_significance(interp, args, true)
}

fn floor_math(interp: &mut Interpreter, args: &[Ast]) -> Value {
    directional_significance(interp, args, false)
}

/// CEILING.MATH / FLOOR.MATH: significance is taken absolute; `mode`
/// flips the direction for negative inputs.
fn directional_significance(interp: &mut Interpreter, args: &[Ast], up: bool) -> Value {
    let n = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let significance = match args.get(1) {
        Some(arg) => match interp.f64_arg(arg) {
            Ok(s) => s.abs(),
            Err(e) => return Value::Error(e),
        },
        None => 1.0,
    };
    let mode = match args.get(2) {
        Some(arg) => match interp.f64_arg(arg) {
            Ok(m) => m,
            Err(e) => return Value::Error(e),
        },
        None => 0.0,
    };
    if significance == 0.0 {
        return Value::number(0.0);
    }

    let toward_up = if n < 0.0 && mode != 0.0 { !up } else { up };
    let q = n / significance;
    let rounded = if toward_up { q.ceil() } else { q.floor() };
    Value::number(rounded * significance)
}

fn ceiling_precise(interp: &mut Interpreter, args: &[Ast]) -> Value {
    precise_significance(interp, args, true)
}

fn floor_precise(interp: &mut Interpreter, args: &[Ast]) -> Value {
    precise_significance(interp, args, false)
}

fn precise_significance(interp: &mut Interpreter, args: &[Ast], up: bool) -> Value {
    let n = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let significance = match args.get(1) {
        Some(arg) => match interp.f64_arg(arg) {
            Ok(s) => s.abs(),
            Err(e) => return Value::Error(e),
        },
        None => 1.0,
    };
    if significance == 0.0 {
        return Value::number(0.0);
    }
    let q = n / significance;
    let rounded = if up { q.ceil() } else { q.floor() };
    Value::number(rounded * significance)
}

fn floor(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let n = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let significance = match args.get(1) {
        Some(arg) => match interp.f64_arg(arg) {
            Ok(s) => s,
            Err(e) => return Value::Error(e),
        },
        None => 1.0,
    };
    if significance == 0.0 {
        return Value::error(ErrorKind::DivByZero);
    }
    if n > 0.0 && significance < 0.0 {
        return Value::error(ErrorKind::Num);
    }
    Value::number((n / significance).floor() * significance)
}

fn abs(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => Value::number(n.abs()),
        Err(e) => Value::Error(e),
    }
}

fn pi(_interp: &mut Interpreter, _args: &[Ast]) -> Value {
    Value::number(std::f64::consts::PI)
}

fn sqrtpi(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) if n >= 0.0 => Value::number((n * std::f64::consts::PI).sqrt()),
        Ok(_) => Value::error(ErrorKind::Num),
        Err(e) => Value::Error(e),
    }
}

fn radians(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => Value::number(n.to_radians()),
        Err(e) => Value::Error(e),
    }
}

fn degrees(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => Value::number(n.to_degrees()),
        Err(e) => Value::Error(e),
    }
}

const BIT_MAX: f64 = 281_474_976_710_655.0; // 2^48 - 1

fn bit_operand(interp: &mut Interpreter, arg: &Ast) -> Result<u64, CellError> {
    let n = interp.f64_arg(arg)?;
    if n < 0.0 || n > BIT_MAX || n.fract() != 0.0 {
        return Err(CellError::new(ErrorKind::Num));
    }
    Ok(n as u64)
}

fn bitand(interp: &mut Interpreter, args: &[Ast]) -> Value {
    bitwise(interp, args, |a, b| a & b)
}

fn bitor(interp: &mut Interpreter, args: &[Ast]) -> Value {
    bitwise(interp, args, |a, b| a | b)
}

fn bitxor(interp: &mut Interpreter, args: &[Ast]) -> Value {
    bitwise(interp, args, |a, b| a ^ b)
}

fn bitwise(interp: &mut Interpreter, args: &[Ast], op: impl Fn(u64, u64) -> u64) -> Value {
    let a = match bit_operand(interp, &args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let b = match bit_operand(interp, &args[1]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    Value::number(op(a, b) as f64)
}

fn ln(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) if n > 0.0 => Value::number(n.ln()),
        Ok(_) => Value::error(ErrorKind::Num),
        Err(e) => Value::Error(e),
    }
}

fn exp(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => {
            let r = n.exp();
            if r.is_finite() {
                Value::number(r)
            } else {
                Value::error(ErrorKind::Num)
            }
        }
        Err(e) => Value::Error(e),
    }
}

fn sqrt(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) if n >= 0.0 => Value::number(n.sqrt()),
        Ok(_) => Value::error(ErrorKind::Num),
        Err(e) => Value::Error(e),
    }
}

/// SUM leans on the hierarchical range cache for graph-backed ranges.
fn sum(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let mut total = 0.0;
    for arg in args {
        match interp.eval_arg(arg) {
            Value::Error(e) => return Value::Error(e),
            Value::Range(range) => {
                let result = match range.source.filter(|r| r.is_finite()) {
                    Some(graph_range) => interp.sum_of_range(graph_range),
                    None => {
                        let mut acc = 0.0;
                        for v in range.iter() {
                            match v {
                                Value::Number(n) => acc += n.val(),
                                Value::Error(e) => return Value::Error(e.clone()),
                                _ => {}
                            }
                        }
                        Ok(acc)
                    }
                };
                match result {
                    Ok(part) => total += part,
                    Err(e) => return Value::Error(e),
                }
            }
            Value::Number(n) => total += n.val(),
            Value::Bool(b) => total += if b { 1.0 } else { 0.0 },
            Value::Empty => {}
            Value::Text(s) => {
                match crate::eval::coerce_scalar_to_number(&Value::Text(s), interp.config()) {
                    Ok(n) => total += n.val(),
                    Err(e) => return Value::Error(e),
                }
            }
        }
    }
    Value::number(total)
}

fn average(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let mut acc = 0.0;
    let mut n = 0u64;
    for arg in args {
        match interp.eval_arg(arg) {
            Value::Error(e) => return Value::Error(e),
            Value::Range(range) => {
                for v in range.iter() {
                    match v {
                        Value::Number(num) => {
                            acc += num.val();
                            n += 1;
                        }
                        Value::Error(e) => return Value::Error(e.clone()),
                        _ => {}
                    }
                }
            }
            Value::Number(num) => {
                acc += num.val();
                n += 1;
            }
            Value::Bool(b) => {
                acc += if b { 1.0 } else { 0.0 };
                n += 1;
            }
            Value::Empty => {}
            Value::Text(_) => return Value::error(ErrorKind::Value),
        }
    }
    if n == 0 {
        return Value::error(ErrorKind::DivByZero);
    }
    Value::number(acc / n as f64)
}

fn min(interp: &mut Interpreter, args: &[Ast]) -> Value {
    extremum(interp, args, f64::INFINITY, f64::min)
}

fn max(interp: &mut Interpreter, args: &[Ast]) -> Value {
    extremum(interp, args, f64::NEG_INFINITY, f64::max)
}

fn extremum(
    interp: &mut Interpreter,
    args: &[Ast],
    init: f64,
    pick: impl Fn(f64, f64) -> f64,
) -> Value {
    let mut best = init;
    let mut seen = false;
    for arg in args {
        match interp.eval_arg(arg) {
            Value::Error(e) => return Value::Error(e),
            Value::Range(range) => {
                for v in range.iter() {
                    match v {
                        Value::Number(n) => {
                            best = pick(best, n.val());
                            seen = true;
                        }
                        Value::Error(e) => return Value::Error(e.clone()),
                        _ => {}
                    }
                }
            }
            Value::Number(n) => {
                best = pick(best, n.val());
                seen = true;
            }
            Value::Bool(b) => {
                best = pick(best, if b { 1.0 } else { 0.0 });
                seen = true;
            }
            Value::Empty => {}
            Value::Text(_) => return Value::error(ErrorKind::Value),
        }
    }
    if !seen {
        return Value::number(0.0);
    }
    Value::number(best)
}

fn count(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let mut n = 0u64;
    for arg in args {
        match interp.eval_arg(arg) {
            Value::Range(range) => {
                n += range
                    .iter()
                    .filter(|v| matches!(v, Value::Number(_)))
                    .count() as u64;
            }
            Value::Number(_) => n += 1,
            // Scalars that coerce count too (COUNT("3") = 1).
            Value::Text(s)
                if crate::eval::coerce_scalar_to_number(
                    &Value::Text(s.clone()),
                    interp.config(),
                )
                .is_ok() =>
            {
                n += 1;
            }
            Value::Bool(_) => n += 1,
            _ => {}
        }
    }
    Value::number(n as f64)
}

/// Count distinct non-empty values across all arguments.
fn countunique(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let values = match interp.flatten_args(args) {
        Ok(v) => v,
        Err(e) => return Value::Error(e),
    };
    let case_sensitive = interp.config().case_sensitive;
    let mut seen: HashSet<String> = HashSet::new();
    for value in values {
        let key = match value {
            Value::Empty => continue,
            Value::Number(n) => format!("n:{}", n.val().to_bits()),
            Value::Bool(b) => format!("b:{b}"),
            Value::Text(s) => {
                if case_sensitive {
                    format!("s:{s}")
                } else {
                    format!("s:{}", s.to_lowercase())
                }
            }
            Value::Error(e) => format!("e:{}", e.kind.as_code()),
            Value::Range(_) => continue,
        };
        seen.insert(key);
    }
    Value::number(seen.len() as f64)
}
