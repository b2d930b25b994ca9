use riskgrid_model::ErrorKind;

use super::{ArgType, FunctionSpec, ParamSpec};
use crate::eval::Interpreter;
use crate::parser::Ast;
use crate::value::Value;

macro_rules! trig_spec {
    ($name:literal, $impl:path) => {
        inventory::submit! {
            FunctionSpec {
                name: $name,
                min_args: 1,
                max_args: 1,
                parameters: &[ParamSpec::required(ArgType::Number)],
                is_volatile: false,
                is_dependent_on_sheet_structure_change: false,
                expand_ranges: false,
                repeat_last_args: false,
                does_not_need_arguments_to_be_computed: false,
                vectorization_forbidden: false,
                implementation: $impl,
            }
        }
    };
}

/// One numeric argument mapped through `f`; `None` means a domain error.
fn unary(interp: &mut Interpreter, args: &[Ast], f: impl Fn(f64) -> Option<f64>) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(n) => match f(n) {
            Some(r) if r.is_finite() => Value::number(r),
            Some(_) | None => Value::error(ErrorKind::Num),
        },
        Err(e) => Value::Error(e),
    }
}

trig_spec!("SIN", sin);
trig_spec!("COS", cos);
trig_spec!("TAN", tan);
trig_spec!("ASIN", asin);
trig_spec!("ACOS", acos);
trig_spec!("ATAN", atan);
trig_spec!("COT", cot);
trig_spec!("SEC", sec);
trig_spec!("CSC", csc);
trig_spec!("SINH", sinh);
trig_spec!("COSH", cosh);
trig_spec!("TANH", tanh);
trig_spec!("COTH", coth);
trig_spec!("SECH", sech);
trig_spec!("CSCH", csch);
trig_spec!("ACOT", acot);
trig_spec!("ASINH", asinh);
trig_spec!("ACOSH", acosh);
trig_spec!("ATANH", atanh);
trig_spec!("ACOTH", acoth);

fn sin(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.sin()))
}

fn cos(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.cos()))
}

fn tan(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.tan()))
}

fn asin(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| ((-1.0..=1.0).contains(&x)).then(|| x.asin()))
}

fn acos(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| ((-1.0..=1.0).contains(&x)).then(|| x.acos()))
}

fn atan(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.atan()))
}

fn cot(interp: &mut Interpreter, args: &[Ast]) -> Value {
    div_trig(interp, args, |x| (x.cos(), x.sin()))
}

fn sec(interp: &mut Interpreter, args: &[Ast]) -> Value {
    div_trig(interp, args, |x| (1.0, x.cos()))
}

fn csc(interp: &mut Interpreter, args: &[Ast]) -> Value {
    div_trig(interp, args, |x| (1.0, x.sin()))
}

/// Quotient-style trig with a `#DIV/0!` on a zero denominator.
fn div_trig(interp: &mut Interpreter, args: &[Ast], f: impl Fn(f64) -> (f64, f64)) -> Value {
    match interp.f64_arg(&args[0]) {
        Ok(x) => {
            let (num, den) = f(x);
            if den == 0.0 {
                return Value::error(ErrorKind::DivByZero);
            }
            Value::number(num / den)
        }
        Err(e) => Value::Error(e),
    }
}

fn sinh(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.sinh()))
}

fn cosh(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.cosh()))
}

fn tanh(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.tanh()))
}

fn coth(interp: &mut Interpreter, args: &[Ast]) -> Value {
    div_trig(interp, args, |x| (x.cosh(), x.sinh()))
}

fn sech(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(1.0 / x.cosh()))
}

fn csch(interp: &mut Interpreter, args: &[Ast]) -> Value {
    div_trig(interp, args, |x| (1.0, x.sinh()))
}

fn acot(interp: &mut Interpreter, args: &[Ast]) -> Value {
    // ACOT maps onto (0, π), with ACOT(0) = π/2.
    unary(interp, args, |x| {
        let r = (1.0 / x).atan();
        Some(if x == 0.0 {
            std::f64::consts::FRAC_PI_2
        } else if x < 0.0 {
            r + std::f64::consts::PI
        } else {
            r
        })
    })
}

fn asinh(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| Some(x.asinh()))
}

fn acosh(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| (x >= 1.0).then(|| x.acosh()))
}

fn atanh(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| (x.abs() < 1.0).then(|| x.atanh()))
}

fn acoth(interp: &mut Interpreter, args: &[Ast]) -> Value {
    unary(interp, args, |x| {
        (x.abs() > 1.0).then(|| ((x + 1.0) / (x - 1.0)).ln() / 2.0)
    })
}

inventory::submit! {
    FunctionSpec {
        name: "ATAN2",
        min_args: 2,
        max_args: 2,
        parameters: &[
            ParamSpec::required(ArgType::Number),
            ParamSpec::required(ArgType::Number),
        ],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: atan2,
    }
}

/// Spreadsheet argument order: `ATAN2(x, y)` computes `atan2(y, x)`.
fn atan2(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let x = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let y = match interp.f64_arg(&args[1]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if x == 0.0 && y == 0.0 {
        return Value::error(ErrorKind::DivByZero);
    }
    Value::number(y.atan2(x))
}
