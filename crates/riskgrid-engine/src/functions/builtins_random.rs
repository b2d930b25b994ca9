use riskgrid_model::ErrorKind;

use super::{ArgType, FunctionSpec, ParamSpec};
use crate::eval::Interpreter;
use crate::parser::Ast;
use crate::value::Value;

inventory::submit! {
    FunctionSpec {
        name: "RAND",
        min_args: 0,
        max_args: 0,
        parameters: &[],
        is_volatile: true,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: rand,
    }
}

fn rand(interp: &mut Interpreter, _args: &[Ast]) -> Value {
    Value::number(interp.next_uniform())
}

inventory::submit! {
    FunctionSpec {
        name: "RANDBETWEEN",
        min_args: 2,
        max_args: 2,
        parameters: &[
            ParamSpec::required(ArgType::Integer),
            ParamSpec::required(ArgType::Integer),
        ],
        is_volatile: true,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: randbetween,
    }
}

/// `ceil(l) + floor(rand * (floor(u) + 1 - ceil(l)))`, widening the upper
/// bound by one when the integer range would otherwise be empty.
fn randbetween(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let lower = match interp.f64_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let mut upper = match interp.f64_arg(&args[1]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if upper < lower {
        return Value::error(ErrorKind::Num);
    }

    let low = lower.ceil();
    if upper.floor() + 1.0 - low <= 0.0 {
        upper += 1.0;
    }
    let span = upper.floor() + 1.0 - low;
    let draw = interp.next_uniform();
    Value::number(low + (draw * span).floor())
}
