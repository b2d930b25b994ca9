use riskgrid_model::ErrorKind;

use super::{ArgType, FunctionSpec, ParamSpec, VAR_ARGS};
use crate::eval::{coerce_scalar_to_bool, Interpreter};
use crate::parser::Ast;
use crate::value::{CellError, Value};

inventory::submit! {
    FunctionSpec {
        name: "IF",
        min_args: 2,
        max_args: 3,
        parameters: &[
            ParamSpec::required(ArgType::Bool),
            ParamSpec::required(ArgType::Any),
            ParamSpec::optional(ArgType::Any),
        ],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: true,
        vectorization_forbidden: false,
        implementation: r#if,
    }
}

fn r#if(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let condition = match interp.bool_arg(&args[0]) {
        Ok(b) => b,
        Err(e) => return Value::Error(e),
    };
    if condition {
        interp.evaluate(&args[1])
    } else {
        match args.get(2) {
            Some(arg) => interp.evaluate(arg),
            None => Value::Bool(false),
        }
    }
}

inventory::submit! {
    FunctionSpec {
        name: "IFS",
        min_args: 2,
        max_args: VAR_ARGS,
        parameters: &[
            ParamSpec::required(ArgType::Bool),
            ParamSpec::required(ArgType::Any),
        ],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: true,
        does_not_need_arguments_to_be_computed: true,
        vectorization_forbidden: false,
        implementation: ifs,
    }
}

fn ifs(interp: &mut Interpreter, args: &[Ast]) -> Value {
    if args.len() % 2 != 0 {
        return Value::error(ErrorKind::Value);
    }
    for pair in args.chunks(2) {
        match interp.bool_arg(&pair[0]) {
            Ok(true) => return interp.evaluate(&pair[1]),
            Ok(false) => {}
            Err(e) => return Value::Error(e),
        }
    }
    Value::Error(CellError::with_message(
        ErrorKind::Na,
        "no condition matched",
    ))
}

inventory::submit! {
    FunctionSpec {
        name: "AND",
        min_args: 1,
        max_args: VAR_ARGS,
        parameters: &[ParamSpec::required(ArgType::Any)],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: true,
        repeat_last_args: true,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: and,
    }
}

fn and(interp: &mut Interpreter, args: &[Ast]) -> Value {
    fold_logical(interp, args, true, |acc, b| acc && b)
}

inventory::submit! {
    FunctionSpec {
        name: "OR",
        min_args: 1,
        max_args: VAR_ARGS,
        parameters: &[ParamSpec::required(ArgType::Any)],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: true,
        repeat_last_args: true,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: or,
    }
}

fn or(interp: &mut Interpreter, args: &[Ast]) -> Value {
    fold_logical(interp, args, false, |acc, b| acc || b)
}

inventory::submit! {
    FunctionSpec {
        name: "XOR",
        min_args: 1,
        max_args: VAR_ARGS,
        parameters: &[ParamSpec::required(ArgType::Any)],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: true,
        repeat_last_args: true,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: xor,
    }
}

fn xor(interp: &mut Interpreter, args: &[Ast]) -> Value {
    fold_logical(interp, args, false, |acc, b| acc ^ b)
}

/// Shared AND/OR/XOR skeleton: flatten scalars and ranges, coerce each
/// coercible value, error with `#VALUE!` when nothing was coercible at all.
fn fold_logical(
    interp: &mut Interpreter,
    args: &[Ast],
    init: bool,
    fold: impl Fn(bool, bool) -> bool,
) -> Value {
    let values = match interp.flatten_args(args) {
        Ok(v) => v,
        Err(e) => return Value::Error(e),
    };
    let mut acc = init;
    let mut seen = false;
    for value in &values {
        if matches!(value, Value::Empty) {
            continue;
        }
        // Text inside ranges is ignored, like the logical aggregators do.
        let Some(b) = coerce_scalar_to_bool(value) else {
            continue;
        };
        seen = true;
        acc = fold(acc, b);
    }
    if !seen {
        return Value::error(ErrorKind::Value);
    }
    Value::Bool(acc)
}

inventory::submit! {
    FunctionSpec {
        name: "NOT",
        min_args: 1,
        max_args: 1,
        parameters: &[ParamSpec::required(ArgType::Bool)],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: not,
    }
}

fn not(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.bool_arg(&args[0]) {
        Ok(b) => Value::Bool(!b),
        Err(e) => Value::Error(e),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "CHOOSE",
        min_args: 2,
        max_args: VAR_ARGS,
        parameters: &[
            ParamSpec::required(ArgType::Integer),
            ParamSpec::required(ArgType::Any),
        ],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: true,
        does_not_need_arguments_to_be_computed: true,
        vectorization_forbidden: false,
        implementation: choose,
    }
}

fn choose(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let index = match interp.int_arg(&args[0]) {
        Ok(i) => i,
        Err(e) => return Value::Error(e),
    };
    if index < 1 || (index as usize) >= args.len() {
        return Value::error(ErrorKind::Num);
    }
    interp.evaluate(&args[index as usize])
}

inventory::submit! {
    FunctionSpec {
        name: "SWITCH",
        min_args: 3,
        max_args: VAR_ARGS,
        parameters: &[
            ParamSpec::required(ArgType::NoError),
            ParamSpec::required(ArgType::Any),
            ParamSpec::required(ArgType::Any),
        ],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: true,
        does_not_need_arguments_to_be_computed: true,
        vectorization_forbidden: false,
        implementation: switch,
    }
}

fn switch(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let selector = interp.evaluate(&args[0]);
    if let Value::Error(e) = selector {
        return Value::Error(e);
    }

    let rest = &args[1..];
    let pairs = rest.len() / 2;
    for i in 0..pairs {
        let case = interp.evaluate(&rest[2 * i]);
        if let Value::Error(e) = case {
            return Value::Error(e);
        }
        if values_equal(interp, &selector, &case) {
            return interp.evaluate(&rest[2 * i + 1]);
        }
    }
    // Odd trailing argument is the default branch.
    if rest.len() % 2 == 1 {
        return interp.evaluate(&rest[rest.len() - 1]);
    }
    Value::Error(CellError::with_message(ErrorKind::Na, "no case matched"))
}

fn values_equal(interp: &Interpreter, left: &Value, right: &Value) -> bool {
    crate::value::compare_values(left, right, interp.config())
        .map(|ord| ord == std::cmp::Ordering::Equal)
        .unwrap_or(false)
}

inventory::submit! {
    FunctionSpec {
        name: "IFERROR",
        min_args: 2,
        max_args: 2,
        parameters: &[
            ParamSpec::required(ArgType::Any),
            ParamSpec::required(ArgType::Any),
        ],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: true,
        vectorization_forbidden: false,
        implementation: iferror,
    }
}

fn iferror(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.evaluate(&args[0]) {
        Value::Error(_) => interp.evaluate(&args[1]),
        value => value,
    }
}

inventory::submit! {
    FunctionSpec {
        name: "IFNA",
        min_args: 2,
        max_args: 2,
        parameters: &[
            ParamSpec::required(ArgType::Any),
            ParamSpec::required(ArgType::Any),
        ],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: true,
        vectorization_forbidden: false,
        implementation: ifna,
    }
}

fn ifna(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.evaluate(&args[0]) {
        Value::Error(e) if e.kind == ErrorKind::Na => interp.evaluate(&args[1]),
        value => value,
    }
}

inventory::submit! {
    FunctionSpec {
        name: "TRUE",
        min_args: 0,
        max_args: 0,
        parameters: &[],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: r#true,
    }
}

fn r#true(_interp: &mut Interpreter, _args: &[Ast]) -> Value {
    Value::Bool(true)
}

inventory::submit! {
    FunctionSpec {
        name: "FALSE",
        min_args: 0,
        max_args: 0,
        parameters: &[],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: r#false,
    }
}

fn r#false(_interp: &mut Interpreter, _args: &[Ast]) -> Value {
    Value::Bool(false)
}
