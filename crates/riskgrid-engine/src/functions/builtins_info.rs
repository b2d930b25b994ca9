use chrono::{Datelike, Timelike};
use riskgrid_model::ErrorKind;

use super::{ArgType, FunctionSpec, ParamSpec};
use crate::eval::Interpreter;
use crate::parser::Ast;
use crate::value::{CellError, Value};

inventory::submit! {
    FunctionSpec {
        name: "FORMULATEXT",
        min_args: 1,
        max_args: 1,
        parameters: &[ParamSpec::required(ArgType::Range)],
        is_volatile: false,
        is_dependent_on_sheet_structure_change: true,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: true,
        vectorization_forbidden: true,
        implementation: formulatext,
    }
}

/// The stored formula text of the referenced cell; `#N/A` when the target
/// holds no formula.
fn formulatext(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let target = match &args[0] {
        Ast::CellReference(reference) => reference.resolve(interp.formula_address),
        Ast::CellRange { start, .. } => start.resolve(interp.formula_address),
        _ => {
            return Value::Error(CellError::with_message(
                ErrorKind::Na,
                "FORMULATEXT expects a reference",
            ));
        }
    };
    let Some(target) = target else {
        return Value::error(ErrorKind::Ref);
    };
    match interp.formula_text_at(target) {
        Some(text) => Value::Text(text),
        None => Value::error(ErrorKind::Na),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "NOW",
        min_args: 0,
        max_args: 0,
        parameters: &[],
        is_volatile: true,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: now,
    }
}

fn now(_interp: &mut Interpreter, _args: &[Ast]) -> Value {
    let utc = chrono::Utc::now().naive_utc();
    let serial = date_serial(utc.date())
        + f64::from(utc.time().num_seconds_from_midnight()) / 86_400.0;
    Value::Number(crate::value::RichNumber::DateTime {
        val: serial,
        format: None,
    })
}

inventory::submit! {
    FunctionSpec {
        name: "TODAY",
        min_args: 0,
        max_args: 0,
        parameters: &[],
        is_volatile: true,
        is_dependent_on_sheet_structure_change: false,
        expand_ranges: false,
        repeat_last_args: false,
        does_not_need_arguments_to_be_computed: false,
        vectorization_forbidden: false,
        implementation: today,
    }
}

fn today(_interp: &mut Interpreter, _args: &[Ast]) -> Value {
    let serial = date_serial(chrono::Utc::now().date_naive());
    Value::Number(crate::value::RichNumber::Date {
        val: serial,
        format: None,
    })
}

fn date_serial(date: chrono::NaiveDate) -> f64 {
    let epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).expect("static epoch date is valid");
    f64::from(date.num_days_from_ce() - epoch.num_days_from_ce())
}
