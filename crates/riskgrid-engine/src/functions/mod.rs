//! The function plugin registry.
//!
//! Built-ins declare a [`FunctionSpec`] through `inventory::submit!` in the
//! `builtins_*` modules; the dispatcher collects them once into a name map.
//! Argument coercion happens inside implementations via the [`Interpreter`]
//! helpers, so control-flow functions (`IF`, `IFERROR`, …) can evaluate
//! arguments lazily.

use std::collections::HashMap;
use std::sync::OnceLock;

use riskgrid_model::ErrorKind;

use crate::eval::Interpreter;
use crate::parser::Ast;
use crate::value::{CellError, Value};

mod builtins_info;
mod builtins_logical;
mod builtins_math;
mod builtins_random;
mod builtins_text;
mod builtins_trig;

/// Declared type of a function parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgType {
    Number,
    String,
    Bool,
    Integer,
    Scalar,
    /// Any scalar except an error (errors short-circuit).
    NoError,
    Range,
    Any,
}

/// Metadata for one declared parameter.
#[derive(Copy, Clone, Debug)]
pub struct ParamSpec {
    pub arg_type: ArgType,
    pub default_value: Option<f64>,
    pub optional: bool,
    /// Pass the rich-number subtype through instead of demoting to raw.
    pub pass_subtype: bool,
    pub forbid_vectorization: bool,
}

impl ParamSpec {
    pub const fn required(arg_type: ArgType) -> Self {
        Self {
            arg_type,
            default_value: None,
            optional: false,
            pass_subtype: false,
            forbid_vectorization: false,
        }
    }

    pub const fn optional(arg_type: ArgType) -> Self {
        Self {
            arg_type,
            default_value: None,
            optional: true,
            pass_subtype: false,
            forbid_vectorization: false,
        }
    }

    pub const fn optional_with_default(arg_type: ArgType, default: f64) -> Self {
        Self {
            arg_type,
            default_value: Some(default),
            optional: true,
            pass_subtype: false,
            forbid_vectorization: false,
        }
    }
}

pub type FunctionImpl = fn(&mut Interpreter, &[Ast]) -> Value;

/// A registered function.
#[derive(Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub parameters: &'static [ParamSpec],
    pub is_volatile: bool,
    pub is_dependent_on_sheet_structure_change: bool,
    /// Range arguments expand to their cells instead of erroring.
    pub expand_ranges: bool,
    /// The trailing parameters repeat (e.g. `IFS` condition/value pairs).
    pub repeat_last_args: bool,
    /// The implementation controls evaluation of its own arguments
    /// (control flow and error traps).
    pub does_not_need_arguments_to_be_computed: bool,
    pub vectorization_forbidden: bool,
    pub implementation: FunctionImpl,
}

/// Upper bound used by variadic functions.
pub const VAR_ARGS: usize = 255;

inventory::collect!(FunctionSpec);

fn registry() -> &'static HashMap<&'static str, &'static FunctionSpec> {
    static REGISTRY: OnceLock<HashMap<&'static str, &'static FunctionSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for spec in inventory::iter::<FunctionSpec> {
            map.insert(spec.name, spec);
        }
        map
    })
}

/// Look up a canonical (uppercased) function name.
#[must_use]
pub fn lookup_function(name: &str) -> Option<&'static FunctionSpec> {
    registry().get(name).copied()
}

/// Whether a canonical name belongs to the volatile set.
#[must_use]
pub fn function_is_volatile(name: &str) -> bool {
    lookup_function(name).is_some_and(|spec| spec.is_volatile)
}

/// Whether a canonical name depends on sheet geometry.
#[must_use]
pub fn function_is_structural(name: &str) -> bool {
    lookup_function(name).is_some_and(|spec| spec.is_dependent_on_sheet_structure_change)
}

/// Dispatch a call. Unknown names are `#NAME?`, arity violations `#VALUE!`
/// (missing required arguments read as `#N/A` where Excel does so, handled
/// by the implementations).
pub fn call_function(interp: &mut Interpreter, name: &str, args: &[Ast]) -> Value {
    let Some(spec) = lookup_function(name) else {
        return Value::Error(CellError::with_message(
            ErrorKind::Name,
            format!("unknown function `{name}`"),
        ));
    };

    if args.len() < spec.min_args || args.len() > spec.max_args {
        return Value::Error(CellError::with_message(
            ErrorKind::Value,
            format!(
                "{name} expects between {} and {} arguments, got {}",
                spec.min_args,
                spec.max_args,
                args.len()
            ),
        ));
    }

    (spec.implementation)(interp, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_required_builtins() {
        for name in [
            "IF",
            "IFS",
            "AND",
            "OR",
            "XOR",
            "NOT",
            "CHOOSE",
            "SWITCH",
            "IFERROR",
            "IFNA",
            "CONCATENATE",
            "LEN",
            "LEFT",
            "RIGHT",
            "MID",
            "TRIM",
            "PROPER",
            "CLEAN",
            "REPT",
            "SEARCH",
            "FIND",
            "SUBSTITUTE",
            "T",
            "UPPER",
            "LOWER",
            "EXACT",
            "CHAR",
            "UNICHAR",
            "DELTA",
            "MOD",
            "INT",
            "ROUND",
            "ROUNDUP",
            "ROUNDDOWN",
            "EVEN",
            "ODD",
            "CEILING",
            "CEILING.MATH",
            "CEILING.PRECISE",
            "FLOOR",
            "FLOOR.MATH",
            "FLOOR.PRECISE",
            "ABS",
            "PI",
            "SQRTPI",
            "RADIANS",
            "DEGREES",
            "BITAND",
            "BITOR",
            "BITXOR",
            "RAND",
            "RANDBETWEEN",
            "ACOS",
            "ASIN",
            "COS",
            "SIN",
            "TAN",
            "ATAN",
            "ATAN2",
            "COT",
            "SEC",
            "CSC",
            "SINH",
            "COSH",
            "TANH",
            "COTH",
            "SECH",
            "CSCH",
            "ACOT",
            "ASINH",
            "ACOSH",
            "ATANH",
            "ACOTH",
            "FORMULATEXT",
            "COUNTUNIQUE",
            "SUM",
            "AVERAGE",
            "MIN",
            "MAX",
            "COUNT",
            "NOW",
            "TODAY",
        ] {
            assert!(lookup_function(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn volatility_flags() {
        assert!(function_is_volatile("RAND"));
        assert!(function_is_volatile("RANDBETWEEN"));
        assert!(function_is_volatile("NOW"));
        assert!(!function_is_volatile("SUM"));
        assert!(function_is_structural("FORMULATEXT"));
        assert!(!function_is_structural("RAND"));
    }
}
