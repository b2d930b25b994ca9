use riskgrid_model::ErrorKind;

use super::{ArgType, FunctionSpec, ParamSpec, VAR_ARGS};
use crate::eval::Interpreter;
use crate::parser::Ast;
use crate::value::{CellError, Value};

macro_rules! text_spec {
    ($name:literal, $min:expr, $max:expr, $params:expr, $impl:path) => {
        inventory::submit! {
            FunctionSpec {
                name: $name,
                min_args: $min,
                max_args: $max,
                parameters: $params,
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

const ONE_STRING: &[ParamSpec] = &[ParamSpec::required(ArgType::String)];
const TWO_STRINGS: &[ParamSpec] = &[
    ParamSpec::required(ArgType::String),
    ParamSpec::required(ArgType::String),
];
const STRING_AND_COUNT: &[ParamSpec] = &[
    ParamSpec::required(ArgType::String),
    ParamSpec::optional_with_default(ArgType::Integer, 1.0),
];

text_spec!("CONCATENATE", 1, VAR_ARGS, ONE_STRING, concatenate);
text_spec!("LEN", 1, 1, ONE_STRING, len);
text_spec!("LEFT", 1, 2, STRING_AND_COUNT, left);
text_spec!("RIGHT", 1, 2, STRING_AND_COUNT, right);
text_spec!(
    "MID",
    3,
    3,
    &[
        ParamSpec::required(ArgType::String),
        ParamSpec::required(ArgType::Integer),
        ParamSpec::required(ArgType::Integer),
    ],
    mid
);
text_spec!("TRIM", 1, 1, ONE_STRING, trim);
text_spec!("PROPER", 1, 1, ONE_STRING, proper);
text_spec!("CLEAN", 1, 1, ONE_STRING, clean);
text_spec!(
    "REPT",
    2,
    2,
    &[
        ParamSpec::required(ArgType::String),
        ParamSpec::required(ArgType::Integer),
    ],
    rept
);
text_spec!(
    "SEARCH",
    2,
    3,
    &[
        ParamSpec::required(ArgType::String),
        ParamSpec::required(ArgType::String),
        ParamSpec::optional_with_default(ArgType::Integer, 1.0),
    ],
    search
);
text_spec!(
    "FIND",
    2,
    3,
    &[
        ParamSpec::required(ArgType::String),
        ParamSpec::required(ArgType::String),
        ParamSpec::optional_with_default(ArgType::Integer, 1.0),
    ],
    find
);
text_spec!(
    "SUBSTITUTE",
    3,
    4,
    &[
        ParamSpec::required(ArgType::String),
        ParamSpec::required(ArgType::String),
        ParamSpec::required(ArgType::String),
        ParamSpec::optional(ArgType::Integer),
    ],
    substitute
);
text_spec!("T", 1, 1, &[ParamSpec::required(ArgType::Any)], t);
text_spec!("UPPER", 1, 1, ONE_STRING, upper);
text_spec!("LOWER", 1, 1, ONE_STRING, lower);
text_spec!("EXACT", 2, 2, TWO_STRINGS, exact);
text_spec!("CHAR", 1, 1, &[ParamSpec::required(ArgType::Integer)], char_fn);
text_spec!(
    "UNICHAR",
    1,
    1,
    &[ParamSpec::required(ArgType::Integer)],
    unichar
);

fn concatenate(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let mut out = String::new();
    for arg in args {
        match interp.string_arg(arg) {
            Ok(s) => out.push_str(&s),
            Err(e) => return Value::Error(e),
        }
    }
    Value::Text(out)
}

fn len(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.string_arg(&args[0]) {
        Ok(s) => Value::number(s.chars().count() as f64),
        Err(e) => Value::Error(e),
    }
}

fn left(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let (s, n) = match string_and_count(interp, args) {
        Ok(pair) => pair,
        Err(e) => return Value::Error(e),
    };
    Value::Text(s.chars().take(n).collect())
}

fn right(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let (s, n) = match string_and_count(interp, args) {
        Ok(pair) => pair,
        Err(e) => return Value::Error(e),
    };
    let total = s.chars().count();
    Value::Text(s.chars().skip(total.saturating_sub(n)).collect())
}

fn string_and_count(
    interp: &mut Interpreter,
    args: &[Ast],
) -> Result<(String, usize), CellError> {
    let s = interp.string_arg(&args[0])?;
    let n = match args.get(1) {
        Some(arg) => interp.int_arg(arg)?,
        None => 1,
    };
    if n < 0 {
        return Err(CellError::new(ErrorKind::Value));
    }
    Ok((s, n as usize))
}

fn mid(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let s = match interp.string_arg(&args[0]) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    let start = match interp.int_arg(&args[1]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let count = match interp.int_arg(&args[2]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if start < 1 || count < 0 {
        return Value::error(ErrorKind::Value);
    }
    Value::Text(
        s.chars()
            .skip((start - 1) as usize)
            .take(count as usize)
            .collect(),
    )
}

fn trim(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.string_arg(&args[0]) {
        Ok(s) => {
            // Collapse interior runs of spaces, strip the ends.
            let collapsed: Vec<&str> = s.split(' ').filter(|part| !part.is_empty()).collect();
            Value::Text(collapsed.join(" "))
        }
        Err(e) => Value::Error(e),
    }
}

fn proper(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.string_arg(&args[0]) {
        Ok(s) => {
            let mut out = String::with_capacity(s.len());
            let mut at_word_start = true;
            for c in s.chars() {
                if c.is_alphabetic() {
                    if at_word_start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    at_word_start = false;
                } else {
                    out.push(c);
                    at_word_start = true;
                }
            }
            Value::Text(out)
        }
        Err(e) => Value::Error(e),
    }
}

fn clean(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.string_arg(&args[0]) {
        Ok(s) => Value::Text(s.chars().filter(|c| !c.is_control()).collect()),
        Err(e) => Value::Error(e),
    }
}

fn rept(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let s = match interp.string_arg(&args[0]) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    let n = match interp.int_arg(&args[1]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if n < 0 {
        return Value::error(ErrorKind::Value);
    }
    Value::Text(s.repeat(n as usize))
}

/// Case-insensitive search with optional wildcards (`*`, `?`), 1-indexed.
fn search(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let (needle, haystack, start) = match search_args(interp, args) {
        Ok(t) => t,
        Err(e) => return Value::Error(e),
    };
    let haystack_chars: Vec<char> = haystack.chars().collect();
    let use_wildcards = interp.config().use_wildcards
        && (needle.contains('*') || needle.contains('?'));

    for offset in (start - 1)..haystack_chars.len() {
        let rest: String = haystack_chars[offset..].iter().collect();
        let matched = if use_wildcards {
            wildcard_match_prefix(&needle.to_lowercase(), &rest.to_lowercase())
        } else {
            rest.to_lowercase().starts_with(&needle.to_lowercase())
        };
        if matched {
            return Value::number((offset + 1) as f64);
        }
    }
    Value::error(ErrorKind::Value)
}

/// Case-sensitive find, no wildcards, 1-indexed.
fn find(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let (needle, haystack, start) = match search_args(interp, args) {
        Ok(t) => t,
        Err(e) => return Value::Error(e),
    };
    let haystack_chars: Vec<char> = haystack.chars().collect();
    for offset in (start - 1)..haystack_chars.len() {
        let rest: String = haystack_chars[offset..].iter().collect();
        if rest.starts_with(&needle) {
            return Value::number((offset + 1) as f64);
        }
    }
    Value::error(ErrorKind::Value)
}

fn search_args(
    interp: &mut Interpreter,
    args: &[Ast],
) -> Result<(String, String, usize), CellError> {
    let needle = interp.string_arg(&args[0])?;
    let haystack = interp.string_arg(&args[1])?;
    let start = match args.get(2) {
        Some(arg) => interp.int_arg(arg)?,
        None => 1,
    };
    if start < 1 {
        return Err(CellError::new(ErrorKind::Value));
    }
    Ok((needle, haystack, start as usize))
}

/// Does `pattern` (with `*`/`?`) match a prefix of `text`?
fn wildcard_match_prefix(pattern: &str, text: &str) -> bool {
    fn go(p: &[char], t: &[char]) -> bool {
        match p.split_first() {
            None => true,
            Some(('*', rest)) => (0..=t.len()).any(|skip| go(rest, &t[skip..])),
            Some(('?', rest)) => !t.is_empty() && go(rest, &t[1..]),
            Some((c, rest)) => t.first() == Some(c) && go(rest, &t[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    go(&p, &t)
}

fn substitute(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let text = match interp.string_arg(&args[0]) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    let old = match interp.string_arg(&args[1]) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    let new = match interp.string_arg(&args[2]) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    if old.is_empty() {
        return Value::Text(text);
    }

    match args.get(3) {
        None => Value::Text(text.replace(&old, &new)),
        Some(arg) => {
            let instance = match interp.int_arg(arg) {
                Ok(n) => n,
                Err(e) => return Value::Error(e),
            };
            if instance < 1 {
                return Value::error(ErrorKind::Value);
            }
            let mut seen = 0i64;
            let mut out = String::with_capacity(text.len());
            let mut rest = text.as_str();
            while let Some(pos) = rest.find(&old) {
                seen += 1;
                if seen == instance {
                    out.push_str(&rest[..pos]);
                    out.push_str(&new);
                    out.push_str(&rest[pos + old.len()..]);
                    return Value::Text(out);
                }
                out.push_str(&rest[..pos + old.len()]);
                rest = &rest[pos + old.len()..];
            }
            Value::Text(text)
        }
    }
}

/// `T` returns text arguments unchanged and the empty string otherwise.
fn t(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.eval_arg(&args[0]) {
        Value::Text(s) => Value::Text(s),
        Value::Error(e) => Value::Error(e),
        _ => Value::Text(String::new()),
    }
}

fn upper(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.string_arg(&args[0]) {
        Ok(s) => Value::Text(s.to_uppercase()),
        Err(e) => Value::Error(e),
    }
}

fn lower(interp: &mut Interpreter, args: &[Ast]) -> Value {
    match interp.string_arg(&args[0]) {
        Ok(s) => Value::Text(s.to_lowercase()),
        Err(e) => Value::Error(e),
    }
}

/// Case-sensitive equality, no coercion beyond stringification.
fn exact(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let a = match interp.string_arg(&args[0]) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    let b = match interp.string_arg(&args[1]) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    Value::Bool(a == b)
}

fn char_fn(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let code = match interp.int_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if !(1..256).contains(&code) {
        return Value::Error(CellError::with_message(
            ErrorKind::Value,
            "character code out of bounds",
        ));
    }
    match char::from_u32(code as u32) {
        Some(c) => Value::Text(c.to_string()),
        None => Value::error(ErrorKind::Value),
    }
}

fn unichar(interp: &mut Interpreter, args: &[Ast]) -> Value {
    let code = match interp.int_arg(&args[0]) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if !(1..1_114_112).contains(&code) {
        return Value::Error(CellError::with_message(
            ErrorKind::Value,
            "character code out of bounds",
        ));
    }
    match char::from_u32(code as u32) {
        Some(c) => Value::Text(c.to_string()),
        None => Value::error(ErrorKind::Value),
    }
}
