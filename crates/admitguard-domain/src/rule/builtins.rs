use crate::error::EvalError;
use admitguard_types::Value;
use regex::Regex;
use std::borrow::Cow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Has,
    Len,
    StartsWith,
    EndsWith,
    Contains,
    Lower,
    Upper,
    Trim,
    Split,
    Matches,
    Keys,
    Default,
    String,
    Any,
    All,
    Count,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "has" => Builtin::Has,
            "len" => Builtin::Len,
            "starts_with" => Builtin::StartsWith,
            "ends_with" => Builtin::EndsWith,
            "contains" => Builtin::Contains,
            "lower" => Builtin::Lower,
            "upper" => Builtin::Upper,
            "trim" => Builtin::Trim,
            "split" => Builtin::Split,
            "matches" => Builtin::Matches,
            "keys" => Builtin::Keys,
            "default" => Builtin::Default,
            "string" => Builtin::String,
            "any" => Builtin::Any,
            "all" => Builtin::All,
            "count" => Builtin::Count,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Has
            | Builtin::Len
            | Builtin::Lower
            | Builtin::Upper
            | Builtin::Trim
            | Builtin::Keys
            | Builtin::String => 1,
            Builtin::StartsWith
            | Builtin::EndsWith
            | Builtin::Contains
            | Builtin::Split
            | Builtin::Matches
            | Builtin::Default
            | Builtin::Any
            | Builtin::All
            | Builtin::Count => 2,
        }
    }

    /// `any`, `all` and `count` take a `v => predicate` lambda as their second argument.
    pub fn takes_lambda(self) -> bool {
        matches!(self, Builtin::Any | Builtin::All | Builtin::Count)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Has => "has",
            Builtin::Len => "len",
            Builtin::StartsWith => "starts_with",
            Builtin::EndsWith => "ends_with",
            Builtin::Contains => "contains",
            Builtin::Lower => "lower",
            Builtin::Upper => "upper",
            Builtin::Trim => "trim",
            Builtin::Split => "split",
            Builtin::Matches => "matches",
            Builtin::Keys => "keys",
            Builtin::Default => "default",
            Builtin::String => "string",
            Builtin::Any => "any",
            Builtin::All => "all",
            Builtin::Count => "count",
        }
    }
}

static NULL: Value = Value::Null;

/// Apply a non-lambda builtin to already-evaluated arguments.
pub fn call(builtin: Builtin, args: &[Cow<'_, Value>]) -> Result<Value, EvalError> {
    let arg = |i: usize| args.get(i).map_or(&NULL, |v| &**v);
    let (a, b) = (arg(0), arg(1));

    match builtin {
        Builtin::Has => Ok(Value::Bool(!a.is_null())),
        Builtin::Len => {
            let n = match a {
                Value::String(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(map) => map.len(),
                Value::Null => 0,
                other => return Err(mismatch(builtin, other)),
            };
            Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
        }
        Builtin::StartsWith => text_test(builtin, a, b, |s, p| s.starts_with(p)),
        Builtin::EndsWith => text_test(builtin, a, b, |s, p| s.ends_with(p)),
        Builtin::Contains => match (a, b) {
            (Value::Null, _) => Ok(Value::Bool(false)),
            (Value::String(hay), Value::String(needle)) => Ok(Value::Bool(hay.contains(needle.as_str()))),
            (Value::List(items), needle) => Ok(Value::Bool(items.contains(needle))),
            (Value::Map(map), Value::String(key)) => Ok(Value::Bool(map.contains_key(key))),
            (Value::String(_) | Value::Map(_), other) => Err(mismatch(builtin, other)),
            (other, _) => Err(mismatch(builtin, other)),
        },
        Builtin::Lower => map_text(builtin, a, str::to_lowercase),
        Builtin::Upper => map_text(builtin, a, str::to_uppercase),
        Builtin::Trim => map_text(builtin, a, |s| s.trim().to_string()),
        Builtin::Split => match (a, b) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::String(s), Value::String(sep)) => Ok(Value::List(
                s.split(sep.as_str()).map(Value::from).collect(),
            )),
            (Value::String(_), other) | (other, _) => Err(mismatch(builtin, other)),
        },
        Builtin::Matches => match b {
            Value::String(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| EvalError::InvalidRegex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                regex_match(a, &regex)
            }
            other => Err(mismatch(builtin, other)),
        },
        Builtin::Keys => match a {
            Value::Map(map) => Ok(Value::List(map.keys().map(|k| Value::from(k.as_str())).collect())),
            Value::Null => Ok(Value::List(Vec::new())),
            other => Err(mismatch(builtin, other)),
        },
        Builtin::Default => Ok(if a.is_null() { b.clone() } else { a.clone() }),
        Builtin::String => Ok(Value::String(a.to_string())),
        Builtin::Any | Builtin::All | Builtin::Count => Err(EvalError::type_error(format!(
            "`{}` requires a lambda argument",
            builtin.name()
        ))),
    }
}

/// `matches` against a compiled regex. A `null` subject never matches.
pub fn regex_match(subject: &Value, regex: &Regex) -> Result<Value, EvalError> {
    match subject {
        Value::String(s) => Ok(Value::Bool(regex.is_match(s))),
        Value::Null => Ok(Value::Bool(false)),
        other => Err(mismatch(Builtin::Matches, other)),
    }
}

fn text_test(
    builtin: Builtin,
    subject: &Value,
    arg: &Value,
    test: impl Fn(&str, &str) -> bool,
) -> Result<Value, EvalError> {
    match (subject, arg) {
        (Value::Null, _) => Ok(Value::Bool(false)),
        (Value::String(s), Value::String(p)) => Ok(Value::Bool(test(s, p))),
        (Value::String(_), other) | (other, _) => Err(mismatch(builtin, other)),
    }
}

fn map_text(
    builtin: Builtin,
    subject: &Value,
    f: impl Fn(&str) -> String,
) -> Result<Value, EvalError> {
    match subject {
        Value::String(s) => Ok(Value::String(f(s))),
        Value::Null => Ok(Value::Null),
        other => Err(mismatch(builtin, other)),
    }
}

fn mismatch(builtin: Builtin, found: &Value) -> EvalError {
    EvalError::type_error(format!(
        "`{}` does not accept {} arguments",
        builtin.name(),
        found.type_name()
    ))
}
