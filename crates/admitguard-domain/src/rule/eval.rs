use super::ast::BinaryOp;
use super::builtins::{self, Builtin};
use super::program::{Node, Program, Rule, Segment};
use crate::cancel::CancelToken;
use crate::error::EvalError;
use admitguard_types::Value;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashSet;

static NULL: Value = Value::Null;

/// Run every rule of `program` and return the rendered messages, de-duplicated in firing order.
pub fn run(
    program: &Program,
    input: &Value,
    params: &Value,
    cancel: &CancelToken,
) -> Result<Vec<String>, EvalError> {
    let mut evaluator = Evaluator {
        input,
        params,
        cancel,
        frame: vec![Cow::Borrowed(&NULL); program.slots],
    };

    let mut messages = Vec::new();
    for rule in &program.rules {
        evaluator.check_cancelled()?;
        evaluator.rule(rule, 0, &mut messages)?;
    }

    let mut seen = HashSet::new();
    messages.retain(|m| seen.insert(m.clone()));
    Ok(messages)
}

struct Evaluator<'a> {
    input: &'a Value,
    params: &'a Value,
    cancel: &'a CancelToken,
    frame: Vec<Cow<'a, Value>>,
}

impl<'a> Evaluator<'a> {
    fn check_cancelled(&self) -> Result<(), EvalError> {
        if self.cancel.is_cancelled() {
            Err(EvalError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn bind(&mut self, slot: usize, value: Cow<'a, Value>) {
        if let Some(local) = self.frame.get_mut(slot) {
            *local = value;
        }
    }

    /// Expand the `for` clauses from `depth` on, then test the condition and render.
    fn rule(&mut self, rule: &'a Rule, depth: usize, out: &mut Vec<String>) -> Result<(), EvalError> {
        let Some(lp) = rule.loops.get(depth) else {
            let fires = match &rule.condition {
                Some(condition) => {
                    let value = self.eval(condition)?;
                    truthy(&value, "rule condition")?
                }
                None => true,
            };
            if fires {
                out.push(self.render(&rule.message)?);
            }
            return Ok(());
        };

        let iterable = self.eval(&lp.iter)?;
        for item in elements(iterable)? {
            self.check_cancelled()?;
            self.bind(lp.slot, item);
            self.rule(rule, depth + 1, out)?;
        }
        Ok(())
    }

    fn render(&mut self, message: &'a [Segment]) -> Result<String, EvalError> {
        let mut rendered = String::new();
        for segment in message {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Expr(node) => rendered.push_str(&self.eval(node)?.to_string()),
            }
        }
        Ok(rendered)
    }

    fn eval(&mut self, node: &'a Node) -> Result<Cow<'a, Value>, EvalError> {
        let value = match node {
            Node::Const(value) => return Ok(Cow::Borrowed(value)),
            Node::Input => return Ok(Cow::Borrowed(self.input)),
            Node::Params => return Ok(Cow::Borrowed(self.params)),
            Node::Local(slot) => {
                return Ok(self
                    .frame
                    .get(*slot)
                    .cloned()
                    .unwrap_or(Cow::Borrowed(&NULL)));
            }
            Node::Field(base, name) => {
                let base = self.eval(base)?;
                return field(base, name);
            }
            Node::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                return index_into(base, &index);
            }
            Node::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?.into_owned());
                }
                Value::List(values)
            }
            Node::Not(operand) => {
                let value = self.eval(operand)?;
                Value::Bool(!truthy(&value, "`not` operand")?)
            }
            Node::Neg(operand) => negate(&*self.eval(operand)?)?,
            Node::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if !truthy(&lhs, "`and` operand")? {
                    Value::Bool(false)
                } else {
                    let rhs = self.eval(rhs)?;
                    Value::Bool(truthy(&rhs, "`and` operand")?)
                }
            }
            Node::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if truthy(&lhs, "`or` operand")? {
                    Value::Bool(true)
                } else {
                    let rhs = self.eval(rhs)?;
                    Value::Bool(truthy(&rhs, "`or` operand")?)
                }
            }
            Node::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, &lhs, &rhs)?
            }
            Node::Call(Builtin::Default, args) => {
                // Lazy: the fallback only runs when the first argument is null.
                let mut args = args.iter();
                let first = match args.next() {
                    Some(first) => self.eval(first)?,
                    None => Cow::Borrowed(&NULL),
                };
                if !first.is_null() {
                    return Ok(first);
                }
                return match args.next() {
                    Some(fallback) => self.eval(fallback),
                    None => Ok(Cow::Borrowed(&NULL)),
                };
            }
            Node::Call(builtin, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                builtins::call(*builtin, &values)?
            }
            Node::Match(subject, regex) => {
                let subject = self.eval(subject)?;
                builtins::regex_match(&subject, regex)?
            }
            Node::Quantify {
                builtin,
                list,
                slot,
                body,
            } => self.quantify(*builtin, list, *slot, body)?,
        };
        Ok(Cow::Owned(value))
    }

    fn quantify(
        &mut self,
        builtin: Builtin,
        list: &'a Node,
        slot: usize,
        body: &'a Node,
    ) -> Result<Value, EvalError> {
        let items = elements(self.eval(list)?)?;
        let mut hits: i64 = 0;
        for item in items {
            self.check_cancelled()?;
            self.bind(slot, item);
            let value = self.eval(body)?;
            let hit = truthy(&value, "predicate")?;
            match builtin {
                Builtin::Any if hit => return Ok(Value::Bool(true)),
                Builtin::All if !hit => return Ok(Value::Bool(false)),
                _ if hit => hits += 1,
                _ => {}
            }
        }
        Ok(match builtin {
            Builtin::Any => Value::Bool(false),
            Builtin::All => Value::Bool(true),
            _ => Value::Int(hits),
        })
    }
}

/// Items visited by `for` and the quantifiers: list elements, map values in key order, nothing for
/// `null`.
fn elements(value: Cow<'_, Value>) -> Result<Vec<Cow<'_, Value>>, EvalError> {
    match value {
        Cow::Borrowed(Value::List(items)) => Ok(items.iter().map(Cow::Borrowed).collect()),
        Cow::Borrowed(Value::Map(map)) => Ok(map.values().map(Cow::Borrowed).collect()),
        Cow::Owned(Value::List(items)) => Ok(items.into_iter().map(Cow::Owned).collect()),
        Cow::Owned(Value::Map(map)) => Ok(map.into_values().map(Cow::Owned).collect()),
        value if value.is_null() => Ok(Vec::new()),
        value => Err(EvalError::type_error(format!(
            "cannot iterate over {}",
            value.type_name()
        ))),
    }
}

fn truthy(value: &Value, what: &str) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(EvalError::type_error(format!(
            "{what} must be a boolean, found {}",
            other.type_name()
        ))),
    }
}

fn field<'a>(base: Cow<'a, Value>, name: &str) -> Result<Cow<'a, Value>, EvalError> {
    match base {
        Cow::Borrowed(value) => Ok(Cow::Borrowed(lookup_field(value, name)?.unwrap_or(&NULL))),
        Cow::Owned(value) => Ok(Cow::Owned(
            lookup_field(&value, name)?.cloned().unwrap_or_default(),
        )),
    }
}

fn lookup_field<'v>(value: &'v Value, name: &str) -> Result<Option<&'v Value>, EvalError> {
    match value {
        Value::Map(map) => Ok(map.get(name)),
        Value::Null => Ok(None),
        Value::List(items) => match name.parse::<usize>() {
            Ok(i) => Ok(items.get(i)),
            Err(_) => Err(EvalError::type_error(format!(
                "cannot access field `{name}` on list"
            ))),
        },
        other => Err(EvalError::type_error(format!(
            "cannot access field `{name}` on {}",
            other.type_name()
        ))),
    }
}

fn index_into<'a>(base: Cow<'a, Value>, index: &Value) -> Result<Cow<'a, Value>, EvalError> {
    match base {
        Cow::Borrowed(value) => Ok(Cow::Borrowed(lookup_index(value, index)?.unwrap_or(&NULL))),
        Cow::Owned(value) => Ok(Cow::Owned(
            lookup_index(&value, index)?.cloned().unwrap_or_default(),
        )),
    }
}

fn lookup_index<'v>(value: &'v Value, index: &Value) -> Result<Option<&'v Value>, EvalError> {
    match (value, index) {
        (Value::Null, _) => Ok(None),
        (Value::List(items), index) => match index.as_i64() {
            Some(i) => Ok(usize::try_from(i).ok().and_then(|i| items.get(i))),
            None => Err(EvalError::type_error(format!(
                "list index must be an integer, found {}",
                index.type_name()
            ))),
        },
        (Value::Map(map), Value::String(key)) => Ok(map.get(key)),
        (Value::Map(_), other) => Err(EvalError::type_error(format!(
            "map key must be a string, found {}",
            other.type_name()
        ))),
        (other, _) => Err(EvalError::type_error(format!(
            "cannot index into {}",
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let value = match op {
        BinaryOp::Eq => Value::Bool(lhs == rhs),
        BinaryOp::Ne => Value::Bool(lhs != rhs),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(op, lhs, rhs)?;
            Value::Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })
        }
        BinaryOp::In => Value::Bool(membership(lhs, rhs)?),
        BinaryOp::Add => add(lhs, rhs)?,
        BinaryOp::Sub => subtract(lhs, rhs)?,
        BinaryOp::And => Value::Bool(truthy(lhs, "`and` operand")? && truthy(rhs, "`and` operand")?),
        BinaryOp::Or => Value::Bool(truthy(lhs, "`or` operand")? || truthy(rhs, "`or` operand")?),
    };
    Ok(value)
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Ordering, EvalError> {
    let ord = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    ord.ok_or_else(|| {
        EvalError::type_error(format!(
            "cannot compare {} {} {}",
            lhs.type_name(),
            op.symbol(),
            rhs.type_name()
        ))
    })
}

fn membership(needle: &Value, haystack: &Value) -> Result<bool, EvalError> {
    match (needle, haystack) {
        (_, Value::Null) => Ok(false),
        (needle, Value::List(items)) => Ok(items.contains(needle)),
        (Value::String(key), Value::Map(map)) => Ok(map.contains_key(key)),
        (Value::String(sub), Value::String(s)) => Ok(s.contains(sub.as_str())),
        (needle, haystack) => Err(EvalError::type_error(format!(
            "cannot test {} in {}",
            needle.type_name(),
            haystack.type_name()
        ))),
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or(EvalError::Overflow),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::Float(x + y)),
            _ => Err(EvalError::type_error(format!(
                "cannot add {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

fn subtract(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or(EvalError::Overflow),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::Float(x - y)),
            _ => Err(EvalError::type_error(format!(
                "cannot subtract {} from {}",
                b.type_name(),
                a.type_name()
            ))),
        },
    }
}

fn negate(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(EvalError::type_error(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}
