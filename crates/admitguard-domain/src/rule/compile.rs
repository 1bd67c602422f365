//! Lowering from syntax tree to [`Program`].
//!
//! Resolution happens here so evaluation never looks a name up: identifiers become roots or
//! local slots, calls become [`Builtin`]s, and `params.<name>` is checked against the policy's
//! declared parameters.

use super::ast::{BinaryOp, Expr, Pos, RuleAst, TemplatePart, UnaryOp};
use super::builtins::Builtin;
use super::parser;
use super::program::{Loop, Node, Program, Rule, Segment};
use crate::error::{CompileError, Position};
use admitguard_types::Value;
use regex::Regex;

const INPUT: &str = "input";
const PARAMS: &str = "params";

/// Compile rule code. `parameters` are the names the policy declares.
pub fn compile(source: &str, parameters: &[&str]) -> Result<Program, CompileError> {
    let set = parser::parse(source)?;
    if set.rules.is_empty() {
        return Err(CompileError::NoRules);
    }

    let mut compiler = Compiler {
        source,
        parameters,
        scope: Vec::new(),
        next_slot: 0,
        slots: 0,
    };
    let rules = set
        .rules
        .into_iter()
        .map(|rule| compiler.rule(rule))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Program {
        rules,
        slots: compiler.slots,
    })
}

struct Compiler<'s> {
    source: &'s str,
    parameters: &'s [&'s str],
    scope: Vec<(String, usize)>,
    next_slot: usize,
    slots: usize,
}

impl Compiler<'_> {
    fn rule(&mut self, rule: RuleAst) -> Result<Rule, CompileError> {
        self.scope.clear();
        self.next_slot = 0;

        let mut loops = Vec::with_capacity(rule.loops.len());
        for lp in rule.loops {
            let iter = self.expr(lp.iter)?;
            let slot = self.bind(lp.var);
            loops.push(Loop { slot, iter });
        }

        let condition = rule.condition.map(|c| self.expr(c)).transpose()?;

        let message = rule
            .message
            .into_iter()
            .map(|part| match part {
                TemplatePart::Text(text) => Ok(Segment::Text(text)),
                TemplatePart::Expr(expr) => self.expr(expr).map(Segment::Expr),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Rule {
            message,
            loops,
            condition,
        })
    }

    fn bind(&mut self, name: String) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots = self.slots.max(self.next_slot);
        self.scope.push((name, slot));
        slot
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.scope
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, slot)| *slot)
    }

    fn at(&self, pos: Pos) -> Position {
        Position::at_offset(self.source, pos.offset_in(self.source))
    }

    fn exprs(&mut self, exprs: Vec<Expr>) -> Result<Vec<Node>, CompileError> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: Expr) -> Result<Box<Node>, CompileError> {
        self.expr(expr).map(Box::new)
    }

    fn expr(&mut self, expr: Expr) -> Result<Node, CompileError> {
        let node = match expr {
            Expr::Literal(value) => Node::Const(value),
            Expr::List(items) => Node::List(self.exprs(items)?),
            Expr::Ident { name, pos } => self.ident(name, pos)?,
            Expr::Field(base, field) => {
                if let Some(pos) = self.params_root(&base) {
                    self.check_param(&field, pos)?;
                }
                Node::Field(self.boxed(*base)?, field)
            }
            Expr::Index(base, index) => {
                if let Some(pos) = self.params_root(&base)
                    && let Expr::Literal(Value::String(name)) = index.as_ref()
                {
                    self.check_param(name, pos)?;
                }
                Node::Index(self.boxed(*base)?, self.boxed(*index)?)
            }
            Expr::Call { name, args, pos } => self.call(name, args, pos)?,
            Expr::Lambda { pos, .. } => {
                return Err(CompileError::MisplacedLambda { at: self.at(pos) });
            }
            Expr::Unary(UnaryOp::Not, operand) => Node::Not(self.boxed(*operand)?),
            Expr::Unary(UnaryOp::Neg, operand) => Node::Neg(self.boxed(*operand)?),
            Expr::Binary(BinaryOp::And, lhs, rhs) => Node::And(self.boxed(*lhs)?, self.boxed(*rhs)?),
            Expr::Binary(BinaryOp::Or, lhs, rhs) => Node::Or(self.boxed(*lhs)?, self.boxed(*rhs)?),
            Expr::Binary(op, lhs, rhs) => Node::Binary(op, self.boxed(*lhs)?, self.boxed(*rhs)?),
        };
        Ok(node)
    }

    fn ident(&self, name: String, pos: Pos) -> Result<Node, CompileError> {
        if let Some(slot) = self.lookup(&name) {
            return Ok(Node::Local(slot));
        }
        match name.as_str() {
            INPUT => Ok(Node::Input),
            PARAMS => Ok(Node::Params),
            _ => Err(CompileError::UnknownIdentifier {
                name,
                at: self.at(pos),
            }),
        }
    }

    /// Position of `params` when `base` is the unshadowed parameter root.
    fn params_root(&self, base: &Expr) -> Option<Pos> {
        match base {
            Expr::Ident { name, pos } if name == PARAMS && self.lookup(name).is_none() => Some(*pos),
            _ => None,
        }
    }

    fn check_param(&self, name: &str, pos: Pos) -> Result<(), CompileError> {
        if self.parameters.contains(&name) {
            Ok(())
        } else {
            Err(CompileError::UndeclaredParameter {
                name: name.to_string(),
                at: self.at(pos),
            })
        }
    }

    fn call(&mut self, name: String, args: Vec<Expr>, pos: Pos) -> Result<Node, CompileError> {
        let at = self.at(pos);
        let Some(builtin) = Builtin::lookup(&name) else {
            return Err(CompileError::UnknownBuiltin { name, at });
        };
        if args.len() != builtin.arity() {
            return Err(CompileError::Arity {
                name,
                expected: builtin.arity(),
                found: args.len(),
                at,
            });
        }

        let mut args = args.into_iter();
        let Some(first) = args.next() else {
            return Err(CompileError::Arity {
                name,
                expected: builtin.arity(),
                found: 0,
                at,
            });
        };
        let second = args.next();

        match second {
            Some(Expr::Lambda { param, body, .. }) if builtin.takes_lambda() => {
                let list = self.boxed(first)?;
                let slot = self.bind(param);
                let body = self.boxed(*body);
                self.scope.pop();
                Ok(Node::Quantify {
                    builtin,
                    list,
                    slot,
                    body: body?,
                })
            }
            _ if builtin.takes_lambda() => Err(CompileError::LambdaExpected { name, at }),
            Some(Expr::Literal(Value::String(pattern))) if builtin == Builtin::Matches => {
                let regex = Regex::new(&pattern).map_err(|e| CompileError::InvalidRegex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                    at,
                })?;
                Ok(Node::Match(self.boxed(first)?, regex))
            }
            second => {
                let mut nodes = vec![self.expr(first)?];
                if let Some(second) = second {
                    nodes.push(self.expr(second)?);
                }
                Ok(Node::Call(builtin, nodes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_err(source: &str) -> CompileError {
        compile(source, &["registry"]).expect_err("compile error")
    }

    #[test]
    fn compiles_rules_and_counts_slots() {
        let program = compile(
            r#"
            violation "a" for c in input.containers for p in c.ports when p.hostPort > 0
            violation "b" when any(input.list, v => v == params.registry)
            "#,
            &["registry"],
        )
        .expect("compile");
        assert_eq!(program.rule_count(), 2);
        assert_eq!(program.slots, 2);
    }

    #[test]
    fn program_without_rules_is_rejected() {
        assert_eq!(compile("# only a comment", &[]).unwrap_err(), CompileError::NoRules);
    }

    #[test]
    fn unknown_names_are_rejected_with_positions() {
        let err = compile_err("violation \"x\" when frob(input)");
        assert!(matches!(err, CompileError::UnknownBuiltin { ref name, at } if name == "frob" && at.column == 20));

        let err = compile_err("violation \"x\" when spec.replicas > 1");
        assert!(matches!(err, CompileError::UnknownIdentifier { ref name, .. } if name == "spec"));
    }

    #[test]
    fn loop_variables_are_scoped_to_their_rule() {
        let err = compile_err("violation \"a\" for c in input.x\nviolation \"{c}\"");
        assert!(matches!(err, CompileError::UnknownIdentifier { ref name, at } if name == "c" && at.line == 2));
    }

    #[test]
    fn arity_is_checked() {
        let err = compile_err("violation \"x\" when starts_with(input.a)");
        assert!(matches!(
            err,
            CompileError::Arity { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn undeclared_parameters_are_rejected() {
        let err = compile_err("violation \"x\" when input.registry == params.registy");
        assert!(matches!(err, CompileError::UndeclaredParameter { ref name, .. } if name == "registy"));

        let err = compile_err("violation \"x\" when params[\"other\"] == 1");
        assert!(matches!(err, CompileError::UndeclaredParameter { ref name, .. } if name == "other"));

        compile("violation \"x\" when params.registry == 1", &["registry"]).expect("declared");
        compile("violation \"x\" for params in input.list when params.anything", &[])
            .expect("shadowed root");
    }

    #[test]
    fn lambdas_only_inside_quantifiers() {
        let err = compile_err("violation \"x\" when len(v => v)");
        assert!(matches!(err, CompileError::MisplacedLambda { .. }));

        let err = compile_err("violation \"x\" when any(input.list, true)");
        assert!(matches!(err, CompileError::LambdaExpected { ref name, .. } if name == "any"));

        let err = compile_err("violation \"x\" when all(input.list, v => v) and v");
        assert!(matches!(err, CompileError::UnknownIdentifier { ref name, .. } if name == "v"));
    }

    #[test]
    fn literal_regexes_are_compiled_up_front() {
        let err = compile_err("violation \"x\" when matches(input.image, \"[unclosed\")");
        assert!(matches!(err, CompileError::InvalidRegex { ref pattern, .. } if pattern == "[unclosed"));

        compile("violation \"x\" when matches(input.image, input.pattern)", &[])
            .expect("dynamic patterns are checked at evaluation");
    }
}
