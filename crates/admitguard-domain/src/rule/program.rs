//! Compiled form of rule code: names resolved, builtins checked, literal regexes built.

use super::ast::BinaryOp;
use super::builtins::Builtin;
use admitguard_types::Value;
use regex::Regex;

/// A compiled rule program. Immutable and safe to share across threads.
#[derive(Clone, Debug)]
pub struct Program {
    pub(crate) rules: Vec<Rule>,
    /// Number of local slots (loop and lambda variables) any rule needs.
    pub(crate) slots: usize,
}

impl Program {
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Rule {
    pub message: Vec<Segment>,
    pub loops: Vec<Loop>,
    pub condition: Option<Node>,
}

#[derive(Clone, Debug)]
pub(crate) enum Segment {
    Text(String),
    Expr(Node),
}

#[derive(Clone, Debug)]
pub(crate) struct Loop {
    pub slot: usize,
    pub iter: Node,
}

#[derive(Clone, Debug)]
pub(crate) enum Node {
    Const(Value),
    List(Vec<Node>),
    Input,
    Params,
    Local(usize),
    Field(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Neg(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Builtin, Vec<Node>),
    /// `matches(subject, "<literal>")` with the pattern compiled ahead of time.
    Match(Box<Node>, Regex),
    /// `any` / `all` / `count` with the lambda parameter bound to `slot`.
    Quantify {
        builtin: Builtin,
        list: Box<Node>,
        slot: usize,
        body: Box<Node>,
    },
}
