//! Syntax tree produced by the parser. Names are unresolved; the compiler resolves them.

use admitguard_types::Value;

/// Source location stored as the number of bytes that follow the node.
///
/// The parser only sees suffixes of the source, so this is what it can record cheaply. The
/// compiler turns it back into an offset against the full source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pos(pub usize);

impl Pos {
    pub fn of(rest: &str) -> Self {
        Pos(rest.len())
    }

    pub fn offset_in(self, source: &str) -> usize {
        source.len().saturating_sub(self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<RuleAst>,
}

/// `violation "<template>" [for x in expr]* [when expr]`
#[derive(Clone, Debug, PartialEq)]
pub struct RuleAst {
    pub message: Vec<TemplatePart>,
    pub loops: Vec<LoopAst>,
    pub condition: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopAst {
    pub var: String,
    pub iter: Expr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Ident {
        name: String,
        pos: Pos,
    },
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
        pos: Pos,
    },
    Lambda {
        param: String,
        body: Box<Expr>,
        pos: Pos,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}
