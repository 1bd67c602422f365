//! nom parser for rule code.
//!
//! ```text
//! rules     := (rule ";"?)*
//! rule      := "violation" template ("for" ident "in" expr)* ("when" expr)?
//! expr      := and ("or" and)*
//! and       := not ("and" not)*
//! not       := "not" not | compare
//! compare   := add (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in") add)?
//! add       := unary (("+" | "-") unary)*
//! unary     := "-" unary | postfix
//! postfix   := primary ("." field | "[" expr "]")*
//! primary   := number | string | true | false | null | list | "(" expr ")"
//!            | ident "=>" expr | ident "(" args ")" | ident
//! ```
//!
//! `#` starts a comment that runs to the end of the line.
//!
//! Expression depth is capped at [`MAX_NESTING`]. Every nested expression, `not`, unary minus,
//! chained operator and path suffix takes one level, so the syntax tree handed to the compiler
//! is never deeper than the cap.

use super::ast::{BinaryOp, Expr, LoopAst, Pos, RuleAst, RuleSet, TemplatePart, UnaryOp};
use crate::error::{CompileError, Position};
use admitguard_types::Value;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, satisfy},
    combinator::{cut, eof, map, not, opt, recognize, value, verify},
    error::{ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind, context},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use std::cell::Cell;

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Deepest expression nesting a rule may use.
pub const MAX_NESTING: usize = 64;

const TOO_DEEP: &str = "expression nested too deeply";

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// One level of expression nesting, released on drop.
struct Nesting;

impl Nesting {
    fn enter(input: &str) -> Result<Self, nom::Err<VerboseError<&str>>> {
        let depth = DEPTH.with(Cell::get);
        if depth >= MAX_NESTING {
            return Err(nom::Err::Failure(VerboseError::add_context(
                input,
                TOO_DEEP,
                VerboseError::from_error_kind(input, ErrorKind::TooLarge),
            )));
        }
        DEPTH.with(|d| d.set(depth + 1));
        Ok(Nesting)
    }
}

impl Drop for Nesting {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

const RESERVED: &[&str] = &[
    "violation", "for", "in", "when", "and", "or", "not", "true", "false", "null",
];

/// Parse rule code into an unresolved syntax tree.
pub fn parse(source: &str) -> Result<RuleSet, CompileError> {
    match rule_set(source) {
        Ok((_, rules)) => Ok(rules),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(source, &e)),
        Err(nom::Err::Incomplete(_)) => Err(CompileError::Syntax {
            at: Position::at_offset(source, source.len()),
            message: "unexpected end of input".to_string(),
        }),
    }
}

fn syntax_error(source: &str, err: &VerboseError<&str>) -> CompileError {
    let rest = err
        .errors
        .iter()
        .map(|(rest, _)| *rest)
        .min_by_key(|rest| rest.len())
        .unwrap_or(source);
    let at = Position::at_offset(source, source.len() - rest.len());

    let too_deep = err
        .errors
        .iter()
        .any(|(_, kind)| matches!(kind, VerboseErrorKind::Context(ctx) if *ctx == TOO_DEEP));
    if too_deep {
        return CompileError::Syntax {
            at,
            message: TOO_DEEP.to_string(),
        };
    }

    let expected = err.errors.iter().find_map(|(_, kind)| match kind {
        VerboseErrorKind::Context(ctx) => Some((*ctx).to_string()),
        _ => None,
    });
    let expected = expected.or_else(|| {
        err.errors.iter().find_map(|(_, kind)| match kind {
            VerboseErrorKind::Char(c) => Some(format!("`{c}`")),
            _ => None,
        })
    });

    let message = match expected {
        Some(expected) => format!("expected {expected}, found {}", describe(rest)),
        None => format!("unexpected {}", describe(rest)),
    };

    CompileError::Syntax { at, message }
}

fn describe(rest: &str) -> String {
    let token: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace())
        .take(12)
        .collect();
    if token.is_empty() {
        "end of input".to_string()
    } else {
        format!("`{token}`")
    }
}

// ============================================================================
// Rules
// ============================================================================

fn rule_set(input: &str) -> PResult<'_, RuleSet> {
    let (input, _) = ws(input)?;
    let (input, rules) = many0(terminated(rule, pair(ws, opt(pair(char(';'), ws)))))(input)?;
    let (input, _) = cut(context("`violation` rule", eof))(input)?;
    Ok((input, RuleSet { rules }))
}

fn rule(input: &str) -> PResult<'_, RuleAst> {
    let (input, _) = keyword("violation")(input)?;
    cut(rule_body)(input)
}

fn rule_body(input: &str) -> PResult<'_, RuleAst> {
    let (input, _) = ws(input)?;
    let (input, message) = context("message string", template)(input)?;
    let (input, loops) = many0(preceded(ws, for_clause))(input)?;
    let (input, condition) = opt(preceded(ws, when_clause))(input)?;
    Ok((
        input,
        RuleAst {
            message,
            loops,
            condition,
        },
    ))
}

fn for_clause(input: &str) -> PResult<'_, LoopAst> {
    let (input, _) = keyword("for")(input)?;
    cut(for_binding)(input)
}

fn for_binding(input: &str) -> PResult<'_, LoopAst> {
    let (input, _) = ws(input)?;
    let (input, var) = context("loop variable", identifier)(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = context("`in`", keyword("in"))(input)?;
    let (input, _) = ws(input)?;
    let (input, iter) = context("expression", expr)(input)?;
    Ok((input, LoopAst { var, iter }))
}

fn when_clause(input: &str) -> PResult<'_, Expr> {
    let (input, _) = keyword("when")(input)?;
    cut(preceded(ws, context("expression", expr)))(input)
}

// ============================================================================
// Strings and templates
// ============================================================================

fn template(input: &str) -> PResult<'_, Vec<TemplatePart>> {
    let (input, _) = char('"')(input)?;
    let (input, parts) = many0(template_part)(input)?;
    let (input, _) = cut(context("closing quote", char('"')))(input)?;
    Ok((input, merge_text(parts)))
}

fn template_part(input: &str) -> PResult<'_, TemplatePart> {
    alt((
        map(is_not("\"\\{}"), |s: &str| TemplatePart::Text(s.to_string())),
        map(escape, |c| TemplatePart::Text(c.to_string())),
        map(tag("{{"), |_| TemplatePart::Text("{".to_string())),
        map(tag("}}"), |_| TemplatePart::Text("}".to_string())),
        map(interpolation, TemplatePart::Expr),
    ))(input)
}

fn interpolation(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('{')(input)?;
    cut(terminated(
        delimited(ws, context("expression", expr), ws),
        context("`}`", char('}')),
    ))(input)
}

fn merge_text(parts: Vec<TemplatePart>) -> Vec<TemplatePart> {
    let mut merged: Vec<TemplatePart> = Vec::with_capacity(parts.len());
    for part in parts {
        if let TemplatePart::Text(text) = &part
            && let Some(TemplatePart::Text(acc)) = merged.last_mut()
        {
            acc.push_str(text);
            continue;
        }
        merged.push(part);
    }
    merged
}

fn string_literal(input: &str) -> PResult<'_, String> {
    let (input, _) = char('"')(input)?;
    let (input, chunks) = many0(alt((
        map(is_not("\"\\"), str::to_string),
        map(escape, String::from),
    )))(input)?;
    let (input, _) = cut(context("closing quote", char('"')))(input)?;
    Ok((input, chunks.concat()))
}

fn escape(input: &str) -> PResult<'_, char> {
    preceded(
        char('\\'),
        cut(context(
            "escape sequence",
            alt((
                value('"', char('"')),
                value('\\', char('\\')),
                value('{', char('{')),
                value('}', char('}')),
                value('\n', char('n')),
                value('\r', char('r')),
                value('\t', char('t')),
            )),
        )),
    )(input)
}

// ============================================================================
// Expressions
// ============================================================================

pub(crate) fn expr(input: &str) -> PResult<'_, Expr> {
    let _nesting = Nesting::enter(input)?;
    left_assoc(input, conjunction, |i| value(BinaryOp::Or, keyword("or"))(i))
}

fn conjunction(input: &str) -> PResult<'_, Expr> {
    left_assoc(input, negation, |i| value(BinaryOp::And, keyword("and"))(i))
}

fn negation(input: &str) -> PResult<'_, Expr> {
    match keyword("not")(input) {
        Ok((rest, _)) => {
            let _nesting = Nesting::enter(rest)?;
            let (rest, operand) = cut(preceded(ws, context("operand", negation)))(rest)?;
            Ok((rest, Expr::Unary(UnaryOp::Not, Box::new(operand))))
        }
        Err(nom::Err::Error(_)) => comparison(input),
        Err(e) => Err(e),
    }
}

fn comparison(input: &str) -> PResult<'_, Expr> {
    let (input, lhs) = additive(input)?;
    match preceded(ws, compare_op)(input) {
        Ok((rest, op)) => {
            let (rest, rhs) = cut(preceded(ws, context("operand", additive)))(rest)?;
            Ok((rest, Expr::Binary(op, Box::new(lhs), Box::new(rhs))))
        }
        Err(nom::Err::Error(_)) => Ok((input, lhs)),
        Err(e) => Err(e),
    }
}

fn compare_op(input: &str) -> PResult<'_, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, char('<')),
        value(BinaryOp::Gt, char('>')),
        value(BinaryOp::In, keyword("in")),
    ))(input)
}

fn additive(input: &str) -> PResult<'_, Expr> {
    left_assoc(input, unary, |i| {
        alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-'))))(i)
    })
}

fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> PResult<'a, Expr>,
    operator: fn(&'a str) -> PResult<'a, BinaryOp>,
) -> PResult<'a, Expr> {
    let (mut input, mut lhs) = operand(input)?;
    // Each link deepens the left spine of the tree.
    let mut chain = Vec::new();
    loop {
        let (rest, op) = match preceded(ws, operator)(input) {
            Ok(ok) => ok,
            Err(nom::Err::Error(_)) => return Ok((input, lhs)),
            Err(e) => return Err(e),
        };
        chain.push(Nesting::enter(rest)?);
        let (rest, rhs) = cut(preceded(ws, context("operand", operand)))(rest)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        input = rest;
    }
}

fn unary(input: &str) -> PResult<'_, Expr> {
    match pair(char('-'), ws)(input) {
        Ok((rest, _)) => {
            let _nesting = Nesting::enter(rest)?;
            let (rest, operand) = cut(context("operand", unary))(rest)?;
            Ok((rest, Expr::Unary(UnaryOp::Neg, Box::new(operand))))
        }
        Err(nom::Err::Error(_)) => postfix(input),
        Err(e) => Err(e),
    }
}

enum Suffix {
    Field(String),
    Index(Expr),
}

fn postfix(input: &str) -> PResult<'_, Expr> {
    let (mut input, mut expr) = primary(input)?;
    let mut chain = Vec::new();
    loop {
        let parsed = suffix(input);
        if parsed.is_ok() {
            chain.push(Nesting::enter(input)?);
        }
        match parsed {
            Ok((rest, Suffix::Field(name))) => {
                expr = Expr::Field(Box::new(expr), name);
                input = rest;
            }
            Ok((rest, Suffix::Index(index))) => {
                expr = Expr::Index(Box::new(expr), Box::new(index));
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, expr)),
            Err(e) => return Err(e),
        }
    }
}

fn suffix(input: &str) -> PResult<'_, Suffix> {
    alt((
        preceded(
            char('.'),
            cut(map(context("field name", field_name), Suffix::Field)),
        ),
        preceded(
            char('['),
            cut(map(
                terminated(delimited(ws, expr, ws), context("`]`", char(']'))),
                Suffix::Index,
            )),
        ),
    ))(input)
}

fn primary(input: &str) -> PResult<'_, Expr> {
    alt((
        map(number, Expr::Literal),
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        value(Expr::Literal(Value::Null), keyword("null")),
        list_literal,
        parenthesized,
        lambda,
        call,
        ident_expr,
    ))(input)
}

fn number(input: &str) -> PResult<'_, Value> {
    let (rest, text) = recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)?;
    let parsed = if text.contains('.') {
        text.parse::<f64>().ok().map(Value::Float)
    } else {
        text.parse::<i64>().ok().map(Value::Int)
    };
    match parsed {
        Some(v) => Ok((rest, v)),
        None => Err(nom::Err::Failure(VerboseError::add_context(
            input,
            "number in range",
            VerboseError::from_error_kind(input, ErrorKind::Digit),
        ))),
    }
}

fn list_literal(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('[')(input)?;
    cut(list_items)(input)
}

fn list_items(input: &str) -> PResult<'_, Expr> {
    let (input, _) = ws(input)?;
    let (input, items) = separated_list0(tuple((ws, char(','), ws)), expr)(input)?;
    let (input, _) = opt(pair(ws, char(',')))(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = context("`]`", char(']'))(input)?;
    Ok((input, Expr::List(items)))
}

fn parenthesized(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('(')(input)?;
    cut(terminated(
        delimited(ws, context("expression", expr), ws),
        context("`)`", char(')')),
    ))(input)
}

fn lambda(input: &str) -> PResult<'_, Expr> {
    let pos = Pos::of(input);
    let (input, param) = identifier(input)?;
    let (input, _) = preceded(ws, tag("=>"))(input)?;
    let (input, body) = cut(preceded(ws, context("lambda body", expr)))(input)?;
    Ok((
        input,
        Expr::Lambda {
            param,
            body: Box::new(body),
            pos,
        },
    ))
}

fn call(input: &str) -> PResult<'_, Expr> {
    let pos = Pos::of(input);
    let (input, name) = identifier(input)?;
    let (input, _) = preceded(ws, char('('))(input)?;
    let (input, args) = cut(call_args)(input)?;
    Ok((input, Expr::Call { name, args, pos }))
}

fn call_args(input: &str) -> PResult<'_, Vec<Expr>> {
    let (input, _) = ws(input)?;
    let (input, args) = separated_list0(tuple((ws, char(','), ws)), expr)(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = context("`)`", char(')'))(input)?;
    Ok((input, args))
}

fn ident_expr(input: &str) -> PResult<'_, Expr> {
    let pos = Pos::of(input);
    let (input, name) = identifier(input)?;
    Ok((input, Expr::Ident { name, pos }))
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> PResult<'_, String> {
    map(
        verify(
            recognize(pair(
                satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
                take_while(is_ident_char),
            )),
            |word: &str| !RESERVED.contains(&word),
        ),
        str::to_string,
    )(input)
}

fn field_name(input: &str) -> PResult<'_, String> {
    map(take_while1(is_ident_char), str::to_string)(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

fn ws(input: &str) -> PResult<'_, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

fn comment(input: &str) -> PResult<'_, &str> {
    recognize(pair(char('#'), not_line_ending))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(src: &str) -> Expr {
        let (rest, e) = expr(src).expect("expression");
        assert_eq!(rest, "", "unparsed input in {src:?}");
        e
    }

    fn ident(name: &str, rest: &str) -> Expr {
        Expr::Ident {
            name: name.to_string(),
            pos: Pos(rest.len()),
        }
    }

    #[test]
    fn parses_rule_with_loops_and_condition() {
        let set = parse(
            r#"
            # containers must pin an image tag
            violation "container {c.name} uses {c.image}"
              for c in input.spec.containers
              when not contains(c.image, ":");
            violation "no owner" when not has(input.metadata.labels.owner)
            "#,
        )
        .expect("parse");

        assert_eq!(set.rules.len(), 2);
        let first = &set.rules[0];
        assert_eq!(first.loops.len(), 1);
        assert_eq!(first.loops[0].var, "c");
        assert!(first.condition.is_some());
        assert_eq!(first.message.len(), 4);
        assert_eq!(
            first.message[0],
            TemplatePart::Text("container ".to_string())
        );
        assert!(matches!(first.message[1], TemplatePart::Expr(Expr::Field(_, ref f)) if f == "name"));
    }

    #[test]
    fn template_escapes_braces() {
        let set = parse(r#"violation "literal {{braces}} and \"quotes\"""#).expect("parse");
        assert_eq!(
            set.rules[0].message,
            vec![TemplatePart::Text(
                "literal {braces} and \"quotes\"".to_string()
            )]
        );
    }

    #[test]
    fn precedence_binds_and_tighter_than_or() {
        let src = "a or b and c";
        let e = parse_expr(src);
        let Expr::Binary(BinaryOp::Or, lhs, rhs) = e else {
            panic!("expected `or` at the root");
        };
        assert_eq!(*lhs, ident("a", src));
        assert!(matches!(*rhs, Expr::Binary(BinaryOp::And, _, _)));
    }

    #[test]
    fn arithmetic_is_left_associative() {
        let e = parse_expr("1 - 2 - 3");
        let Expr::Binary(BinaryOp::Sub, lhs, rhs) = e else {
            panic!("expected subtraction");
        };
        assert!(matches!(*lhs, Expr::Binary(BinaryOp::Sub, _, _)));
        assert_eq!(*rhs, Expr::Literal(Value::Int(3)));
    }

    #[test]
    fn parses_literals_paths_and_calls() {
        assert_eq!(parse_expr("2.5"), Expr::Literal(Value::Float(2.5)));
        assert_eq!(parse_expr("null"), Expr::Literal(Value::Null));
        assert!(matches!(parse_expr("[1, \"a\", true,]"), Expr::List(items) if items.len() == 3));
        assert!(matches!(parse_expr("input.spec[\"x-y\"][0]"), Expr::Index(_, _)));
        assert!(matches!(
            parse_expr("any(xs, v => v > 1)"),
            Expr::Call { ref name, ref args, .. } if name == "any" && matches!(args[1], Expr::Lambda { .. })
        ));
        assert!(matches!(parse_expr("x in [1, 2]"), Expr::Binary(BinaryOp::In, _, _)));
        assert!(matches!(parse_expr("-x"), Expr::Unary(UnaryOp::Neg, _)));
    }

    #[test]
    fn keywords_are_not_prefixes_of_identifiers() {
        assert!(matches!(parse_expr("order == 1"), Expr::Binary(BinaryOp::Eq, _, _)));
        assert!(matches!(parse_expr("notes"), Expr::Ident { ref name, .. } if name == "notes"));
        assert!(matches!(parse_expr("index"), Expr::Ident { ref name, .. } if name == "index"));
    }

    #[test]
    fn empty_program_parses_to_no_rules() {
        let set = parse("  # nothing here\n").expect("parse");
        assert!(set.rules.is_empty());
    }

    #[test]
    fn syntax_errors_carry_line_and_column() {
        let err = parse("violation \"x\"\n  when input.a ==").expect_err("must fail");
        let CompileError::Syntax { at, message } = err else {
            panic!("expected syntax error, got {err:?}");
        };
        assert_eq!(at.line, 2);
        assert!(message.contains("operand"), "{message}");

        let err = parse("violation \"unterminated").expect_err("must fail");
        assert!(matches!(err, CompileError::Syntax { ref message, .. } if message.contains("closing quote")));

        let err = parse("forbid \"x\"").expect_err("must fail");
        let CompileError::Syntax { at, message } = err else {
            panic!("expected syntax error");
        };
        assert_eq!((at.line, at.column), (1, 1));
        assert!(message.contains("`violation` rule"), "{message}");
    }

    #[test]
    fn unclosed_call_is_reported() {
        let err = parse("violation \"x\" when has(input.a").expect_err("must fail");
        assert!(matches!(err, CompileError::Syntax { ref message, .. } if message.contains("`)`")));
    }

    fn nesting_error(source: &str) -> bool {
        matches!(
            parse(source),
            Err(CompileError::Syntax { ref message, .. }) if message == "expression nested too deeply"
        )
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing_further() {
        let deep = 500;
        let sources = [
            format!("violation \"x\" when {}true{}", "(".repeat(deep), ")".repeat(deep)),
            format!("violation \"x\" when {}true", "not ".repeat(deep)),
            format!("violation \"x\" when {}1 == 1", "- ".repeat(deep)),
            format!("violation \"x\" when {}1{} == 1", "[".repeat(deep), "]".repeat(deep)),
            format!("violation \"x\" when has(input{})", ".a".repeat(deep)),
            format!("violation \"x\" when {}", vec!["true"; deep].join(" or ")),
            format!("violation \"{{{}1{}}}\"", "(".repeat(deep), ")".repeat(deep)),
        ];
        for source in &sources {
            assert!(nesting_error(source), "{:?}", parse(source).err());
        }
    }

    #[test]
    fn nesting_within_the_limit_parses() {
        let depth = MAX_NESTING / 2;
        parse(&format!(
            "violation \"x\" when {}true{}",
            "(".repeat(depth),
            ")".repeat(depth)
        ))
        .expect("moderate nesting");
        parse(&format!("violation \"x\" when {}", vec!["true"; depth].join(" or ")))
            .expect("moderate chain");

        // A rejected parse releases every level it entered.
        assert!(nesting_error(&format!("violation \"x\" when {}true", "not ".repeat(200))));
        parse("violation \"x\" when not not true").expect("depth counter was reset");
    }
}
