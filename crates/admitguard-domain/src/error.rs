use std::fmt;
use thiserror::Error;

/// 1-based line and column in rule source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Locate a byte offset in `source`. Offsets past the end clamp to the end.
    pub fn at_offset(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Rule code that cannot be turned into a program. A policy-authoring defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error at {at}: {message}")]
    Syntax { at: Position, message: String },

    #[error("unknown function `{name}` at {at}")]
    UnknownBuiltin { name: String, at: Position },

    #[error("`{name}` takes {expected} argument(s), found {found} at {at}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
        at: Position,
    },

    #[error("unknown identifier `{name}` at {at}")]
    UnknownIdentifier { name: String, at: Position },

    #[error("parameter `{name}` is not declared by the policy at {at}")]
    UndeclaredParameter { name: String, at: Position },

    #[error("lambda is only allowed as the second argument of any/all/count at {at}")]
    MisplacedLambda { at: Position },

    #[error("`{name}` expects a lambda `v => ...` as its second argument at {at}")]
    LambdaExpected { name: String, at: Position },

    #[error("invalid regex {pattern:?} at {at}: {message}")]
    InvalidRegex {
        pattern: String,
        message: String,
        at: Position,
    },

    #[error("rule code has no `violation` rule")]
    NoRules,
}

/// A compiled program that failed while running against an input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type error: {0}")]
    Type(String),

    #[error("integer overflow")]
    Overflow,

    #[error("required parameter `{0}` has no value")]
    MissingParameter(String),

    #[error("parameter `{name}` is declared as {expected} but has a {found} value")]
    ParameterType {
        name: String,
        expected: String,
        found: String,
    },

    #[error("invalid regex {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("evaluation cancelled")]
    Cancelled,
}

impl EvalError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_lines_and_columns() {
        let source = "violation \"a\"\n  when x";
        assert_eq!(
            Position::at_offset(source, 0),
            Position { line: 1, column: 1 }
        );
        assert_eq!(
            Position::at_offset(source, 16),
            Position { line: 2, column: 3 }
        );
        assert_eq!(
            Position::at_offset(source, 999),
            Position { line: 2, column: 9 }
        );
    }

    #[test]
    fn error_display() {
        let err = CompileError::UnknownBuiltin {
            name: "frobnicate".to_string(),
            at: Position { line: 3, column: 7 },
        };
        assert_eq!(err.to_string(), "unknown function `frobnicate` at 3:7");

        let err = EvalError::MissingParameter("registry".to_string());
        assert_eq!(err.to_string(), "required parameter `registry` has no value");
    }
}
