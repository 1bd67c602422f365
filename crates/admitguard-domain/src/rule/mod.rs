//! The embedded rule language.
//!
//! A policy's `code` is a list of `violation` rules. Each rule that fires renders one message;
//! an empty result means the entity complies.
//!
//! ```text
//! # every container must pin a tag
//! violation "container {c.name} uses an unpinned image {c.image}"
//!   for c in input.spec.template.spec.containers
//!   when ends_with(c.image, ":latest") or not contains(c.image, ":")
//! ```
//!
//! Source is parsed (`parser`), lowered to a [`Program`] (`compile`), and run against an input
//! document with bound parameters (`eval`). Evaluation is deterministic and has no side effects.

mod ast;
mod builtins;
mod compile;
mod eval;
mod params;
mod parser;
mod program;

pub use compile::compile;
pub use params::bind_parameters;
pub use parser::MAX_NESTING;
pub use program::Program;

use crate::cancel::CancelToken;
use crate::error::{CompileError, EvalError};
use admitguard_types::{Policy, PolicyParameters, Value};

/// Compiles policy code once and evaluates the compiled form against many inputs.
pub trait RuleEngine: Send + Sync + 'static {
    type Program: Send + Sync + 'static;

    fn compile(&self, policy: &Policy) -> Result<Self::Program, CompileError>;

    /// Violation messages for `input`. Empty means compliant.
    fn evaluate(
        &self,
        program: &Self::Program,
        input: &Value,
        parameters: &[PolicyParameters],
        cancel: &CancelToken,
    ) -> Result<Vec<String>, EvalError>;
}

/// The built-in rule language engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptEngine;

impl RuleEngine for ScriptEngine {
    type Program = Program;

    fn compile(&self, policy: &Policy) -> Result<Program, CompileError> {
        let declared: Vec<&str> = policy.parameters.iter().map(|p| p.name.as_str()).collect();
        compile(&policy.code, &declared)
    }

    fn evaluate(
        &self,
        program: &Program,
        input: &Value,
        parameters: &[PolicyParameters],
        cancel: &CancelToken,
    ) -> Result<Vec<String>, EvalError> {
        let params = bind_parameters(parameters)?;
        eval::run(program, input, &params, cancel)
    }
}
