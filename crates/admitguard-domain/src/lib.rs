//! Pure policy matching and rule evaluation (no IO).
//!
//! Input: policies and entities constructed elsewhere.
//! Output: applicability decisions and violation reasons.

#![forbid(unsafe_code)]

pub mod cancel;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod options;
pub mod rule;

#[cfg(test)]
mod proptest;
#[cfg(test)]
mod test_support;

pub use cancel::CancelToken;
pub use error::{CompileError, EvalError};
pub use matcher::applies;
pub use options::{SinkFailureMode, ValidatorOptions};
pub use rule::{Program, RuleEngine, ScriptEngine};
