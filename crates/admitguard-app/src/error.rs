use admitguard_domain::{CompileError, EvalError};
use std::time::Duration;
use thiserror::Error;

/// Why a `validate` call produced no summary.
///
/// Authoring failures (`Compile`, `Evaluation`, `Timeout`) name the offending policy and will
/// fail the same way on retry. The rest are infrastructure failures a caller may retry.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("failed to fetch policies")]
    Source(#[source] anyhow::Error),

    #[error("failed to list entities")]
    Listing(#[source] anyhow::Error),

    #[error("policy {policy_id} ({policy_name}) does not compile")]
    Compile {
        policy_id: String,
        policy_name: String,
        #[source]
        source: CompileError,
    },

    #[error("policy {policy_id} ({policy_name}) failed during evaluation")]
    Evaluation {
        policy_id: String,
        policy_name: String,
        #[source]
        source: EvalError,
    },

    #[error("policy {policy_id} ({policy_name}) exceeded the evaluation timeout of {timeout:?}")]
    Timeout {
        policy_id: String,
        policy_name: String,
        timeout: Duration,
    },

    #[error("validation cancelled")]
    Cancelled,

    #[error("{} sink(s) failed to accept the summary", .0.len())]
    Sink(Vec<SinkFailure>),

    #[error("evaluation task failed: {0}")]
    Join(String),
}

impl ValidateError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ValidateError::Source(_)
            | ValidateError::Listing(_)
            | ValidateError::Cancelled
            | ValidateError::Sink(_)
            | ValidateError::Join(_) => true,
            ValidateError::Compile { .. }
            | ValidateError::Evaluation { .. }
            | ValidateError::Timeout { .. } => false,
        }
    }

    /// The offending policy for authoring failures.
    pub fn policy_id(&self) -> Option<&str> {
        match self {
            ValidateError::Compile { policy_id, .. }
            | ValidateError::Evaluation { policy_id, .. }
            | ValidateError::Timeout { policy_id, .. } => Some(policy_id),
            _ => None,
        }
    }
}

/// One sink that did not accept a summary.
#[derive(Debug, Error)]
#[error("sink {sink} failed: {error:#}")]
pub struct SinkFailure {
    pub sink: String,
    pub error: anyhow::Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use admitguard_domain::error::Position;

    #[test]
    fn display_names_the_policy() {
        let err = ValidateError::Compile {
            policy_id: "imageTag".to_string(),
            policy_name: "Image tag".to_string(),
            source: CompileError::UnknownBuiltin {
                name: "frob".to_string(),
                at: Position { line: 1, column: 20 },
            },
        };
        assert_eq!(err.to_string(), "policy imageTag (Image tag) does not compile");
        assert_eq!(err.policy_id(), Some("imageTag"));
        assert!(!err.is_retryable());

        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "unknown function `frob` at 1:20");
    }

    #[test]
    fn timeout_names_the_policy() {
        let err = ValidateError::Timeout {
            policy_id: "imageTag".to_string(),
            policy_name: "Image tag".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "policy imageTag (Image tag) exceeded the evaluation timeout of 250ms"
        );
        assert_eq!(err.policy_id(), Some("imageTag"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn infrastructure_failures_are_retryable() {
        assert!(ValidateError::Source(anyhow::anyhow!("down")).is_retryable());
        assert!(ValidateError::Cancelled.is_retryable());
        assert_eq!(ValidateError::Cancelled.policy_id(), None);

        let sink = ValidateError::Sink(vec![SinkFailure {
            sink: "audit-log".to_string(),
            error: anyhow::anyhow!("disk full"),
        }]);
        assert!(sink.is_retryable());
        assert_eq!(sink.to_string(), "1 sink(s) failed to accept the summary");
    }
}
