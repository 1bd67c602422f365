use admitguard_types::ids::VALIDATION_TYPE_ADMISSION;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the orchestrator does when a sink fails to accept a summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFailureMode {
    /// Log and return the summary; failures are still reported alongside it.
    #[default]
    Report,
    /// Fail the call once every sink has been attempted.
    Propagate,
}

impl SinkFailureMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SinkFailureMode::Report => "report",
            SinkFailureMode::Propagate => "propagate",
        }
    }
}

/// Effective orchestrator settings after profile and overrides are applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorOptions {
    pub validation_type: String,
    pub write_compliance: bool,
    /// Worker count for policy evaluation: `0` uses the rayon default, `1` is sequential.
    pub parallelism: usize,
    pub sink_failure: SinkFailureMode,
    pub evaluation_timeout: Option<Duration>,
    pub cache_rules: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            validation_type: VALIDATION_TYPE_ADMISSION.to_string(),
            write_compliance: false,
            parallelism: 0,
            sink_failure: SinkFailureMode::Report,
            evaluation_timeout: None,
            cache_rules: true,
        }
    }
}

impl ValidatorOptions {
    pub fn new(validation_type: impl Into<String>, write_compliance: bool) -> Self {
        Self {
            validation_type: validation_type.into(),
            write_compliance,
            ..Self::default()
        }
    }

    pub fn is_sequential(&self) -> bool {
        self.parallelism == 1
    }
}
