use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `admitguard.toml` schema v1.
///
/// Every key is optional; missing keys fall back to the selected profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfigV1 {
    /// Optional schema string for tooling (`admitguard.config.v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// `admission` (default), `audit`, or `tf-admission`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Label stamped on every validation record, e.g. `Admission` or `Audit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_compliance: Option<bool>,

    /// Evaluation workers per call: `0` picks a default, `1` is sequential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,

    /// `report` or `propagate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_failure: Option<String>,

    /// Per-call evaluation deadline in milliseconds; `0` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_rules: Option<bool>,
}
