use crate::Value;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A label selector: every key must be present on the entity with the given value.
/// The value `"*"` matches any value as long as the key is present.
pub type LabelSelector = BTreeMap<String, String>;

/// Wildcard label value: the key must exist, any value is accepted.
pub const LABEL_WILDCARD: &str = "*";

/// Impact of a policy. The document contract only admits these three values.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Resource ecosystem a policy is written for.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Kubernetes,
    Terraform,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Kubernetes => "kubernetes",
            Provider::Terraform => "terraform",
        }
    }
}

/// An input declared by a policy and bound at evaluation time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyParameters {
    pub name: String,
    /// Declared type tag (`string`, `integer`, `boolean`, `array`, ...).
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Filters deciding which entities a policy is evaluated against.
///
/// Empty lists are unconstrained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyTargets {
    #[serde(default)]
    pub kinds: Vec<String>,
    /// Matches when at least one selector is fully satisfied.
    #[serde(default)]
    pub labels: Vec<LabelSelector>,
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// Filters exempting entities from a policy even when its targets match.
///
/// Empty lists exclude nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyExclusions {
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// `namespace/name` identifiers, or bare `name` for cluster-scoped resources.
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub labels: Vec<LabelSelector>,
}

/// Reference to a compliance framework and the controls a policy covers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyStandard {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<String>,
}

/// A named rule bundle: rule code plus targeting and exclusion metadata.
///
/// Field names follow the policy document contract, so a policy resource body deserializes
/// directly into this type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Policy {
    pub id: String,
    pub name: String,
    /// Rule source, compiled by the rule engine.
    pub code: String,
    #[serde(default = "default_true")]
    pub enforce: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PolicyParameters>,
    #[serde(default)]
    pub targets: PolicyTargets,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub how_to_solve: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub severity: Severity,
    #[serde(default)]
    pub standards: Vec<PolicyStandard>,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub mutate: bool,
    #[serde(default, rename = "exclude")]
    pub exclusions: PolicyExclusions,
}

fn default_true() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            code: String::new(),
            enforce: true,
            parameters: Vec::new(),
            targets: PolicyTargets::default(),
            description: String::new(),
            how_to_solve: String::new(),
            category: String::new(),
            tags: Vec::new(),
            severity: Severity::default(),
            standards: Vec::new(),
            provider: Provider::default(),
            mutate: false,
            exclusions: PolicyExclusions::default(),
        }
    }
}

impl Policy {
    pub fn new(id: impl Into<String>, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&PolicyParameters> {
        self.parameters.iter().find(|p| p.name == name)
    }
}
