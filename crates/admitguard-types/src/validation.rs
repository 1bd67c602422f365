use crate::ids::COMPLIANT_MESSAGE;
use crate::{Entity, Policy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum PolicyValidationStatus {
    #[serde(rename = "Violation")]
    Violating,
    #[serde(rename = "Compliance")]
    Compliant,
}

impl PolicyValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyValidationStatus::Violating => "Violation",
            PolicyValidationStatus::Compliant => "Compliance",
        }
    }
}

/// Outcome of evaluating one policy against one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyValidation {
    pub id: String,
    pub policy: Policy,
    pub entity: Entity,
    /// Label of the validation run (`Admission`, `Audit`, ...).
    #[serde(rename = "type")]
    pub validation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    pub status: PolicyValidationStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schemars(with = "String")]
    pub created_at: OffsetDateTime,
}

impl PolicyValidation {
    /// Build a result from the evaluator's reasons. No reasons means compliant.
    pub fn new(
        policy: Policy,
        entity: Entity,
        validation_type: impl Into<String>,
        trigger: Option<String>,
        reasons: Vec<String>,
    ) -> Self {
        let (status, message) = if reasons.is_empty() {
            (PolicyValidationStatus::Compliant, COMPLIANT_MESSAGE.to_string())
        } else {
            (PolicyValidationStatus::Violating, reasons.join("; "))
        };

        Self {
            id: Uuid::new_v4().to_string(),
            policy,
            entity,
            validation_type: validation_type.into(),
            trigger,
            status,
            message,
            reasons,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_violating(&self) -> bool {
        self.status == PolicyValidationStatus::Violating
    }
}

/// Per-entity aggregate of one validation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyValidationSummary {
    #[serde(default)]
    pub violations: Vec<PolicyValidation>,
    #[serde(default)]
    pub compliances: Vec<PolicyValidation>,
}

impl PolicyValidationSummary {
    /// An empty summary is a valid outcome; it is never delivered to sinks.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty() && self.compliances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len() + self.compliances.len()
    }

    /// Route a result into the matching list by status.
    pub fn push(&mut self, validation: PolicyValidation) {
        match validation.status {
            PolicyValidationStatus::Violating => self.violations.push(validation),
            PolicyValidationStatus::Compliant => self.compliances.push(validation),
        }
    }

    /// Policy IDs of the violations, sorted.
    pub fn violating_policy_ids(&self) -> Vec<&str> {
        sorted_ids(&self.violations)
    }

    /// Policy IDs of the compliances, sorted.
    pub fn compliant_policy_ids(&self) -> Vec<&str> {
        sorted_ids(&self.compliances)
    }
}

fn sorted_ids(validations: &[PolicyValidation]) -> Vec<&str> {
    let mut ids: Vec<&str> = validations.iter().map(|v| v.policy.id.as_str()).collect();
    ids.sort_unstable();
    ids
}
