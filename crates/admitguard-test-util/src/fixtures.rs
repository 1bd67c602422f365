//! Policies and entities shared by orchestrator tests and `xtask conform`.

use admitguard_types::{Entity, Policy, Severity, Value};
use serde_json::json;

pub const NAMESPACE: &str = "unit-testing";

/// Flags containers whose image is unpinned or pinned to `latest`.
pub fn image_tag_policy() -> Policy {
    Policy {
        severity: Severity::High,
        category: "Workload Security".to_string(),
        description: "Container images must be pinned to an explicit tag".to_string(),
        how_to_solve: "Use a versioned tag such as nginx:1.25".to_string(),
        ..Policy::new(
            "imageTag",
            "Image tag is pinned",
            r#"
            violation "container {c.name} uses an unpinned image {c.image}"
              for c in input.spec.template.spec.containers
              when ends_with(c.image, ":latest") or not contains(c.image, ":")
            "#,
        )
    }
}

/// Requires an `owner` label.
pub fn missing_owner_policy() -> Policy {
    Policy {
        severity: Severity::Medium,
        category: "Governance".to_string(),
        ..Policy::new(
            "missingOwner",
            "Owner label is set",
            r#"violation "{input.kind} {input.metadata.name} has no owner label" when not has(input.metadata.labels.owner)"#,
        )
    }
}

/// Rule code that does not compile.
pub fn bad_code_policy() -> Policy {
    Policy::new("badPolicyCode", "Broken policy", "violation \"x\" when frob(input)")
}

/// Compiles, but fails at evaluation on every Deployment (ordering a number against a string).
pub fn failing_eval_policy() -> Policy {
    Policy::new(
        "badReplicas",
        "Replica bound",
        r#"violation "too many replicas" when input.spec.replicas > "3""#,
    )
}

pub fn deployment(name: &str, image: &str, labels: serde_json::Value) -> Entity {
    Entity::from_document(Value::from(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "labels": labels,
        },
        "spec": {
            "replicas": 2,
            "template": { "spec": { "containers": [{ "name": "nginx", "image": image }] } },
        },
    })))
}

/// Violates both `imageTag` and `missingOwner`.
pub fn violating_deployment() -> Entity {
    deployment("nginx", "nginx:latest", json!({ "app": "nginx" }))
}

/// Satisfies both `imageTag` and `missingOwner`.
pub fn compliant_deployment() -> Entity {
    deployment(
        "nginx",
        "nginx:1.25.3",
        json!({ "app": "nginx", "owner": "platform" }),
    )
}
