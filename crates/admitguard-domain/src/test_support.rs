use admitguard_types::{Entity, LabelSelector, Policy, PolicyParameters, Value};
use serde_json::json;

pub fn labels(pairs: &[(&str, &str)]) -> LabelSelector {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn entity(kind: &str, namespace: Option<&str>, label_pairs: &[(&str, &str)]) -> Entity {
    let namespace = namespace.map(|ns| ns.to_string());
    Entity {
        id: match &namespace {
            Some(ns) => format!("{ns}/{kind}/web"),
            None => format!("{kind}/web"),
        },
        name: "web".to_string(),
        kind: kind.to_string(),
        namespace,
        labels: labels(label_pairs),
        ..Entity::default()
    }
}

pub fn policy(id: &str) -> Policy {
    Policy::new(id, id, "violation \"always\"")
}

pub fn param(name: &str, ty: &str, value: Option<Value>) -> PolicyParameters {
    PolicyParameters {
        name: name.to_string(),
        param_type: ty.to_string(),
        required: false,
        value,
    }
}

/// A Deployment document with one container per `(name, image)` pair.
pub fn deployment(containers: &[(&str, &str)]) -> serde_json::Value {
    let containers: Vec<serde_json::Value> = containers
        .iter()
        .map(|(name, image)| json!({ "name": name, "image": image }))
        .collect();
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": "web", "namespace": "unit-testing", "labels": { "app": "nginx" } },
        "spec": { "template": { "spec": { "containers": containers } } }
    })
}
