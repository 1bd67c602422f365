use crate::Value;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resource under validation: a Kubernetes object or an infrastructure-as-code resource.
///
/// Identity and targeting metadata are lifted out of the document so the matcher never has to
/// walk it; the full body stays in `document` as rule input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub document: Value,
}

impl Entity {
    /// Build an entity from a full resource document (`apiVersion`, `kind`, `metadata`, ...).
    ///
    /// Missing metadata degrades to empty strings rather than failing: the document is still a
    /// valid rule input, and the matcher treats absent kind/namespace/labels as non-matching.
    pub fn from_document(document: Value) -> Self {
        let text = |path: &str| {
            document
                .pointer(path)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let kind = text("kind");
        let name = text("metadata.name");
        let api_version = text("apiVersion");
        let namespace = Some(text("metadata.namespace")).filter(|ns| !ns.is_empty());
        let resource_version = Some(text("metadata.resourceVersion")).filter(|v| !v.is_empty());

        let labels = document
            .pointer("metadata.labels")
            .and_then(Value::as_map)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| label_value(v).map(|v| (k.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();

        let uid = text("metadata.uid");
        let id = if !uid.is_empty() {
            uid
        } else {
            match &namespace {
                Some(ns) => format!("{ns}/{kind}/{name}"),
                None => format!("{kind}/{name}"),
            }
        };

        Self {
            id,
            name,
            kind,
            api_version,
            namespace,
            labels,
            resource_version,
            document,
        }
    }

    /// Identifier matched against `PolicyExclusions::resources`.
    ///
    /// `namespace/name` for namespaced entities, bare `name` for cluster-scoped ones.
    pub fn resource_id(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

/// Options for listing entities from an entity source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of entities per page. `None` lets the source decide.
    pub limit: Option<usize>,
    /// Opaque continuation token returned by the previous page.
    pub continue_token: Option<String>,
    /// Restrict the listing to one namespace.
    pub namespace: Option<String>,
}

/// One page of entities.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntitiesList {
    pub entities: Vec<Entity>,
    pub has_next: bool,
    pub continue_token: Option<String>,
}

/// Labels are scalars; nulls and nested values are not labels at all.
fn label_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => Some(value.to_string()),
        Value::Null | Value::List(_) | Value::Map(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_document_lifts_metadata() {
        let entity = Entity::from_document(Value::from(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "web",
                "namespace": "unit-testing",
                "uid": "6a1c0c9e-0000-4000-8000-000000000001",
                "resourceVersion": "42",
                "labels": { "app": "nginx", "replicas": 3 }
            }
        })));

        assert_eq!(entity.id, "6a1c0c9e-0000-4000-8000-000000000001");
        assert_eq!(entity.kind, "Deployment");
        assert_eq!(entity.api_version, "apps/v1");
        assert_eq!(entity.namespace(), Some("unit-testing"));
        assert_eq!(entity.resource_version.as_deref(), Some("42"));
        assert_eq!(entity.labels.get("app").map(String::as_str), Some("nginx"));
        assert_eq!(entity.labels.get("replicas").map(String::as_str), Some("3"));
        assert_eq!(entity.resource_id(), "unit-testing/web");
    }

    #[test]
    fn from_document_skips_null_and_nested_labels() {
        let entity = Entity::from_document(Value::from(json!({
            "kind": "Pod",
            "metadata": {
                "name": "api",
                "labels": {
                    "app": "api",
                    "canary": true,
                    "owner": null,
                    "tiers": ["web"],
                    "team": { "name": "core" }
                }
            }
        })));

        assert_eq!(entity.labels.len(), 2);
        assert_eq!(entity.labels.get("app").map(String::as_str), Some("api"));
        assert_eq!(entity.labels.get("canary").map(String::as_str), Some("true"));
        assert!(!entity.labels.contains_key("owner"));
        assert!(!entity.labels.contains_key("tiers"));
        assert!(!entity.labels.contains_key("team"));
    }

    #[test]
    fn from_document_derives_id_without_uid() {
        let namespaced = Entity::from_document(Value::from(json!({
            "kind": "Pod",
            "metadata": { "name": "api", "namespace": "prod" }
        })));
        assert_eq!(namespaced.id, "prod/Pod/api");

        let cluster = Entity::from_document(Value::from(json!({
            "kind": "Namespace",
            "metadata": { "name": "prod", "namespace": "" }
        })));
        assert_eq!(cluster.id, "Namespace/prod");
        assert_eq!(cluster.namespace(), None);
        assert_eq!(cluster.resource_id(), "prod");
    }

    #[test]
    fn from_document_tolerates_missing_metadata() {
        let entity = Entity::from_document(Value::from(json!({ "resource": "aws_s3_bucket" })));
        assert_eq!(entity.kind, "");
        assert_eq!(entity.name, "");
        assert!(entity.labels.is_empty());
        assert_eq!(entity.namespace(), None);
    }
}
