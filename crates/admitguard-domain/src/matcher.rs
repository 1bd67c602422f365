//! Target matching: does a policy apply to an entity?
//!
//! Everything here is pure and total. Targets and exclusions are already-loaded data, so there is
//! no error path.

use admitguard_types::{
    Entity, LABEL_WILDCARD, LabelSelector, Policy, PolicyExclusions, PolicyTargets,
};
use std::collections::BTreeMap;

/// A policy applies when its targets admit the entity and its exclusions do not exempt it.
pub fn applies(policy: &Policy, entity: &Entity) -> bool {
    targets_match(&policy.targets, entity) && !is_excluded(&policy.exclusions, entity)
}

/// Kind, namespace and label checks, AND-ed. Each empty filter is unconstrained.
pub fn targets_match(targets: &PolicyTargets, entity: &Entity) -> bool {
    let kind_ok = targets.kinds.is_empty() || targets.kinds.iter().any(|k| *k == entity.kind);

    let namespace_ok = targets.namespaces.is_empty()
        || entity
            .namespace()
            .is_some_and(|ns| targets.namespaces.iter().any(|n| n == ns));

    let labels_ok = {
        let mut selectors = non_empty(&targets.labels).peekable();
        selectors.peek().is_none() || selectors.any(|s| selector_matches(s, &entity.labels))
    };

    kind_ok && namespace_ok && labels_ok
}

/// True when any exclusion filter names the entity. Empty filters exclude nothing.
pub fn is_excluded(exclusions: &PolicyExclusions, entity: &Entity) -> bool {
    if let Some(ns) = entity.namespace()
        && exclusions.namespaces.iter().any(|n| n == ns)
    {
        return true;
    }

    if !exclusions.resources.is_empty() {
        let resource_id = entity.resource_id();
        if exclusions.resources.iter().any(|r| *r == resource_id) {
            return true;
        }
    }

    non_empty(&exclusions.labels).any(|s| selector_matches(s, &entity.labels))
}

/// Every key of the selector must be present on the entity. `"*"` accepts any value.
pub fn selector_matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(key, want)| match labels.get(key) {
        Some(_) if want == LABEL_WILDCARD => true,
        Some(have) => have == want,
        None => false,
    })
}

// An empty selector would vacuously match everything; it is treated as absent.
fn non_empty(selectors: &[LabelSelector]) -> impl Iterator<Item = &LabelSelector> {
    selectors.iter().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{entity, labels, policy};
    use admitguard_types::Value;

    #[test]
    fn unconstrained_policy_applies_to_everything() {
        let p = policy("any");
        assert!(applies(&p, &entity("Deployment", Some("prod"), &[])));
        assert!(applies(&p, &entity("Namespace", None, &[("team", "core")])));
    }

    #[test]
    fn kind_filter() {
        let mut p = policy("deployments-only");
        p.targets.kinds = vec!["Deployment".to_string()];

        assert!(applies(&p, &entity("Deployment", Some("prod"), &[])));
        assert!(!applies(&p, &entity("ReplicaSet", Some("prod"), &[])));
        assert!(!applies(&p, &entity("deployment", Some("prod"), &[])));
    }

    #[test]
    fn namespace_filter_requires_a_namespace() {
        let mut p = policy("prod-only");
        p.targets.namespaces = vec!["prod".to_string()];

        assert!(applies(&p, &entity("Pod", Some("prod"), &[])));
        assert!(!applies(&p, &entity("Pod", Some("dev"), &[])));
        assert!(!applies(&p, &entity("Namespace", None, &[])));
    }

    #[test]
    fn label_maps_or_across_and_within() {
        let mut p = policy("labels");
        p.targets.labels = vec![
            labels(&[("app", "nginx"), ("tier", "web")]),
            labels(&[("team", "core")]),
        ];

        assert!(applies(&p, &entity("Pod", None, &[("app", "nginx"), ("tier", "web")])));
        assert!(applies(&p, &entity("Pod", None, &[("team", "core"), ("x", "y")])));
        assert!(!applies(&p, &entity("Pod", None, &[("app", "nginx")])));
        assert!(!applies(&p, &entity("Pod", None, &[("team", "edge")])));
        assert!(!applies(&p, &entity("Pod", None, &[])));
    }

    #[test]
    fn wildcard_label_requires_presence_only() {
        let mut p = policy("wildcard");
        p.targets.labels = vec![labels(&[("owner", "*")])];

        assert!(applies(&p, &entity("Pod", None, &[("owner", "alice")])));
        assert!(applies(&p, &entity("Pod", None, &[("owner", "")])));
        assert!(!applies(&p, &entity("Pod", None, &[("Owner", "alice")])));
        assert!(!applies(&p, &entity("Pod", None, &[])));
    }

    #[test]
    fn wildcard_does_not_match_a_null_label() {
        let mut p = policy("wildcard");
        p.targets.labels = vec![labels(&[("owner", "*")])];

        let document = |owner: serde_json::Value| {
            Entity::from_document(Value::from(serde_json::json!({
                "kind": "Pod",
                "metadata": { "name": "api", "labels": { "owner": owner } }
            })))
        };
        assert!(!applies(&p, &document(serde_json::Value::Null)));
        assert!(applies(&p, &document(serde_json::json!("alice"))));
    }

    #[test]
    fn literal_star_value_is_not_special_on_the_entity() {
        let selector = labels(&[("app", "nginx")]);
        assert!(!selector_matches(&selector, &labels(&[("app", "*")])));
    }

    #[test]
    fn empty_label_maps_are_ignored() {
        let mut p = policy("empty-maps");
        p.targets.labels = vec![LabelSelector::new()];
        p.exclusions.labels = vec![LabelSelector::new()];

        assert!(applies(&p, &entity("Pod", Some("prod"), &[])));
    }

    #[test]
    fn exclusions_override_targets() {
        let mut p = policy("excluded");
        p.targets.kinds = vec!["Deployment".to_string()];
        p.exclusions.namespaces = vec!["kube-system".to_string()];
        p.exclusions.resources = vec!["prod/legacy".to_string(), "cluster-thing".to_string()];
        p.exclusions.labels = vec![labels(&[("skip-policy", "*")])];

        let mut legacy = entity("Deployment", Some("prod"), &[]);
        legacy.name = "legacy".to_string();
        assert!(!applies(&p, &legacy));

        assert!(!applies(&p, &entity("Deployment", Some("kube-system"), &[])));
        assert!(!applies(&p, &entity("Deployment", Some("prod"), &[("skip-policy", "yes")])));
        assert!(applies(&p, &entity("Deployment", Some("prod"), &[])));

        let mut cluster = entity("Deployment", None, &[]);
        cluster.name = "cluster-thing".to_string();
        assert!(!applies(&p, &cluster));
    }

    #[test]
    fn namespace_exclusion_does_not_touch_cluster_scoped_entities() {
        let mut p = policy("ns-excluded");
        p.exclusions.namespaces = vec!["kube-system".to_string()];
        assert!(applies(&p, &entity("ClusterRole", None, &[])));
    }
}
