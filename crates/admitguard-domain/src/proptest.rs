//! Property-based tests for the domain crate.
//!
//! These tests use proptest to verify invariants around:
//! - Target matching purity and the label selector algebra
//! - Evaluation determinism and message de-duplication
//! - Parser robustness on arbitrary input, including deeply nested expressions

use crate::cancel::CancelToken;
use crate::error::CompileError;
use crate::matcher::{applies, is_excluded, selector_matches, targets_match};
use crate::rule::{MAX_NESTING, RuleEngine, ScriptEngine, compile};
use admitguard_types::{
    Entity, LABEL_WILDCARD, LabelSelector, Policy, PolicyExclusions, PolicyTargets, Value,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

// ============================================================================
// Strategies for generating arbitrary values
// ============================================================================

fn arb_kind() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Deployment", "ReplicaSet", "Pod", "Namespace"])
        .prop_map(str::to_string)
}

fn arb_namespace() -> impl Strategy<Value = Option<String>> {
    prop::option::of(
        prop::sample::select(vec!["default", "prod", "kube-system"]).prop_map(str::to_string),
    )
}

/// Small key/value alphabets so selectors and entity labels actually collide.
fn arb_labels() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(
        prop::sample::select(vec!["app", "team", "owner"]).prop_map(str::to_string),
        prop::sample::select(vec!["nginx", "core", "alice", ""]).prop_map(str::to_string),
        0..3,
    )
}

fn arb_selector() -> impl Strategy<Value = LabelSelector> {
    prop::collection::btree_map(
        prop::sample::select(vec!["app", "team", "owner"]).prop_map(str::to_string),
        prop::sample::select(vec!["nginx", "core", "alice", LABEL_WILDCARD])
            .prop_map(str::to_string),
        0..3,
    )
}

fn arb_entity() -> impl Strategy<Value = Entity> {
    (
        arb_kind(),
        arb_namespace(),
        arb_labels(),
        prop::sample::select(vec!["web", "api"]),
    )
        .prop_map(|(kind, namespace, labels, name)| Entity {
            id: format!("{kind}/{name}"),
            name: name.to_string(),
            kind,
            namespace,
            labels,
            ..Entity::default()
        })
}

fn arb_targets() -> impl Strategy<Value = PolicyTargets> {
    (
        prop::collection::vec(arb_kind(), 0..3),
        prop::collection::vec(
            prop::sample::select(vec!["default", "prod"]).prop_map(str::to_string),
            0..2,
        ),
        prop::collection::vec(arb_selector(), 0..3),
    )
        .prop_map(|(kinds, namespaces, labels)| PolicyTargets {
            kinds,
            labels,
            namespaces,
        })
}

fn arb_exclusions() -> impl Strategy<Value = PolicyExclusions> {
    (
        prop::collection::vec(
            prop::sample::select(vec!["kube-system", "prod"]).prop_map(str::to_string),
            0..2,
        ),
        prop::collection::vec(
            prop::sample::select(vec!["prod/web", "api", "default/api"]).prop_map(str::to_string),
            0..2,
        ),
        prop::collection::vec(arb_selector(), 0..2),
    )
        .prop_map(|(namespaces, resources, labels)| PolicyExclusions {
            namespaces,
            resources,
            labels,
        })
}

fn arb_policy() -> impl Strategy<Value = Policy> {
    (arb_targets(), arb_exclusions()).prop_map(|(targets, exclusions)| Policy {
        targets,
        exclusions,
        ..Policy::new("p", "p", "violation \"x\"")
    })
}

fn arb_document() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i64..5).prop_map(Value::Int),
        prop::sample::select(vec!["nginx:latest", "redis", "a:1"]).prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map(
                prop::sample::select(vec!["image", "xs", "name", "n"]).prop_map(str::to_string),
                inner,
                0..4,
            )
            .prop_map(Value::Map),
        ]
    })
}

// ============================================================================
// Matcher properties
// ============================================================================

proptest! {
    #[test]
    fn applies_is_deterministic(policy in arb_policy(), entity in arb_entity()) {
        let first = applies(&policy, &entity);
        for _ in 0..3 {
            prop_assert_eq!(applies(&policy, &entity), first);
        }
    }

    #[test]
    fn applies_is_targets_and_not_excluded(policy in arb_policy(), entity in arb_entity()) {
        prop_assert_eq!(
            applies(&policy, &entity),
            targets_match(&policy.targets, &entity) && !is_excluded(&policy.exclusions, &entity)
        );
    }

    #[test]
    fn empty_filters_are_unconstrained(entity in arb_entity()) {
        prop_assert!(targets_match(&PolicyTargets::default(), &entity));
        prop_assert!(!is_excluded(&PolicyExclusions::default(), &entity));
    }

    #[test]
    fn label_list_is_an_or_of_selectors(
        selectors in prop::collection::vec(arb_selector(), 1..4),
        labels in arb_labels(),
    ) {
        let entity = Entity { labels: labels.clone(), ..Entity::default() };
        let targets = PolicyTargets { labels: selectors.clone(), ..PolicyTargets::default() };

        let non_empty: Vec<&LabelSelector> = selectors.iter().filter(|s| !s.is_empty()).collect();
        let expected = non_empty.is_empty() || non_empty.iter().any(|s| selector_matches(s, &labels));
        prop_assert_eq!(targets_match(&targets, &entity), expected);
    }

    #[test]
    fn selector_is_an_and_of_keys(selector in arb_selector(), labels in arb_labels()) {
        let expected = selector.iter().all(|(k, v)| {
            labels.get(k).is_some_and(|have| v == LABEL_WILDCARD || have == v)
        });
        prop_assert_eq!(selector_matches(&selector, &labels), expected);
    }

    #[test]
    fn adding_an_exclusion_never_widens_applicability(
        policy in arb_policy(),
        entity in arb_entity(),
        extra in arb_selector(),
    ) {
        let mut narrowed = policy.clone();
        narrowed.exclusions.labels.push(extra);
        prop_assert!(!applies(&narrowed, &entity) || applies(&policy, &entity));
    }
}

// ============================================================================
// Rule language properties
// ============================================================================

proptest! {
    #[test]
    fn evaluation_is_deterministic(doc in arb_document()) {
        let policy = Policy::new(
            "p",
            "p",
            r#"
            violation "image {x.image}" for x in input.xs when ends_with(x.image, ":latest")
            violation "named {input.name}" when has(input.name)
            violation "many" when len(input.xs) > 2
            "#,
        );
        let engine = ScriptEngine;
        let program = engine.compile(&policy).expect("compile");
        let cancel = CancelToken::new();

        let first = engine.evaluate(&program, &doc, &[], &cancel);
        let second = engine.evaluate(&program, &doc, &[], &cancel);
        prop_assert_eq!(&first, &second);

        if let Ok(messages) = first {
            let mut unique = messages.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), messages.len());
        }
    }

    #[test]
    fn parser_never_panics(source in "\\PC{0,64}") {
        let _ = compile(&source, &[]);
    }

    #[test]
    fn parser_never_panics_on_rule_shaped_input(
        body in prop::collection::vec(
            prop::sample::select(vec![
                "input", ".", "a", "[", "]", "(", ")", "{", "}", "\"", "==", "and", "not",
                "for", "x", "in", "when", "1", "=>", ",", "any", "-", "#",
            ]),
            0..16,
        ),
    ) {
        let source = format!("violation \"m\" {}", body.join(" "));
        let _ = compile(&source, &[]);
    }

    #[test]
    fn nesting_depth_is_bounded(
        openers in prop::collection::vec(prop::sample::select(vec!["(", "[", "not ", "- "]), 0..400),
    ) {
        let closers: String = openers
            .iter()
            .rev()
            .map(|opener| match *opener {
                "(" => ")",
                "[" => "]",
                _ => "",
            })
            .collect();
        let source = format!("violation \"m\" when {}true{}", openers.concat(), closers);
        let result = compile(&source, &[]);
        if openers.len() >= MAX_NESTING {
            prop_assert!(matches!(result, Err(CompileError::Syntax { .. })), "{:?}", result);
        } else {
            // `- not x` is a plain syntax error; only the depth cap is ruled out here.
            let too_deep = matches!(
                &result,
                Err(CompileError::Syntax { message, .. }) if message == "expression nested too deeply"
            );
            prop_assert!(!too_deep, "{:?}", result);
        }
    }
}
