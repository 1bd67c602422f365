use admitguard::{
    Context, Entity, Policy, PolicySource, PolicyValidationSink, PolicyValidationSummary,
    Validator, Value, compile_rule, ids,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

struct OnePolicy(Policy);

#[async_trait]
impl PolicySource for OnePolicy {
    async fn get_all(&self, _ctx: &Context) -> anyhow::Result<Vec<Policy>> {
        Ok(vec![self.0.clone()])
    }
}

#[derive(Default)]
struct Collect(Mutex<Vec<PolicyValidationSummary>>);

#[async_trait]
impl PolicyValidationSink for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    async fn write(&self, _ctx: &Context, summary: &PolicyValidationSummary) -> anyhow::Result<()> {
        self.0.lock().expect("lock").push(summary.clone());
        Ok(())
    }
}

#[tokio::test]
async fn policy_document_validates_an_entity_end_to_end() {
    let policy: Policy = serde_json::from_value(json!({
        "id": "hostNetwork",
        "name": "No host network",
        "severity": "high",
        "code": "violation \"{input.metadata.name} uses the host network\" when input.spec.hostNetwork == true",
        "targets": { "kinds": ["Pod"] },
    }))
    .expect("policy document");
    let entity = Entity::from_document(Value::from(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": "debug", "namespace": "default" },
        "spec": { "hostNetwork": true },
    })));

    let sink = Arc::new(Collect::default());
    let validator = Validator::new(
        Arc::new(OnePolicy(policy)),
        false,
        ids::VALIDATION_TYPE_ADMISSION,
        vec![sink.clone() as Arc<dyn PolicyValidationSink>],
    );
    let summary = validator
        .validate(&Context::new(), &entity, None)
        .await
        .expect("validate");

    assert_eq!(summary.violations.len(), 1);
    assert_eq!(summary.violations[0].message, "debug uses the host network");
    assert_eq!(sink.0.lock().expect("lock").len(), 1);
}

#[test]
fn rule_code_can_be_linted_without_a_policy() {
    assert!(compile_rule("violation \"ok\" when has(input.spec)", &[]).is_ok());
    assert!(compile_rule("violation \"bad\" when params.missing", &[]).is_err());
}
