//! Shared test utilities for the admitguard workspace.
//!
//! The doubles implement the application ports and record how they were called, so
//! orchestrator tests can assert on call counts and arguments. They live in their own crate
//! because `admitguard-app` integration tests depend on them, and a `#[cfg(test)]` module
//! inside the app crate would not be visible there.

mod doubles;
pub mod fixtures;

pub use doubles::{
    FailingPolicySource, FailingSink, PendingPolicySource, RecordingSink, StaticEntitySource,
    StaticPolicySource,
};

use serde_json::Value;

/// Replace per-run fields of serialized validation records with placeholders.
///
/// Any object carrying both `created_at` and `status` is treated as a validation record;
/// its `id` and `created_at` are overwritten at any depth.
pub fn normalize_nondeterministic(mut value: Value) -> Value {
    normalize_recursive(&mut value);
    value
}

fn normalize_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.contains_key("created_at") && map.contains_key("status") {
                map.insert(
                    "created_at".to_string(),
                    Value::String("__TIMESTAMP__".to_string()),
                );
                if map.contains_key("id") {
                    map.insert("id".to_string(), Value::String("__ID__".to_string()));
                }
            }
            for val in map.values_mut() {
                normalize_recursive(val);
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                normalize_recursive(val);
            }
        }
        _ => {}
    }
}
