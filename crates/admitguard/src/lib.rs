//! Policy validation for Kubernetes and infrastructure-as-code resources.
//!
//! A [`Validator`] fetches policies from a [`PolicySource`], keeps the ones whose targets
//! match an [`Entity`], evaluates their rule code, and hands the resulting
//! [`PolicyValidationSummary`] to every [`PolicyValidationSink`].
//!
//! ```no_run
//! use admitguard::{Context, Entity, PolicySource, PolicyValidationSink, Validator, ids};
//! use std::sync::Arc;
//!
//! async fn admit(
//!     policies: Arc<dyn PolicySource>,
//!     sinks: Vec<Arc<dyn PolicyValidationSink>>,
//!     entity: &Entity,
//! ) -> Result<bool, admitguard::ValidateError> {
//!     let validator = Validator::new(policies, false, ids::VALIDATION_TYPE_ADMISSION, sinks);
//!     let summary = validator
//!         .validate(&Context::new(), entity, Some(ids::TRIGGER_ADMISSION_CONTROLLER))
//!         .await?;
//!     Ok(summary.violations.iter().all(|v| !v.policy.enforce))
//! }
//! ```

#![forbid(unsafe_code)]

pub use admitguard_app::{
    AuditFailure, AuditReport, CONFIG_FILE_NAME, Context, EntitySource, PolicySource,
    PolicyValidationSink, RuleCache, SinkFailure, ValidateError, ValidationOutcome, Validator,
    load_config,
};
pub use admitguard_domain::{
    CancelToken, CompileError, EvalError, Program, RuleEngine, ScriptEngine, SinkFailureMode,
    ValidatorOptions, applies,
};
pub use admitguard_settings::{Overrides, ResolvedConfig, ValidatorConfigV1};
pub use admitguard_types::{
    EntitiesList, Entity, LabelSelector, ListOptions, Policy, PolicyExclusions,
    PolicyParameters, PolicyStandard, PolicyTargets, PolicyValidation, PolicyValidationStatus,
    PolicyValidationSummary, Provider, Severity, Value, ids,
};

/// Compile rule code outside of a policy, e.g. to lint it before publishing.
pub use admitguard_domain::rule::compile as compile_rule;
