use crate::{
    model::ValidatorConfigV1,
    presets::{self, PROFILE_ADMISSION},
};
use admitguard_domain::{SinkFailureMode, ValidatorOptions};
use admitguard_types::ids::SCHEMA_CONFIG_V1;
use anyhow::Context;
use std::time::Duration;

/// Programmatic overrides; these win over config file keys.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub validation_type: Option<String>,
    pub write_compliance: Option<bool>,
    pub parallelism: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub profile: String,
    pub options: ValidatorOptions,
}

pub fn resolve_config(
    cfg: ValidatorConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedConfig> {
    if let Some(schema) = cfg.schema.as_deref()
        && schema != SCHEMA_CONFIG_V1
    {
        anyhow::bail!("unsupported schema: {schema} (expected {SCHEMA_CONFIG_V1})");
    }

    let profile = overrides
        .profile
        .clone()
        .or(cfg.profile.clone())
        .unwrap_or_else(|| PROFILE_ADMISSION.to_string());

    let mut options = presets::preset(&profile).with_context(|| {
        format!("unknown profile: {profile} (expected admission|audit|tf-admission)")
    })?;

    if let Some(validation_type) = overrides.validation_type.or(cfg.validation_type) {
        anyhow::ensure!(
            !validation_type.trim().is_empty(),
            "validation_type must not be empty"
        );
        options.validation_type = validation_type;
    }

    if let Some(write_compliance) = overrides.write_compliance.or(cfg.write_compliance) {
        options.write_compliance = write_compliance;
    }

    if let Some(parallelism) = overrides.parallelism.or(cfg.parallelism) {
        options.parallelism = parallelism;
    }

    if let Some(mode) = cfg.sink_failure.as_deref() {
        options.sink_failure = parse_sink_failure(mode).context("invalid sink_failure")?;
    }

    if let Some(ms) = cfg.evaluation_timeout_ms {
        options.evaluation_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }

    if let Some(cache_rules) = cfg.cache_rules {
        options.cache_rules = cache_rules;
    }

    Ok(ResolvedConfig { profile, options })
}

fn parse_sink_failure(v: &str) -> anyhow::Result<SinkFailureMode> {
    match v {
        "report" => Ok(SinkFailureMode::Report),
        "propagate" => Ok(SinkFailureMode::Propagate),
        other => anyhow::bail!("unknown sink failure mode: {other} (expected report|propagate)"),
    }
}
