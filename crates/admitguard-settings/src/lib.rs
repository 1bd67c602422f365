//! Config parsing and profile resolution.
//!
//! This crate is I/O-free: it parses and resolves configuration provided as strings.

#![forbid(unsafe_code)]

mod model;
mod presets;
mod resolve;

pub use model::ValidatorConfigV1;
pub use presets::{PROFILE_ADMISSION, PROFILE_AUDIT, PROFILE_TF_ADMISSION};
pub use resolve::{Overrides, ResolvedConfig};

/// Parse `admitguard.toml` (or equivalent) into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<ValidatorConfigV1> {
    let cfg: ValidatorConfigV1 = toml::from_str(input)?;
    Ok(cfg)
}

/// Resolve the effective validator options (profile, then config keys, then overrides).
pub fn resolve_config(
    cfg: ValidatorConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedConfig> {
    resolve::resolve_config(cfg, overrides)
}
