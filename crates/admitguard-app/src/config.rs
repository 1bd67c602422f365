use admitguard_settings::{Overrides, ResolvedConfig, ValidatorConfigV1};
use anyhow::Context as _;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "admitguard.toml";

/// Read and resolve a config file. A missing or blank file resolves to profile defaults.
pub fn load_config(path: &Path, overrides: Overrides) -> anyhow::Result<ResolvedConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };

    let cfg = if text.trim().is_empty() {
        ValidatorConfigV1::default()
    } else {
        admitguard_settings::parse_config_toml(&text)
            .with_context(|| format!("parse {}", path.display()))?
    };

    admitguard_settings::resolve_config(cfg, overrides).context("resolve config")
}
