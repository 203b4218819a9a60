//! unstuck configuration loading and validation.
//!
//! This crate provides:
//! - Typed structs for `config.toml`
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation of escalation and timeout settings
//! - Config snapshots for audit logging

pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use settings::{
    ApplySettings, ClusterSettings, ConfigOverrides, LoggingSettings, PlanSettings, UnstuckConfig,
};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// A resolved, parsed configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: UnstuckConfig,
    pub path: ConfigPath,
    /// Raw file content, kept for hashing into the snapshot.
    pub raw: Option<String>,
}

impl LoadedConfig {
    /// Apply CLI overrides, validate, and freeze a snapshot.
    pub fn finalize(
        mut self,
        overrides: &ConfigOverrides,
    ) -> ValidationResult<(UnstuckConfig, ConfigSnapshot)> {
        self.config.apply_overrides(overrides);
        validate_config(&self.config)?;
        let snapshot = ConfigSnapshot::new(&self.config, &self.path, self.raw.as_deref());
        Ok((self.config, snapshot))
    }
}

/// Resolve the config file location and parse it, falling back to defaults.
pub fn load_config(cli_path: Option<&std::path::Path>) -> ValidationResult<LoadedConfig> {
    let path = resolve_config(cli_path);
    match &path.path {
        Some(p) => {
            let raw = std::fs::read_to_string(p).map_err(|e| {
                ValidationError::IoError(format!("Failed to read {}: {}", p.display(), e))
            })?;
            let config = UnstuckConfig::from_toml_str(&raw)?;
            Ok(LoadedConfig {
                config,
                path,
                raw: Some(raw),
            })
        }
        None => Ok(LoadedConfig {
            config: UnstuckConfig::default(),
            path,
            raw: None,
        }),
    }
}
