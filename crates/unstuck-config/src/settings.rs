//! Typed configuration for `config.toml`.
//!
//! ```toml
//! [plan]
//! max_escalation = 2
//! allow_force = false
//!
//! [apply]
//! dry_run = false
//! auto_confirm = false
//! continue_on_error = false
//! verbose_audit = false
//!
//! [cluster]
//! kubectl = "kubectl"
//! context = "prod"
//! request_timeout = 30
//! overall_timeout = 300
//!
//! [logging]
//! level = "info"
//! format = "human"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, ValidationResult};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnstuckConfig {
    pub plan: PlanSettings,
    pub apply: ApplySettings,
    pub cluster: ClusterSettings,
    pub logging: LoggingSettings,
}

/// Planner ceiling and force permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanSettings {
    /// Highest escalation level the planner may emit (0-4).
    pub max_escalation: u8,
    /// Required for any level 3 or 4 action.
    pub allow_force: bool,
}

impl Default for PlanSettings {
    fn default() -> Self {
        PlanSettings {
            max_escalation: 2,
            allow_force: false,
        }
    }
}

/// Run loop behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplySettings {
    pub dry_run: bool,
    /// Skip the interactive prompt for force actions.
    pub auto_confirm: bool,
    pub continue_on_error: bool,
    /// Capture before/after snapshots for each action.
    pub verbose_audit: bool,
}

/// How to reach the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSettings {
    /// kubectl binary name or path.
    pub kubectl: String,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    /// Whole-command deadline in seconds.
    pub overall_timeout: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        ClusterSettings {
            kubectl: "kubectl".to_string(),
            kubeconfig: None,
            context: None,
            request_timeout: 30,
            overall_timeout: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: Option<String>,
    /// `human` or `jsonl`.
    pub format: Option<String>,
}

/// Values supplied on the command line. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_escalation: Option<u8>,
    pub allow_force: Option<bool>,
    pub dry_run: Option<bool>,
    pub auto_confirm: Option<bool>,
    pub continue_on_error: Option<bool>,
    pub verbose_audit: Option<bool>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub overall_timeout: Option<u64>,
}

impl UnstuckConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(content: &str) -> ValidationResult<Self> {
        toml::from_str(content)
            .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &std::path::Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Render back to TOML.
    pub fn to_toml_string(&self) -> ValidationResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ValidationError::ParseError(format!("Cannot render TOML: {}", e)))
    }

    /// Layer CLI values on top of the file values.
    pub fn apply_overrides(&mut self, o: &ConfigOverrides) {
        if let Some(v) = o.max_escalation {
            self.plan.max_escalation = v;
        }
        if let Some(v) = o.allow_force {
            self.plan.allow_force = v;
        }
        if let Some(v) = o.dry_run {
            self.apply.dry_run = v;
        }
        if let Some(v) = o.auto_confirm {
            self.apply.auto_confirm = v;
        }
        if let Some(v) = o.continue_on_error {
            self.apply.continue_on_error = v;
        }
        if let Some(v) = o.verbose_audit {
            self.apply.verbose_audit = v;
        }
        if let Some(v) = &o.kubeconfig {
            self.cluster.kubeconfig = Some(v.clone());
        }
        if let Some(v) = &o.context {
            self.cluster.context = Some(v.clone());
        }
        if let Some(v) = o.overall_timeout {
            self.cluster.overall_timeout = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = UnstuckConfig::from_toml_str("").unwrap();
        assert_eq!(config, UnstuckConfig::default());
        assert_eq!(config.plan.max_escalation, 2);
        assert!(!config.plan.allow_force);
        assert_eq!(config.cluster.kubectl, "kubectl");
        assert_eq!(config.cluster.request_timeout, 30);
        assert_eq!(config.cluster.overall_timeout, 300);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = UnstuckConfig::from_toml_str(
            r#"
[plan]
max_escalation = 4
allow_force = true

[cluster]
context = "staging"
"#,
        )
        .unwrap();
        assert_eq!(config.plan.max_escalation, 4);
        assert!(config.plan.allow_force);
        assert_eq!(config.cluster.context.as_deref(), Some("staging"));
        assert_eq!(config.cluster.request_timeout, 30);
        assert!(!config.apply.dry_run);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = UnstuckConfig::from_toml_str("[plan]\nmax_level = 3\n").unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn overrides_only_touch_set_fields() {
        let mut config = UnstuckConfig::default();
        config.apply.continue_on_error = true;
        config.apply_overrides(&ConfigOverrides {
            max_escalation: Some(0),
            dry_run: Some(true),
            ..Default::default()
        });
        assert_eq!(config.plan.max_escalation, 0);
        assert!(config.apply.dry_run);
        assert!(config.apply.continue_on_error);
    }

    #[test]
    fn renders_back_to_toml() {
        let config = UnstuckConfig::default();
        let text = config.to_toml_string().unwrap();
        let back = UnstuckConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
