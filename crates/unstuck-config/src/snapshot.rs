//! Configuration snapshots for audit logs.
//!
//! A snapshot captures the effective configuration at the start of a run so
//! that an apply can be traced back to the exact settings that gated it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ConfigPath;
use crate::settings::UnstuckConfig;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    pub schema_version: String,

    /// Where the file came from.
    pub source: String,

    #[serde(default)]
    pub path: Option<String>,

    /// SHA-256 of the raw file content, or of `none` when running on defaults.
    pub hash: String,

    /// Effective values after CLI overrides.
    pub summary: ConfigSummary,
}

/// Key configuration values for quick reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub max_escalation: u8,
    pub allow_force: bool,
    pub dry_run: bool,
    pub auto_confirm: bool,
    pub continue_on_error: bool,
    pub request_timeout: u64,
    pub overall_timeout: u64,
    #[serde(default)]
    pub context: Option<String>,
}

impl ConfigSnapshot {
    pub fn new(config: &UnstuckConfig, path: &ConfigPath, raw: Option<&str>) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            source: path.source.to_string(),
            path: path.path.as_ref().map(|p| p.display().to_string()),
            hash: hash_content(raw.unwrap_or("none")),
            summary: ConfigSummary::from(config),
        }
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check if this snapshot was taken from the same file content.
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.hash == other.hash
    }

    /// First 12 chars of the content hash.
    pub fn short_id(&self) -> &str {
        &self.hash[..12.min(self.hash.len())]
    }
}

impl From<&UnstuckConfig> for ConfigSummary {
    fn from(config: &UnstuckConfig) -> Self {
        ConfigSummary {
            max_escalation: config.plan.max_escalation,
            allow_force: config.plan.allow_force,
            dry_run: config.apply.dry_run,
            auto_confirm: config.apply.auto_confirm,
            continue_on_error: config.apply.continue_on_error,
            request_timeout: config.cluster.request_timeout,
            overall_timeout: config.cluster.overall_timeout,
            context: config.cluster.context.clone(),
        }
    }
}

/// Hash content with SHA-256 and return hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
