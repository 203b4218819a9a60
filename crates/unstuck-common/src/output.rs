//! Output format specifications.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries
    #[default]
    Text,

    /// Indented JSON
    Json,

    /// YAML
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl OutputFormat {
    /// Pick a format when the caller did not ask for one.
    ///
    /// Text for an interactive terminal, JSON when stdout is piped.
    pub fn auto_detect(stdout_is_terminal: bool) -> Self {
        if stdout_is_terminal {
            OutputFormat::Text
        } else {
            OutputFormat::Json
        }
    }

    /// Whether this format is intended for machines.
    pub fn is_structured(self) -> bool {
        !matches!(self, OutputFormat::Text)
    }
}
