use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::{DEFAULT_FIRST_DELAY_SECS, DEFAULT_REPEAT_INTERVAL_SECS};

const CONFIG_ENV: &str = "COMPOSE_TIMER_CONFIG";
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_MARKER_ATTRIBUTE: &str = "data-compose-timer-attached";
const DEFAULT_PATCH_LOG_LIMIT: usize = 256;
const DEFAULT_TAUNTS: &[&str] = &[
    "Still typing? The recipient has aged visibly.",
    "This email is now longer than the meeting it replaces.",
    "Pro tip: the Send button is the blue one.",
    "Hemingway would have shipped this by now.",
    "Your draft has outlived several browser tabs.",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// CSS selectors describing the host markup. Matching is structural only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub trigger: String,
    pub surface: String,
    pub completion: String,
    pub discard: String,
    pub close: String,
    pub anchor: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            trigger: r#"[role="button"][gh="cm"]"#.to_string(),
            surface: r#"[role="dialog"]"#.to_string(),
            completion: r#"[role="button"][data-tooltip*="Send"]"#.to_string(),
            discard: r#"[role="button"][aria-label="Discard draft"]"#.to_string(),
            close: r#"[role="button"][aria-label="Close"]"#.to_string(),
            anchor: r#"[aria-label="New Message"]"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub tick_interval_ms: u64,
    pub first_taunt_delay_secs: u64,
    pub taunt_repeat_secs: u64,
    pub taunts: Vec<String>,
    pub marker_attribute: String,
    /// Most recent `DomPatch` entries a `PageDocument` keeps; 0 disables the log.
    pub patch_log_limit: usize,
    pub selectors: SelectorConfig,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            first_taunt_delay_secs: DEFAULT_FIRST_DELAY_SECS,
            taunt_repeat_secs: DEFAULT_REPEAT_INTERVAL_SECS,
            taunts: DEFAULT_TAUNTS.iter().map(|s| s.to_string()).collect(),
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            patch_log_limit: DEFAULT_PATCH_LOG_LIMIT,
            selectors: SelectorConfig::default(),
        }
    }
}

impl AugmentConfig {
    /// Load from `config_path`, falling back to defaults when no file exists.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.first_taunt_delay_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "first_taunt_delay_secs",
                reason: "must be greater than zero",
            });
        }
        if self.taunts.is_empty() {
            return Err(ConfigError::Invalid {
                field: "taunts",
                reason: "at least one message is required",
            });
        }
        if !self.marker_attribute.starts_with("data-") || self.marker_attribute.len() <= 5 {
            return Err(ConfigError::Invalid {
                field: "marker_attribute",
                reason: "must be a non-empty data-* attribute name",
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// `COMPOSE_TIMER_CONFIG` if set, else `config.yaml` in the platform config dir.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    ProjectDirs::from("dev", "ComposeTimer", "compose-timer")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}
