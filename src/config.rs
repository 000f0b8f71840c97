use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::SchedulerError;
use crate::travis::DiscoveryShape;

/// Configuration of a nightly run.
///
/// Every field has a compiled-in default, so the scheduler runs without any
/// configuration file. A file only needs to list what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Hosts and owners to process, in order
    #[serde(default = "default_targets")]
    pub targets: Vec<Target>,

    /// Delay after each repository, in seconds
    #[serde(default = "default_pacing_secs")]
    pub pacing_secs: u64,

    /// Failure ratio at which an owner pass is rejected
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,

    /// Connect and read deadline for every HTTP call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// One (endpoint, owner) pair to schedule builds for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Target {
    /// Travis API base URL
    pub endpoint: String,

    /// Account or organisation name on GitHub
    pub owner: String,

    /// Response shape of the repository listing on this host
    #[serde(default = "default_discovery")]
    pub discovery: DiscoveryShape,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            pacing_secs: default_pacing_secs(),
            failure_threshold: default_failure_threshold(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_targets() -> Vec<Target> {
    vec![
        Target {
            endpoint: "https://api.travis-ci.com".to_string(),
            owner: "SonarSource".to_string(),
            discovery: DiscoveryShape::V3,
        },
        Target {
            endpoint: "https://api.travis-ci.org".to_string(),
            owner: "SonarSource".to_string(),
            discovery: DiscoveryShape::Legacy,
        },
    ]
}

fn default_discovery() -> DiscoveryShape {
    DiscoveryShape::V3
}

fn default_pacing_secs() -> u64 {
    15
}

fn default_failure_threshold() -> f64 {
    0.3
}

fn default_timeout_secs() -> u64 {
    90
}

impl Config {
    /// Load configuration from `path`, or use the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => {
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
            }
            "json" => {
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents)
                    .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
            }
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    fn validate(&self) -> std::result::Result<(), SchedulerError> {
        if self.targets.is_empty() {
            return Err(SchedulerError::Config("No targets configured".into()));
        }
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err(SchedulerError::Config(format!(
                "Failure threshold must be in (0, 1], got {}",
                self.failure_threshold
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SchedulerError::Config("Timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
