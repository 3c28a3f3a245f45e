//! Configuration for the gaze sequencer.

use crate::core::features::CombineConfig;
use crate::core::schema::Passthrough;
use crate::core::transforms::Transform;
use crate::core::windowing::WindowConfig;
use crate::export::ConllConfig;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Windowing stage
    #[serde(default)]
    pub window: WindowConfig,

    /// Feature combination stage
    #[serde(default)]
    pub combine: CombineConfig,

    /// CoNLL line export
    #[serde(default)]
    pub export: ConllConfig,

    /// Default directory for outputs
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Where run statistics accumulate across runs
    #[serde(default = "default_stats_path")]
    pub stats_path: PathBuf,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gaze-sequencer")
}

fn default_output_path() -> PathBuf {
    data_dir().join("outputs")
}

fn default_stats_path() -> PathBuf {
    data_dir().join("run_stats.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            combine: CombineConfig::default(),
            export: ConllConfig::default(),
            output_path: default_output_path(),
            stats_path: default_stats_path(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gaze-sequencer")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_path)?;
        if let Some(parent) = self.stats_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Stage settings for a [`crate::Pipeline`].
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            window: self.window.clone(),
            combine: self.combine.clone(),
        }
    }
}

/// Parse a comma-separated transform list; `all` selects every transform.
pub fn parse_transforms(s: &str) -> Result<Vec<Transform>, ConfigError> {
    if s.trim().eq_ignore_ascii_case("all") {
        return Ok(Transform::ALL.to_vec());
    }
    split_csv(s)
        .map(|name| name.parse::<Transform>().map_err(ConfigError::Invalid))
        .collect()
}

/// Parse a comma-separated passthrough list; `all` selects every column.
pub fn parse_passthroughs(s: &str) -> Result<Vec<Passthrough>, ConfigError> {
    if s.trim().eq_ignore_ascii_case("all") {
        return Ok(Passthrough::ALL.to_vec());
    }
    split_csv(s)
        .map(|name| name.parse::<Passthrough>().map_err(ConfigError::Invalid))
        .collect()
}

fn split_csv(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|part| !part.is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid value: {0}")]
    Invalid(String),
}
