//! TOML configuration for the prediction pipeline.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{FingerprintParams, InvalidMoleculePolicy, DEFAULT_MODEL_NAME, DEFAULT_OUTPUT_FILE};

/// Root configuration. Every section and field is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub fingerprint: FingerprintParams,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fingerprint.size == 0 {
            bail!("fingerprint.size must be positive");
        }
        if self.pipeline.histogram_bins == 0 {
            bail!("pipeline.histogram_bins must be positive");
        }
        if self.artifacts.model_name.is_empty() {
            bail!("artifacts.model_name must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory holding `<model_name>.json`.
    pub models_dir: PathBuf,
    pub model_name: String,
    /// Training table whose header lists the reduced feature columns.
    pub schema_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            schema_path: PathBuf::from("datasets/reduced_fingerprints.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub on_invalid_molecule: InvalidMoleculePolicy,
    pub output_path: PathBuf,
    pub preview_rows: usize,
    pub histogram_bins: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_invalid_molecule: InvalidMoleculePolicy::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            preview_rows: 5,
            histogram_bins: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.artifacts.models_dir, PathBuf::from("models"));
        assert_eq!(config.artifacts.model_name, "fine_tuned_model");
        assert_eq!(config.fingerprint, FingerprintParams { radius: 2, size: 1024 });
        assert_eq!(config.pipeline.on_invalid_molecule, InvalidMoleculePolicy::ZeroFill);
        assert_eq!(config.pipeline.output_path, PathBuf::from("predicoes.csv"));
        assert_eq!(config.pipeline.preview_rows, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_str(
            r#"
            [artifacts]
            models_dir = "/opt/models"

            [fingerprint]
            radius = 3

            [pipeline]
            on_invalid_molecule = "reject"
            histogram_bins = 4

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.artifacts.models_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.artifacts.model_name, "fine_tuned_model");
        assert_eq!(config.fingerprint.radius, 3);
        assert_eq!(config.fingerprint.size, 1024);
        assert_eq!(config.pipeline.on_invalid_molecule, InvalidMoleculePolicy::Reject);
        assert_eq!(config.pipeline.histogram_bins, 4);
        assert_eq!(config.pipeline.preview_rows, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_str("[pipeline]\nhistogram_bins = 0\n").is_err());
        assert!(Config::from_str("[fingerprint]\nsize = 0\n").is_err());
        assert!(Config::from_str("[pipeline]\non_invalid_molecule = \"ignore\"\n").is_err());
        assert!(Config::from_str("[pipeline\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bioactivity.toml");
        std::fs::write(&path, "[artifacts]\nmodel_name = \"other\"\n").unwrap();
        assert_eq!(Config::from_file(&path).unwrap().artifacts.model_name, "other");
        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }
}
