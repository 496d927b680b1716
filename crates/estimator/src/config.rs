//! Estimator configuration
//!
//! Loaded from TOML; every section is optional. Environment variables
//! `CARBON_MODEL_DIR` and `CARBON_LOG_LEVEL` override the file.

use carbon_ai_trainer::TrainingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::{EstimationError, Result};
use crate::types::ModelKind;

pub const MODEL_DIR_ENV: &str = "CARBON_MODEL_DIR";
pub const LOG_LEVEL_ENV: &str = "CARBON_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EstimatorConfig {
    pub training: TrainingConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Training configuration
///
/// A `[training.biomass]` or `[training.sequestration]` table replaces
/// that model's defaults as a whole; keys it omits take the generic
/// trainer defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed for synthetic data generation
    pub seed: u64,
    /// Held-out fraction used for early stopping and metrics
    pub validation_fraction: f64,
    pub biomass_samples: usize,
    pub sequestration_samples: usize,
    #[serde(default = "biomass_params")]
    pub biomass: TrainingParams,
    #[serde(default = "sequestration_params")]
    pub sequestration: TrainingParams,
}

fn biomass_params() -> TrainingParams {
    ModelKind::Biomass.default_params()
}

fn sequestration_params() -> TrainingParams {
    ModelKind::Sequestration.default_params()
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            validation_fraction: 0.2,
            biomass_samples: 8000,
            sequestration_samples: 10000,
            biomass: biomass_params(),
            sequestration: sequestration_params(),
        }
    }
}

impl TrainingConfig {
    pub fn params(&self, kind: ModelKind) -> &TrainingParams {
        match kind {
            ModelKind::Biomass => &self.biomass,
            ModelKind::Sequestration => &self.sequestration,
        }
    }

    pub fn samples(&self, kind: ModelKind) -> usize {
        match kind {
            ModelKind::Biomass => self.biomass_samples,
            ModelKind::Sequestration => self.sequestration_samples,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the model bundle
    pub model_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EstimatorConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EstimationError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EstimationError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Apply `CARBON_MODEL_DIR` and `CARBON_LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(MODEL_DIR_ENV).filter(|v| !v.is_empty()) {
            self.storage.model_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if !(training.validation_fraction > 0.0 && training.validation_fraction < 1.0) {
            return Err(EstimationError::Config(format!(
                "training.validation_fraction must be in (0, 1), got {}",
                training.validation_fraction
            )));
        }

        for kind in ModelKind::ALL {
            if training.samples(kind) < 2 {
                return Err(EstimationError::Config(format!(
                    "training.{kind}_samples must be at least 2"
                )));
            }
            training
                .params(kind)
                .validate()
                .map_err(|e| EstimationError::Config(format!("training.{kind}: {e}")))?;
        }

        if self.storage.model_dir.as_os_str().is_empty() {
            return Err(EstimationError::Config(
                "storage.model_dir must not be empty".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            warn!("logging.level is empty, falling back to info");
        }

        Ok(())
    }
}
