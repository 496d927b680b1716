//! Learned correction models
//!
//! Each [`LearnedModel`] owns a gradient-boosted ensemble together with the
//! scaler, categorical encoders and ordered feature names it was trained
//! with. The feature-name list is authoritative: prediction builds its
//! input vector in exactly that order.

use carbon_ai_core::gbdt::Model;
use carbon_ai_core::metrics::RegressionMetrics;
use carbon_ai_core::{FeatureSchema, LabelEncoder, StandardScaler, UNKNOWN_CATEGORY_INDEX};
use carbon_ai_trainer::{Dataset, GbdtTrainer, TrainingParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::errors::{EstimationError, Result};
use crate::resolver::FeatureInput;
use crate::types::ModelKind;

pub const BIOMASS_FEATURES: [&str; 11] = [
    "dbh",
    "tree_height",
    "species_encoded",
    "crown_diameter",
    "wood_density",
    "bark_thickness",
    "tree_age",
    "site_index",
    "competition_index",
    "soil_fertility",
    "climate_zone_encoded",
];

pub const SEQUESTRATION_FEATURES: [&str; 17] = [
    "tree_age",
    "tree_height",
    "dbh",
    "species_encoded",
    "soil_ph",
    "soil_organic_matter",
    "precipitation",
    "temperature",
    "humidity",
    "elevation",
    "slope",
    "aspect",
    "distance_to_water",
    "canopy_density",
    "leaf_area_index",
    "ndvi",
    "tree_count_per_hectare",
];

/// Encoded schema column and the categorical field it is derived from
pub const CATEGORICAL_COLUMNS: [(&str, &str); 2] = [
    ("species_encoded", "species"),
    ("climate_zone_encoded", "climate_zone"),
];

impl ModelKind {
    /// Ordered feature names the model is trained and queried with
    pub fn feature_names(&self) -> &'static [&'static str] {
        match self {
            ModelKind::Biomass => &BIOMASS_FEATURES,
            ModelKind::Sequestration => &SEQUESTRATION_FEATURES,
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.feature_names().iter().copied())
    }

    /// Boosting parameters used when no configuration overrides them
    pub fn default_params(&self) -> TrainingParams {
        let (n_estimators, max_depth) = match self {
            ModelKind::Biomass => (800, 6),
            ModelKind::Sequestration => (1000, 8),
        };
        TrainingParams {
            n_estimators,
            max_depth,
            learning_rate: 0.1,
            subsample: 0.8,
            colsample_bytree: 0.8,
            early_stopping_rounds: Some(50),
            seed: 42,
            ..TrainingParams::default()
        }
    }
}

fn categorical_source(column: &str) -> Option<&'static str> {
    CATEGORICAL_COLUMNS
        .iter()
        .find(|(encoded, _)| *encoded == column)
        .map(|(_, source)| *source)
}

/// One training example
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledRecord {
    pub features: FeatureInput,
    pub target: f64,
}

/// Held-out evaluation of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub status: String,
    /// RMSE and MAE rounded to 2 dp, R² to 4 dp
    pub metrics: RegressionMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub best_iteration: usize,
    pub n_trees: usize,
}

/// Everything needed to reproduce a model's predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelArtifact {
    pub kind: ModelKind,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    /// Keyed by categorical field name (`species`, `climate_zone`)
    pub encoders: BTreeMap<String, LabelEncoder>,
    pub ensemble: Model,
    pub report: TrainingReport,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModelArtifact {
    /// Check the bundle is complete and matches its kind's schema
    pub fn validate(&self) -> std::result::Result<(), String> {
        let schema = self.kind.schema();
        if !schema.matches(&self.feature_names) {
            return Err(format!(
                "{} artifact feature names {:?} do not match the expected schema",
                self.kind, self.feature_names
            ));
        }

        if self.scaler.width() != schema.len() {
            return Err(format!(
                "{} scaler has width {}, expected {}",
                self.kind,
                self.scaler.width(),
                schema.len()
            ));
        }
        self.scaler
            .validate()
            .map_err(|e| format!("{} scaler: {e}", self.kind))?;

        for name in &self.feature_names {
            if let Some(source) = categorical_source(name) {
                let encoder = self
                    .encoders
                    .get(source)
                    .ok_or_else(|| format!("{} artifact has no encoder for {source}", self.kind))?;
                encoder
                    .validate()
                    .map_err(|e| format!("{} encoder for {source}: {e}", self.kind))?;
            }
        }

        if self.ensemble.feature_count != schema.len() {
            return Err(format!(
                "{} ensemble expects {} features, schema has {}",
                self.kind,
                self.ensemble.feature_count,
                schema.len()
            ));
        }
        self.ensemble
            .validate()
            .map_err(|e| format!("{} ensemble: {e}", self.kind))?;

        Ok(())
    }

    /// Build the unscaled input row in schema order.
    ///
    /// Features absent from `input` become 0.0 and missing categorical
    /// values use the unknown code.
    pub fn vectorize(&self, input: &FeatureInput) -> Vec<f64> {
        vectorize(&self.feature_names, &self.encoders, input)
    }
}

fn vectorize(
    feature_names: &[String],
    encoders: &BTreeMap<String, LabelEncoder>,
    input: &FeatureInput,
) -> Vec<f64> {
    feature_names
        .iter()
        .map(|name| match categorical_source(name) {
            Some(source) => {
                let code = match (input.categorical(source), encoders.get(source)) {
                    (Some(value), Some(encoder)) => encoder.encode(value),
                    _ => UNKNOWN_CATEGORY_INDEX,
                };
                code as f64
            }
            None => input.numeric(name).unwrap_or(0.0),
        })
        .collect()
}

/// A learned regressor for one target
#[derive(Debug, Clone)]
pub struct LearnedModel {
    kind: ModelKind,
    artifact: Option<TrainedModelArtifact>,
}

impl LearnedModel {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            artifact: None,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_trained(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn artifact(&self) -> Option<&TrainedModelArtifact> {
        self.artifact.as_ref()
    }

    /// Fit encoders, scaler and ensemble on `records`.
    ///
    /// The scaler sees the training split only; the held-out split drives
    /// early stopping and the reported metrics. On failure the previously
    /// installed artifact is kept.
    pub fn train(
        &mut self,
        records: &[LabelledRecord],
        params: &TrainingParams,
        validation_fraction: f64,
    ) -> Result<TrainingReport> {
        let kind = self.kind;
        let failure = |cause: String| EstimationError::TrainingFailure { model: kind, cause };

        if records.is_empty() {
            return Err(failure("no training records".to_string()));
        }

        let feature_names: Vec<String> =
            kind.feature_names().iter().map(|s| s.to_string()).collect();

        let mut encoders = BTreeMap::new();
        for name in &feature_names {
            if let Some(source) = categorical_source(name) {
                let values = records
                    .iter()
                    .filter_map(|r| r.features.categorical(source));
                let encoder = LabelEncoder::fit(values);
                if encoder.classes().is_empty() {
                    return Err(failure(format!("no values for categorical field {source}")));
                }
                debug!(model = %kind, field = source, classes = ?encoder.classes(), "fitted encoder");
                encoders.insert(source.to_string(), encoder);
            }
        }

        let rows: Vec<Vec<f64>> = records
            .iter()
            .map(|r| vectorize(&feature_names, &encoders, &r.features))
            .collect();
        let targets: Vec<f64> = records.iter().map(|r| r.target).collect();

        let dataset = Dataset::new(feature_names.clone(), rows, targets)
            .map_err(|e| failure(e.to_string()))?;
        let (train_set, valid_set) = dataset
            .train_test_split(validation_fraction, params.seed)
            .map_err(|e| failure(e.to_string()))?;

        let scaler = StandardScaler::fit(&train_set.features).map_err(|e| failure(e.to_string()))?;
        let train_scaled = scaled(&train_set, &scaler).map_err(|e| failure(e.to_string()))?;
        let valid_scaled = scaled(&valid_set, &scaler).map_err(|e| failure(e.to_string()))?;

        info!(
            model = %kind,
            training_samples = train_scaled.len(),
            validation_samples = valid_scaled.len(),
            "training model"
        );

        let outcome = GbdtTrainer::new(params.clone())
            .train(&train_scaled, Some(&valid_scaled))
            .map_err(|e| failure(e.to_string()))?;

        let predictions = outcome.model.score_batch(&valid_scaled.features);
        let metrics = RegressionMetrics::compute(&valid_scaled.targets, &predictions).rounded();

        info!(
            model = %kind,
            rmse = metrics.rmse,
            mae = metrics.mae,
            r2 = metrics.r2,
            trees = outcome.model.num_trees(),
            "model trained"
        );

        let report = TrainingReport {
            status: "success".to_string(),
            metrics,
            feature_importance: feature_names
                .iter()
                .cloned()
                .zip(outcome.feature_importance.iter().copied())
                .collect(),
            training_samples: train_scaled.len(),
            validation_samples: valid_scaled.len(),
            best_iteration: outcome.best_iteration,
            n_trees: outcome.model.num_trees(),
        };

        self.artifact = Some(TrainedModelArtifact {
            kind,
            feature_names,
            scaler,
            encoders,
            ensemble: outcome.model,
            report: report.clone(),
            trained_at: Utc::now(),
        });

        Ok(report)
    }

    /// Predict the model's target for one input
    pub fn predict(&self, input: &FeatureInput) -> Result<f64> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or(EstimationError::NotTrained { model: self.kind })?;

        let row = artifact.vectorize(input);
        let scaled = artifact
            .scaler
            .transform(&row)
            .map_err(|e| EstimationError::CorruptArtifact(e.to_string()))?;

        Ok(artifact.ensemble.score(&scaled))
    }

    /// Replace the current state with a validated artifact
    pub(crate) fn install(&mut self, artifact: TrainedModelArtifact) -> Result<()> {
        if artifact.kind != self.kind {
            return Err(EstimationError::CorruptArtifact(format!(
                "expected a {} artifact, found {}",
                self.kind, artifact.kind
            )));
        }
        artifact.validate().map_err(EstimationError::CorruptArtifact)?;
        self.artifact = Some(artifact);
        Ok(())
    }
}

fn scaled(dataset: &Dataset, scaler: &StandardScaler) -> carbon_ai_core::Result<Dataset> {
    Ok(Dataset {
        feature_names: dataset.feature_names.clone(),
        features: scaler.transform_batch(&dataset.features)?,
        targets: dataset.targets.clone(),
        feature_count: dataset.feature_count,
    })
}
