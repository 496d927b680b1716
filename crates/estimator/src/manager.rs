//! Model lifecycle management
//!
//! Owns the two learned correction models and drives them through
//! construct → train or load → estimate → save. Both models move together:
//! training installs both artifacts or neither, and loading validates the
//! whole bundle before anything is replaced.

use carbon_ai_core::metrics::RegressionMetrics;
use carbon_ai_core::serde_canon::{hash_canonical_hex, to_canonical_json_pretty};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::allometric::allometric_biomass;
use crate::blending::blend;
use crate::config::EstimatorConfig;
use crate::errors::{EstimationError, Result};
use crate::learned::{LabelledRecord, LearnedModel, TrainedModelArtifact, TrainingReport};
use crate::output::{AnalysisReport, AnalysisResults, BatchEstimate, ModelInfo, ModelStatus};
use crate::recommend::recommend;
use crate::records::read_labelled_csv;
use crate::resolver::{resolve, resolve_request, ResolvedFeatures};
use crate::synthetic;
use crate::types::{CalculationRequest, EstimationResult, ModelKind, Recommendation};

/// Bundle file written by [`ModelLifecycleManager::save`]
pub const BUNDLE_FILE: &str = "carbon_models.json";
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Hashed portion of a bundle
#[derive(Serialize)]
struct BundleBody<'a> {
    biomass: &'a TrainedModelArtifact,
    sequestration: &'a TrainedModelArtifact,
}

#[derive(Serialize, Deserialize)]
struct PersistedBundle {
    format_version: u32,
    bundle_hash: String,
    biomass: TrainedModelArtifact,
    sequestration: TrainedModelArtifact,
}

fn bundle_hash(
    biomass: &TrainedModelArtifact,
    sequestration: &TrainedModelArtifact,
) -> Result<String> {
    hash_canonical_hex(&BundleBody {
        biomass,
        sequestration,
    })
    .map_err(|e| EstimationError::CorruptArtifact(format!("cannot hash bundle: {e}")))
}

pub fn bundle_path(dir: &Path) -> PathBuf {
    dir.join(BUNDLE_FILE)
}

/// Owner of both learned models and entry point for estimation
#[derive(Debug, Clone)]
pub struct ModelLifecycleManager {
    config: EstimatorConfig,
    biomass: LearnedModel,
    sequestration: LearnedModel,
}

impl ModelLifecycleManager {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            biomass: LearnedModel::new(ModelKind::Biomass),
            sequestration: LearnedModel::new(ModelKind::Sequestration),
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn model(&self, kind: ModelKind) -> &LearnedModel {
        match kind {
            ModelKind::Biomass => &self.biomass,
            ModelKind::Sequestration => &self.sequestration,
        }
    }

    /// True once both models hold an artifact
    pub fn is_trained(&self) -> bool {
        self.biomass.is_trained() && self.sequestration.is_trained()
    }

    /// Train both models on seeded synthetic data
    #[instrument(skip(self))]
    pub fn train_all(&mut self) -> Result<BTreeMap<ModelKind, TrainingReport>> {
        self.train_from_files(None, None)
    }

    /// Train both models from labelled CSV files.
    ///
    /// A model without a file falls back to synthetic data.
    #[instrument(skip_all)]
    pub fn train_from_files(
        &mut self,
        biomass: Option<&Path>,
        sequestration: Option<&Path>,
    ) -> Result<BTreeMap<ModelKind, TrainingReport>> {
        let biomass = self.training_records(ModelKind::Biomass, biomass)?;
        let sequestration = self.training_records(ModelKind::Sequestration, sequestration)?;
        self.train_all_with(&biomass, &sequestration)
    }

    fn training_records(
        &self,
        kind: ModelKind,
        path: Option<&Path>,
    ) -> Result<Vec<LabelledRecord>> {
        let training = &self.config.training;
        match path {
            Some(path) => {
                let records = read_labelled_csv(path)?;
                info!(
                    model = %kind,
                    path = %path.display(),
                    rows = records.len(),
                    "loaded training data"
                );
                Ok(records)
            }
            None => Ok(match kind {
                ModelKind::Biomass => {
                    synthetic::biomass_records(training.biomass_samples, training.seed)
                }
                ModelKind::Sequestration => {
                    synthetic::sequestration_records(training.sequestration_samples, training.seed)
                }
            }),
        }
    }

    /// Train both models on caller-supplied records.
    ///
    /// Nothing is installed unless both fits succeed.
    #[instrument(skip_all, fields(biomass = biomass.len(), sequestration = sequestration.len()))]
    pub fn train_all_with(
        &mut self,
        biomass: &[LabelledRecord],
        sequestration: &[LabelledRecord],
    ) -> Result<BTreeMap<ModelKind, TrainingReport>> {
        let training = &self.config.training;
        let mut reports = BTreeMap::new();

        let mut next_biomass = LearnedModel::new(ModelKind::Biomass);
        let report = next_biomass.train(
            biomass,
            training.params(ModelKind::Biomass),
            training.validation_fraction,
        )?;
        reports.insert(ModelKind::Biomass, report);

        let mut next_sequestration = LearnedModel::new(ModelKind::Sequestration);
        let report = next_sequestration.train(
            sequestration,
            training.params(ModelKind::Sequestration),
            training.validation_fraction,
        )?;
        reports.insert(ModelKind::Sequestration, report);

        self.biomass = next_biomass;
        self.sequestration = next_sequestration;
        info!("all models trained");

        Ok(reports)
    }

    /// Persist both artifacts as one bundle in `dir`.
    ///
    /// The bundle is written to a temporary file and renamed into place.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let biomass = self
            .biomass
            .artifact()
            .ok_or(EstimationError::NotTrained {
                model: ModelKind::Biomass,
            })?;
        let sequestration = self
            .sequestration
            .artifact()
            .ok_or(EstimationError::NotTrained {
                model: ModelKind::Sequestration,
            })?;

        let bundle = PersistedBundle {
            format_version: BUNDLE_FORMAT_VERSION,
            bundle_hash: bundle_hash(biomass, sequestration)?,
            biomass: biomass.clone(),
            sequestration: sequestration.clone(),
        };
        let json = to_canonical_json_pretty(&bundle)
            .map_err(|e| EstimationError::CorruptArtifact(format!("cannot encode bundle: {e}")))?;

        std::fs::create_dir_all(dir)?;
        let path = bundle_path(dir);
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| EstimationError::Io(e.error))?;

        info!(path = %path.display(), hash = %bundle.bundle_hash, "model bundle saved");
        Ok(path)
    }

    /// Restore both artifacts from the bundle in `dir`.
    ///
    /// The current state is kept if any check fails.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        let path = bundle_path(dir);
        let content = std::fs::read_to_string(&path)?;

        let bundle: PersistedBundle = serde_json::from_str(&content).map_err(|e| {
            EstimationError::CorruptArtifact(format!("cannot parse {}: {e}", path.display()))
        })?;

        if bundle.format_version != BUNDLE_FORMAT_VERSION {
            return Err(EstimationError::CorruptArtifact(format!(
                "unsupported bundle format version {}",
                bundle.format_version
            )));
        }

        let expected = bundle_hash(&bundle.biomass, &bundle.sequestration)?;
        if expected != bundle.bundle_hash {
            return Err(EstimationError::CorruptArtifact(format!(
                "bundle hash mismatch: recorded {}, computed {expected}",
                bundle.bundle_hash
            )));
        }

        let mut next_biomass = LearnedModel::new(ModelKind::Biomass);
        next_biomass.install(bundle.biomass)?;
        let mut next_sequestration = LearnedModel::new(ModelKind::Sequestration);
        next_sequestration.install(bundle.sequestration)?;

        self.biomass = next_biomass;
        self.sequestration = next_sequestration;
        info!(path = %path.display(), hash = %expected, "model bundle loaded");
        Ok(())
    }

    /// Load the bundle in `dir`, or train and save one if none exists.
    ///
    /// Returns true when training was needed. A corrupt bundle is an error.
    pub fn load_or_train(&mut self, dir: &Path) -> Result<bool> {
        if bundle_path(dir).exists() {
            self.load(dir)?;
            return Ok(false);
        }
        warn!(dir = %dir.display(), "no model bundle found, training new models");
        self.train_all()?;
        self.save(dir)?;
        Ok(true)
    }

    /// Estimate biomass, carbon and sequestration from partial records
    pub fn estimate(
        &self,
        tree: &Map<String, Value>,
        environmental: &Map<String, Value>,
        ecosystem: &Map<String, Value>,
    ) -> Result<EstimationResult> {
        let features = resolve(tree, environmental, ecosystem, None)?;
        self.estimate_resolved(&features)
    }

    /// Estimate for a full request, honouring its area override
    pub fn estimate_request(&self, request: &CalculationRequest) -> Result<EstimationResult> {
        let features = resolve_request(request)?;
        self.estimate_resolved(&features)
    }

    pub fn estimate_resolved(&self, features: &ResolvedFeatures) -> Result<EstimationResult> {
        let allometric = allometric_biomass(&features.tree, &features.ecosystem);
        let input = features.feature_input();
        let learned_biomass = self.biomass.predict(&input)?;
        let sequestration = self.sequestration.predict(&input)?;

        debug!(
            species = %features.tree.species,
            allometric,
            learned_biomass,
            sequestration,
            "component estimates"
        );

        blend(
            allometric,
            learned_biomass,
            sequestration,
            features.ecosystem.area_hectares,
        )
    }

    /// Estimate every request, stopping at the first failure
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub fn estimate_batch(&self, requests: &[CalculationRequest]) -> Result<BatchEstimate> {
        let results = requests
            .iter()
            .map(|request| self.estimate_request(request))
            .collect::<Result<Vec<_>>>()?;
        let batch = BatchEstimate::new(&results);
        info!(
            samples = batch.summary.total_samples,
            total_carbon_kg = batch.summary.total_carbon_kg,
            "batch estimate complete"
        );
        Ok(batch)
    }

    /// Score one learned model against labelled records
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn evaluate(
        &self,
        kind: ModelKind,
        records: &[LabelledRecord],
    ) -> Result<RegressionMetrics> {
        if records.is_empty() {
            return Err(EstimationError::invalid_field(
                "records",
                format!("no labelled records to evaluate the {kind} model"),
            ));
        }

        let model = self.model(kind);
        let predictions = records
            .iter()
            .map(|record| model.predict(&record.features))
            .collect::<Result<Vec<_>>>()?;
        let targets: Vec<f64> = records.iter().map(|record| record.target).collect();

        let metrics = RegressionMetrics::compute(&targets, &predictions).rounded();
        info!(model = %kind, rmse = metrics.rmse, r2 = metrics.r2, "evaluation complete");
        Ok(metrics)
    }

    pub fn recommend(&self, result: &EstimationResult) -> Vec<Recommendation> {
        recommend(result)
    }

    /// Estimate and recommend in one pass
    #[instrument(skip_all)]
    pub fn analyze(&self, request: &CalculationRequest) -> Result<AnalysisReport> {
        let result = self.estimate_request(request)?;
        let recommendations = self.recommend(&result);
        info!(
            biomass_kg = result.biomass_kg,
            carbon_kg = result.carbon_content_kg,
            recommendations = recommendations.len(),
            "analysis complete"
        );
        Ok(AnalysisReport {
            results: AnalysisResults::from(&result),
            recommendations,
        })
    }

    pub fn model_info(&self) -> ModelInfo {
        let models = ModelKind::ALL
            .into_iter()
            .map(|kind| {
                let model = self.model(kind);
                let status = match model.artifact() {
                    Some(artifact) => ModelStatus {
                        is_trained: true,
                        feature_names: artifact.feature_names.clone(),
                        n_trees: Some(artifact.ensemble.num_trees()),
                        ensemble_hash: artifact.ensemble.hash_hex().ok(),
                        trained_at: Some(artifact.trained_at.to_rfc3339()),
                    },
                    None => ModelStatus {
                        is_trained: false,
                        feature_names: kind.feature_names().iter().map(|s| s.to_string()).collect(),
                        n_trees: None,
                        ensemble_hash: None,
                        trained_at: None,
                    },
                };
                (kind, status)
            })
            .collect();

        ModelInfo {
            version: crate::VERSION.to_string(),
            models,
        }
    }
}
