//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Implements deterministic second-order boosting on squared error with
//! row and column subsampling, L2-regularized leaves and early stopping
//! on a held-out validation set.

use carbon_ai_core::gbdt::Model;
use carbon_ai_core::metrics::rmse;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cart::{CartBuilder, TreeConfig};
use crate::dataset::Dataset;
use crate::deterministic::LcgRng;
use crate::errors::TrainerError;

/// Deepest tree the trainer will grow
pub const MAX_TREE_DEPTH: usize = 32;

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled for each tree
    pub subsample: f64,
    /// Fraction of columns sampled for each tree
    pub colsample_bytree: f64,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
    pub gamma: f64,
    /// Stop when validation RMSE has not improved for this many rounds
    pub early_stopping_rounds: Option<usize>,
    pub seed: i64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.1,
            subsample: 0.8,
            colsample_bytree: 0.8,
            min_samples_leaf: 1,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
            early_stopping_rounds: None,
            seed: 42,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), TrainerError> {
        let fail = |msg: String| Err(TrainerError::InvalidParams(msg));

        if self.n_estimators == 0 {
            return fail("n_estimators must be at least 1".into());
        }
        if self.max_depth == 0 || self.max_depth > MAX_TREE_DEPTH {
            return fail(format!(
                "max_depth must be in 1..={MAX_TREE_DEPTH}, got {}",
                self.max_depth
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return fail(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return fail(format!("subsample must be in (0, 1], got {}", self.subsample));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return fail(format!(
                "colsample_bytree must be in (0, 1], got {}",
                self.colsample_bytree
            ));
        }
        if self.min_samples_leaf == 0 {
            return fail("min_samples_leaf must be at least 1".into());
        }
        if !(self.min_child_weight >= 0.0 && self.lambda >= 0.0 && self.gamma >= 0.0) {
            return fail("min_child_weight, lambda and gamma must be non-negative".into());
        }
        if self.early_stopping_rounds == Some(0) {
            return fail("early_stopping_rounds must be at least 1".into());
        }

        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
            gamma: self.gamma,
        }
    }
}

/// Result of a training run
#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub model: Model,
    /// Number of trees kept in the final model
    pub best_iteration: usize,
    pub train_rmse_history: Vec<f64>,
    pub validation_rmse_history: Vec<f64>,
    /// Gain-based importance per feature, normalized to sum to 1
    pub feature_importance: Vec<f64>,
}

/// GBDT trainer
pub struct GbdtTrainer {
    params: TrainingParams,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Train a GBDT model, optionally early-stopping on `validation`
    pub fn train(
        &self,
        dataset: &Dataset,
        validation: Option<&Dataset>,
    ) -> Result<TrainingOutcome, TrainerError> {
        self.params.validate()?;

        if dataset.is_empty() {
            return Err(TrainerError::Dataset("training set is empty".into()));
        }
        if let Some(valid) = validation {
            if valid.feature_count != dataset.feature_count {
                return Err(TrainerError::Dataset(format!(
                    "validation set has {} features, training set has {}",
                    valid.feature_count, dataset.feature_count
                )));
            }
            if valid.is_empty() {
                return Err(TrainerError::Dataset("validation set is empty".into()));
            }
        }

        let n_samples = dataset.len();
        let feature_count = dataset.feature_count;
        let params = &self.params;

        info!(
            samples = n_samples,
            features = feature_count,
            n_estimators = params.n_estimators,
            max_depth = params.max_depth,
            "starting gbdt training"
        );

        let base_score = self.calculate_bias(&dataset.targets);
        let mut predictions = vec![base_score; n_samples];
        let mut valid_predictions =
            validation.map(|v| vec![base_score; v.len()]).unwrap_or_default();

        let row_count = sample_size(n_samples, params.subsample);
        let column_count = sample_size(feature_count, params.colsample_bytree);

        let mut rng = LcgRng::new(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut tree_gains = Vec::with_capacity(params.n_estimators);
        let mut train_history = Vec::with_capacity(params.n_estimators);
        let mut valid_history = Vec::new();
        let mut best: Option<(usize, f64)> = None;

        for tree_idx in 0..params.n_estimators {
            let (gradients, hessians) =
                self.calculate_gradients_hessians(&dataset.targets, &predictions);

            let rows = rng.sample_indices(n_samples, row_count);
            let columns = rng.sample_indices(feature_count, column_count);

            let builder =
                CartBuilder::new(&dataset.features, &gradients, &hessians, params.tree_config());
            let built = builder.build(&rows, &columns, params.learning_rate);

            for (pred, row) in predictions.iter_mut().zip(&dataset.features) {
                *pred += built.tree.weight * built.tree.evaluate(row);
            }
            let train_rmse = rmse(&dataset.targets, &predictions);
            train_history.push(train_rmse);

            trees.push(built.tree);
            tree_gains.push(built.feature_gain);

            let Some(valid) = validation else {
                debug!(tree = tree_idx + 1, train_rmse, "tree built");
                continue;
            };

            let tree = &trees[tree_idx];
            for (pred, row) in valid_predictions.iter_mut().zip(&valid.features) {
                *pred += tree.weight * tree.evaluate(row);
            }
            let valid_rmse = rmse(&valid.targets, &valid_predictions);
            valid_history.push(valid_rmse);
            debug!(tree = tree_idx + 1, train_rmse, valid_rmse, "tree built");

            match best {
                Some((_, best_rmse)) if valid_rmse >= best_rmse => {}
                _ => best = Some((tree_idx, valid_rmse)),
            }

            if let (Some(rounds), Some((best_idx, _))) = (params.early_stopping_rounds, best) {
                if tree_idx - best_idx >= rounds {
                    info!(
                        stopped_at = tree_idx + 1,
                        best_iteration = best_idx + 1,
                        "early stopping"
                    );
                    break;
                }
            }
        }

        // Keep the ensemble at its best validation score
        let kept = match (params.early_stopping_rounds, best) {
            (Some(_), Some((best_idx, _))) => best_idx + 1,
            _ => trees.len(),
        };
        trees.truncate(kept);
        tree_gains.truncate(kept);

        let feature_importance = normalize_importance(&tree_gains, feature_count);
        let model = Model::new(trees, base_score, feature_count);
        model
            .validate()
            .map_err(|e| TrainerError::Training(e.to_string()))?;

        info!(
            trees = model.num_trees(),
            base_score,
            "gbdt training complete"
        );

        Ok(TrainingOutcome {
            model,
            best_iteration: kept,
            train_rmse_history: train_history,
            validation_rmse_history: valid_history,
            feature_importance,
        })
    }

    /// Calculate initial bias (mean of targets)
    fn calculate_bias(&self, targets: &[f64]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }

        targets.iter().sum::<f64>() / targets.len() as f64
    }

    /// Calculate gradients and hessians for regression (MSE loss)
    /// gradient = prediction - target
    /// hessian = 1 (constant for MSE)
    fn calculate_gradients_hessians(
        &self,
        targets: &[f64],
        predictions: &[f64],
    ) -> (Vec<f64>, Vec<f64>) {
        let gradients = predictions
            .iter()
            .zip(targets)
            .map(|(p, t)| p - t)
            .collect();
        let hessians = vec![1.0; targets.len()];

        (gradients, hessians)
    }
}

fn sample_size(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).round() as usize).clamp(1, n.max(1))
}

fn normalize_importance(tree_gains: &[Vec<f64>], feature_count: usize) -> Vec<f64> {
    let mut totals = vec![0.0; feature_count];
    for gains in tree_gains {
        for (total, gain) in totals.iter_mut().zip(gains) {
            *total += gain;
        }
    }

    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        for total in &mut totals {
            *total /= sum;
        }
    }
    totals
}
