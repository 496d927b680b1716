//! GBDT Model with deterministic inference
//!
//! Implements an additive regression-tree ensemble with:
//! - Canonical JSON serialization
//! - Blake3 model hashing
//! - Structural validation on load

use super::tree::Tree;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// GBDT Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Canonical serialization error: {0}")]
    CanonicalError(#[from] CanonicalError),
}

/// Current model format version
pub const MODEL_FORMAT_VERSION: i32 = 1;

/// Additive regression-tree ensemble
///
/// `score(x) = base_score + Σ tree.weight · tree.evaluate(x)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: i32,

    /// Number of input features the ensemble was trained on
    pub feature_count: usize,

    /// Initial prediction before any tree contributes
    pub base_score: f64,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,
}

impl Model {
    /// Create a new GBDT model
    pub fn new(trees: Vec<Tree>, base_score: f64, feature_count: usize) -> Self {
        Self {
            version: MODEL_FORMAT_VERSION,
            feature_count,
            base_score,
            trees,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.base_score.is_finite() {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid base score: {}",
                self.base_score
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;

            if let Some(max_idx) = tree.max_feature_index() {
                if max_idx >= self.feature_count {
                    return Err(ModelError::ValidationFailed(format!(
                        "Tree {} splits on feature {} but the model has {} features",
                        i, max_idx, self.feature_count
                    )));
                }
            }
        }

        Ok(())
    }

    /// Predict a single feature vector
    pub fn score(&self, features: &[f64]) -> f64 {
        self.score_first(features, self.trees.len())
    }

    /// Predict using only the first `n_trees` trees of the ensemble
    pub fn score_first(&self, features: &[f64], n_trees: usize) -> f64 {
        self.trees
            .iter()
            .take(n_trees)
            .fold(self.base_score, |sum, tree| {
                sum + tree.weight * tree.evaluate(features)
            })
    }

    /// Predict every row of a feature matrix
    pub fn score_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.score(row)).collect()
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Compute Blake3 hash of canonical JSON representation
    pub fn hash(&self) -> Result<[u8; 32], ModelError> {
        let json = self.to_canonical_json()?;
        let hash = blake3::hash(json.as_bytes());
        Ok(*hash.as_bytes())
    }

    /// Compute model hash as hex string
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    /// Save model to JSON file with canonical serialization
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let json = self.to_canonical_json()?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load model from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: Model = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }

    /// Get number of trees in the model
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Compute model hash as hex string (convenience function)
pub fn model_hash_hex(model: &Model) -> String {
    model.hash_hex().unwrap_or_else(|_| String::from("error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> Model {
        let tree1 = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );

        let tree2 = Tree::new(
            vec![
                Node::internal(0, 1, 30.0, 1, 2),
                Node::leaf(1, -50.0),
                Node::leaf(2, 50.0),
            ],
            0.5,
        );

        Model::new(vec![tree1, tree2], 10.0, 2)
    }

    #[test]
    fn test_model_creation() {
        let model = create_test_model();
        assert_eq!(model.version, MODEL_FORMAT_VERSION);
        assert_eq!(model.num_trees(), 2);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_model_inference() {
        let model = create_test_model();

        // Tree 1 goes left (100), tree 2 goes left (-50 * 0.5)
        assert_eq!(model.score(&[30.0, 20.0]), 10.0 + 100.0 - 25.0);
        // Tree 1 goes right (200), tree 2 goes right (50 * 0.5)
        assert_eq!(model.score(&[60.0, 40.0]), 10.0 + 200.0 + 25.0);
    }

    #[test]
    fn test_score_first_truncates() {
        let model = create_test_model();
        assert_eq!(model.score_first(&[30.0, 20.0], 0), 10.0);
        assert_eq!(model.score_first(&[30.0, 20.0], 1), 110.0);
        assert_eq!(model.score_first(&[30.0, 20.0], 99), model.score(&[30.0, 20.0]));
    }

    #[test]
    fn test_canonical_json() {
        let model = create_test_model();
        let json = model.to_canonical_json().unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_object());
        assert!(json.contains("\"base_score\""));
        assert!(json.contains("\"trees\""));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_hash_changes_with_model() {
        let model1 = create_test_model();
        let mut model2 = create_test_model();
        model2.base_score = 11.0;

        let hash1 = model1.hash_hex().unwrap();
        assert_eq!(hash1, create_test_model().hash_hex().unwrap());
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, model2.hash_hex().unwrap());
    }

    #[test]
    fn test_save_load_json() {
        use tempfile::NamedTempFile;

        let model = create_test_model();
        let temp_file = NamedTempFile::new().unwrap();

        model.save_json(temp_file.path()).unwrap();
        let loaded = Model::load_json(temp_file.path()).unwrap();

        assert_eq!(model, loaded);
        assert_eq!(model.hash_hex().unwrap(), loaded.hash_hex().unwrap());
    }

    #[test]
    fn test_model_validation() {
        let mut invalid = create_test_model();
        invalid.version = 999;
        assert!(invalid.validate().is_err());

        let mut narrow = create_test_model();
        narrow.feature_count = 1;
        assert!(narrow.validate().is_err());

        let mut nan_bias = create_test_model();
        nan_bias.base_score = f64::NAN;
        assert!(nan_bias.validate().is_err());
    }
}
