//! Training dataset
//!
//! Holds a dense numeric feature matrix with one regression target per row
//! and provides deterministic train/validation splitting.

use crate::deterministic::LcgRng;
use crate::errors::TrainerError;

/// Training dataset with numeric features and targets
#[derive(Clone, Debug)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub feature_count: usize,
}

impl Dataset {
    /// Build a dataset from an in-memory matrix
    pub fn new(
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        targets: Vec<f64>,
    ) -> Result<Self, TrainerError> {
        if features.len() != targets.len() {
            return Err(TrainerError::Dataset(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }

        let feature_count = feature_names.len();
        for (i, row) in features.iter().enumerate() {
            if row.len() != feature_count {
                return Err(TrainerError::Dataset(format!(
                    "row {}: expected {} features, got {}",
                    i,
                    feature_count,
                    row.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(TrainerError::Dataset(format!(
                    "row {i}: non-finite feature value"
                )));
            }
        }
        if let Some(i) = targets.iter().position(|t| !t.is_finite()) {
            return Err(TrainerError::Dataset(format!("row {i}: non-finite target")));
        }

        Ok(Self {
            feature_names,
            features,
            targets,
            feature_count,
        })
    }

    /// Split into (train, test) with `ceil(n * test_fraction)` test rows
    pub fn train_test_split(
        &self,
        test_fraction: f64,
        seed: i64,
    ) -> Result<(Dataset, Dataset), TrainerError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(TrainerError::InvalidParams(format!(
                "test fraction must be in (0, 1), got {test_fraction}"
            )));
        }

        let n = self.len();
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(TrainerError::Dataset(format!(
                "cannot split {n} samples with test fraction {test_fraction}"
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        LcgRng::new(seed).shuffle(&mut order);

        let (test_idx, train_idx) = order.split_at(n_test);
        Ok((self.subset(train_idx), self.subset(test_idx)))
    }

    /// Rows selected by index, in the given order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            feature_count: self.feature_count,
        }
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_test_split_sizes() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| i as f64 * 2.0).collect();
        let dataset = Dataset::new(vec!["x".into()], features, targets).unwrap();

        let (train, test) = dataset.train_test_split(0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        // Rows stay paired with their targets
        for (row, target) in train.features.iter().zip(&train.targets) {
            assert_eq!(row[0] * 2.0, *target);
        }

        let (train2, test2) = dataset.train_test_split(0.2, 42).unwrap();
        assert_eq!(train.features, train2.features);
        assert_eq!(test.features, test2.features);
    }

    #[test]
    fn test_split_rejects_degenerate_input() {
        let dataset = Dataset::new(vec!["x".into()], vec![vec![1.0]], vec![1.0]).unwrap();
        assert!(dataset.train_test_split(0.2, 42).is_err());
        assert!(dataset.train_test_split(1.5, 42).is_err());
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let err = Dataset::new(vec!["x".into()], vec![vec![f64::NAN]], vec![1.0]);
        assert!(err.is_err());
    }


    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = Dataset::new(
            vec!["dbh".into(), "tree_height".into()],
            vec![vec![25.0, 12.0], vec![10.5]],
            vec![310.5, 40.25],
        );
        assert!(matches!(err, Err(TrainerError::Dataset(_))));

        let err = Dataset::new(vec!["x".into()], vec![vec![1.0]], vec![]);
        assert!(err.is_err());
    }
}
