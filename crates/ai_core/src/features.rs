//! Feature schemas and preprocessing for regression models
//!
//! The fitted preprocessors here travel with a trained ensemble: the
//! schema fixes column order, the scaler standardises numeric columns and
//! the label encoders map categorical values to stable integer codes.
use crate::errors::{AiCoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Feature vector (one row, in schema order)
pub type FeatureVector = Vec<f64>;

/// Code returned by [`LabelEncoder::encode`] for categories not seen during fitting
pub const UNKNOWN_CATEGORY_INDEX: usize = 0;

/// Ordered list of feature names a model was trained on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature within the schema
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// True when `names` matches this schema exactly, including order
    pub fn matches(&self, names: &[String]) -> bool {
        self.names.as_slice() == names
    }
}

/// Standardises columns to zero mean and unit variance
///
/// Uses the population standard deviation. Columns with zero variance keep
/// a scale of 1 so they pass through centred but unscaled.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit column statistics on a row-major matrix
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = match rows.first() {
            Some(first) => first.len(),
            None => {
                return Err(AiCoreError::InvalidParameters(
                    "cannot fit a scaler on zero rows".to_string(),
                ))
            }
        };

        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            if row.len() != width {
                return Err(AiCoreError::DimensionMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, &v), &m) in variance.iter_mut().zip(row).zip(&mean) {
                let d = v - m;
                *var += d * d;
            }
        }

        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > 0.0 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn is_fitted(&self) -> bool {
        !self.mean.is_empty()
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Standardise one row
    pub fn transform(&self, row: &[f64]) -> Result<FeatureVector> {
        if !self.is_fitted() {
            return Err(AiCoreError::NotFitted("StandardScaler"));
        }
        if row.len() != self.width() {
            return Err(AiCoreError::DimensionMismatch {
                expected: self.width(),
                actual: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect())
    }

    /// Standardise every row of a matrix
    pub fn transform_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<FeatureVector>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    /// Check the fitted state is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(AiCoreError::ValidationFailed(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self
            .mean
            .iter()
            .chain(&self.scale)
            .any(|v| !v.is_finite())
            || self.scale.iter().any(|&s| s <= 0.0)
        {
            return Err(AiCoreError::ValidationFailed(
                "scaler contains non-finite or non-positive statistics".to_string(),
            ));
        }
        Ok(())
    }
}

/// Maps categorical values to integer codes
///
/// Classes are stored in lexicographic order and the code of a class is
/// its position. The encoder is fitted once and then frozen; values that
/// were not seen during fitting encode to [`UNKNOWN_CATEGORY_INDEX`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit the encoder on the observed values
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn contains(&self, value: &str) -> bool {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .is_ok()
    }

    /// Encode a value; unseen values map to [`UNKNOWN_CATEGORY_INDEX`]
    pub fn encode(&self, value: &str) -> usize {
        match self.classes.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(idx) => idx,
            Err(_) => {
                tracing::debug!(value, "unseen category, using fallback code");
                UNKNOWN_CATEGORY_INDEX
            }
        }
    }

    /// Decode a code back to its class name
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(AiCoreError::ValidationFailed(
                "label encoder has no classes".to_string(),
            ));
        }
        if self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AiCoreError::ValidationFailed(
                "label encoder classes are not strictly sorted".to_string(),
            ));
        }
        Ok(())
    }
}
