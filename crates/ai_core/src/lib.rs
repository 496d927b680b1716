//! AI Core for carbon and biomass estimation models
//!
//! Provides the shared building blocks used by the trainer and the
//! estimation engine.
//!
//! Modules:
//! - `gbdt`: Regression-tree ensemble format and inference
//! - `features`: Feature schemas, standard scaling and label encoding
//! - `metrics`: Regression quality metrics (RMSE, MAE, R²)
//! - `serde_canon`: Canonical JSON and blake3 content hashing
//! - `errors`: Error type shared by the modules above

pub mod errors;
pub mod features;
pub mod gbdt;
pub mod metrics;
pub mod serde_canon;

pub use errors::{AiCoreError, Result};
pub use features::{FeatureSchema, LabelEncoder, StandardScaler, UNKNOWN_CATEGORY_INDEX};
pub use gbdt::{Model, Node, Tree};
pub use metrics::RegressionMetrics;

/// Crate version string for artifact metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Round to a fixed number of decimal places, half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
