//! Carbon AI Trainer - Deterministic offline GBDT trainer
//!
//! Provides tools for training Gradient Boosted Decision Tree regression
//! models with full determinism and reproducibility across runs.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod trainer;

pub use cart::{BuiltTree, CartBuilder, TreeConfig};
pub use dataset::Dataset;
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::TrainerError;
pub use trainer::{GbdtTrainer, TrainingOutcome, TrainingParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
