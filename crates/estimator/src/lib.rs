//! Biomass and carbon estimation engine
//!
//! Estimates above-ground biomass, stored carbon and annual carbon
//! sequestration for a single tree. A species-specific allometric equation
//! is blended with a learned biomass correction, and a second learned
//! model predicts sequestration. Results come with management
//! recommendations.
//!
//! Modules:
//! - `resolver`: Merge and default partial input records
//! - `allometric`: Power-law biomass equations and growth modifiers
//! - `learned`: Gradient-boosted correction models and their artifacts
//! - `blending`: Weighted blend and carbon/area derivations
//! - `recommend`: Rule-based recommendations
//! - `manager`: Train, load, save and estimate with both models
//! - `synthetic`: Seeded training data
//! - `records`: Labelled field records from CSV
//! - `config`: TOML configuration with environment overrides
//! - `output`: Result documents

pub mod allometric;
pub mod blending;
pub mod config;
pub mod errors;
pub mod learned;
pub mod manager;
pub mod output;
pub mod recommend;
pub mod records;
pub mod resolver;
pub mod synthetic;
pub mod types;

pub use allometric::{allometric_biomass, raw_biomass, AllometricCoefficients, GrowthModifiers};
pub use blending::blend;
pub use config::EstimatorConfig;
pub use errors::{ErrorKind, EstimationError, Result};
pub use learned::{LabelledRecord, LearnedModel, TrainedModelArtifact, TrainingReport};
pub use manager::ModelLifecycleManager;
pub use output::{
    AnalysisReport, BatchEstimate, BatchOutput, BatchSummary, CalculationOutput, ErrorReport,
    EvaluationOutput, ModelEvaluation, ModelInfo, TrainingOutput,
};
pub use recommend::recommend;
pub use resolver::{resolve, resolve_request, FeatureInput, ResolvedFeatures};
pub use types::{
    AnalysisStatus, CalculationRequest, ClimateZone, EcosystemContext, EnvironmentalContext,
    EstimationResult, ModelKind, Priority, Recommendation, RecommendationCategory, Species,
    TreeObservation,
};

/// Crate version string reported with model information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
