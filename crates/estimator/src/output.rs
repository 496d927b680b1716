//! Result documents returned to callers
//!
//! These are plain serializable structures. Formatting and the choice of
//! sink are left to the caller.

use carbon_ai_core::metrics::RegressionMetrics;
use carbon_ai_core::round_to;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::{ErrorKind, EstimationError};
use crate::learned::TrainingReport;
use crate::types::{AnalysisStatus, CalculationRequest, EstimationResult, ModelKind, Recommendation};

pub const SUCCESS: &str = "success";
pub const ERROR: &str = "error";

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomassAnalysis {
    pub biomass_kg: f64,
    pub carbon_content_kg: f64,
    pub allometric_biomass_kg: f64,
    pub ml_biomass_kg: f64,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequestrationAnalysis {
    pub carbon_sequestration_kg_per_year: f64,
    /// ± half-width (kg/yr)
    pub confidence_interval: f64,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemMetrics {
    pub carbon_density_kg_per_hectare: f64,
    pub annual_sequestration_rate_kg_per_hectare: f64,
    pub total_carbon_storage_kg: f64,
    pub total_biomass_kg: f64,
    pub area_hectares: f64,
}

/// Estimation result grouped the way reports present it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub status: AnalysisStatus,
    pub biomass_analysis: BiomassAnalysis,
    pub carbon_sequestration: SequestrationAnalysis,
    pub ecosystem_metrics: EcosystemMetrics,
}

impl From<&EstimationResult> for AnalysisResults {
    fn from(result: &EstimationResult) -> Self {
        Self {
            status: result.status,
            biomass_analysis: BiomassAnalysis {
                biomass_kg: result.biomass_kg,
                carbon_content_kg: result.carbon_content_kg,
                allometric_biomass_kg: result.allometric_biomass_kg,
                ml_biomass_kg: result.ml_biomass_kg,
                status: result.status,
            },
            carbon_sequestration: SequestrationAnalysis {
                carbon_sequestration_kg_per_year: result.annual_sequestration_kg_per_year,
                confidence_interval: result.sequestration_confidence_interval,
                status: result.status,
            },
            ecosystem_metrics: EcosystemMetrics {
                carbon_density_kg_per_hectare: result.carbon_density_kg_per_hectare,
                annual_sequestration_rate_kg_per_hectare: result.sequestration_rate_kg_per_hectare,
                total_carbon_storage_kg: result.carbon_content_kg,
                total_biomass_kg: result.biomass_kg,
                area_hectares: result.area_hectares,
            },
        }
    }
}

/// Estimate plus recommendations for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub results: AnalysisResults,
    pub recommendations: Vec<Recommendation>,
}

/// Per-model state reported alongside results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub is_trained: bool,
    pub feature_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_trees: Option<usize>,
    /// blake3 of the ensemble's canonical JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensemble_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version: String,
    pub models: BTreeMap<ModelKind, ModelStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEcho {
    pub tree_data: Map<String, Value>,
    pub environmental_data: Map<String, Value>,
    pub ecosystem_data: Map<String, Value>,
}

/// Full response to a calculation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationOutput {
    pub status: String,
    pub timestamp: String,
    pub user_id: Option<Value>,
    pub input_data: InputEcho,
    pub analysis_results: AnalysisResults,
    pub recommendations: Vec<Recommendation>,
    pub model_info: ModelInfo,
}

impl CalculationOutput {
    pub fn new(request: &CalculationRequest, report: AnalysisReport, model_info: ModelInfo) -> Self {
        Self {
            status: SUCCESS.to_string(),
            timestamp: request.timestamp.clone().unwrap_or_else(now_timestamp),
            user_id: request.user_id.clone(),
            input_data: InputEcho {
                tree_data: request.tree_data.clone(),
                environmental_data: request.environmental_data.clone(),
                ecosystem_data: request.ecosystem_data.clone(),
            },
            analysis_results: report.results,
            recommendations: report.recommendations,
            model_info,
        }
    }

    /// File name for this document, keyed by its timestamp
    pub fn results_file_name(&self) -> String {
        results_file_name(&self.timestamp)
    }
}

/// Totals and means over a batch of estimates (kg, 2 dp)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_samples: usize,
    pub total_biomass_kg: f64,
    pub total_carbon_kg: f64,
    pub avg_carbon_kg: f64,
    pub total_sequestration_kg_per_year: f64,
    pub avg_sequestration_kg_per_year: f64,
}

impl BatchSummary {
    pub fn from_results(results: &[EstimationResult]) -> Self {
        let total_biomass: f64 = results.iter().map(|r| r.biomass_kg).sum();
        let total_carbon: f64 = results.iter().map(|r| r.carbon_content_kg).sum();
        let total_sequestration: f64 = results
            .iter()
            .map(|r| r.annual_sequestration_kg_per_year)
            .sum();
        let mean = |total: f64| {
            if results.is_empty() {
                0.0
            } else {
                total / results.len() as f64
            }
        };

        Self {
            total_samples: results.len(),
            total_biomass_kg: round_to(total_biomass, 2),
            total_carbon_kg: round_to(total_carbon, 2),
            avg_carbon_kg: round_to(mean(total_carbon), 2),
            total_sequestration_kg_per_year: round_to(total_sequestration, 2),
            avg_sequestration_kg_per_year: round_to(mean(total_sequestration), 2),
        }
    }
}

/// Per-request results with their summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEstimate {
    pub results: Vec<EstimationResult>,
    pub summary: BatchSummary,
}

impl BatchEstimate {
    pub fn new(results: &[EstimationResult]) -> Self {
        Self {
            results: results.to_vec(),
            summary: BatchSummary::from_results(results),
        }
    }
}

/// Response to a batch of calculation requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub status: String,
    pub predictions: Vec<AnalysisResults>,
    pub summary: BatchSummary,
    pub model_info: ModelInfo,
    pub timestamp: String,
}

impl BatchOutput {
    pub fn new(batch: BatchEstimate, model_info: ModelInfo) -> Self {
        Self {
            status: SUCCESS.to_string(),
            predictions: batch.results.iter().map(AnalysisResults::from).collect(),
            summary: batch.summary,
            model_info,
            timestamp: now_timestamp(),
        }
    }
}

/// Scores of one model against a labelled test set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub samples: usize,
    pub metrics: RegressionMetrics,
}

/// Response to an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub status: String,
    pub evaluations: BTreeMap<ModelKind, ModelEvaluation>,
    pub model_info: ModelInfo,
    pub timestamp: String,
}

impl EvaluationOutput {
    pub fn new(evaluations: BTreeMap<ModelKind, ModelEvaluation>, model_info: ModelInfo) -> Self {
        Self {
            status: SUCCESS.to_string(),
            evaluations,
            model_info,
            timestamp: now_timestamp(),
        }
    }
}

/// Response to a training request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutput {
    pub status: String,
    pub message: String,
    pub training_results: BTreeMap<ModelKind, TrainingReport>,
    pub model_path: String,
    pub timestamp: String,
}

impl TrainingOutput {
    pub fn new(training_results: BTreeMap<ModelKind, TrainingReport>, model_path: String) -> Self {
        Self {
            status: SUCCESS.to_string(),
            message: "Models trained successfully".to_string(),
            training_results,
            model_path,
            timestamp: now_timestamp(),
        }
    }
}

/// Structured error result emitted at the command boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub status: String,
    pub kind: Option<ErrorKind>,
    pub error: String,
    pub results: Map<String, Value>,
    pub timestamp: String,
}

impl ErrorReport {
    pub fn new(kind: Option<ErrorKind>, error: impl Into<String>) -> Self {
        Self {
            status: ERROR.to_string(),
            kind,
            error: error.into(),
            results: Map::new(),
            timestamp: now_timestamp(),
        }
    }

    /// Classify an error chain, using the first estimation error found
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let kind = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<EstimationError>())
            .map(EstimationError::kind);
        Self::new(kind, format!("{err:#}"))
    }
}

impl From<&EstimationError> for ErrorReport {
    fn from(err: &EstimationError) -> Self {
        Self::new(Some(err.kind()), err.to_string())
    }
}

/// File name under which a calculation result is stored
pub fn results_file_name(timestamp: &str) -> String {
    let stamp: String = timestamp
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
        .collect();
    format!("carbon_calculation_results_{stamp}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EstimationResult {
        EstimationResult {
            allometric_biomass_kg: 100.0,
            ml_biomass_kg: 200.0,
            biomass_kg: 130.0,
            carbon_content_kg: 61.1,
            carbon_density_kg_per_hectare: 30.55,
            annual_sequestration_kg_per_year: 20.0,
            sequestration_confidence_interval: 3.0,
            sequestration_rate_kg_per_hectare: 10.0,
            area_hectares: 2.0,
            status: AnalysisStatus::Success,
        }
    }

    #[test]
    fn analysis_results_use_report_keys() {
        let value = serde_json::to_value(AnalysisResults::from(&sample())).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["biomass_analysis"]["biomass_kg"], 130.0);
        assert_eq!(value["carbon_sequestration"]["confidence_interval"], 3.0);
        assert_eq!(value["ecosystem_metrics"]["total_carbon_storage_kg"], 61.1);
        assert_eq!(
            value["ecosystem_metrics"]["annual_sequestration_rate_kg_per_hectare"],
            10.0
        );
    }

    #[test]
    fn report_flattens_results() {
        let report = AnalysisReport {
            results: AnalysisResults::from(&sample()),
            recommendations: Vec::new(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("biomass_analysis").is_some());
        assert!(value["recommendations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn error_report_carries_kind() {
        let err = EstimationError::InvalidArea { area: 0.0 };
        let report = ErrorReport::from(&err);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "invalid_area");
        assert_eq!(value["results"], serde_json::json!({}));
    }

    #[test]
    fn error_report_finds_wrapped_cause() {
        let err = anyhow::Error::new(EstimationError::MissingField {
            fields: vec!["dbh".into()],
        })
        .context("estimation failed");
        let report = ErrorReport::from_anyhow(&err);
        assert_eq!(report.kind, Some(ErrorKind::MissingField));
        assert!(report.error.contains("Missing required fields: dbh"));
    }

    #[test]
    fn results_file_name_is_path_safe() {
        assert_eq!(
            results_file_name("2024-01-01T10:00:00"),
            "carbon_calculation_results_2024-01-01T10-00-00.json"
        );
    }

    fn model_info() -> ModelInfo {
        ModelInfo {
            version: "test".into(),
            models: BTreeMap::new(),
        }
    }

    fn report() -> AnalysisReport {
        AnalysisReport {
            results: AnalysisResults::from(&sample()),
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn unstamped_request_shares_generated_timestamp() {
        let output = CalculationOutput::new(&CalculationRequest::default(), report(), model_info());
        assert!(!output.timestamp.is_empty());
        assert_eq!(output.results_file_name(), results_file_name(&output.timestamp));
        assert!(!output.results_file_name().contains("unknown"));

        let request = CalculationRequest {
            timestamp: Some("2024-05-01".into()),
            ..CalculationRequest::default()
        };
        let output = CalculationOutput::new(&request, report(), model_info());
        assert_eq!(output.results_file_name(), "carbon_calculation_results_2024-05-01.json");
    }

    #[test]
    fn batch_summary_totals_and_means() {
        let mut other = sample();
        other.carbon_content_kg = 38.9;
        other.annual_sequestration_kg_per_year = 10.0;

        let summary = BatchSummary::from_results(&[sample(), other]);
        assert_eq!(summary.total_samples, 2);
        assert_eq!(summary.total_carbon_kg, 100.0);
        assert_eq!(summary.avg_carbon_kg, 50.0);
        assert_eq!(summary.total_sequestration_kg_per_year, 30.0);
        assert_eq!(summary.avg_sequestration_kg_per_year, 15.0);
        assert_eq!(summary.total_biomass_kg, 260.0);

        let empty = BatchSummary::from_results(&[]);
        assert_eq!((empty.total_samples, empty.avg_carbon_kg), (0, 0.0));
    }
}
