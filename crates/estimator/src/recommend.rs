//! Management recommendations derived from an estimation result
//!
//! Rules are evaluated in a fixed order (biomass, sequestration, carbon
//! density) and every stage may contribute. A monitoring entry is always
//! appended last.

use tracing::warn;

use crate::types::{
    AnalysisStatus, EstimationResult, Priority, Recommendation, RecommendationCategory,
};

/// Blended biomass (kg) below which growth is considered poor
pub const LOW_BIOMASS_KG: f64 = 50.0;
pub const HIGH_BIOMASS_KG: f64 = 200.0;
/// Per-tree annual sequestration thresholds (kg/yr)
pub const LOW_SEQUESTRATION_KG: f64 = 10.0;
pub const HIGH_SEQUESTRATION_KG: f64 = 50.0;
pub const LOW_CARBON_DENSITY_KG_PER_HA: f64 = 1000.0;

fn entry(
    category: RecommendationCategory,
    priority: Priority,
    title: &str,
    description: &str,
    action: &str,
) -> Recommendation {
    Recommendation {
        category,
        priority,
        title: title.to_string(),
        description: description.to_string(),
        action: action.to_string(),
    }
}

/// Single entry returned when the result cannot be analysed
pub fn analysis_error() -> Recommendation {
    entry(
        RecommendationCategory::Error,
        Priority::High,
        "Analysis Error",
        "An error occurred during analysis. Please review input data.",
        "Verify input data and retry analysis",
    )
}

fn is_analysable(result: &EstimationResult) -> bool {
    result.status == AnalysisStatus::Success
        && [
            result.biomass_kg,
            result.annual_sequestration_kg_per_year,
            result.carbon_density_kg_per_hectare,
        ]
        .iter()
        .all(|v| v.is_finite())
}

/// Build the ordered recommendation list. Never fails.
pub fn recommend(result: &EstimationResult) -> Vec<Recommendation> {
    if !is_analysable(result) {
        warn!(status = ?result.status, "result cannot be analysed, returning error recommendation");
        return vec![analysis_error()];
    }

    let mut recommendations = Vec::with_capacity(4);

    if result.biomass_kg < LOW_BIOMASS_KG {
        recommendations.push(entry(
            RecommendationCategory::Biomass,
            Priority::High,
            "Low Biomass Detected",
            "The estimated biomass is below optimal levels. Consider soil improvement and nutrient management.",
            "Implement soil enrichment and fertilization program",
        ));
    } else if result.biomass_kg > HIGH_BIOMASS_KG {
        recommendations.push(entry(
            RecommendationCategory::Biomass,
            Priority::Low,
            "High Biomass Achievement",
            "Excellent biomass levels detected. Maintain current management practices.",
            "Continue current management and monitor for sustainability",
        ));
    }

    let sequestration = result.annual_sequestration_kg_per_year;
    if sequestration < LOW_SEQUESTRATION_KG {
        recommendations.push(entry(
            RecommendationCategory::Carbon,
            Priority::High,
            "Low Carbon Sequestration",
            "Carbon sequestration rate is below expected levels. Environmental factors may need attention.",
            "Review environmental conditions and consider species diversification",
        ));
    } else if sequestration > HIGH_SEQUESTRATION_KG {
        recommendations.push(entry(
            RecommendationCategory::Carbon,
            Priority::Low,
            "Excellent Carbon Sequestration",
            "Outstanding carbon sequestration performance. Consider expanding similar practices.",
            "Document successful practices for replication in other areas",
        ));
    }

    if result.carbon_density_kg_per_hectare < LOW_CARBON_DENSITY_KG_PER_HA {
        recommendations.push(entry(
            RecommendationCategory::Ecosystem,
            Priority::Medium,
            "Low Carbon Density",
            "Ecosystem carbon density is below optimal levels for maximum carbon credit generation.",
            "Consider increasing tree density or improving species selection",
        ));
    }

    recommendations.push(entry(
        RecommendationCategory::General,
        Priority::Low,
        "Regular Monitoring",
        "Continue regular monitoring and data collection for optimal ecosystem management.",
        "Schedule quarterly assessments and data updates",
    ));

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(biomass: f64, sequestration: f64, density: f64) -> EstimationResult {
        EstimationResult {
            allometric_biomass_kg: biomass,
            ml_biomass_kg: biomass,
            biomass_kg: biomass,
            carbon_content_kg: biomass * 0.47,
            carbon_density_kg_per_hectare: density,
            annual_sequestration_kg_per_year: sequestration,
            sequestration_confidence_interval: sequestration * 0.15,
            sequestration_rate_kg_per_hectare: sequestration,
            area_hectares: 1.0,
            status: AnalysisStatus::Success,
        }
    }

    fn titles(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn low_everything_yields_four_entries() {
        let recs = recommend(&result(30.0, 5.0, 14.1));
        assert_eq!(
            titles(&recs),
            [
                "Low Biomass Detected",
                "Low Carbon Sequestration",
                "Low Carbon Density",
                "Regular Monitoring"
            ]
        );
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[2].priority, Priority::Medium);
    }

    #[test]
    fn high_biomass_is_low_priority() {
        let recs = recommend(&result(250.0, 20.0, 5000.0));
        assert_eq!(titles(&recs), ["High Biomass Achievement", "Regular Monitoring"]);
        assert_eq!(recs[0].category, RecommendationCategory::Biomass);
        assert_eq!(recs[0].priority, Priority::Low);
    }

    #[test]
    fn mid_range_yields_only_monitoring() {
        let recs = recommend(&result(120.0, 20.0, 1000.0));
        assert_eq!(titles(&recs), ["Regular Monitoring"]);
        assert_eq!(recs[0].category, RecommendationCategory::General);
    }

    #[test]
    fn excellent_sequestration() {
        let recs = recommend(&result(120.0, 60.0, 2000.0));
        assert_eq!(titles(&recs)[0], "Excellent Carbon Sequestration");
    }

    #[test]
    fn boundaries_are_exclusive() {
        let recs = recommend(&result(50.0, 10.0, 1000.0));
        assert_eq!(recs.len(), 1);
        let recs = recommend(&result(200.0, 50.0, 1000.0));
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn failed_result_yields_single_error_entry() {
        let mut failed = result(120.0, 20.0, 2000.0);
        failed.status = AnalysisStatus::Error;
        assert_eq!(recommend(&failed), vec![analysis_error()]);

        let nan = result(f64::NAN, 20.0, 2000.0);
        let recs = recommend(&nan);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].category, RecommendationCategory::Error);
        assert_eq!(recs[0].priority, Priority::High);
    }
}
