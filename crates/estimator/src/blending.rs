//! Blending of allometric and learned estimates into the final result

use carbon_ai_core::round_to;

use crate::errors::{EstimationError, Result};
use crate::types::{AnalysisStatus, EstimationResult};

pub const ALLOMETRIC_WEIGHT: f64 = 0.7;
pub const LEARNED_WEIGHT: f64 = 0.3;
/// Fraction of dry biomass that is carbon
pub const CARBON_FRACTION: f64 = 0.47;
/// Relative half-width of the sequestration confidence band
pub const CONFIDENCE_FRACTION: f64 = 0.15;

/// Combine the component estimates for a tree on `area_hectares`.
///
/// Blended biomass is rounded to 2 dp before carbon is derived from it so
/// the reported carbon always matches the reported biomass.
pub fn blend(
    allometric_biomass: f64,
    learned_biomass: f64,
    annual_sequestration: f64,
    area_hectares: f64,
) -> Result<EstimationResult> {
    if !(area_hectares.is_finite() && area_hectares > 0.0) {
        return Err(EstimationError::InvalidArea {
            area: area_hectares,
        });
    }

    let biomass_kg = round_to(
        ALLOMETRIC_WEIGHT * allometric_biomass + LEARNED_WEIGHT * learned_biomass,
        2,
    );
    let carbon_content_kg = round_to(biomass_kg * CARBON_FRACTION, 2);

    Ok(EstimationResult {
        allometric_biomass_kg: allometric_biomass,
        ml_biomass_kg: learned_biomass,
        biomass_kg,
        carbon_content_kg,
        carbon_density_kg_per_hectare: round_to(carbon_content_kg / area_hectares, 2),
        annual_sequestration_kg_per_year: round_to(annual_sequestration, 2),
        sequestration_confidence_interval: round_to(annual_sequestration * CONFIDENCE_FRACTION, 2),
        sequestration_rate_kg_per_hectare: round_to(annual_sequestration / area_hectares, 2),
        area_hectares,
        status: AnalysisStatus::Success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        assert!((ALLOMETRIC_WEIGHT + LEARNED_WEIGHT - 1.0).abs() < 1e-12);
    }

    #[test]
    fn blends_and_derives_carbon() {
        let result = blend(100.0, 200.0, 20.0, 2.0).unwrap();
        assert_eq!(result.biomass_kg, 130.0);
        assert_eq!(result.carbon_content_kg, 61.1);
        assert_eq!(result.carbon_density_kg_per_hectare, 30.55);
        assert_eq!(result.annual_sequestration_kg_per_year, 20.0);
        assert_eq!(result.sequestration_confidence_interval, 3.0);
        assert_eq!(result.sequestration_rate_kg_per_hectare, 10.0);
        assert_eq!(result.status, AnalysisStatus::Success);
    }

    #[test]
    fn carbon_follows_rounded_biomass() {
        let result = blend(10.004, 10.004, 1.0, 1.0).unwrap();
        assert_eq!(result.biomass_kg, 10.0);
        assert_eq!(result.carbon_content_kg, 4.7);
        assert_eq!(result.allometric_biomass_kg, 10.004);
    }

    #[test]
    fn rejects_non_positive_area() {
        for area in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = blend(1.0, 1.0, 1.0, area).unwrap_err();
            assert!(matches!(err, EstimationError::InvalidArea { .. }));
        }
    }
}
