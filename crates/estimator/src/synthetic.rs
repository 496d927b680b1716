//! Seeded synthetic training data
//!
//! Used by [`crate::ModelLifecycleManager::train_all`] when no field
//! dataset is supplied. Labels are built from the allometric equations
//! plus environmental response curves, so a model trained on them learns
//! a smooth correction around the physical baseline.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::allometric::{raw_biomass, GrowthModifiers};
use crate::blending::CARBON_FRACTION;
use crate::learned::LabelledRecord;
use crate::resolver::FeatureInput;
use crate::types::{ClimateZone, Species};

pub const OPTIMAL_TEMPERATURE_C: f64 = 27.0;
pub const OPTIMAL_PRECIPITATION_MM: f64 = 2500.0;
pub const REFERENCE_ORGANIC_MATTER: f64 = 8.0;
/// Age (years) at which sequestration reaches full rate
pub const SEQUESTRATION_MATURITY_YEARS: f64 = 20.0;

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    // both tables are non-empty constants
    items.choose(rng).unwrap_or(&items[0])
}

/// Biomass records: dendrometric features labelled with modified
/// allometric biomass (kg)
pub fn biomass_records(n_samples: usize, seed: u64) -> Vec<LabelledRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_samples)
        .map(|_| {
            let dbh = rng.gen_range(5.0..80.0);
            let tree_height = rng.gen_range(2.0..25.0);
            let species = pick(&mut rng, &Species::KNOWN).clone();
            let crown_diameter = rng.gen_range(2.0..15.0);
            let wood_density = rng.gen_range(0.4..0.8);
            let bark_thickness = rng.gen_range(0.5..3.0);
            let tree_age = rng.gen_range(1.0..50.0);
            let site_index = rng.gen_range(10.0..30.0);
            let competition_index = rng.gen_range(0.1..1.0);
            let soil_fertility = rng.gen_range(0.3..1.0);
            let climate_zone = pick(&mut rng, &ClimateZone::KNOWN).clone();

            let target = raw_biomass(&species, dbh, tree_height)
                * GrowthModifiers::new(wood_density, site_index, tree_age).factor();

            LabelledRecord {
                features: FeatureInput::new()
                    .with_numeric("dbh", dbh)
                    .with_numeric("tree_height", tree_height)
                    .with_categorical("species", species.as_str())
                    .with_numeric("crown_diameter", crown_diameter)
                    .with_numeric("wood_density", wood_density)
                    .with_numeric("bark_thickness", bark_thickness)
                    .with_numeric("tree_age", tree_age)
                    .with_numeric("site_index", site_index)
                    .with_numeric("competition_index", competition_index)
                    .with_numeric("soil_fertility", soil_fertility)
                    .with_categorical("climate_zone", climate_zone.as_str()),
                target,
            }
        })
        .collect()
}

/// Annual sequestration (kg/yr) of a tree under the given conditions
pub fn sequestration_label(
    species: &Species,
    dbh: f64,
    tree_height: f64,
    tree_age: f64,
    temperature: f64,
    precipitation: f64,
    soil_organic_matter: f64,
) -> f64 {
    let carbon = raw_biomass(species, dbh, tree_height) * CARBON_FRACTION;
    let temperature_factor = 1.0 + (temperature - OPTIMAL_TEMPERATURE_C) * 0.02;
    let precipitation_factor = 1.0 + (precipitation - OPTIMAL_PRECIPITATION_MM) * 0.0001;
    let soil_factor = 1.0 + (soil_organic_matter - REFERENCE_ORGANIC_MATTER) * 0.05;
    let age_factor = (tree_age / SEQUESTRATION_MATURITY_YEARS).min(1.0);

    carbon * temperature_factor * precipitation_factor * soil_factor * age_factor / tree_age
}

/// Sequestration records: tree, soil, climate and remote-sensing features
/// labelled with annual sequestration (kg/yr)
pub fn sequestration_records(n_samples: usize, seed: u64) -> Vec<LabelledRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_samples)
        .map(|_| {
            let tree_age = rng.gen_range(1.0..50.0);
            let tree_height = rng.gen_range(2.0..25.0);
            let dbh = rng.gen_range(5.0..80.0);
            let species = pick(&mut rng, &Species::KNOWN).clone();
            let soil_ph = rng.gen_range(6.0..8.5);
            let soil_organic_matter = rng.gen_range(2.0..15.0);
            let precipitation = rng.gen_range(1000.0..4000.0);
            let temperature = rng.gen_range(20.0..35.0);
            let humidity = rng.gen_range(60.0..95.0);
            let elevation = rng.gen_range(0.0..10.0);
            let slope = rng.gen_range(0.0..30.0);
            let aspect = rng.gen_range(0.0..360.0);
            let distance_to_water = rng.gen_range(0.0..1000.0);
            let canopy_density = rng.gen_range(0.3..1.0);
            let leaf_area_index = rng.gen_range(2.0..8.0);
            let ndvi = rng.gen_range(0.3..0.9);
            let tree_count_per_hectare = rng.gen_range(100.0..2000.0);

            let target = sequestration_label(
                &species,
                dbh,
                tree_height,
                tree_age,
                temperature,
                precipitation,
                soil_organic_matter,
            );

            LabelledRecord {
                features: FeatureInput::new()
                    .with_numeric("tree_age", tree_age)
                    .with_numeric("tree_height", tree_height)
                    .with_numeric("dbh", dbh)
                    .with_categorical("species", species.as_str())
                    .with_numeric("soil_ph", soil_ph)
                    .with_numeric("soil_organic_matter", soil_organic_matter)
                    .with_numeric("precipitation", precipitation)
                    .with_numeric("temperature", temperature)
                    .with_numeric("humidity", humidity)
                    .with_numeric("elevation", elevation)
                    .with_numeric("slope", slope)
                    .with_numeric("aspect", aspect)
                    .with_numeric("distance_to_water", distance_to_water)
                    .with_numeric("canopy_density", canopy_density)
                    .with_numeric("leaf_area_index", leaf_area_index)
                    .with_numeric("ndvi", ndvi)
                    .with_numeric("tree_count_per_hectare", tree_count_per_hectare),
                target,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_are_deterministic() {
        assert_eq!(biomass_records(50, 7), biomass_records(50, 7));
        assert_eq!(sequestration_records(50, 7), sequestration_records(50, 7));
        assert_ne!(biomass_records(50, 7), biomass_records(50, 8));
    }

    #[test]
    fn biomass_records_stay_in_range() {
        for record in biomass_records(200, 42) {
            let dbh = record.features.numeric("dbh").unwrap();
            assert!((5.0..80.0).contains(&dbh));
            let species = record.features.categorical("species").unwrap();
            assert!(Species::from_name(species).is_known());
            assert!(record.target.is_finite() && record.target > 0.0);
        }
    }

    #[test]
    fn sequestration_records_cover_schema() {
        let records = sequestration_records(10, 42);
        assert_eq!(records.len(), 10);
        for record in &records {
            assert_eq!(record.features.numeric.len(), 16);
            assert!(record.target.is_finite());
        }
    }

    #[test]
    fn sequestration_label_at_reference_conditions() {
        let label = sequestration_label(&Species::Avicennia, 20.0, 10.0, 20.0, 27.0, 2500.0, 8.0);
        let expected = 0.251 * 20f64.powf(2.46) * 0.47 / 20.0;
        assert!((label - expected).abs() < 1e-9);
    }

    #[test]
    fn young_trees_ramp_up() {
        let young = sequestration_label(&Species::Avicennia, 20.0, 10.0, 10.0, 27.0, 2500.0, 8.0);
        let mature = sequestration_label(&Species::Avicennia, 20.0, 10.0, 20.0, 27.0, 2500.0, 8.0);
        // age ramp and per-year division cancel below maturity
        assert!((young - mature).abs() < 1e-9);
    }
}
