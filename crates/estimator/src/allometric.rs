//! Species-specific allometric biomass equations
//!
//! Raw biomass is `a · dbh^b` when `c == 0` and `a · dbh^b · height^c`
//! otherwise. The raw value is scaled by wood density, site index and age
//! modifiers before it is blended with the learned estimate.

use serde::{Deserialize, Serialize};

use crate::types::{EcosystemContext, Species, TreeObservation};

/// Calibration triple of a power-law biomass equation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllometricCoefficients {
    /// Scale factor
    pub a: f64,
    /// Diameter exponent
    pub b: f64,
    /// Height exponent; zero selects the diameter-only form
    pub c: f64,
}

/// Tabulated coefficients. Species outside the table use the first row.
pub static COEFFICIENT_TABLE: [(Species, AllometricCoefficients); 3] = [
    (
        Species::Rhizophora,
        AllometricCoefficients { a: 0.0673, b: 2.46, c: 0.976 },
    ),
    (
        Species::Avicennia,
        AllometricCoefficients { a: 0.251, b: 2.46, c: 0.0 },
    ),
    (
        Species::Bruguiera,
        AllometricCoefficients { a: 0.0673, b: 2.46, c: 0.976 },
    ),
];

pub const REFERENCE_WOOD_DENSITY: f64 = 0.6;
pub const REFERENCE_SITE_INDEX: f64 = 20.0;
/// Age (years) at which the age ramp reaches 1
pub const MATURITY_AGE_YEARS: f64 = 25.0;

impl AllometricCoefficients {
    pub fn for_species(species: &Species) -> Self {
        COEFFICIENT_TABLE
            .iter()
            .find(|(s, _)| s == species)
            .unwrap_or(&COEFFICIENT_TABLE[0])
            .1
    }

    pub fn uses_height(&self) -> bool {
        self.c != 0.0
    }

    /// Unmodified biomass (kg)
    pub fn biomass(&self, dbh: f64, height: f64) -> f64 {
        let base = self.a * dbh.powf(self.b);
        if self.uses_height() {
            base * height.powf(self.c)
        } else {
            base
        }
    }
}

/// Multiplicative corrections applied to the raw equation output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthModifiers {
    pub wood_density: f64,
    pub site: f64,
    pub age: f64,
}

impl GrowthModifiers {
    pub fn new(wood_density: f64, site_index: f64, age_years: f64) -> Self {
        Self {
            wood_density: wood_density / REFERENCE_WOOD_DENSITY,
            site: site_index / REFERENCE_SITE_INDEX,
            age: (age_years / MATURITY_AGE_YEARS).min(1.0),
        }
    }

    pub fn factor(&self) -> f64 {
        self.wood_density * self.site * self.age
    }
}

/// Raw biomass for a species; no modifiers applied
pub fn raw_biomass(species: &Species, dbh: f64, height: f64) -> f64 {
    AllometricCoefficients::for_species(species).biomass(dbh, height)
}

/// Modified allometric biomass of a tree (kg)
pub fn allometric_biomass(tree: &TreeObservation, ecosystem: &EcosystemContext) -> f64 {
    let modifiers = GrowthModifiers::new(tree.wood_density, ecosystem.site_index, tree.tree_age);
    raw_biomass(&tree.species, tree.dbh, tree.tree_height) * modifiers.factor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rhizophora_uses_height() {
        let expected = 0.0673 * 25f64.powf(2.46) * 12f64.powf(0.976);
        assert!((raw_biomass(&Species::Rhizophora, 25.0, 12.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn avicennia_ignores_height() {
        let short = raw_biomass(&Species::Avicennia, 20.0, 3.0);
        let tall = raw_biomass(&Species::Avicennia, 20.0, 30.0);
        assert_eq!(short, tall);
        assert!((short - 0.251 * 20f64.powf(2.46)).abs() < 1e-9);
    }

    #[test]
    fn unknown_species_falls_back_to_first_row() {
        let unknown = Species::from_name("Sonneratia");
        assert_eq!(
            AllometricCoefficients::for_species(&unknown),
            COEFFICIENT_TABLE[0].1
        );
    }

    #[test]
    fn reference_modifiers_are_identity() {
        let m = GrowthModifiers::new(0.6, 20.0, 30.0);
        assert_eq!(m.factor(), 1.0);

        let young = GrowthModifiers::new(0.6, 20.0, 15.0);
        assert!((young.factor() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn modifiers_scale_raw_biomass() {
        let tree = TreeObservation {
            dbh: 25.0,
            tree_height: 12.0,
            species: Species::Rhizophora,
            tree_age: 50.0,
            crown_diameter: 5.0,
            wood_density: 0.9,
            bark_thickness: 1.0,
        };
        let eco = EcosystemContext {
            area_hectares: 1.0,
            site_index: 10.0,
            competition_index: 0.5,
            soil_fertility: 0.7,
        };
        let raw = raw_biomass(&Species::Rhizophora, 25.0, 12.0);
        assert!((allometric_biomass(&tree, &eco) - raw * 1.5 * 0.5).abs() < 1e-9);
    }

    fn known_species() -> impl Strategy<Value = Species> {
        prop_oneof![
            Just(Species::Rhizophora),
            Just(Species::Avicennia),
            Just(Species::Bruguiera),
        ]
    }

    proptest! {
        #[test]
        fn biomass_increases_with_diameter(
            species in known_species(),
            dbh in 1.0f64..100.0,
            delta in 0.01f64..20.0,
            height in 1.0f64..40.0,
        ) {
            prop_assert!(raw_biomass(&species, dbh + delta, height) > raw_biomass(&species, dbh, height));
        }

        #[test]
        fn biomass_increases_with_height_when_used(
            dbh in 1.0f64..100.0,
            height in 1.0f64..40.0,
            delta in 0.01f64..10.0,
        ) {
            for species in [Species::Rhizophora, Species::Bruguiera] {
                prop_assert!(raw_biomass(&species, dbh, height + delta) > raw_biomass(&species, dbh, height));
            }
        }
    }
}
