//! Domain types shared across the estimation engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The two learned correction models
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Biomass,
    Sequestration,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Biomass, ModelKind::Sequestration];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Biomass => "biomass",
            ModelKind::Sequestration => "sequestration",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mangrove genus with tabulated allometric coefficients
///
/// Names outside the table are kept verbatim in `Unknown` so that the
/// learned models still see the caller's value when encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Species {
    Rhizophora,
    Avicennia,
    Bruguiera,
    Unknown(String),
}

impl Species {
    pub const KNOWN: [Species; 3] = [Species::Rhizophora, Species::Avicennia, Species::Bruguiera];

    pub fn from_name(name: &str) -> Self {
        match name {
            "Rhizophora" => Species::Rhizophora,
            "Avicennia" => Species::Avicennia,
            "Bruguiera" => Species::Bruguiera,
            other => Species::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Species::Rhizophora => "Rhizophora",
            Species::Avicennia => "Avicennia",
            Species::Bruguiera => "Bruguiera",
            Species::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Species::Unknown(_))
    }
}

impl From<String> for Species {
    fn from(name: String) -> Self {
        Species::from_name(&name)
    }
}

impl From<Species> for String {
    fn from(species: Species) -> Self {
        species.as_str().to_string()
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad climate band of the site
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClimateZone {
    Tropical,
    Subtropical,
    Temperate,
    Other(String),
}

impl ClimateZone {
    pub const KNOWN: [ClimateZone; 3] = [
        ClimateZone::Tropical,
        ClimateZone::Subtropical,
        ClimateZone::Temperate,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "tropical" => ClimateZone::Tropical,
            "subtropical" => ClimateZone::Subtropical,
            "temperate" => ClimateZone::Temperate,
            other => ClimateZone::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClimateZone::Tropical => "tropical",
            ClimateZone::Subtropical => "subtropical",
            ClimateZone::Temperate => "temperate",
            ClimateZone::Other(name) => name,
        }
    }
}

impl From<String> for ClimateZone {
    fn from(name: String) -> Self {
        ClimateZone::from_name(&name)
    }
}

impl From<ClimateZone> for String {
    fn from(zone: ClimateZone) -> Self {
        zone.as_str().to_string()
    }
}

/// Field measurements of a single tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeObservation {
    /// Diameter at breast height (cm)
    pub dbh: f64,
    /// Total height (m)
    pub tree_height: f64,
    pub species: Species,
    /// Age (years)
    pub tree_age: f64,
    pub crown_diameter: f64,
    /// Wood density (g/cm³)
    pub wood_density: f64,
    pub bark_thickness: f64,
}

/// Site, soil, climate and remote-sensing context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalContext {
    pub soil_ph: f64,
    pub soil_organic_matter: f64,
    /// Annual precipitation (mm)
    pub precipitation: f64,
    /// Mean temperature (°C)
    pub temperature: f64,
    pub humidity: f64,
    pub elevation: f64,
    pub slope: f64,
    pub aspect: f64,
    pub distance_to_water: f64,
    pub canopy_density: f64,
    pub leaf_area_index: f64,
    pub ndvi: f64,
    /// Stocking density (trees/ha)
    pub tree_count_per_hectare: f64,
    pub climate_zone: ClimateZone,
}

/// Stand-level context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemContext {
    pub area_hectares: f64,
    pub site_index: f64,
    pub competition_index: f64,
    pub soil_fertility: f64,
}

/// Incoming calculation request as supplied by the ingestion layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationRequest {
    pub tree_data: Map<String, Value>,
    pub environmental_data: Map<String, Value>,
    pub ecosystem_data: Map<String, Value>,
    /// Overrides any area found in the three sources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_hectares: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub user_id: Option<Value>,
    /// Train and persist both models instead of estimating
    pub training: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    Error,
}

/// Blended estimate for one tree on a given area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Allometric biomass after modifiers (kg, unrounded)
    pub allometric_biomass_kg: f64,
    /// Learned-model biomass (kg, unrounded)
    pub ml_biomass_kg: f64,
    /// Blended biomass (kg, 2 dp)
    pub biomass_kg: f64,
    pub carbon_content_kg: f64,
    pub carbon_density_kg_per_hectare: f64,
    /// Predicted annual sequestration for the tree (kg/yr)
    pub annual_sequestration_kg_per_year: f64,
    /// Half-width of the ±15% band around the sequestration prediction
    pub sequestration_confidence_interval: f64,
    pub sequestration_rate_kg_per_hectare: f64,
    pub area_hectares: f64,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Biomass,
    Carbon,
    Ecosystem,
    General,
    Error,
}

/// Human-readable action item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_roundtrips_through_names() {
        for species in Species::KNOWN {
            assert_eq!(Species::from_name(species.as_str()), species);
        }
        let other = Species::from_name("Sonneratia");
        assert!(!other.is_known());
        assert_eq!(other.as_str(), "Sonneratia");
    }

    #[test]
    fn species_serializes_as_plain_string() {
        let json = serde_json::to_string(&Species::Avicennia).unwrap();
        assert_eq!(json, "\"Avicennia\"");
        let parsed: Species = serde_json::from_str("\"Bruguiera\"").unwrap();
        assert_eq!(parsed, Species::Bruguiera);
    }

    #[test]
    fn recommendation_uses_type_key() {
        let rec = Recommendation {
            category: RecommendationCategory::General,
            priority: Priority::Low,
            title: "t".into(),
            description: "d".into(),
            action: "a".into(),
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["type"], "general");
        assert_eq!(value["priority"], "low");
    }

    #[test]
    fn request_defaults_when_fields_absent() {
        let request: CalculationRequest =
            serde_json::from_str(r#"{"tree_data":{"dbh":25}}"#).unwrap();
        assert_eq!(request.tree_data["dbh"], 25);
        assert!(request.environmental_data.is_empty());
        assert!(!request.training);
        assert_eq!(request.area_hectares, None);
    }
}
