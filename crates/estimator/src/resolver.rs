//! Feature resolution
//!
//! Merges the partial tree, environmental and ecosystem records of a
//! request into one typed feature set:
//!
//! 1. Alias keys are rewritten to their canonical names.
//! 2. The tree record is checked for the required fields.
//! 3. Sources are merged last-write-wins (tree, environmental, ecosystem).
//! 4. Absent or `null` fields take their value from [`DEFAULTS`].
//! 5. Values are parsed into [`TreeObservation`], [`EnvironmentalContext`]
//!    and [`EcosystemContext`].

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::errors::{EstimationError, Result};
use crate::types::{
    CalculationRequest, ClimateZone, EcosystemContext, EnvironmentalContext, Species,
    TreeObservation,
};

/// Tree fields that must be present and truthy, in reporting order
pub const REQUIRED_FIELDS: [&str; 3] = ["dbh", "tree_height", "species"];

/// Accepted alternative names and the canonical key each maps to
pub const FIELD_ALIASES: [(&str, &str); 5] = [
    ("diameter", "dbh"),
    ("height", "tree_height"),
    ("age", "tree_age"),
    ("organic_matter", "soil_organic_matter"),
    ("stocking_density", "tree_count_per_hectare"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Number(f64),
    Text(&'static str),
}

impl DefaultValue {
    fn to_json(self) -> Value {
        match self {
            DefaultValue::Number(n) => Value::from(n),
            DefaultValue::Text(s) => Value::from(s),
        }
    }
}

/// Values applied to fields the request leaves out
pub const DEFAULTS: [(&str, DefaultValue); 22] = [
    ("tree_age", DefaultValue::Number(10.0)),
    ("soil_ph", DefaultValue::Number(7.0)),
    ("soil_organic_matter", DefaultValue::Number(5.0)),
    ("precipitation", DefaultValue::Number(2000.0)),
    ("temperature", DefaultValue::Number(25.0)),
    ("humidity", DefaultValue::Number(70.0)),
    ("elevation", DefaultValue::Number(0.0)),
    ("slope", DefaultValue::Number(0.0)),
    ("aspect", DefaultValue::Number(0.0)),
    ("distance_to_water", DefaultValue::Number(100.0)),
    ("canopy_density", DefaultValue::Number(0.7)),
    ("leaf_area_index", DefaultValue::Number(4.0)),
    ("ndvi", DefaultValue::Number(0.6)),
    ("tree_count_per_hectare", DefaultValue::Number(500.0)),
    ("crown_diameter", DefaultValue::Number(5.0)),
    ("wood_density", DefaultValue::Number(0.6)),
    ("bark_thickness", DefaultValue::Number(1.0)),
    ("site_index", DefaultValue::Number(20.0)),
    ("competition_index", DefaultValue::Number(0.5)),
    ("soil_fertility", DefaultValue::Number(0.7)),
    ("climate_zone", DefaultValue::Text("tropical")),
    ("area_hectares", DefaultValue::Number(1.0)),
];

/// Named numeric and categorical inputs for the learned models
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureInput {
    pub numeric: BTreeMap<String, f64>,
    pub categorical: BTreeMap<String, String>,
}

impl FeatureInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(name.into(), value);
        self
    }

    pub fn with_categorical(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(name.into(), value.into());
        self
    }

    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.numeric.get(name).copied()
    }

    pub fn categorical(&self, name: &str) -> Option<&str> {
        self.categorical.get(name).map(String::as_str)
    }
}

/// Fully defaulted and typed request features
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFeatures {
    pub tree: TreeObservation,
    pub environment: EnvironmentalContext,
    pub ecosystem: EcosystemContext,
}

impl ResolvedFeatures {
    /// Flatten into the named inputs consumed by both learned models
    pub fn feature_input(&self) -> FeatureInput {
        let t = &self.tree;
        let e = &self.environment;
        let s = &self.ecosystem;

        let numeric = [
            ("dbh", t.dbh),
            ("tree_height", t.tree_height),
            ("tree_age", t.tree_age),
            ("crown_diameter", t.crown_diameter),
            ("wood_density", t.wood_density),
            ("bark_thickness", t.bark_thickness),
            ("soil_ph", e.soil_ph),
            ("soil_organic_matter", e.soil_organic_matter),
            ("precipitation", e.precipitation),
            ("temperature", e.temperature),
            ("humidity", e.humidity),
            ("elevation", e.elevation),
            ("slope", e.slope),
            ("aspect", e.aspect),
            ("distance_to_water", e.distance_to_water),
            ("canopy_density", e.canopy_density),
            ("leaf_area_index", e.leaf_area_index),
            ("ndvi", e.ndvi),
            ("tree_count_per_hectare", e.tree_count_per_hectare),
            ("area_hectares", s.area_hectares),
            ("site_index", s.site_index),
            ("competition_index", s.competition_index),
            ("soil_fertility", s.soil_fertility),
        ];

        FeatureInput {
            numeric: numeric
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            categorical: BTreeMap::from([
                ("species".to_string(), t.species.as_str().to_string()),
                ("climate_zone".to_string(), e.climate_zone.as_str().to_string()),
            ]),
        }
    }
}

/// Resolve the three sources of a request, honouring its top-level area
pub fn resolve_request(request: &CalculationRequest) -> Result<ResolvedFeatures> {
    resolve(
        &request.tree_data,
        &request.environmental_data,
        &request.ecosystem_data,
        request.area_hectares,
    )
}

/// Merge, validate and default the three partial records
pub fn resolve(
    tree: &Map<String, Value>,
    environmental: &Map<String, Value>,
    ecosystem: &Map<String, Value>,
    area_override: Option<f64>,
) -> Result<ResolvedFeatures> {
    let tree = canonicalize(tree);

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|name| !tree.get(**name).is_some_and(is_truthy))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EstimationError::MissingField { fields: missing });
    }

    let mut merged = tree;
    for source in [environmental, ecosystem] {
        merged.extend(canonicalize(source));
    }
    if let Some(area) = area_override {
        merged.insert("area_hectares".to_string(), Value::from(area));
    }

    for (key, default) in DEFAULTS {
        match merged.get(key) {
            Some(value) if !value.is_null() => {}
            _ => {
                debug!(field = key, "applying default");
                merged.insert(key.to_string(), default.to_json());
            }
        }
    }

    let fields = Fields(&merged);

    let tree = TreeObservation {
        dbh: fields.positive("dbh")?,
        tree_height: fields.positive("tree_height")?,
        species: Species::from_name(&fields.text("species")?),
        tree_age: fields.non_negative("tree_age")?,
        crown_diameter: fields.number("crown_diameter")?,
        wood_density: fields.number("wood_density")?,
        bark_thickness: fields.number("bark_thickness")?,
    };

    let environment = EnvironmentalContext {
        soil_ph: fields.number("soil_ph")?,
        soil_organic_matter: fields.number("soil_organic_matter")?,
        precipitation: fields.number("precipitation")?,
        temperature: fields.number("temperature")?,
        humidity: fields.number("humidity")?,
        elevation: fields.number("elevation")?,
        slope: fields.number("slope")?,
        aspect: fields.number("aspect")?,
        distance_to_water: fields.number("distance_to_water")?,
        canopy_density: fields.number("canopy_density")?,
        leaf_area_index: fields.number("leaf_area_index")?,
        ndvi: fields.number("ndvi")?,
        tree_count_per_hectare: fields.number("tree_count_per_hectare")?,
        climate_zone: ClimateZone::from_name(&fields.text("climate_zone")?),
    };

    let ecosystem = EcosystemContext {
        area_hectares: fields.number("area_hectares")?,
        site_index: fields.number("site_index")?,
        competition_index: fields.number("competition_index")?,
        soil_fertility: fields.number("soil_fertility")?,
    };

    Ok(ResolvedFeatures {
        tree,
        environment,
        ecosystem,
    })
}

/// Rewrite alias keys; a canonical key present in the same record wins
fn canonicalize(source: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in source {
        if let Some((_, canonical)) = FIELD_ALIASES.iter().find(|(alias, _)| *alias == key.as_str()) {
            if !source.contains_key(*canonical) {
                out.insert(canonical.to_string(), value.clone());
            }
        } else {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// `null`, `false`, zero, empty strings and empty containers count as absent
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn number(&self, key: &str) -> Result<f64> {
        let value = match self.0.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match value {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(EstimationError::invalid_field(key, "expected a finite number")),
        }
    }

    fn positive(&self, key: &str) -> Result<f64> {
        let v = self.number(key)?;
        if v <= 0.0 {
            return Err(EstimationError::invalid_field(key, format!("must be > 0, got {v}")));
        }
        Ok(v)
    }

    fn non_negative(&self, key: &str) -> Result<f64> {
        let v = self.number(key)?;
        if v < 0.0 {
            return Err(EstimationError::invalid_field(key, format!("must be >= 0, got {v}")));
        }
        Ok(v)
    }

    fn text(&self, key: &str) -> Result<String> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(EstimationError::invalid_field(key, "expected a non-empty string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn minimal_tree() -> Map<String, Value> {
        obj(json!({"dbh": 25, "tree_height": 12, "species": "Rhizophora"}))
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let resolved = resolve(&minimal_tree(), &Map::new(), &Map::new(), None).unwrap();

        assert_eq!(resolved.tree.tree_age, 10.0);
        assert_eq!(resolved.tree.wood_density, 0.6);
        assert_eq!(resolved.environment.precipitation, 2000.0);
        assert_eq!(resolved.environment.tree_count_per_hectare, 500.0);
        assert_eq!(resolved.environment.climate_zone, ClimateZone::Tropical);
        assert_eq!(resolved.ecosystem.area_hectares, 1.0);
        assert_eq!(resolved.ecosystem.site_index, 20.0);
    }

    #[test]
    fn missing_fields_are_listed_in_order() {
        let tree = obj(json!({"species": "", "tree_age": 12}));
        let env = obj(json!({"dbh": 30, "tree_height": 10}));

        let err = resolve(&tree, &env, &Map::new(), None).unwrap_err();
        match err {
            EstimationError::MissingField { fields } => {
                assert_eq!(fields, vec!["dbh", "tree_height", "species"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_and_null_count_as_missing() {
        let tree = obj(json!({"dbh": 0, "tree_height": null, "species": "Avicennia"}));
        let err = resolve(&tree, &Map::new(), &Map::new(), None).unwrap_err();
        match err {
            EstimationError::MissingField { fields } => {
                assert_eq!(fields, vec!["dbh", "tree_height"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn later_sources_overwrite_earlier_ones() {
        let tree = obj(json!({"dbh": 25, "tree_height": 12, "species": "Rhizophora", "site_index": 10}));
        let env = obj(json!({"temperature": 30, "site_index": 15}));
        let eco = obj(json!({"site_index": 25, "area_hectares": 2.5}));

        let resolved = resolve(&tree, &env, &eco, None).unwrap();
        assert_eq!(resolved.ecosystem.site_index, 25.0);
        assert_eq!(resolved.environment.temperature, 30.0);
        assert_eq!(resolved.ecosystem.area_hectares, 2.5);
    }

    #[test]
    fn top_level_area_wins() {
        let eco = obj(json!({"area_hectares": 2.5}));
        let resolved = resolve(&minimal_tree(), &Map::new(), &eco, Some(4.0)).unwrap();
        assert_eq!(resolved.ecosystem.area_hectares, 4.0);
    }

    #[test]
    fn aliases_map_to_canonical_keys() {
        let tree = obj(json!({"diameter": 30, "height": 15, "species": "Bruguiera", "age": 40}));
        let env = obj(json!({"organic_matter": 9.5, "stocking_density": 800}));

        let resolved = resolve(&tree, &env, &Map::new(), None).unwrap();
        assert_eq!(resolved.tree.dbh, 30.0);
        assert_eq!(resolved.tree.tree_height, 15.0);
        assert_eq!(resolved.tree.tree_age, 40.0);
        assert_eq!(resolved.environment.soil_organic_matter, 9.5);
        assert_eq!(resolved.environment.tree_count_per_hectare, 800.0);
    }

    #[test]
    fn canonical_key_beats_alias_in_same_record() {
        let tree = obj(json!({"dbh": 25, "diameter": 99, "tree_height": 12, "species": "Rhizophora"}));
        let resolved = resolve(&tree, &Map::new(), &Map::new(), None).unwrap();
        assert_eq!(resolved.tree.dbh, 25.0);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let tree = obj(json!({"dbh": "25.5", "tree_height": 12, "species": "Rhizophora"}));
        let resolved = resolve(&tree, &Map::new(), &Map::new(), None).unwrap();
        assert_eq!(resolved.tree.dbh, 25.5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let tree = obj(json!({"dbh": -3, "tree_height": 12, "species": "Rhizophora"}));
        let err = resolve(&tree, &Map::new(), &Map::new(), None).unwrap_err();
        assert!(matches!(err, EstimationError::InvalidField { ref field, .. } if field == "dbh"));

        let env = obj(json!({"temperature": "warm"}));
        let err = resolve(&minimal_tree(), &env, &Map::new(), None).unwrap_err();
        assert!(matches!(err, EstimationError::InvalidField { ref field, .. } if field == "temperature"));
    }

    #[test]
    fn feature_input_carries_categoricals() {
        let resolved = resolve(&minimal_tree(), &Map::new(), &Map::new(), None).unwrap();
        let input = resolved.feature_input();

        assert_eq!(input.numeric("dbh"), Some(25.0));
        assert_eq!(input.numeric("ndvi"), Some(0.6));
        assert_eq!(input.categorical("species"), Some("Rhizophora"));
        assert_eq!(input.categorical("climate_zone"), Some("tropical"));
    }
}
