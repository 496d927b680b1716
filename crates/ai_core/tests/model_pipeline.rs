//! End-to-end checks for the inference pipeline: encode, scale, score,
//! persist and reload.

use carbon_ai_core::gbdt::{Model, Node, Tree};
use carbon_ai_core::serde_canon::hash_canonical_hex;
use carbon_ai_core::{FeatureSchema, LabelEncoder, StandardScaler};
use tempfile::tempdir;

fn fitted_pipeline() -> (FeatureSchema, LabelEncoder, StandardScaler, Model) {
    let schema = FeatureSchema::new(["dbh", "species_encoded"]);
    let encoder = LabelEncoder::fit(["Rhizophora", "Avicennia", "Bruguiera"]);

    let rows = vec![vec![10.0, 0.0], vec![20.0, 1.0], vec![30.0, 2.0]];
    let scaler = StandardScaler::fit(&rows).unwrap();

    let tree = Tree::new(
        vec![
            Node::internal(0, 0, 0.0, 1, 2),
            Node::leaf(1, -10.0),
            Node::leaf(2, 10.0),
        ],
        0.5,
    );
    let model = Model::new(vec![tree], 100.0, schema.len());

    (schema, encoder, scaler, model)
}

#[test]
fn scaled_rows_route_through_trees() {
    let (_, encoder, scaler, model) = fitted_pipeline();

    let small = vec![12.0, encoder.encode("Avicennia") as f64];
    let large = vec![28.0, encoder.encode("Rhizophora") as f64];

    let small = scaler.transform(&small).unwrap();
    let large = scaler.transform(&large).unwrap();

    assert_eq!(model.score(&small), 95.0);
    assert_eq!(model.score(&large), 105.0);
}

#[test]
fn unseen_category_uses_fallback_code() {
    let (_, encoder, _, _) = fitted_pipeline();
    assert_eq!(encoder.encode("Sonneratia"), 0);
    assert_eq!(encoder.decode(0), Some("Avicennia"));
}

#[test]
fn saved_model_reloads_with_identical_hash() {
    let (_, _, _, model) = fitted_pipeline();
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.json");

    model.save_json(&path).unwrap();
    let loaded = Model::load_json(&path).unwrap();

    assert_eq!(loaded, model);
    assert_eq!(loaded.hash_hex().unwrap(), model.hash_hex().unwrap());
    assert_eq!(loaded.score(&[0.5, 0.0]), model.score(&[0.5, 0.0]));
}

#[test]
fn preprocessing_state_hashes_stably() {
    let (_, encoder, scaler, _) = fitted_pipeline();

    let first = hash_canonical_hex(&(&encoder, &scaler)).unwrap();
    let second = hash_canonical_hex(&(encoder.clone(), scaler.clone())).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 64);
}

#[test]
fn corrupted_model_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{"version":1,"feature_count":1,"base_score":0.0,"trees":[{"nodes":[{"id":0,"left":7,"right":8,"feature_idx":0,"threshold":1.0,"leaf":null}],"weight":1.0}]}"#,
    )
    .unwrap();

    assert!(Model::load_json(&path).is_err());
}
