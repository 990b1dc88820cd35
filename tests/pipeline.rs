//! End-to-end pipeline tests against fixture artifacts written to disk.

use engagement_predictor::config::ArtifactsConfig;
use engagement_predictor::error::{ArtifactKind, PredictError};
use engagement_predictor::{ArtifactLoader, FeatureExtractor, FeatureRecord, PostInput, PredictionPipeline};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Writes a small forest over Type, Category, Post Hour, Paid, reach and
/// impressions, encoders for Type (no "Video") and Category, and a min-max
/// scaler mapping total interactions 0..1000 onto 0..1.
fn write_fixture(dir: &Path) {
    let model = json!({
        "n_features": 18,
        "trees": [
            {"nodes": [
                {"feature": 7, "threshold": 0.05, "left": 1, "right": 2},
                {"value": 0.02},
                {"feature": 8, "threshold": 0.15, "left": 3, "right": 4},
                {"value": 0.10},
                {"value": 0.30}
            ]},
            {"nodes": [
                {"feature": 1, "threshold": 0.5, "left": 1, "right": 2},
                {"value": 0.05},
                {"feature": 5, "threshold": 10.5, "left": 3, "right": 4},
                {"value": 0.08},
                {"value": 0.14}
            ]},
            {"nodes": [
                {"feature": 6, "threshold": 0.5, "left": 1, "right": 4},
                {"feature": 2, "threshold": 0.5, "left": 2, "right": 3},
                {"value": 0.04},
                {"value": 0.12},
                {"value": 0.20}
            ]}
        ]
    });
    let encoders = json!({
        "Type": {"classes": ["Link", "Photo", "Status"]},
        "Category": {"classes": ["1", "2", "3"]}
    });
    let scaler = json!({
        "kind": "min_max",
        "data_min": [0.0, 0.0, 0.0],
        "data_max": [100000.0, 200000.0, 1000.0],
        "feature_range": [0.0, 1.0],
        "feature_names": [
            "Lifetime Post Total Reach",
            "Lifetime Post Total Impressions",
            "Total Interactions"
        ]
    });

    fs::write(dir.join("rf_model.json"), model.to_string()).unwrap();
    fs::write(dir.join("encoders.json"), encoders.to_string()).unwrap();
    fs::write(dir.join("scaler.json"), scaler.to_string()).unwrap();
}

fn fixture_pipeline() -> (TempDir, PredictionPipeline) {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let artifacts = ArtifactLoader::new(&ArtifactsConfig::in_dir(dir.path()))
        .load()
        .unwrap();
    (dir, PredictionPipeline::new(Arc::new(artifacts)))
}

fn reference_post() -> PostInput {
    PostInput {
        post_type: "Photo".to_string(),
        category: 2,
        month: 6,
        weekday: 3,
        hour: 12,
        paid: 0,
        reach: 10000.0,
        impressions: 20000.0,
        fan_reach: 5000.0,
    }
}

#[test]
fn test_reference_scenario() {
    let (_dir, pipeline) = fixture_pipeline();

    let result = pipeline.predict(&reference_post()).unwrap();

    // trees: 0.10 (reach/impressions), 0.14 (Photo at noon), 0.12 (unpaid, category 2)
    assert!((result.scaled - 0.12).abs() < 1e-12);
    assert!((result.value - 120.0).abs() < 1e-6);
    assert_eq!(result.rounded, 120);

    assert_eq!(result.record.len(), 18);
    assert_eq!(result.processed.len(), 19);
    assert!(result.processed.columns().last() == Some("Total Interactions"));
}

#[test]
fn test_identical_inputs_give_identical_predictions() {
    let (_dir, pipeline) = fixture_pipeline();

    let first = pipeline.predict(&reference_post()).unwrap();
    let second = pipeline.predict(&reference_post()).unwrap();

    assert_eq!(first.value.to_bits(), second.value.to_bits());
    assert_eq!(first.scaled.to_bits(), second.scaled.to_bits());
}

#[test]
fn test_construction_order_does_not_change_prediction() {
    let (_dir, pipeline) = fixture_pipeline();
    let record = FeatureExtractor::new().extract(&reference_post());
    let (baseline, _, _) = pipeline.predict_record(record.clone()).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let mut entries = record.clone().into_entries();
        entries.shuffle(&mut rng);

        let (value, _, _) = pipeline
            .predict_record(FeatureRecord::from_entries(entries))
            .unwrap();
        assert_eq!(value.to_bits(), baseline.to_bits());
    }
}

#[test]
fn test_scaler_round_trip_with_fixed_third_slot() {
    let (_dir, pipeline) = fixture_pipeline();
    let scaler = &pipeline.artifacts().scaler;

    let original = [10000.0, 20000.0, 0.0];
    let back = scaler.inverse_transform_row(scaler.transform_row(original));

    assert!((back[0] - original[0]).abs() < 1e-6);
    assert!((back[1] - original[1]).abs() < 1e-6);
}

#[test]
fn test_unseen_post_type_is_unknown_category() {
    let (_dir, pipeline) = fixture_pipeline();
    let post = PostInput {
        post_type: "Video".to_string(),
        ..reference_post()
    };

    let err = pipeline.predict(&post).unwrap_err();
    assert_eq!(
        err,
        PredictError::UnknownCategory {
            column: "Type".to_string(),
            value: "Video".to_string(),
        }
    );
    assert!(err.user_message().starts_with("prediction failed"));
}

#[test]
fn test_predictions_are_non_negative() {
    let (_dir, pipeline) = fixture_pipeline();
    let mut rng = StdRng::seed_from_u64(42);
    let types = ["Photo", "Status", "Link"];

    for _ in 0..200 {
        let reach = rng.gen_range(0.0..150_000.0);
        let post = PostInput {
            post_type: types[rng.gen_range(0..types.len())].to_string(),
            category: rng.gen_range(1..=3),
            month: rng.gen_range(1..=12),
            weekday: rng.gen_range(1..=7),
            hour: rng.gen_range(0..=23),
            paid: rng.gen_range(0..=1),
            reach,
            impressions: reach * rng.gen_range(1.0..3.0),
            fan_reach: reach * rng.gen_range(0.0..1.0),
        };

        let result = pipeline.predict(&post).unwrap();
        assert!(result.value.is_finite());
        assert!(result.rounded >= 0, "{post:?} -> {}", result.value);
    }
}

#[test]
fn test_missing_artifact_aborts_loading() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    fs::remove_file(dir.path().join("rf_model.json")).unwrap();

    let err = ArtifactLoader::new(&ArtifactsConfig::in_dir(dir.path()))
        .load()
        .err()
        .unwrap();

    assert!(err.any_missing());
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].kind(), ArtifactKind::Model);
}

#[test]
fn test_model_width_mismatch_is_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    fs::write(
        dir.path().join("rf_model.json"),
        json!({"n_features": 17, "trees": [{"nodes": [{"value": 0.1}]}]}).to_string(),
    )
    .unwrap();

    let artifacts = ArtifactLoader::new(&ArtifactsConfig::in_dir(dir.path()))
        .load()
        .unwrap();
    let pipeline = PredictionPipeline::new(Arc::new(artifacts));

    assert!(matches!(
        pipeline.predict(&reference_post()),
        Err(PredictError::SchemaMismatch(_))
    ));
}

#[test]
fn test_encoder_for_column_outside_record_is_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    fs::write(
        dir.path().join("encoders.json"),
        json!({
            "Type": {"classes": ["Link", "Photo", "Status"]},
            "Total Interactions": {"classes": ["0"]}
        })
        .to_string(),
    )
    .unwrap();

    let artifacts = ArtifactLoader::new(&ArtifactsConfig::in_dir(dir.path()))
        .load()
        .unwrap();
    let pipeline = PredictionPipeline::new(Arc::new(artifacts));

    let err = pipeline.predict(&reference_post()).unwrap_err();
    assert!(matches!(&err, PredictError::SchemaMismatch(msg) if msg.contains("Total Interactions")));
    assert!(err.user_message().starts_with("prediction failed"));
}
