//! Manifest compatibility with files written by older runs

use crate::integration::test_utils::{items, pipeline_config, RecordingSleeper, StubGenerator};
use assetforge::manifest::{ArtifactLayout, ProgressStore};
use assetforge::pipeline::{NoopObserver, PipelineRunner};
use assetforge::reference::NoReference;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_legacy_manifest_with_unknown_fields_loads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("manifest.json");
    std::fs::write(
        &path,
        r#"{"generated": ["tata_nexon"], "failed": ["kia_seltos"], "notes": "hand edited"}"#,
    )
    .unwrap();

    let store = ProgressStore::load(&path, ArtifactLayout::new(temp_dir.path(), "png"));
    assert!(store.is_done("tata_nexon"));
    assert!(!store.is_done("kia_seltos"));
    assert!(store.record().methods.is_empty());
    assert!(store.record().summary.is_none());
}

#[tokio::test]
async fn test_corrupt_manifest_is_treated_as_empty_and_rewritten() {
    let temp_dir = TempDir::new().unwrap();
    let config = pipeline_config(temp_dir.path());
    std::fs::create_dir_all(&config.output_dir).unwrap();
    std::fs::write(&config.progress_file, b"{\"generated\": [\"trunc").unwrap();

    let generator = Arc::new(StubGenerator::new());
    let mut runner = PipelineRunner::new(
        config.clone(),
        generator.clone(),
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&items(2), &mut NoopObserver).await.unwrap();
    assert_eq!(summary.generated, 2);

    let raw = std::fs::read_to_string(&config.progress_file).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["generated"].as_array().unwrap().len(), 2);
    assert_eq!(value["summary"]["methods"]["text"], 2);
    assert!(value["started_at"].is_string());
    assert!(value["completed_at"].is_string());
}

#[tokio::test]
async fn test_manifest_sets_are_sorted_arrays() {
    let temp_dir = TempDir::new().unwrap();
    let config = pipeline_config(temp_dir.path());
    let mut work = items(3);
    work.reverse();

    let mut runner = PipelineRunner::new(
        config.clone(),
        Arc::new(StubGenerator::new()),
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    runner.run(&work, &mut NoopObserver).await.unwrap();

    let raw = std::fs::read_to_string(&config.progress_file).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let keys: Vec<&str> = value["generated"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["make_model_1", "make_model_2", "make_model_3"]);
    assert!(!temp_dir.path().join("out/manifest.json.tmp").exists());
}
