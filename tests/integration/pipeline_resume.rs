//! Integration tests for the resumable generation pipeline
//!
//! Tests cover:
//! - Resume convergence (second run makes no calls)
//! - Partial-failure tolerance
//! - Reference vs text fallback
//! - Durability across a crash mid-run
//! - Rate limiting only after real calls
//! - Forced regeneration

use crate::integration::test_utils::{
    items, pipeline_config, RecordingSleeper, StubGenerator, StubReferences, REQUEST_DELAY,
    RETRY_UNIT,
};
use assetforge::error::ServiceError;
use assetforge::generation::GenerationMode;
use assetforge::manifest::{ArtifactLayout, ProgressRecord};
use assetforge::pipeline::{NoopObserver, PipelineRunner};
use assetforge::reference::NoReference;
use std::sync::Arc;
use tempfile::TempDir;

fn read_manifest(dir: &TempDir) -> ProgressRecord {
    let raw = std::fs::read_to_string(dir.path().join("out/manifest.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_second_run_makes_no_calls() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(5);

    let generator = Arc::new(StubGenerator::new());
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator.clone(),
        Arc::new(NoReference),
        sleeper.clone(),
    );
    let first = runner.run(&work, &mut NoopObserver).await.unwrap();
    assert_eq!(first.generated, 5);
    assert_eq!(generator.call_count(), 5);
    assert_eq!(sleeper.waits(), vec![REQUEST_DELAY; 5]);

    let generator = Arc::new(StubGenerator::new());
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator.clone(),
        Arc::new(NoReference),
        sleeper.clone(),
    );
    let second = runner.run(&work, &mut NoopObserver).await.unwrap();
    assert_eq!(second.generated, 0);
    assert_eq!(second.skipped, 5);
    assert_eq!(generator.call_count(), 0);
    assert!(sleeper.waits().is_empty(), "skipped items must not sleep");
}

#[tokio::test]
async fn test_artifact_on_disk_counts_as_done_without_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(2);
    let config = pipeline_config(temp_dir.path());
    let layout = ArtifactLayout::new(&config.output_dir, "png");
    std::fs::create_dir_all(&config.output_dir).unwrap();
    std::fs::write(layout.path_for(&work[0].key()), b"hand made").unwrap();

    let generator = Arc::new(StubGenerator::new());
    let mut runner = PipelineRunner::new(
        config,
        generator.clone(),
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&work, &mut NoopObserver).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(generator.calls_for(&work[0].key()), 0);
    assert_eq!(
        std::fs::read(layout.path_for(&work[0].key())).unwrap(),
        b"hand made"
    );
}

#[tokio::test]
async fn test_failed_item_does_not_stop_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(5);
    let bad = work[2].key();

    let generator = Arc::new(
        StubGenerator::new().failing(bad.clone(), ServiceError::http(500, "server exploded")),
    );
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator.clone(),
        Arc::new(NoReference),
        sleeper.clone(),
    );
    let summary = runner.run(&work, &mut NoopObserver).await.unwrap();

    assert_eq!(summary.generated, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(generator.calls_for(&bad), 3, "failing item gets exactly max_retries calls");
    assert_eq!(
        sleeper.waits(),
        vec![
            REQUEST_DELAY,
            REQUEST_DELAY,
            RETRY_UNIT,
            RETRY_UNIT * 2,
            REQUEST_DELAY,
            REQUEST_DELAY,
        ]
    );

    let manifest = read_manifest(&temp_dir);
    assert_eq!(manifest.generated.len(), 4);
    assert!(manifest.failed.contains(&bad));
    assert!(!manifest.generated.contains(&bad));

    let log = std::fs::read_to_string(temp_dir.path().join("out/errors.log")).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("Make Model 3: HTTP 500 (attempt 3): server exploded"));
    assert!(!temp_dir.path().join(format!("out/{}.png", bad)).exists());
}

#[tokio::test]
async fn test_failed_item_is_retried_on_next_run() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(3);
    let bad = work[1].key();

    let generator = Arc::new(StubGenerator::new().failing(bad.clone(), ServiceError::other("nope")));
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator,
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    runner.run(&work, &mut NoopObserver).await.unwrap();

    let generator = Arc::new(StubGenerator::new());
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator.clone(),
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&work, &mut NoopObserver).await.unwrap();
    assert_eq!(summary.generated, 1);
    assert_eq!(generator.calls_for(&bad), 1);

    let manifest = read_manifest(&temp_dir);
    assert!(manifest.failed.is_empty(), "success clears the failure entry");
    assert_eq!(manifest.generated.len(), 3);
}

#[tokio::test]
async fn test_mode_follows_reference_availability() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(4);
    let with_refs = vec![work[0].key(), work[2].key()];

    let generator = Arc::new(StubGenerator::new());
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator.clone(),
        Arc::new(StubReferences::for_keys(with_refs.clone())),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&work, &mut NoopObserver).await.unwrap();
    assert_eq!(summary.methods.get("ref"), Some(&2));
    assert_eq!(summary.methods.get("text"), Some(&2));

    let manifest = read_manifest(&temp_dir);
    for item in &work {
        let key = item.key();
        let expected = if with_refs.contains(&key) {
            GenerationMode::Reference
        } else {
            GenerationMode::Text
        };
        assert_eq!(manifest.methods.get(&key), Some(&expected), "mode for {}", key);
        let artifact = std::fs::read(temp_dir.path().join(format!("out/{}.png", key))).unwrap();
        assert_eq!(artifact, format!("image:{}:{}", expected, key).into_bytes());
    }
    assert!(generator
        .calls()
        .iter()
        .all(|c| (c.mode == GenerationMode::Reference) == with_refs.contains(&c.key)));
}

#[tokio::test]
async fn test_crash_after_second_item_resumes_at_third() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(5);

    let crashing = Arc::new(StubGenerator::new().panicking_on(work[2].key()));
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        crashing,
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    let owned = work.clone();
    let crashed = tokio::spawn(async move { runner.run(&owned, &mut NoopObserver).await }).await;
    assert!(crashed.is_err(), "run should have died mid-way");

    let manifest = read_manifest(&temp_dir);
    assert_eq!(manifest.generated.len(), 2);
    assert!(manifest.completed_at.is_none());

    let generator = Arc::new(StubGenerator::new());
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator.clone(),
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&work, &mut NoopObserver).await.unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.generated, 3);
    let processed: Vec<String> = generator.calls().into_iter().map(|c| c.key).collect();
    assert_eq!(
        processed,
        vec![work[2].key(), work[3].key(), work[4].key()]
    );
    assert!(read_manifest(&temp_dir).completed_at.is_some());
}

#[tokio::test]
async fn test_regenerate_keeps_old_artifact_on_failure() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(2);

    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        Arc::new(StubGenerator::new()),
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    runner.run(&work, &mut NoopObserver).await.unwrap();

    let flaky = work[0].key();
    let generator = Arc::new(StubGenerator::new().failing(flaky.clone(), ServiceError::other("down")));
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator.clone(),
        Arc::new(StubReferences::for_keys(vec![work[1].key()])),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.regenerate(&work, &mut NoopObserver).await.unwrap();
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.failed, 1);

    let kept = std::fs::read(temp_dir.path().join(format!("out/{}.png", flaky))).unwrap();
    assert_eq!(kept, format!("image:text:{}", flaky).into_bytes());
    let replaced =
        std::fs::read(temp_dir.path().join(format!("out/{}.png", work[1].key()))).unwrap();
    assert_eq!(replaced, format!("image:ref:{}", work[1].key()).into_bytes());
}

#[tokio::test]
async fn test_failed_regeneration_is_not_also_listed_as_generated() {
    let temp_dir = TempDir::new().unwrap();
    let work = items(1);
    let key = work[0].key();

    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        Arc::new(StubGenerator::new()),
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    runner.run(&work, &mut NoopObserver).await.unwrap();
    assert!(read_manifest(&temp_dir).generated.contains(&key));

    let generator = Arc::new(StubGenerator::new().failing(key.clone(), ServiceError::other("down")));
    let mut runner = PipelineRunner::new(
        pipeline_config(temp_dir.path()),
        generator,
        Arc::new(NoReference),
        Arc::new(RecordingSleeper::default()),
    );
    runner.regenerate(&work, &mut NoopObserver).await.unwrap();

    let manifest = read_manifest(&temp_dir);
    assert!(manifest.failed.contains(&key));
    assert!(!manifest.generated.contains(&key));
    assert!(manifest.generated.is_disjoint(&manifest.failed));
    assert!(!manifest.methods.contains_key(&key));
    assert!(temp_dir.path().join(format!("out/{}.png", key)).exists());
}
