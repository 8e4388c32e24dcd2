//! Integration tests for batched direction classification

use crate::integration::test_utils::{RecordingSleeper, ScriptedClassifier};
use assetforge::classify::{
    list_images, ClassificationConfig, ClassificationRunner, Direction, DirectionCache,
};
use assetforge::error::ServiceError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config(root: &Path, batch_size: usize) -> ClassificationConfig {
    ClassificationConfig {
        batch_size,
        request_delay: Duration::from_secs(2),
        max_retries: 2,
        retry_unit: Duration::from_secs(1),
        cache_file: root.join("direction_cache.json"),
    }
}

fn images(root: &Path, n: usize) -> Vec<PathBuf> {
    let dir = root.join("images");
    std::fs::create_dir_all(&dir).unwrap();
    for i in 1..=n {
        std::fs::write(dir.join(format!("car_{}.png", i)), format!("png{}", i)).unwrap();
    }
    list_images(&dir).unwrap()
}

#[tokio::test]
async fn test_batches_are_labeled_and_cached() {
    let temp_dir = TempDir::new().unwrap();
    let files = images(temp_dir.path(), 3);
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![
        Ok(r#"["left", "right"]"#.to_string()),
        Ok("```json\n[\"right\"]\n```".to_string()),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());

    let mut runner =
        ClassificationRunner::new(config(temp_dir.path(), 2), classifier.clone(), sleeper.clone());
    let summary = runner.run(&files).await.unwrap();

    assert_eq!(summary.classified, 3);
    assert_eq!(summary.batches, 2);
    assert_eq!(
        classifier.batches(),
        vec![
            vec!["car_1.png".to_string(), "car_2.png".to_string()],
            vec!["car_3.png".to_string()],
        ]
    );
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(2); 2]);

    let cache = DirectionCache::load(temp_dir.path().join("direction_cache.json"));
    assert_eq!(cache.get("car_1.png"), Some(Direction::Left));
    assert_eq!(cache.get("car_2.png"), Some(Direction::Right));
    assert_eq!(cache.get("car_3.png"), Some(Direction::Right));
}

#[tokio::test]
async fn test_cached_files_are_not_sent_again() {
    let temp_dir = TempDir::new().unwrap();
    let files = images(temp_dir.path(), 3);
    let mut cache = DirectionCache::load(temp_dir.path().join("direction_cache.json"));
    cache.insert("car_1.png", Direction::Right);
    cache.insert("car_3.png", Direction::Left);
    cache.flush().unwrap();

    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![Ok(
        r#"["left"]"#.to_string()
    )]));
    let mut runner = ClassificationRunner::new(
        config(temp_dir.path(), 10),
        classifier.clone(),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&files).await.unwrap();

    assert_eq!(summary.cached, 2);
    assert_eq!(summary.classified, 1);
    assert_eq!(classifier.batches(), vec![vec!["car_2.png".to_string()]]);

    let classifier = Arc::new(ScriptedClassifier::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut runner =
        ClassificationRunner::new(config(temp_dir.path(), 10), classifier.clone(), sleeper.clone());
    let summary = runner.run(&files).await.unwrap();
    assert_eq!(summary.cached, 3);
    assert!(classifier.batches().is_empty());
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_failed_batch_defaults_to_no_flip() {
    let temp_dir = TempDir::new().unwrap();
    let files = images(temp_dir.path(), 2);
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![
        Err(ServiceError::http(500, "boom")),
        Err(ServiceError::http(500, "boom again")),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());

    let mut runner =
        ClassificationRunner::new(config(temp_dir.path(), 5), classifier.clone(), sleeper.clone());
    let summary = runner.run(&files).await.unwrap();

    assert_eq!(summary.defaulted, 2);
    assert_eq!(summary.classified, 0);
    assert_eq!(classifier.batches().len(), 2, "one call per allowed attempt");
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(runner.cache().get("car_1.png"), Some(Direction::Left));
    assert_eq!(runner.cache().get("car_2.png"), Some(Direction::Left));
}

#[tokio::test]
async fn test_wrong_label_count_defaults_whole_batch() {
    let temp_dir = TempDir::new().unwrap();
    let files = images(temp_dir.path(), 3);
    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![Ok(
        r#"["right", "right"]"#.to_string()
    )]));

    let mut runner = ClassificationRunner::new(
        config(temp_dir.path(), 3),
        classifier.clone(),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&files).await.unwrap();

    assert_eq!(summary.defaulted, 3);
    assert_eq!(classifier.batches().len(), 1, "parse failures are not retried");
    assert!(runner
        .cache()
        .entries()
        .values()
        .all(|d| *d == Direction::Left));
}

#[tokio::test]
async fn test_unreadable_file_stays_uncached() {
    let temp_dir = TempDir::new().unwrap();
    let mut files = images(temp_dir.path(), 1);
    files.push(temp_dir.path().join("images/vanished.png"));

    let classifier = Arc::new(ScriptedClassifier::with_replies(vec![Ok(
        r#"["right"]"#.to_string()
    )]));
    let mut runner = ClassificationRunner::new(
        config(temp_dir.path(), 5),
        classifier.clone(),
        Arc::new(RecordingSleeper::default()),
    );
    let summary = runner.run(&files).await.unwrap();

    assert_eq!(summary.classified, 1);
    assert_eq!(summary.unreadable, 1);
    assert_eq!(summary.defaulted, 0);
    assert_eq!(classifier.batches(), vec![vec!["car_1.png".to_string()]]);

    let cache = DirectionCache::load(temp_dir.path().join("direction_cache.json"));
    assert_eq!(cache.get("car_1.png"), Some(Direction::Right));
    assert_eq!(cache.get("vanished.png"), None);
}
