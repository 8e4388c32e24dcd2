//! Direction classification
//!
//! Batched variant of the pipeline: images are grouped into fixed-size batches,
//! each batch is labeled by one multi-image vision call, and labels are cached
//! per filename. A cached file is never sent again.
//!
//! When a batch cannot be labeled (call failed after retries, or the reply did
//! not parse) every file in it gets [`Direction::Left`], which means "no flip".
//! The default is cached like a real answer; delete the cache entry to retry.

use crate::error::{ApiError, ServiceError, StorageError};
use crate::generation::build_service_http_client;
use crate::persist::write_atomic;
use crate::rate_limit::RateLimiter;
use crate::retry::{run_with_retry, RetryPolicy, Sleeper};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Which way the front of the car points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Label assigned when a batch cannot be classified.
    pub const FALLBACK: Direction = Direction::Left;

    /// Catalog images face left; right-facing ones get mirrored.
    pub fn needs_flip(self) -> bool {
        self == Direction::Right
    }

    fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// filename → direction, flushed after every batch.
pub struct DirectionCache {
    path: PathBuf,
    entries: BTreeMap<String, Direction>,
}

impl DirectionCache {
    /// Never fails; a missing or corrupt cache starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read(&path)
            .ok()
            .and_then(|bytes| match serde_json::from_slice(&bytes) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!(cache = %path.display(), error = %e, "Corrupt direction cache, starting fresh");
                    None
                }
            })
            .unwrap_or_default();
        Self { path, entries }
    }

    pub fn get(&self, file_name: &str) -> Option<Direction> {
        self.entries.get(file_name).copied()
    }

    pub fn insert(&mut self, file_name: impl Into<String>, direction: Direction) {
        self.entries.insert(file_name.into(), direction);
    }

    pub fn entries(&self) -> &BTreeMap<String, Direction> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(&self.entries).map_err(|e| StorageError::Serialize {
            what: "direction cache",
            message: e.to_string(),
        })?;
        write_atomic(&self.path, &bytes)
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationImage {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait DirectionClassifier: Send + Sync {
    /// Send one batch and return the raw model reply.
    async fn classify_batch(&self, images: &[ClassificationImage]) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct VisionClientSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub prompt: String,
    pub timeout: Duration,
}

/// Chat-completions vision classifier: one user message carrying the prompt and
/// every image of the batch as a data URL.
pub struct OpenAiVisionClassifier {
    client: Client,
    settings: VisionClientSettings,
}

impl OpenAiVisionClassifier {
    pub fn new(settings: VisionClientSettings) -> Result<Self, ApiError> {
        let client = build_service_http_client(settings.timeout)?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl DirectionClassifier for OpenAiVisionClassifier {
    async fn classify_batch(&self, images: &[ClassificationImage]) -> Result<String, ServiceError> {
        let mut content = vec![json!({
            "type": "text",
            "text": self.settings.prompt.replace("{count}", &images.len().to_string()),
        })];
        for image in images {
            content.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", image.mime_type, BASE64_STANDARD.encode(&image.bytes)),
                    "detail": "low",
                },
            }));
        }
        let body = json!({
            "model": self.settings.model,
            "messages": [{"role": "user", "content": content}],
            "temperature": 0.0,
            "max_tokens": 16 * images.len() + 32,
        });

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&body)
            .send()
            .await
            .map_err(ServiceError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::from_status(status.as_u16(), error_text));
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::other(format!("Failed to parse response: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::other("No choices in response"))
    }
}

/// Extract exactly `expected` labels from a model reply.
///
/// Tolerates prose or code fences around the JSON array.
pub fn parse_directions(reply: &str, expected: usize) -> Option<Vec<Direction>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }
    let labels: Vec<String> = serde_json::from_str(&reply[start..=end]).ok()?;
    if labels.len() != expected {
        return None;
    }
    labels.iter().map(|l| Direction::parse(l)).collect()
}

const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
];

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Image files directly inside `dir`, sorted by name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, ApiError> {
    if !dir.is_dir() {
        return Err(ApiError::ConfigError(format!(
            "Image directory not found: {}",
            dir.display()
        )));
    }
    Ok(WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && mime_for(e.path()).is_some())
        .map(|e| e.into_path())
        .collect())
}

#[derive(Debug, Clone)]
pub struct ClassificationConfig {
    pub batch_size: usize,
    pub request_delay: Duration,
    pub max_retries: u32,
    pub retry_unit: Duration,
    pub cache_file: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    /// Files answered by the model in this run.
    pub classified: usize,
    /// Files already in the cache.
    pub cached: usize,
    /// Files given the fallback label in this run.
    pub defaulted: usize,
    /// Files that could not be read. They stay uncached so a rerun retries them.
    pub unreadable: usize,
    pub batches: usize,
}

pub struct ClassificationRunner {
    config: ClassificationConfig,
    classifier: Arc<dyn DirectionClassifier>,
    sleeper: Arc<dyn Sleeper>,
    cache: DirectionCache,
    limiter: RateLimiter,
}

impl ClassificationRunner {
    pub fn new(
        config: ClassificationConfig,
        classifier: Arc<dyn DirectionClassifier>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let cache = DirectionCache::load(&config.cache_file);
        let limiter = RateLimiter::new(config.request_delay, Arc::clone(&sleeper));
        Self {
            config,
            classifier,
            sleeper,
            cache,
            limiter,
        }
    }

    pub fn cache(&self) -> &DirectionCache {
        &self.cache
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.max_retries,
            rate_limit_base: self.config.request_delay,
            linear_unit: self.config.retry_unit,
        }
    }

    pub async fn run(&mut self, files: &[PathBuf]) -> Result<ClassificationSummary, ApiError> {
        let mut summary = ClassificationSummary::default();
        let mut pending = Vec::new();
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.cache.get(name).is_some() {
                summary.cached += 1;
            } else {
                pending.push(path.clone());
            }
        }

        let batch_size = self.config.batch_size.max(1);
        info!(
            pending = pending.len(),
            cached = summary.cached,
            batch_size,
            "Starting direction classification"
        );

        for batch in pending.chunks(batch_size) {
            summary.batches += 1;
            let (images, unreadable) = read_batch(batch).await;
            summary.unreadable += unreadable.len();

            if !images.is_empty() {
                let labels = self.label_batch(&images).await;
                match labels {
                    Some(labels) => {
                        for (image, direction) in images.iter().zip(labels) {
                            self.cache.insert(image.file_name.clone(), direction);
                        }
                        summary.classified += images.len();
                    }
                    None => {
                        for image in &images {
                            self.cache.insert(image.file_name.clone(), Direction::FALLBACK);
                        }
                        summary.defaulted += images.len();
                    }
                }
            }

            self.cache.flush()?;
            if !images.is_empty() {
                self.limiter.wait().await;
            }
        }

        info!(
            classified = summary.classified,
            cached = summary.cached,
            defaulted = summary.defaulted,
            unreadable = summary.unreadable,
            "Direction classification complete"
        );
        Ok(summary)
    }

    async fn label_batch(&self, images: &[ClassificationImage]) -> Option<Vec<Direction>> {
        let classifier = self.classifier.as_ref();
        let reply = run_with_retry(&self.retry_policy(), self.sleeper.as_ref(), |_| {
            classifier.classify_batch(images)
        })
        .await;

        match reply {
            Ok(reply) => {
                let parsed = parse_directions(&reply, images.len());
                if parsed.is_none() {
                    warn!(
                        batch = images.len(),
                        reply = %reply,
                        "Unparseable classification reply, using fallback label"
                    );
                }
                parsed
            }
            Err(err) => {
                warn!(batch = images.len(), error = %err, "Classification failed, using fallback label");
                None
            }
        }
    }
}

async fn read_batch(paths: &[PathBuf]) -> (Vec<ClassificationImage>, Vec<String>) {
    let mut images = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in paths {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let mime_type = mime_for(path).unwrap_or("image/png");
        match tokio::fs::read(path).await {
            Ok(bytes) => images.push(ClassificationImage {
                file_name,
                mime_type,
                bytes,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable image, leaving it unclassified");
                unreadable.push(file_name);
            }
        }
    }
    (images, unreadable)
}
