//! Resumable generation pipeline
//!
//! Walks the work set in order. Each item is skipped, succeeds or fails:
//!
//! - skipped when the manifest or the disk already has it (no sleep);
//! - succeeded when generation returns bytes: artifact written, manifest
//!   flushed, then the rate limiter waits;
//! - failed when retries are exhausted: error log and manifest updated, and the
//!   loop moves on.
//!
//! Storage failures abort the run because they break the resume guarantee.

use crate::error::{ApiError, ServiceError, StorageError};
use crate::error_log::ErrorLog;
use crate::generation::{GenerationMode, ImageGenerator};
use crate::key::WorkItem;
use crate::manifest::{ArtifactLayout, ProgressStore, RunSummary};
use crate::persist::write_atomic;
use crate::rate_limit::RateLimiter;
use crate::reference::ReferenceSource;
use crate::retry::{run_with_retry, RetryPolicy, Sleeper};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Everything the runner needs to know about one pipeline target.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pause after every successful call; also seeds rate-limit backoff.
    pub request_delay: Duration,
    /// Attempts per item, including the first.
    pub max_retries: u32,
    /// Unit for linear backoff on non-rate-limit failures.
    pub retry_unit: Duration,
    pub output_dir: PathBuf,
    pub output_extension: String,
    pub progress_file: PathBuf,
    pub error_log: PathBuf,
    pub model_year: u16,
    pub cost_per_image: f64,
    pub edit_prompt: String,
    pub text_prompt_template: String,
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            rate_limit_base: self.request_delay,
            linear_unit: self.retry_unit,
        }
    }

    pub fn artifact_layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.output_dir, &self.output_extension)
    }
}

/// Partition of a work set computed before any quota is spent.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub to_skip: Vec<WorkItem>,
    pub to_process: Vec<WorkItem>,
}

impl RunPlan {
    pub fn total(&self) -> usize {
        self.to_skip.len() + self.to_process.len()
    }

    pub fn remaining(&self) -> usize {
        self.to_process.len()
    }

    pub fn estimated_cost(&self, cost_per_image: f64) -> f64 {
        self.remaining() as f64 * cost_per_image
    }

    pub fn estimated_minutes(&self, request_delay: Duration) -> u64 {
        (self.remaining() as u64 * request_delay.as_secs()) / 60
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped,
    Succeeded(GenerationMode),
    Failed(String),
}

/// Per-item progress hooks, used by the CLI to print one line per item.
pub trait RunObserver: Send {
    fn on_item_start(&mut self, _index: usize, _total: usize, _item: &WorkItem) {}
    fn on_item_finished(
        &mut self,
        _index: usize,
        _total: usize,
        _item: &WorkItem,
        _outcome: &ItemOutcome,
    ) {
    }
}

pub struct NoopObserver;

impl RunObserver for NoopObserver {}

pub struct PipelineRunner {
    config: PipelineConfig,
    generator: Arc<dyn ImageGenerator>,
    references: Arc<dyn ReferenceSource>,
    sleeper: Arc<dyn Sleeper>,
    store: ProgressStore,
    errors: ErrorLog,
    limiter: RateLimiter,
}

impl PipelineRunner {
    /// Load the manifest and wire the collaborators together.
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn ImageGenerator>,
        references: Arc<dyn ReferenceSource>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let store = ProgressStore::load(&config.progress_file, config.artifact_layout());
        let errors = ErrorLog::new(&config.error_log);
        let limiter = RateLimiter::new(config.request_delay, Arc::clone(&sleeper));
        Self {
            config,
            generator,
            references,
            sleeper,
            store,
            errors,
            limiter,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn plan(&self, items: &[WorkItem]) -> RunPlan {
        let (to_skip, to_process): (Vec<WorkItem>, Vec<WorkItem>) = items
            .iter()
            .cloned()
            .partition(|item| self.store.is_done(&item.key()));
        RunPlan {
            to_skip,
            to_process,
        }
    }

    /// Process every item not already done.
    pub async fn run(
        &mut self,
        items: &[WorkItem],
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary, ApiError> {
        self.run_items(items, false, observer).await
    }

    /// Regenerate `items` even if they are done. An existing artifact is only
    /// replaced once its successor has been generated.
    pub async fn regenerate(
        &mut self,
        items: &[WorkItem],
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary, ApiError> {
        self.run_items(items, true, observer).await
    }

    async fn run_items(
        &mut self,
        items: &[WorkItem],
        force: bool,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary, ApiError> {
        let total = items.len();
        let mut summary = RunSummary::default();
        info!(total, force, "Starting generation run");

        for (index, item) in items.iter().enumerate() {
            let index = index + 1;
            let key = item.key();

            if !force && self.store.is_done(&key) {
                debug!(key = %key, "Already generated, skipping");
                summary.skipped += 1;
                observer.on_item_finished(index, total, item, &ItemOutcome::Skipped);
                continue;
            }

            observer.on_item_start(index, total, item);
            let outcome = self.process_item(item, &key).await?;
            match &outcome {
                ItemOutcome::Succeeded(mode) => summary.count_success(*mode),
                ItemOutcome::Failed(_) => summary.failed += 1,
                ItemOutcome::Skipped => summary.skipped += 1,
            }
            observer.on_item_finished(index, total, item, &outcome);
        }

        self.store.finalize(summary.clone())?;
        info!(
            generated = summary.generated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Generation run complete"
        );
        Ok(summary)
    }

    async fn process_item(&mut self, item: &WorkItem, key: &str) -> Result<ItemOutcome, StorageError> {
        match self.generate(item).await {
            Ok((image, mode)) => {
                write_atomic(&self.store.artifact_path(key), &image)?;
                self.store.record_success(key, mode)?;
                info!(key = %key, mode = %mode, bytes = image.len(), "Generated");
                self.limiter.wait().await;
                Ok(ItemOutcome::Succeeded(mode))
            }
            Err(err) => {
                error!(key = %key, error = %err, "Generation failed permanently");
                self.errors.record(item, &err)?;
                self.store.record_failure(key)?;
                Ok(ItemOutcome::Failed(err.to_string()))
            }
        }
    }

    /// Pick the mode from reference availability, then retry that mode.
    async fn generate(&self, item: &WorkItem) -> Result<(Vec<u8>, GenerationMode), ServiceError> {
        let policy = self.config.retry_policy();
        let generator = self.generator.as_ref();
        let sleeper = self.sleeper.as_ref();

        match self.references.fetch(item).await {
            Some(reference) => {
                let reference = reference.as_slice();
                let prompt = self.config.edit_prompt.as_str();
                let image = run_with_retry(&policy, sleeper, |_| {
                    generator.generate_from_reference(reference, prompt)
                })
                .await?;
                Ok((image, GenerationMode::Reference))
            }
            None => {
                debug!(key = %item.key(), "No reference, using text-only generation");
                let year = self.config.model_year;
                let template = self.config.text_prompt_template.as_str();
                let image = run_with_retry(&policy, sleeper, |_| {
                    generator.generate_from_text(item, year, template)
                })
                .await?;
                Ok((image, GenerationMode::Text))
            }
        }
    }
}
