//! Progress manifest
//!
//! Durable record of which keys have been generated or have failed. It is read
//! once at startup and rewritten in full after every state change, so an
//! interrupted run loses at most the item that was in flight.
//!
//! The store has a single writer. Two runs sharing one manifest are unsupported
//! and may lose progress (last writer wins).

use crate::error::StorageError;
use crate::generation::GenerationMode;
use crate::persist::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted manifest document.
///
/// Every field has a default so older manifests, which lack `methods` or
/// `summary`, still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub generated: BTreeSet<String>,
    #[serde(default)]
    pub failed: BTreeSet<String>,
    #[serde(default)]
    pub methods: BTreeMap<String, GenerationMode>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

/// Aggregate counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub generated: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub failed: usize,
    /// Successful generations by mode (`ref` / `text`).
    #[serde(default)]
    pub methods: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn count_success(&mut self, mode: GenerationMode) {
        self.generated += 1;
        *self.methods.entry(mode.as_str().to_string()).or_insert(0) += 1;
    }
}

/// Where the artifacts for this manifest live.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    pub dir: PathBuf,
    pub extension: String,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, self.extension))
    }
}

pub struct ProgressStore {
    path: PathBuf,
    artifacts: ArtifactLayout,
    record: ProgressRecord,
}

impl ProgressStore {
    /// Load the manifest at `path`.
    ///
    /// A missing or unreadable manifest yields an empty record. Regenerating
    /// finished work is preferred over refusing to start.
    pub fn load(path: impl Into<PathBuf>, artifacts: ArtifactLayout) -> Self {
        let path = path.into();
        let mut record = read_record(&path).unwrap_or_default();
        if record.started_at.is_none() {
            record.started_at = Some(now_rfc3339());
        }
        debug!(
            manifest = %path.display(),
            generated = record.generated.len(),
            failed = record.failed.len(),
            "Loaded progress manifest"
        );
        Self {
            path,
            artifacts,
            record,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub fn artifacts(&self) -> &ArtifactLayout {
        &self.artifacts
    }

    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.artifacts.path_for(key)
    }

    /// Done if the manifest says so or the artifact is already on disk.
    /// Either signal alone is enough.
    pub fn is_done(&self, key: &str) -> bool {
        self.record.generated.contains(key) || self.artifact_path(key).exists()
    }

    pub fn record_success(&mut self, key: &str, mode: GenerationMode) -> Result<(), StorageError> {
        self.record.generated.insert(key.to_string());
        self.record.failed.remove(key);
        self.record.methods.insert(key.to_string(), mode);
        self.flush()
    }

    /// A failure supersedes an earlier success for the same key. A kept
    /// artifact still makes the key count as done through `is_done`.
    pub fn record_failure(&mut self, key: &str) -> Result<(), StorageError> {
        self.record.generated.remove(key);
        self.record.methods.remove(key);
        self.record.failed.insert(key.to_string());
        self.flush()
    }

    pub fn finalize(&mut self, summary: RunSummary) -> Result<(), StorageError> {
        self.record.completed_at = Some(now_rfc3339());
        self.record.summary = Some(summary);
        self.flush()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(&self.record).map_err(|e| StorageError::Serialize {
            what: "progress manifest",
            message: e.to_string(),
        })?;
        write_atomic(&self.path, &bytes)
    }
}

fn read_record(path: &Path) -> Option<ProgressRecord> {
    if !path.exists() {
        return None;
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(manifest = %path.display(), error = %e, "Failed to read manifest, starting fresh");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(manifest = %path.display(), error = %e, "Corrupt manifest, starting fresh");
            None
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}
