//! Append-only failure log, one line per failed item.

use crate::error::StorageError;
use crate::key::WorkItem;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[timestamp] category item: message`.
    pub fn record(&self, item: &WorkItem, error: &dyn std::fmt::Display) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::write(parent, e))?;
            }
        }
        let line = format_line(&crate::manifest::now_rfc3339(), item, &error.to_string());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::write(&self.path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| StorageError::write(&self.path, e))
    }
}

fn format_line(timestamp: &str, item: &WorkItem, message: &str) -> String {
    // Keep one failure per line even when the service returns a multi-line body.
    let message = message.replace(['\r', '\n'], " ");
    format!("[{}] {} {}: {}\n", timestamp, item.category, item.item, message)
}
