//! Manifest status: comfy-table text view and a JSON view.

use crate::error::ApiError;
use crate::key::WorkItem;
use crate::manifest::{ProgressStore, RunSummary};
use comfy_table::Table;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub manifest: PathBuf,
    pub generated: usize,
    pub failed: usize,
    pub methods: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_total: Option<usize>,
    /// Catalog items neither in the manifest nor on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<usize>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub last_run: Option<RunSummary>,
}

impl StatusView {
    pub fn from_store(store: &ProgressStore, catalog: Option<&[WorkItem]>) -> Self {
        let record = store.record();
        let mut methods = BTreeMap::new();
        for mode in record.methods.values() {
            *methods.entry(mode.as_str().to_string()).or_insert(0) += 1;
        }
        let remaining =
            catalog.map(|items| items.iter().filter(|i| !store.is_done(&i.key())).count());

        Self {
            manifest: store.path().to_path_buf(),
            generated: record.generated.len(),
            failed: record.failed.len(),
            methods,
            catalog_total: catalog.map(|items| items.len()),
            remaining,
            started_at: record.started_at.clone(),
            completed_at: record.completed_at.clone(),
            last_run: record.summary.clone(),
        }
    }
}

pub fn format_status_text(view: &StatusView) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);

    table.add_row(vec!["Manifest".to_string(), view.manifest.display().to_string()]);
    if let Some(total) = view.catalog_total {
        table.add_row(vec!["Catalog items".to_string(), total.to_string()]);
    }
    table.add_row(vec!["Generated".to_string(), view.generated.to_string()]);
    for (mode, count) in &view.methods {
        table.add_row(vec![format!("  via {}", mode), count.to_string()]);
    }
    table.add_row(vec!["Failed".to_string(), view.failed.to_string()]);
    if let Some(remaining) = view.remaining {
        table.add_row(vec!["Remaining".to_string(), remaining.to_string()]);
    }
    table.add_row(vec![
        "Started".to_string(),
        view.started_at.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(vec![
        "Last completed".to_string(),
        view.completed_at.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    if let Some(last) = &view.last_run {
        table.add_row(vec![
            "Last run".to_string(),
            format!(
                "{} generated, {} skipped, {} failed",
                last.generated, last.skipped, last.failed
            ),
        ]);
    }
    table.to_string()
}

pub fn format_status_json(view: &StatusView) -> Result<String, ApiError> {
    serde_json::to_string_pretty(view)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render status: {}", e)))
}
