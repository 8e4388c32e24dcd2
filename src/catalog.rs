//! Vehicle catalog input
//!
//! Read-only JSON document enumerating makes and their models. Discontinued
//! models are not part of the work set.

use crate::error::ApiError;
use crate::key::{asset_key, WorkItem};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub makes: Vec<CatalogMake>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogMake {
    pub name: String,
    #[serde(default)]
    pub models: Vec<CatalogModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogModel {
    pub name: String,
    #[serde(default)]
    pub discontinued: bool,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ApiError::CatalogError(format!("Failed to read catalog {:?}: {}", path, e))
        })?;
        Self::from_json(&raw)
            .map_err(|e| ApiError::CatalogError(format!("Invalid catalog {:?}: {}", path, e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Active items in catalog order.
    pub fn work_items(&self) -> Vec<WorkItem> {
        self.makes
            .iter()
            .flat_map(|make| {
                make.models
                    .iter()
                    .filter(|model| !model.discontinued)
                    .map(move |model| WorkItem::new(&make.name, &model.name))
            })
            .collect()
    }

    /// Reverse index from key to item, over every model including discontinued ones.
    pub fn key_index(&self) -> KeyIndex {
        let mut by_key = HashMap::new();
        for make in &self.makes {
            for model in &make.models {
                by_key.insert(
                    asset_key(&make.name, &model.name),
                    WorkItem::new(&make.name, &model.name),
                );
            }
        }
        KeyIndex { by_key }
    }
}

/// Lookup-time counterpart of [`WorkItem::key`]: resolves artifact names back
/// to catalog items.
#[derive(Debug, Default)]
pub struct KeyIndex {
    by_key: HashMap<String, WorkItem>,
}

impl KeyIndex {
    pub fn lookup(&self, key: &str) -> Option<&WorkItem> {
        self.by_key.get(key)
    }

    /// Resolve an artifact filename such as `honda_city.png`.
    pub fn lookup_file_name(&self, file_name: &str) -> Option<&WorkItem> {
        let stem = Path::new(file_name).file_stem()?.to_str()?;
        self.lookup(stem)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
