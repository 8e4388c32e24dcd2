//! Asset keys
//!
//! A key is the canonical identity of a work item. The same string names the
//! artifact on disk, the manifest entry and the error-log line, so every caller
//! must derive it through [`asset_key`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of work: a (category, item) pair such as (make, model).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub category: String,
    pub item: String,
}

impl WorkItem {
    pub fn new(category: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            item: item.into(),
        }
    }

    pub fn key(&self) -> String {
        asset_key(&self.category, &self.item)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category, self.item)
    }
}

/// Lower-case, trim, and replace spaces and hyphens with underscores.
pub fn canonicalize(part: &str) -> String {
    part.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Canonical key for a (category, item) pair.
pub fn asset_key(category: &str, item: &str) -> String {
    format!("{}_{}", canonicalize(category), canonicalize(item))
}
