//! Reference image sources
//!
//! A reference is optional grounding for the edit endpoint. Every source is
//! best-effort: any failure is reported as "no reference" and the pipeline falls
//! back to text-only generation.

use crate::error::ApiError;
use crate::generation::build_service_http_client;
use crate::key::{canonicalize, WorkItem};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn fetch(&self, item: &WorkItem) -> Option<Vec<u8>>;
}

/// Never has a reference; every item goes through text-only generation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReference;

#[async_trait]
impl ReferenceSource for NoReference {
    async fn fetch(&self, _item: &WorkItem) -> Option<Vec<u8>> {
        None
    }
}

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120";

#[derive(Debug, Clone)]
pub struct WebReferenceSettings {
    pub base_url: String,
    /// Size token in the scraped image URL, replaced by `size_to`.
    pub size_from: String,
    pub size_to: String,
    pub timeout: Duration,
    /// Debug copies of fetched references land here, keyed by asset key.
    pub references_dir: Option<PathBuf>,
}

/// Scrapes the listing page of a model and downloads its `og:image`.
pub struct WebReferenceFetcher {
    client: Client,
    settings: WebReferenceSettings,
    og_image: Regex,
}

impl WebReferenceFetcher {
    pub fn new(settings: WebReferenceSettings) -> Result<Self, ApiError> {
        let client = build_service_http_client(settings.timeout)?;
        let og_image = Regex::new(r#"og:image.*?content="([^"]+)""#)
            .map_err(|e| ApiError::ConfigError(format!("Invalid og:image pattern: {}", e)))?;
        Ok(Self {
            client,
            settings,
            og_image,
        })
    }

    pub fn page_url(&self, item: &WorkItem) -> String {
        format!(
            "{}/{}/",
            self.settings.base_url.trim_end_matches('/'),
            page_slug(item)
        )
    }

    /// Locate the embedded image URL in a listing page and upgrade its size.
    pub fn extract_image_url(&self, page: &str) -> Option<String> {
        let raw = self.og_image.captures(page)?.get(1)?.as_str();
        let url = unescape_html(raw);
        if self.settings.size_from.is_empty() {
            return Some(url);
        }
        Some(url.replace(&self.settings.size_from, &self.settings.size_to))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    fn keep_debug_copy(&self, item: &WorkItem, bytes: &[u8]) {
        let Some(dir) = &self.settings.references_dir else {
            return;
        };
        let path = dir.join(format!("{}.png", item.key()));
        let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, bytes));
        if let Err(e) = result {
            debug!(path = %path.display(), error = %e, "Could not keep reference copy");
        }
    }
}

#[async_trait]
impl ReferenceSource for WebReferenceFetcher {
    async fn fetch(&self, item: &WorkItem) -> Option<Vec<u8>> {
        let page_url = self.page_url(item);
        let page = match self.get_bytes(&page_url).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!(url = %page_url, error = %e, "Reference page unavailable");
                return None;
            }
        };

        let Some(image_url) = self.extract_image_url(&page) else {
            debug!(url = %page_url, "No og:image on reference page");
            return None;
        };

        match self.get_bytes(&image_url).await {
            Ok(bytes) if !bytes.is_empty() => {
                self.keep_debug_copy(item, &bytes);
                Some(bytes)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(url = %image_url, error = %e, "Reference image download failed");
                None
            }
        }
    }
}

/// `Maruti Suzuki` / `Grand Vitara` → `maruti-suzuki-cars/grand-vitara`.
pub fn page_slug(item: &WorkItem) -> String {
    format!(
        "{}-cars/{}",
        item.category.to_lowercase().replace(' ', "-"),
        item.item.to_lowercase().replace(' ', "-")
    )
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

const REFERENCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "avif"];

/// Operator-supplied references in a flat directory.
///
/// A file matches an item when its canonicalized stem equals the item's key, so
/// `BMW X5.jpg`, `bmw-x5.png` and `bmw_x5.webp` all resolve to `bmw_x5`.
pub struct DirectoryReferenceSource {
    files: HashMap<String, PathBuf>,
}

impl DirectoryReferenceSource {
    pub fn open(dir: &Path) -> Result<Self, ApiError> {
        if !dir.is_dir() {
            return Err(ApiError::ConfigError(format!(
                "Reference directory not found: {}",
                dir.display()
            )));
        }

        let mut files = HashMap::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !has_reference_extension(path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            if let Some(previous) = files.insert(canonicalize(stem), path.to_path_buf()) {
                warn!(
                    kept = %path.display(),
                    dropped = %previous.display(),
                    "Two references map to the same key"
                );
            }
        }
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn has_reference_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| REFERENCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl ReferenceSource for DirectoryReferenceSource {
    async fn fetch(&self, item: &WorkItem) -> Option<Vec<u8>> {
        let path = self.files.get(&item.key())?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read reference");
                None
            }
        }
    }
}
