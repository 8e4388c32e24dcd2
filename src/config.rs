//! Configuration System
//!
//! Layered configuration built on the `config` crate. Precedence, lowest first:
//! built-in defaults, the workspace file `assetforge.toml` (or an explicit
//! `--config` file), then `ASSETFORGE__SECTION__KEY` environment variables.
//! Relative paths resolve against the workspace root.

use crate::classify::{ClassificationConfig, VisionClientSettings};
use crate::error::ApiError;
use crate::generation::ImageClientSettings;
use crate::logging::LoggingConfig;
use crate::pipeline::PipelineConfig;
use crate::prompts::{CLASSIFY_PROMPT, EDIT_PROMPT, TEXT_PROMPT_TEMPLATE};
use crate::reference::WebReferenceSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub reference: ReferenceSection,

    #[serde(default)]
    pub prompts: PromptsSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Run pacing and on-disk locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub request_delay_seconds: u64,
    pub max_retries: u32,
    pub retry_unit_seconds: u64,
    pub batch_size: usize,
    pub catalog: PathBuf,
    pub output_dir: PathBuf,
    pub output_extension: String,
    pub progress_file: PathBuf,
    pub error_log: PathBuf,
    /// Where fetched web references are copied for inspection. Empty disables.
    pub references_dir: PathBuf,
    pub direction_cache: PathBuf,
    pub cost_per_image: f64,
    pub model_year: u16,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            request_delay_seconds: 15,
            max_retries: 3,
            retry_unit_seconds: 5,
            batch_size: 10,
            catalog: PathBuf::from("data/vehicles.json"),
            output_dir: PathBuf::from("CarImages"),
            output_extension: "png".to_string(),
            progress_file: PathBuf::from("CarImages/manifest.json"),
            error_log: PathBuf::from("CarImages/errors.log"),
            references_dir: PathBuf::from("CarImages/references"),
            direction_cache: PathBuf::from("CarImages/direction_cache.json"),
            cost_per_image: 0.04,
            model_year: 2026,
        }
    }
}

/// Generation and vision service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub base_url: String,
    /// Name of the environment variable holding the credential.
    pub api_key_env: String,
    pub edit_model: String,
    pub generate_model: String,
    pub classify_model: String,
    pub image_size: String,
    pub timeout_seconds: u64,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            edit_model: "gpt-image-1".to_string(),
            generate_model: "gpt-image-1".to_string(),
            classify_model: "gpt-4o-mini".to_string(),
            image_size: "1536x1024".to_string(),
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSection {
    pub base_url: String,
    pub size_from: String,
    pub size_to: String,
    pub timeout_seconds: u64,
}

impl Default for ReferenceSection {
    fn default() -> Self {
        Self {
            base_url: "https://www.carwale.com".to_string(),
            size_from: "642x336".to_string(),
            size_to: "1056x594".to_string(),
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    pub edit: String,
    pub text_template: String,
    pub classify: String,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            edit: EDIT_PROMPT.to_string(),
            text_template: TEXT_PROMPT_TEMPLATE.to_string(),
            classify: CLASSIFY_PROMPT.to_string(),
        }
    }
}

fn resolve(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

impl AppConfig {
    /// Reject values that would make a run meaningless or unresumable.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        let p = &self.pipeline;

        if p.max_retries == 0 {
            errors.push("pipeline.max_retries must be at least 1".to_string());
        }
        if p.batch_size == 0 {
            errors.push("pipeline.batch_size must be at least 1".to_string());
        }
        for (name, path) in [
            ("pipeline.catalog", &p.catalog),
            ("pipeline.output_dir", &p.output_dir),
            ("pipeline.progress_file", &p.progress_file),
            ("pipeline.error_log", &p.error_log),
            ("pipeline.direction_cache", &p.direction_cache),
        ] {
            if path.as_os_str().is_empty() {
                errors.push(format!("{} cannot be empty", name));
            }
        }
        if p.output_extension.trim().is_empty() {
            errors.push("pipeline.output_extension cannot be empty".to_string());
        }
        if !p.cost_per_image.is_finite() || p.cost_per_image < 0.0 {
            errors.push("pipeline.cost_per_image must be a non-negative number".to_string());
        }
        if self.service.base_url.trim().is_empty() {
            errors.push("service.base_url cannot be empty".to_string());
        }
        if self.service.api_key_env.trim().is_empty() {
            errors.push("service.api_key_env cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }

    /// Read the service credential from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ApiError> {
        let name = &self.service.api_key_env;
        match std::env::var(name) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ApiError::ConfigError(format!(
                "{} environment variable not set",
                name
            ))),
        }
    }

    pub fn catalog_path(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.pipeline.catalog)
    }

    pub fn pipeline_config(&self, workspace_root: &Path) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            request_delay: Duration::from_secs(p.request_delay_seconds),
            max_retries: p.max_retries,
            retry_unit: Duration::from_secs(p.retry_unit_seconds),
            output_dir: resolve(workspace_root, &p.output_dir),
            output_extension: p.output_extension.trim_start_matches('.').to_string(),
            progress_file: resolve(workspace_root, &p.progress_file),
            error_log: resolve(workspace_root, &p.error_log),
            model_year: p.model_year,
            cost_per_image: p.cost_per_image,
            edit_prompt: self.prompts.edit.clone(),
            text_prompt_template: self.prompts.text_template.clone(),
        }
    }

    pub fn classification_config(&self, workspace_root: &Path) -> ClassificationConfig {
        let p = &self.pipeline;
        ClassificationConfig {
            batch_size: p.batch_size,
            request_delay: Duration::from_secs(p.request_delay_seconds),
            max_retries: p.max_retries,
            retry_unit: Duration::from_secs(p.retry_unit_seconds),
            cache_file: resolve(workspace_root, &p.direction_cache),
        }
    }

    pub fn image_client_settings(&self, api_key: String) -> ImageClientSettings {
        let s = &self.service;
        ImageClientSettings {
            base_url: s.base_url.clone(),
            api_key,
            edit_model: s.edit_model.clone(),
            generate_model: s.generate_model.clone(),
            image_size: s.image_size.clone(),
            timeout: Duration::from_secs(s.timeout_seconds),
        }
    }

    pub fn vision_client_settings(&self, api_key: String) -> VisionClientSettings {
        let s = &self.service;
        VisionClientSettings {
            base_url: s.base_url.clone(),
            api_key,
            model: s.classify_model.clone(),
            prompt: self.prompts.classify.clone(),
            timeout: Duration::from_secs(s.timeout_seconds),
        }
    }

    pub fn web_reference_settings(&self, workspace_root: &Path) -> WebReferenceSettings {
        let r = &self.reference;
        let references_dir = if self.pipeline.references_dir.as_os_str().is_empty() {
            None
        } else {
            Some(resolve(workspace_root, &self.pipeline.references_dir))
        };
        WebReferenceSettings {
            base_url: r.base_url.clone(),
            size_from: r.size_from.clone(),
            size_to: r.size_to.clone(),
            timeout: Duration::from_secs(r.timeout_seconds),
            references_dir,
        }
    }
}

/// Builds an [`AppConfig`] from every configured source.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Workspace file name looked up when no explicit file is given.
    pub const WORKSPACE_FILE: &'static str = "assetforge.toml";

    pub fn load(workspace_root: &Path, explicit: Option<&Path>) -> Result<AppConfig, ApiError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = match explicit {
            Some(path) => sources::explicit_file::add_to_builder(builder, path)?,
            None => sources::workspace_file::add_to_builder(builder, workspace_root)?,
        };
        builder = sources::environment::add_to_builder(builder);

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
