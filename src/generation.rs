//! Image generation client
//!
//! Two modes against an OpenAI-compatible images API: restyle a reference image
//! through the edit endpoint, or synthesize from a text prompt alone. Both return
//! the decoded image bytes or a classified [`ServiceError`].

use crate::error::{ApiError, ServiceError};
use crate::key::WorkItem;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Which generation path produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationMode {
    #[serde(rename = "ref")]
    Reference,
    #[serde(rename = "text")]
    Text,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Reference => "ref",
            GenerationMode::Text => "text",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Restyle `reference` according to `prompt`.
    async fn generate_from_reference(
        &self,
        reference: &[u8],
        prompt: &str,
    ) -> Result<Vec<u8>, ServiceError>;

    /// Synthesize an image for `item` from `template` alone.
    async fn generate_from_text(
        &self,
        item: &WorkItem,
        year: u16,
        template: &str,
    ) -> Result<Vec<u8>, ServiceError>;
}

/// Substitute `{year}`, `{category}` / `{make}` and `{item}` / `{model}`.
pub fn render_prompt(template: &str, item: &WorkItem, year: u16) -> String {
    template
        .replace("{year}", &year.to_string())
        .replace("{category}", &item.category)
        .replace("{make}", &item.category)
        .replace("{item}", &item.item)
        .replace("{model}", &item.item)
}

#[derive(Debug, Clone)]
pub struct ImageClientSettings {
    pub base_url: String,
    pub api_key: String,
    pub edit_model: String,
    pub generate_model: String,
    pub image_size: String,
    pub timeout: Duration,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_service_http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

pub struct OpenAiImageClient {
    client: Client,
    settings: ImageClientSettings,
}

impl OpenAiImageClient {
    pub fn new(settings: ImageClientSettings) -> Result<Self, ApiError> {
        let client = build_service_http_client(settings.timeout)?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ServiceError> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
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

        let body = response.bytes().await.map_err(ServiceError::from)?;
        decode_image_payload(&body)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate_from_reference(
        &self,
        reference: &[u8],
        prompt: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        let image = Part::bytes(reference.to_vec())
            .file_name("reference.png")
            .mime_str("image/png")
            .map_err(|e| ServiceError::other(format!("Failed to build image part: {}", e)))?;
        let form = Form::new()
            .text("model", self.settings.edit_model.clone())
            .text("prompt", prompt.to_string())
            .text("n", "1")
            .text("size", self.settings.image_size.clone())
            .part("image", image);

        let request = self.client.post(self.endpoint("images/edits")).multipart(form);
        self.send(request).await
    }

    async fn generate_from_text(
        &self,
        item: &WorkItem,
        year: u16,
        template: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        let body = json!({
            "model": self.settings.generate_model,
            "prompt": render_prompt(template, item, year),
            "n": 1,
            "size": self.settings.image_size,
        });
        let request = self
            .client
            .post(self.endpoint("images/generations"))
            .json(&body);
        self.send(request).await
    }
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

/// Decode `data[0].b64_json` from an images API response body.
pub fn decode_image_payload(body: &[u8]) -> Result<Vec<u8>, ServiceError> {
    let parsed: ImagesResponse = serde_json::from_slice(body)
        .map_err(|e| ServiceError::other(format!("Failed to parse response: {}", e)))?;
    let encoded = parsed
        .data
        .into_iter()
        .next()
        .and_then(|d| d.b64_json)
        .ok_or_else(|| ServiceError::other("No image payload in response"))?;
    BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| ServiceError::other(format!("Invalid base64 image payload: {}", e)))
}
