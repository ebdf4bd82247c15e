//! Client for the local vision model (Ollama `/api/generate`).

use crate::config::InferenceConfig;
use crate::error::{PhaiError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returned when the model could not be reached or answered with an error.
pub const DESCRIPTION_UNAVAILABLE: &str = "Description unavailable";

/// Used instead of a description when the image itself could not be fetched.
pub const DESCRIPTION_IMAGE_ERROR: &str = "Description unavailable due to image loading error";

/// Returned when the model answered without a `response` field.
pub const NO_DESCRIPTION: &str = "No description available";

const DEFAULT_ENDPOINT: &str = "localhost:11434";

#[async_trait]
pub trait DescriptionService: Send + Sync {
    /// Describe `image`, optionally preceded by a reference image. Never fails:
    /// errors turn into [`DESCRIPTION_UNAVAILABLE`].
    async fn describe(&self, image: &[u8], reference: Option<&[u8]>, prompt: &str) -> String;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Endpoint with a scheme and without a trailing slash.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    let endpoint = if endpoint.is_empty() {
        DEFAULT_ENDPOINT
    } else {
        endpoint
    };
    let with_scheme = if endpoint.starts_with("http") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Parse the span from the first `{` to the last `}` of a model answer.
/// Anything that does not parse is treated as plain text (`None`).
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dump_request: Option<PathBuf>,
}

impl OllamaClient {
    pub fn new(config: &InferenceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        let model = if config.model.trim().is_empty() {
            "llava:7b".to_string()
        } else {
            config.model.trim().to_string()
        };
        Self {
            client,
            base_url: normalize_endpoint(&config.endpoint),
            model,
            dump_request: config.dump_request.clone(),
        }
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One non-streaming generate call. Images go reference first, subject last.
    pub async fn generate(
        &self,
        image: &[u8],
        reference: Option<&[u8]>,
        prompt: &str,
    ) -> Result<String> {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut images = Vec::with_capacity(2);
        if let Some(reference) = reference {
            images.push(engine.encode(reference));
        }
        images.push(engine.encode(image));

        let body = GenerateRequest {
            model: &self.model,
            prompt,
            images,
            stream: false,
        };

        if let Some(path) = &self.dump_request {
            self.dump(path, &body).await;
        }

        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| PhaiError::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PhaiError::Inference(format!(
                "Ollama API error: {} {}",
                status, error_text
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PhaiError::Inference(format!("Failed to parse response: {}", e)))?;

        Ok(parsed
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string()))
    }

    async fn dump(&self, path: &Path, body: &GenerateRequest<'_>) {
        let text = match serde_json::to_string_pretty(body) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Could not serialize request for dump: {}", e);
                return;
            }
        };
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(path, text).await {
            tracing::warn!("Could not save request dump to {:?}: {}", path, e);
        }
    }
}

#[async_trait]
impl DescriptionService for OllamaClient {
    async fn describe(&self, image: &[u8], reference: Option<&[u8]>, prompt: &str) -> String {
        match self.generate(image, reference, prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to get image description: {}", e);
                DESCRIPTION_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("localhost:11434"), "http://localhost:11434");
        assert_eq!(normalize_endpoint(""), "http://localhost:11434");
        assert_eq!(normalize_endpoint("https://gpu.lan/"), "https://gpu.lan");
        assert_eq!(normalize_endpoint(" http://10.0.0.2:11434 "), "http://10.0.0.2:11434");
    }

    #[test]
    fn test_generate_url() {
        let client = OllamaClient::new(&InferenceConfig::default());
        assert_eq!(client.generate_url(), "http://localhost:11434/api/generate");
        assert_eq!(client.model(), "llava:7b");
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("Sure! {\"include\": false, \"why\": \"dup\"} done"),
            Some(json!({ "include": false, "why": "dup" }))
        );
        assert_eq!(extract_json_object("A sunset over water"), None);
        assert_eq!(extract_json_object("{not json}"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_extract_json_spans_first_to_last_brace() {
        let text = "{\"a\": {\"b\": 1}} trailing";
        assert_eq!(extract_json_object(text), Some(json!({ "a": { "b": 1 } })));
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            model: "llava:7b",
            prompt: "Describe",
            images: vec!["UkVG".into(), "SU1H".into()],
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "model": "llava:7b", "prompt": "Describe", "images": ["UkVG", "SU1H"], "stream": false })
        );
    }
}
