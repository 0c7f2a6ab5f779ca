//! Ollama HTTP client for canvas queries
//!
//! Talks to an Ollama-compatible `/api/generate` endpoint with vision
//! support: the canvas PNG travels base64-encoded in the `images` field.
//! Supports retry with exponential backoff and configurable timeout.

use super::VisionClient;
use crate::config::AiConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Maximum number of retry attempts
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff in milliseconds
const BASE_RETRY_DELAY_MS: u64 = 100;

/// Request body for the generate endpoint
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
}

/// Response from the generate endpoint (non-streaming)
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response from the tags endpoint
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Error types for vision queries
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl VisionError {
    /// Transient failures worth another attempt
    fn is_retryable(&self) -> bool {
        match self {
            VisionError::ConnectionFailed(_) | VisionError::Timeout(_) => true,
            VisionError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Ollama HTTP client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a client from the `ai` config section
    pub fn from_config(config: &AiConfig) -> Result<Self, VisionError> {
        Self::with_config(
            &config.base_url,
            &config.model,
            config.resolved_api_key(),
            config.timeout_secs,
        )
    }

    /// Create a client with full configuration
    ///
    /// # Arguments
    ///
    /// * `base_url` - The server base URL (e.g., "http://localhost:11434")
    /// * `model` - Vision-capable model name
    /// * `api_key` - Optional bearer credential
    /// * `timeout_secs` - Request timeout in seconds
    pub fn with_config(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, VisionError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Check if the server is reachable
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.authorized(self.client.get(&url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Vision server not available: {}", e);
                false
            }
        }
    }

    /// List models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, VisionError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| VisionError::ParseError(e.to_string()))?;

        let model_names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();

        tracing::debug!("Found {} models", model_names.len());
        Ok(model_names)
    }

    fn transport_error(&self, e: reqwest::Error) -> VisionError {
        if e.is_timeout() {
            VisionError::Timeout(self.timeout.as_secs())
        } else {
            VisionError::ConnectionFailed(e.to_string())
        }
    }

    async fn send_generate_request(&self, request: &GenerateRequest) -> Result<String, VisionError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .authorized(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| VisionError::ParseError(e.to_string()))?;

        Ok(generate_response.response)
    }

    /// Ask the model about a PNG image, with retry
    ///
    /// Makes up to 3 attempts with exponential backoff between them (100ms, 200ms).
    pub async fn generate_with_image(
        &self,
        prompt: &str,
        image_png: &[u8],
    ) -> Result<String, VisionError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: vec![STANDARD.encode(image_png)],
            stream: false,
        };

        tracing::debug!(
            "Sending vision request with model: {} ({} byte image)",
            self.model,
            image_png.len()
        );

        let mut last_error: Option<VisionError> = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            match self.send_generate_request(&request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::debug!("Request succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        tracing::error!("Vision request failed (attempt {}): {}", attempt + 1, e);
                        return Err(e);
                    }

                    if attempt == MAX_RETRY_ATTEMPTS - 1 {
                        tracing::error!("Vision request failed (attempt {}): {}", attempt + 1, e);
                        last_error = Some(e);
                        break;
                    }

                    let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
                    tracing::warn!(
                        "Vision request failed (attempt {}), retrying in {}ms: {}",
                        attempt + 1,
                        delay_ms,
                        e
                    );
                    last_error = Some(e);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(VisionError::RetriesExhausted {
            attempts: MAX_RETRY_ATTEMPTS,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

async fn server_error(response: reqwest::Response) -> VisionError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    VisionError::ServerError { status, message }
}

impl VisionClient for OllamaClient {
    fn describe<'a>(
        &'a self,
        prompt: &'a str,
        image_png: &'a [u8],
    ) -> BoxFuture<'a, Result<String, VisionError>> {
        self.generate_with_image(prompt, image_png).boxed()
    }
}
