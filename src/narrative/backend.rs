//! Client for the external generative-text backend.
//!
//! The backend speaks Ollama's `/api/generate` contract: one request with
//! model, system instruction and prompt, streaming disabled, answered by a
//! JSON body whose `response` field holds the generated text. A single
//! attempt is made per call, bounded by the configured timeout.

use crate::config::BackendConfig;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure of a single backend call.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to backend at {0}")]
    Connect(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to send request: {0}")]
    Transport(String),

    #[error("failed to parse backend response: {0}")]
    Decode(String),
}

/// Request body for `/api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerateRequest {
    pub fn new(model: &str, system: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            system: system.to_string(),
            prompt: prompt.to_string(),
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Anything that can turn a prompt into text.
pub trait TextBackend: Send + Sync {
    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, BackendError>>;
}

/// HTTP client for an Ollama-compatible server.
pub struct OllamaBackend {
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
            http_client,
        })
    }

    async fn send(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!("Sending generate request to {} (model {})", url, request.model);

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.timeout_seconds)
                } else if e.is_connect() {
                    BackendError::Connect(self.base_url.clone())
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_seconds)
            } else {
                BackendError::Decode(e.to_string())
            }
        })?;

        Ok(body.response.trim().to_string())
    }
}

impl TextBackend for OllamaBackend {
    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, BackendError>> {
        Box::pin(self.send(request))
    }
}
