//! HTTP client for the assistant backend.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ChatError, TransportError};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    /// Same `data:` URL form produced by the attachment encoder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    success: bool,
    response: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Online,
    Offline,
}

/// Anything that can answer a chat request.
pub trait ChatService {
    fn chat(&self, request: &ChatRequest)
        -> impl Future<Output = Result<String, ChatError>> + Send;
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build a client whose requests fail with a transport error after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(&config.server_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send_chat(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(
            message_len = request.message.len(),
            image_len = request.image.as_ref().map_or(0, String::len),
            "POST {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::from)?;

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|source| {
            TransportError::MalformedBody {
                status: status.as_u16(),
                source,
            }
        })?;

        // Valid JSON that doesn't look like a chat response is a failed reply,
        // not a connectivity problem.
        let parsed = match serde_json::from_value::<ChatResponse>(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(status = status.as_u16(), "unexpected chat response shape: {}", e);
                return Err(ChatError::Application {
                    status: status.as_u16(),
                    detail: None,
                });
            }
        };

        match parsed {
            ChatResponse {
                success: true,
                response: Some(text),
                ..
            } if status.is_success() => Ok(text),
            ChatResponse { error, .. } => Err(ChatError::Application {
                status: status.as_u16(),
                detail: error,
            }),
        }
    }

    /// Probe `GET /health`. Any failure counts as offline.
    pub async fn health(&self) -> HealthStatus {
        let url = format!("{}/health", self.base_url);

        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "health check failed");
                return HealthStatus::Offline;
            }
            Err(e) => {
                debug!("health check unreachable: {}", e);
                return HealthStatus::Offline;
            }
        };

        match response.json::<HealthResponse>().await {
            Ok(health) if health.status == "healthy" => HealthStatus::Online,
            _ => HealthStatus::Offline,
        }
    }
}

impl ChatService for BackendClient {
    fn chat(&self, request: &ChatRequest)
        -> impl Future<Output = Result<String, ChatError>> + Send {
        self.send_chat(request)
    }
}
