//! HTTP client for the Figaro chat API
//!
//! Two calls: `POST /chat` for a completion and `GET /health` as a
//! liveness probe. Everything the server can do wrong collapses into
//! [`ApiError`] so the UI has a single failure surface.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Message;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Endpoint unreachable or the request never completed.
    #[error("Network error: Could not connect to server")]
    Network,
    /// Non-success status; carries the server's `detail` when it sent one.
    #[error("{0}")]
    Server(String),
    /// 2xx with a body we could not parse.
    #[error("Received an unreadable response from the server")]
    InvalidResponse,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    conversation_history: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
    #[serde(default)]
    #[allow(dead_code)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// The transport seam between the conversation state and the network.
///
/// The session only ever talks to this trait, so tests can drive it with
/// stub implementations.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one user message with the prior log as context; returns the
    /// assistant's reply text.
    async fn send_message(&self, message: &str, history: &[Message]) -> Result<String, ApiError>;

    /// Liveness probe. Never errors: any failure reads as "down".
    async fn health_check(&self) -> bool;
}

pub struct ChatApi {
    client: Client,
    base_url: String,
}

impl ChatApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatTransport for ChatApi {
    async fn send_message(&self, message: &str, history: &[Message]) -> Result<String, ApiError> {
        let url = format!("{}/chat", self.base_url);
        let request = ChatRequest {
            message,
            conversation_history: history,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|_| ApiError::Network)?;

        if !response.status().is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.detail)
                .unwrap_or_else(|_| "Failed to send message".to_string());
            return Err(ApiError::Server(detail));
        }

        let body: ChatResponse = response.json().await.map_err(|_| ApiError::InvalidResponse)?;
        Ok(body.response)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
