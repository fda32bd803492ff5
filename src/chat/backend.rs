// src/chat/backend.rs - Chat backend seam and the `/chat/*` HTTP client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, HistoryEntry};
use crate::infra::errors::CaigentanError;
use crate::preferences::PreferenceRecord;

/// Fallback when a failed send carries no usable message.
pub const GENERIC_SEND_ERROR: &str = "Chat request failed";

/// What the session controller needs from whoever answers the chat.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Past exchanges, oldest first.
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, CaigentanError>;

    /// Send one user message. `transcript` is the full running transcript,
    /// already ending with that message; stateless backends may ignore it.
    async fn send(&self, message: &str, transcript: &[ChatMessage])
        -> Result<String, CaigentanError>;

    async fn clear_history(&self) -> Result<(), CaigentanError>;
}

/// Body of `POST /chat/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub message: String,
}

/// Reply of `POST /chat/send`: either `response` or `error` is meaningful.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client for the chatbot backend (`GET /chat/history`, `POST /chat/send`,
/// `POST /chat/clear-history`, `POST /api/preferences`).
#[derive(Clone)]
pub struct HttpChatBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChatBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a preference record for the chatbot to use in its prompt.
    pub async fn upload_preferences(&self, record: &PreferenceRecord) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.url("/api/preferences"))
            .json(record)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("preferences upload returned HTTP {status}: {body}");
        }
        Ok(())
    }

    /// `GET /chat/health`, returned as raw JSON.
    pub async fn health(&self) -> anyhow::Result<serde_json::Value> {
        let response = self.client.get(self.url("/chat/health")).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }
}

/// Pull a non-empty `error` string out of an arbitrary JSON body.
fn error_field(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, CaigentanError> {
        let response = self
            .client
            .get(self.url("/chat/history"))
            .send()
            .await
            .map_err(|e| CaigentanError::HistoryUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaigentanError::HistoryUnavailable(format!(
                "history endpoint returned HTTP {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CaigentanError::HistoryUnavailable(e.to_string()))?;
        if !body.is_array() {
            return Err(CaigentanError::HistoryUnavailable(
                "invalid history data format".into(),
            ));
        }
        serde_json::from_value(body).map_err(|e| CaigentanError::HistoryUnavailable(e.to_string()))
    }

    async fn send(
        &self,
        message: &str,
        _transcript: &[ChatMessage],
    ) -> Result<String, CaigentanError> {
        let response = self
            .client
            .post(self.url("/chat/send"))
            .json(&SendRequest {
                message: message.to_string(),
            })
            .send()
            .await
            .map_err(|e| CaigentanError::SendFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CaigentanError::SendFailed(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(%status, "chat send rejected");
            return Err(CaigentanError::SendFailed(
                error_field(&body).unwrap_or_else(|| GENERIC_SEND_ERROR.to_string()),
            ));
        }

        let reply: SendResponse = serde_json::from_str(&body)
            .map_err(|e| CaigentanError::SendFailed(format!("invalid chat response: {e}")))?;
        match reply.error {
            Some(error) if !error.is_empty() => Err(CaigentanError::SendFailed(error)),
            _ => Ok(reply.response),
        }
    }

    async fn clear_history(&self) -> Result<(), CaigentanError> {
        let response = self
            .client
            .post(self.url("/chat/clear-history"))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| CaigentanError::ClearFailed(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(CaigentanError::ClearFailed(format!("HTTP {status}: {body}")))
    }
}
