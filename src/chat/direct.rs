// src/chat/direct.rs - Backend that talks to the LLM provider directly
//
// No server-side history: every request carries the persona prompt plus the
// full running transcript.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use super::backend::ChatBackend;
use super::message::{ChatMessage, HistoryEntry};
use super::persona;
use crate::infra::errors::CaigentanError;
use crate::preferences::PreferenceRecord;
use crate::provider::{ChatRequest, Message, ModelProvider};

/// Receives streamed text as it arrives.
pub type DeltaSink = Arc<dyn Fn(&str) + Send + Sync>;

pub struct DirectBackend {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: Option<f32>,
    system_prompt: String,
    delta_sink: Option<DeltaSink>,
}

impl DirectBackend {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            system_prompt: persona::build_system_prompt(None),
            delta_sink: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Fold staged preferences into the system prompt.
    pub fn with_preferences(mut self, preferences: &PreferenceRecord) -> Self {
        self.system_prompt = persona::build_system_prompt(Some(preferences));
        self
    }

    /// Stream the reply, forwarding each delta to `sink`.
    pub fn with_streaming(mut self, sink: DeltaSink) -> Self {
        self.delta_sink = Some(sink);
        self
    }

    fn build_request(&self, transcript: &[ChatMessage]) -> ChatRequest {
        let messages = transcript.iter().map(Message::from).collect();
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            system: Some(self.system_prompt.clone()),
            ..Default::default()
        }
    }
}

fn send_error(e: CaigentanError) -> CaigentanError {
    match e {
        CaigentanError::SendFailed(_) => e,
        other => CaigentanError::SendFailed(other.to_string()),
    }
}

#[async_trait]
impl ChatBackend for DirectBackend {
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, CaigentanError> {
        Ok(Vec::new())
    }

    async fn send(
        &self,
        _message: &str,
        transcript: &[ChatMessage],
    ) -> Result<String, CaigentanError> {
        let request = self.build_request(transcript);

        let Some(sink) = &self.delta_sink else {
            let response = self.provider.chat(request).await.map_err(send_error)?;
            tracing::debug!(tokens = response.usage.total(), "direct chat reply");
            return Ok(response.content);
        };

        let mut stream = self.provider.chat_stream(request).await.map_err(send_error)?;
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(send_error)?;
            if !chunk.delta.is_empty() {
                sink(&chunk.delta);
                content.push_str(&chunk.delta);
            }
        }
        Ok(content)
    }

    async fn clear_history(&self) -> Result<(), CaigentanError> {
        Ok(())
    }
}
