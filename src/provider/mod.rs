// src/provider/mod.rs - Upstream LLM provider layer
//
// `openai_compat` speaks the HTTP protocol; `retry` wraps any provider with
// backoff. Both chat paths (server chatbot and direct mode) go through here.

pub mod openai_compat;
pub mod retry;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::infra::errors::CaigentanError;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, CaigentanError>> + Send>>;

/// A `/chat/completions`-style backend (DeepSeek by default).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, CaigentanError>;

    /// Open a stream of content deltas.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, CaigentanError>;
}

/// One completion request. The persona prompt travels in `system`, never in
/// `messages`.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct ChatChunk {
    pub delta: String,
    /// Sent by some endpoints on the final chunk only.
    pub usage: Option<TokenUsage>,
}

/// Conversation turn as sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}
