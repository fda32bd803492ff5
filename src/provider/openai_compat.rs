// src/provider/openai_compat.rs - Generic OpenAI-compatible provider
//
// Used for DeepSeek (the default) and any other endpoint that speaks the
// `/chat/completions` contract.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest_eventsource::{Event, RequestBuilderExt};
use std::time::Duration;

use super::{ChatChunk, ChatRequest, ChatResponse, ChunkStream, ModelProvider, TokenUsage};
use crate::infra::config::ProviderConfig;
use crate::infra::errors::CaigentanError;

/// Matches the upstream request timeout the chatbot has always used.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAICompatProvider {
    id_str: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(id: impl Into<String>, api_key: String, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            id_str: id.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from the `[provider]` config section. Fails when no key resolves.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, CaigentanError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| CaigentanError::NoApiKey {
                env: config.api_key_env.clone(),
            })?;
        Ok(Self::new(config.id.clone(), api_key, config.base_url.clone()))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for m in &request.messages {
            messages.push(serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            }));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
        });
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }

    fn status_error(&self, status: StatusCode, body: String) -> CaigentanError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return CaigentanError::RateLimited {
                provider: self.id_str.clone(),
                retry_after_ms: 0,
            };
        }
        CaigentanError::Provider {
            provider: self.id_str.clone(),
            message: format!("HTTP {status}: {body}"),
            retriable: status.is_server_error(),
        }
    }
}

fn parse_usage(value: &serde_json::Value) -> Option<TokenUsage> {
    if !value.is_object() {
        return None;
    }
    Some(TokenUsage {
        input_tokens: value["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: value["completion_tokens"].as_u64().unwrap_or(0) as u32,
    })
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, CaigentanError> {
        let body = Self::request_body(&request, false);

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| CaigentanError::Provider {
                provider: self.id_str.clone(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, error_body));
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| CaigentanError::Provider {
                provider: self.id_str.clone(),
                message: e.to_string(),
                retriable: false,
            })?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(ChatResponse {
            content,
            usage: parse_usage(&resp["usage"]).unwrap_or_default(),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, CaigentanError> {
        let body = Self::request_body(&request, true);
        let provider_id = self.id_str.clone();

        let mut es = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .eventsource()
            .map_err(|e| CaigentanError::Provider {
                provider: provider_id.clone(),
                message: format!("Failed to open SSE stream: {e}"),
                retriable: false,
            })?;

        let stream = async_stream::stream! {
            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        if msg.data == "[DONE]" {
                            break;
                        }
                        let parsed: serde_json::Value = match serde_json::from_str(&msg.data) {
                            Ok(v) => v,
                            Err(e) => {
                                yield Err(CaigentanError::Provider {
                                    provider: provider_id.clone(),
                                    message: format!("Failed to parse SSE data: {e}"),
                                    retriable: false,
                                });
                                break;
                            }
                        };

                        let delta = parsed["choices"][0]["delta"]["content"]
                            .as_str()
                            .unwrap_or("")
                            .to_string();
                        let usage = parse_usage(&parsed["usage"]);

                        if !delta.is_empty() || usage.is_some() {
                            yield Ok(ChatChunk { delta, usage });
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        yield Err(CaigentanError::Provider {
                            provider: provider_id.clone(),
                            message: format!("SSE stream error: {e}"),
                            retriable: false,
                        });
                        break;
                    }
                }
            }
            es.close();
        };

        Ok(Box::pin(stream))
    }
}
