// src/cli/serve.rs - `caigentan serve`: run the chat backend

use std::sync::Arc;

use crate::infra::config::Config;
use crate::infra::paths;
use crate::provider::openai_compat::OpenAICompatProvider;
use crate::provider::retry::RetryProvider;
use crate::provider::ModelProvider;
use crate::server::{self, Chatbot, ServerState};

pub async fn run_serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    paths::ensure_dirs().await?;

    let inner: Arc<dyn ModelProvider> =
        Arc::new(OpenAICompatProvider::from_config(&config.provider)?);
    let provider = Arc::new(RetryProvider::with_max_retries(
        inner,
        config.provider.max_retries,
    ));
    tracing::info!(
        provider = %config.provider.id,
        model = %config.provider.model,
        base_url = %config.provider.base_url,
        "chat model ready"
    );

    let chatbot = Chatbot::new(
        provider,
        config.provider.model.clone(),
        paths::chat_history_path(),
        paths::server_preferences_path(),
    )
    .with_temperature(config.provider.temperature)
    .with_max_exchanges(config.memory.max_exchanges);

    let mut server_config = config.server.clone();
    if let Some(port) = port {
        server_config.port = port;
    }
    server::start_server(&server_config, ServerState::new(chatbot)).await
}
