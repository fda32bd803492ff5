// src/server/chatbot.rs - Server-side chatbot: prompt assembly, memory, history log

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use crate::chat::message::HistoryEntry;
use crate::chat::persona;
use crate::infra::errors::CaigentanError;
use crate::preferences::PreferenceRecord;
use crate::provider::{ChatRequest, Message, ModelProvider};

/// Answers `/chat/send` and owns the on-disk history log.
///
/// Shared behind a `tokio::sync::Mutex`; the history file is only touched
/// while that lock is held. The provider call itself runs unlocked (see
/// [`crate::server::handlers::send_message`]).
pub struct Chatbot {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: Option<f32>,
    history_path: PathBuf,
    preferences_path: PathBuf,
    /// Recent (question, answer) pairs replayed to the model.
    memory: VecDeque<(String, String)>,
    max_exchanges: usize,
}

impl Chatbot {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: impl Into<String>,
        history_path: impl Into<PathBuf>,
        preferences_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            history_path: history_path.into(),
            preferences_path: preferences_path.into(),
            memory: VecDeque::new(),
            max_exchanges: 20,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_exchanges(mut self, max_exchanges: usize) -> Self {
        self.max_exchanges = max_exchanges;
        self
    }

    pub fn preferences_path(&self) -> &Path {
        &self.preferences_path
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn provider(&self) -> Arc<dyn ModelProvider> {
        self.provider.clone()
    }

    /// Answer one question: [`Chatbot::prepare`], [`ask`], then
    /// [`Chatbot::record`].
    pub async fn chat(&mut self, message: &str) -> Result<String, CaigentanError> {
        let request = self.prepare(message).await;
        let answer = ask(self.provider.as_ref(), request).await?;
        self.record(message, &answer).await;
        Ok(answer)
    }

    /// Build the upstream request: persona, uploaded preferences, memory,
    /// then the question.
    pub async fn prepare(&self, message: &str) -> ChatRequest {
        let preferences = self.load_preferences().await;
        self.build_request(message, preferences.as_ref())
    }

    /// Keep a successful exchange in memory and in the history log. A log
    /// write failure is logged; the reply still stands.
    pub async fn record(&mut self, question: &str, answer: &str) {
        self.remember(question, answer);
        if let Err(e) = self.append_history(question, answer).await {
            tracing::warn!(
                path = %self.history_path.display(),
                "Failed to append chat history: {e}"
            );
        }
    }

    fn build_request(&self, message: &str, preferences: Option<&PreferenceRecord>) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.memory.len() * 2 + 1);
        for (question, answer) in &self.memory {
            messages.push(Message::user(question.clone()));
            messages.push(Message::assistant(answer.clone()));
        }
        messages.push(Message::user(message.to_string()));

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            system: Some(persona::build_system_prompt(preferences)),
            ..Default::default()
        }
    }

    fn remember(&mut self, question: &str, answer: &str) {
        self.memory
            .push_back((question.to_string(), answer.to_string()));
        while self.memory.len() > self.max_exchanges {
            self.memory.pop_front();
        }
    }

    /// Last uploaded preferences. A missing or unreadable file means none.
    async fn load_preferences(&self) -> Option<PreferenceRecord> {
        let content = tokio::fs::read_to_string(&self.preferences_path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Ignoring unreadable preferences file: {e}");
                None
            }
        }
    }

    /// Full history log, oldest first. A missing file is an empty log.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, CaigentanError> {
        match tokio::fs::read_to_string(&self.history_path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_history(&self, user: &str, bot: &str) -> Result<(), CaigentanError> {
        let mut history = self.history().await?;
        history.push(HistoryEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            user: user.to_string(),
            bot: bot.to_string(),
        });
        self.write_history(&history).await
    }

    /// Empty both the log and the conversation memory.
    pub async fn clear_history(&mut self) -> Result<(), CaigentanError> {
        self.write_history(&[]).await?;
        self.memory.clear();
        Ok(())
    }

    /// Rewrite the log through a temp file and a rename.
    async fn write_history(&self, history: &[HistoryEntry]) -> Result<(), CaigentanError> {
        if let Some(parent) = self.history_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(history)?;

        let tmp = self.history_path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.history_path).await?;
        Ok(())
    }
}

/// One provider round trip, timed.
pub async fn ask(
    provider: &dyn ModelProvider,
    request: ChatRequest,
) -> Result<String, CaigentanError> {
    let started = std::time::Instant::now();
    let response = provider.chat(request).await?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        tokens = response.usage.total(),
        "chat reply generated"
    );
    Ok(response.content)
}
