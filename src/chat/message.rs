// src/chat/message.rs - Transcript messages and server history rows

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::provider::Message;

/// Suffix distinguishing an assistant reply's id from its prompt's.
pub const RESPONSE_SUFFIX: &str = "_response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for Message {
    fn from(message: &ChatMessage) -> Self {
        match message.role {
            ChatRole::User => Message::user(message.content.clone()),
            ChatRole::Assistant => Message::assistant(message.content.clone()),
        }
    }
}

/// One past exchange as served by `GET /chat/history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub user: String,
    pub bot: String,
}

/// Expand each row into a user message followed by its assistant reply,
/// preserving server order.
pub fn expand_history(entries: &[HistoryEntry]) -> Vec<ChatMessage> {
    entries
        .iter()
        .flat_map(|entry| {
            [
                ChatMessage::user(entry.timestamp.clone(), entry.user.clone()),
                ChatMessage::assistant(
                    format!("{}{RESPONSE_SUFFIX}", entry.timestamp),
                    entry.bot.clone(),
                ),
            ]
        })
        .collect()
}

/// Ids for live messages: creation time in epoch milliseconds, bumped
/// forward when two messages land in the same millisecond.
#[derive(Debug, Default)]
pub struct MessageIdGen {
    last_ms: i64,
}

impl MessageIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_user_id(&mut self) -> String {
        self.next_ms().to_string()
    }

    pub fn next_assistant_id(&mut self) -> String {
        format!("{}{RESPONSE_SUFFIX}", self.next_ms())
    }

    fn next_ms(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let ms = now.max(self.last_ms + 1);
        self.last_ms = ms;
        ms
    }
}
