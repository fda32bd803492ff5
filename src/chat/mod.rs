// src/chat/mod.rs - Chat session: transcript, controller and backends

pub mod backend;
pub mod direct;
pub mod keys;
pub mod message;
pub mod persona;
pub mod session;

pub use backend::{ChatBackend, HttpChatBackend, SendRequest, SendResponse};
pub use direct::DirectBackend;
pub use message::{ChatMessage, ChatRole, HistoryEntry};
pub use session::{ChatSession, SessionState};
