// src/chat/session.rs - Chat session controller
//
// Owns the transcript and the transient request flags for one session.
// Every operation comes in two phases (`begin_*` checks the guards and moves
// the state, `finish_*` applies the outcome) plus an async wrapper that runs
// the request against a `ChatBackend` in between. Failures never escape: they
// land in `error_message`.

use std::future::Future;
use std::time::{Duration, Instant};

use super::backend::{ChatBackend, GENERIC_SEND_ERROR};
use super::message::{expand_history, ChatMessage, HistoryEntry, MessageIdGen};
use crate::infra::errors::CaigentanError;

pub const HISTORY_ADVISORY: &str = "Could not load chat history, but you can keep chatting.";
pub const CLEAR_ADVISORY: &str = "Failed to clear history, please try again later.";
pub const CLEAR_CONFIRM_PROMPT: &str =
    "Clear the whole chat history? This cannot be undone.";
pub const CLEARED_NOTICE: &str = "Chat history cleared";

/// How long the post-clear notice stays visible.
pub const NOTICE_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LoadingHistory,
    Ready,
    Sending,
    Clearing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryPhase {
    NotStarted,
    Loading,
    Done,
}

/// Transient, self-expiring success indicator.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    expires_at: Instant,
}

/// Token proving a send passed the guards; consumed by `finish_send`.
#[derive(Debug)]
#[must_use]
pub struct PendingSend {
    message: String,
}

impl PendingSend {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Token proving a clear was confirmed; consumed by `finish_clear`.
#[derive(Debug)]
#[must_use]
pub struct PendingClear {
    _private: (),
}

pub struct ChatSession {
    messages: Vec<ChatMessage>,
    /// History as loaded at session start; emptied only by a confirmed clear.
    loaded_history: Vec<ChatMessage>,
    input: String,
    is_loading: bool,
    is_clearing: bool,
    history: HistoryPhase,
    error_message: Option<String>,
    notice: Option<Notice>,
    ids: MessageIdGen,
    request_timeout: Duration,
}

impl ChatSession {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            messages: Vec::new(),
            loaded_history: Vec::new(),
            input: String::new(),
            is_loading: false,
            is_clearing: false,
            history: HistoryPhase::NotStarted,
            error_message: None,
            notice: None,
            ids: MessageIdGen::new(),
            request_timeout,
        }
    }

    // ─── Exposed state ─────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        if self.is_clearing {
            return SessionState::Clearing;
        }
        if self.is_loading {
            return SessionState::Sending;
        }
        match self.history {
            HistoryPhase::NotStarted => SessionState::Idle,
            HistoryPhase::Loading => SessionState::LoadingHistory,
            HistoryPhase::Done => SessionState::Ready,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn loaded_history(&self) -> &[ChatMessage] {
        &self.loaded_history
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_clearing(&self) -> bool {
        self.is_clearing
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error_message = None;
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Whether submitting now would do anything.
    pub fn can_submit(&self) -> bool {
        !self.is_loading && !self.input.trim().is_empty()
    }

    /// Clear is offered only when there is something to clear.
    pub fn can_clear(&self) -> bool {
        !self.is_clearing && !self.messages.is_empty()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice_at(Instant::now())
    }

    pub fn notice_at(&self, now: Instant) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| now < n.expires_at)
            .map(|n| n.text.as_str())
    }

    // ─── History ───────────────────────────────────────────────

    /// Returns `false` once history has been requested for this session.
    pub fn begin_history(&mut self) -> bool {
        if self.history != HistoryPhase::NotStarted {
            return false;
        }
        self.history = HistoryPhase::Loading;
        self.error_message = None;
        true
    }

    pub fn finish_history(&mut self, result: Result<Vec<HistoryEntry>, CaigentanError>) {
        match result {
            Ok(entries) => {
                let history = expand_history(&entries);
                // Messages sent while history was in flight stay after it.
                let live = std::mem::take(&mut self.messages);
                self.messages = history.clone();
                self.messages.extend(live);
                self.loaded_history = history;
                tracing::debug!(exchanges = entries.len(), "chat history loaded");
            }
            Err(e) => {
                tracing::warn!("Failed to load chat history: {e}");
                self.error_message = Some(HISTORY_ADVISORY.to_string());
            }
        }
        self.history = HistoryPhase::Done;
    }

    pub async fn load_history<B: ChatBackend + ?Sized>(&mut self, backend: &B) {
        if !self.begin_history() {
            return;
        }
        let result = self.bounded(backend.fetch_history()).await;
        self.finish_history(result);
    }

    // ─── Send ──────────────────────────────────────────────────

    /// Guard and optimistic append. `None` means nothing happens: blank text
    /// or a send already in flight.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingSend> {
        if text.trim().is_empty() || self.is_loading {
            return None;
        }
        self.is_loading = true;
        self.error_message = None;
        self.input.clear();

        let id = self.ids.next_user_id();
        self.messages.push(ChatMessage::user(id, text));
        Some(PendingSend {
            message: text.to_string(),
        })
    }

    pub fn finish_send(&mut self, pending: PendingSend, result: Result<String, CaigentanError>) {
        match result {
            Ok(reply) => {
                let id = self.ids.next_assistant_id();
                self.messages.push(ChatMessage::assistant(id, reply));
            }
            Err(e) => {
                tracing::warn!(message_len = pending.message.len(), "Send failed: {e}");
                let text = e.to_string();
                self.error_message = Some(if text.trim().is_empty() {
                    GENERIC_SEND_ERROR.to_string()
                } else {
                    text
                });
            }
        }
        self.is_loading = false;
    }

    /// Send `text`. Returns `false` when the guards rejected it.
    pub async fn send_message<B: ChatBackend + ?Sized>(&mut self, backend: &B, text: &str) -> bool {
        let Some(pending) = self.begin_send(text) else {
            return false;
        };
        let result = self
            .bounded(backend.send(pending.message(), &self.messages))
            .await;
        self.finish_send(pending, result);
        true
    }

    /// Send whatever is in the input buffer.
    pub async fn submit<B: ChatBackend + ?Sized>(&mut self, backend: &B) -> bool {
        let text = self.input.clone();
        self.send_message(backend, &text).await
    }

    // ─── Clear ─────────────────────────────────────────────────

    /// Guard, then ask `confirm` before anything else happens.
    pub fn begin_clear(&mut self, confirm: impl FnOnce(&str) -> bool) -> Option<PendingClear> {
        if !self.can_clear() {
            return None;
        }
        if !confirm(CLEAR_CONFIRM_PROMPT) {
            return None;
        }
        self.is_clearing = true;
        self.error_message = None;
        Some(PendingClear { _private: () })
    }

    pub fn finish_clear(&mut self, pending: PendingClear, result: Result<(), CaigentanError>) {
        self.finish_clear_at(pending, result, Instant::now());
    }

    fn finish_clear_at(
        &mut self,
        _pending: PendingClear,
        result: Result<(), CaigentanError>,
        now: Instant,
    ) {
        match result {
            Ok(()) => {
                self.loaded_history.clear();
                self.messages.clear();
                self.error_message = None;
                self.notice = Some(Notice {
                    text: CLEARED_NOTICE.to_string(),
                    expires_at: now + NOTICE_DURATION,
                });
                tracing::info!("chat history cleared");
            }
            Err(e) => {
                tracing::warn!("Error clearing history: {e}");
                self.error_message = Some(CLEAR_ADVISORY.to_string());
            }
        }
        self.is_clearing = false;
    }

    /// Returns `false` when nothing was attempted (guard or declined).
    pub async fn clear_history<B: ChatBackend + ?Sized>(
        &mut self,
        backend: &B,
        confirm: impl FnOnce(&str) -> bool,
    ) -> bool {
        let Some(pending) = self.begin_clear(confirm) else {
            return false;
        };
        let result = self.bounded(backend.clear_history()).await;
        self.finish_clear(pending, result);
        true
    }

    /// Apply the request timeout, so no request can leave a flag stuck.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, CaigentanError>>,
    ) -> Result<T, CaigentanError> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CaigentanError::Timeout(self.request_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::ChatRole;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted backend that counts every call.
    #[derive(Default)]
    struct ScriptedBackend {
        history: Mutex<Option<Result<Vec<HistoryEntry>, CaigentanError>>>,
        reply: Mutex<Option<Result<String, CaigentanError>>>,
        clear: Mutex<Option<Result<(), CaigentanError>>>,
        stall: bool,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn with_history(self, entries: Vec<HistoryEntry>) -> Self {
            *self.history.lock().unwrap() = Some(Ok(entries));
            self
        }

        fn with_history_error(self) -> Self {
            *self.history.lock().unwrap() = Some(Err(CaigentanError::HistoryUnavailable(
                "history endpoint returned HTTP 500".into(),
            )));
            self
        }

        fn with_reply(self, reply: Result<String, CaigentanError>) -> Self {
            *self.reply.lock().unwrap() = Some(reply);
            self
        }

        fn with_clear(self, result: Result<(), CaigentanError>) -> Self {
            *self.clear.lock().unwrap() = Some(result);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, CaigentanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.history.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
        }

        async fn send(
            &self,
            _message: &str,
            _transcript: &[ChatMessage],
        ) -> Result<String, CaigentanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok("ok".into()))
        }

        async fn clear_history(&self) -> Result<(), CaigentanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.clear.lock().unwrap().take().unwrap_or(Ok(()))
        }
    }

    fn session() -> ChatSession {
        ChatSession::new(Duration::from_secs(5))
    }

    fn entry(ts: &str, user: &str, bot: &str) -> HistoryEntry {
        HistoryEntry {
            timestamp: ts.into(),
            user: user.into(),
            bot: bot.into(),
        }
    }

    fn contents(session: &ChatSession) -> Vec<(ChatRole, String)> {
        session
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    // ─── History ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_history_expands_into_pairs() {
        let backend = ScriptedBackend::default().with_history(vec![entry("t1", "A", "B")]);
        let mut s = session();
        assert_eq!(s.state(), SessionState::Idle);

        s.load_history(&backend).await;

        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(
            contents(&s),
            vec![
                (ChatRole::User, "A".to_string()),
                (ChatRole::Assistant, "B".to_string())
            ]
        );
        assert_eq!(s.messages()[0].id, "t1");
        assert_eq!(s.messages()[1].id, "t1_response");
        assert_eq!(s.loaded_history().len(), 2);
        assert!(s.error_message().is_none());
    }

    #[tokio::test]
    async fn test_history_failure_degrades_to_empty_transcript() {
        let backend = ScriptedBackend::default().with_history_error();
        let mut s = session();
        s.load_history(&backend).await;

        assert_eq!(s.state(), SessionState::Ready);
        assert!(s.messages().is_empty());
        assert_eq!(s.error_message(), Some(HISTORY_ADVISORY));

        // Chat remains usable
        assert!(s.send_message(&backend, "hi").await);
        assert_eq!(s.messages().len(), 2);
        assert!(s.error_message().is_none());
    }

    #[tokio::test]
    async fn test_history_loads_exactly_once() {
        let backend = ScriptedBackend::default().with_history(vec![entry("t1", "A", "B")]);
        let mut s = session();
        s.load_history(&backend).await;
        s.load_history(&backend).await;
        assert_eq!(backend.calls(), 1);
        assert_eq!(s.messages().len(), 2);
    }

    #[test]
    fn test_history_state_while_loading() {
        let mut s = session();
        assert!(s.begin_history());
        assert_eq!(s.state(), SessionState::LoadingHistory);
        assert!(!s.begin_history());
    }

    #[test]
    fn test_live_messages_sent_during_history_load_stay_after_history() {
        let mut s = session();
        assert!(s.begin_history());
        let pending = s.begin_send("early").unwrap();
        s.finish_send(pending, Ok("reply".into()));

        s.finish_history(Ok(vec![entry("t1", "A", "B")]));
        let order: Vec<String> = s.messages().iter().map(|m| m.content.clone()).collect();
        assert_eq!(order, vec!["A", "B", "early", "reply"]);
    }

    // ─── Send ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_blank_sends_are_noops() {
        let backend = ScriptedBackend::default();
        let mut s = session();
        assert!(!s.send_message(&backend, "").await);
        assert!(!s.send_message(&backend, "   ").await);
        assert!(!s.send_message(&backend, "\n\t").await);
        assert_eq!(backend.calls(), 0);
        assert!(s.messages().is_empty());
        assert!(!s.is_loading());
    }

    #[test]
    fn test_send_while_sending_is_noop() {
        let mut s = session();
        let first = s.begin_send("hi").unwrap();
        assert_eq!(s.state(), SessionState::Sending);

        assert!(s.begin_send("hi").is_none());
        assert_eq!(s.messages().len(), 1);

        s.finish_send(first, Ok("there".into()));
        assert!(!s.is_loading());
    }

    #[tokio::test]
    async fn test_send_success_appends_pair() {
        let backend = ScriptedBackend::default().with_reply(Ok("there".into()));
        let mut s = session();
        s.load_history(&backend).await;

        assert!(s.send_message(&backend, "hi").await);
        assert_eq!(
            contents(&s),
            vec![
                (ChatRole::User, "hi".to_string()),
                (ChatRole::Assistant, "there".to_string())
            ]
        );
        assert!(s.messages()[1].id.ends_with("_response"));
        assert!(!s.is_loading());
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_user_message() {
        let backend = ScriptedBackend::default().with_reply(Err(CaigentanError::SendFailed(
            "error sending request: connection refused".into(),
        )));
        let mut s = session();

        s.send_message(&backend, "hi").await;
        assert_eq!(contents(&s), vec![(ChatRole::User, "hi".to_string())]);
        assert_eq!(
            s.error_message(),
            Some("error sending request: connection refused")
        );
        assert!(!s.is_loading());
    }

    #[tokio::test]
    async fn test_send_failure_without_message_uses_generic_text() {
        let backend =
            ScriptedBackend::default().with_reply(Err(CaigentanError::SendFailed(String::new())));
        let mut s = session();
        s.send_message(&backend, "hi").await;
        assert_eq!(s.error_message(), Some(GENERIC_SEND_ERROR));
    }

    #[tokio::test]
    async fn test_next_send_clears_previous_error() {
        let backend =
            ScriptedBackend::default().with_reply(Err(CaigentanError::SendFailed("boom".into())));
        let mut s = session();
        s.send_message(&backend, "first").await;
        assert_eq!(s.error_message(), Some("boom"));

        s.send_message(&backend, "second").await;
        assert!(s.error_message().is_none());
        assert_eq!(s.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_submit_uses_and_clears_input_buffer() {
        let backend = ScriptedBackend::default().with_reply(Ok("sure".into()));
        let mut s = session();
        s.set_input("cheap hotpot?");
        assert!(s.can_submit());

        assert!(s.submit(&backend).await);
        assert_eq!(s.input(), "");
        assert_eq!(s.messages()[0].content, "cheap hotpot?");
        assert!(!s.can_submit());
    }

    #[tokio::test]
    async fn test_stalled_send_times_out_and_releases_guard() {
        let backend = ScriptedBackend {
            stall: true,
            ..Default::default()
        };
        let mut s = ChatSession::new(Duration::from_millis(20));

        s.send_message(&backend, "hi").await;
        assert!(!s.is_loading());
        assert!(s.error_message().unwrap().contains("timed out"));
        assert_eq!(s.messages().len(), 1);
    }

    // ─── Clear ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_clear_without_confirmation_does_nothing() {
        let backend = ScriptedBackend::default().with_history(vec![entry("t1", "A", "B")]);
        let mut s = session();
        s.load_history(&backend).await;
        let calls_before = backend.calls();

        let mut asked = false;
        let attempted = s
            .clear_history(&backend, |prompt| {
                asked = true;
                assert_eq!(prompt, CLEAR_CONFIRM_PROMPT);
                false
            })
            .await;

        assert!(asked);
        assert!(!attempted);
        assert_eq!(backend.calls(), calls_before);
        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.loaded_history().len(), 2);
        assert!(!s.is_clearing());
    }

    #[tokio::test]
    async fn test_clear_confirmed_success_empties_everything() {
        let backend = ScriptedBackend::default().with_history(vec![entry("t1", "A", "B")]);
        let mut s = session();
        s.load_history(&backend).await;
        s.send_message(&backend, "hi").await;

        assert!(s.clear_history(&backend, |_| true).await);
        assert!(s.messages().is_empty());
        assert!(s.loaded_history().is_empty());
        assert!(s.error_message().is_none());
        assert_eq!(s.notice(), Some(CLEARED_NOTICE));
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_clear_failure_leaves_transcript() {
        let backend = ScriptedBackend::default()
            .with_history(vec![entry("t1", "A", "B")])
            .with_clear(Err(CaigentanError::ClearFailed("HTTP 500".into())));
        let mut s = session();
        s.load_history(&backend).await;

        assert!(s.clear_history(&backend, |_| true).await);
        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.loaded_history().len(), 2);
        assert_eq!(s.error_message(), Some(CLEAR_ADVISORY));
        assert!(s.notice().is_none());
        assert!(!s.is_clearing());
    }

    #[test]
    fn test_clear_guards() {
        let mut s = session();
        // Empty transcript: never even asks
        assert!(s.begin_clear(|_| panic!("should not ask")).is_none());

        let pending = s.begin_send("hi").unwrap();
        s.finish_send(pending, Ok("there".into()));

        let first = s.begin_clear(|_| true).unwrap();
        assert_eq!(s.state(), SessionState::Clearing);
        assert!(s.begin_clear(|_| panic!("should not ask")).is_none());
        s.finish_clear(first, Ok(()));
        assert!(!s.is_clearing());
    }

    #[test]
    fn test_notice_expires() {
        let mut s = session();
        let pending = s.begin_send("hi").unwrap();
        s.finish_send(pending, Ok("there".into()));

        let now = Instant::now();
        let clear = s.begin_clear(|_| true).unwrap();
        s.finish_clear_at(clear, Ok(()), now);

        assert_eq!(s.notice_at(now + Duration::from_millis(1500)), Some(CLEARED_NOTICE));
        assert!(s.notice_at(now + NOTICE_DURATION).is_none());
    }

    #[test]
    fn test_dismiss_error() {
        let mut s = session();
        s.begin_history();
        s.finish_history(Err(CaigentanError::HistoryUnavailable("x".into())));
        assert!(s.error_message().is_some());
        s.dismiss_error();
        assert!(s.error_message().is_none());
    }
}
