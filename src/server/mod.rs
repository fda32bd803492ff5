// src/server/mod.rs - Chatbot HTTP backend (`/chat/*` and `/api/preferences`)

pub mod chatbot;
pub mod handlers;
pub mod types;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::infra::config::ServerConfig;
pub use chatbot::Chatbot;

/// Shared state for handlers.
#[derive(Clone)]
pub struct ServerState {
    pub chatbot: Arc<Mutex<Chatbot>>,
}

impl ServerState {
    pub fn new(chatbot: Chatbot) -> Self {
        Self {
            chatbot: Arc::new(Mutex::new(chatbot)),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {o}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// Build the axum router with all routes.
pub fn build_router(state: ServerState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/chat/history", get(handlers::get_history))
        .route("/chat/send", post(handlers::send_message))
        .route("/chat/clear-history", post(handlers::clear_history))
        .route("/chat/health", get(handlers::health))
        .route("/api/preferences", post(handlers::save_preferences))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Serve until interrupted with Ctrl-C.
pub async fn start_server(config: &ServerConfig, state: ServerState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let router = build_router(state, &config.cors_origins);

    tracing::info!("Chat backend listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::HistoryEntry;
    use crate::infra::errors::CaigentanError;
    use crate::provider::{ChatRequest, ChatResponse, ChunkStream, ModelProvider, TokenUsage};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::path::Path;
    use tower::ServiceExt;

    struct FixedProvider {
        fail: bool,
    }

    #[async_trait]
    impl ModelProvider for FixedProvider {
        fn id(&self) -> &str {
            "fixed"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, CaigentanError> {
            if self.fail {
                return Err(CaigentanError::Provider {
                    provider: "fixed".into(),
                    message: "upstream down".into(),
                    retriable: false,
                });
            }
            Ok(ChatResponse {
                content: "Try the beef noodles on Hankou Road.".into(),
                usage: TokenUsage::default(),
            })
        }

        async fn chat_stream(&self, _request: ChatRequest) -> Result<ChunkStream, CaigentanError> {
            Err(CaigentanError::Config("no streaming".into()))
        }
    }

    fn app(dir: &Path, fail: bool) -> (Router, ServerState) {
        let chatbot = Chatbot::new(
            Arc::new(FixedProvider { fail }),
            "deepseek-chat",
            dir.join("chat_history.json"),
            dir.join("user_preferences.json"),
        );
        let state = ServerState::new(chatbot);
        let origins = vec!["http://localhost:3000".to_string()];
        (build_router(state.clone(), &origins), state)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_send_then_history() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(dir.path(), false);

        let resp = router
            .clone()
            .oneshot(post_json("/chat/send", r#"{"message":"noodles?"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["response"], "Try the beef noodles on Hankou Road.");
        assert!(body.get("error").is_none());

        let req = Request::builder()
            .uri("/chat/history")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let history: Vec<HistoryEntry> = serde_json::from_value(json_body(resp).await).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user, "noodles?");
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(dir.path(), false);
        let resp = router
            .oneshot(post_json("/chat/send", r#"{"message":"  "}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "Message cannot be empty");
    }

    #[tokio::test]
    async fn test_provider_failure_reported_in_body() {
        let dir = tempfile::tempdir().unwrap();
        let (router, state) = app(dir.path(), true);
        let resp = router
            .oneshot(post_json("/chat/send", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["response"], "");
        assert!(body["error"].as_str().unwrap().contains("upstream down"));
        assert!(state.chatbot.lock().await.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_history_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(dir.path(), false);
        router
            .clone()
            .oneshot(post_json("/chat/send", r#"{"message":"hi"}"#))
            .await
            .unwrap();

        let health = || {
            Request::builder()
                .uri("/chat/health")
                .body(Body::empty())
                .unwrap()
        };
        let body = json_body(router.clone().oneshot(health()).await.unwrap()).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["components"]["chatbot"], "active");
        assert_eq!(body["components"]["history"], 1);

        let resp = router
            .clone()
            .oneshot(post_json("/chat/clear-history", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");

        let body = json_body(router.oneshot(health()).await.unwrap()).await;
        assert_eq!(body["components"]["history"], 0);
    }

    #[tokio::test]
    async fn test_save_preferences_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(dir.path(), false);
        let record = serde_json::to_string(&crate::preferences::PreferenceRecord::default()).unwrap();

        let resp = router
            .oneshot(post_json("/api/preferences", &record))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "success");

        let saved = std::fs::read_to_string(dir.path().join("user_preferences.json")).unwrap();
        let parsed: crate::preferences::PreferenceRecord = serde_json::from_str(&saved).unwrap();
        assert_eq!(parsed, crate::preferences::PreferenceRecord::default());
    }

    #[tokio::test]
    async fn test_cors_allows_frontend_origin() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(dir.path(), false);
        let req = Request::builder()
            .uri("/chat/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }

    /// Blocks in `chat` until released.
    struct GatedProvider {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl ModelProvider for GatedProvider {
        fn id(&self) -> &str {
            "gated"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, CaigentanError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ChatResponse {
                content: "done".into(),
                usage: TokenUsage::default(),
            })
        }

        async fn chat_stream(&self, _request: ChatRequest) -> Result<ChunkStream, CaigentanError> {
            Err(CaigentanError::Config("no streaming".into()))
        }
    }

    #[tokio::test]
    async fn test_history_served_while_send_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(GatedProvider {
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let chatbot = Chatbot::new(
            provider.clone(),
            "deepseek-chat",
            dir.path().join("chat_history.json"),
            dir.path().join("user_preferences.json"),
        );
        let router = build_router(ServerState::new(chatbot), &[]);

        let send = tokio::spawn(
            router
                .clone()
                .oneshot(post_json("/chat/send", r#"{"message":"hi"}"#)),
        );
        provider.entered.notified().await;

        let req = Request::builder()
            .uri("/chat/history")
            .body(Body::empty())
            .unwrap();
        let resp = tokio::time::timeout(std::time::Duration::from_secs(2), router.clone().oneshot(req))
            .await
            .expect("history blocked behind the in-flight send")
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        provider.release.notify_one();
        let resp = send.await.unwrap().unwrap();
        assert_eq!(json_body(resp).await["response"], "done");

        let req = Request::builder()
            .uri("/chat/history")
            .body(Body::empty())
            .unwrap();
        let history: Vec<HistoryEntry> =
            serde_json::from_value(json_body(router.oneshot(req).await.unwrap()).await).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bot, "done");
    }
}
