// src/server/handlers.rs

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::chat::message::HistoryEntry;
use crate::preferences::PreferenceRecord;
use crate::server::{chatbot, types::*, ServerState};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal(error: String) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error }),
    )
}

/// GET /chat/history - Every logged exchange, oldest first.
pub async fn get_history(
    State(state): State<ServerState>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let chatbot = state.chatbot.lock().await;
    match chatbot.history().await {
        Ok(history) => {
            tracing::info!(entries = history.len(), "history served");
            Ok(Json(history))
        }
        Err(e) => {
            tracing::error!("Failed to read chat history: {e}");
            Err(internal(format!("Failed to read chat history: {e}")))
        }
    }
}

/// POST /chat/send - Ask the chatbot. Provider failures are reported in the
/// `error` field of a 200 response.
pub async fn send_message(
    State(state): State<ServerState>,
    Json(body): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    if body.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message cannot be empty".into(),
            }),
        ));
    }

    // Not locked across the model call.
    let (provider, request) = {
        let chatbot = state.chatbot.lock().await;
        (chatbot.provider(), chatbot.prepare(&body.message).await)
    };

    match chatbot::ask(provider.as_ref(), request).await {
        Ok(response) => {
            state
                .chatbot
                .lock()
                .await
                .record(&body.message, &response)
                .await;
            Ok(Json(SendResponse {
                response,
                error: None,
            }))
        }
        Err(e) => {
            tracing::error!("Chat request failed: {e}");
            Ok(Json(SendResponse {
                response: String::new(),
                error: Some(format!("Error while processing request: {e}")),
            }))
        }
    }
}

/// POST /chat/clear-history - Empty the log and the conversation memory.
pub async fn clear_history(
    State(state): State<ServerState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut chatbot = state.chatbot.lock().await;
    chatbot.clear_history().await.map_err(|e| {
        tracing::error!("Failed to clear chat history: {e}");
        internal(format!("Failed to clear chat history: {e}"))
    })?;
    tracing::info!("chat history cleared");
    Ok(Json(StatusResponse::new("ok")))
}

/// GET /chat/health - Liveness plus the history size.
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let chatbot = state.chatbot.lock().await;
    let response = match chatbot.history().await {
        Ok(history) => HealthResponse {
            status: "ok".into(),
            components: Some(HealthComponents {
                chatbot: "active".into(),
                history: history.len(),
            }),
            detail: None,
        },
        Err(e) => HealthResponse {
            status: "error".into(),
            components: None,
            detail: Some(e.to_string()),
        },
    };
    Json(response)
}

/// POST /api/preferences - Store the record the chatbot folds into its prompt.
pub async fn save_preferences(
    State(state): State<ServerState>,
    Json(record): Json<PreferenceRecord>,
) -> Result<Json<StatusResponse>, ApiError> {
    let json = serde_json::to_string_pretty(&record).map_err(|e| internal(e.to_string()))?;

    // Written under the chatbot lock; `chat` reads this file.
    let chatbot = state.chatbot.lock().await;
    let path = chatbot.preferences_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| internal(e.to_string()))?;
    }
    tokio::fs::write(path, json).await.map_err(|e| {
        tracing::error!("Failed to save preferences: {e}");
        internal(e.to_string())
    })?;

    tracing::info!(path = %path.display(), "preferences saved");
    Ok(Json(StatusResponse::new("success")))
}
