//! HTTP request handlers

use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, ThreadListResponse, ThreadResponse,
};
use super::AppState;
use crate::agent::AgentError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/threads", get(list_threads))
        .route("/api/threads/:id", get(get_thread))
        .route("/version", get(get_version))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// One user-facing turn: blocks until the agent loop produces the final
/// assistant answer for this thread.
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message is required".to_string()));
    }

    let reply = state.sessions.chat(req.thread_id, &req.message).await?;

    Ok(Json(ChatResponse {
        response: reply.response,
        thread_id: reply.thread_id,
    }))
}

async fn list_threads(State(state): State<AppState>) -> Result<Json<ThreadListResponse>, AppError> {
    let threads = state
        .sessions
        .store()
        .list_threads()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ThreadListResponse { threads }))
}

/// Read-only history. An unknown id yields an empty history, mirroring the
/// checkpoint store's load contract.
async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadResponse>, AppError> {
    let thread = state
        .sessions
        .store()
        .load(&id)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ThreadResponse {
        thread_id: thread.thread_id,
        messages: thread.messages,
    }))
}

async fn get_version() -> &'static str {
    concat!("threadline ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Upstream(String),
    Internal(String),
}

impl From<AgentError> for AppError {
    fn from(e: AgentError) -> Self {
        match &e {
            AgentError::Model(_) | AgentError::CycleLimit { .. } => AppError::Upstream(e.to_string()),
            AgentError::Store(_) | AgentError::Protocol(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
