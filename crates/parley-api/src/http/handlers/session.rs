//! Session HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/sessions             - Create a session
//! - GET    /api/v1/sessions             - List sessions
//! - GET    /api/v1/sessions/{id}        - Get a session with its messages
//! - PATCH  /api/v1/sessions/{id}        - Rename a session
//! - DELETE /api/v1/sessions/{id}        - Delete a session
//! - POST   /api/v1/sessions/{id}/cancel - Cancel the in-flight reply

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use parley_types::chat::{ChatSession, SessionId, SessionSummary};

use crate::http::error::AppError;
use crate::http::response::{request_id, ApiResponse};
use crate::state::AppState;

/// Request body for creating a session.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Title; the configured default is used when absent or blank.
    #[serde(default)]
    pub title: Option<String>,
}

/// Request body for renaming a session.
#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub title: String,
}

/// Parse a session id from a path parameter, returning a 400 error on invalid format.
pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid session id: {raw}")))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// POST /api/v1/sessions - Create a session. The JSON body is optional.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<ChatSession>>), AppError> {
    let start = Instant::now();
    let body: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?
    };

    let session = state.context.create_session(body.title).await;
    let href = format!("/api/v1/sessions/{}", session.id);
    let resp = ApiResponse::success(session, request_id(), elapsed_ms(start))
        .with_link("self", &href)
        .with_link("messages", &format!("{href}/messages"));

    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/v1/sessions - List sessions, most recently active first.
pub async fn list_sessions(State(state): State<AppState>) -> Json<ApiResponse<Vec<SessionSummary>>> {
    let start = Instant::now();
    let sessions = state.context.session_summaries().await;
    Json(ApiResponse::success(sessions, request_id(), elapsed_ms(start)).with_link("self", "/api/v1/sessions"))
}

/// GET /api/v1/sessions/{id} - Get a session with its messages.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<ChatSession>>, AppError> {
    let start = Instant::now();
    let id = parse_session_id(&session_id)?;

    let session = state.context.get_session(&id).await?;
    Ok(Json(
        ApiResponse::success(session, request_id(), elapsed_ms(start))
            .with_link("messages", &format!("/api/v1/sessions/{id}/messages")),
    ))
}

/// PATCH /api/v1/sessions/{id} - Rename a session.
pub async fn rename_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<RenameSessionRequest>,
) -> Result<Json<ApiResponse<ChatSession>>, AppError> {
    let start = Instant::now();
    let id = parse_session_id(&session_id)?;

    let title = body.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }

    let session = state.context.rename_session(&id, title).await?;
    Ok(Json(ApiResponse::success(session, request_id(), elapsed_ms(start))))
}

/// DELETE /api/v1/sessions/{id} - Delete a session, cancelling any in-flight reply.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let id = parse_session_id(&session_id)?;

    state.context.delete_session(&id).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "deleted": id }),
        request_id(),
        elapsed_ms(start),
    )))
}

/// POST /api/v1/sessions/{id}/cancel - Cancel the in-flight reply.
///
/// Succeeds whether or not a reply was running; `cancelled` says which.
pub async fn cancel_turn(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let id = parse_session_id(&session_id)?;

    let cancelled = state.context.cancel(&id).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "cancelled": cancelled }),
        request_id(),
        elapsed_ms(start),
    )))
}
