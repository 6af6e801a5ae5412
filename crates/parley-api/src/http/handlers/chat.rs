//! SSE streaming chat endpoint.
//!
//! POST /api/v1/sessions/{id}/messages
//!
//! The turn is admitted before the response starts, so an unknown session
//! answers 404 and a session that is still replying answers 409. After that
//! the turn runs in its own task and its events are relayed as Server-Sent
//! Events until the assistant message settles. Closing the connection does
//! not stop the turn; use `POST /sessions/{id}/cancel` for that.
//!
//! SSE event types (data is the JSON-encoded event):
//! - `turn_started` - `{ "session_id", "user_message_id", "assistant_message_id" }`
//! - `fragment` - `{ "session_id", "message_id", "text" }`
//! - `turn_finished` - `{ "session_id", "message_id", "status", "error"? }`
//! - `session_deleted` - the session was deleted mid-reply; the stream ends

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::Stream;
use tracing::{debug, warn};

use parley_core::event::bus::is_for_session;
use parley_types::event::ChatEvent;

use crate::http::error::AppError;
use crate::http::handlers::session::parse_session_id;
use crate::http::response::{request_id, ApiResponse};
use crate::state::AppState;

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

fn sse_event(event: &ChatEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.name()).data(data)
}

/// POST /api/v1/sessions/{id}/messages - Send a message and stream the reply.
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session_id = parse_session_id(&session_id)?;
    if body.content.trim().is_empty() {
        return Err(AppError::Validation("content must not be empty".to_string()));
    }

    // Subscribe first so `turn_started` is not missed.
    let mut events = state.context.events().subscribe();
    let turn = state
        .context
        .orchestrator()
        .begin_turn(&session_id, body.content)
        .await?;
    let message_id = turn.assistant_message_id();
    tokio::spawn(turn.run());

    let sse_stream = async_stream::stream! {
        loop {
            match events.recv().await {
                Ok(event) if is_for_session(&event, &session_id) => {
                    let last = match &event {
                        ChatEvent::TurnFinished { message_id: id, .. } => *id == message_id,
                        ChatEvent::SessionDeleted { .. } => true,
                        _ => false,
                    };
                    yield Ok::<_, Infallible>(sse_event(&event));
                    if last {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%session_id, skipped, "SSE subscriber lagged; fragments dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(%session_id, %message_id, "SSE stream finished");
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// GET /api/v1/models - Models offered by the completion service.
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let models = state
        .context
        .orchestrator()
        .list_models()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "models": models, "default": state.model() }),
        request_id(),
        0,
    )))
}
