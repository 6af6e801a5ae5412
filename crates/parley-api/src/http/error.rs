//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use parley_types::error::ChatError;

use crate::http::response::{request_id, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Session lookup or turn admission failure.
    Chat(ChatError),
    /// Malformed request.
    Validation(String),
    /// Anything else.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(e @ ChatError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", e.to_string())
            }
            AppError::Chat(e @ ChatError::Busy(_)) => {
                (StatusCode::CONFLICT, "SESSION_BUSY", e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }
        (status, Json(ApiResponse::error(code, &message, request_id()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::chat::SessionId;

    #[test]
    fn chat_errors_map_to_status_codes() {
        let id = SessionId::new();
        assert_eq!(AppError::from(ChatError::NotFound(id)).parts().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(ChatError::Busy(id)).parts().0, StatusCode::CONFLICT);
        assert_eq!(AppError::Validation("x".into()).parts().0, StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Internal("x".into()).parts().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_carries_status() {
        let resp = AppError::from(ChatError::Busy(SessionId::new())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
