//! Maps the kernel's `seed_domain::Error` (and the handlers' own "not
//! found" case) onto the wire error codes of §6: `400` validation, `404`
//! task/event not found, `409` stale interaction / invalid transition,
//! `500` unexpected. `401` is handled entirely by [`crate::auth`] and never
//! reaches a handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use seed_domain::Error as DomainError;

pub enum ApiError {
    NotFound(String),
    Domain(DomainError),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(what) => (StatusCode::NOT_FOUND, what),
            Self::Domain(DomainError::InvalidTransition { from, event }) => (
                StatusCode::CONFLICT,
                format!("invalid transition: event {event} not valid from status {from}"),
            ),
            Self::Domain(DomainError::NoPendingInteraction { task_id }) => (
                StatusCode::CONFLICT,
                format!("no pending interaction for task {task_id}"),
            ),
            Self::Domain(err @ DomainError::StaleInteraction { .. }) => (StatusCode::CONFLICT, err.to_string()),
            Self::Domain(err @ DomainError::ToolNotFound(_)) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Domain(err @ DomainError::AgentNotFound(_)) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Domain(err @ DomainError::DepthExceeded { .. }) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Domain(err @ DomainError::Auth(_)) => (StatusCode::UNAUTHORIZED, err.to_string()),
            Self::Domain(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
