//! JSON HTTP endpoints.
//!
//! - [`push_tokens`]: register a device token against a principal's account
//! - [`conversations`]: list a principal's conversations, open one with the
//!   repairman greeting
//! - [`messages`]: conversation history and read flags
//! - [`notifications`]: the in-app chat notification feed

pub mod conversations;
pub mod messages;
pub mod notifications;
pub mod push_tokens;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::ApiResponse;
use serde::Serialize;

/// `{retCode, message, data}` response with a matching HTTP status.
pub(crate) fn envelope<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

/// Failure envelope without payload.
pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    envelope(status, ApiResponse::<()>::failure(status.as_u16(), message))
}
