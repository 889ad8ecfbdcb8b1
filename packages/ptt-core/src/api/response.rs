//! Small helpers for the HTTP success/error envelope shared by route handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Wraps `data` in the standard success envelope.
pub fn api_success(data: Value) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

/// A bare success acknowledgement with no payload.
pub fn api_ok() -> Response {
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

/// Wraps a machine-readable code and human message in the standard error envelope.
pub fn api_error(status: StatusCode, code: &str, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "success": false, "code": code, "message": message.to_string() }))).into_response()
}
