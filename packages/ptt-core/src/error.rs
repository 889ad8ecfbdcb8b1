//! Centralized error types for the classroom PTT server.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::utils::now_millis;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the PTT server's HTTP surface.
#[derive(Debug, Error)]
pub enum PttError {
    /// No room exists with the given code.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// The room existed but its TTL has elapsed.
    #[error("Room expired: {0}")]
    RoomExpired(String),

    /// A room code did not match `^[A-Z]{{3}}[0-9]{{3}}$`.
    #[error("Invalid room code: {0}")]
    InvalidRoomCode(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorCode for PttError {
    fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "room_not_found",
            Self::RoomExpired(_) => "room_expired",
            Self::InvalidRoomCode(_) => "invalid_room_code",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl PttError {
    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::RoomExpired(_) => StatusCode::GONE,
            Self::InvalidRoomCode(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type PttResult<T> = Result<T, PttError>;

/// JSON response body for error responses, per the external HTTP interface.
#[derive(Serialize)]
struct ErrorResponse {
    timestamp: u64,
    message: String,
    status: u16,
}

impl IntoResponse for PttError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            timestamp: now_millis(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_not_found_returns_correct_code() {
        let err = PttError::RoomNotFound("ABC123".into());
        assert_eq!(err.code(), "room_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_room_code_returns_correct_status() {
        let err = PttError::InvalidRoomCode("abc123".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn room_expired_returns_gone() {
        let err = PttError::RoomExpired("ABC123".into());
        assert_eq!(err.status_code(), StatusCode::GONE);
    }
}
