//! Relay error types.
//!
//! Every error is surfaced to the originating client only: as HTTP 400 with a
//! `{"error": ...}` body on the request/response API, or as an `error` event on
//! the duplex channel. Internal details are logged server-side and never sent.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Client-facing text for room creation length violations.
pub const INVALID_INPUT_MESSAGE: &str = "Room name must be between 6 and 32 characters and password must be between 6 and 128 characters";

/// Relay error type.
///
/// Maps to HTTP status codes:
/// - `NotFound`: 404
/// - `Internal`: 500
/// - everything else: 400
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Request body was not JSON, or required fields were missing.
    #[error("Invalid JSON")]
    InvalidJson,

    /// Room name or password length out of bounds.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A room with this name already exists.
    #[error("Room already exists")]
    DuplicateRoom,

    /// No room with this name.
    #[error("Room not found")]
    RoomNotFound,

    /// Password does not match the room's stored hash.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token does not resolve to any room.
    #[error("Invalid token")]
    InvalidToken,

    /// Token resolves to a room that has since been deleted.
    #[error("Room no longer exists")]
    RoomGone,

    /// Room already has two members.
    #[error("Room is full")]
    RoomFull,

    /// Connection has not joined a room.
    #[error("Not joined")]
    NotJoined,

    /// Connection already joined a room.
    #[error("Already joined")]
    AlreadyJoined,

    /// Duplex frame could not be decoded, or a chat message was rejected.
    #[error("Invalid message")]
    InvalidMessage,

    /// Unknown path or method.
    #[error("Not found")]
    NotFound,

    /// Internal error (actor channel failure and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RelayError::InvalidJson => "Invalid JSON",
            RelayError::InvalidInput(_) => INVALID_INPUT_MESSAGE,
            RelayError::DuplicateRoom => "Room already exists",
            RelayError::RoomNotFound | RelayError::RoomGone => "Room does not exist",
            RelayError::InvalidCredentials => "Invalid password",
            RelayError::InvalidToken => "Invalid token",
            RelayError::RoomFull => "Room is full",
            RelayError::NotJoined => "Not logged in",
            RelayError::AlreadyJoined => "Already joined",
            RelayError::InvalidMessage => "Invalid message",
            RelayError::NotFound => "Not found",
            RelayError::Internal(_) => "An internal error occurred",
        }
        .to_string()
    }

    /// Bounded label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            RelayError::InvalidJson => "invalid_json",
            RelayError::InvalidInput(_) => "invalid_input",
            RelayError::DuplicateRoom => "duplicate_room",
            RelayError::RoomNotFound => "room_not_found",
            RelayError::InvalidCredentials => "invalid_credentials",
            RelayError::InvalidToken => "invalid_token",
            RelayError::RoomGone => "room_gone",
            RelayError::RoomFull => "room_full",
            RelayError::NotJoined => "not_joined",
            RelayError::AlreadyJoined => "already_joined",
            RelayError::InvalidMessage => "invalid_message",
            RelayError::NotFound => "not_found",
            RelayError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if let RelayError::Internal(detail) = &self {
            tracing::error!(target: "relay.errors", error = %detail, "Internal error");
        }

        let body = ErrorResponse {
            error: self.client_message(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}
