//! Request/response API.
//!
//! - `POST /api/canaccess` - reachability probe, 200 with empty body
//! - `POST /api/new` - create a room, returns `{"token": <number>}`
//! - `POST /api/join` - check room credentials, returns `{"token": <number>}`
//!
//! Every POST body is parsed as JSON before anything else, so a malformed
//! body yields `400 {"error":"Invalid JSON"}` on any POST path, including
//! unknown ones.

use crate::errors::RelayError;
use crate::models::{RoomRequest, TokenResponse};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    Json,
};
use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use tracing::{debug, instrument};

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, RelayError> {
    serde_json::from_slice(body).map_err(|_| RelayError::InvalidJson)
}

/// Handler for POST /api/canaccess
#[instrument(skip_all, name = "relay.handlers.canaccess")]
pub async fn can_access(body: Bytes) -> Result<StatusCode, RelayError> {
    parse_body::<IgnoredAny>(&body)?;
    Ok(StatusCode::OK)
}

/// Handler for POST /api/new
///
/// # Response
///
/// - 200 OK: `{"token": <number>}`
/// - 400 Bad Request: invalid JSON, missing field, length violation, duplicate name
#[instrument(skip_all, name = "relay.handlers.create_room")]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenResponse>, RelayError> {
    let credentials = parse_body::<RoomRequest>(&body)?.validate()?;

    let token = state
        .relay
        .create_room(credentials.name, credentials.password)
        .await?;

    debug!(target: "relay.handlers", "Room created via API");
    Ok(Json(TokenResponse { token }))
}

/// Handler for POST /api/join
///
/// No length checks here: a name that could never have been created is
/// simply not found.
///
/// # Response
///
/// - 200 OK: `{"token": <number>}`
/// - 400 Bad Request: invalid JSON, missing field, unknown room, wrong password
#[instrument(skip_all, name = "relay.handlers.join_room")]
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenResponse>, RelayError> {
    let credentials = parse_body::<RoomRequest>(&body)?.validate()?;

    let token = state
        .relay
        .lookup_room(credentials.name, credentials.password)
        .await?;

    Ok(Json(TokenResponse { token }))
}

/// Fallback for unknown paths and methods.
///
/// POST bodies are still parsed first, so an unknown POST path with a bad
/// body answers 400 rather than 404.
#[instrument(skip_all, name = "relay.handlers.not_found", fields(method = %method))]
pub async fn not_found(method: Method, body: Bytes) -> RelayError {
    if method == Method::POST {
        if let Err(e) = parse_body::<IgnoredAny>(&body) {
            return e;
        }
    }
    RelayError::NotFound
}
