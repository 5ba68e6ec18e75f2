//! Request and response models for the HTTP API.

use crate::errors::RelayError;
use crate::token::Token;
use common::secret::SecretString;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/new` and `POST /api/join`.
///
/// Both fields are optional at the decode step so a missing field is
/// reported as `Invalid JSON` rather than a serde error.
#[derive(Debug, Deserialize)]
pub struct RoomRequest {
    pub name: Option<String>,
    pub password: Option<SecretString>,
}

/// Validated room credentials.
#[derive(Debug)]
pub struct RoomCredentials {
    pub name: String,
    pub password: SecretString,
}

impl RoomRequest {
    /// Require both fields.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::InvalidJson` if either field is missing.
    pub fn validate(self) -> Result<RoomCredentials, RelayError> {
        match (self.name, self.password) {
            (Some(name), Some(password)) => Ok(RoomCredentials { name, password }),
            _ => Err(RelayError::InvalidJson),
        }
    }
}

/// Successful response carrying a room token as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: Token,
}
