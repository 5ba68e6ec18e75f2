//! Duplex channel wire format.
//!
//! One JSON object per WebSocket text frame, tagged by `"event"`:
//!
//! ```text
//! client -> server  {"event":"join","token":"123"}
//!                   {"event":"chat","message":"hi"}
//!                   {"event":"service","type":"typing","message":"1"}
//! server -> client  {"event":"joined","room":"lounge"}
//!                   {"event":"left","room":"lounge"}
//!                   {"event":"chat","message":"hi"}
//!                   {"event":"service","type":"typing","message":"1"}
//!                   {"event":"error","message":"Room is full"}
//! ```

use crate::errors::RelayError;
use crate::token::Token;
use serde::{Deserialize, Serialize};

/// Token as sent in a `join` event: clients send the string form, but a bare
/// JSON number is accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenField {
    Number(u64),
    Text(String),
}

impl TokenField {
    /// Parse into a token.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::InvalidToken` if the text form is not an integer.
    pub fn parse(&self) -> Result<Token, RelayError> {
        match self {
            TokenField::Number(value) => Ok(Token::from(*value)),
            TokenField::Text(text) => Token::parse(text),
        }
    }
}

impl From<Token> for TokenField {
    fn from(token: Token) -> Self {
        TokenField::Text(token.to_string())
    }
}

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        token: TokenField,
    },
    Chat {
        message: String,
    },
    Service {
        #[serde(rename = "type")]
        kind: String,
        message: String,
    },
}

/// Events sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The other occupant joined `room`.
    Joined { room: String },
    /// The other occupant left `room`.
    Left { room: String },
    Chat {
        message: String,
    },
    Service {
        #[serde(rename = "type")]
        kind: String,
        message: String,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Error event carrying the client-safe message for `err`.
    #[must_use]
    pub fn error(err: &RelayError) -> Self {
        ServerEvent::Error {
            message: err.client_message(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_join_with_string_token() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "join", "token": "1234"})).unwrap();
        let ClientEvent::Join { token } = event else {
            panic!("expected join");
        };
        assert_eq!(token.parse().unwrap(), Token::from(1234));
    }

    #[test]
    fn test_decode_join_with_numeric_token() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "join", "token": 99})).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                token: TokenField::Number(99)
            }
        );
    }

    #[test]
    fn test_decode_service_uses_type_field() {
        let event: ClientEvent = serde_json::from_value(
            json!({"event": "service", "type": "typing", "message": "1"}),
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Service {
                kind: "typing".to_string(),
                message: "1".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        let result: Result<ClientEvent, _> =
            serde_json::from_value(json!({"event": "shout", "message": "hi"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_server_events() {
        assert_eq!(
            serde_json::to_value(ServerEvent::Joined {
                room: "lounge".to_string()
            })
            .unwrap(),
            json!({"event": "joined", "room": "lounge"})
        );
        assert_eq!(
            serde_json::to_value(ServerEvent::Service {
                kind: "typing".to_string(),
                message: "1".to_string()
            })
            .unwrap(),
            json!({"event": "service", "type": "typing", "message": "1"})
        );
        assert_eq!(
            serde_json::to_value(ServerEvent::error(&RelayError::RoomFull)).unwrap(),
            json!({"event": "error", "message": "Room is full"})
        );
    }

    #[test]
    fn test_bad_text_token_fails_on_parse_not_decode() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "join", "token": "not-a-number"})).unwrap();
        let ClientEvent::Join { token } = event else {
            panic!("expected join");
        };
        assert_eq!(token.parse(), Err(RelayError::InvalidToken));
    }
}
