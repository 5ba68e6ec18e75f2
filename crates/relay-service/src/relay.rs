//! Message relay and chat normalization.
//!
//! Chat and service payloads from a joined connection are forwarded to every
//! other member of its room, never echoed back. Chat text is normalized
//! first; service payloads are forwarded untouched.

use crate::errors::RelayError;
use crate::protocol::ServerEvent;
use crate::sessions::{Delivery, SessionManager};
use common::types::ConnectionId;
use regex::Regex;
use std::sync::LazyLock;

#[expect(
    clippy::expect_used,
    reason = "Static patterns; a bad pattern fails every normalization test"
)]
static BRAILLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{2800}-\x{28FF}]").expect("valid pattern"));

#[expect(
    clippy::expect_used,
    reason = "Static patterns; a bad pattern fails every normalization test"
)]
static NEWLINE_THEN_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[\s\x{FEFF}]+").expect("valid pattern"));

#[expect(
    clippy::expect_used,
    reason = "Static patterns; a bad pattern fails every normalization test"
)]
static SPACE_THEN_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\x{FEFF}]+\n").expect("valid pattern"));

#[expect(
    clippy::expect_used,
    reason = "Static patterns; a bad pattern fails every normalization test"
)]
static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").expect("valid pattern"));

/// Normalize chat text.
///
/// Strips the Braille Patterns block (U+2800-U+28FF, usable as an invisible
/// side channel), removes whitespace on either side of newlines, collapses
/// newline runs, then trims. U+FEFF counts as whitespace. Idempotent.
#[must_use]
pub fn normalize(message: &str) -> String {
    let message = BRAILLE_BLOCK.replace_all(message, "");
    let message = NEWLINE_THEN_SPACE.replace_all(&message, "\n");
    let message = SPACE_THEN_NEWLINE.replace_all(&message, "\n");
    let message = NEWLINE_RUN.replace_all(&message, "\n");
    message.trim_matches(is_blank).to_string()
}

/// Whitespace as chat clients see it, which includes the byte-order mark.
fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Payload a joined connection asks to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPayload {
    Chat { message: String },
    Service { kind: String, message: String },
}

impl RelayPayload {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            RelayPayload::Chat { .. } => "chat",
            RelayPayload::Service { .. } => "service",
        }
    }
}

/// Routes payloads to room peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRelay {
    /// Optional cap on raw chat length, in characters. `None` disables the
    /// check entirely, so empty chats are relayed too.
    max_message_length: Option<usize>,
}

impl MessageRelay {
    #[must_use]
    pub fn new(max_message_length: Option<usize>) -> Self {
        Self { max_message_length }
    }

    /// Build deliveries for `payload` sent by `from`.
    ///
    /// # Errors
    ///
    /// - `NotJoined` if `from` has not joined a room
    /// - `InvalidMessage` if a length cap is configured and the chat is empty or too long
    pub fn route(
        &self,
        sessions: &SessionManager,
        from: ConnectionId,
        payload: RelayPayload,
    ) -> Result<Vec<Delivery>, RelayError> {
        let peers = sessions.peers(from)?;

        let event = match payload {
            RelayPayload::Chat { message } => {
                self.check_length(&message)?;
                ServerEvent::Chat {
                    message: normalize(&message),
                }
            }
            RelayPayload::Service { kind, message } => ServerEvent::Service { kind, message },
        };

        Ok(peers
            .into_iter()
            .map(|peer| Delivery::new(peer, event.clone()))
            .collect())
    }

    fn check_length(&self, message: &str) -> Result<(), RelayError> {
        let Some(max) = self.max_message_length else {
            return Ok(());
        };

        let len = message.chars().count();
        if len == 0 || len > max {
            return Err(RelayError::InvalidMessage);
        }
        Ok(())
    }
}
