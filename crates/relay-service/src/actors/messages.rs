//! Message types for actor communication.
//!
//! Request-reply messages carry a `oneshot` responder; fire-and-forget
//! messages (connect, disconnect) do not.

use super::connection::ConnectionHandle;
use crate::errors::RelayError;
use crate::relay::RelayPayload;
use crate::token::Token;
use common::secret::SecretString;
use common::types::ConnectionId;
use tokio::sync::oneshot;

/// Messages sent to `RelayActor`.
#[derive(Debug)]
pub enum RelayMessage {
    /// Create a room and issue its token.
    CreateRoom {
        name: String,
        password: SecretString,
        respond_to: oneshot::Sender<Result<Token, RelayError>>,
    },

    /// Check credentials for an existing room and return its token.
    LookupRoom {
        name: String,
        password: SecretString,
        respond_to: oneshot::Sender<Result<Token, RelayError>>,
    },

    /// A duplex channel was accepted. The connection starts `Unauthenticated`.
    Connect { handle: ConnectionHandle },

    /// Join the room the token resolves to. Replies with the room name.
    Join {
        connection_id: ConnectionId,
        token: Token,
        respond_to: oneshot::Sender<Result<String, RelayError>>,
    },

    /// Forward a payload to the other members of the sender's room.
    Relay {
        connection_id: ConnectionId,
        payload: RelayPayload,
        respond_to: oneshot::Sender<Result<(), RelayError>>,
    },

    /// The duplex channel closed.
    Disconnect { connection_id: ConnectionId },

    /// Current counts (for health checks and tests).
    GetStatus {
        respond_to: oneshot::Sender<RelayStatus>,
    },
}

/// Snapshot of relay state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatus {
    /// Live rooms.
    pub rooms: usize,
    /// Issued tokens, including ones whose room is gone.
    pub tokens: usize,
    /// Open duplex connections.
    pub connections: usize,
    /// Connections currently joined to a room.
    pub joined: usize,
}
