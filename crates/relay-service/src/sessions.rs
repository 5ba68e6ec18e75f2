//! Per-connection session state machine.
//!
//! ```text
//! connect ──► Unauthenticated ──join──► Joined ──leave──► Disconnected
//!                    │                                        ▲
//!                    └──────────────────leave─────────────────┘
//! ```
//!
//! The session map doubles as the session index (connection id to room
//! name): a `Joined` entry exists exactly when the connection is in that
//! room's member set. Every operation checks all constraints before it
//! mutates anything, and returns the notifications it produced as
//! [`Delivery`] values. The caller sends them after the call returns, so a
//! `joined` or `left` event is never observable before the change it reports.

use crate::errors::RelayError;
use crate::protocol::ServerEvent;
use crate::registry::RoomRegistry;
use crate::token::Token;
use common::types::ConnectionId;
use std::collections::HashMap;
use tracing::{debug, warn};

/// State of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no room yet.
    Unauthenticated,
    /// Member of `room`.
    Joined { room: String },
    /// Terminal. The connection is gone.
    Disconnected,
}

/// An event addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: ConnectionId,
    pub event: ServerEvent,
}

impl Delivery {
    #[must_use]
    pub fn new(recipient: ConnectionId, event: ServerEvent) -> Self {
        Self { recipient, event }
    }
}

/// Owns the room registry and every connection's session state.
#[derive(Debug, Default)]
pub struct SessionManager {
    registry: RoomRegistry,
    sessions: HashMap<ConnectionId, SessionState>,
}

impl SessionManager {
    /// Create a manager with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Room registry (read-only).
    #[must_use]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Room registry, for room creation.
    pub fn registry_mut(&mut self) -> &mut RoomRegistry {
        &mut self.registry
    }

    /// Register a newly opened connection as `Unauthenticated`.
    pub fn connect(&mut self, connection_id: ConnectionId) {
        self.sessions
            .entry(connection_id)
            .or_insert(SessionState::Unauthenticated);
    }

    /// Current state. Unknown connections report `Disconnected`.
    #[must_use]
    pub fn state(&self, connection_id: ConnectionId) -> SessionState {
        self.sessions
            .get(&connection_id)
            .cloned()
            .unwrap_or(SessionState::Disconnected)
    }

    /// Room the connection has joined, if any.
    #[must_use]
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&str> {
        match self.sessions.get(&connection_id) {
            Some(SessionState::Joined { room }) => Some(room.as_str()),
            _ => None,
        }
    }

    /// Number of open connections, joined or not.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of connections currently in a room.
    #[must_use]
    pub fn joined_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|state| matches!(state, SessionState::Joined { .. }))
            .count()
    }

    /// Join the room `token` resolves to.
    ///
    /// On success returns the room name and a `joined` notification for the
    /// other occupant, if there is one. The joining connection is never
    /// notified about itself.
    ///
    /// # Errors
    ///
    /// - `AlreadyJoined` if the connection is already in a room
    /// - `NotJoined` if the connection is unknown or disconnected
    /// - `InvalidToken` if the token was never issued
    /// - `RoomGone` if the token's room has been deleted, even when a new room
    ///   now holds the same name
    /// - `RoomFull` if the room already has two members
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        token: Token,
    ) -> Result<(String, Vec<Delivery>), RelayError> {
        match self.sessions.get(&connection_id) {
            Some(SessionState::Unauthenticated) => {}
            Some(SessionState::Joined { .. }) => return Err(RelayError::AlreadyJoined),
            Some(SessionState::Disconnected) | None => return Err(RelayError::NotJoined),
        }

        let room_name = self
            .registry
            .resolve(token)
            .ok_or(RelayError::InvalidToken)?
            .to_string();

        let room = self
            .registry
            .get_mut(&room_name)
            .ok_or(RelayError::RoomGone)?;

        // A re-created room under the same name has a new digest
        if room.token() != token {
            return Err(RelayError::RoomGone);
        }

        if room.is_full() {
            return Err(RelayError::RoomFull);
        }

        room.add_member(connection_id);
        let deliveries = room
            .others(connection_id)
            .map(|peer| {
                Delivery::new(
                    peer,
                    ServerEvent::Joined {
                        room: room_name.clone(),
                    },
                )
            })
            .collect();

        self.sessions.insert(
            connection_id,
            SessionState::Joined {
                room: room_name.clone(),
            },
        );

        debug!(
            target: "relay.sessions",
            connection_id = %connection_id,
            room = %room_name,
            "Connection joined room"
        );

        Ok((room_name, deliveries))
    }

    /// Tear down a connection's session.
    ///
    /// A joined connection is removed from its room and the remaining
    /// occupant is sent `left`; a room left empty is deleted from the
    /// registry. Unauthenticated or unknown connections just go away.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Vec<Delivery> {
        let Some(state) = self.sessions.remove(&connection_id) else {
            return Vec::new();
        };

        let SessionState::Joined { room: room_name } = state else {
            return Vec::new();
        };

        let Some(room) = self.registry.get_mut(&room_name) else {
            warn!(
                target: "relay.sessions",
                connection_id = %connection_id,
                room = %room_name,
                "Joined connection's room missing from registry"
            );
            return Vec::new();
        };

        room.remove_member(connection_id);
        let deliveries: Vec<Delivery> = room
            .others(connection_id)
            .map(|peer| {
                Delivery::new(
                    peer,
                    ServerEvent::Left {
                        room: room_name.clone(),
                    },
                )
            })
            .collect();

        if room.members().is_empty() {
            self.registry.remove(&room_name);
            debug!(
                target: "relay.sessions",
                room = %room_name,
                "Last member left, room deleted"
            );
        }

        debug!(
            target: "relay.sessions",
            connection_id = %connection_id,
            room = %room_name,
            "Connection left room"
        );

        deliveries
    }

    /// Members of `connection_id`'s room other than itself.
    ///
    /// # Errors
    ///
    /// Returns `NotJoined` unless the connection is `Joined`.
    pub fn peers(&self, connection_id: ConnectionId) -> Result<Vec<ConnectionId>, RelayError> {
        let room_name = self.room_of(connection_id).ok_or(RelayError::NotJoined)?;
        let room = self.registry.get(room_name).ok_or(RelayError::NotJoined)?;
        Ok(room.others(connection_id).collect())
    }
}
