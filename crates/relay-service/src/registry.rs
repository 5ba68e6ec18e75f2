//! Room registry.
//!
//! Owns room existence, the two-member cap and the token to room-name map.
//! The registry is plain data: it is owned by the relay controller actor,
//! which serializes every call, so nothing here locks.
//!
//! Tokens are never removed. When a room is deleted its token keeps resolving
//! to the old name. A join with it fails with `RoomGone`, including after the
//! name is taken by a new room with a different password.

use crate::errors::RelayError;
use crate::token::{CredentialDigest, Token};
use common::types::ConnectionId;
use std::collections::{BTreeSet, HashMap};

/// Minimum room name length, in characters.
pub const MIN_NAME_LEN: usize = 6;

/// Maximum room name length, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Maximum password length, in characters.
pub const MAX_PASSWORD_LEN: usize = 128;

/// Maximum members per room.
pub const ROOM_CAPACITY: usize = 2;

/// A named, password-protected two-occupant room.
#[derive(Debug)]
pub struct Room {
    name: String,
    password_hash: CredentialDigest,
    members: BTreeSet<ConnectionId>,
}

impl Room {
    fn new(name: String, password_hash: CredentialDigest) -> Self {
        Self {
            name,
            password_hash,
            members: BTreeSet::new(),
        }
    }

    /// Room name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current members.
    #[must_use]
    pub fn members(&self) -> &BTreeSet<ConnectionId> {
        &self.members
    }

    /// Whether the connection is a member.
    #[must_use]
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.members.contains(&connection_id)
    }

    /// Whether the room has reached `ROOM_CAPACITY`.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    /// Members other than `connection_id`.
    pub fn others(&self, connection_id: ConnectionId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members
            .iter()
            .copied()
            .filter(move |member| *member != connection_id)
    }

    pub(crate) fn token(&self) -> Token {
        self.password_hash.token()
    }

    pub(crate) fn add_member(&mut self, connection_id: ConnectionId) {
        self.members.insert(connection_id);
    }

    pub(crate) fn remove_member(&mut self, connection_id: ConnectionId) -> bool {
        self.members.remove(&connection_id)
    }
}

/// Room registry: rooms by name plus the token map.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    tokens: HashMap<Token, String>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room and issue its token.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the name is not 6-32 characters or the password not 6-128
    /// - `DuplicateRoom` if the name is taken
    pub fn create(&mut self, name: &str, password: &str) -> Result<Token, RelayError> {
        let name_len = name.chars().count();
        let password_len = password.chars().count();

        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name_len) {
            return Err(RelayError::InvalidInput(format!(
                "room name length {name_len} outside {MIN_NAME_LEN}..={MAX_NAME_LEN}"
            )));
        }
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password_len) {
            return Err(RelayError::InvalidInput(format!(
                "password length {password_len} outside {MIN_PASSWORD_LEN}..={MAX_PASSWORD_LEN}"
            )));
        }
        if self.rooms.contains_key(name) {
            return Err(RelayError::DuplicateRoom);
        }

        let room = Room::new(name.to_string(), CredentialDigest::compute(name, password));
        let token = room.token();

        self.rooms.insert(name.to_string(), room);
        self.tokens.insert(token, name.to_string());

        Ok(token)
    }

    /// Check credentials for an existing room and return its token.
    ///
    /// # Errors
    ///
    /// - `RoomNotFound` if no room has this name
    /// - `InvalidCredentials` if the password does not match
    pub fn lookup_for_join(&self, name: &str, password: &str) -> Result<Token, RelayError> {
        let room = self.rooms.get(name).ok_or(RelayError::RoomNotFound)?;

        if CredentialDigest::compute(name, password) != room.password_hash {
            return Err(RelayError::InvalidCredentials);
        }

        Ok(room.token())
    }

    /// Look up a room by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Room> {
        self.rooms.get_mut(name)
    }

    /// Delete a room. Deleting an absent room is a no-op.
    pub fn remove(&mut self, name: &str) -> Option<Room> {
        self.rooms.remove(name)
    }

    /// Resolve a token to the room name it was issued for.
    ///
    /// The room itself may no longer exist.
    #[must_use]
    pub fn resolve(&self, token: Token) -> Option<&str> {
        self.tokens.get(&token).map(String::as_str)
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of issued tokens, including orphaned ones.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_lookup_yields_same_token() {
        let mut registry = RoomRegistry::new();
        let created = registry.create("roomA1", "secret1").unwrap();
        let looked_up = registry.lookup_for_join("roomA1", "secret1").unwrap();

        assert_eq!(created, looked_up);
        assert_eq!(created, Token::derive("roomA1", "secret1"));
    }

    #[test]
    fn test_create_rejects_duplicate_name_with_any_password() {
        let mut registry = RoomRegistry::new();
        registry.create("roomA1", "secret1").unwrap();

        assert_eq!(
            registry.create("roomA1", "secret1"),
            Err(RelayError::DuplicateRoom)
        );
        assert_eq!(
            registry.create("roomA1", "different-password"),
            Err(RelayError::DuplicateRoom)
        );
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_create_length_bounds() {
        let mut registry = RoomRegistry::new();

        assert!(matches!(
            registry.create("short", "secret1"),
            Err(RelayError::InvalidInput(_))
        ));
        assert!(matches!(
            registry.create(&"n".repeat(33), "secret1"),
            Err(RelayError::InvalidInput(_))
        ));
        assert!(matches!(
            registry.create("roomA1", "12345"),
            Err(RelayError::InvalidInput(_))
        ));
        assert!(matches!(
            registry.create("roomA1", &"p".repeat(129)),
            Err(RelayError::InvalidInput(_))
        ));

        assert!(registry.create("sixchr", "sixchr").is_ok());
        assert!(registry.create(&"n".repeat(32), &"p".repeat(128)).is_ok());
        assert_eq!(registry.room_count(), 2);
    }

    #[test]
    fn test_create_counts_characters_not_bytes() {
        let mut registry = RoomRegistry::new();
        // 6 characters, 12 bytes
        assert!(registry.create("éééééé", "secret1").is_ok());
        // 32 characters, 64 bytes
        assert!(registry.create(&"é".repeat(32), "secret1").is_ok());
    }

    #[test]
    fn test_invalid_input_checked_before_duplicate() {
        let mut registry = RoomRegistry::new();
        registry.create("roomA1", "secret1").unwrap();

        assert!(matches!(
            registry.create("roomA1", "x"),
            Err(RelayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_lookup_missing_room() {
        let registry = RoomRegistry::new();
        assert_eq!(
            registry.lookup_for_join("nobody", "secret1"),
            Err(RelayError::RoomNotFound)
        );
    }

    #[test]
    fn test_lookup_wrong_password() {
        let mut registry = RoomRegistry::new();
        registry.create("roomA1", "secret1").unwrap();

        assert_eq!(
            registry.lookup_for_join("roomA1", "secret2"),
            Err(RelayError::InvalidCredentials)
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = RoomRegistry::new();
        registry.create("roomA1", "secret1").unwrap();

        assert!(registry.remove("roomA1").is_some());
        assert!(registry.remove("roomA1").is_none());
        assert!(registry.get("roomA1").is_none());
    }

    #[test]
    fn test_token_survives_room_removal() {
        let mut registry = RoomRegistry::new();
        let token = registry.create("roomA1", "secret1").unwrap();
        registry.remove("roomA1");

        assert_eq!(registry.resolve(token), Some("roomA1"));
        assert_eq!(registry.token_count(), 1);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_recreate_after_removal_reissues_token() {
        let mut registry = RoomRegistry::new();
        let first = registry.create("roomA1", "secret1").unwrap();
        registry.remove("roomA1");

        let second = registry.create("roomA1", "secret1").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.token_count(), 1);
    }

    #[test]
    fn test_room_membership_helpers() {
        let mut registry = RoomRegistry::new();
        registry.create("roomA1", "secret1").unwrap();

        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let room = registry.get_mut("roomA1").unwrap();
        room.add_member(a);
        assert!(!room.is_full());
        room.add_member(b);
        assert!(room.is_full());

        assert_eq!(room.others(a).collect::<Vec<_>>(), vec![b]);
        assert!(room.remove_member(a));
        assert!(!room.remove_member(a));
        assert!(!room.contains(a));
        assert!(room.contains(b));
    }
}
