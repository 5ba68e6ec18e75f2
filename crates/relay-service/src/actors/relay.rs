//! `RelayActor` - single owner of rooms, tokens and sessions.
//!
//! Every mutation of shared relay state goes through this actor's mailbox,
//! so "check constraints, mutate, notify" runs as one unit per message and
//! nothing needs a lock. Notifications produced by a mutation are handed to
//! connection outboxes only after the mutation has been applied.
//!
//! Cancelling the root `CancellationToken` stops the actor and, through
//! child tokens, every connection writer.

use super::connection::ConnectionHandle;
use super::messages::{RelayMessage, RelayStatus};
use crate::errors::RelayError;
use crate::observability::metrics;
use crate::relay::{MessageRelay, RelayPayload};
use crate::sessions::{Delivery, SessionManager};
use crate::token::Token;

use common::secret::{ExposeSecret, SecretString};
use common::types::ConnectionId;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the relay mailbox.
const RELAY_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `RelayActor`.
///
/// Cheap to clone; every clone talks to the same actor.
#[derive(Clone, Debug)]
pub struct RelayActorHandle {
    sender: mpsc::Sender<RelayMessage>,
    cancel_token: CancellationToken,
}

impl RelayActorHandle {
    /// Spawn a `RelayActor` and return a handle to it.
    #[must_use]
    pub fn new(relay: MessageRelay, cancel_token: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(RELAY_CHANNEL_BUFFER);

        let actor = RelayActor {
            receiver,
            cancel_token: cancel_token.clone(),
            sessions: SessionManager::new(),
            relay,
            connections: HashMap::new(),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RelayMessage,
    ) -> Result<T, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Create a room and return its token.
    pub async fn create_room(
        &self,
        name: String,
        password: SecretString,
    ) -> Result<Token, RelayError> {
        self.request(|respond_to| RelayMessage::CreateRoom {
            name,
            password,
            respond_to,
        })
        .await?
    }

    /// Check room credentials and return the room's token.
    pub async fn lookup_room(
        &self,
        name: String,
        password: SecretString,
    ) -> Result<Token, RelayError> {
        self.request(|respond_to| RelayMessage::LookupRoom {
            name,
            password,
            respond_to,
        })
        .await?
    }

    /// Register an accepted duplex channel.
    pub async fn connect(&self, handle: ConnectionHandle) -> Result<(), RelayError> {
        self.sender
            .send(RelayMessage::Connect { handle })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Join the room `token` resolves to; returns the room name.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        token: Token,
    ) -> Result<String, RelayError> {
        self.request(|respond_to| RelayMessage::Join {
            connection_id,
            token,
            respond_to,
        })
        .await?
    }

    /// Forward a payload to the sender's room peers.
    pub async fn relay(
        &self,
        connection_id: ConnectionId,
        payload: RelayPayload,
    ) -> Result<(), RelayError> {
        self.request(|respond_to| RelayMessage::Relay {
            connection_id,
            payload,
            respond_to,
        })
        .await?
    }

    /// Report a closed duplex channel.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        self.sender
            .send(RelayMessage::Disconnect { connection_id })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Get current relay counts.
    pub async fn get_status(&self) -> Result<RelayStatus, RelayError> {
        self.request(|respond_to| RelayMessage::GetStatus { respond_to })
            .await
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Child token for connection writers.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `RelayActor` implementation.
struct RelayActor {
    receiver: mpsc::Receiver<RelayMessage>,
    cancel_token: CancellationToken,
    sessions: SessionManager,
    relay: MessageRelay,
    /// Outboxes of open connections.
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl RelayActor {
    #[instrument(skip_all, name = "relay.actor")]
    async fn run(mut self) {
        info!(target: "relay.actor", "RelayActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "relay.actor",
                        "RelayActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(
                                target: "relay.actor",
                                "RelayActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        for handle in self.connections.values() {
            handle.cancel();
        }

        info!(
            target: "relay.actor",
            rooms_remaining = self.sessions.registry().room_count(),
            connections_remaining = self.connections.len(),
            "RelayActor stopped"
        );
    }

    fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::CreateRoom {
                name,
                password,
                respond_to,
            } => {
                let result = self.create_room(&name, &password);
                let _ = respond_to.send(result);
            }

            RelayMessage::LookupRoom {
                name,
                password,
                respond_to,
            } => {
                let result = self
                    .sessions
                    .registry()
                    .lookup_for_join(&name, password.expose_secret());
                let _ = respond_to.send(result);
            }

            RelayMessage::Connect { handle } => self.connect(handle),

            RelayMessage::Join {
                connection_id,
                token,
                respond_to,
            } => {
                let result = self.join(connection_id, token);
                let _ = respond_to.send(result);
            }

            RelayMessage::Relay {
                connection_id,
                payload,
                respond_to,
            } => {
                let result = self.relay_payload(connection_id, payload);
                let _ = respond_to.send(result);
            }

            RelayMessage::Disconnect { connection_id } => self.disconnect(connection_id),

            RelayMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
            }
        }
    }

    fn create_room(&mut self, name: &str, password: &SecretString) -> Result<Token, RelayError> {
        let token = self
            .sessions
            .registry_mut()
            .create(name, password.expose_secret())?;

        metrics::record_room_created();
        metrics::set_rooms_active(self.sessions.registry().room_count());
        info!(
            target: "relay.actor",
            total_rooms = self.sessions.registry().room_count(),
            "Room created"
        );

        Ok(token)
    }

    fn connect(&mut self, handle: ConnectionHandle) {
        let connection_id = handle.connection_id();
        self.sessions.connect(connection_id);
        self.connections.insert(connection_id, handle);

        metrics::set_connections_active(self.connections.len());
        debug!(
            target: "relay.actor",
            connection_id = %connection_id,
            total_connections = self.connections.len(),
            "Connection registered"
        );
    }

    fn join(&mut self, connection_id: ConnectionId, token: Token) -> Result<String, RelayError> {
        match self.sessions.join(connection_id, token) {
            Ok((room, deliveries)) => {
                debug!(
                    target: "relay.actor",
                    connection_id = %connection_id,
                    "Connection joined room"
                );
                self.dispatch(deliveries);
                Ok(room)
            }
            Err(e) => {
                metrics::record_join_failure(e.reason());
                debug!(
                    target: "relay.actor",
                    connection_id = %connection_id,
                    reason = e.reason(),
                    "Join rejected"
                );
                Err(e)
            }
        }
    }

    fn relay_payload(
        &self,
        connection_id: ConnectionId,
        payload: RelayPayload,
    ) -> Result<(), RelayError> {
        let kind = payload.kind_label();
        let deliveries = self.relay.route(&self.sessions, connection_id, payload)?;

        for delivered in self.dispatch(deliveries) {
            if delivered {
                metrics::record_message_relayed(kind);
            }
        }
        Ok(())
    }

    fn disconnect(&mut self, connection_id: ConnectionId) {
        let deliveries = self.sessions.leave(connection_id);
        if let Some(handle) = self.connections.remove(&connection_id) {
            handle.cancel();
        }

        self.dispatch(deliveries);

        metrics::set_connections_active(self.connections.len());
        metrics::set_rooms_active(self.sessions.registry().room_count());
        debug!(
            target: "relay.actor",
            connection_id = %connection_id,
            total_connections = self.connections.len(),
            total_rooms = self.sessions.registry().room_count(),
            "Connection closed"
        );
    }

    /// Hand deliveries to connection outboxes; returns per-delivery success.
    fn dispatch(&self, deliveries: Vec<Delivery>) -> Vec<bool> {
        deliveries
            .into_iter()
            .map(|Delivery { recipient, event }| match self.connections.get(&recipient) {
                Some(handle) => handle.try_deliver(event),
                None => {
                    warn!(
                        target: "relay.actor",
                        connection_id = %recipient,
                        "No outbox for recipient"
                    );
                    false
                }
            })
            .collect()
    }

    fn status(&self) -> RelayStatus {
        RelayStatus {
            rooms: self.sessions.registry().room_count(),
            tokens: self.sessions.registry().token_count(),
            connections: self.connections.len(),
            joined: self.sessions.joined_count(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::connection::ConnectionActor;
    use crate::protocol::ServerEvent;
    use axum::extract::ws::Message;
    use futures::channel::mpsc as fmpsc;
    use futures::StreamExt;

    struct TestConnection {
        id: ConnectionId,
        frames: fmpsc::UnboundedReceiver<Message>,
    }

    impl TestConnection {
        async fn open(relay: &RelayActorHandle) -> Self {
            let (sink, frames) = fmpsc::unbounded::<Message>();
            let id = ConnectionId::new();
            let (handle, _task) = ConnectionActor::spawn(id, sink, 16, relay.child_token());
            relay.connect(handle).await.unwrap();
            Self { id, frames }
        }

        async fn next_event(&mut self) -> ServerEvent {
            let frame = tokio::time::timeout(std::time::Duration::from_secs(2), self.frames.next())
                .await
                .expect("timed out waiting for frame")
                .expect("socket closed");
            match frame {
                Message::Text(text) => serde_json::from_str(&text).unwrap(),
                other => ServerEvent::Error {
                    message: format!("unexpected frame {other:?}"),
                },
            }
        }

        fn assert_no_event(&mut self) {
            assert!(self.frames.try_next().is_err(), "unexpected frame queued");
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn spawn() -> RelayActorHandle {
        RelayActorHandle::new(MessageRelay::default(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_create_and_lookup_return_same_token() {
        let relay = spawn();

        let created = relay
            .create_room("roomA1".to_string(), secret("secret1"))
            .await
            .unwrap();
        let looked_up = relay
            .lookup_room("roomA1".to_string(), secret("secret1"))
            .await
            .unwrap();
        assert_eq!(created, looked_up);

        let duplicate = relay
            .create_room("roomA1".to_string(), secret("other-password"))
            .await;
        assert_eq!(duplicate, Err(RelayError::DuplicateRoom));

        relay.cancel();
    }

    #[tokio::test]
    async fn test_end_to_end_session_flow() {
        let relay = spawn();
        let token = relay
            .create_room("roomA1".to_string(), secret("secret1"))
            .await
            .unwrap();

        let mut a = TestConnection::open(&relay).await;
        let mut b = TestConnection::open(&relay).await;

        assert_eq!(relay.join(a.id, token).await.unwrap(), "roomA1");
        assert_eq!(relay.join(b.id, token).await.unwrap(), "roomA1");
        assert_eq!(
            a.next_event().await,
            ServerEvent::Joined {
                room: "roomA1".to_string()
            }
        );

        relay
            .relay(
                a.id,
                RelayPayload::Chat {
                    message: "hello".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            b.next_event().await,
            ServerEvent::Chat {
                message: "hello".to_string()
            }
        );

        relay.disconnect(b.id).await.unwrap();
        assert_eq!(
            a.next_event().await,
            ServerEvent::Left {
                room: "roomA1".to_string()
            }
        );
        let status = relay.get_status().await.unwrap();
        assert_eq!(status.rooms, 1);
        assert_eq!(status.connections, 1);
        assert_eq!(status.joined, 1);

        relay.disconnect(a.id).await.unwrap();
        let status = relay.get_status().await.unwrap();
        assert_eq!(status.rooms, 0);
        assert_eq!(status.connections, 0);
        assert_eq!(status.tokens, 1);

        // Room name is free again.
        assert!(relay
            .create_room("roomA1".to_string(), secret("secret1"))
            .await
            .is_ok());

        relay.cancel();
    }

    #[tokio::test]
    async fn test_third_join_is_rejected() {
        let relay = spawn();
        let token = relay
            .create_room("roomA1".to_string(), secret("secret1"))
            .await
            .unwrap();

        let mut a = TestConnection::open(&relay).await;
        let b = TestConnection::open(&relay).await;
        let c = TestConnection::open(&relay).await;

        relay.join(a.id, token).await.unwrap();
        relay.join(b.id, token).await.unwrap();
        assert_eq!(relay.join(c.id, token).await, Err(RelayError::RoomFull));

        a.next_event().await;
        let status = relay.get_status().await.unwrap();
        assert_eq!(status.joined, 2);
        a.assert_no_event();

        relay.cancel();
    }

    #[tokio::test]
    async fn test_relay_before_join_fails() {
        let relay = spawn();
        let a = TestConnection::open(&relay).await;

        let result = relay
            .relay(
                a.id,
                RelayPayload::Chat {
                    message: "hi".to_string(),
                },
            )
            .await;
        assert_eq!(result, Err(RelayError::NotJoined));

        relay.cancel();
    }

    #[tokio::test]
    async fn test_join_with_orphaned_token() {
        let relay = spawn();
        let token = relay
            .create_room("roomA1".to_string(), secret("secret1"))
            .await
            .unwrap();

        let a = TestConnection::open(&relay).await;
        relay.join(a.id, token).await.unwrap();
        relay.disconnect(a.id).await.unwrap();

        let b = TestConnection::open(&relay).await;
        assert_eq!(relay.join(b.id, token).await, Err(RelayError::RoomGone));
        assert_eq!(
            relay.join(b.id, Token::from(42)).await,
            Err(RelayError::InvalidToken)
        );

        relay.cancel();
    }

    #[tokio::test]
    async fn test_cancellation_stops_actor() {
        let relay = spawn();
        assert!(!relay.is_cancelled());

        relay.cancel();
        assert!(relay.is_cancelled());

        // Give the actor a chance to observe cancellation and drop its mailbox.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let result = relay.get_status().await;
        assert!(matches!(result, Err(RelayError::Internal(_))));
    }
}
