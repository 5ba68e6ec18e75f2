//! `ConnectionActor` - outbound writer for one duplex channel.
//!
//! Each `ConnectionActor`:
//! - Owns the sending half of exactly one WebSocket
//! - Drains a bounded outbox of `ServerEvent`s, one JSON text frame per event
//! - Exits when the outbox closes, the socket errors, or it is cancelled
//!
//! The relay actor only ever calls [`ConnectionHandle::try_deliver`], so a
//! slow or stalled client can never block it: when the outbox is full the
//! event is dropped.

use crate::errors::RelayError;
use crate::protocol::ServerEvent;

use axum::extract::ws::Message;
use common::types::ConnectionId;
use futures::{Sink, SinkExt};
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Handle to a `ConnectionActor`.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    connection_id: ConnectionId,
    sender: mpsc::Sender<ServerEvent>,
    cancel_token: CancellationToken,
}

impl ConnectionHandle {
    /// Get the connection ID.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queue an event, waiting for outbox space.
    pub async fn send(&self, event: ServerEvent) -> Result<(), RelayError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Queue an event without waiting. Returns `false` if it was dropped.
    pub fn try_deliver(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    target: "relay.actor.connection",
                    connection_id = %self.connection_id,
                    "Outbox full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    target: "relay.actor.connection",
                    connection_id = %self.connection_id,
                    "Outbox closed, dropping event"
                );
                false
            }
        }
    }

    /// Stop the writer and close the socket.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor<S> {
    connection_id: ConnectionId,
    receiver: mpsc::Receiver<ServerEvent>,
    sink: S,
    cancel_token: CancellationToken,
}

impl<S> ConnectionActor<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    /// Spawn a writer over `sink` with an outbox of `capacity` events.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        connection_id: ConnectionId,
        sink: S,
        capacity: usize,
        cancel_token: CancellationToken,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity);

        let actor = Self {
            connection_id,
            receiver,
            sink,
            cancel_token: cancel_token.clone(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConnectionHandle {
            connection_id,
            sender,
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(
        skip_all,
        name = "relay.actor.connection",
        fields(connection_id = %self.connection_id)
    )]
    async fn run(mut self) {
        debug!(
            target: "relay.actor.connection",
            connection_id = %self.connection_id,
            "ConnectionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "relay.actor.connection",
                        connection_id = %self.connection_id,
                        "ConnectionActor received cancellation signal"
                    );
                    break;
                }

                event = self.receiver.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if !self.write(&event).await {
                        break;
                    }
                }
            }
        }

        // Best effort; the peer may already be gone.
        let _ = self.sink.send(Message::Close(None)).await;

        debug!(
            target: "relay.actor.connection",
            connection_id = %self.connection_id,
            "ConnectionActor stopped"
        );
    }

    /// Write one event. Returns `false` if the socket is unusable.
    async fn write(&mut self, event: &ServerEvent) -> bool {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    target: "relay.actor.connection",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Failed to encode event"
                );
                return true;
            }
        };

        if let Err(e) = self.sink.send(Message::Text(text)).await {
            debug!(
                target: "relay.actor.connection",
                connection_id = %self.connection_id,
                error = %e,
                "Socket write failed"
            );
            return false;
        }
        true
    }
}
