//! Duplex channel over WebSocket (`GET /ws`).
//!
//! Each accepted socket is split: the sending half goes to a
//! `ConnectionActor`, the receiving half is read here and every decoded
//! event is forwarded to the relay actor in arrival order. Failures are
//! answered with an `error` event on the same socket only.

use crate::actors::{ConnectionActor, ConnectionHandle};
use crate::errors::RelayError;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::relay::RelayPayload;
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use common::types::ConnectionId;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Handler for GET /ws
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| serve_connection(socket, state))
}

#[instrument(skip_all, name = "relay.ws", fields(connection_id = tracing::field::Empty))]
async fn serve_connection(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::new();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));

    let (sink, mut stream) = socket.split();
    let (handle, _writer) = ConnectionActor::spawn(
        connection_id,
        sink,
        state.config.outbox_capacity,
        state.relay.child_token(),
    );

    if let Err(e) = state.relay.connect(handle.clone()).await {
        warn!(target: "relay.ws", error = %e, "Failed to register connection");
        handle.cancel();
        return;
    }

    info!(target: "relay.ws", connection_id = %connection_id, "Connection opened");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_text(&state, &handle, &text).await {
                    report(&handle, &e).await;
                }
            }
            Ok(Message::Close(_)) => break,
            // Binary frames are ignored; pings are answered by the transport.
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(target: "relay.ws", error = %e, "Socket read failed");
                break;
            }
        }
    }

    if let Err(e) = state.relay.disconnect(connection_id).await {
        warn!(target: "relay.ws", error = %e, "Failed to report disconnect");
        handle.cancel();
    }

    info!(target: "relay.ws", connection_id = %connection_id, "Connection closed");
}

async fn handle_text(
    state: &AppState,
    handle: &ConnectionHandle,
    text: &str,
) -> Result<(), RelayError> {
    let event: ClientEvent =
        serde_json::from_str(text).map_err(|_| RelayError::InvalidMessage)?;
    let connection_id = handle.connection_id();

    match event {
        ClientEvent::Join { token } => {
            let token = token.parse()?;
            state.relay.join(connection_id, token).await?;
        }
        ClientEvent::Chat { message } => {
            debug!(target: "relay.ws", message = %message, "Chat received");
            state
                .relay
                .relay(connection_id, RelayPayload::Chat { message })
                .await?;
        }
        ClientEvent::Service { kind, message } => {
            state
                .relay
                .relay(connection_id, RelayPayload::Service { kind, message })
                .await?;
        }
    }
    Ok(())
}

async fn report(handle: &ConnectionHandle, err: &RelayError) {
    if let RelayError::Internal(detail) = err {
        warn!(target: "relay.ws", error = %detail, "Internal error handling event");
    } else {
        debug!(target: "relay.ws", reason = err.reason(), "Event rejected");
    }

    if handle.send(ServerEvent::error(err)).await.is_err() {
        debug!(target: "relay.ws", "Could not deliver error event");
    }
}
