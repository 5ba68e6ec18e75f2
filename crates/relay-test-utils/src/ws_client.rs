//! Typed WebSocket client for the duplex channel.

use futures::{SinkExt, StreamExt};
use relay_service::protocol::{ClientEvent, ServerEvent, TokenField};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long `recv` waits for the next event.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Window used by `expect_silence`.
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// One client connection to `/ws`.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Open a connection.
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;
        Ok(Self { stream })
    }

    /// Send a typed event.
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), anyhow::Error> {
        self.send_text(&serde_json::to_string(event)?).await
    }

    /// Send a raw text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a raw binary frame.
    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<(), anyhow::Error> {
        self.stream.send(Message::Binary(bytes)).await?;
        Ok(())
    }

    /// Send `join` with the token in its string form.
    pub async fn join(&mut self, token: u64) -> Result<(), anyhow::Error> {
        self.send(&ClientEvent::Join {
            token: TokenField::Text(token.to_string()),
        })
        .await
    }

    /// Send `chat`.
    pub async fn chat(&mut self, message: &str) -> Result<(), anyhow::Error> {
        self.send(&ClientEvent::Chat {
            message: message.to_string(),
        })
        .await
    }

    /// Send `service`.
    pub async fn service(&mut self, kind: &str, message: &str) -> Result<(), anyhow::Error> {
        self.send(&ClientEvent::Service {
            kind: kind.to_string(),
            message: message.to_string(),
        })
        .await
    }

    /// Wait for the next server event, skipping control frames.
    pub async fn recv(&mut self) -> Result<ServerEvent, anyhow::Error> {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow::anyhow!("Timed out waiting for server event"))?
                .ok_or_else(|| anyhow::anyhow!("Connection closed"))??;

            match frame {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(_) => anyhow::bail!("Connection closed by server"),
                _ => {}
            }
        }
    }

    /// Fail if any event arrives within a short window.
    pub async fn expect_silence(&mut self) -> Result<(), anyhow::Error> {
        match tokio::time::timeout(SILENCE_WINDOW, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Text(text)))) => anyhow::bail!("Unexpected event: {}", text),
            Ok(other) => anyhow::bail!("Unexpected frame: {:?}", other),
        }
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.stream.close(None).await?;
        Ok(())
    }
}
