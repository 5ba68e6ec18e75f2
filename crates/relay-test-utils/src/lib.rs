//! # Relay Test Utilities
//!
//! Shared test utilities for the chat relay service.
//!
//! This crate provides:
//! - Server test harness (`TestRelayServer` for E2E tests)
//! - Typed WebSocket client (`WsClient`) speaking the duplex protocol
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestRelayServer::spawn().await?;
//!     let token = server.create_room("roomA1", "secret1").await?;
//!
//!     let mut client = WsClient::connect(&server.ws_url()).await?;
//!     client.join(token).await?;
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod ws_client;

// Re-export commonly used items
pub use server_harness::TestRelayServer;
pub use ws_client::WsClient;
