//! Actor model for the relay.
//!
//! ```text
//! RelayActor (singleton)
//! ├── owns SessionManager (room registry, token map, session index)
//! ├── owns MessageRelay
//! └── holds one ConnectionHandle per open duplex channel
//!     └── ConnectionActor (one per WebSocket, drains its outbox)
//! ```
//!
//! WebSocket reader tasks forward inbound events into the single relay
//! mailbox; per-connection order is arrival order. All inter-actor
//! communication goes over `tokio::sync::mpsc` with `oneshot` replies.

pub mod connection;
pub mod messages;
pub mod relay;

pub use connection::{ConnectionActor, ConnectionHandle};
pub use messages::{RelayMessage, RelayStatus};
pub use relay::RelayActorHandle;
