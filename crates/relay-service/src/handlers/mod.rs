//! HTTP and WebSocket handlers.

pub mod api;
pub mod health;
pub mod ws;

pub use api::{can_access, create_room, join_room, not_found};
pub use health::{health_check, metrics_handler};
pub use ws::ws_upgrade;
