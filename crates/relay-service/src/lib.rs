//! Two-party chat relay service library.
//!
//! Clients create or look up a password-protected room over HTTP and get a
//! numeric token back, then present that token on a WebSocket to join the
//! room. Each room holds at most two connections; chat and service payloads
//! from one occupant are relayed to the other. A UDP multicast responder
//! lets LAN clients find the server.
//!
//! # Architecture
//!
//! ```text
//! HTTP handlers ──┐
//!                 ├──► RelayActor (owns registry + sessions) ──► ConnectionActor outboxes
//! WS readers ─────┘
//! DiscoveryResponder (independent UDP task)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Relay actor and per-connection writers
//! - [`config`] - Service configuration from environment
//! - [`discovery`] - LAN discovery responder
//! - [`errors`] - Error types and client-facing messages
//! - [`registry`] / [`sessions`] / [`relay`] - Rooms, session state machine, routing

pub mod actors;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod routes;
pub mod sessions;
pub mod token;
