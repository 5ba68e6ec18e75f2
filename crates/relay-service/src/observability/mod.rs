//! Observability for the relay service.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit fields.
//! Room names, passwords, tokens and chat text never appear in logs or
//! metric labels. Labels are bounded:
//! - `kind`: chat, service
//! - `reason`: bounded by `RelayError::reason`
//! - `result`: offered, ignored, error
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `relay_rooms_active` | Gauge | none | Live rooms |
//! | `relay_connections_active` | Gauge | none | Open duplex connections |
//! | `relay_rooms_created_total` | Counter | none | Successful room creations |
//! | `relay_messages_relayed_total` | Counter | `kind` | Payloads forwarded to a peer |
//! | `relay_join_failures_total` | Counter | `reason` | Rejected join attempts |
//! | `relay_discovery_probes_total` | Counter | `result` | Datagrams seen by the responder |

pub mod metrics;

pub use metrics::{
    init_metrics_recorder, record_discovery_probe, record_join_failure, record_message_relayed,
    record_room_created, set_connections_active, set_rooms_active,
};
