//! Relay service configuration.
//!
//! Configuration is loaded from environment variables with defaults that
//! match the LAN deployment: HTTP and WebSocket on port 8002, discovery
//! probes answered on UDP 8002 in multicast group 224.0.2.62.

use std::collections::HashMap;
use std::env;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8002";

/// Default discovery responder bind address.
pub const DEFAULT_DISCOVERY_BIND_ADDRESS: &str = "0.0.0.0:8002";

/// Default discovery multicast group.
pub const DEFAULT_MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(224, 0, 2, 62);

/// Default per-connection outbound buffer, in events.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// Relay service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP and WebSocket bind address (default: "0.0.0.0:8002").
    pub bind_address: SocketAddr,

    /// Whether to run the discovery responder (default: true).
    pub discovery_enabled: bool,

    /// UDP bind address for discovery probes (default: "0.0.0.0:8002").
    pub discovery_bind_address: SocketAddrV4,

    /// Multicast group joined by the discovery responder (default: 224.0.2.62).
    pub multicast_address: Ipv4Addr,

    /// Optional cap on raw chat length. Unset means no check at all.
    pub max_message_length: Option<usize>,

    /// Outbound events buffered per connection before new ones are dropped.
    pub outbox_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(value) => value.trim().parse().map_err(|_| invalid(name, value)),
        None => Ok(default),
    }
}

fn parse_bool(vars: &HashMap<String, String>, name: &str, default: bool) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(invalid(name, &v)),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .map_or(DEFAULT_BIND_ADDRESS, String::as_str);
        let bind_address = bind_address
            .parse()
            .map_err(|_| invalid("RELAY_BIND_ADDRESS", bind_address))?;

        let discovery_bind_address = vars
            .get("RELAY_DISCOVERY_BIND_ADDRESS")
            .map_or(DEFAULT_DISCOVERY_BIND_ADDRESS, String::as_str);
        let discovery_bind_address = discovery_bind_address
            .parse()
            .map_err(|_| invalid("RELAY_DISCOVERY_BIND_ADDRESS", discovery_bind_address))?;

        let discovery_enabled = parse_bool(vars, "RELAY_DISCOVERY_ENABLED", true)?;

        let multicast_address: Ipv4Addr =
            parse_or(vars, "RELAY_MULTICAST_ADDRESS", DEFAULT_MULTICAST_ADDRESS)?;
        if !multicast_address.is_multicast() {
            return Err(invalid(
                "RELAY_MULTICAST_ADDRESS",
                &multicast_address.to_string(),
            ));
        }

        let max_message_length = match vars.get("RELAY_MAX_MESSAGE_LENGTH") {
            None => None,
            Some(value) => match value.trim().parse::<usize>() {
                Ok(0) | Err(_) => return Err(invalid("RELAY_MAX_MESSAGE_LENGTH", value)),
                Ok(max) => Some(max),
            },
        };

        let outbox_capacity = parse_or(vars, "RELAY_OUTBOX_CAPACITY", DEFAULT_OUTBOX_CAPACITY)?;
        if outbox_capacity == 0 {
            return Err(invalid("RELAY_OUTBOX_CAPACITY", "0"));
        }

        Ok(Config {
            bind_address,
            discovery_enabled,
            discovery_bind_address,
            multicast_address,
            max_message_length,
            outbox_capacity,
        })
    }
}
