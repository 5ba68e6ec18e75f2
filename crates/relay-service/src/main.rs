//! Chat Relay
//!
//! Two-party chat relay for the local network.
//!
//! # Servers
//!
//! - HTTP API and WebSocket duplex channel (default: 0.0.0.0:8002)
//! - UDP discovery responder on multicast group 224.0.2.62 (default port 8002)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Log available IPv4 interfaces
//! 4. Spawn the relay actor
//! 5. Start the discovery responder (if enabled)
//! 6. Serve HTTP until a shutdown signal arrives

#![warn(clippy::pedantic)]

use relay_service::actors::RelayActorHandle;
use relay_service::config::Config;
use relay_service::discovery::DiscoveryResponder;
use relay_service::observability::init_metrics_recorder;
use relay_service::relay::MessageRelay;
use relay_service::routes::{self, AppState};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Chat Relay");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        discovery_enabled = config.discovery_enabled,
        discovery_bind_address = %config.discovery_bind_address,
        multicast_address = %config.multicast_address,
        max_message_length = ?config.max_message_length,
        outbox_capacity = config.outbox_capacity,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    log_interfaces(&config);

    let shutdown_token = CancellationToken::new();
    let relay = RelayActorHandle::new(
        MessageRelay::new(config.max_message_length),
        shutdown_token.child_token(),
    );

    if config.discovery_enabled {
        let responder = DiscoveryResponder::bind(
            config.discovery_bind_address,
            config.multicast_address,
        )
        .map_err(|e| {
            error!(error = %e, addr = %config.discovery_bind_address, "Failed to start discovery responder");
            e
        })?;
        tokio::spawn(responder.run(shutdown_token.child_token()));
    } else {
        info!("Discovery responder disabled");
    }

    let bind_address = config.bind_address;
    let state = Arc::new(AppState { relay, config });
    let app = routes::build_routes(state, metrics_handle);

    // Bind before serving to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %bind_address, "Failed to bind HTTP server");
            e
        })?;

    info!("Chat Relay listening on {}", bind_address);

    let server_token = shutdown_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_token.cancel();
        })
        .await?;

    // Stops the relay actor, connection writers and discovery responder
    shutdown_token.cancel();

    info!("Chat Relay shutdown complete");

    Ok(())
}

/// Log every local IPv4 address the service can be reached on.
fn log_interfaces(config: &Config) {
    let port = config.bind_address.port();

    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => {
            info!("Available interfaces:");
            for (name, addr) in interfaces {
                if let IpAddr::V4(addr) = addr {
                    info!("{} - {}:{}", name, addr, port);
                }
            }
        }
        Err(e) => warn!(error = %e, "Failed to list network interfaces"),
    }

    info!("Multicast address: {}", config.multicast_address);
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
