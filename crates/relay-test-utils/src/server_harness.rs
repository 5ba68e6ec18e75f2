//! Test server harness for E2E testing
//!
//! Provides `TestRelayServer` for spawning real relay server instances in tests.

use metrics_exporter_prometheus::PrometheusBuilder;
use relay_service::actors::{RelayActorHandle, RelayStatus};
use relay_service::config::Config;
use relay_service::relay::MessageRelay;
use relay_service::routes::{self, AppState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long `wait_for_status` polls before giving up.
const STATUS_WAIT: Duration = Duration::from_secs(2);

/// Test harness for spawning the relay server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let server = TestRelayServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRelayServer {
    addr: SocketAddr,
    relay: RelayActorHandle,
    config: Config,
    cancel_token: CancellationToken,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestRelayServer {
    /// Spawn a server with default test configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&[]).await
    }

    /// Spawn a server with extra `RELAY_*` variables on top of the test defaults.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Run without the discovery responder
    /// - Start the HTTP server in the background
    pub async fn spawn_with_vars(extra: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("RELAY_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("RELAY_DISCOVERY_ENABLED".to_string(), "false".to_string()),
        ]);
        for (name, value) in extra {
            vars.insert((*name).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let cancel_token = CancellationToken::new();
        let relay = RelayActorHandle::new(
            MessageRelay::new(config.max_message_length),
            cancel_token.child_token(),
        );

        let state = Arc::new(AppState {
            relay: relay.clone(),
            config: config.clone(),
        });

        // Handle without installing a global recorder; tests share a process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind(config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let server_token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await });
            if let Err(e) = server.await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            relay,
            config,
            cancel_token,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the WebSocket URL of the duplex channel.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Current relay counts straight from the actor.
    pub async fn status(&self) -> Result<RelayStatus, anyhow::Error> {
        self.relay
            .get_status()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get relay status: {}", e))
    }

    /// Poll until `check` accepts the relay status.
    ///
    /// Joins produce no event for the joiner, so tests use this to know a
    /// join or disconnect has been applied.
    pub async fn wait_for_status(
        &self,
        check: impl Fn(&RelayStatus) -> bool,
    ) -> Result<RelayStatus, anyhow::Error> {
        let deadline = tokio::time::Instant::now() + STATUS_WAIT;
        loop {
            let status = self.status().await?;
            if check(&status) {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("Relay status never matched, last seen {:?}", status);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// POST a JSON body to an API path.
    pub async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}{}", self.url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Create a room through `POST /api/new` and return its token.
    pub async fn create_room(&self, name: &str, password: &str) -> Result<u64, anyhow::Error> {
        let response = self
            .post("/api/new", &json!({"name": name, "password": password}))
            .await?;
        Self::token_from(response).await
    }

    /// Look up a room through `POST /api/join` and return its token.
    pub async fn join_room(&self, name: &str, password: &str) -> Result<u64, anyhow::Error> {
        let response = self
            .post("/api/join", &json!({"name": name, "password": password}))
            .await?;
        Self::token_from(response).await
    }

    async fn token_from(response: reqwest::Response) -> Result<u64, anyhow::Error> {
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            anyhow::bail!("Request failed with {}: {}", status, body);
        }
        body["token"]
            .as_u64()
            .ok_or_else(|| anyhow::anyhow!("Response has no numeric token: {}", body))
    }
}

impl Drop for TestRelayServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self._handle.abort();
    }
}
