//! HTTP server hosting the REST API and the MCP endpoint.
//!
//! # Architecture
//!
//! ```text
//! Phone app ──→ POST /api/hr ──→ ReadingStore ←── GET /api/hr/*  ←── dashboards
//!                                     ↑
//!                                     └───────── POST /mcp ←── AI agents
//! ```
//!
//! Both front ends share one [`ReadingStore`]; a [`Sweeper`] task prunes it
//! in the background for as long as the server runs.

use crate::config::Config;
use crate::store::{spawn_sweeper, ReadingStore, SharedReadingStore, Sweeper};
use crate::{api, mcp};
use axum::{
    http::HeaderName,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Reading time-to-live
    pub ttl: Duration,
    /// Interval between background sweeps
    pub sweep_interval: Duration,
}

impl ServerConfig {
    /// Create a new server configuration with default TTL and sweep interval
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let defaults = Config::default();
        Self {
            host: host.into(),
            port,
            ttl: defaults.ttl,
            sweep_interval: defaults.sweep_interval,
        }
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            ttl: config.ttl,
            sweep_interval: config.sweep_interval,
        }
    }
}

/// Shared server state
#[derive(Debug)]
pub struct ServerState {
    /// The reading store both front ends query
    pub store: SharedReadingStore,
}

impl ServerState {
    /// Create new server state around an existing store
    pub fn new(store: SharedReadingStore) -> Self {
        Self { store }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: crate::store::types::iso8601::format(&Utc::now()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the full application router.
pub fn app(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api::router())
        .route("/mcp", post(mcp::endpoint))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([HeaderName::from_static("mcp-session-id")]),
        )
        .with_state(state)
}

/// Handle to a running server.
#[derive(Debug)]
pub struct RunningServer {
    /// Address actually bound
    pub addr: SocketAddr,
    /// The store the server is serving
    pub store: SharedReadingStore,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    server: tokio::task::JoinHandle<()>,
    sweeper: Sweeper,
}

impl RunningServer {
    /// Stop accepting connections, finish in-flight requests and stop the sweeper.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.server.await {
            tracing::error!("Server task failed: {}", e);
        }
        self.sweeper.shutdown().await;
    }
}

/// Run the HTTP server with a fresh store.
pub async fn run(config: ServerConfig) -> anyhow::Result<RunningServer> {
    let store = Arc::new(ReadingStore::new(config.ttl));
    run_with_store(config, store).await
}

/// Run the HTTP server around the given store.
pub async fn run_with_store(
    config: ServerConfig,
    store: SharedReadingStore,
) -> anyhow::Result<RunningServer> {
    let state = Arc::new(ServerState::new(store.clone()));
    let app = app(state);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Heart rate bridge listening on http://{}", actual_addr);
    tracing::info!("- REST API: http://{}/api/hr", actual_addr);
    tracing::info!("- MCP endpoint: http://{}/mcp", actual_addr);
    tracing::info!(
        "Readings kept for {}s, swept every {}s",
        store.ttl().num_seconds(),
        config.sweep_interval.as_secs()
    );

    let sweeper = spawn_sweeper(store.clone(), config.sweep_interval);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(RunningServer {
        addr: actual_addr,
        store,
        shutdown_tx,
        server,
        sweeper,
    })
}
