//! API server wiring.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::session::SessionRegistry;

use super::handlers;

/// Shared API state.
pub struct ApiState {
    /// Session registry
    pub registry: Arc<SessionRegistry>,

    /// Server start time
    pub started: Instant,
}

impl ApiState {
    pub fn new(registry: Arc<SessionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            started: Instant::now(),
        })
    }
}

/// HTTP API server.
pub struct ApiServer {
    address: SocketAddr,
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Create a new API server.
    pub fn new(address: SocketAddr, registry: Arc<SessionRegistry>) -> Self {
        Self {
            address,
            state: ApiState::new(registry),
        }
    }

    /// Build the route table.
    pub fn router(state: Arc<ApiState>) -> Router {
        Router::new()
            .route("/healthz", get(handlers::healthz))
            .route("/ports", get(handlers::ports))
            .route("/sessions", get(handlers::sessions))
            .route("/sessions/{port}/connect", post(handlers::connect))
            .route("/sessions/{port}/disconnect", post(handlers::disconnect))
            .route("/sessions/{port}/sms", post(handlers::send_sms))
            .route("/sessions/{port}/ussd", post(handlers::send_ussd))
            .route("/sessions/{port}/sms/inbox", get(handlers::inbox))
            .route("/sessions/{port}/log", get(handlers::event_log))
            .with_state(state)
    }

    /// Serve until the task is dropped.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.address)
            .await
            .with_context(|| format!("failed to bind api address {}", self.address))?;

        info!(address = %self.address, "api server listening");

        let app = Self::router(self.state);
        axum::serve(listener, app)
            .await
            .context("api server failed")?;
        Ok(())
    }
}
