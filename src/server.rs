//! Daemon bootstrap.
//!
//! Wires the registry to the real serial factory, connects configured ports,
//! serves the HTTP API, and drains sessions on shutdown.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::ApiServer;
use crate::channel::{ChannelFactory, SerialChannelFactory};
use crate::config::Config;
use crate::session::SessionRegistry;

/// Main modemd server.
pub struct Server {
    config: Config,
    registry: Arc<SessionRegistry>,
}

impl Server {
    /// Create a new server instance.
    pub fn new(config: Config) -> Self {
        let factory: Arc<dyn ChannelFactory> = Arc::new(SerialChannelFactory);
        let registry = SessionRegistry::new(factory, config.defaults.clone());
        Self { config, registry }
    }

    /// Run the server until shutdown.
    pub async fn run(self) -> Result<()> {
        info!(
            api_address = %self.config.api.address,
            autoconnect = self.config.autoconnect.len(),
            "starting modemd server"
        );

        // Connect configured ports; a dead port must not stop the daemon
        for port in &self.config.autoconnect {
            match self.registry.connect(port).await {
                Ok(_) => info!(port = %port, "autoconnected"),
                Err(e) => warn!(port = %port, error = %e, "autoconnect failed"),
            }
        }

        let api = ApiServer::new(self.config.api.address, self.registry.clone());
        let api_handle = tokio::spawn(async move {
            if let Err(e) = api.serve().await {
                error!(error = %e, "api server failed");
            }
        });

        info!("modemd server started");

        Self::wait_for_shutdown().await;

        info!("shutdown signal received, draining sessions");
        self.registry.disconnect_all().await;
        api_handle.abort();

        info!("modemd server stopped");
        Ok(())
    }

    /// Wait for shutdown signal (SIGINT or SIGTERM).
    async fn wait_for_shutdown() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("received SIGTERM");
            }
        }
    }
}
