use jamroom_core::Config;
use jamroom_sync::sync::DisconnectSignal;
use jamroom_sync::Coordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::http::{create_router, AppState};

/// Jamroom server: the HTTP/WebSocket listener plus background maintenance
pub struct JamroomServer {
    config: Config,
    state: AppState,
    http_handle: Option<JoinHandle<()>>,
    reaper_handle: Option<JoinHandle<()>>,
}

impl JamroomServer {
    #[must_use]
    pub const fn new(config: Config, state: AppState) -> Self {
        Self {
            config,
            state,
            http_handle: None,
            reaper_handle: None,
        }
    }

    fn coordinator(&self) -> &Arc<Coordinator> {
        &self.state.coordinator
    }

    /// Start the server and wait for a shutdown signal
    pub async fn start(mut self) -> anyhow::Result<()> {
        info!("Starting jamroom server...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reap_interval = self.config.connection_limits.reap_interval();
        self.reaper_handle = Some(self.coordinator().spawn_reaper(reap_interval));
        info!(
            interval_secs = reap_interval.as_secs(),
            "Idle connection reaper started"
        );

        let http_handle = self.start_http_server(shutdown_rx).await?;
        self.http_handle = Some(http_handle);

        info!("Server started successfully");

        let http_handle = self
            .http_handle
            .take()
            .ok_or_else(|| anyhow::anyhow!("HTTP server handle missing after startup"))?;

        tokio::select! {
            _ = http_handle => {
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);

        self.shutdown().await;

        Ok(())
    }

    /// Close every session and wait for them to unregister
    async fn shutdown(&mut self) {
        info!("Shutting down jamroom server...");

        // Upgraded sockets are not tracked by the HTTP server's graceful shutdown
        let signalled = self
            .coordinator()
            .membership()
            .request_disconnect(DisconnectSignal::All);
        info!(sessions = signalled, "Disconnect requested for all sessions");

        let drain_timeout = Duration::from_secs(30);
        let drain_poll_interval = Duration::from_millis(500);
        let active = self.coordinator().membership().connection_count();
        if active > 0 {
            info!(
                "Waiting up to {}s for {} active connection(s) to drain...",
                drain_timeout.as_secs(),
                active
            );
            let deadline = tokio::time::Instant::now() + drain_timeout;
            loop {
                let remaining = self.coordinator().membership().connection_count();
                if remaining == 0 {
                    info!("All connections drained");
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    warn!(
                        "Drain timeout reached with {} connection(s) still active, proceeding with shutdown",
                        remaining
                    );
                    break;
                }
                tokio::time::sleep(drain_poll_interval).await;
            }
        }

        if let Some(reaper) = self.reaper_handle.take() {
            reaper.abort();
        }

        info!(
            active_rooms = self.coordinator().registry().room_count(),
            "Jamroom server shut down complete"
        );
    }

    async fn start_http_server(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let http_address = self.config.http_address();
        let http_addr: std::net::SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

        // Bind up front so a taken port fails startup instead of a background task
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;

        let router = create_router(self.state.clone());

        let handle = tokio::spawn(async move {
            info!("HTTP server listening on {}", http_addr);

            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
