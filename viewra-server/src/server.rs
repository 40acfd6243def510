//! Server lifecycle: binds the HTTP listener, races it against a shutdown
//! signal, then tears down sessions and provider plugins in parallel with a
//! hard deadline — the shape of the teacher's `SyncTvServer::start`/
//! `shutdown`, trimmed to the one server this crate actually runs (there is
//! no gRPC server here: gRPC is only the client-facing boundary to the
//! provider plugins, already owned by `viewra_provider::ProviderPool`).

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use viewra_core::config::Config;

use crate::app;
use crate::state::AppState;

/// Hard ceiling for shutdown, per spec.md §5: "the core does not exit
/// until C1 reports zero live children or a hard 30s timeout elapses,
/// whichever is first."
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ViewraServer {
    config: Config,
    state: AppState,
    http_handle: Option<JoinHandle<()>>,
}

impl ViewraServer {
    #[must_use]
    pub fn new(config: Config, state: AppState) -> Self {
        Self {
            config,
            state,
            http_handle: None,
        }
    }

    pub async fn start(mut self) -> anyhow::Result<()> {
        info!("starting viewra-server...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let http_handle = self.start_http_server(shutdown_rx).await?;
        self.http_handle = Some(http_handle);

        info!(address = %self.config.http_address(), "HTTP server started");

        let http_handle = self.http_handle.take().expect("set immediately above");
        tokio::select! {
            _ = http_handle => {
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);
        self.shutdown().await;
        Ok(())
    }

    async fn start_http_server(&self, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<JoinHandle<()>> {
        let address = self.config.http_address();
        let addr: SocketAddr = address.parse().map_err(|err| anyhow::anyhow!("invalid HTTP address {address}: {err}"))?;
        let listener = TcpListener::bind(addr).await?;

        let router = app::build(self.state.clone(), &self.config.server.cors_allowed_origins);

        let handle = tokio::spawn(async move {
            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(err) = axum::serve(listener, router).with_graceful_shutdown(graceful).await {
                error!(%err, "HTTP server error");
            }
            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }

    /// Stop every live session in parallel, then tear down provider
    /// plugins. Bounded by `SHUTDOWN_TIMEOUT` so a stuck encoder can never
    /// block process exit forever — past the deadline the provider
    /// plugins' own process groups are killed anyway by `shutdown_all`.
    async fn shutdown(&self) {
        info!("shutting down viewra-server...");

        self.state.controller.cancel_all_sessions();

        let live: Vec<_> = self
            .state
            .controller
            .all_sessions()
            .into_iter()
            .filter(|s| !s.is_terminal())
            .map(|s| s.id)
            .collect();

        if !live.is_empty() {
            info!(count = live.len(), "stopping active sessions");
            let controller = Arc::clone(&self.state.controller);
            let stop_all = async move {
                futures::future::join_all(live.iter().map(|id| {
                    let controller = Arc::clone(&controller);
                    let id = *id;
                    async move {
                        if let Err(err) = controller.stop_session(id).await {
                            warn!(session_id = %id, %err, "failed to stop session during shutdown");
                        }
                    }
                }))
                .await;
            };

            if with_timeout(SHUTDOWN_TIMEOUT, stop_all).await.is_none() {
                warn!("shutdown timeout reached before all sessions stopped");
            }
        }

        self.state.providers.shutdown_all().await;
        info!("viewra-server shut down complete");
    }
}

async fn with_timeout<F: Future<Output = ()>>(duration: Duration, fut: F) -> Option<()> {
    tokio::time::timeout(duration, fut).await.ok()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(%err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received Ctrl+C"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
