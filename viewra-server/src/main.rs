//! Entry point for the core playback server: decides direct-play vs.
//! transcode, owns the logical session table, and fronts the provider
//! plugin pool with the `/playback/*` HTTP surface (spec.md §6).

mod app;
mod error;
mod health;
mod routes;
mod server;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use viewra_core::config::Config;
use viewra_core::logging;
use viewra_core::session::SessionManager;
use viewra_playback::manifest_poll::PollSchedule;
use viewra_playback::PlaybackController;
use viewra_provider::ProviderPool;

use server::ViewraServer;
use state::AppState;

/// Grace period after a seek-ahead's new manifest is ready before the old
/// session is retired (spec.md §4.4 step 6).
const SEEK_AHEAD_RETIRE_GRACE: Duration = Duration::from_secs(5);

/// How often the provider pool checks plugin binaries for hot-reload.
const RELOAD_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// How often expired terminal sessions are swept from the session table.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    logging::init_logging(&config.logging).context("initializing logging")?;

    info!("viewra-server starting");

    tokio::fs::create_dir_all(&config.transcoding.transcoding_dir)
        .await
        .context("creating transcoding directory")?;

    let transcoding = Arc::new(config.transcoding.clone());
    let sessions = Arc::new(SessionManager::new(transcoding.session_grace_period));

    let (providers, mut provider_events) = ProviderPool::new(
        config.provider.plugin_dir.clone(),
        config.provider.drain_timeout,
    );
    let providers = Arc::new(providers);

    match providers.refresh().await {
        Ok(count) => info!(count, "provider plugins discovered"),
        Err(err) => warn!(%err, "initial provider discovery failed"),
    }

    tokio::spawn(async move {
        while let Some(event) = provider_events.recv().await {
            warn!(?event, "provider event");
        }
    });

    let controller = Arc::new(PlaybackController::new(
        Arc::clone(&sessions),
        Arc::clone(&providers),
        transcoding.transcoding_dir.clone(),
        PollSchedule::from_config(&transcoding),
        SEEK_AHEAD_RETIRE_GRACE,
    ));

    spawn_reload_loop(Arc::clone(&providers));
    spawn_cleanup_loop(Arc::clone(&sessions), transcoding.session_grace_period);

    let state = AppState {
        controller,
        providers,
        transcoding,
    };

    ViewraServer::new(config, state).start().await
}

fn spawn_reload_loop(providers: Arc<ProviderPool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RELOAD_CHECK_INTERVAL);
        loop {
            interval.tick().await;
            providers.check_reloads().await;
        }
    });
}

fn spawn_cleanup_loop(sessions: Arc<SessionManager>, grace_period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_stale(grace_period);
            if !removed.is_empty() {
                info!(count = removed.len(), "swept stale sessions");
            }
        }
    });
}
