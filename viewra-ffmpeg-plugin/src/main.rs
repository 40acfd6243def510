//! Entry point for the ffmpeg provider plugin binary.
//!
//! Spawned by `viewra_provider::ProviderPool::spawn_one` with
//! `VIEWRA_PLUGIN_SOCKET` set to the Unix domain socket it should listen on.
//! Everything else — configuration, logging, the process/session pair — is
//! independent of whatever process spawned it.

mod convert;
mod error;
mod paths;
mod probe;
mod progress;
mod service;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing::{error, info, warn};

use viewra_core::config::Config;
use viewra_core::logging;
use viewra_core::process::{ProcessEvent, ProcessRegistry};
use viewra_core::session::SessionManager;
use viewra_proto::TranscodeProviderServer;
use viewra_provider::PluginManifest;

use service::TranscodeProviderService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    logging::init_logging(&config.logging).context("initializing logging")?;

    let manifest = load_own_manifest().await.context("loading plugin manifest")?;
    info!(id = %manifest.id, "ffmpeg provider plugin starting");

    let socket_path = std::env::var("VIEWRA_PLUGIN_SOCKET").context("VIEWRA_PLUGIN_SOCKET not set")?;
    let _ = tokio::fs::remove_file(&socket_path).await;

    let transcoding = Arc::new(config.transcoding);
    tokio::fs::create_dir_all(&transcoding.transcoding_dir)
        .await
        .context("creating transcoding directory")?;

    let (processes, process_events) = ProcessRegistry::new();
    let sessions = Arc::new(SessionManager::new(transcoding.session_grace_period));

    // Sessions left behind by a previous crash of this binary. `reap_orphans`
    // already cleaned up directories for processes that are no longer alive;
    // the ones reported here are genuinely still running, but this process
    // has no way to regain ownership of a `Child` it never spawned, so they
    // are logged for an operator to investigate rather than silently adopted.
    match processes.reap_orphans(&transcoding.transcoding_dir).await {
        Ok(orphans) if !orphans.is_empty() => {
            warn!(count = orphans.len(), "found still-running sessions from a previous run");
        }
        Ok(_) => {}
        Err(err) => warn!(%err, "failed to scan for orphaned sessions"),
    }

    tokio::spawn(drive_session_state(Arc::clone(&sessions), process_events));

    let service = TranscodeProviderService::new(manifest, transcoding, Arc::clone(&sessions), processes);
    let listener = UnixListener::bind(&socket_path).with_context(|| format!("binding {socket_path}"))?;
    info!(socket = %socket_path, "listening");

    Server::builder()
        .add_service(TranscodeProviderServer::new(service))
        .serve_with_incoming(UnixListenerStream::new(listener))
        .await
        .context("gRPC server exited")?;

    Ok(())
}

/// Consumes process exit events and drives the matching session to its
/// terminal state, the way `viewra_core::process`'s module doc describes:
/// C1 only signals and observes, C2 owns what an exit means for a session.
async fn drive_session_state(sessions: Arc<SessionManager>, mut events: tokio::sync::mpsc::UnboundedReceiver<ProcessEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ProcessEvent::Stopped { session_id, .. } => {
                if let Err(err) = sessions.mark_stopped(session_id) {
                    warn!(%session_id, %err, "failed to mark stopped session");
                }
            }
            ProcessEvent::ExitedAbnormally { session_id, exit_code, .. } => {
                error!(%session_id, ?exit_code, "encoder process exited unexpectedly");
                if let Err(err) = sessions.mark_failed(session_id) {
                    warn!(%session_id, %err, "failed to mark failed session");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use viewra_core::models::Container;

    #[tokio::test]
    async fn drive_session_state_marks_stopped_on_clean_exit() {
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(60)));
        let session = sessions.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        sessions.mark_starting(session.id).unwrap();
        sessions.mark_running(session.id).unwrap();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(ProcessEvent::Stopped { session_id: session.id, pid: 1 }).unwrap();
        drop(tx);

        drive_session_state(Arc::clone(&sessions), rx).await;

        let updated = sessions.get(session.id).unwrap();
        assert_eq!(updated.state, viewra_core::session::SessionState::Stopped);
    }

    #[tokio::test]
    async fn drive_session_state_marks_failed_on_abnormal_exit() {
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(60)));
        let session = sessions.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        sessions.mark_starting(session.id).unwrap();
        sessions.mark_running(session.id).unwrap();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(ProcessEvent::ExitedAbnormally {
            session_id: session.id,
            pid: 1,
            exit_code: Some(1),
        })
        .unwrap();
        drop(tx);

        drive_session_state(Arc::clone(&sessions), rx).await;

        let updated = sessions.get(session.id).unwrap();
        assert_eq!(updated.state, viewra_core::session::SessionState::Failed);
    }
}

/// Reads the sidecar `manifest.toml` deployed beside this binary
/// (`<plugin_dir>/<id>/{bin, manifest.toml}`), the same file
/// `viewra_provider::discover_plugins` parses to decide whether and how to
/// spawn this process in the first place.
async fn load_own_manifest() -> anyhow::Result<PluginManifest> {
    let exe = std::env::current_exe().context("resolving own executable path")?;
    let manifest_path = exe
        .parent()
        .context("executable has no parent directory")?
        .join("manifest.toml");
    let raw = tokio::fs::read_to_string(&manifest_path)
        .await
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", manifest_path.display()))
}
