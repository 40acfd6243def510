//! `PlaybackController`: ties the session manager (C2), the provider pool
//! (C5), and manifest-readiness polling together into the operations the
//! HTTP layer calls — `StartStream`, `StopSession`, and the seek-ahead
//! handoff.
//!
//! The session state this controller's `SessionManager` tracks is the
//! server's logical view of a stream (used for `/playback/stats` and
//! `/playback/session/{sid}`); the OS-level encoder process is tracked by a
//! *second*, independent `ProcessRegistry`/`SessionManager` pair living
//! inside the provider plugin's own address space (`viewra-ffmpeg-plugin`).
//! The two are kept in sync only through the RPC surface — `StartStream`
//! creates both sides, `StopStream`/`StopTranscode` tears down the plugin's
//! side, `stop` here tears down ours.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;
use viewra_core::models::{ProgressInfo, TranscodeRequest};
use viewra_core::session::{Session, SessionManager};
use viewra_provider::ProviderPool;

use crate::error::{PlaybackError, Result};
use crate::manifest_poll::{poll_until_ready, PollOutcome, PollSchedule};
use crate::paths::{manifest_filename, manifest_is_ready};

pub type ClientId = String;

/// A session id a given client is mid-handoff to, so a second seek-ahead
/// request from the same client can cancel the first per spec.md's
/// tie-break rule. Kept separate from `SessionManager`'s table since it's
/// about client intent, not session state.
type InFlightSeeks = DashMap<ClientId, Uuid>;

pub struct PlaybackController {
    sessions: Arc<SessionManager>,
    providers: Arc<ProviderPool>,
    /// The request last used to start each live session, kept so a
    /// seek-ahead can replay it with a new `seek_seconds`. `viewra_core`'s
    /// `Session` intentionally doesn't carry this (it's a C5-RPC-boundary
    /// concept, not a C2 one), so the controller owns the mapping.
    requests: DashMap<Uuid, TranscodeRequest>,
    in_flight_seeks: InFlightSeeks,
    base_dir: PathBuf,
    poll_schedule: PollSchedule,
    seek_ahead_retire_grace: Duration,
}

impl PlaybackController {
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        providers: Arc<ProviderPool>,
        base_dir: PathBuf,
        poll_schedule: PollSchedule,
        seek_ahead_retire_grace: Duration,
    ) -> Self {
        Self {
            sessions,
            providers,
            requests: DashMap::new(),
            in_flight_seeks: DashMap::new(),
            base_dir,
            poll_schedule,
            seek_ahead_retire_grace,
        }
    }

    #[must_use]
    pub fn get_session(&self, id: Uuid) -> Option<Session> {
        self.sessions.get(id)
    }

    #[must_use]
    pub fn all_sessions(&self) -> Vec<Session> {
        self.sessions.all()
    }

    /// Cancels every session's token, so each session's own watchers wind
    /// down promptly rather than waiting to be stopped one by one. Called
    /// at server shutdown before `stop_session` is issued for each live
    /// session.
    pub fn cancel_all_sessions(&self) {
        self.sessions.cancel_all();
    }

    /// Allocates a session, asks the highest-priority capable provider to
    /// start it, and returns as soon as the session has transitioned to
    /// `Starting` — callers poll the manifest URL themselves afterward.
    pub async fn start_stream(&self, mut request: TranscodeRequest) -> Result<(Uuid, String)> {
        let provider_id = self
            .providers
            .select_provider(request.container)
            .ok_or(PlaybackError::ProviderUnavailable)?;

        let session = self.sessions.create(request.container, provider_id.clone(), &self.base_dir);
        request.session_id = session.id;

        let mut client = self.provider_client(&provider_id)?;
        match start_stream_with_retry(&mut client, &request).await {
            Ok(_handle) => {
                self.sessions.mark_starting(session.id)?;
                self.requests.insert(session.id, request.clone());
                info!(session_id = %session.id, %provider_id, "stream started");
                Ok((session.id, manifest_filename(request.container)))
            }
            Err(err) => {
                warn!(session_id = %session.id, %err, "provider failed to start stream");
                self.sessions.mark_failed(session.id)?;
                Err(err.into())
            }
        }
    }

    /// Stops the session locally and asks its provider to stop the
    /// underlying encoder. Idempotent — stopping an already-terminal
    /// session is a no-op on both sides.
    pub async fn stop_session(&self, session_id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(PlaybackError::SessionNotFound(session_id))?;

        if !session.is_terminal() {
            if let Ok(mut client) = self.provider_client(&session.provider_id) {
                if let Err(err) = client.stop_stream(session_id).await {
                    warn!(%session_id, %err, "provider stop_stream failed; stopping locally anyway");
                }
            }
        }

        self.sessions.stop(session_id)?;
        self.requests.remove(&session_id);
        Ok(())
    }

    pub async fn progress(&self, session_id: Uuid) -> Result<ProgressInfo> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(PlaybackError::SessionNotFound(session_id))?;
        let mut client = self.provider_client(&session.provider_id)?;
        let progress = client.get_progress(session_id).await?;
        if let Err(err) = self.sessions.update_progress(session_id, progress.percent) {
            warn!(%session_id, %err, "failed to record progress locally");
        }
        Ok(progress)
    }

    /// The seek-ahead handoff (spec.md §4.4 step list): verify the old
    /// session, cancel any other in-flight seek-ahead for this client,
    /// start a replacement session seeded at `seek_time`, wait for its
    /// manifest, then schedule the old session's retirement.
    pub async fn seek_ahead(
        &self,
        client_id: &ClientId,
        old_session_id: Uuid,
        seek_time: f64,
    ) -> Result<(Uuid, String)> {
        self.sessions
            .get(old_session_id)
            .filter(|s| !s.is_terminal())
            .ok_or(PlaybackError::SessionNotFound(old_session_id))?;

        let mut base_request = self
            .requests
            .get(&old_session_id)
            .map(|r| r.clone())
            .ok_or(PlaybackError::SessionNotFound(old_session_id))?;
        base_request.seek_seconds = Some(seek_time);

        // Tie-break: the later seek-ahead request wins. If this client
        // already has one in flight, stop it before it can complete.
        if let Some((_, previous_target)) = self.in_flight_seeks.remove(client_id) {
            if previous_target != old_session_id {
                warn!(%client_id, stale_target = %previous_target, "cancelling superseded seek-ahead");
                let _ = self.stop_session(previous_target).await;
            }
        }

        let (new_session_id, manifest_name) = match self.start_stream(base_request).await {
            Ok(started) => started,
            Err(err) => return Err(err),
        };
        self.in_flight_seeks.insert(client_id.clone(), new_session_id);

        let new_session = self
            .sessions
            .get(new_session_id)
            .ok_or(PlaybackError::SessionNotFound(new_session_id))?;

        let outcome = poll_until_ready(self.poll_schedule, &new_session.cancel, || {
            let output_dir = new_session.output_dir.clone();
            let container = new_session.container;
            async move { manifest_is_ready(&output_dir, container).await }
        })
        .await;

        self.in_flight_seeks.remove(client_id);

        match outcome {
            PollOutcome::Ready => {
                self.schedule_old_session_retirement(old_session_id);
                Ok((new_session_id, manifest_name))
            }
            PollOutcome::TimedOut => {
                let _ = self.stop_session(new_session_id).await;
                Err(PlaybackError::ManifestTimeout(new_session_id))
            }
            PollOutcome::Cancelled => {
                // Superseded by a later seek-ahead from the same client.
                Err(PlaybackError::SessionNotFound(old_session_id))
            }
        }
    }

    fn schedule_old_session_retirement(&self, old_session_id: Uuid) {
        let sessions = Arc::clone(&self.sessions);
        let providers = Arc::clone(&self.providers);
        let grace = self.seek_ahead_retire_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(session) = sessions.get(old_session_id) {
                if let Some(mut client) = providers.provider_client(&session.provider_id) {
                    let _ = client.stop_stream(old_session_id).await;
                }
            }
            let _ = sessions.stop(old_session_id);
        });
    }

    fn provider_client(&self, provider_id: &str) -> Result<viewra_provider::ProviderClient> {
        self.providers
            .provider_client(provider_id)
            .ok_or(PlaybackError::ProviderUnavailable)
    }
}

/// Retries `StartTranscode`'s sibling RPC with exponential backoff on
/// transient transport failures (the provider plugin's gRPC socket can
/// briefly refuse connections right after a hot-reload respawn).
async fn start_stream_with_retry(
    client: &mut viewra_provider::ProviderClient,
    request: &TranscodeRequest,
) -> std::result::Result<(Uuid, String), viewra_provider::ProviderError> {
    use backon::{BackoffBuilder, ExponentialBuilder};
    use viewra_core::resilience::retry::should_retry_error;

    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(2)
        .with_jitter()
        .build();

    let mut last_err = None;
    for delay in std::iter::once(Duration::ZERO).chain(backoff) {
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        match client.start_stream(request).await {
            Ok(handle) => return Ok(handle),
            Err(err) if should_retry_error(&err) => {
                warn!(%err, "start_stream failed, retrying");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.expect("loop always runs at least once"))
}
