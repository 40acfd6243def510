//! C2: Session Manager.
//!
//! Owns the lifecycle of every transcode session from creation through
//! grace-period removal. Sessions progress through a small state machine:
//!
//! `Pending -> Starting -> Running -> {Complete | Failed | Stopped}`
//!
//! Terminal states are idempotent — re-entering the same terminal state is
//! a no-op, since a provider's `GetProgress` poll racing a `Stop` call must
//! never surface as an error.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::SessionError;
use crate::models::Container;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Starting,
    Running,
    Complete,
    Failed,
    Stopped,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::Failed | SessionState::Stopped
        )
    }

    fn label(self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Complete => "complete",
            SessionState::Failed => "failed",
            SessionState::Stopped => "stopped",
        }
    }
}

/// A single transcode session and everything the manager needs to track
/// about it. Cloned out of the manager's lock for callers, so this type is
/// `Clone`; the live cancellation token is shared, not duplicated.
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    pub provider_id: String,
    pub container: Container,
    pub output_dir: PathBuf,
    pub state: SessionState,
    pub created_at: Instant,
    /// Most recent `(percent, observed_at)`. `observed_at` is compared
    /// against in `cleanup_stale`, not session age, so a slow but still
    /// progressing encode is never reaped.
    pub progress: Option<(u8, Instant)>,
    pub cancel: CancellationToken,
}

impl Session {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Directory naming per the data model: one directory per session, named
/// so an operator can identify container/provider/session at a glance.
#[must_use]
pub fn session_dir(base: &Path, container: Container, provider_id: &str, session_id: Uuid) -> PathBuf {
    base.join(format!("{container}_{provider_id}_{session_id}"))
}

struct Entry {
    session: Session,
    /// Handle to the spawned grace-period removal task, so a later event
    /// (another `Stop`, or `cleanup_stale` beating it to the punch) can
    /// cancel it instead of racing.
    removal: Option<tokio::task::JoinHandle<()>>,
}

/// Coarse per-structure lock over the whole session table, per the
/// concurrency model — sessions don't see enough contention to need
/// per-key sharding, and the simpler lock keeps invariants easy to reason
/// about.
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<Uuid, Entry>>>,
    root_cancel: CancellationToken,
    grace_period: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(grace_period: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            root_cancel: CancellationToken::new(),
            grace_period,
        }
    }

    /// Cancel every session's token. Intended for server shutdown: each
    /// session's encoder-watching task observes its child token and winds
    /// down.
    pub fn cancel_all(&self) {
        self.root_cancel.cancel();
    }

    #[instrument(skip(self))]
    pub fn create(&self, container: Container, provider_id: String, base_dir: &Path) -> Session {
        self.create_with_id(Uuid::new_v4(), container, provider_id, base_dir)
    }

    /// Like `create`, but with a caller-supplied id. The provider plugin
    /// side of the boundary needs this: its session table must be keyed by
    /// the same id the core already generated and handed to the client, not
    /// a fresh one of its own.
    #[instrument(skip(self))]
    pub fn create_with_id(&self, id: Uuid, container: Container, provider_id: String, base_dir: &Path) -> Session {
        let output_dir = session_dir(base_dir, container, &provider_id, id);
        let session = Session {
            id,
            provider_id,
            container,
            output_dir,
            state: SessionState::Pending,
            created_at: Instant::now(),
            progress: None,
            cancel: self.root_cancel.child_token(),
        };

        self.sessions.lock().insert(
            id,
            Entry {
                session: session.clone(),
                removal: None,
            },
        );
        info!(session_id = %id, "session created");
        session
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions.lock().get(&id).map(|e| e.session.clone())
    }

    #[must_use]
    pub fn all(&self) -> Vec<Session> {
        self.sessions.lock().values().map(|e| e.session.clone()).collect()
    }

    /// Clamps `percent` to `[0,100]` and drops it silently if it's lower
    /// than the last recorded value — progress within a session must be
    /// monotonic non-decreasing (P2), and the core doesn't trust a plugin's
    /// reported percentage to already honor that.
    pub fn update_progress(&self, id: Uuid, percent: u8) -> Result<(), SessionError> {
        let clamped = percent.min(100);
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        if let Some((previous, _)) = entry.session.progress {
            if clamped < previous {
                return Ok(());
            }
        }
        entry.session.progress = Some((clamped, Instant::now()));
        Ok(())
    }

    pub fn mark_starting(&self, id: Uuid) -> Result<(), SessionError> {
        self.transition(id, SessionState::Starting)
    }

    pub fn mark_running(&self, id: Uuid) -> Result<(), SessionError> {
        self.transition(id, SessionState::Running)
    }

    pub fn mark_complete(&self, id: Uuid) -> Result<(), SessionError> {
        self.transition_terminal(id, SessionState::Complete)
    }

    pub fn mark_failed(&self, id: Uuid) -> Result<(), SessionError> {
        self.transition_terminal(id, SessionState::Failed)
    }

    pub fn mark_stopped(&self, id: Uuid) -> Result<(), SessionError> {
        self.transition_terminal(id, SessionState::Stopped)
    }

    /// Cancel the session's token (so its encoder-watching task winds
    /// down) and mark it `Stopped`. Calling `stop` on an already-terminal
    /// session is a no-op, matching the idempotent-removal invariant.
    pub fn stop(&self, id: Uuid) -> Result<(), SessionError> {
        let _span = crate::telemetry::context::session_span(id).entered();
        let cancel = {
            let sessions = self.sessions.lock();
            let entry = sessions.get(&id).ok_or(SessionError::NotFound(id))?;
            if entry.session.is_terminal() {
                return Ok(());
            }
            entry.session.cancel.clone()
        };
        cancel.cancel();
        self.mark_stopped(id)
    }

    fn transition(&self, id: Uuid, to: SessionState) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        let from = entry.session.state;

        if from.is_terminal() {
            return Err(SessionError::AlreadyTerminal(id));
        }
        if !matches!(
            (from, to),
            (SessionState::Pending, SessionState::Starting)
                | (SessionState::Starting, SessionState::Running)
        ) {
            return Err(SessionError::InvalidTransition {
                session: id,
                from: from.label(),
                to: to.label(),
            });
        }

        entry.session.state = to;
        Ok(())
    }

    /// Move to a terminal state. Re-entering the *same* terminal state is
    /// a no-op; moving to a *different* terminal state from a terminal
    /// state is rejected.
    fn transition_terminal(&self, id: Uuid, to: SessionState) -> Result<(), SessionError> {
        debug_assert!(to.is_terminal());

        {
            let sessions = self.sessions.lock();
            let entry = sessions.get(&id).ok_or(SessionError::NotFound(id))?;
            match entry.session.state {
                state if state == to => return Ok(()),
                state if state.is_terminal() => return Err(SessionError::AlreadyTerminal(id)),
                _ => {}
            }
        }

        crate::metrics::transcoding::SESSIONS_TOTAL
            .with_label_values(&[to.label()])
            .inc();

        self.schedule_removal(id, to);
        Ok(())
    }

    /// Flip the in-memory state to `to` and spawn the grace-period removal
    /// task. Any previously scheduled removal for this session is
    /// cancelled first so two terminal transitions can't race two removal
    /// tasks.
    fn schedule_removal(&self, id: Uuid, to: SessionState) {
        let grace_period = self.grace_period;
        {
            let mut sessions = self.sessions.lock();
            let Some(entry) = sessions.get_mut(&id) else {
                return;
            };
            entry.session.state = to;
            if let Some(handle) = entry.removal.take() {
                handle.abort();
            }
        }

        // The task below only removes from the map after sleeping, so a
        // concurrent `cleanup_stale` racing it to the removal is fine —
        // `HashMap::remove` on an absent key is a no-op.
        let sessions = Arc::clone(&self.sessions);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            sessions.lock().remove(&id);
        });

        if let Some(entry) = self.sessions.lock().get_mut(&id) {
            entry.removal = Some(handle);
        }
    }

    /// Remove every terminal session whose last progress observation is
    /// older than `older_than`. A session with no progress observation
    /// uses `created_at` instead.
    pub fn cleanup_stale(&self, older_than: Duration) -> Vec<Uuid> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let stale: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| {
                entry.session.is_terminal()
                    && now.duration_since(
                        entry
                            .session
                            .progress
                            .map_or(entry.session.created_at, |(_, at)| at),
                    ) >= older_than
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            if let Some(entry) = sessions.remove(id) {
                if let Some(handle) = entry.removal {
                    handle.abort();
                }
            }
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn manager() -> SessionManager {
        SessionManager::new(Duration::from_millis(50))
    }

    #[test]
    fn create_starts_pending() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        assert_eq!(session.state, SessionState::Pending);
        assert!(mgr.get(session.id).is_some());
    }

    #[test]
    fn happy_path_transitions() {
        let mgr = manager();
        let session = mgr.create(Container::Dash, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.mark_starting(session.id).unwrap();
        mgr.mark_running(session.id).unwrap();
        mgr.update_progress(session.id, 42).unwrap();
        mgr.mark_complete(session.id).unwrap();

        let updated = mgr.get(session.id).unwrap();
        assert_eq!(updated.state, SessionState::Complete);
        assert_eq!(updated.progress.unwrap().0, 42);
    }

    #[test]
    fn update_progress_clamps_to_100() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.update_progress(session.id, 250).unwrap();
        assert_eq!(mgr.get(session.id).unwrap().progress.unwrap().0, 100);
    }

    #[test]
    fn update_progress_drops_out_of_order_updates() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.update_progress(session.id, 50).unwrap();
        mgr.update_progress(session.id, 30).unwrap();
        assert_eq!(mgr.get(session.id).unwrap().progress.unwrap().0, 50);
        mgr.update_progress(session.id, 50).unwrap();
        assert_eq!(mgr.get(session.id).unwrap().progress.unwrap().0, 50);
    }

    #[test]
    fn invalid_transition_rejected() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        // Can't jump straight to Running from Pending.
        assert!(mgr.mark_running(session.id).is_err());
    }

    #[test]
    fn marking_same_terminal_state_twice_is_noop() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.mark_starting(session.id).unwrap();
        mgr.mark_running(session.id).unwrap();
        mgr.mark_complete(session.id).unwrap();
        assert!(mgr.mark_complete(session.id).is_ok());
    }

    #[test]
    fn marking_different_terminal_state_rejected() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.mark_starting(session.id).unwrap();
        mgr.mark_running(session.id).unwrap();
        mgr.mark_complete(session.id).unwrap();
        assert!(mgr.mark_failed(session.id).is_err());
    }

    #[test]
    fn stop_on_terminal_session_is_noop() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.mark_starting(session.id).unwrap();
        mgr.mark_running(session.id).unwrap();
        mgr.mark_complete(session.id).unwrap();
        assert!(mgr.stop(session.id).is_ok());
    }

    #[test]
    fn stop_cancels_token_and_marks_stopped() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.stop(session.id).unwrap();
        let updated = mgr.get(session.id).unwrap();
        assert_eq!(updated.state, SessionState::Stopped);
        assert!(updated.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn grace_period_removes_terminal_session() {
        let mgr = manager();
        let session = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        mgr.mark_starting(session.id).unwrap();
        mgr.mark_running(session.id).unwrap();
        mgr.mark_complete(session.id).unwrap();
        assert!(mgr.get(session.id).is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(mgr.get(session.id).is_none());
    }

    #[test]
    fn cleanup_stale_only_removes_old_terminal_sessions() {
        let mgr = SessionManager::new(Duration::from_secs(3600));
        let stale = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        let fresh = mgr.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));

        mgr.mark_starting(stale.id).unwrap();
        mgr.mark_running(stale.id).unwrap();
        mgr.mark_complete(stale.id).unwrap();

        mgr.mark_starting(fresh.id).unwrap();
        mgr.mark_running(fresh.id).unwrap();
        // fresh stays non-terminal

        let removed = mgr.cleanup_stale(Duration::from_nanos(0));
        assert_eq!(removed, vec![stale.id]);
        assert!(mgr.get(stale.id).is_none());
        assert!(mgr.get(fresh.id).is_some());
    }

    #[test]
    fn session_dir_naming() {
        let id = Uuid::new_v4();
        let dir = session_dir(Path::new("/base"), Container::Dash, "ffmpeg", id);
        assert_eq!(dir, PathBuf::from(format!("/base/dash_ffmpeg_{id}")));
    }
}
