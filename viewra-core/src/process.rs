//! C1: Process Registry.
//!
//! Tracks every encoder child process a provider plugin has spawned, keyed
//! by pid, and owns each `tokio::process::Child` for the lifetime of the
//! process via a background reaper task. The registry never blocks on a
//! `.wait()` call itself — it only signals and observes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ProcessError;

/// Describes how a tracked encoder process ended. Consumed by the session
/// manager (C2) to drive session state transitions without C1 needing to
/// know anything about sessions beyond their id.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Exited after `stop_by_session` requested it — a clean shutdown.
    Stopped { session_id: Uuid, pid: u32 },
    /// Exited on its own, without ever being asked to stop.
    ExitedAbnormally {
        session_id: Uuid,
        pid: u32,
        exit_code: Option<i32>,
    },
}

struct ProcessEntry {
    session_id: Uuid,
    registered_at: Instant,
    stop_requested: Arc<AtomicBool>,
}

/// Tracks live encoder processes. Cheap to clone (it's an `Arc` wrapper in
/// practice — construct with `new` and share the returned `Arc`).
pub struct ProcessRegistry {
    processes: Mutex<HashMap<u32, ProcessEntry>>,
    events_tx: mpsc::UnboundedSender<ProcessEvent>,
}

impl ProcessRegistry {
    /// Construct a registry and the receiver side of its exit-event
    /// channel. The receiver is normally handed to the session manager's
    /// event loop.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ProcessEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                processes: Mutex::new(HashMap::new()),
                events_tx,
            }),
            events_rx,
        )
    }

    /// Number of processes currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a freshly spawned child process under `session_id` and
    /// spawn the reaper task that owns `child` until it exits. Returns the
    /// child's pid.
    pub fn register(self: &Arc<Self>, session_id: Uuid, mut child: Child) -> Result<u32, ProcessError> {
        let pid = child.id().ok_or_else(|| {
            ProcessError::Spawn(std::io::Error::new(
                std::io::ErrorKind::Other,
                "child has no pid; already reaped",
            ))
        })?;

        let stop_requested = Arc::new(AtomicBool::new(false));
        self.processes.lock().insert(
            pid,
            ProcessEntry {
                session_id,
                registered_at: Instant::now(),
                stop_requested: Arc::clone(&stop_requested),
            },
        );

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let wait_result = child.wait().await;
            registry.processes.lock().remove(&pid);

            let event = match wait_result {
                Ok(_status) if stop_requested.load(Ordering::SeqCst) => {
                    ProcessEvent::Stopped { session_id, pid }
                }
                Ok(status) => ProcessEvent::ExitedAbnormally {
                    session_id,
                    pid,
                    exit_code: status.code(),
                },
                Err(err) => {
                    warn!(pid, %err, "failed to wait on encoder process");
                    ProcessEvent::ExitedAbnormally {
                        session_id,
                        pid,
                        exit_code: None,
                    }
                }
            };
            let _ = registry.events_tx.send(event);
        });

        Ok(pid)
    }

    /// Forget a pid without signaling it. Used when a caller already knows
    /// the process is gone.
    pub fn unregister(&self, pid: u32) {
        self.processes.lock().remove(&pid);
    }

    /// Send `SIGTERM` to the process group rooted at the session's pid,
    /// then escalate to `SIGKILL` if it hasn't exited within `grace`.
    ///
    /// The reaper task spawned by `register` is what actually observes
    /// the exit and emits `ProcessEvent::Stopped`; this method only waits
    /// long enough to know whether `SIGKILL` is needed.
    pub async fn stop_by_session(
        &self,
        session_id: Uuid,
        grace: Duration,
    ) -> Result<(), ProcessError> {
        let found = {
            let processes = self.processes.lock();
            processes
                .iter()
                .find(|(_, entry)| entry.session_id == session_id)
                .map(|(pid, entry)| (*pid, Arc::clone(&entry.stop_requested)))
        };

        let Some((pid, stop_requested)) = found else {
            return Err(ProcessError::NotFound(session_id));
        };

        let _span = crate::telemetry::context::process_span("stop", pid).entered();
        stop_requested.store(true, Ordering::SeqCst);
        send_signal(pid, libc::SIGTERM)?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !self.processes.lock().contains_key(&pid) {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }

        if self.processes.lock().contains_key(&pid) {
            warn!(pid, "encoder did not exit within grace period, sending SIGKILL");
            crate::metrics::transcoding::FORCED_KILLS_TOTAL.inc();
            send_signal(pid, libc::SIGKILL)?;
        }

        Ok(())
    }

    /// Walk `<base>/*/pid` marker files left by a previous run and decide,
    /// for each, whether the process is still alive (adopt it — the
    /// caller is expected to re-register it) or dead (clean up the
    /// directory). Returns the session ids found still running.
    pub async fn reap_orphans(&self, base_dir: &Path) -> Result<Vec<Uuid>, ProcessError> {
        let mut adopted = Vec::new();
        let mut entries = match tokio::fs::read_dir(base_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(adopted),
            Err(err) => return Err(ProcessError::Io(err)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(ProcessError::Io)? {
            let marker = entry.path().join("pid");
            let Ok(contents) = tokio::fs::read_to_string(&marker).await else {
                continue;
            };
            let Some((pid_str, session_str)) = contents.trim().split_once(' ') else {
                continue;
            };
            let (Ok(pid), Ok(session_id)) =
                (pid_str.parse::<u32>(), session_str.parse::<Uuid>())
            else {
                continue;
            };

            if process_alive(pid) {
                info!(pid, %session_id, "adopting orphaned encoder process");
                adopted.push(session_id);
            } else {
                info!(pid, %session_id, "cleaning up stale session directory");
                let _ = tokio::fs::remove_dir_all(entry.path()).await;
            }
        }

        Ok(adopted)
    }
}

/// Signal the process group rooted at `pid`. Every encoder child is placed
/// into its own group at spawn time via `process_group(0)`, so a negative
/// pid here reaches the encoder and any helper processes it started.
fn send_signal(pid: u32, signal: i32) -> Result<(), ProcessError> {
    let pgid = -(pid as libc::pid_t);
    let result = unsafe { libc::kill(pgid, signal) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH just means the group is already gone.
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(ProcessError::Signal { pgid, source: err });
        }
    }
    Ok(())
}

fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn spawn_sleep(secs: u64) -> Child {
        Command::new("sleep")
            .arg(secs.to_string())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn sleep")
    }

    #[tokio::test]
    async fn register_tracks_until_exit() {
        let (registry, mut events) = ProcessRegistry::new();
        let session_id = Uuid::new_v4();
        let child = spawn_sleep(100);
        let pid = registry.register(session_id, child).unwrap();
        assert_eq!(registry.len(), 1);

        registry
            .stop_by_session(session_id, Duration::from_secs(2))
            .await
            .unwrap();

        let event = events.recv().await.expect("reaper should emit an event");
        match event {
            ProcessEvent::Stopped {
                session_id: sid,
                pid: p,
            } => {
                assert_eq!(sid, session_id);
                assert_eq!(p, pid);
            }
            other => panic!("expected Stopped, got {other:?}"),
        }
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn stop_by_session_unknown_session_errors() {
        let (registry, _events) = ProcessRegistry::new();
        let err = registry
            .stop_by_session(Uuid::new_v4(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound(_)));
    }

    #[test]
    fn current_process_is_alive() {
        assert!(process_alive(std::process::id()));
    }

    #[tokio::test]
    async fn reap_orphans_on_missing_dir_is_empty() {
        let (registry, _events) = ProcessRegistry::new();
        let result = registry
            .reap_orphans(Path::new("/nonexistent/viewra/transcoding"))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn reap_orphans_cleans_up_dead_markers() {
        let (registry, _events) = ProcessRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("mp4_ffmpeg_abc");
        tokio::fs::create_dir_all(&session_dir).await.unwrap();
        // A pid that is vanishingly unlikely to be alive.
        tokio::fs::write(session_dir.join("pid"), format!("999999 {}", Uuid::new_v4()))
            .await
            .unwrap();

        let adopted = registry.reap_orphans(dir.path()).await.unwrap();
        assert!(adopted.is_empty());
        assert!(!session_dir.exists());
    }
}
