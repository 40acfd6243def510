//! Tails the key=value lines ffmpeg's `-progress <path> -nostats` writes,
//! keeping a richer `ProgressInfo` per session than the plain
//! `(percent, Instant)` pair `viewra_core::session::Session` tracks — the
//! session manager's copy is updated too, so `/playback/stats` stays
//! consistent either way a caller asks.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use uuid::Uuid;
use viewra_core::models::ProgressInfo;
use viewra_core::session::SessionManager;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Spawns a background task that tails `progress_path` until ffmpeg reports
/// `progress=end` or the session is torn down from elsewhere (stopped,
/// crashed). Never fails loudly — a missing or unreadable progress file
/// just means progress stays at its last known value.
pub fn spawn_tracker(
    table: Arc<DashMap<Uuid, ProgressInfo>>,
    sessions: Arc<SessionManager>,
    session_id: Uuid,
    progress_path: PathBuf,
    source_duration_seconds: Option<f64>,
) {
    table.insert(
        session_id,
        ProgressInfo {
            percent: 0,
            elapsed_seconds: 0.0,
            speed: 0.0,
            bytes_written: 0,
        },
    );

    tokio::spawn(async move {
        let file = loop {
            match File::open(&progress_path).await {
                Ok(file) => break file,
                Err(_) if session_still_live(&sessions, session_id) => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(_) => return,
            }
        };

        let mut lines = BufReader::new(file).lines();
        let started = Instant::now();
        let mut out_time_seconds = 0.0_f64;
        let mut speed = 0.0_f64;
        let mut bytes_written = 0_u64;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some((key, value)) = line.split_once('=') else {
                        continue;
                    };
                    let value = value.trim();
                    match key {
                        "out_time_ms" => {
                            if let Ok(us) = value.parse::<i64>() {
                                out_time_seconds = (us.max(0) as f64) / 1_000_000.0;
                            }
                        }
                        "speed" => speed = value.trim_end_matches('x').parse().unwrap_or(speed),
                        "total_size" => bytes_written = value.parse().unwrap_or(bytes_written),
                        "progress" if value == "end" => {
                            publish(&table, &sessions, session_id, 100, started.elapsed(), speed, bytes_written);
                            return;
                        }
                        _ => continue,
                    }

                    let percent = source_duration_seconds
                        .filter(|d| *d > 0.0)
                        .map_or(0, |d| ((out_time_seconds / d) * 100.0).clamp(0.0, 100.0) as u8);
                    publish(&table, &sessions, session_id, percent, started.elapsed(), speed, bytes_written);
                }
                Ok(None) if session_still_live(&sessions, session_id) => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Ok(None) => return,
                Err(err) => {
                    warn!(%session_id, %err, "progress file tail failed");
                    return;
                }
            }
        }
    });
}

fn session_still_live(sessions: &SessionManager, session_id: Uuid) -> bool {
    sessions.get(session_id).is_some_and(|s| !s.is_terminal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use viewra_core::models::Container;

    #[test]
    fn pending_session_is_live() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        let session = sessions.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        assert!(session_still_live(&sessions, session.id));
    }

    #[test]
    fn stopped_session_is_not_live() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        let session = sessions.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        sessions.stop(session.id).unwrap();
        assert!(!session_still_live(&sessions, session.id));
    }

    #[test]
    fn unknown_session_is_not_live() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        assert!(!session_still_live(&sessions, Uuid::new_v4()));
    }

    #[test]
    fn publish_updates_table_and_session_progress() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        let session = sessions.create(Container::Mp4, "ffmpeg".to_string(), &PathBuf::from("/tmp"));
        sessions.mark_starting(session.id).unwrap();
        sessions.mark_running(session.id).unwrap();

        let table = DashMap::new();
        publish(&table, &sessions, session.id, 55, Duration::from_secs(3), 1.2, 4096);

        let info = table.get(&session.id).unwrap();
        assert_eq!(info.percent, 55);
        assert_eq!(info.bytes_written, 4096);

        let updated = sessions.get(session.id).unwrap();
        assert_eq!(updated.progress.unwrap().0, 55);
    }
}

fn publish(
    table: &DashMap<Uuid, ProgressInfo>,
    sessions: &SessionManager,
    session_id: Uuid,
    percent: u8,
    elapsed: Duration,
    speed: f64,
    bytes_written: u64,
) {
    table.insert(
        session_id,
        ProgressInfo {
            percent,
            elapsed_seconds: elapsed.as_secs_f64(),
            speed,
            bytes_written,
        },
    );
    let _ = sessions.update_progress(session_id, percent);
}
