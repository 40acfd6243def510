//! `/playback/*` HTTP surface (spec.md §6). Thin handlers — all decision and
//! lifecycle logic lives in `viewra_playback::PlaybackController` and
//! `viewra_playback::decide`; these just translate JSON <-> domain types and
//! serve bytes out of a session's output directory.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use viewra_core::models::{ProviderInfo, TranscodeRequest};
use viewra_playback::{decide, DeviceProfile, MediaInfo, PlaybackDecision};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/playback/decide", post(decide_handler))
        .route("/playback/start", post(start_handler))
        .route("/playback/stream/{sid}/{filename}", get(stream_file_handler))
        .route("/playback/seek-ahead", post(seek_ahead_handler))
        .route("/playback/session/{sid}", delete(stop_session_handler))
        .route("/playback/plugins/refresh", post(refresh_plugins_handler))
        .route("/playback/stats", get(stats_handler))
}

#[derive(Debug, Deserialize)]
struct DecideRequest {
    media_path: String,
    device_profile: DeviceProfile,
}

async fn decide_handler(
    State(state): State<AppState>,
    Json(body): Json<DecideRequest>,
) -> AppResult<Json<PlaybackDecision>> {
    let media_info: MediaInfo =
        viewra_playback::probe(&state.transcoding.ffprobe_path.to_string_lossy(), FsPath::new(&body.media_path)).await?;

    let mut decision = decide(&media_info, &body.device_profile);
    if decision.should_transcode {
        if let Some(params) = decision.transcode_params.as_mut() {
            params.input_path = body.media_path.clone();
        }
    } else {
        decision.direct_play_url = Some(body.media_path.clone());
    }

    Ok(Json(decision))
}

#[derive(Debug, Serialize)]
struct StartResponse {
    id: Uuid,
    manifest_url: String,
}

async fn start_handler(
    State(state): State<AppState>,
    Json(request): Json<TranscodeRequest>,
) -> AppResult<Json<StartResponse>> {
    viewra_core::validation::validate_request(&request)?;

    let (session_id, manifest_filename) = state.controller.start_stream(request).await?;
    Ok(Json(StartResponse {
        id: session_id,
        manifest_url: format!("/playback/stream/{session_id}/{manifest_filename}"),
    }))
}

/// Covers both `manifest.{mpd|m3u8}` and individual segment requests —
/// both are just filenames under the session's output directory.
async fn stream_file_handler(
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
) -> AppResult<Response> {
    serve_session_file(&state, &sid, &filename).await
}

/// Serves a file directly out of the session's output directory — the
/// core and the provider plugin agree on `transcoding_dir` through
/// identical config, not shared memory, so there's no RPC round-trip for
/// bytes that are already sitting on disk (spec.md §2's data-flow note).
async fn serve_session_file(state: &AppState, sid: &str, filename: &str) -> AppResult<Response> {
    let session_id: Uuid = sid.parse().map_err(|_| AppError::bad_request("malformed session id"))?;
    let session = state
        .controller
        .get_session(session_id)
        .ok_or_else(|| AppError::not_found(format!("session {session_id} not found")))?;

    if filename.contains("..") || filename.contains('/') {
        return Err(AppError::bad_request("invalid filename"));
    }

    let path: PathBuf = session.output_dir.join(filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::not_found(format!("{filename} not yet available")))?;

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type_for(filename))],
        body,
    )
        .into_response())
}

fn content_type_for(filename: &str) -> &'static str {
    if filename.ends_with(".mpd") {
        "application/dash+xml"
    } else if filename.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if filename.ends_with(".m4s") || filename.ends_with(".mp4") {
        "video/mp4"
    } else if filename.ends_with(".ts") {
        "video/mp2t"
    } else {
        "application/octet-stream"
    }
}

#[derive(Debug, Deserialize)]
struct SeekAheadRequest {
    session_id: Uuid,
    seek_time: f64,
    /// Not part of spec.md's wire shape; lets a client that tracks its own
    /// identity across a chain of seeks opt into the tie-break rule
    /// properly. Defaults to the old session id, which still gives correct
    /// single-seek behavior.
    client_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SeekAheadResponse {
    session_id: Uuid,
    manifest_url: String,
}

async fn seek_ahead_handler(
    State(state): State<AppState>,
    Json(body): Json<SeekAheadRequest>,
) -> AppResult<Json<SeekAheadResponse>> {
    let client_id = body.client_id.unwrap_or_else(|| body.session_id.to_string());
    let (new_session_id, manifest_filename) = state
        .controller
        .seek_ahead(&client_id, body.session_id, body.seek_time)
        .await?;

    Ok(Json(SeekAheadResponse {
        session_id: new_session_id,
        manifest_url: format!("/playback/stream/{new_session_id}/{manifest_filename}"),
    }))
}

async fn stop_session_handler(State(state): State<AppState>, Path(sid): Path<Uuid>) -> AppResult<StatusCode> {
    if state.controller.get_session(sid).is_none() {
        return Err(AppError::not_found(format!("session {sid} not found")));
    }
    state.controller.stop_session(sid).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_plugins_handler(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.providers.refresh().await.map_err(|err| {
        tracing::error!(%err, "plugin refresh failed");
        AppError::internal(err.to_string())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    backends: Vec<ProviderInfo>,
    available_providers: usize,
    active_sessions: usize,
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let mut backends = Vec::new();
    for provider_id in state.providers.provider_ids() {
        if let Some(mut client) = state.providers.provider_client(&provider_id) {
            if let Ok(info) = client.get_info().await {
                backends.push(info);
            }
        }
    }

    let active_sessions = state
        .controller
        .all_sessions()
        .into_iter()
        .filter(|s| !s.is_terminal())
        .count();

    Json(StatsResponse {
        available_providers: state.providers.len(),
        backends,
        active_sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use viewra_core::config::TranscodingConfig;
    use viewra_core::models::Container;
    use viewra_core::session::SessionManager;
    use viewra_playback::manifest_poll::PollSchedule;
    use viewra_provider::ProviderPool;

    fn test_state(base_dir: std::path::PathBuf) -> AppState {
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(60)));
        let (providers, _events) = ProviderPool::new(base_dir.clone(), Duration::from_secs(5));
        let providers = Arc::new(providers);
        let controller = Arc::new(PlaybackController::new(
            sessions,
            providers.clone(),
            base_dir,
            PollSchedule::from_config(&TranscodingConfig::default()),
            Duration::from_secs(5),
        ));
        AppState {
            controller,
            providers,
            transcoding: Arc::new(TranscodingConfig::default()),
        }
    }

    #[test]
    fn content_type_matches_known_extensions() {
        assert_eq!(content_type_for("manifest.mpd"), "application/dash+xml");
        assert_eq!(content_type_for("manifest.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("chunk-0.m4s"), "video/mp4");
        assert_eq!(content_type_for("segment0.ts"), "video/mp2t");
        assert_eq!(content_type_for("whatever.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn serve_session_file_rejects_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        assert!(state.controller.all_sessions().is_empty());

        let err = serve_session_file(&state, &Uuid::new_v4().to_string(), "../escape").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn serve_session_file_reads_bytes_from_output_dir() {
        let dir = tempfile::tempdir().unwrap();

        let sessions = SessionManager::new(Duration::from_secs(60));
        let session = sessions.create(Container::Dash, "ffmpeg".to_string(), dir.path());
        tokio::fs::create_dir_all(&session.output_dir).await.unwrap();
        tokio::fs::write(session.output_dir.join("manifest.mpd"), b"<MPD/>")
            .await
            .unwrap();

        let (providers, _events) = ProviderPool::new(dir.path().to_path_buf(), Duration::from_secs(5));
        let providers = Arc::new(providers);
        let controller = Arc::new(PlaybackController::new(
            Arc::new(sessions),
            providers.clone(),
            dir.path().to_path_buf(),
            PollSchedule::from_config(&TranscodingConfig::default()),
            Duration::from_secs(5),
        ));
        let state = AppState {
            controller,
            providers,
            transcoding: Arc::new(TranscodingConfig::default()),
        };

        let response = serve_session_file(&state, &session.id.to_string(), "manifest.mpd")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serve_session_file_rejects_malformed_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let err = serve_session_file(&state, "not-a-uuid", "manifest.mpd").await;
        assert!(err.is_err());
    }
}
