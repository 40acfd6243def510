//! `TranscodeProviderService`: the ffmpeg-backed implementation of the
//! eight-RPC `TranscodeProvider` surface (spec.md §4.5). Each session spawns
//! its own `ffmpeg` child via `viewra_core::encoder::build_argv`, tracked by
//! this process's own `ProcessRegistry`/`SessionManager` pair — independent
//! of whatever the core's C2/C4 are doing with the same session id.

use dashmap::DashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};
use tracing::{info, warn};
use uuid::Uuid;

use viewra_core::config::TranscodingConfig;
use viewra_core::encoder::build_argv;
use viewra_core::models::{self, ProgressInfo};
use viewra_core::process::ProcessRegistry;
use viewra_core::session::{Session, SessionManager};
use viewra_proto::pb;
use viewra_proto::TranscodeProvider;
use viewra_provider::PluginManifest;

use crate::convert::{container_to_wire, progress_to_wire, request_from_wire};
use crate::error::PluginError;
use crate::{paths, probe, progress};

type ResponseStream = Pin<Box<dyn Stream<Item = Result<pb::StreamChunk, Status>> + Send>>;

const CHUNK_SIZE: usize = 64 * 1024;

pub struct TranscodeProviderService {
    manifest: PluginManifest,
    config: Arc<TranscodingConfig>,
    sessions: Arc<SessionManager>,
    processes: Arc<ProcessRegistry>,
    progress: Arc<DashMap<Uuid, ProgressInfo>>,
}

impl TranscodeProviderService {
    #[must_use]
    pub fn new(
        manifest: PluginManifest,
        config: Arc<TranscodingConfig>,
        sessions: Arc<SessionManager>,
        processes: Arc<ProcessRegistry>,
    ) -> Self {
        Self {
            manifest,
            config,
            sessions,
            processes,
            progress: Arc::new(DashMap::new()),
        }
    }

    async fn spawn_session(&self, wire: pb::TranscodeRequest) -> Result<Session, PluginError> {
        let request = request_from_wire(wire)?;
        let session = self.sessions.create_with_id(
            request.session_id,
            request.container,
            self.manifest.id.clone(),
            &self.config.transcoding_dir,
        );
        tokio::fs::create_dir_all(&session.output_dir).await?;

        let output_path = paths::output_path(&session.output_dir, request.container);
        let progress_path = paths::progress_path(&session.output_dir);

        let mut argv = build_argv(&request, &output_path).map_err(viewra_core::Error::from)?;
        argv.splice(
            0..0,
            [
                "-progress".to_string(),
                progress_path.to_string_lossy().into_owned(),
                "-nostats".to_string(),
            ],
        );

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&argv)
            .process_group(0)
            .kill_on_drop(true)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(if self.config.ffmpeg_debug {
                std::process::Stdio::inherit()
            } else {
                std::process::Stdio::null()
            })
            .spawn()
            .map_err(viewra_core::error::ProcessError::Spawn)
            .map_err(viewra_core::Error::from)?;

        let pid = child
            .id()
            .ok_or_else(|| PluginError::MalformedRequest("encoder exited before it could be registered".to_string()))?;
        tokio::fs::write(paths::pid_marker_path(&session.output_dir), format!("{pid} {}", session.id)).await?;

        self.processes.register(session.id, child).map_err(viewra_core::Error::from)?;
        info!(session_id = %session.id, pid, "encoder process spawned");

        self.sessions.mark_starting(session.id).map_err(viewra_core::Error::from)?;
        self.sessions.mark_running(session.id).map_err(viewra_core::Error::from)?;

        let duration = probe::duration_seconds(&self.config.ffprobe_path, &request.input_path).await;
        progress::spawn_tracker(
            Arc::clone(&self.progress),
            Arc::clone(&self.sessions),
            session.id,
            progress_path,
            duration,
        );

        Ok(self.sessions.get(session.id).unwrap_or(session))
    }

    async fn stop_session(&self, session_id: Uuid) -> Result<(), Status> {
        match self.processes.stop_by_session(session_id, self.config.signal_grace).await {
            Ok(()) | Err(viewra_core::error::ProcessError::NotFound(_)) => {}
            Err(err) => warn!(%session_id, %err, "failed to signal encoder process"),
        }
        self.progress.remove(&session_id);
        Ok(())
    }

    fn progress_snapshot(&self, session_id: Uuid) -> Result<ProgressInfo, Status> {
        if let Some(tracked) = self.progress.get(&session_id) {
            return Ok(*tracked);
        }
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Status::from(PluginError::SessionNotFound(session_id)))?;
        let percent = session.progress.map_or(0, |(p, _)| p);
        Ok(ProgressInfo {
            percent,
            elapsed_seconds: 0.0,
            speed: 0.0,
            bytes_written: 0,
        })
    }
}

fn session_id_from_str(raw: &str) -> Result<Uuid, Status> {
    raw.parse()
        .map_err(|_| Status::invalid_argument(format!("malformed session id {raw:?}")))
}

#[tonic::async_trait]
impl TranscodeProvider for TranscodeProviderService {
    async fn get_info(&self, _request: Request<pb::Empty>) -> Result<Response<pb::ProviderInfo>, Status> {
        Ok(Response::new(pb::ProviderInfo {
            id: self.manifest.id.clone(),
            name: self.manifest.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            priority: self.manifest.priority,
            capabilities: self.manifest.capabilities.clone(),
        }))
    }

    async fn get_supported_formats(
        &self,
        _request: Request<pb::Empty>,
    ) -> Result<Response<pb::GetSupportedFormatsResponse>, Status> {
        let formats = self
            .manifest
            .capabilities
            .iter()
            .filter_map(|token| token.parse::<models::Container>().ok())
            .map(container_to_wire)
            .collect();
        Ok(Response::new(pb::GetSupportedFormatsResponse { formats }))
    }

    async fn start_transcode(
        &self,
        request: Request<pb::TranscodeRequest>,
    ) -> Result<Response<pb::TranscodeHandle>, Status> {
        let session = self.spawn_session(request.into_inner()).await?;
        Ok(Response::new(pb::TranscodeHandle {
            session_id: session.id.to_string(),
            provider_id: self.manifest.id.clone(),
        }))
    }

    async fn get_progress(
        &self,
        request: Request<pb::GetProgressRequest>,
    ) -> Result<Response<pb::ProgressInfo>, Status> {
        let session_id = session_id_from_str(&request.into_inner().session_id)?;
        Ok(Response::new(progress_to_wire(self.progress_snapshot(session_id)?)))
    }

    async fn stop_transcode(&self, request: Request<pb::StopRequest>) -> Result<Response<pb::Empty>, Status> {
        let session_id = session_id_from_str(&request.into_inner().session_id)?;
        self.stop_session(session_id).await?;
        Ok(Response::new(pb::Empty {}))
    }

    async fn start_stream(&self, request: Request<pb::TranscodeRequest>) -> Result<Response<pb::StreamHandle>, Status> {
        let session = self.spawn_session(request.into_inner()).await?;
        Ok(Response::new(pb::StreamHandle {
            session_id: session.id.to_string(),
            manifest_path: paths::output_filename(session.container),
        }))
    }

    type GetStreamStream = ResponseStream;

    async fn get_stream(
        &self,
        request: Request<pb::GetStreamRequest>,
    ) -> Result<Response<Self::GetStreamStream>, Status> {
        let session_id = session_id_from_str(&request.into_inner().session_id)?;
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Status::from(PluginError::SessionNotFound(session_id)))?;
        let file_path = paths::output_path(&session.output_dir, session.container);
        let sessions = Arc::clone(&self.sessions);

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            if let Err(err) = relay_growing_file(&file_path, session_id, &sessions, &tx).await {
                let _ = tx.send(Err(err)).await;
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx)) as Self::GetStreamStream))
    }

    async fn stop_stream(&self, request: Request<pb::StopRequest>) -> Result<Response<pb::Empty>, Status> {
        let session_id = session_id_from_str(&request.into_inner().session_id)?;
        self.stop_session(session_id).await?;
        Ok(Response::new(pb::Empty {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewra_provider::PluginManifest;

    fn test_service() -> TranscodeProviderService {
        let manifest = PluginManifest {
            id: "ffmpeg".to_string(),
            name: "ffmpeg provider".to_string(),
            kind: "transcode".to_string(),
            capabilities: vec!["mp4".to_string(), "dash".to_string(), "bogus".to_string()],
            priority: 10,
        };
        let (processes, _events) = ProcessRegistry::new();
        TranscodeProviderService::new(
            manifest,
            Arc::new(TranscodingConfig::default()),
            Arc::new(SessionManager::new(Duration::from_secs(60))),
            processes,
        )
    }

    #[test]
    fn session_id_from_str_rejects_garbage() {
        assert!(session_id_from_str("not-a-uuid").is_err());
        assert!(session_id_from_str(&Uuid::new_v4().to_string()).is_ok());
    }

    #[tokio::test]
    async fn get_info_reports_manifest_fields() {
        let service = test_service();
        let response = service.get_info(Request::new(pb::Empty {})).await.unwrap();
        let info = response.into_inner();
        assert_eq!(info.id, "ffmpeg");
        assert_eq!(info.priority, 10);
    }

    #[tokio::test]
    async fn get_supported_formats_skips_unparseable_capabilities() {
        let service = test_service();
        let response = service
            .get_supported_formats(Request::new(pb::Empty {}))
            .await
            .unwrap();
        let formats = response.into_inner().formats;
        assert_eq!(formats.len(), 2);
        assert!(formats.contains(&(pb::Container::Mp4 as i32)));
        assert!(formats.contains(&(pb::Container::Dash as i32)));
    }

    #[tokio::test]
    async fn get_progress_on_unknown_session_is_not_found() {
        let service = test_service();
        let err = service
            .get_progress(Request::new(pb::GetProgressRequest {
                session_id: Uuid::new_v4().to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn get_progress_rejects_malformed_session_id() {
        let service = test_service();
        let err = service
            .get_progress(Request::new(pb::GetProgressRequest {
                session_id: "not-a-uuid".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}

/// Streams `file_path` to `tx` in chunks, following growth until `session_id`
/// reaches a terminal state and the file stops growing — the same
/// open-and-poll idiom `manifest_is_ready` uses for readiness, generalized
/// to content instead of a single existence check.
async fn relay_growing_file(
    file_path: &Path,
    session_id: Uuid,
    sessions: &SessionManager,
    tx: &tokio::sync::mpsc::Sender<Result<pb::StreamChunk, Status>>,
) -> Result<(), Status> {
    let mut file = loop {
        match tokio::fs::File::open(file_path).await {
            Ok(file) => break file,
            Err(_) if sessions.get(session_id).is_some_and(|s| !s.is_terminal()) => {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(err) => return Err(Status::internal(err.to_string())),
        }
    };

    let mut buf = vec![0_u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await.map_err(|err| Status::internal(err.to_string()))?;
        if read > 0 {
            if tx.send(Ok(pb::StreamChunk { data: buf[..read].to_vec() })).await.is_err() {
                return Ok(());
            }
            continue;
        }

        if sessions.get(session_id).is_none_or(|s| s.is_terminal()) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
