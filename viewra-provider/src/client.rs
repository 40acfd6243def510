//! Typed, instrumented wrapper over the eight `TranscodeProvider` RPCs.
//!
//! Every call goes through `timed`, which opens a span via
//! `viewra_core::telemetry::context::grpc_span` and records
//! `provider::RPC_DURATION_SECONDS`.

use std::future::Future;
use std::time::Instant;
use tonic::transport::Channel;
use uuid::Uuid;
use viewra_core::models::{Container, ProgressInfo, ProviderInfo, TranscodeRequest};
use viewra_core::metrics::provider::RPC_DURATION_SECONDS;
use viewra_proto::pb;
use viewra_proto::TranscodeProviderClient;

use crate::convert::{
    container_from_wire, progress_from_wire, provider_info_from_wire, request_to_wire,
    session_id_from_wire,
};
use crate::error::{ProviderError, Result};

pub struct ProviderClient {
    provider_id: String,
    inner: TranscodeProviderClient<Channel>,
}

impl ProviderClient {
    #[must_use]
    pub fn new(provider_id: String, channel: Channel) -> Self {
        Self {
            provider_id,
            inner: TranscodeProviderClient::new(channel),
        }
    }

    pub async fn get_info(&mut self) -> Result<ProviderInfo> {
        let provider_id = self.provider_id.clone();
        let resp = timed("GetInfo", &provider_id, self.inner.get_info(pb::Empty {})).await?;
        Ok(provider_info_from_wire(resp.into_inner()))
    }

    pub async fn get_supported_formats(&mut self) -> Result<Vec<Container>> {
        let provider_id = self.provider_id.clone();
        let resp = timed(
            "GetSupportedFormats",
            &provider_id,
            self.inner.get_supported_formats(pb::Empty {}),
        )
        .await?;
        Ok(resp
            .into_inner()
            .formats
            .into_iter()
            .filter_map(container_from_wire)
            .collect())
    }

    pub async fn start_transcode(&mut self, request: &TranscodeRequest) -> Result<Uuid> {
        let provider_id = self.provider_id.clone();
        let wire = request_to_wire(request);
        let resp = timed("StartTranscode", &provider_id, self.inner.start_transcode(wire)).await?;
        session_id_from_wire("StartTranscode", &provider_id, &resp.into_inner().session_id)
    }

    pub async fn get_progress(&mut self, session_id: Uuid) -> Result<ProgressInfo> {
        let provider_id = self.provider_id.clone();
        let req = pb::GetProgressRequest {
            session_id: session_id.to_string(),
        };
        let resp = timed("GetProgress", &provider_id, self.inner.get_progress(req)).await?;
        Ok(progress_from_wire(resp.into_inner()))
    }

    pub async fn stop_transcode(&mut self, session_id: Uuid) -> Result<()> {
        let provider_id = self.provider_id.clone();
        let req = pb::StopRequest {
            session_id: session_id.to_string(),
        };
        timed("StopTranscode", &provider_id, self.inner.stop_transcode(req)).await?;
        Ok(())
    }

    pub async fn start_stream(&mut self, request: &TranscodeRequest) -> Result<(Uuid, String)> {
        let provider_id = self.provider_id.clone();
        let wire = request_to_wire(request);
        let resp = timed("StartStream", &provider_id, self.inner.start_stream(wire)).await?;
        let handle = resp.into_inner();
        let session_id = session_id_from_wire("StartStream", &provider_id, &handle.session_id)?;
        Ok((session_id, handle.manifest_path))
    }

    pub async fn get_stream(&mut self, session_id: Uuid) -> Result<tonic::Streaming<pb::StreamChunk>> {
        let provider_id = self.provider_id.clone();
        let req = pb::GetStreamRequest {
            session_id: session_id.to_string(),
        };
        let resp = timed("GetStream", &provider_id, self.inner.get_stream(req)).await?;
        Ok(resp.into_inner())
    }

    pub async fn stop_stream(&mut self, session_id: Uuid) -> Result<()> {
        let provider_id = self.provider_id.clone();
        let req = pb::StopRequest {
            session_id: session_id.to_string(),
        };
        timed("StopStream", &provider_id, self.inner.stop_stream(req)).await?;
        Ok(())
    }
}

async fn timed<T>(
    method: &'static str,
    provider_id: &str,
    call: impl Future<Output = std::result::Result<tonic::Response<T>, tonic::Status>>,
) -> Result<tonic::Response<T>> {
    let _span = viewra_core::telemetry::context::grpc_span(method, provider_id).entered();
    let start = Instant::now();
    let result = tokio::time::timeout(viewra_core::resilience::timeout::GRPC_CALL_TIMEOUT, call).await;
    let outcome = if matches!(result, Ok(Ok(_))) { "ok" } else { "error" };
    RPC_DURATION_SECONDS
        .with_label_values(&[method, outcome])
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(inner) => inner.map_err(|source| ProviderError::Rpc {
            provider_id: provider_id.to_string(),
            method,
            source,
        }),
        Err(_elapsed) => Err(ProviderError::Rpc {
            provider_id: provider_id.to_string(),
            method,
            source: tonic::Status::deadline_exceeded(format!(
                "{method} exceeded {:?}",
                viewra_core::resilience::timeout::GRPC_CALL_TIMEOUT
            )),
        }),
    }
}
