//! Conversions between `viewra_core`'s domain types and `viewra_proto`'s
//! wire types. This is the one place in the system that knows about both.

use uuid::Uuid;
use viewra_core::models;
use viewra_proto::pb;

use crate::error::ProviderError;

pub fn container_to_wire(container: models::Container) -> i32 {
    let wire = match container {
        models::Container::Mp4 => pb::Container::Mp4,
        models::Container::WebM => pb::Container::Webm,
        models::Container::Mkv => pb::Container::Mkv,
        models::Container::Dash => pb::Container::Dash,
        models::Container::Hls => pb::Container::Hls,
    };
    wire as i32
}

pub fn container_from_wire(wire: i32) -> Option<models::Container> {
    match pb::Container::try_from(wire).ok()? {
        pb::Container::Mp4 => Some(models::Container::Mp4),
        pb::Container::Webm => Some(models::Container::WebM),
        pb::Container::Mkv => Some(models::Container::Mkv),
        pb::Container::Dash => Some(models::Container::Dash),
        pb::Container::Hls => Some(models::Container::Hls),
        pb::Container::ContainerUnspecified => None,
    }
}

fn speed_priority_to_wire(speed: models::SpeedPriority) -> i32 {
    let wire = match speed {
        models::SpeedPriority::Fastest => pb::SpeedPriority::Fastest,
        models::SpeedPriority::Balanced => pb::SpeedPriority::Balanced,
        models::SpeedPriority::Quality => pb::SpeedPriority::Quality,
    };
    wire as i32
}

pub fn request_to_wire(request: &models::TranscodeRequest) -> pb::TranscodeRequest {
    pb::TranscodeRequest {
        input_path: request.input_path.clone(),
        session_id: request.session_id.to_string(),
        container: container_to_wire(request.container),
        video_codec: request.video_codec.clone(),
        audio_codec: request.audio_codec.clone(),
        quality: u32::from(request.quality),
        speed_priority: speed_priority_to_wire(request.speed_priority),
        resolution: request.resolution.map(|r| pb::Resolution {
            width: r.width,
            height: r.height,
        }),
        seek_seconds: request.seek_seconds,
        enable_abr: request.enable_abr,
        prefer_hardware: request.prefer_hardware,
        hardware_type: request.hardware_type.clone(),
    }
}

pub fn progress_from_wire(wire: pb::ProgressInfo) -> models::ProgressInfo {
    models::ProgressInfo {
        percent: wire.percent.min(100) as u8,
        elapsed_seconds: wire.elapsed_seconds,
        speed: wire.speed,
        bytes_written: wire.bytes_written,
    }
}

pub fn provider_info_from_wire(wire: pb::ProviderInfo) -> models::ProviderInfo {
    models::ProviderInfo {
        id: wire.id,
        name: wire.name,
        version: wire.version,
        priority: wire.priority,
        capabilities: wire.capabilities,
    }
}

pub fn session_id_from_wire(method: &'static str, provider_id: &str, raw: &str) -> crate::error::Result<Uuid> {
    raw.parse::<Uuid>().map_err(|_| ProviderError::Rpc {
        provider_id: provider_id.to_string(),
        method,
        source: tonic::Status::invalid_argument(format!("malformed session id {raw:?} from provider")),
    })
}
