//! Wire-to-domain conversions for the plugin side of the C5 boundary — the
//! mirror image of `viewra_provider::convert`, which only ever goes
//! domain-to-wire. Kept separate rather than shared so this binary doesn't
//! need to depend on `viewra-provider` for anything but `PluginManifest`.

use viewra_core::models;
use viewra_proto::pb;

use crate::error::PluginError;

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

fn speed_priority_from_wire(wire: i32) -> models::SpeedPriority {
    match pb::SpeedPriority::try_from(wire).unwrap_or(pb::SpeedPriority::Balanced) {
        pb::SpeedPriority::Fastest => models::SpeedPriority::Fastest,
        pb::SpeedPriority::Quality => models::SpeedPriority::Quality,
        pb::SpeedPriority::Balanced | pb::SpeedPriority::SpeedUnspecified => models::SpeedPriority::Balanced,
    }
}

pub fn request_from_wire(wire: pb::TranscodeRequest) -> Result<models::TranscodeRequest, PluginError> {
    let container = container_from_wire(wire.container)
        .ok_or_else(|| PluginError::MalformedRequest("unknown container".to_string()))?;
    let session_id = wire
        .session_id
        .parse::<uuid::Uuid>()
        .map_err(|_| PluginError::MalformedRequest(format!("malformed session id {:?}", wire.session_id)))?;

    Ok(models::TranscodeRequest {
        input_path: wire.input_path,
        session_id,
        container,
        video_codec: wire.video_codec,
        audio_codec: wire.audio_codec,
        quality: wire.quality.min(100) as u8,
        speed_priority: speed_priority_from_wire(wire.speed_priority),
        resolution: wire.resolution.map(|r| models::Resolution {
            width: r.width,
            height: r.height,
        }),
        seek_seconds: wire.seek_seconds,
        enable_abr: wire.enable_abr,
        prefer_hardware: wire.prefer_hardware,
        hardware_type: wire.hardware_type,
    })
}

pub fn progress_to_wire(info: models::ProgressInfo) -> pb::ProgressInfo {
    pb::ProgressInfo {
        percent: u32::from(info.percent),
        elapsed_seconds: info.elapsed_seconds,
        speed: info.speed,
        bytes_written: info.bytes_written,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINERS: [models::Container; 5] = [
        models::Container::Mp4,
        models::Container::WebM,
        models::Container::Mkv,
        models::Container::Dash,
        models::Container::Hls,
    ];

    #[test]
    fn container_wire_roundtrip() {
        for container in CONTAINERS {
            let wire = container_to_wire(container);
            assert_eq!(container_from_wire(wire), Some(container));
        }
    }

    #[test]
    fn container_unspecified_is_none() {
        assert_eq!(container_from_wire(pb::Container::ContainerUnspecified as i32), None);
    }

    fn sample_wire_request() -> pb::TranscodeRequest {
        pb::TranscodeRequest {
            input_path: "/media/movie.mkv".to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
            container: pb::Container::Dash as i32,
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            quality: 70,
            speed_priority: pb::SpeedPriority::Balanced as i32,
            resolution: None,
            seek_seconds: None,
            enable_abr: true,
            prefer_hardware: false,
            hardware_type: None,
        }
    }

    #[test]
    fn request_from_wire_converts_valid_request() {
        let wire = sample_wire_request();
        let request = request_from_wire(wire).unwrap();
        assert_eq!(request.container, models::Container::Dash);
        assert_eq!(request.video_codec, "h264");
    }

    #[test]
    fn request_from_wire_rejects_malformed_session_id() {
        let mut wire = sample_wire_request();
        wire.session_id = "not-a-uuid".to_string();
        assert!(request_from_wire(wire).is_err());
    }

    #[test]
    fn request_from_wire_rejects_unspecified_container() {
        let mut wire = sample_wire_request();
        wire.container = pb::Container::ContainerUnspecified as i32;
        assert!(request_from_wire(wire).is_err());
    }

    #[test]
    fn progress_to_wire_carries_fields_through() {
        let info = models::ProgressInfo {
            percent: 42,
            elapsed_seconds: 12.5,
            speed: 1.3,
            bytes_written: 1024,
        };
        let wire = progress_to_wire(info);
        assert_eq!(wire.percent, 42);
        assert_eq!(wire.bytes_written, 1024);
    }
}
