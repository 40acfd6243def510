//! Pure direct-play / transcode decision (spec.md §4.4's decision
//! algorithm). No I/O — `media_info` is probed beforehand, `device_profile`
//! is supplied by the caller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use viewra_core::models::{Container, Resolution, SpeedPriority, TranscodeRequest};

use crate::device_profile::DeviceProfile;
use crate::media_info::MediaInfo;

/// Quality fed to newly-built transcode requests when the decider, not an
/// explicit caller preference, picks the target. 65 is the nominal quality
/// C3's ABR ladder scales bitrates against.
const DEFAULT_QUALITY: u8 = 65;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackDecision {
    pub should_transcode: bool,
    pub reason: String,
    pub direct_play_url: Option<String>,
    pub stream_url: String,
    pub manifest_url: Option<String>,
    pub media_info: MediaInfo,
    pub transcode_params: Option<TranscodeRequest>,
    pub session_id: Option<Uuid>,
}

/// `direct_play_url` and `stream_url` are filled in by the caller (the HTTP
/// layer knows the request's base path); this function only decides whether
/// to transcode and what target parameters to use if so.
#[must_use]
pub fn decide(media_info: &MediaInfo, device_profile: &DeviceProfile) -> PlaybackDecision {
    let source_container = source_container_token(&media_info.container);

    let direct_play_eligible = source_container
        .and_then(|token| token.parse::<Container>().ok())
        .is_some_and(|container| device_profile.supports_container(container))
        && media_info
            .video_codec
            .as_deref()
            .is_some_and(|codec| device_profile.supports_video_codec(codec))
        && media_info
            .audio_codec
            .as_deref()
            .is_some_and(|codec| device_profile.supports_audio_codec(codec))
        && media_info
            .resolution
            .map_or(true, |res| fits_within(res, device_profile.max_resolution))
        && media_info.bitrate_kbps <= device_profile.max_bitrate_kbps;

    if direct_play_eligible {
        return PlaybackDecision {
            should_transcode: false,
            reason: "source format is directly playable on this device".to_string(),
            direct_play_url: Some(String::new()),
            stream_url: String::new(),
            manifest_url: None,
            media_info: media_info.clone(),
            transcode_params: None,
            session_id: None,
        };
    }

    let container = device_profile.preferred_container();
    let resolution = media_info.resolution.map(|source| {
        if fits_within(source, device_profile.max_resolution) {
            source
        } else {
            scale_to_fit(source, device_profile.max_resolution)
        }
    });

    let transcode_params = TranscodeRequest {
        input_path: String::new(),
        session_id: Uuid::new_v4(),
        container,
        video_codec: device_profile.preferred_video_codec(),
        audio_codec: device_profile.preferred_audio_codec(),
        quality: DEFAULT_QUALITY,
        speed_priority: SpeedPriority::Balanced,
        resolution,
        seek_seconds: None,
        enable_abr: container.is_segmented(),
        prefer_hardware: false,
        hardware_type: None,
    };

    PlaybackDecision {
        should_transcode: true,
        reason: reason_for_transcode(media_info, device_profile),
        direct_play_url: None,
        stream_url: String::new(),
        manifest_url: None,
        media_info: media_info.clone(),
        transcode_params: Some(transcode_params),
        session_id: None,
    }
}

fn reason_for_transcode(media_info: &MediaInfo, device_profile: &DeviceProfile) -> String {
    if media_info.bitrate_kbps > device_profile.max_bitrate_kbps {
        return format!(
            "source bitrate {} kbps exceeds device maximum {} kbps",
            media_info.bitrate_kbps, device_profile.max_bitrate_kbps
        );
    }
    if let Some(codec) = media_info.video_codec.as_deref() {
        if !device_profile.supports_video_codec(codec) {
            return format!("device does not support video codec {codec}");
        }
    }
    if let Some(codec) = media_info.audio_codec.as_deref() {
        if !device_profile.supports_audio_codec(codec) {
            return format!("device does not support audio codec {codec}");
        }
    }
    "source format is not directly playable on this device".to_string()
}

fn source_container_token(format_name: &str) -> Option<&str> {
    format_name.split(',').next()
}

fn fits_within(resolution: Resolution, max: Resolution) -> bool {
    resolution.width <= max.width && resolution.height <= max.height
}

fn scale_to_fit(source: Resolution, max: Resolution) -> Resolution {
    let scale = f64::min(
        f64::from(max.width) / f64::from(source.width),
        f64::from(max.height) / f64::from(source.height),
    );
    Resolution {
        width: even(((f64::from(source.width) * scale) as u32).max(2)),
        height: even(((f64::from(source.height) * scale) as u32).max(2)),
    }
}

fn even(value: u32) -> u32 {
    if value % 2 == 0 {
        value
    } else {
        value - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DeviceProfile {
        DeviceProfile {
            supported_containers: vec![Container::Mp4],
            supported_video_codecs: vec!["h264".to_string()],
            supported_audio_codecs: vec!["aac".to_string()],
            max_resolution: Resolution { width: 1920, height: 1080 },
            max_bitrate_kbps: 8000,
            preferred_containers: vec![Container::Dash],
        }
    }

    fn media(container: &str, video: &str, audio: &str, width: u32, height: u32, kbps: u64) -> MediaInfo {
        MediaInfo {
            container: container.to_string(),
            video_codec: Some(video.to_string()),
            audio_codec: Some(audio.to_string()),
            resolution: Some(Resolution { width, height }),
            bitrate_kbps: kbps,
            duration_seconds: 100.0,
        }
    }

    #[test]
    fn direct_play_when_everything_matches() {
        let decision = decide(&media("mov,mp4,m4a", "h264", "aac", 1280, 720, 4000), &profile());
        assert!(!decision.should_transcode);
        assert!(decision.transcode_params.is_none());
    }

    #[test]
    fn transcodes_on_unsupported_codec() {
        let decision = decide(&media("matroska,webm", "hevc", "aac", 1280, 720, 4000), &profile());
        assert!(decision.should_transcode);
        let params = decision.transcode_params.unwrap();
        assert_eq!(params.container, Container::Dash);
        assert_eq!(params.video_codec, "h264");
    }

    #[test]
    fn transcodes_on_excessive_bitrate() {
        let decision = decide(&media("mov,mp4,m4a", "h264", "aac", 1280, 720, 20_000), &profile());
        assert!(decision.should_transcode);
        assert!(decision.reason.contains("bitrate"));
    }

    #[test]
    fn caps_resolution_on_transcode() {
        let decision = decide(&media("matroska,webm", "hevc", "aac", 3840, 2160, 4000), &profile());
        let params = decision.transcode_params.unwrap();
        let resolution = params.resolution.unwrap();
        assert!(resolution.width <= 1920);
        assert!(resolution.height <= 1080);
    }

    #[test]
    fn keeps_source_resolution_when_within_bounds() {
        let decision = decide(&media("matroska,webm", "hevc", "aac", 1280, 720, 4000), &profile());
        let params = decision.transcode_params.unwrap();
        assert_eq!(params.resolution, Some(Resolution { width: 1280, height: 720 }));
    }
}
