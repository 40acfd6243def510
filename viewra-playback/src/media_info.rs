//! Probing a source file's container/codec/resolution/bitrate via `ffprobe`,
//! once per `/playback/decide` call.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use viewra_core::models::Resolution;

use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub container: String,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub resolution: Option<Resolution>,
    pub bitrate_kbps: u64,
    pub duration_seconds: f64,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Runs `ffprobe -show_format -show_streams` against `input_path` and
/// extracts the fields the direct-play decision needs.
pub async fn probe(ffprobe_path: &str, input_path: &Path) -> Result<MediaInfo> {
    let output = Command::new(ffprobe_path)
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(input_path)
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(PlaybackError::Probe {
            path: input_path.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let parsed: FfprobeOutput =
        serde_json::from_slice(&output.stdout).map_err(|err| PlaybackError::Probe {
            path: input_path.display().to_string(),
            reason: err.to_string(),
        })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let resolution = video.and_then(|v| match (v.width, v.height) {
        (Some(width), Some(height)) => Some(Resolution { width, height }),
        _ => None,
    });

    Ok(MediaInfo {
        container: parsed.format.format_name.unwrap_or_else(|| "unknown".to_string()),
        video_codec: video.and_then(|v| v.codec_name.clone()),
        audio_codec: audio.and_then(|a| a.codec_name.clone()),
        resolution,
        bitrate_kbps: parsed
            .format
            .bit_rate
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(|bps| bps / 1000)
            .unwrap_or(0),
        duration_seconds: parsed
            .format
            .duration
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_json_shape() {
        let raw = r#"{
            "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "120.5", "bit_rate": "5000000"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.streams.len(), 2);
        assert_eq!(parsed.format.duration.as_deref(), Some("120.5"));
    }
}
