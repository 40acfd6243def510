//! Source-duration probing via `ffprobe`. Kept separate from
//! `viewra_playback::media_info` (which this binary doesn't depend on) —
//! C5 only ever needs the duration, to turn ffmpeg's raw `out_time_ms`
//! progress line into a percentage, since `TranscodeRequest` carries no
//! duration field of its own.

use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Returns `None` on any probe failure — duration is only used to compute a
/// nicer percentage, so a provider without a working `ffprobe` still
/// transcodes, it just can't report progress as a percent.
pub async fn duration_seconds(ffprobe_path: &Path, input_path: &str) -> Option<f64> {
    let child = Command::new(ffprobe_path)
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
        .arg(input_path)
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(viewra_core::resilience::timeout::PROBE_TIMEOUT, child)
        .await
        .ok()?
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout).ok()?;
    parsed.format.duration?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_json_shape() {
        let raw = r#"{"format": {"duration": "300.25"}}"#;
        let parsed: ProbeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.format.duration.as_deref(), Some("300.25"));
    }
}
