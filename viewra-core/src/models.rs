//! Domain types shared by the process registry (C1), session manager (C2),
//! encoder command builder (C3) and playback decider (C4).
//!
//! These mirror the wire schema in `viewra-proto` field for field; the
//! provider plugin boundary (C5) is responsible for converting between the
//! two at the RPC edge, so the pure core never needs to depend on `prost`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Output container / packaging format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Container {
    Mp4,
    WebM,
    Mkv,
    Dash,
    Hls,
}

impl Container {
    /// File extension for the top-level manifest/output file.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Mkv => "mkv",
            Container::Dash => "mpd",
            Container::Hls => "m3u8",
        }
    }

    /// Whether this container is produced as a manifest plus a set of
    /// segment files rather than a single output file.
    #[must_use]
    pub fn is_segmented(self) -> bool {
        matches!(self, Container::Dash | Container::Hls)
    }
}

impl FromStr for Container {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(Container::Mp4),
            "webm" => Ok(Container::WebM),
            "mkv" | "matroska" => Ok(Container::Mkv),
            "dash" => Ok(Container::Dash),
            "hls" => Ok(Container::Hls),
            other => Err(ParseDomainError::UnknownContainer(other.to_string())),
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Mkv => "mkv",
            Container::Dash => "dash",
            Container::Hls => "hls",
        };
        f.write_str(s)
    }
}

/// Trade-off between encode speed and output quality/size, fed to the
/// encoder's preset selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedPriority {
    Fastest,
    Balanced,
    Quality,
}

impl Default for SpeedPriority {
    fn default() -> Self {
        SpeedPriority::Balanced
    }
}

impl FromStr for SpeedPriority {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastest" => Ok(SpeedPriority::Fastest),
            "balanced" => Ok(SpeedPriority::Balanced),
            "quality" => Ok(SpeedPriority::Quality),
            other => Err(ParseDomainError::UnknownSpeedPriority(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub fn aspect_ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// A request to transcode `input_path` for playback, addressed by
/// `session_id`. This is the type every component from the decider down to
/// the encoder command builder operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub input_path: String,
    pub session_id: Uuid,
    pub container: Container,
    pub video_codec: String,
    pub audio_codec: String,
    /// Quality on a 0-100 scale; never a codec-specific CRF/bitrate value.
    pub quality: u8,
    pub speed_priority: SpeedPriority,
    /// Target resolution; `None` means "match source, scaled down only if
    /// the source exceeds the device profile's maximum".
    pub resolution: Option<Resolution>,
    /// Start offset for a seek-ahead session; `None` for a fresh start.
    pub seek_seconds: Option<f64>,
    pub enable_abr: bool,
    pub prefer_hardware: bool,
    pub hardware_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub percent: u8,
    pub elapsed_seconds: f64,
    pub speed: f64,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub priority: i32,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDomainError {
    #[error("unknown container: {0}")]
    UnknownContainer(String),
    #[error("unknown speed priority: {0}")]
    UnknownSpeedPriority(String),
}
