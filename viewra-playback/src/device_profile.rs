//! The client-side half of the direct-play decision: what a requesting
//! device can play natively.

use serde::{Deserialize, Serialize};
use viewra_core::models::{Container, Resolution};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub supported_containers: Vec<Container>,
    pub supported_video_codecs: Vec<String>,
    pub supported_audio_codecs: Vec<String>,
    pub max_resolution: Resolution,
    pub max_bitrate_kbps: u64,
    /// Containers in preference order, used to pick a transcode target when
    /// direct-play isn't possible. Falls back to `Container::Dash` if empty.
    pub preferred_containers: Vec<Container>,
}

impl DeviceProfile {
    #[must_use]
    pub fn supports_container(&self, container: Container) -> bool {
        self.supported_containers.contains(&container)
    }

    #[must_use]
    pub fn supports_video_codec(&self, codec: &str) -> bool {
        self.supported_video_codecs.iter().any(|c| c.eq_ignore_ascii_case(codec))
    }

    #[must_use]
    pub fn supports_audio_codec(&self, codec: &str) -> bool {
        self.supported_audio_codecs.iter().any(|c| c.eq_ignore_ascii_case(codec))
    }

    #[must_use]
    pub fn preferred_container(&self) -> Container {
        self.preferred_containers.first().copied().unwrap_or(Container::Dash)
    }

    #[must_use]
    pub fn preferred_video_codec(&self) -> String {
        self.supported_video_codecs
            .first()
            .cloned()
            .unwrap_or_else(|| "h264".to_string())
    }

    #[must_use]
    pub fn preferred_audio_codec(&self) -> String {
        self.supported_audio_codecs
            .first()
            .cloned()
            .unwrap_or_else(|| "aac".to_string())
    }
}
