//! C4: Playback Decider & Seek-Ahead Controller.
//!
//! Sits between the HTTP surface (`viewra-server`) and the provider plugin
//! boundary (`viewra-provider`): decides whether a request can direct-play
//! or needs a transcode, and orchestrates the seek-ahead handoff between a
//! live session and its replacement.

pub mod controller;
pub mod decision;
pub mod device_profile;
pub mod error;
pub mod manifest_poll;
pub mod media_info;
pub mod paths;

pub use controller::{ClientId, PlaybackController};
pub use decision::{decide, PlaybackDecision};
pub use device_profile::DeviceProfile;
pub use error::{PlaybackError, Result};
pub use manifest_poll::{poll_until_ready, PollOutcome, PollSchedule};
pub use media_info::{probe, MediaInfo};
