//! Errors for the playback decider and seek-ahead controller (C4).

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("no provider satisfies the requested capability set")]
    ProviderUnavailable,

    #[error("manifest for session {0} never became readable within the polling window")]
    ManifestTimeout(Uuid),

    #[error("provider plugin owning session {0} crashed")]
    PluginCrashed(Uuid),

    #[error("failed to probe media at {path}: {reason}")]
    Probe { path: String, reason: String },

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error(transparent)]
    Core(#[from] viewra_core::Error),

    #[error(transparent)]
    Session(#[from] viewra_core::error::SessionError),

    #[error(transparent)]
    Provider(#[from] viewra_provider::ProviderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
