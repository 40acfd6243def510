use thiserror::Error;
use uuid::Uuid;

/// Errors from the process registry (C1): spawning, signaling, and reaping
/// encoder child processes.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn encoder process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("process group {pgid} did not exit within the grace period")]
    GraceTimeout { pgid: i32 },

    #[error("failed to signal process group {pgid}: {source}")]
    Signal {
        pgid: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("no process registered for session {0}")]
    NotFound(Uuid),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the session manager (C2).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("session {0} is already in a terminal state")]
    AlreadyTerminal(Uuid),

    #[error("invalid state transition for session {session}: {from} -> {to}")]
    InvalidTransition {
        session: Uuid,
        from: &'static str,
        to: &'static str,
    },

    #[error("io error managing session directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the encoder command builder (C3). Pure validation failures;
/// building an argv never touches the filesystem or a subprocess.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("malformed argv: {0}")]
    MalformedArgv(String),

    #[error("unsupported codec {codec} for container {container}")]
    UnsupportedCodec { codec: String, container: String },

    #[error("quality must be in 0..=100, got {0}")]
    QualityOutOfRange(u8),

    #[error("resolution {width}x{height} is not valid")]
    InvalidResolution { width: u32, height: u32 },
}

/// Top-level error type for `viewra-core`. Binaries downstream generally
/// convert this into `anyhow::Error` at their boundary; library code
/// returns it directly so callers can match on the variant.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
