//! Errors at the provider plugin RPC boundary (C5).
//!
//! Kept separate from `viewra_core::Error` so the core library never has to
//! depend on `tonic`: only this crate and `viewra-server` talk gRPC.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no provider registered under id {0:?}")]
    NotFound(String),

    #[error("no provider capable of handling container {container}")]
    NoCapableProvider { container: String },

    #[error("failed to parse plugin manifest at {path}: {source}")]
    ManifestParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to spawn plugin binary at {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("provider {provider_id} rpc {method} failed: {source}")]
    Rpc {
        provider_id: String,
        method: &'static str,
        #[source]
        source: tonic::Status,
    },

    #[error("provider {provider_id} is not reachable: {source}")]
    Transport {
        provider_id: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("session {0} not recognized by its provider")]
    UnknownSession(Uuid),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
