use tonic::Status;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("session {0} not found")]
    SessionNotFound(uuid::Uuid),

    #[error(transparent)]
    Core(#[from] viewra_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<PluginError> for Status {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::MalformedRequest(msg) => Status::invalid_argument(msg),
            PluginError::SessionNotFound(id) => Status::not_found(format!("session {id} not found")),
            PluginError::Core(viewra_core::Error::Session(source)) => Status::not_found(source.to_string()),
            PluginError::Core(viewra_core::Error::Encoder(source)) => Status::invalid_argument(source.to_string()),
            other => Status::internal(other.to_string()),
        }
    }
}
