//! HTTP error type for the `/playback/*` surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }

    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });
        (status, body).into_response()
    }
}

/// Maps the seek-ahead/start-stream failure semantics of spec.md §4.4:
/// provider unavailable or spawn failure -> 500, manifest timeout -> 504,
/// unknown session -> 404, everything else -> 502/500.
impl From<viewra_playback::PlaybackError> for AppError {
    fn from(err: viewra_playback::PlaybackError) -> Self {
        use viewra_playback::PlaybackError;

        match err {
            PlaybackError::SessionNotFound(id) => Self::not_found(format!("session {id} not found")),
            PlaybackError::ManifestTimeout(id) => {
                Self::gateway_timeout(format!("manifest for session {id} never became ready"))
            }
            PlaybackError::ProviderUnavailable => {
                Self::service_unavailable("no provider can handle this request")
            }
            PlaybackError::PluginCrashed(id) => {
                tracing::error!(session_id = %id, "provider plugin crashed");
                Self::internal("provider plugin crashed")
            }
            PlaybackError::Probe { path, reason } => {
                tracing::warn!(%path, %reason, "media probe failed");
                Self::bad_request(format!("could not probe media at {path}: {reason}"))
            }
            PlaybackError::Core(err) => {
                tracing::error!(%err, "core error");
                Self::internal(err.to_string())
            }
            PlaybackError::Session(err) => {
                tracing::error!(%err, "session error");
                Self::internal(err.to_string())
            }
            PlaybackError::Provider(err) => {
                tracing::error!(%err, "provider rpc error");
                Self::service_unavailable(err.to_string())
            }
            PlaybackError::Io(err) => {
                tracing::error!(%err, "io error");
                Self::internal("io error")
            }
        }
    }
}

impl From<viewra_core::validation::ValidationError> for AppError {
    fn from(err: viewra_core::validation::ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found("not found"),
            _ => {
                tracing::error!(%err, "io error");
                Self::internal("io error")
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use viewra_core::error::SessionError;
    use viewra_playback::PlaybackError;

    #[test]
    fn session_not_found_is_404() {
        let err: AppError = PlaybackError::SessionNotFound(Uuid::new_v4()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn manifest_timeout_is_504() {
        let err: AppError = PlaybackError::ManifestTimeout(Uuid::new_v4()).into();
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn provider_unavailable_is_503() {
        let err: AppError = PlaybackError::ProviderUnavailable.into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn plugin_crashed_is_500() {
        let err: AppError = PlaybackError::PluginCrashed(Uuid::new_v4()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn probe_failure_is_400() {
        let err: AppError = PlaybackError::Probe {
            path: "/media/x.mp4".to_string(),
            reason: "no such stream".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("x.mp4"));
    }

    #[test]
    fn session_error_is_500() {
        let err: AppError = PlaybackError::Session(SessionError::NotFound(Uuid::new_v4())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_error_is_400() {
        let validation = viewra_core::validation::ValidationError::Field {
            field: "quality".to_string(),
            message: "must be in 0..=100".to_string(),
        };
        let err: AppError = validation.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn io_not_found_maps_to_404() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io_err.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn io_other_maps_to_500() {
        let io_err = std::io::Error::other("disk on fire");
        let err: AppError = io_err.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn into_response_carries_status_and_body() {
        let response = AppError::not_found("session missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
