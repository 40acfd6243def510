//! Input validation for `TranscodeRequest` and related playback inputs.
//!
//! Mirrors the teacher's field-validator pattern (one small validator type
//! per concern, a batch `Validator` to collect multiple field errors at
//! once) applied to the transcoding request surface instead of user
//! account fields.

use crate::models::{Container, Resolution, TranscodeRequest};
use std::path::Path;

/// Validation error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid {field}: {message}")]
    Field { field: String, message: String },

    #[error("Multiple validation errors: {0}")]
    Multiple(String),
}

/// Validation result
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Codecs each container is known to support, for the video/audio codec
/// compatibility check. Not exhaustive — an unrecognized container accepts
/// any codec, since a provider plugin may support formats this core build
/// has never seen.
fn supported_video_codecs(container: Container) -> Option<&'static [&'static str]> {
    match container {
        Container::Mp4 => Some(&["h264", "hevc", "av1"]),
        Container::WebM => Some(&["vp8", "vp9", "av1"]),
        Container::Mkv => Some(&["h264", "hevc", "av1", "vp9"]),
        Container::Dash | Container::Hls => Some(&["h264", "hevc", "av1"]),
    }
}

/// Validates that `input_path` is non-empty and, when `must_exist` is set,
/// actually present on disk.
pub struct InputPathValidator {
    must_exist: bool,
}

impl Default for InputPathValidator {
    fn default() -> Self {
        Self { must_exist: true }
    }
}

impl InputPathValidator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allow_missing(mut self) -> Self {
        self.must_exist = false;
        self
    }

    pub fn validate(&self, input_path: &str) -> ValidationResult<()> {
        if input_path.trim().is_empty() {
            return Err(ValidationError::Field {
                field: "input_path".to_string(),
                message: "cannot be empty".to_string(),
            });
        }

        if self.must_exist && !Path::new(input_path).exists() {
            return Err(ValidationError::Field {
                field: "input_path".to_string(),
                message: "file does not exist".to_string(),
            });
        }

        Ok(())
    }
}

/// Validates the 0-100 quality scale at every public boundary.
pub struct QualityValidator;

impl QualityValidator {
    pub fn validate(quality: u8) -> ValidationResult<()> {
        if quality > 100 {
            return Err(ValidationError::Field {
                field: "quality".to_string(),
                message: "must be in 0..=100".to_string(),
            });
        }
        Ok(())
    }
}

/// Validates a requested output resolution is within sane bounds and has
/// even width/height, which most encoders require for 4:2:0 chroma
/// subsampling.
pub struct ResolutionValidator {
    max_width: u32,
    max_height: u32,
}

impl Default for ResolutionValidator {
    fn default() -> Self {
        Self {
            max_width: 7680,
            max_height: 4320,
        }
    }
}

impl ResolutionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self, resolution: Resolution) -> ValidationResult<()> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(ValidationError::Field {
                field: "resolution".to_string(),
                message: "width and height must be non-zero".to_string(),
            });
        }

        if resolution.width > self.max_width || resolution.height > self.max_height {
            return Err(ValidationError::Field {
                field: "resolution".to_string(),
                message: format!(
                    "exceeds maximum of {}x{}",
                    self.max_width, self.max_height
                ),
            });
        }

        if resolution.width % 2 != 0 || resolution.height % 2 != 0 {
            return Err(ValidationError::Field {
                field: "resolution".to_string(),
                message: "width and height must be even".to_string(),
            });
        }

        Ok(())
    }
}

/// Validates that `video_codec` is one the requested `container` is known
/// to support.
pub struct CodecCompatibilityValidator;

impl CodecCompatibilityValidator {
    pub fn validate(container: Container, video_codec: &str) -> ValidationResult<()> {
        let Some(supported) = supported_video_codecs(container) else {
            return Ok(());
        };

        if supported.contains(&video_codec.to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(ValidationError::Field {
                field: "video_codec".to_string(),
                message: format!("{video_codec} is not supported by container {container}"),
            })
        }
    }
}

/// Batch validator for multiple fields
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn validate_field<F>(&mut self, _field: &str, result: ValidationResult<F>) -> &mut Self {
        if let Err(e) = result {
            self.errors.push(e);
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else if self.errors.len() == 1 {
            Err(self.errors.into_iter().next().unwrap())
        } else {
            let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
            Err(ValidationError::Multiple(messages.join("; ")))
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates a full `TranscodeRequest` against all of the above, collecting
/// every violation rather than stopping at the first.
pub fn validate_request(request: &TranscodeRequest) -> ValidationResult<()> {
    let mut validator = Validator::new();

    validator.validate_field(
        "input_path",
        InputPathValidator::new().validate(&request.input_path),
    );
    validator.validate_field("quality", QualityValidator::validate(request.quality));
    validator.validate_field(
        "video_codec",
        CodecCompatibilityValidator::validate(request.container, &request.video_codec),
    );

    if let Some(resolution) = request.resolution {
        validator.validate_field(
            "resolution",
            ResolutionValidator::new().validate(resolution),
        );
    }

    validator.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_request() -> TranscodeRequest {
        TranscodeRequest {
            input_path: "/dev/null".to_string(),
            session_id: Uuid::new_v4(),
            container: Container::Mp4,
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            quality: 65,
            speed_priority: crate::models::SpeedPriority::Balanced,
            resolution: Some(Resolution {
                width: 1920,
                height: 1080,
            }),
            seek_seconds: None,
            enable_abr: true,
            prefer_hardware: false,
            hardware_type: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(validate_request(&sample_request()).is_ok());
    }

    #[test]
    fn empty_input_path_rejected() {
        let mut req = sample_request();
        req.input_path = String::new();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn codec_container_mismatch_rejected() {
        let mut req = sample_request();
        req.video_codec = "vp9".to_string();
        req.container = Container::Mp4;
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn odd_resolution_rejected() {
        let validator = ResolutionValidator::new();
        assert!(validator
            .validate(Resolution {
                width: 1921,
                height: 1080
            })
            .is_err());
    }

    #[test]
    fn quality_out_of_range_rejected() {
        assert!(QualityValidator::validate(101).is_err());
        assert!(QualityValidator::validate(100).is_ok());
    }

    #[test]
    fn batch_validation_collects_multiple_errors() {
        let mut req = sample_request();
        req.input_path = String::new();
        req.video_codec = "vp9".to_string();

        let err = validate_request(&req).unwrap_err();
        match err {
            ValidationError::Multiple(msg) => {
                assert!(msg.contains("input_path") || msg.contains("video_codec"));
            }
            other => panic!("expected Multiple, got {other:?}"),
        }
    }
}
