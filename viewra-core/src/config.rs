use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration, assembled from (in increasing priority) a
/// config file, then `VIEWRA_*` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub transcoding: TranscodingConfig,
    pub provider: ProviderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Enable the `/playback/stats` Prometheus endpoint.
    pub metrics_enabled: bool,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            metrics_enabled: true,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Filesystem layout and process-lifecycle knobs for C1-C4.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodingConfig {
    /// Root directory under which each session gets its own
    /// `<container>_<provider>_<uuid>` output directory.
    pub transcoding_dir: PathBuf,
    /// Directory served for direct-play passthrough/static assets, if any.
    pub streaming_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub ffmpeg_debug: bool,
    /// How long `StopBySession`/`StopTranscode` waits after `SIGTERM` before
    /// escalating to `SIGKILL`.
    pub signal_grace: Duration,
    /// How long a terminal session stays queryable before `CleanupStale`
    /// removes it.
    pub session_grace_period: Duration,
    /// Initial delay for manifest-readiness polling.
    pub manifest_poll_initial: Duration,
    /// Ceiling for manifest-readiness polling backoff.
    pub manifest_poll_max: Duration,
    /// Maximum number of manifest-readiness poll attempts before giving up.
    pub manifest_poll_max_attempts: u32,
    /// Maximum concurrent encoder sessions.
    pub max_concurrent_sessions: usize,
}

impl Default for TranscodingConfig {
    fn default() -> Self {
        Self {
            transcoding_dir: PathBuf::from("/var/lib/viewra/transcoding"),
            streaming_dir: PathBuf::from("/var/lib/viewra/streaming"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_debug: false,
            signal_grace: Duration::from_secs(10),
            session_grace_period: Duration::from_secs(300),
            manifest_poll_initial: Duration::from_millis(200),
            manifest_poll_max: Duration::from_secs(2),
            manifest_poll_max_attempts: 30,
            max_concurrent_sessions: 8,
        }
    }
}

/// Provider plugin discovery and hot-reload knobs for C5.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Directory scanned for plugin binaries + sidecar `manifest.toml` files.
    pub plugin_dir: PathBuf,
    /// How often to check each plugin binary's mtime for hot reload.
    pub reload_check_interval: Duration,
    /// Grace period before a draining plugin connection is force-killed.
    pub drain_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("/var/lib/viewra/plugins"),
            reload_check_interval: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, config::FileFormat::Yaml));
            }
        }

        // Override with environment variables (VIEWRA_SERVER_HTTP_PORT,
        // VIEWRA_TRANSCODING_FFMPEG_PATH, etc.)
        builder = builder.add_source(
            Environment::with_prefix("VIEWRA")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert!(config.transcoding.max_concurrent_sessions > 0);
        assert!(config.transcoding.manifest_poll_initial < config.transcoding.manifest_poll_max);
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let config = Config::load(Some("/nonexistent/path.yaml")).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
