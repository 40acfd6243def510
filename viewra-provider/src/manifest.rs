//! Plugin discovery: enumerating the plugins directory and parsing each
//! plugin's sidecar `manifest.toml`.
//!
//! Layout convention (spec.md §6 leaves the exact directory shape open): one
//! subdirectory per plugin under the configured plugins directory, each
//! holding an executable named `bin` and a `manifest.toml` beside it:
//!
//! ```text
//! <plugin_dir>/
//!   ffmpeg/
//!     bin
//!     manifest.toml
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ProviderError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

impl PluginManifest {
    /// Only plugins of this type participate in the transcode provider
    /// boundary; others (e.g. a future `enricher`) are discovered but
    /// skipped.
    #[must_use]
    pub fn is_transcoder(&self) -> bool {
        self.kind == "transcoder"
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub manifest: PluginManifest,
    pub manifest_path: PathBuf,
    pub binary_path: PathBuf,
}

/// Enumerate every plugin under `plugin_dir`. Entries that aren't a
/// directory, that lack a `manifest.toml`, or whose manifest fails to parse
/// are skipped with a warning rather than failing discovery outright — one
/// broken plugin shouldn't take down every other one.
pub async fn discover_plugins(plugin_dir: &Path) -> Result<Vec<DiscoveredPlugin>> {
    let mut discovered = Vec::new();
    let mut entries = match tokio::fs::read_dir(plugin_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(discovered),
        Err(err) => return Err(ProviderError::Io(err)),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = entry.file_type().await?;
        if !file_type.is_dir() {
            continue;
        }

        let manifest_path = path.join("manifest.toml");
        let binary_path = path.join("bin");

        let raw = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %manifest_path.display(), %err, "skipping plugin without a readable manifest");
                continue;
            }
        };

        let manifest: PluginManifest = match toml::from_str(&raw) {
            Ok(manifest) => manifest,
            Err(source) => {
                tracing::warn!(path = %manifest_path.display(), %source, "skipping plugin with a malformed manifest");
                continue;
            }
        };

        if !manifest.is_transcoder() {
            tracing::debug!(id = %manifest.id, kind = %manifest.kind, "skipping non-transcoder plugin");
            continue;
        }

        if !tokio::fs::try_exists(&binary_path).await.unwrap_or(false) {
            tracing::warn!(id = %manifest.id, path = %binary_path.display(), "skipping plugin with no binary");
            continue;
        }

        discovered.push(DiscoveredPlugin {
            manifest,
            manifest_path,
            binary_path,
        });
    }

    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discover_on_missing_dir_is_empty() {
        let result = discover_plugins(Path::new("/nonexistent/viewra/plugins"))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn discovers_well_formed_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("ffmpeg");
        tokio::fs::create_dir_all(&plugin_dir).await.unwrap();
        tokio::fs::write(
            plugin_dir.join("manifest.toml"),
            r#"
                id = "ffmpeg"
                name = "FFmpeg Provider"
                type = "transcoder"
                capabilities = ["mp4", "dash", "hls"]
                priority = 100
            "#,
        )
        .await
        .unwrap();
        tokio::fs::write(plugin_dir.join("bin"), b"#!/bin/sh\n")
            .await
            .unwrap();

        let plugins = discover_plugins(dir.path()).await.unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].manifest.id, "ffmpeg");
        assert_eq!(plugins[0].manifest.priority, 100);
    }

    #[tokio::test]
    async fn skips_non_transcoder_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("enricher");
        tokio::fs::create_dir_all(&plugin_dir).await.unwrap();
        tokio::fs::write(
            plugin_dir.join("manifest.toml"),
            r#"
                id = "metadata-enricher"
                name = "Metadata Enricher"
                type = "enricher"
                capabilities = []
                priority = 0
            "#,
        )
        .await
        .unwrap();
        tokio::fs::write(plugin_dir.join("bin"), b"#!/bin/sh\n")
            .await
            .unwrap();

        let plugins = discover_plugins(dir.path()).await.unwrap();
        assert!(plugins.is_empty());
    }

    #[tokio::test]
    async fn skips_plugin_without_binary() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("half-installed");
        tokio::fs::create_dir_all(&plugin_dir).await.unwrap();
        tokio::fs::write(
            plugin_dir.join("manifest.toml"),
            r#"
                id = "half-installed"
                name = "Half Installed"
                type = "transcoder"
                capabilities = []
                priority = 0
            "#,
        )
        .await
        .unwrap();

        let plugins = discover_plugins(dir.path()).await.unwrap();
        assert!(plugins.is_empty());
    }
}
