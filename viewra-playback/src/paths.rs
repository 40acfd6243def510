//! Session-directory-relative paths shared by the controller and whatever
//! HTTP layer serves manifest/segment bytes.

use std::path::{Path, PathBuf};
use viewra_core::models::Container;

#[must_use]
pub fn manifest_filename(container: Container) -> String {
    format!("manifest.{}", container.extension())
}

#[must_use]
pub fn manifest_path(output_dir: &Path, container: Container) -> PathBuf {
    output_dir.join(manifest_filename(container))
}

/// A manifest is "ready" once it exists on disk and has at least one byte —
/// an empty file left by `ffmpeg`'s initial open-for-write is not yet
/// readable content.
pub async fn manifest_is_ready(output_dir: &Path, container: Container) -> bool {
    tokio::fs::metadata(manifest_path(output_dir, container))
        .await
        .map(|meta| meta.len() > 0)
        .unwrap_or(false)
}
