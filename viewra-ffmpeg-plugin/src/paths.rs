//! Session-directory-relative paths. Duplicates the naming convention in
//! `viewra_playback::paths` (`manifest.<ext>`) rather than depending on it —
//! the plugin boundary shouldn't pull in the playback decider crate just to
//! agree on a filename.

use std::path::{Path, PathBuf};
use viewra_core::models::Container;

#[must_use]
pub fn output_filename(container: Container) -> String {
    format!("manifest.{}", container.extension())
}

#[must_use]
pub fn output_path(output_dir: &Path, container: Container) -> PathBuf {
    output_dir.join(output_filename(container))
}

#[must_use]
pub fn progress_path(output_dir: &Path) -> PathBuf {
    output_dir.join("progress.log")
}

#[must_use]
pub fn pid_marker_path(output_dir: &Path) -> PathBuf {
    output_dir.join("pid")
}
