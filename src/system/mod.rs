//! Local filesystem utilities

pub mod scripts;
pub mod workdir;

use std::path::{Path, PathBuf};

/// Deletes a file or directory when dropped.
///
/// Used for artifacts that must not outlive the operation that created them
/// (downloaded archives, extraction staging, rewritten scripts). Failures are
/// logged at debug level and never replace the operation's own outcome.
#[derive(Debug)]
pub struct ScopedPath {
    path: PathBuf,
}

impl ScopedPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedPath {
    fn drop(&mut self) {
        let result = if self.path.is_dir() {
            std::fs::remove_dir_all(&self.path)
        } else if self.path.exists() {
            std::fs::remove_file(&self.path)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            tracing::debug!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}
