//! Working directory layout
//!
//! ```text
//! <work_dir>/
//!   CAT_S22_Root_Tool.ps1, CAT_S22_Enhanced_Debloat.ps1
//!   platform-tools/
//!   downloads/
//!   boot_images/
//!   root_tool.log
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::constants::{
    ACTIVITY_LOG_FILE, BOOT_IMAGES_DIR, DOWNLOADS_DIR, PLATFORM_TOOLS_DIR, STAGED_RESOURCES,
    TEMP_SCRIPT_PREFIX,
};

/// The controller's private working area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(ACTIVITY_LOG_FILE)
    }

    pub fn platform_tools(&self) -> PathBuf {
        self.root.join(PLATFORM_TOOLS_DIR)
    }

    pub fn downloads(&self) -> PathBuf {
        self.root.join(DOWNLOADS_DIR)
    }

    pub fn boot_images(&self) -> PathBuf {
        self.root.join(BOOT_IMAGES_DIR)
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Where the rewritten copy of `name` lives while it runs
    pub fn temp_script(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", TEMP_SCRIPT_PREFIX, name))
    }

    /// Create the directory skeleton; existing content is left alone
    pub fn ensure_layout(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.downloads())?;
        std::fs::create_dir_all(self.boot_images())?;
        Ok(())
    }

    /// Delete everything and recreate the skeleton
    pub fn reset(&self) -> io::Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        self.ensure_layout()
    }

    /// Copy optional resources (boot image, Magisk APK) from `bundle_dir`
    /// when present there and not yet staged. Returns the staged file names.
    pub fn stage_resources(&self, bundle_dir: &Path) -> io::Result<Vec<String>> {
        let mut staged = Vec::new();
        for (source, dest) in STAGED_RESOURCES {
            let source = bundle_dir.join(source);
            let dest = self.root.join(dest);
            if !source.is_file() || dest.exists() {
                continue;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&source, &dest)?;
            staged.push(
                dest.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
        }
        Ok(staged)
    }
}
