//! Bundled scripts and the path rewrite applied before they run

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants::SCRIPT_PATH_TOKEN;

mod embedded {
    include!(concat!(env!("OUT_DIR"), "/embedded_scripts.rs"));
}

pub use embedded::EMBEDDED_SCRIPTS;

/// Fallback sources for scripts missing from the working directory.
///
/// Embedded bodies win over bundle directories; directories are searched in
/// the order they were added.
#[derive(Debug, Clone, Default)]
pub struct ScriptBundle {
    embedded: HashMap<String, String>,
    dirs: Vec<PathBuf>,
}

impl ScriptBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    /// Serve `name` from memory
    pub fn with_embedded(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.embedded.insert(name.into(), body.into());
        self
    }

    /// Register every script compiled in through `FLIPKIT_EMBED_SCRIPTS_DIR`
    pub fn with_builtin(self) -> Self {
        EMBEDDED_SCRIPTS
            .iter()
            .fold(self, |bundle, (name, body)| bundle.with_embedded(*name, *body))
    }

    pub fn embedded_count(&self) -> usize {
        self.embedded.len()
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Write the bundled copy of `name` to `dest`.
    ///
    /// Returns `Ok(false)` when the bundle has no such script.
    pub fn materialize(&self, name: &str, dest: &Path) -> io::Result<bool> {
        if let Some(body) = self.embedded.get(name) {
            std::fs::write(dest, body)?;
            return Ok(true);
        }

        for dir in &self.dirs {
            let source = dir.join(name);
            if source.is_file() {
                std::fs::copy(&source, dest)?;
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Replacement text for [`SCRIPT_PATH_TOKEN`]: the working directory with
/// every backslash doubled
pub fn escaped_work_dir(work_dir: &Path) -> String {
    work_dir.display().to_string().replace('\\', "\\\\")
}

/// Point every default-install-location reference in `body` at `work_dir`
pub fn rewrite_script(body: &str, work_dir: &Path) -> String {
    body.replace(SCRIPT_PATH_TOKEN, &escaped_work_dir(work_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_replaces_every_token() {
        let body = "$Base = \"$env:USERPROFILE\\CAT_S22_Root\"\n\
                    $Adb = \"$env:USERPROFILE\\CAT_S22_Root\\platform-tools\\adb.exe\"\n";
        let out = rewrite_script(body, Path::new("/tmp/CAT_S22_Root"));
        assert!(!out.contains("USERPROFILE"));
        assert_eq!(out.matches("/tmp/CAT_S22_Root").count(), 2);
        assert!(out.contains("/tmp/CAT_S22_Root\\platform-tools\\adb.exe"));
    }

    #[test]
    fn test_backslashes_are_doubled() {
        let escaped = escaped_work_dir(Path::new(r"C:\Users\me\AppData\Local\Temp\CAT_S22_Root"));
        assert_eq!(escaped, r"C:\\Users\\me\\AppData\\Local\\Temp\\CAT_S22_Root");
    }

    #[test]
    fn test_rewrite_depends_only_on_inputs() {
        let body = "Set-Location $env:USERPROFILE\\CAT_S22_Root";
        let a = rewrite_script(body, Path::new("/a"));
        let b = rewrite_script(body, Path::new("/b"));
        assert_eq!(a, "Set-Location /a");
        assert_eq!(b, "Set-Location /b");
    }

    #[test]
    fn test_materialize_prefers_embedded() {
        let bundle_dir = tempfile::tempdir().unwrap();
        std::fs::write(bundle_dir.path().join("s.ps1"), "from disk").unwrap();
        let bundle = ScriptBundle::new()
            .with_dir(bundle_dir.path())
            .with_embedded("s.ps1", "embedded");

        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("s.ps1");
        assert!(bundle.materialize("s.ps1", &dest).unwrap());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "embedded");
    }

    #[test]
    fn test_builtin_scripts_are_served() {
        let bundle = ScriptBundle::new().with_builtin();
        assert_eq!(bundle.embedded_count(), EMBEDDED_SCRIPTS.len());

        let out = tempfile::tempdir().unwrap();
        for (name, body) in EMBEDDED_SCRIPTS {
            let dest = out.path().join(name);
            assert!(bundle.materialize(name, &dest).unwrap());
            assert_eq!(std::fs::read_to_string(&dest).unwrap(), *body);
        }
    }

    #[test]
    fn test_materialize_from_dir_and_missing() {
        let bundle_dir = tempfile::tempdir().unwrap();
        std::fs::write(bundle_dir.path().join("s.ps1"), "from disk").unwrap();
        let bundle = ScriptBundle::new().with_dir(bundle_dir.path());

        let out = tempfile::tempdir().unwrap();
        assert!(bundle.materialize("s.ps1", &out.path().join("s.ps1")).unwrap());
        assert!(!bundle
            .materialize("other.ps1", &out.path().join("other.ps1"))
            .unwrap());
        assert!(!out.path().join("other.ps1").exists());
    }
}
