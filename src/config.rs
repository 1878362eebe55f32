//! Configuration file support
//!
//! Loads configuration from TOML at ~/.config/flipkit/config.toml.
//! Falls back to defaults if the file doesn't exist or can't be parsed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::paths;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub scripts: ScriptsConfig,
    pub timeouts: TimeoutConfig,
}

/// Working area and bundle locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Working directory; defaults to `<system temp>/CAT_S22_Root`
    pub work_dir: Option<PathBuf>,

    /// Directory holding bundled scripts and resources; defaults to the
    /// executable's directory
    pub bundle_dir: Option<PathBuf>,
}

/// Platform-tools download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub platform_tools_url: String,

    /// Entry binary that marks the tools as installed
    pub adb_binary: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            platform_tools_url: constants::PLATFORM_TOOLS_URL.to_string(),
            adb_binary: constants::ADB_BINARY.to_string(),
        }
    }
}

/// Script interpreter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    pub root_script: String,
    pub debloat_script: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            interpreter: constants::DEFAULT_INTERPRETER.to_string(),
            interpreter_args: constants::INTERPRETER_FLAGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            root_script: constants::ROOT_SCRIPT.to_string(),
            debloat_script: constants::DEBLOAT_SCRIPT.to_string(),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout for each adb probe command (seconds)
    pub probe_secs: u64,

    /// Connect timeout for the platform-tools download (seconds)
    pub http_connect_secs: u64,

    /// Optional hard limit for a script run (seconds); unlimited when unset
    pub script_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: constants::DEFAULT_PROBE_TIMEOUT_SECS,
            http_connect_secs: constants::DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
            script_secs: None,
        }
    }
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn http_connect(&self) -> Duration {
        Duration::from_secs(self.http_connect_secs)
    }

    pub fn script(&self) -> Option<Duration> {
        self.script_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from(&paths::config_file())
    }

    /// Load configuration from `path`, or return defaults if not found
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Resolved working directory
    pub fn work_dir(&self) -> PathBuf {
        self.paths
            .work_dir
            .clone()
            .unwrap_or_else(paths::default_work_dir)
    }

    /// Resolved bundle directory, if any
    pub fn bundle_dir(&self) -> Option<PathBuf> {
        self.paths.bundle_dir.clone().or_else(paths::executable_dir)
    }

    /// Generate example configuration content
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
