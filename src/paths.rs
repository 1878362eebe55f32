//! Path resolution
//!
//! Centralized directory path resolution with consistent fallback strategies.

use std::path::PathBuf;

use crate::constants::WORK_DIR_NAME;

/// Data directory (diagnostic log) relative to home
const DATA_SUBDIR: &str = ".local/share/flipkit";

/// Config directory relative to home
const CONFIG_SUBDIR: &str = ".config/flipkit";

const CONFIG_FILE: &str = "config.toml";

pub const DIAGNOSTIC_LOG_FILE: &str = "flipkit.log";

/// Fallback data directory when home is unavailable
const FALLBACK_DATA_DIR: &str = "/tmp/flipkit";

/// Fallback config file when home is unavailable
const FALLBACK_CONFIG_FILE: &str = "/tmp/flipkit.toml";

/// Directory for the rolling diagnostic log
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(DATA_SUBDIR))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
}

/// Default configuration file path
pub fn config_file() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(CONFIG_SUBDIR).join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_CONFIG_FILE))
}

/// Default working directory: `<system temp>/CAT_S22_Root`
pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join(WORK_DIR_NAME)
}

/// Directory holding the running executable, used as the script bundle
pub fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
}
