//! Application-wide constants

pub const APP_NAME: &str = "CAT S22 Root Tool";

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const PROJECT_URL: &str = "https://github.com/allie-rae-devop/CAT-S22-Root-Tool-Release";

/// Maximum lines to retain in the on-screen log buffer
pub const OUTPUT_BUFFER_SIZE: usize = 500;

/// Default timeout for each adb probe command in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout for the platform-tools download in seconds
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Event poll timeout in milliseconds
pub const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Spinner animation interval in milliseconds
pub const SPINNER_TICK_MS: u128 = 100;

/// Grace period for draining output readers after a process exits
pub const READER_DRAIN_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Working directory layout
// =============================================================================

/// Working directory name under the system temp dir
pub const WORK_DIR_NAME: &str = "CAT_S22_Root";

pub const ACTIVITY_LOG_FILE: &str = "root_tool.log";

pub const PLATFORM_TOOLS_DIR: &str = "platform-tools";

pub const DOWNLOADS_DIR: &str = "downloads";

pub const BOOT_IMAGES_DIR: &str = "boot_images";

/// Prefix of the rewritten copy of a script while it runs
pub const TEMP_SCRIPT_PREFIX: &str = "temp_";

/// Optional resources copied from the bundle directory: (source, destination)
/// relative to the bundle dir and the working dir respectively
pub const STAGED_RESOURCES: &[(&str, &str)] = &[
    ("boot_images/boot_v30.img", "boot_images/boot_v30.img"),
    ("Magisk-v25.2.apk", "downloads/Magisk.apk"),
];

// =============================================================================
// Scripts
// =============================================================================

pub const ROOT_SCRIPT: &str = "CAT_S22_Root_Tool.ps1";

pub const DEBLOAT_SCRIPT: &str = "CAT_S22_Enhanced_Debloat.ps1";

/// Path the scripts assume their resources live under. Every occurrence is
/// rewritten to the working directory before a script runs; renaming this
/// variable inside the scripts breaks the integration.
pub const SCRIPT_PATH_TOKEN: &str = r"$env:USERPROFILE\CAT_S22_Root";

/// Environment variable carrying the working directory into scripts
pub const WORK_DIR_ENV: &str = "FLIPKIT_WORK_DIR";

pub const INTERPRETER_FLAGS: &[&str] = &["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"];

#[cfg(windows)]
pub const DEFAULT_INTERPRETER: &str = "powershell.exe";
#[cfg(not(windows))]
pub const DEFAULT_INTERPRETER: &str = "pwsh";

// =============================================================================
// Platform tools
// =============================================================================

#[cfg(windows)]
pub const PLATFORM_TOOLS_URL: &str =
    "https://dl.google.com/android/repository/platform-tools-latest-windows.zip";
#[cfg(target_os = "macos")]
pub const PLATFORM_TOOLS_URL: &str =
    "https://dl.google.com/android/repository/platform-tools-latest-darwin.zip";
#[cfg(not(any(windows, target_os = "macos")))]
pub const PLATFORM_TOOLS_URL: &str =
    "https://dl.google.com/android/repository/platform-tools-latest-linux.zip";

#[cfg(windows)]
pub const ADB_BINARY: &str = "adb.exe";
#[cfg(not(windows))]
pub const ADB_BINARY: &str = "adb";

// =============================================================================
// Device probe markers
// =============================================================================

pub const ADB_DEVICES_BANNER: &str = "List of devices attached";

pub const DEVICE_MARKER: &str = "device";

pub const UNAUTHORIZED_MARKER: &str = "unauthorized";

pub const FINGERPRINT_PROPERTY: &str = "ro.build.fingerprint";

pub const MODEL_MARKER: &str = "S22Flip";

/// Build-number substrings and the firmware tag they map to, checked in order
pub const FIRMWARE_VERSIONS: &[(&str, &str)] = &[("0.030", "v30"), ("0.029", "v29")];
