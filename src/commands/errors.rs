//! Error taxonomy and failure categorization
//!
//! Typed errors for each workflow component, plus [`ParsedError`] which turns
//! failure text into a user-friendly summary with an actionable suggestion.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

use crate::workflow::state::WorkflowState;

/// External process failures
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to launch {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("command timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("command cancelled")]
    Cancelled,

    #[error("i/o error while running command: {0}")]
    Io(#[from] std::io::Error),
}

/// Tool download/installation failures
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("download failed: {0}")]
    NetworkFailure(String),

    #[error("extraction failed: {0}")]
    ExtractFailure(String),

    #[error("provisioning cancelled")]
    Cancelled,

    #[error("i/o error while provisioning: {0}")]
    Io(#[from] std::io::Error),
}

/// Device probe failures
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error("unrecognized device listing (exit code {exit_code}): {output}")]
    Unclassified { exit_code: i32, output: String },
}

/// Script execution failures
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("failed to prepare script {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Controller-level failures
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("another operation is in progress ({0})")]
    Busy(WorkflowState),

    #[error("the risk warning was not acknowledged")]
    NotConfirmed,

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("cleanup failed: {0}")]
    Cleanup(#[source] std::io::Error),

    #[error("failed to prepare working directory: {0}")]
    Setup(#[source] std::io::Error),
}

impl WorkflowError {
    /// True when the operation ended because it was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkflowError::Provision(ProvisionError::Cancelled)
                | WorkflowError::Probe(ProbeError::Run(RunError::Cancelled))
                | WorkflowError::Exec(ExecError::Run(RunError::Cancelled))
        )
    }
}

/// Parsed error with user-friendly information
#[derive(Debug, Clone)]
pub struct ParsedError {
    /// Short summary (one line)
    pub summary: String,
    /// Longer description if available
    pub detail: Option<String>,
    /// User-friendly suggestion
    pub suggestion: String,
}

/// Context about what operation was running
pub struct ErrorContext {
    pub operation: String,
}

impl ParsedError {
    /// Categorize failure text
    pub fn from_message(message: &str, context: ErrorContext) -> Self {
        if let Some(err) = parse_http_error(message) {
            return err;
        }
        if let Some(err) = parse_network_error(message) {
            return err;
        }
        if let Some(err) = parse_adb_error(message) {
            return err;
        }
        if let Some(err) = parse_interpreter_error(message) {
            return err;
        }
        if let Some(err) = parse_permission_error(message) {
            return err;
        }

        Self::generic(message, context)
    }

    /// Categorize a workflow error
    pub fn from_workflow_error(err: &WorkflowError, operation: &str) -> Self {
        match err {
            WorkflowError::Busy(state) => Self {
                summary: format!("Cannot start: {}", state.describe()),
                detail: None,
                suggestion: "Wait for the current process to complete or cancel it.".to_string(),
            },
            WorkflowError::NotConfirmed => Self {
                summary: format!("{} was not confirmed", operation),
                detail: None,
                suggestion: "Read the warnings and confirm to proceed.".to_string(),
            },
            WorkflowError::Exec(ExecError::ScriptNotFound(name)) => Self {
                summary: format!("Script not found: {}", name),
                detail: None,
                suggestion:
                    "Please ensure the script is in the same folder as the executable.".to_string(),
            },
            other => Self::from_message(
                &other.to_string(),
                ErrorContext {
                    operation: operation.to_string(),
                },
            ),
        }
    }

    fn generic(message: &str, context: ErrorContext) -> Self {
        let detail = message
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string());

        Self {
            summary: format!("{} failed", context.operation),
            detail,
            suggestion: "Check the log for details.".to_string(),
        }
    }
}

static HTTP_STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:HTTP\s+status(?:\s+(?:client|server)\s+error)?|status)\s*\(?(\d{3})")
        .unwrap()
});

fn parse_http_error(message: &str) -> Option<ParsedError> {
    let caps = HTTP_STATUS_RE.captures(message)?;
    let code: u16 = caps.get(1)?.as_str().parse().ok()?;

    let (summary, suggestion) = match code {
        404 => (
            "Platform tools archive not found (HTTP 404)".to_string(),
            "The download URL may have changed. Check tools.platform_tools_url in the config."
                .to_string(),
        ),
        500..=599 => (
            format!("Download server error (HTTP {})", code),
            "The server is temporarily unavailable. Try again in a few minutes.".to_string(),
        ),
        _ => (
            format!("Download failed (HTTP {})", code),
            "The server rejected the request. Try again later.".to_string(),
        ),
    };

    Some(ParsedError {
        summary,
        detail: None,
        suggestion,
    })
}

fn parse_network_error(message: &str) -> Option<ParsedError> {
    let patterns = [
        (
            "dns error",
            "DNS resolution failed",
            "Check your internet connection.",
        ),
        (
            "connection refused",
            "Connection refused",
            "The remote server refused the connection. Check if it's online.",
        ),
        (
            "operation timed out",
            "Connection timed out",
            "Network request timed out. Check your connection and try again.",
        ),
        (
            "network is unreachable",
            "Network unreachable",
            "No network connectivity. Check your internet connection.",
        ),
        (
            "error sending request",
            "Download request failed",
            "Check your internet connection and proxy settings.",
        ),
    ];

    let lower = message.to_lowercase();
    for (pattern, summary, suggestion) in patterns {
        if lower.contains(pattern) {
            return Some(ParsedError {
                summary: summary.to_string(),
                detail: None,
                suggestion: suggestion.to_string(),
            });
        }
    }
    None
}

fn parse_adb_error(message: &str) -> Option<ParsedError> {
    let lower = message.to_lowercase();

    let patterns = [
        (
            "no permissions",
            "USB permission denied for device",
            "Install udev rules for Android devices or reconnect the cable.",
        ),
        (
            "device offline",
            "Device is offline",
            "Reconnect the phone and make sure USB debugging is enabled.",
        ),
        (
            "cannot connect to daemon",
            "adb server failed to start",
            "Close other Android tools using adb and try again.",
        ),
        (
            "more than one device",
            "More than one device connected",
            "Disconnect all other Android devices.",
        ),
    ];

    for (pattern, summary, suggestion) in patterns {
        if lower.contains(pattern) {
            return Some(ParsedError {
                summary: summary.to_string(),
                detail: None,
                suggestion: suggestion.to_string(),
            });
        }
    }
    None
}

static LAUNCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"failed to launch (\S+): .*(?i:not found|no such file)").unwrap());

fn parse_interpreter_error(message: &str) -> Option<ParsedError> {
    let caps = LAUNCH_RE.captures(message)?;
    let program = caps.get(1)?.as_str().to_string();

    Some(ParsedError {
        summary: format!("{} is not installed", program),
        detail: None,
        suggestion: "Install PowerShell or set scripts.interpreter in the config.".to_string(),
    })
}

static PERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:permission denied|access is denied)[:\s]*([^\n]*)").unwrap());

fn parse_permission_error(message: &str) -> Option<ParsedError> {
    let caps = PERM_RE.captures(message)?;
    let path = caps
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    Some(ParsedError {
        summary: "Permission denied".to_string(),
        detail: path,
        suggestion: "Run as administrator or check ownership of the working directory."
            .to_string(),
    })
}
