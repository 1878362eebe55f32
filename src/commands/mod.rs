//! Command execution module
//!
//! Everything below the workflow controller: process execution, tool
//! provisioning, device probing and script execution. Results and log lines
//! travel upward as [`WorkflowEvent`]s.

pub mod action;
pub mod errors;
pub mod executor;
pub mod probe;
pub mod provision;
pub mod reporter;

use chrono::{DateTime, Local};
use std::fmt;

use crate::workflow::state::{DeviceState, FirmwareInfo, WorkflowState};

/// Severity of an activity log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Success => "Success",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
        };
        f.write_str(name)
    }
}

/// One timestamped line of the activity log
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Download progress for the platform-tools archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub received: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Percentage complete, when the total size is known
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some(((self.received.min(total) * 100) / total) as u8),
        }
    }
}

/// Messages sent from the workflow to the presentation layer
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Activity log line
    Log(LogLine),
    /// Human-readable status line
    Status(String),
    /// Controller state transition
    StateChanged(WorkflowState),
    /// Download progress
    Progress(DownloadProgress),
    /// Result of a completed probe
    Device {
        state: DeviceState,
        firmware: Option<FirmwareInfo>,
    },
    /// Working area was wiped; observers should clear their log view
    LogReset,
}
