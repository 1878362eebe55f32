//! Activity reporting
//!
//! [`Reporter`] is the single writer of the user-facing activity log. Every
//! line is appended and flushed to the log file, sent to the presentation
//! layer as a [`WorkflowEvent`], and mirrored to `tracing`, all under one lock
//! so the three views never disagree on ordering.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{DownloadProgress, LogLevel, LogLine, WorkflowEvent};
use crate::workflow::state::{DeviceState, FirmwareInfo, WorkflowState};

struct Journal {
    file: Option<File>,
    path: PathBuf,
}

/// Cloneable handle to the activity log and event channel
#[derive(Clone)]
pub struct Reporter {
    journal: Arc<Mutex<Journal>>,
    tx: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl Reporter {
    /// Create a reporter appending to `log_path` and publishing on `tx`
    pub fn new(log_path: impl Into<PathBuf>, tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        Self::build(log_path.into(), Some(tx))
    }

    /// Reporter with no observer; lines only go to the file and tracing
    pub fn detached(log_path: impl Into<PathBuf>) -> Self {
        Self::build(log_path.into(), None)
    }

    fn build(path: PathBuf, tx: Option<mpsc::UnboundedSender<WorkflowEvent>>) -> Self {
        let file = open_append(&path);
        Self {
            journal: Arc::new(Mutex::new(Journal { file, path })),
            tx,
        }
    }

    /// Path of the activity log file
    pub fn log_path(&self) -> PathBuf {
        self.journal.lock().path.clone()
    }

    /// Reopen the log file, e.g. after the working directory was recreated
    pub fn reopen(&self) {
        let mut journal = self.journal.lock();
        journal.file = open_append(&journal.path);
        self.send(WorkflowEvent::LogReset);
    }

    /// Close the log file so its directory can be removed. Lines logged while
    /// suspended still reach the channel and tracing.
    pub fn suspend(&self) {
        self.journal.lock().file = None;
    }

    /// Append a leveled line
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let line = LogLine::new(level, message);
        match level {
            LogLevel::Debug => tracing::debug!("{}", line.message),
            LogLevel::Info | LogLevel::Success => tracing::info!("{}", line.message),
            LogLevel::Warning => tracing::warn!("{}", line.message),
            LogLevel::Error => tracing::error!("{}", line.message),
        }

        let mut journal = self.journal.lock();
        if let Some(file) = journal.file.as_mut() {
            // The on-screen log remains authoritative if the file write fails
            if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                tracing::debug!("Failed to write activity log: {}", e);
            }
        }
        self.send(WorkflowEvent::Log(line));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Update the status line
    pub fn status(&self, message: impl Into<String>) {
        let _journal = self.journal.lock();
        self.send(WorkflowEvent::Status(message.into()));
    }

    pub fn progress(&self, progress: DownloadProgress) {
        let _journal = self.journal.lock();
        self.send(WorkflowEvent::Progress(progress));
    }

    pub fn state_changed(&self, state: WorkflowState) {
        let _journal = self.journal.lock();
        self.send(WorkflowEvent::StateChanged(state));
    }

    pub fn device(&self, state: DeviceState, firmware: Option<FirmwareInfo>) {
        let _journal = self.journal.lock();
        self.send(WorkflowEvent::Device { state, firmware });
    }

    fn send(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.tx {
            // Observer may have gone away during shutdown
            let _ = tx.send(event);
        }
    }
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!("Failed to open activity log {}: {}", path.display(), e);
            None
        }
    }
}
