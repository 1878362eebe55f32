//! Application state management
//!
//! This module contains the TUI state and is split into:
//! - `state.rs` - State type definitions (menu, popups, operation results)
//! - `handlers.rs` - Keyboard input handlers
//! - `messages.rs` - Workflow event and completion handling

mod handlers;
mod messages;
pub mod state;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::commands::errors::ParsedError;
use crate::commands::{DownloadProgress, LogLine};
use crate::constants::SPINNER_TICK_MS;
use crate::workflow::state::{DeviceState, FirmwareInfo, ScriptJob, WorkflowState};
use crate::workflow::WorkflowController;

pub use state::{OperationFinished, Popup, MENU_ITEMS};

/// Main application state
pub struct App {
    pub controller: WorkflowController,
    pub should_quit: bool,
    pub selected: usize,
    pub popup: Option<Popup>,
    pub workflow_state: WorkflowState,
    pub device: DeviceState,
    pub firmware: Option<FirmwareInfo>,
    pub tools_installed: bool,
    pub last_job: Option<ScriptJob>,
    pub status: String,
    pub progress: Option<DownloadProgress>,
    pub log: VecDeque<LogLine>,
    /// None = auto-scroll, Some(n) = manual scroll at position n
    pub scroll_offset: Option<usize>,
    pub last_error: Option<ParsedError>,
    pub work_dir: PathBuf,
    pub log_path: PathBuf,
    pub spinner_state: usize,
    pub last_tick: Instant,
    done_tx: mpsc::UnboundedSender<OperationFinished>,
}

impl App {
    pub fn new(
        controller: WorkflowController,
        done_tx: mpsc::UnboundedSender<OperationFinished>,
    ) -> Self {
        let snapshot = controller.snapshot();
        Self {
            should_quit: false,
            selected: 0,
            popup: None,
            workflow_state: snapshot.state,
            device: snapshot.device,
            firmware: snapshot.firmware.clone(),
            tools_installed: snapshot.tools_installed(),
            last_job: snapshot.job.clone(),
            status: "Ready".to_string(),
            progress: None,
            log: VecDeque::new(),
            scroll_offset: None,
            last_error: None,
            work_dir: snapshot.work_dir.clone(),
            log_path: snapshot.log_path.clone(),
            spinner_state: 0,
            last_tick: Instant::now(),
            controller,
            done_tx,
        }
    }

    /// True while the controller runs an operation
    pub fn is_busy(&self) -> bool {
        !self.workflow_state.is_idle()
    }

    /// Called on each tick to update animations
    pub fn tick(&mut self) {
        if self.last_tick.elapsed().as_millis() >= SPINNER_TICK_MS {
            self.spinner_state = (self.spinner_state + 1) % 10;
            self.last_tick = Instant::now();
        }
    }

    /// Refresh cached controller state
    pub fn sync_snapshot(&mut self) {
        let snapshot = self.controller.snapshot();
        self.workflow_state = snapshot.state;
        self.device = snapshot.device;
        self.firmware = snapshot.firmware.clone();
        self.tools_installed = snapshot.tools_installed();
        self.last_job = snapshot.job;
    }
}
