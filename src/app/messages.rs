//! Workflow event handling for the application

use regex::Regex;
use std::sync::LazyLock;

use super::state::{Completion, OperationFinished, Popup};
use super::App;
use crate::commands::{LogLine, WorkflowEvent};
use crate::constants::OUTPUT_BUFFER_SIZE;
use crate::workflow::state::WorkflowState;

/// Regex to match ANSI escape codes.
static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap());

/// Strip ANSI escape codes from a string
fn strip_ansi_codes(s: &str) -> String {
    ANSI_RE.replace_all(s, "").to_string()
}

impl App {
    /// Handle events published by the workflow controller
    pub fn handle_workflow_event(&mut self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::Log(line) => self.append_log(line),
            WorkflowEvent::Status(status) => self.status = status,
            WorkflowEvent::StateChanged(state) => {
                self.workflow_state = state;
                if state == WorkflowState::Idle {
                    self.progress = None;
                    self.sync_snapshot();
                }
            }
            WorkflowEvent::Progress(progress) => self.progress = Some(progress),
            WorkflowEvent::Device { state, firmware } => {
                self.device = state;
                self.firmware = firmware;
            }
            WorkflowEvent::LogReset => {
                self.log.clear();
                self.scroll_offset = None;
            }
        }
    }

    /// Handle the result of a task started from the menu
    pub fn handle_operation_finished(&mut self, finished: OperationFinished) {
        tracing::debug!("{} finished", finished.operation.label());
        match finished.outcome {
            Ok(Completion::Done) => {}
            Ok(Completion::NeedsAuthorization) => {
                self.popup = Some(Popup::Notice {
                    title: "Authorization Required".to_string(),
                    message: "Please accept the USB debugging authorization prompt on your \
                              phone, then select Detect Device again."
                        .to_string(),
                });
            }
            Err(failed) => {
                self.last_error = Some(failed.error.clone());
                if !failed.cancelled {
                    self.popup = Some(Popup::Error(failed.error));
                }
            }
        }
    }

    fn append_log(&mut self, mut line: LogLine) {
        line.message = strip_ansi_codes(&line.message);
        self.log.push_back(line);
        while self.log.len() > OUTPUT_BUFFER_SIZE {
            self.log.pop_front();
            if let Some(offset) = self.scroll_offset.as_mut() {
                *offset = offset.saturating_sub(1);
            }
        }
    }
}
