//! Keyboard input handlers for the application

use crossterm::event::KeyCode;

use super::state::*;
use super::App;
use crate::commands::action::ExitOutcome;
use crate::commands::errors::ParsedError;
use crate::workflow::state::{ActionKind, DeviceState, RiskAcknowledgement};

impl App {
    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyCode) {
        if let Some(popup) = self.popup.take() {
            self.handle_popup_key(popup, key);
            return;
        }

        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.request_exit(),
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < MENU_ITEMS.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(action) = MenuAction::from_index(self.selected) {
                    self.activate(action);
                }
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                if self.is_busy() {
                    self.popup = Some(Popup::CancelRunning);
                }
            }
            KeyCode::PageUp => self.scroll_up(10),
            KeyCode::PageDown => self.scroll_down(10),
            KeyCode::End => self.scroll_offset = None,
            _ => {}
        }
    }

    fn handle_popup_key(&mut self, popup: Popup, key: KeyCode) {
        let yes = matches!(key, KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y'));
        let no = matches!(key, KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N'));
        // Risk notices need the key itself, so a stray Enter cannot accept one
        let typed_yes = matches!(key, KeyCode::Char('y') | KeyCode::Char('Y'));

        match popup {
            Popup::ConfirmAction(kind) if typed_yes => {
                self.start_action(kind, RiskAcknowledgement::accepted(kind))
            }
            Popup::ConfirmCleanup if yes => self.run_cleanup(),
            Popup::CancelRunning if yes => {
                self.controller.cancel();
            }
            Popup::ConfirmExit if yes => self.should_quit = true,
            Popup::ExitWhileBusy if yes => {
                self.controller.cancel();
                self.should_quit = true;
            }
            Popup::Notice { .. } | Popup::Error(_) if yes || no => {}
            other if no => {
                tracing::debug!("Dismissed {:?}", other);
            }
            // Ignore anything else and keep the popup open
            other => self.popup = Some(other),
        }
    }

    fn request_exit(&mut self) {
        self.popup = Some(if self.is_busy() {
            Popup::ExitWhileBusy
        } else {
            Popup::ConfirmExit
        });
    }

    fn activate(&mut self, action: MenuAction) {
        match action {
            MenuAction::Exit => self.request_exit(),
            _ if self.is_busy() => self.popup = Some(Popup::CancelRunning),
            MenuAction::Detect => self.start_detect(),
            MenuAction::Action(kind) => self.popup = Some(Popup::ConfirmAction(kind)),
            MenuAction::Cleanup => self.popup = Some(Popup::ConfirmCleanup),
        }
    }

    fn start_detect(&mut self) {
        let controller = self.controller.clone();
        let tx = self.done_tx.clone();
        self.last_error = None;

        tokio::spawn(async move {
            let outcome = match controller.detect().await {
                Ok(report) if report.state == DeviceState::Unauthorized => {
                    Ok(Completion::NeedsAuthorization)
                }
                Ok(_) => Ok(Completion::Done),
                Err(e) => Err(FailedOperation {
                    error: ParsedError::from_workflow_error(&e, Operation::Detect.label()),
                    cancelled: e.is_cancelled(),
                }),
            };
            let _ = tx.send(OperationFinished {
                operation: Operation::Detect,
                outcome,
            });
        });
    }

    fn start_action(&mut self, kind: ActionKind, ack: RiskAcknowledgement) {
        let controller = self.controller.clone();
        let tx = self.done_tx.clone();
        self.last_error = None;

        tokio::spawn(async move {
            let operation = Operation::Action(kind);
            let outcome = match controller.run_action(kind, ack).await {
                Ok(ExitOutcome::Cancelled) => Err(FailedOperation {
                    error: ParsedError {
                        summary: format!("{} cancelled", kind.label()),
                        detail: None,
                        suggestion: "Check the phone before starting again.".to_string(),
                    },
                    cancelled: true,
                }),
                Ok(_) => Ok(Completion::Done),
                Err(e) => Err(FailedOperation {
                    error: ParsedError::from_workflow_error(&e, operation.label()),
                    cancelled: e.is_cancelled(),
                }),
            };
            let _ = tx.send(OperationFinished { operation, outcome });
        });
    }

    fn run_cleanup(&mut self) {
        match self.controller.cleanup() {
            Ok(()) => {
                self.progress = None;
                self.sync_snapshot();
            }
            Err(e) => {
                self.popup = Some(Popup::Error(ParsedError::from_workflow_error(&e, "Cleanup")));
            }
        }
    }

    fn scroll_up(&mut self, lines: usize) {
        let current = self
            .scroll_offset
            .unwrap_or_else(|| self.log.len().saturating_sub(1));
        self.scroll_offset = Some(current.saturating_sub(lines));
    }

    fn scroll_down(&mut self, lines: usize) {
        if let Some(offset) = self.scroll_offset {
            let next = offset + lines;
            self.scroll_offset = if next >= self.log.len().saturating_sub(1) {
                None
            } else {
                Some(next)
            };
        }
    }
}
