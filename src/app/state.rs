//! Application state types and enums

use crate::commands::errors::ParsedError;
use crate::workflow::state::ActionKind;

/// Main menu items
pub const MENU_ITEMS: &[&str] = &[
    "Detect Device",
    "Root Device",
    "Debloat Device",
    "Cleanup temporary files",
    "Exit",
];

/// What a menu entry does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Detect,
    Action(ActionKind),
    Cleanup,
    Exit,
}

impl MenuAction {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(MenuAction::Detect),
            1 => Some(MenuAction::Action(ActionKind::Root)),
            2 => Some(MenuAction::Action(ActionKind::Debloat)),
            3 => Some(MenuAction::Cleanup),
            4 => Some(MenuAction::Exit),
            _ => None,
        }
    }

    /// Changes the handset or deletes files
    pub fn is_risky(&self) -> bool {
        matches!(self, MenuAction::Action(_) | MenuAction::Cleanup)
    }
}

/// Modal dialog shown over the main screen
#[derive(Debug, Clone)]
pub enum Popup {
    /// Risk notice that must be accepted before an action runs
    ConfirmAction(ActionKind),
    /// Wipe the working directory?
    ConfirmCleanup,
    /// Something is running; offer to cancel it
    CancelRunning,
    /// Exit requested while idle
    ConfirmExit,
    /// Exit requested while an operation is in flight
    ExitWhileBusy,
    /// Authorization prompt reminder
    Notice { title: String, message: String },
    /// Failed operation
    Error(ParsedError),
}

/// Long-running operations started from the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Detect,
    Action(ActionKind),
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Detect => "Detect Device",
            Operation::Action(kind) => kind.label(),
        }
    }
}

/// Result of a finished operation, sent back from its task
#[derive(Debug, Clone)]
pub struct OperationFinished {
    pub operation: Operation,
    pub outcome: Result<Completion, FailedOperation>,
}

/// How a successful operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing further to show
    Done,
    /// Device needs the operator's attention
    NeedsAuthorization,
}

/// A failed operation ready for display
#[derive(Debug, Clone)]
pub struct FailedOperation {
    pub error: ParsedError,
    pub cancelled: bool,
}
