//! Reusable UI widgets

mod action_menu;
mod log_view;
mod progress;
mod spinner;

pub use action_menu::{ActionMenu, MenuEntry};
pub use log_view::LogView;
pub use progress::StatusLine;
pub use spinner::Spinner;
