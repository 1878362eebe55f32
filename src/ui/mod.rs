//! UI rendering module

mod layout;
mod screens;
pub mod theme;
pub mod widgets;

use ratatui::Frame;

use crate::app::App;

/// Main draw function: the dashboard plus any open popup
pub fn draw(frame: &mut Frame, app: &App) {
    screens::dashboard::draw(frame, app);

    if let Some(popup) = &app.popup {
        screens::popups::draw(frame, popup);
    }
}
