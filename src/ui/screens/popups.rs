//! Modal dialogs

use ratatui::{
    layout::{Alignment, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::Popup;
use crate::commands::errors::ParsedError;
use crate::ui::layout::centered_fixed;
use crate::ui::theme;

const CLEANUP_NOTICE: &[&str] = &[
    "This will delete all temporary files including:",
    "- Downloaded platform-tools",
    "- Extracted scripts",
    "- Logs",
];

pub fn draw(frame: &mut Frame, popup: &Popup) {
    match popup {
        Popup::ConfirmAction(kind) => {
            let mut body: Vec<Line> = kind
                .risk_notice()
                .iter()
                .map(|line| Line::from(Span::styled(*line, theme::text())))
                .collect();
            body.push(Line::from(""));
            body.push(Line::from(Span::styled(
                "Are you sure you want to continue?",
                theme::warning(),
            )));
            draw_dialog(
                frame,
                &format!(" Confirm {} ", kind.label()),
                body,
                Some(hints_with_accept("Y")),
                theme::warning(),
            );
        }
        Popup::ConfirmCleanup => {
            let mut body: Vec<Line> = CLEANUP_NOTICE
                .iter()
                .map(|line| Line::from(Span::styled(*line, theme::text())))
                .collect();
            body.push(Line::from(""));
            body.push(Line::from(Span::styled("Continue?", theme::warning())));
            draw_dialog(frame, " Cleanup ", body, Some(yes_no_hints()), theme::warning());
        }
        Popup::CancelRunning => draw_dialog(
            frame,
            " Cancel? ",
            vec![Line::from(Span::styled(
                "A process is already running. Do you want to cancel it?",
                theme::text(),
            ))],
            Some(yes_no_hints()),
            theme::warning(),
        ),
        Popup::ConfirmExit => draw_dialog(
            frame,
            " Exit ",
            vec![Line::from(Span::styled(
                "Are you sure you want to exit?",
                theme::text(),
            ))],
            Some(yes_no_hints()),
            theme::warning(),
        ),
        Popup::ExitWhileBusy => draw_dialog(
            frame,
            " Process Running ",
            vec![Line::from(Span::styled(
                "A process is still running. Exit anyway?",
                theme::text(),
            ))],
            Some(yes_no_hints()),
            theme::error(),
        ),
        Popup::Notice { title, message } => draw_dialog(
            frame,
            &format!(" {} ", title),
            vec![Line::from(Span::styled(message.as_str(), theme::text()))],
            None,
            theme::info(),
        ),
        Popup::Error(error) => draw_error(frame, error),
    }
}

fn draw_error(frame: &mut Frame, error: &ParsedError) {
    let mut body = vec![Line::from(Span::styled(error.summary.as_str(), theme::error()))];
    if let Some(detail) = &error.detail {
        body.push(Line::from(""));
        body.push(Line::from(Span::styled(detail.as_str(), theme::dim())));
    }
    body.push(Line::from(""));
    body.push(Line::from(Span::styled(
        error.suggestion.as_str(),
        theme::text(),
    )));
    draw_dialog(frame, " Error ", body, None, theme::error());
}

fn yes_no_hints() -> Line<'static> {
    hints_with_accept("Enter/Y")
}

fn hints_with_accept(accept: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled("[", theme::dim()),
        Span::styled(accept, theme::key_hint()),
        Span::styled("] Yes  [", theme::dim()),
        Span::styled("Esc/N", theme::key_hint()),
        Span::styled("] No", theme::dim()),
    ])
}

fn ok_hint() -> Line<'static> {
    Line::from(vec![
        Span::styled("[", theme::dim()),
        Span::styled("Enter/Esc", theme::key_hint()),
        Span::styled("] OK", theme::dim()),
    ])
}

fn draw_dialog<'a>(
    frame: &mut Frame,
    title: &str,
    mut body: Vec<Line<'a>>,
    hints: Option<Line<'a>>,
    accent: Style,
) {
    body.insert(0, Line::from(""));
    body.push(Line::from(""));
    body.push(hints.unwrap_or(ok_hint()));

    let width = 64;
    // Borders plus a little slack for wrapped lines
    let height = body.len() as u16 + 4;
    let popup_area: Rect = centered_fixed(width, height, frame.area());

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let content = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(accent)
                .title(Span::styled(title.to_string(), accent)),
        );

    frame.render_widget(content, popup_area);
}
