//! Main screen: device status, action menu, activity log

use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::state::MenuAction;
use crate::app::{App, MENU_ITEMS};
use crate::constants::{APP_NAME, APP_VERSION};
use crate::ui::layout::{dashboard_layout, log_layout, main_layout};
use crate::ui::theme;
use crate::ui::widgets::{ActionMenu, LogView, MenuEntry, StatusLine};
use crate::workflow::state::JobState;

pub fn draw(frame: &mut Frame, app: &App) {
    let (header, content, footer) = main_layout(frame.area());
    let (status_area, menu_area, log_column) = dashboard_layout(content);
    let (log_area, progress_area) = log_layout(log_column);

    draw_header(frame, header);
    draw_device_status(frame, status_area, app);

    let entries = MENU_ITEMS
        .iter()
        .enumerate()
        .map(|(i, &label)| MenuEntry {
            label,
            risky: MenuAction::from_index(i).is_some_and(|a| a.is_risky()),
        })
        .collect();
    let menu = ActionMenu::new(entries, app.selected).busy(app.is_busy());
    frame.render_widget(menu, menu_area);

    let log = LogView::new(&app.log)
        .title(" Activity Log ")
        .scroll_offset(app.scroll_offset);
    frame.render_widget(log, log_area);

    let status = StatusLine::new(&app.status, app.is_busy(), app.spinner_state)
        .progress(app.progress);
    frame.render_widget(status, progress_area);

    draw_footer(frame, footer, app);
}

fn draw_header(frame: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(APP_NAME, theme::title()),
        Span::styled(format!("  v{}", APP_VERSION), theme::info()),
    ]))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(theme::border()),
    );
    frame.render_widget(header, area);
}

fn draw_device_status(frame: &mut Frame, area: Rect, app: &App) {
    let firmware = match &app.firmware {
        Some(info) => Span::styled(
            info.label(),
            if info.device_model_matches && info.version_tag.is_some() {
                theme::success()
            } else {
                theme::warning()
            },
        ),
        None => Span::styled("Unknown", theme::dim()),
    };
    let tools = if app.tools_installed {
        Span::styled("Installed", theme::success())
    } else {
        Span::styled("Download on first use", theme::dim())
    };
    let last_run = match &app.last_job {
        Some(job) => Span::styled(
            job.summary(),
            match job.state {
                JobState::Succeeded => theme::success(),
                JobState::Failed(_) | JobState::Cancelled => theme::warning(),
                _ => theme::text(),
            },
        ),
        None => Span::styled("None", theme::dim()),
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Device:   ", theme::dim()),
            Span::styled(app.device.label(), theme::device(app.device)),
        ]),
        Line::from(vec![Span::styled("Firmware: ", theme::dim()), firmware]),
        Line::from(vec![Span::styled("Tools:    ", theme::dim()), tools]),
        Line::from(vec![Span::styled("Last run: ", theme::dim()), last_run]),
        Line::from(vec![
            Span::styled("Work dir: ", theme::dim()),
            Span::styled(app.work_dir.display().to_string(), theme::text()),
        ]),
    ];

    let panel = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border())
            .title(Span::styled(" Device Status ", theme::title())),
    );
    frame.render_widget(panel, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut hints = vec![
        Span::styled("[", theme::dim()),
        Span::styled("↑↓", theme::key_hint()),
        Span::styled("] Navigate  [", theme::dim()),
        Span::styled("Enter", theme::key_hint()),
        Span::styled("] Select  [", theme::dim()),
        Span::styled("PgUp/PgDn", theme::key_hint()),
        Span::styled("] Scroll log  [", theme::dim()),
    ];
    if app.is_busy() {
        hints.push(Span::styled("c", theme::key_hint()));
        hints.push(Span::styled("] Cancel  [", theme::dim()));
    }
    hints.push(Span::styled("q", theme::key_hint()));
    hints.push(Span::styled("] Quit", theme::dim()));

    let mut lines = vec![Line::from(hints)];
    if let Some(error) = &app.last_error {
        lines.push(Line::from(Span::styled(
            format!("Last error: {}", error.summary),
            theme::error(),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!("Log file: {}", app.log_path.display()),
            theme::dim(),
        )));
    }

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}
