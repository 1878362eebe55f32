//! Status line with spinner and download gauge

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget},
};

use crate::commands::DownloadProgress;
use crate::ui::theme;
use crate::ui::widgets::Spinner;

pub struct StatusLine<'a> {
    status: &'a str,
    busy: bool,
    spinner_state: usize,
    progress: Option<DownloadProgress>,
}

impl<'a> StatusLine<'a> {
    pub fn new(status: &'a str, busy: bool, spinner_state: usize) -> Self {
        Self {
            status,
            busy,
            spinner_state,
            progress: None,
        }
    }

    pub fn progress(mut self, progress: Option<DownloadProgress>) -> Self {
        self.progress = progress;
        self
    }
}

impl Widget for StatusLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border())
            .title(Span::styled(" Status ", theme::title()));
        let inner = block.inner(area);
        block.render(area, buf);

        let percent = self.progress.and_then(|p| p.percent());
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(if percent.is_some() {
                [Constraint::Min(10), Constraint::Length(24)]
            } else {
                [Constraint::Min(10), Constraint::Length(0)]
            })
            .split(inner);

        let prefix = if self.busy {
            format!("{} ", Spinner::new(self.spinner_state).char())
        } else {
            "  ".to_string()
        };
        Paragraph::new(Line::from(vec![
            Span::styled(prefix, theme::info()),
            Span::styled(self.status, theme::text()),
        ]))
        .render(chunks[0], buf);

        if let Some(percent) = percent {
            Gauge::default()
                .gauge_style(theme::success())
                .percent(u16::from(percent))
                .render(chunks[1], buf);
        }
    }
}
