//! Scrollable activity log widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use std::collections::VecDeque;

use crate::commands::LogLine;
use crate::ui::theme;

pub struct LogView<'a> {
    lines: &'a VecDeque<LogLine>,
    title: Option<&'a str>,
    scroll_offset: Option<usize>,
}

impl<'a> LogView<'a> {
    pub fn new(lines: &'a VecDeque<LogLine>) -> Self {
        Self {
            lines,
            title: None,
            scroll_offset: None,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    /// Set a manual scroll offset; `None` follows the newest line
    pub fn scroll_offset(mut self, offset: Option<usize>) -> Self {
        self.scroll_offset = offset;
        self
    }
}

impl Widget for LogView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border());

        if let Some(title) = self.title {
            block = block.title(Span::styled(title, theme::title()));
        }

        // Account for borders
        let inner_height = area.height.saturating_sub(2) as usize;
        let start = match self.scroll_offset {
            Some(offset) => offset.min(self.lines.len().saturating_sub(1)),
            None => self.lines.len().saturating_sub(inner_height),
        };

        let visible_lines: Vec<Line> = self
            .lines
            .iter()
            .skip(start)
            .take(inner_height)
            .map(|line| {
                Line::from(vec![
                    Span::styled(
                        format!("[{}] ", line.timestamp.format("%H:%M:%S")),
                        theme::dim(),
                    ),
                    Span::styled(line.message.as_str(), theme::log_level(line.level)),
                ])
            })
            .collect();

        Paragraph::new(visible_lines).block(block).render(area, buf);
    }
}
