//! Numbered action menu with risk markers

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::ui::theme;

/// One row of the menu
#[derive(Debug, Clone, Copy)]
pub struct MenuEntry<'a> {
    pub label: &'a str,
    /// Changes the device or wipes files; drawn with a `!` marker
    pub risky: bool,
}

pub struct ActionMenu<'a> {
    entries: Vec<MenuEntry<'a>>,
    cursor: Option<usize>,
    busy: bool,
}

impl<'a> ActionMenu<'a> {
    pub fn new(entries: Vec<MenuEntry<'a>>, cursor: usize) -> Self {
        let cursor = (!entries.is_empty()).then(|| cursor.min(entries.len() - 1));
        Self {
            entries,
            cursor,
            busy: false,
        }
    }

    /// Grey out the menu while an operation runs
    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }

    fn row(&self, index: usize, entry: &MenuEntry<'a>) -> Line<'a> {
        let here = self.cursor == Some(index);
        let label_style = match (here, self.busy) {
            (true, _) => theme::selected(),
            (false, true) => theme::dim(),
            (false, false) => theme::text(),
        };
        let marker = if entry.risky {
            Span::styled(" ! ", if self.busy { theme::dim() } else { theme::warning() })
        } else {
            Span::raw("   ")
        };

        Line::from(vec![
            Span::styled(if here { "> " } else { "  " }, label_style),
            Span::styled(format!("{}. ", index + 1), theme::key_hint()),
            Span::styled(entry.label, label_style),
            marker,
        ])
    }
}

impl Widget for ActionMenu<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.busy { " Actions (busy) " } else { " Actions " };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.busy { theme::dim() } else { theme::border() })
            .title(Span::styled(title, theme::title()));

        let lines: Vec<Line> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| self.row(i, entry))
            .collect();

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<MenuEntry<'static>> {
        vec![
            MenuEntry { label: "Detect", risky: false },
            MenuEntry { label: "Root", risky: true },
        ]
    }

    fn rendered(menu: ActionMenu<'_>) -> Vec<String> {
        let area = Rect::new(0, 0, 30, 4);
        let mut buf = Buffer::empty(area);
        menu.render(area, &mut buf);
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn test_cursor_and_risk_marker() {
        let rows = rendered(ActionMenu::new(entries(), 1));
        assert!(rows[1].contains("  1. Detect"));
        assert!(!rows[1].contains('!'));
        assert!(rows[2].contains("> 2. Root !"));
    }

    #[test]
    fn test_cursor_is_clamped_and_busy_title() {
        let rows = rendered(ActionMenu::new(entries(), 9).busy(true));
        assert!(rows[0].contains("Actions (busy)"));
        assert!(rows[2].contains("> 2. Root"));
    }

    #[test]
    fn test_empty_menu_has_no_cursor() {
        let rows = rendered(ActionMenu::new(Vec::new(), 3));
        assert!(rows.iter().all(|r| !r.contains('>')));
    }
}
