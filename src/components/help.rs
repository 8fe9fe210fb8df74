use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

use crate::theme::ThemeColors;

/// `(keys, description)` pairs grouped under a heading.
type Section = (&'static str, &'static [(&'static str, &'static str)]);

const SECTIONS: &[Section] = &[
    (
        "Tree",
        &[
            ("j / k  ↓ / ↑", "Select next / previous entry"),
            ("g / G", "First / last entry"),
            ("Enter / l / →", "Expand directory"),
            ("h / ← / Backspace", "Collapse, or go to parent"),
            (".", "Toggle hidden files"),
            ("Shift+← / →", "Narrow / widen the tree pane"),
        ],
    ),
    (
        "Preview",
        &[
            ("J / K", "Scroll one row"),
            ("Ctrl+D / Ctrl+U", "Scroll half a page"),
            ("PgDn / PgUp", "Scroll a page"),
            ("Home / End", "Top / bottom of preview"),
            ("< / >", "Scroll horizontally (nowrap)"),
            ("w", "Toggle line wrap"),
            ("d", "Toggle diff view"),
            ("v", "Start / clear row selection"),
            ("+", "Show more directory entries"),
            ("] / [", "Next / previous change"),
            ("Wheel", "Scroll pane under pointer"),
            ("Click / drag", "Select tree row / preview text"),
        ],
    ),
    (
        "Search",
        &[
            ("Ctrl+P", "Fuzzy file picker"),
            ("/", "Search file contents"),
            ("↑ / ↓, Ctrl+J / K", "Move between hits"),
            ("n / N", "Next / previous match"),
            ("Enter", "Open selected hit"),
            ("Esc", "Close picker or search"),
        ],
    ),
    (
        "Marks & History",
        &[
            ("m <key>", "Set mark at current position"),
            ("' <key>", "Jump to mark"),
            ("Alt+← / →", "Back / forward in history"),
        ],
    ),
    (
        "General",
        &[
            ("?", "Toggle this help"),
            ("q / Ctrl+C", "Quit"),
        ],
    ),
];

const KEY_COLUMN: usize = 22;

/// Centered keybinding reference.
pub struct HelpOverlay<'a> {
    theme: &'a ThemeColors,
}

impl<'a> HelpOverlay<'a> {
    pub fn new(theme: &'a ThemeColors) -> Self {
        Self { theme }
    }

    fn content_lines(&self) -> Vec<Line<'static>> {
        let heading = Style::default()
            .fg(self.theme.accent_fg)
            .add_modifier(Modifier::BOLD);
        let key_style = Style::default().fg(self.theme.tree_dir_fg);
        let text_style = Style::default().fg(self.theme.preview_fg);

        let mut lines = Vec::with_capacity(Self::total_lines());
        for (name, entries) in SECTIONS {
            lines.push(Line::from(Span::styled(name.to_string(), heading)));
            for (keys, description) in entries.iter() {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {keys:<KEY_COLUMN$}"), key_style),
                    Span::styled(*description, text_style),
                ]));
            }
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            "? or Esc closes",
            Style::default().fg(self.theme.dim_fg),
        )));
        lines
    }

    pub fn total_lines() -> usize {
        SECTIONS.iter().map(|(_, e)| e.len() + 2).sum::<usize>() + 1
    }
}

impl<'a> Widget for HelpOverlay<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = ((u32::from(area.width) * 7 / 10) as u16).clamp(area.width.min(30), 72);
        let height = (Self::total_lines() as u16 + 2).min(area.height);
        if width < 4 || height < 3 {
            return;
        }
        let dialog = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );
        Clear.render(dialog, buf);
        let block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent_fg))
            .style(Style::default().bg(self.theme.overlay_bg));
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        for (i, line) in self
            .content_lines()
            .iter()
            .take(inner.height as usize)
            .enumerate()
        {
            buf.set_line(inner.x + 1, inner.y + i as u16, line, inner.width.saturating_sub(1));
        }
    }
}
