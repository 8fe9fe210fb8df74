use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use unicode_width::UnicodeWidthStr;

use crate::theme::ThemeColors;

/// Bottom row: path and document info, or a transient message.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    info: &'a str,
    hints: &'a str,
    theme: &'a ThemeColors,
    status_message: Option<&'a str>,
    is_error: bool,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, info: &'a str, theme: &'a ThemeColors) -> Self {
        Self {
            path_str,
            info,
            hints: " ?:help ",
            theme,
            status_message: None,
            is_error: false,
        }
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }

    pub fn hints(mut self, hints: &'a str) -> Self {
        self.hints = hints;
        self
    }
}

/// Keep the end of `path`, which carries the file name.
fn shorten_left(path: &str, budget: usize) -> String {
    if path.width() <= budget {
        return path.to_string();
    }
    if budget <= 3 {
        return ".".repeat(budget);
    }
    let mut tail: Vec<char> = Vec::new();
    let mut used = 3;
    for c in path.chars().rev() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        tail.push(c);
    }
    format!("...{}", tail.into_iter().rev().collect::<String>())
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let width = area.width as usize;
        let bar = Style::default().bg(self.theme.status_bg).fg(self.theme.status_fg);
        buf.set_style(area, bar);

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                bar.fg(self.theme.error_fg).add_modifier(Modifier::BOLD)
            } else {
                bar.fg(self.theme.accent_fg)
            };
            let line = Line::from(Span::styled(format!(" {msg}"), style));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        let right_len = self.info.width() + self.hints.width() + 1;
        let path_budget = width.saturating_sub(right_len + 1);
        let path = shorten_left(self.path_str, path_budget);
        let gap = width.saturating_sub(1 + path.width() + right_len);

        let spans = vec![
            Span::styled(format!(" {path}"), bar),
            Span::styled(" ".repeat(gap), bar),
            Span::styled(self.info.to_string(), bar.fg(self.theme.accent_fg)),
            Span::styled(" ", bar),
            Span::styled(self.hints.to_string(), bar.fg(self.theme.dim_fg)),
        ];
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
