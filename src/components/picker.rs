use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Widget},
};

use crate::app::{InputLine, PickerHit, PickerState};
use crate::theme::ThemeColors;

/// Rows above the result list: query input and separator.
const HEADER_ROWS: u16 = 2;

/// Centered dialog rectangle, or `None` when the screen is too small.
fn dialog_rect(area: Rect) -> Option<Rect> {
    if area.height < 5 || area.width < 20 {
        return None;
    }
    let width = ((u32::from(area.width) * 60 / 100) as u16)
        .clamp(30, 80)
        .min(area.width);
    let height = ((u32::from(area.height) * 60 / 100) as u16)
        .clamp(8, 30)
        .min(area.height);
    Some(Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    ))
}

fn dialog_block(title: &str, theme: &ThemeColors) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent_fg))
        .style(Style::default().bg(theme.overlay_bg))
        .padding(Padding::horizontal(1))
}

fn has_hint_row(inner: Rect) -> bool {
    inner.height > HEADER_ROWS + 1
}

/// Number of result rows the picker shows for a screen of `area`.
pub fn list_rows(area: Rect) -> usize {
    let Some(rect) = dialog_rect(area) else {
        return 0;
    };
    // Borders take one row above and below.
    let inner = Rect::new(rect.x, rect.y + 1, rect.width, rect.height.saturating_sub(2));
    let hint = u16::from(has_hint_row(inner));
    inner.height.saturating_sub(HEADER_ROWS + hint) as usize
}

/// `prompt` followed by the input text with a block cursor.
pub(crate) fn input_line<'a>(
    prompt: &'a str,
    input: &'a InputLine,
    show_cursor: bool,
    theme: &ThemeColors,
) -> Line<'a> {
    let text_style = Style::default().fg(theme.preview_fg);
    let prompt_style = Style::default()
        .fg(theme.accent_fg)
        .add_modifier(Modifier::BOLD);
    let cursor = input.cursor.min(input.text.len());
    let (before, rest) = input.text.split_at(cursor);
    let mut spans = vec![Span::styled(prompt, prompt_style), Span::styled(before, text_style)];
    if !show_cursor {
        spans.push(Span::styled(rest, text_style));
        return Line::from(spans);
    }
    let cursor_style = Style::default().bg(theme.preview_fg).fg(theme.overlay_bg);
    match rest.chars().next() {
        Some(c) => {
            let (at, after) = rest.split_at(c.len_utf8());
            spans.push(Span::styled(at, cursor_style));
            spans.push(Span::styled(after, text_style));
        }
        None => spans.push(Span::styled(" ", cursor_style)),
    }
    Line::from(spans)
}

/// Fuzzy file picker overlay.
pub struct PickerWidget<'a> {
    state: &'a PickerState,
    theme: &'a ThemeColors,
}

impl<'a> PickerWidget<'a> {
    pub fn new(state: &'a PickerState, theme: &'a ThemeColors) -> Self {
        Self { state, theme }
    }

    /// Path text with matched characters emphasized.
    fn hit_line(&self, hit: &PickerHit, selected: bool) -> Line<'static> {
        let base = if selected {
            Style::default()
                .fg(self.theme.preview_fg)
                .bg(self.theme.tree_selected_bg)
        } else {
            Style::default().fg(self.theme.tree_fg)
        };
        let matched = base.fg(self.theme.accent_fg).add_modifier(Modifier::BOLD);

        let mut spans = vec![Span::styled(if selected { "▸ " } else { "  " }, base)];
        let mut run = String::new();
        let mut run_matched = false;
        for (i, c) in hit.path.to_string_lossy().chars().enumerate() {
            let is_match = hit.indices.contains(&i);
            if is_match != run_matched && !run.is_empty() {
                spans.push(Span::styled(
                    std::mem::take(&mut run),
                    if run_matched { matched } else { base },
                ));
            }
            run_matched = is_match;
            run.push(c);
        }
        if !run.is_empty() {
            spans.push(Span::styled(run, if run_matched { matched } else { base }));
        }
        Line::from(spans)
    }
}

impl<'a> Widget for PickerWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(rect) = dialog_rect(area) else {
            return;
        };
        Clear.render(rect, buf);
        let block = dialog_block("Open file (Ctrl+P)", self.theme);
        let inner = block.inner(rect);
        block.render(rect, buf);
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let input = input_line("> ", &self.state.input, true, self.theme);
        buf.set_line(inner.x, inner.y, &input, inner.width);

        if inner.height > 1 {
            let count = match self.state.hits.len() {
                1 => "1 file".to_string(),
                n => format!("{n} files"),
            };
            let separator = Line::from(Span::styled(
                format!("─── {count} "),
                Style::default().fg(self.theme.dim_fg),
            ));
            buf.set_line(inner.x, inner.y + 1, &separator, inner.width);
        }

        let rows = list_rows(area);
        for (row, index) in (self.state.scroll..self.state.hits.len())
            .take(rows)
            .enumerate()
        {
            let selected = index == self.state.selected;
            let line = self.hit_line(&self.state.hits[index], selected);
            let y = inner.y + HEADER_ROWS + row as u16;
            if selected {
                buf.set_style(
                    Rect::new(inner.x, y, inner.width, 1),
                    Style::default().bg(self.theme.tree_selected_bg),
                );
            }
            buf.set_line(inner.x, y, &line, inner.width);
        }

        if has_hint_row(inner) {
            let hint = Line::from(Span::styled(
                "enter open  esc close  ↑↓ move",
                Style::default().fg(self.theme.dim_fg),
            ));
            buf.set_line(inner.x, inner.bottom() - 1, &hint, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::dark_theme;
    use std::path::PathBuf;

    fn screen(buf: &Buffer) -> String {
        let area = buf.area;
        let mut s = String::new();
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                s.push_str(buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "));
            }
            s.push('\n');
        }
        s
    }

    fn state(paths: &[&str]) -> PickerState {
        PickerState::new(paths.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn list_rows_matches_dialog_geometry() {
        // 80x24: dialog 48x14, inner 12 rows, minus input, separator and hint.
        assert_eq!(list_rows(Rect::new(0, 0, 80, 24)), 9);
        assert_eq!(list_rows(Rect::new(0, 0, 10, 3)), 0);
    }

    #[test]
    fn renders_query_count_and_hits() {
        let mut picker = state(&["src/main.rs", "src/app.rs", "README.md"]);
        picker.input.insert('m');
        picker.input.insert('a');
        picker.refilter();
        let theme = dark_theme();
        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        PickerWidget::new(&picker, &theme).render(area, &mut buf);
        let text = screen(&buf);
        assert!(text.contains("Open file"));
        assert!(text.contains("> ma"));
        assert!(text.contains("src/main.rs"));
        assert!(text.contains("▸ "));
    }

    #[test]
    fn empty_query_lists_candidates() {
        let picker = state(&["a.txt", "b.txt"]);
        let theme = dark_theme();
        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        PickerWidget::new(&picker, &theme).render(area, &mut buf);
        let text = screen(&buf);
        assert!(text.contains("2 files"));
        assert!(text.contains("a.txt"));
        assert!(text.contains("b.txt"));
    }

    #[test]
    fn cursor_sits_on_character() {
        let theme = dark_theme();
        let input = InputLine {
            text: "abc".to_string(),
            cursor: 1,
        };
        let line = input_line("/", &input, true, &theme);
        let parts: Vec<&str> = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(parts, vec!["/", "a", "b", "c"]);
    }

    #[test]
    fn too_small_screen_draws_nothing() {
        let picker = state(&["a.txt"]);
        let theme = dark_theme();
        let area = Rect::new(0, 0, 15, 4);
        let mut buf = Buffer::empty(area);
        PickerWidget::new(&picker, &theme).render(area, &mut buf);
        assert!(!screen(&buf).contains("a.txt"));
    }
}
