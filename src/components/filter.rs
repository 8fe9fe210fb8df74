use std::path::Path;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};

use crate::app::FilterState;
use crate::components::picker::input_line;
use crate::services::SearchMatch;
use crate::theme::ThemeColors;

/// Content search results listed in place of the tree.
pub struct FilterListWidget<'a> {
    state: &'a FilterState,
    root: &'a Path,
    theme: &'a ThemeColors,
}

impl<'a> FilterListWidget<'a> {
    pub fn new(state: &'a FilterState, root: &'a Path, theme: &'a ThemeColors) -> Self {
        Self { state, root, theme }
    }

    fn location(&self, hit: &SearchMatch) -> String {
        let rel = hit.path.strip_prefix(self.root).unwrap_or(&hit.path);
        format!("{}:{}:{}", rel.display(), hit.line, hit.column)
    }
}

impl<'a> Widget for FilterListWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let prompt = input_line("/", &self.state.input, self.state.editing, self.theme);
        buf.set_line(area.x, area.y, &prompt, area.width);

        let rows = area.height as usize - 1;
        if self.state.hits.is_empty() {
            if !self.state.editing && rows > 0 {
                let none = Span::styled("no matches", Style::default().fg(self.theme.dim_fg));
                buf.set_span(area.x, area.y + 1, &none, area.width);
            }
            return;
        }

        for (row, index) in (self.state.scroll..self.state.hits.len())
            .take(rows)
            .enumerate()
        {
            let hit = &self.state.hits[index];
            let selected = index == self.state.selected && !self.state.editing;
            let mut location = Style::default().fg(self.theme.tree_dir_fg);
            let mut preview = Style::default().fg(self.theme.tree_fg);
            if selected {
                location = location.bg(self.theme.tree_selected_bg);
                preview = preview.bg(self.theme.tree_selected_bg);
            }
            let line = Line::from(vec![
                Span::styled(self.location(hit), location),
                Span::styled("  ", preview),
                Span::styled(hit.preview.trim().to_string(), preview),
            ]);
            let y = area.y + 1 + row as u16;
            if selected {
                buf.set_style(Rect::new(area.x, y, area.width, 1), preview);
            }
            buf.set_line(area.x, y, &line, area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::InputLine;
    use crate::theme::dark_theme;
    use std::path::PathBuf;

    fn rows(buf: &Buffer) -> Vec<String> {
        let area = buf.area;
        (area.top()..area.bottom())
            .map(|y| {
                (area.left()..area.right())
                    .map(|x| buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "))
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    fn hit(name: &str, line: usize) -> SearchMatch {
        SearchMatch {
            path: PathBuf::from("/root/proj").join(name),
            line,
            column: 3,
            preview: format!("  needle on {line}"),
        }
    }

    fn state(editing: bool) -> FilterState {
        FilterState {
            input: InputLine {
                text: "needle".to_string(),
                cursor: 6,
            },
            hits: vec![hit("a.rs", 4), hit("b.rs", 9), hit("c.rs", 1)],
            selected: 1,
            scroll: 1,
            editing,
        }
    }

    #[test]
    fn lists_hits_from_scroll() {
        let theme = dark_theme();
        let filter = state(false);
        let area = Rect::new(0, 0, 40, 4);
        let mut buf = Buffer::empty(area);
        FilterListWidget::new(&filter, Path::new("/root/proj"), &theme).render(area, &mut buf);
        let rows = rows(&buf);
        assert_eq!(rows[0], "/needle");
        assert_eq!(rows[1], "b.rs:9:3  needle on 9");
        assert_eq!(rows[2], "c.rs:1:3  needle on 1");
        assert_eq!(buf.cell((0, 1)).unwrap().bg, theme.tree_selected_bg);
    }

    #[test]
    fn editing_shows_cursor_cell() {
        let theme = dark_theme();
        let filter = state(true);
        let area = Rect::new(0, 0, 40, 4);
        let mut buf = Buffer::empty(area);
        FilterListWidget::new(&filter, Path::new("/root/proj"), &theme).render(area, &mut buf);
        assert_eq!(buf.cell((7, 0)).unwrap().bg, theme.preview_fg);
    }

    #[test]
    fn submitted_query_without_hits_says_so() {
        let theme = dark_theme();
        let mut filter = state(false);
        filter.hits.clear();
        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        FilterListWidget::new(&filter, Path::new("/root/proj"), &theme).render(area, &mut buf);
        assert_eq!(rows(&buf)[1], "no matches");
    }
}
