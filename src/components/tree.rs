use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::fs::tree::{FlatItem, TreeState};
use crate::services::{Badge, VersionControl};
use crate::theme::ThemeColors;

/// File tree pane with box-drawing connectors and VCS badges.
pub struct TreeWidget<'a> {
    tree_state: &'a TreeState,
    theme: &'a ThemeColors,
    vcs: &'a dyn VersionControl,
}

impl<'a> TreeWidget<'a> {
    pub fn new(tree_state: &'a TreeState, theme: &'a ThemeColors, vcs: &'a dyn VersionControl) -> Self {
        Self {
            tree_state,
            theme,
            vcs,
        }
    }

    /// Connector prefix for `items[index]`, walking back to find whether
    /// each ancestor level is the last sibling.
    fn build_prefix(items: &[FlatItem], index: usize) -> String {
        let item = &items[index];
        if item.depth == 0 {
            return String::new();
        }
        let mut prefix = String::new();
        for level in 1..item.depth {
            let ancestor_is_last = items[..index]
                .iter()
                .rev()
                .take_while(|other| other.depth >= level)
                .find(|other| other.depth == level)
                .map(|other| other.is_last_sibling)
                .unwrap_or(false);
            prefix.push_str(if ancestor_is_last { "   " } else { "│  " });
        }
        prefix.push_str(if item.is_last_sibling { "└─ " } else { "├─ " });
        prefix
    }

    fn badge_span(badge: Badge) -> Option<Span<'static>> {
        let (text, color) = match badge {
            Badge::None => return None,
            Badge::Modified => (" [M]", Color::Indexed(214)),
            Badge::Untracked => (" [?]", Color::Indexed(42)),
        };
        Some(Span::styled(text, Style::default().fg(color)))
    }

    fn item_style(&self, item: &FlatItem, selected: bool) -> Style {
        let base = if item.name.starts_with('.') && item.depth > 0 {
            Style::default().fg(self.theme.tree_hidden_fg)
        } else if item.is_dir {
            Style::default()
                .fg(self.theme.tree_dir_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.tree_fg)
        };
        if selected {
            base.bg(self.theme.tree_selected_bg)
        } else {
            base
        }
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let items = &self.tree_state.flat_items;
        let visible_height = area.height as usize;
        if items.is_empty() || visible_height == 0 || area.width == 0 {
            return;
        }

        let scroll = self.tree_state.scroll_offset;
        let selected = self.tree_state.selected_index;

        for (row, index) in (scroll..items.len()).take(visible_height).enumerate() {
            let item = &items[index];
            let is_selected = index == selected;
            let style = self.item_style(item, is_selected);

            let prefix = Self::build_prefix(items, index);
            let name = if item.is_dir && item.depth > 0 {
                format!("{}/", item.name)
            } else {
                item.name.clone()
            };

            let mut spans = vec![
                Span::styled(prefix, Style::default().fg(self.theme.dim_fg)),
                Span::styled(name, style),
            ];
            spans.extend(Self::badge_span(self.vcs.status_badge(&item.path)));

            let y = area.y + row as u16;
            if is_selected {
                buf.set_style(Rect::new(area.x, y, area.width, 1), style);
            }
            buf.set_line(area.x, y, &Line::from(spans), area.width);
        }
    }
}
