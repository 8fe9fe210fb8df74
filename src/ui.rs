use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::Widget,
};

use crate::app::{App, Mode};
use crate::components::filter::FilterListWidget;
use crate::components::help::HelpOverlay;
use crate::components::picker::PickerWidget;
use crate::components::preview::PreviewWidget;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;

/// Screen regions for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Panes {
    pub tree: Rect,
    pub divider: Rect,
    pub preview: Rect,
    pub status: Rect,
}

/// Split `area` into tree, divider and preview columns over a status row.
pub fn panes(area: Rect, left_width: u16) -> Panes {
    let body_height = area.height.saturating_sub(1);
    let left = left_width.min(area.width);
    let divider_width = u16::from(area.width > left);
    Panes {
        tree: Rect::new(area.x, area.y, left, body_height),
        divider: Rect::new(area.x + left, area.y, divider_width, body_height),
        preview: Rect::new(
            area.x + left + divider_width,
            area.y,
            area.width - left - divider_width,
            body_height,
        ),
        status: Rect::new(area.x, area.y + body_height, area.width, area.height.min(1)),
    }
}

/// Compose the complete frame for the current state.
pub fn render_frame(app: &App) -> Buffer {
    let area = app.area;
    let mut buf = Buffer::empty(area);
    if area.width == 0 || area.height == 0 {
        return buf;
    }
    let panes = app.panes();

    match (&app.mode, &app.filter) {
        (Mode::Filter, Some(filter)) => {
            FilterListWidget::new(filter, &app.root, &app.theme).render(panes.tree, &mut buf)
        }
        _ => TreeWidget::new(&app.tree, &app.theme, app.services.vcs.as_ref())
            .render(panes.tree, &mut buf),
    }

    let divider_style = Style::default().fg(app.theme.border_fg);
    for y in panes.divider.top()..panes.divider.bottom() {
        buf.set_string(panes.divider.x, y, "│", divider_style);
    }

    PreviewWidget::new(app).render(panes.preview, &mut buf);

    let path = status_path(app);
    let info = status_info(app);
    let mut bar = StatusBarWidget::new(&path, &info, &app.theme).hints(mode_hints(app));
    if let Some(msg) = &app.status {
        bar = bar.status_message(&msg.text, msg.is_error);
    }
    bar.render(panes.status, &mut buf);

    if let Some(picker) = &app.picker {
        PickerWidget::new(picker, &app.theme).render(area, &mut buf);
    }
    if app.show_help {
        HelpOverlay::new(&app.theme).render(area, &mut buf);
    }
    buf
}

fn status_path(app: &App) -> String {
    let path = &app.document.path;
    match path.strip_prefix(&app.root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

fn status_info(app: &App) -> String {
    let mut info = format!(
        "{} {}L",
        app.document.kind_label(),
        app.document.logical_line_count()
    );
    if app.document.truncated {
        info.push_str(" (+ more)");
    }
    if !app.wrap {
        info.push_str(" nowrap");
    }
    if let Some(selection) = app.selection() {
        info.push_str(&format!(" sel {}-{}", selection.start.row + 1, selection.end.row + 1));
    }
    info.push_str(&format!(" {:.0}%", app.scroll_percent()));
    info
}

fn mode_hints(app: &App) -> &'static str {
    match app.mode {
        Mode::Picker => " enter:open esc:close ",
        Mode::Filter => " n/N:hits enter:open esc:close ",
        Mode::Normal if app.pending_mark.is_some() => " mark key? ",
        Mode::Normal => " ?:help ",
    }
}
