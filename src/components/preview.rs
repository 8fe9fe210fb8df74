use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::app::App;
use crate::render::overlay::{compose_window, Overlays};
use crate::render::{spans, sticky};

/// Preview pane: the composed window of the current document.
pub struct PreviewWidget<'a> {
    app: &'a App,
}

impl<'a> PreviewWidget<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    fn render_image(&self, area: Rect, buf: &mut Buffer) {
        let Some(image) = &self.app.document.image else {
            return;
        };
        let name = image
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let line = Line::from(vec![
            Span::styled(
                format!("[{} image] ", image.format),
                Style::default()
                    .fg(self.app.theme.accent_fg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(name, Style::default().fg(self.app.theme.preview_fg)),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}

impl<'a> Widget for PreviewWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        if self.app.document.image.is_some() {
            self.render_image(area, buf);
            return;
        }

        let app = self.app;
        let height = area.height as usize;
        let width = area.width as usize;
        let headers = match app.top_line() {
            Some(top) => sticky::header_rows(&app.document, &app.scopes, top, height, width),
            None => Vec::new(),
        };
        let overlays = Overlays {
            query: app.query.as_ref(),
            selection: app.selection(),
            headers,
        };
        let rows = compose_window(&app.layout, app.preview_scroll, height, width, app.preview_x, &overlays);

        let base = Style::default().fg(app.theme.preview_fg);
        for (i, row) in rows.iter().enumerate() {
            let line = spans::to_line(&row.text, base);
            buf.set_line(area.x, area.y + i as u16, &line, area.width);
        }
    }
}
