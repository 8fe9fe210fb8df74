//! Query-match and selection overlays, and the window compositor that
//! stacks every overlay onto the visible rows.
//!
//! Syntax color and diff shading are already baked into the document rows.
//! The overlays here only add escape sequences around visible column
//! ranges, so earlier styling is never removed.

use crate::preview::document::LineKind;
use crate::render::ansi::{self, Decoration};
use crate::render::line_map::DisplayLayout;

const CURRENT_MATCH_OPEN: &str = "\x1b[7;1m";
const CURRENT_MATCH_CLOSE: &str = "\x1b[27;22m";
const MATCH_OPEN: &str = "\x1b[1m";
const MATCH_CLOSE: &str = "\x1b[22m";
const SELECTION_OPEN: &str = "\x1b[48;2;58;92;188m";
const SELECTION_CLOSE: &str = "\x1b[49m";

/// Highlight every case-insensitive occurrence of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOverlay {
    pub query: String,
    /// Logical line holding the current match; its first hit is inverted.
    pub current_line: Option<usize>,
}

/// Visible column ranges of `query` in `row`, non-overlapping, left to right.
pub fn find_matches(row: &str, query: &str) -> Vec<(usize, usize)> {
    let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return Vec::new();
    }
    let cols = ansi::visible_columns(row);
    let hay: Vec<(char, usize)> = cols
        .iter()
        .map(|&(c, col)| (c.to_lowercase().next().unwrap_or(c), col))
        .collect();

    let mut found = Vec::new();
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        let window = &hay[i..i + needle.len()];
        if window.iter().zip(&needle).all(|((c, _), n)| c == n) {
            let (last, last_col) = window[window.len() - 1];
            let width = if last == '\t' {
                ansi::tab_advance(last_col)
            } else {
                ansi::char_width(last)
            };
            found.push((window[0].1, last_col + width));
            i += needle.len();
        } else {
            i += 1;
        }
    }
    found
}

impl QueryOverlay {
    pub fn apply(&self, row: &str, line: Option<usize>, first_row_of_line: bool) -> String {
        let matches = find_matches(row, &self.query);
        if matches.is_empty() {
            return row.to_string();
        }
        let is_current = first_row_of_line && line.is_some() && line == self.current_line;
        let decorations: Vec<Decoration> = matches
            .into_iter()
            .enumerate()
            .map(|(n, (start, end))| {
                let (open, close) = if is_current && n == 0 {
                    (CURRENT_MATCH_OPEN, CURRENT_MATCH_CLOSE)
                } else {
                    (MATCH_OPEN, MATCH_CLOSE)
                };
                Decoration {
                    start,
                    end,
                    open: open.to_string(),
                    close: close.to_string(),
                    reinject: false,
                }
            })
            .collect();
        ansi::decorate(row, &decorations)
    }
}

/// A display-row and column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowCol {
    pub row: usize,
    pub col: usize,
}

/// Selection between two display positions, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: RowCol,
    pub end: RowCol,
}

impl Selection {
    /// Selection covering whole rows `first..=last`, in either order.
    pub fn rows(first: usize, last: usize) -> Self {
        let (a, b) = if first <= last { (first, last) } else { (last, first) };
        Self {
            start: RowCol { row: a, col: 0 },
            end: RowCol {
                row: b,
                col: usize::MAX,
            },
        }
    }

    /// Column range selected on `row`, if any.
    pub fn columns(&self, row: usize, row_width: usize) -> Option<(usize, usize)> {
        let (start, end) = if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        };
        if row < start.row || row > end.row {
            return None;
        }
        let from = if row == start.row { start.col } else { 0 };
        let to = if row == end.row { end.col } else { usize::MAX };
        let to = to.min(row_width);
        (from < to).then_some((from, to))
    }

    pub fn apply(&self, row_index: usize, row: &str) -> String {
        let width = ansi::display_width(row);
        match self.columns(row_index, width) {
            Some((start, end)) => ansi::decorate(
                row,
                &[Decoration {
                    start,
                    end,
                    open: SELECTION_OPEN.to_string(),
                    close: SELECTION_CLOSE.to_string(),
                    reinject: true,
                }],
            ),
            None => row.to_string(),
        }
    }
}

/// Everything the compositor layers onto a window.
#[derive(Debug, Clone, Default)]
pub struct Overlays<'a> {
    pub query: Option<&'a QueryOverlay>,
    pub selection: Option<Selection>,
    /// Sticky header rows, already formatted, outermost first.
    pub headers: Vec<String>,
}

/// One composed viewport row with the kind of line it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRow {
    pub text: String,
    pub kind: LineKind,
    pub header: bool,
}

/// Compose the visible window starting at display row `start`.
///
/// Order: query matches, then selection, then horizontal clipping. Sticky
/// headers take rows from the top of the window.
pub fn compose_window(
    layout: &DisplayLayout,
    start: usize,
    height: usize,
    width: usize,
    x_offset: usize,
    overlays: &Overlays,
) -> Vec<WindowRow> {
    let header_count = overlays.headers.len().min(height.saturating_sub(1));
    let mut out: Vec<WindowRow> = overlays.headers[..header_count]
        .iter()
        .map(|h| WindowRow {
            text: h.clone(),
            kind: LineKind::Synthetic,
            header: true,
        })
        .collect();

    let body = height - header_count.min(height);
    for index in start..(start + body).min(layout.rows.len()) {
        let mut text = layout.rows[index].clone();
        let line = layout.map.line_for_row(index);
        if let Some(query) = overlays.query {
            let first = line.is_some()
                && (index == 0 || layout.map.line_for_row(index - 1) != line);
            text = query.apply(&text, line, first);
        }
        if let Some(selection) = overlays.selection {
            text = selection.apply(index, &text);
        }
        out.push(WindowRow {
            text: ansi::slice(&text, x_offset, width),
            kind: layout.kinds.get(index).copied().unwrap_or(LineKind::Text),
            header: false,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::document::{DocLine, RenderedDocument};
    use std::path::Path;

    fn layout(lines: &[&str]) -> DisplayLayout {
        let doc = RenderedDocument::from_lines(
            Path::new("t"),
            lines.iter().map(|l| DocLine::text(*l)).collect(),
        );
        DisplayLayout::build(&doc, None)
    }

    #[test]
    fn matches_are_case_insensitive() {
        assert_eq!(find_matches("Foo foo FOO", "foo"), vec![(0, 3), (4, 7), (8, 11)]);
    }

    #[test]
    fn matches_skip_escape_sequences() {
        assert_eq!(find_matches("\x1b[31mab\x1b[0mcd", "bc"), vec![(1, 3)]);
    }

    #[test]
    fn empty_query_matches_nothing() {
        assert!(find_matches("abc", "").is_empty());
    }

    #[test]
    fn current_match_is_inverted() {
        let q = QueryOverlay {
            query: "x".into(),
            current_line: Some(3),
        };
        assert_eq!(q.apply("axbx", Some(3), true), "a\x1b[7;1mx\x1b[27;22mb\x1b[1mx\x1b[22m");
        assert_eq!(q.apply("axb", Some(4), true), "a\x1b[1mx\x1b[22mb");
    }

    #[test]
    fn overlays_keep_existing_escapes() {
        let q = QueryOverlay {
            query: "b".into(),
            current_line: None,
        };
        let row = "\x1b[38;5;1mabc\x1b[0m";
        let out = q.apply(row, Some(1), true);
        assert_eq!(ansi::strip_ansi(&out), "abc");
        assert!(out.starts_with("\x1b[38;5;1m"));
        assert!(out.ends_with("\x1b[0m"));
    }

    #[test]
    fn selection_spans_rows() {
        let sel = Selection {
            start: RowCol { row: 1, col: 2 },
            end: RowCol { row: 3, col: 1 },
        };
        assert_eq!(sel.columns(0, 10), None);
        assert_eq!(sel.columns(1, 10), Some((2, 10)));
        assert_eq!(sel.columns(2, 10), Some((0, 10)));
        assert_eq!(sel.columns(3, 10), Some((0, 1)));
        assert_eq!(sel.columns(4, 10), None);
    }

    #[test]
    fn selection_survives_inner_reset() {
        let sel = Selection::rows(0, 0);
        let out = sel.apply(0, "a\x1b[0mb");
        assert_eq!(out, "\x1b[48;2;58;92;188ma\x1b[0m\x1b[48;2;58;92;188mb\x1b[49m");
    }

    #[test]
    fn window_reserves_rows_for_headers() {
        let lay = layout(&["1", "2", "3", "4", "5"]);
        let overlays = Overlays {
            headers: vec!["h1".into(), "h2".into()],
            ..Overlays::default()
        };
        let rows = compose_window(&lay, 1, 4, 10, 0, &overlays);
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["h1", "h2", "2", "3"]);
        assert!(rows[0].header);
    }

    #[test]
    fn headers_never_fill_the_whole_window() {
        let lay = layout(&["1", "2"]);
        let overlays = Overlays {
            headers: vec!["a".into(), "b".into(), "c".into()],
            ..Overlays::default()
        };
        let rows = compose_window(&lay, 0, 2, 10, 0, &overlays);
        assert_eq!(rows.len(), 2);
        assert!(!rows[1].header);
    }

    #[test]
    fn horizontal_offset_clips_after_overlays() {
        let lay = layout(&["abcdef"]);
        let q = QueryOverlay {
            query: "cd".into(),
            current_line: None,
        };
        let overlays = Overlays {
            query: Some(&q),
            ..Overlays::default()
        };
        let rows = compose_window(&lay, 0, 1, 3, 2, &overlays);
        assert_eq!(ansi::strip_ansi(&rows[0].text), "cde");
    }
}
