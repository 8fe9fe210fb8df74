//! Bidirectional map between logical lines and display rows.
//!
//! Logical line numbers are 1-based and count only lines whose kind
//! advances (`Text`, `Context`, `Added`), so in a diff view they always
//! refer to the file as it is on disk. Display rows are 0-based.

use crate::preview::document::{LineKind, RenderedDocument};
use crate::render::ansi;

/// One display row and the logical line it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMapEntry {
    pub row: usize,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    rows: Vec<Option<usize>>,
    /// `first_row[n - 1]` is the first display row of logical line `n`.
    first_row: Vec<usize>,
}

/// Wrapped display rows of a document with their line map.
#[derive(Debug, Clone, Default)]
pub struct DisplayLayout {
    pub rows: Vec<String>,
    /// Kind of the logical line each row came from.
    pub kinds: Vec<LineKind>,
    pub map: LineMap,
    pub wrap_width: Option<usize>,
}

impl DisplayLayout {
    pub fn build(doc: &RenderedDocument, wrap_width: Option<usize>) -> Self {
        let mut rows = Vec::with_capacity(doc.lines.len());
        let mut kinds = Vec::with_capacity(doc.lines.len());
        let mut map = LineMap::default();
        let mut line = 0;

        for doc_line in &doc.lines {
            let number = if doc_line.kind.advances() {
                line += 1;
                map.first_row.push(rows.len());
                Some(line)
            } else {
                None
            };
            match wrap_width {
                Some(width) => {
                    for row in ansi::wrap(&doc_line.text, width) {
                        rows.push(row);
                        kinds.push(doc_line.kind);
                        map.rows.push(number);
                    }
                }
                None => {
                    rows.push(doc_line.text.clone());
                    kinds.push(doc_line.kind);
                    map.rows.push(number);
                }
            }
        }

        Self {
            rows,
            kinds,
            map,
            wrap_width,
        }
    }
}

impl LineMap {
    pub fn build(doc: &RenderedDocument, wrap_width: Option<usize>) -> Self {
        DisplayLayout::build(doc, wrap_width).map
    }

    pub fn entries(&self) -> impl Iterator<Item = LineMapEntry> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, line)| LineMapEntry { row, line: *line })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First display row of logical line `line`.
    pub fn row_for_line(&self, line: usize) -> Option<usize> {
        line.checked_sub(1)
            .and_then(|idx| self.first_row.get(idx))
            .copied()
    }

    pub fn line_for_row(&self, row: usize) -> Option<usize> {
        self.rows.get(row).copied().flatten()
    }

    /// Logical line shown at `row`, or the next one below it for synthetic
    /// and removed rows, falling back to the last line above.
    pub fn nearest_line(&self, row: usize) -> Option<usize> {
        if let Some(line) = self.line_for_row(row) {
            return Some(line);
        }
        let below = self.rows.iter().skip(row).find_map(|l| *l);
        below.or_else(|| self.rows.iter().take(row).rev().find_map(|l| *l))
    }
}

/// Scroll position as a percentage of the scrollable range.
pub fn scroll_percent(start: usize, total_rows: usize, visible_rows: usize) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }
    let max_start = total_rows.saturating_sub(visible_rows.max(1));
    if max_start == 0 {
        return 0.0;
    }
    (start.min(max_start) as f64 / max_start as f64) * 100.0
}
