//! Escape-aware text metrics.
//!
//! Every styled row in the preview is a `String` carrying CSI escape
//! sequences. The helpers here measure, slice, wrap and decorate those rows
//! by *visible* column, never splitting an escape sequence or a wide glyph.
//!
//! Width rules:
//! - wide glyphs count 2, combining marks count 0
//! - tab advances to the next multiple of [`TAB_STOP`]
//! - a lone `ESC` that does not start a CSI sequence is literal text of width 1

use unicode_width::UnicodeWidthChar;

pub const TAB_STOP: usize = 8;
pub const RESET: &str = "\x1b[0m";

/// One lexical unit of a styled row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A complete CSI escape sequence, e.g. `\x1b[38;5;246m`.
    Escape(&'a str),
    /// One visible (or zero-width) character.
    Char(char),
}

/// Iterator over the tokens of a styled row.
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

pub fn tokens(text: &str) -> Tokens<'_> {
    Tokens { text, pos: 0 }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = &self.text[self.pos..];
        let c = rest.chars().next()?;
        if c == '\x1b' {
            if let Some(len) = csi_len(rest) {
                self.pos += len;
                return Some(Token::Escape(&rest[..len]));
            }
        }
        self.pos += c.len_utf8();
        Some(Token::Char(c))
    }
}

/// Length in bytes of the CSI sequence at the start of `s`, if well formed.
///
/// Grammar: `ESC [` params `[0-9;?]*` intermediates `[ -/]*` final `[@-~]`.
fn csi_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.len() < 3 || bytes[0] != 0x1b || bytes[1] != b'[' {
        return None;
    }
    let mut i = 2;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b';' || bytes[i] == b'?') {
        i += 1;
    }
    while i < bytes.len() && (0x20..=0x2f).contains(&bytes[i]) {
        i += 1;
    }
    if i < bytes.len() && (0x40..=0x7e).contains(&bytes[i]) {
        Some(i + 1)
    } else {
        None
    }
}

/// Whether an escape token is a Select Graphic Rendition sequence.
pub fn is_sgr(seq: &str) -> bool {
    seq.starts_with("\x1b[") && seq.ends_with('m')
}

/// Visible width of a single non-tab character.
pub fn char_width(c: char) -> usize {
    if c == '\x1b' {
        return 1;
    }
    c.width().unwrap_or(0)
}

/// Columns a tab advances when it starts at `col`.
pub fn tab_advance(col: usize) -> usize {
    TAB_STOP - (col % TAB_STOP)
}

/// Visible width of a styled row, with tabs expanded from column 0.
pub fn display_width(text: &str) -> usize {
    let mut col = 0;
    for token in tokens(text) {
        if let Token::Char(c) = token {
            col += if c == '\t' { tab_advance(col) } else { char_width(c) };
        }
    }
    col
}

/// Remove every escape sequence, leaving the visible characters.
pub fn strip_ansi(text: &str) -> String {
    tokens(text)
        .filter_map(|t| match t {
            Token::Char(c) => Some(c),
            Token::Escape(_) => None,
        })
        .collect()
}

/// Tracks which SGR sequences are in effect since the last reset.
#[derive(Debug, Default, Clone)]
pub struct StyleState {
    active: Vec<String>,
}

impl StyleState {
    pub fn apply(&mut self, seq: &str) {
        if !is_sgr(seq) {
            return;
        }
        let params = &seq[2..seq.len() - 1];
        if params.is_empty() || params == "0" {
            self.active.clear();
            return;
        }
        if params.starts_with("0;") {
            self.active.clear();
        }
        self.active.push(seq.to_string());
    }

    pub fn is_open(&self) -> bool {
        !self.active.is_empty()
    }

    /// Concatenated sequences that recreate the current style.
    pub fn prefix(&self) -> String {
        self.active.concat()
    }
}

fn close_row(mut row: String, state: &StyleState) -> String {
    if state.is_open() {
        row.push_str(RESET);
    }
    row
}

/// Clip a styled row to the visible column window `[start, start + width)`.
///
/// Escapes before the window are kept so the style in effect at `start`
/// carries over. A wide glyph or tab straddling either edge is replaced by
/// spaces for the columns that fall inside the window.
pub fn slice(text: &str, start: usize, width: usize) -> String {
    let end = start.saturating_add(width);
    let mut out = String::with_capacity(text.len());
    let mut state = StyleState::default();
    let mut col = 0;

    for token in tokens(text) {
        match token {
            Token::Escape(seq) => {
                if col >= end {
                    break;
                }
                out.push_str(seq);
                state.apply(seq);
            }
            Token::Char(c) => {
                let w = if c == '\t' { tab_advance(col) } else { char_width(c) };
                if col >= end && w > 0 {
                    break;
                }
                let next = col + w;
                if c != '\t' && col >= start && next <= end {
                    out.push(c);
                } else {
                    let visible = next.min(end).saturating_sub(col.max(start));
                    out.extend(std::iter::repeat(' ').take(visible));
                }
                col = next;
            }
        }
    }
    close_row(out, &state)
}

/// Clip a styled row to its first `width` visible columns.
pub fn clip(text: &str, width: usize) -> String {
    slice(text, 0, width)
}

/// Wrap a styled row into display rows of at most `width` columns.
///
/// Continuation rows start with the style prefix active at the break and
/// every row that leaves a style open ends with a reset. Wrapping a row
/// produced by this function at the same width returns it unchanged.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut rows = Vec::new();
    let mut state = StyleState::default();
    let mut chunk = String::new();
    let mut col = 0;

    for token in tokens(text) {
        match token {
            Token::Escape(seq) => {
                chunk.push_str(seq);
                state.apply(seq);
            }
            Token::Char(c) => {
                let mut w = if c == '\t' { tab_advance(col) } else { char_width(c) };
                if w > 0 && col > 0 && col + w > width {
                    rows.push(close_row(std::mem::take(&mut chunk), &state));
                    chunk = state.prefix();
                    col = 0;
                    if c == '\t' {
                        w = tab_advance(0);
                    }
                }
                if c == '\t' {
                    w = w.min(width);
                    chunk.extend(std::iter::repeat(' ').take(w));
                } else {
                    chunk.push(c);
                }
                col += w;
            }
        }
    }
    rows.push(close_row(chunk, &state));
    rows
}

/// A styled column range applied by [`decorate`].
#[derive(Debug, Clone)]
pub struct Decoration {
    pub start: usize,
    pub end: usize,
    pub open: String,
    pub close: String,
    /// Re-emit `open` after every SGR inside the range so inner styling
    /// cannot cancel the decoration.
    pub reinject: bool,
}

/// Wrap visible column ranges of `text` in extra escape sequences.
///
/// Existing escapes are left in place. Ranges must be sorted by `start`
/// and must not overlap.
pub fn decorate(text: &str, ranges: &[Decoration]) -> String {
    if ranges.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + ranges.len() * 16);
    let mut col = 0;
    let mut next = 0;
    let mut active: Option<&Decoration> = None;

    for token in tokens(text) {
        match token {
            Token::Escape(seq) => {
                out.push_str(seq);
                if let Some(d) = active {
                    if d.reinject && is_sgr(seq) {
                        out.push_str(&d.open);
                    }
                }
            }
            Token::Char(c) => {
                let w = if c == '\t' { tab_advance(col) } else { char_width(c) };
                if let Some(d) = active {
                    if col >= d.end && w > 0 {
                        out.push_str(&d.close);
                        active = None;
                    }
                }
                while active.is_none() && next < ranges.len() && ranges[next].end <= col {
                    next += 1;
                }
                if active.is_none() && next < ranges.len() {
                    let d = &ranges[next];
                    if d.start <= col && col < d.end && w > 0 {
                        out.push_str(&d.open);
                        active = Some(d);
                        next += 1;
                    }
                }
                if c == '\t' {
                    out.extend(std::iter::repeat(' ').take(w));
                } else {
                    out.push(c);
                }
                col += w;
            }
        }
    }
    if let Some(d) = active {
        out.push_str(&d.close);
    }
    out
}

/// Visible characters of a row paired with their starting column.
pub fn visible_columns(text: &str) -> Vec<(char, usize)> {
    let mut col = 0;
    let mut out = Vec::new();
    for token in tokens(text) {
        if let Token::Char(c) = token {
            out.push((c, col));
            col += if c == '\t' { tab_advance(col) } else { char_width(c) };
        }
    }
    out
}
