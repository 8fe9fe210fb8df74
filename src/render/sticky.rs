//! Sticky scope headers.
//!
//! Symbol openers (functions, classes and friends) are found with a regex
//! per language. A scope's extent is decided by indentation: it ends right
//! before the first later non-blank line indented no deeper than the
//! opener, except that a line starting with a closing bracket at that depth
//! is the scope's last line. Tabs count as four columns.

use std::path::Path;

use regex::Regex;

use crate::preview::document::RenderedDocument;
use crate::render::ansi::{self, Decoration, RESET};

const FILLER_STYLE: &str = "\x1b[2;38;5;245m";
const UNDERLINE_ON: &str = "\x1b[4m";
const UNDERLINE_OFF: &str = "\x1b[24m";

/// Extensions and the opener pattern used for them.
const SYMBOL_PATTERNS: &[(&[&str], &str)] = &[
    (
        &["rs"],
        r#"^\s*(pub(\([^)]*\))?\s+)?((async|unsafe|const|default)\s+)*(extern\s+"[^"]*"\s+)?(fn|struct|enum|trait|impl|mod|union)\b"#,
    ),
    (&["py", "pyi"], r"^\s*(async\s+)?(def|class)\s+\w+"),
    (
        &["js", "jsx", "mjs", "cjs", "ts", "tsx"],
        r"^\s*(export\s+)?(default\s+)?((async\s+)?function\b|class\b|(const|let|var)\s+\w+\s*=\s*(async\s*)?(\([^)]*\)|\w+)\s*=>)",
    ),
    (&["go"], r"^\s*(func\b|type\s+\w+\s+(struct|interface)\b)"),
    (
        &["java", "cs", "kt", "kts", "scala", "swift"],
        r"^\s*((public|private|protected|internal|static|final|abstract|override|open|sealed|data|async|virtual|partial|synchronized)\s+)*(class|interface|enum|record|struct|object|trait|fun|func|def)\b",
    ),
    (&["rb"], r"^\s*(def|class|module)\b"),
    (
        &["php"],
        r"^\s*((public|private|protected|static|abstract|final)\s+)*(function|class|interface|trait)\b",
    ),
    (&["lua"], r"^\s*(local\s+)?function\b"),
    (&["sh", "bash", "zsh"], r"^\s*(function\s+\w+|\w+\s*\(\s*\))"),
    (
        &["c", "h", "cc", "cpp", "hpp", "cxx"],
        r"^\s*(class|struct|namespace)\s+\w+|^[A-Za-z_][\w\s\*:<>,]*\s\**[A-Za-z_][\w:]*\s*\([^;]*$",
    ),
];

fn symbol_pattern(path: &Path) -> Option<Regex> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SYMBOL_PATTERNS
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .and_then(|(_, pattern)| Regex::new(pattern).ok())
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn is_closer(line: &str) -> bool {
    matches!(line.trim_start().chars().next(), Some('}' | ')' | ']'))
}

/// One symbol scope, in post-change logical line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub line: usize,
    pub end: usize,
    /// Index into the document's lines, for the styled header text.
    pub doc_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeIndex {
    scopes: Vec<Scope>,
}

impl ScopeIndex {
    pub fn build(doc: &RenderedDocument) -> Self {
        let Some(pattern) = symbol_pattern(&doc.path) else {
            return Self::default();
        };

        // (doc index, plain text) of every line that carries a line number.
        let lines: Vec<(usize, String)> = doc
            .lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.kind.advances())
            .map(|(i, l)| {
                let plain = ansi::strip_ansi(&l.text);
                (i, plain.chars().skip(doc.gutter).collect())
            })
            .collect();

        let mut scopes = Vec::new();
        for (pos, (doc_index, text)) in lines.iter().enumerate() {
            if !pattern.is_match(text) {
                continue;
            }
            let depth = indent_of(text);
            let mut end = pos;
            for (later, (_, next)) in lines.iter().enumerate().skip(pos + 1) {
                if next.trim().is_empty() {
                    continue;
                }
                if indent_of(next) > depth {
                    end = later;
                    continue;
                }
                if is_closer(next) {
                    end = later;
                }
                break;
            }
            if end > pos {
                scopes.push(Scope {
                    line: pos + 1,
                    end: end + 1,
                    doc_index: *doc_index,
                });
            }
        }
        Self { scopes }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Scopes whose opener is above `top_line` and that still contain it,
    /// outermost first. Only the deepest `max` are kept.
    pub fn active(&self, top_line: usize, max: usize) -> Vec<&Scope> {
        let chain: Vec<&Scope> = self
            .scopes
            .iter()
            .filter(|s| s.line < top_line && s.end >= top_line)
            .collect();
        let skip = chain.len().saturating_sub(max);
        chain.into_iter().skip(skip).collect()
    }
}

/// Underlined, clipped opener text padded with a dim rule.
pub fn format_header(styled: &str, width: usize) -> String {
    let clipped = ansi::clip(styled, width);
    let used = ansi::display_width(&clipped);
    let mut row = ansi::decorate(
        &clipped,
        &[Decoration {
            start: 0,
            end: used,
            open: UNDERLINE_ON.to_string(),
            close: UNDERLINE_OFF.to_string(),
            reinject: true,
        }],
    );
    if width > used {
        row.push_str(FILLER_STYLE);
        row.push_str(&"─".repeat(width - used));
        row.push_str(RESET);
    }
    row
}

/// Header rows for the window whose first logical line is `top_line`.
///
/// At most `viewport_rows - 1` headers, so one content row always remains.
pub fn header_rows(
    doc: &RenderedDocument,
    index: &ScopeIndex,
    top_line: usize,
    viewport_rows: usize,
    width: usize,
) -> Vec<String> {
    let max = viewport_rows.saturating_sub(1);
    if max == 0 || width == 0 {
        return Vec::new();
    }
    index
        .active(top_line, max)
        .into_iter()
        .filter_map(|scope| doc.lines.get(scope.doc_index))
        .map(|line| format_header(line.text.trim_end(), width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::document::{DocLine, LineKind};

    fn doc(name: &str, src: &str) -> RenderedDocument {
        RenderedDocument::from_lines(Path::new(name), src.lines().map(DocLine::text).collect())
    }

    const RUST: &str = "\
mod outer {
    fn inner() {
        let a = 1;
        let b = 2;
    }
}
fn after() {}
";

    #[test]
    fn rust_scopes_nest_by_indent() {
        let index = ScopeIndex::build(&doc("x.rs", RUST));
        assert_eq!(index.len(), 2);
        let chain = index.active(4, 10);
        assert_eq!(chain.iter().map(|s| s.line).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(chain[1].end, 5);
        assert_eq!(chain[0].end, 6);
    }

    #[test]
    fn opener_line_itself_has_no_header() {
        let index = ScopeIndex::build(&doc("x.rs", RUST));
        assert!(index.active(1, 10).is_empty());
        assert_eq!(index.active(2, 10).len(), 1);
    }

    #[test]
    fn single_line_items_are_not_scopes() {
        let index = ScopeIndex::build(&doc("x.rs", RUST));
        assert!(index.active(7, 10).is_empty());
    }

    #[test]
    fn python_dedent_closes_scope() {
        let src = "class A:\n    def f(self):\n        pass\n\n    x = 1\ny = 2\n";
        let index = ScopeIndex::build(&doc("a.py", src));
        let lines: Vec<usize> = index.active(5, 10).iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1]);
        assert!(index.active(6, 10).is_empty());
    }

    #[test]
    fn deepest_headers_win_when_space_is_short() {
        let index = ScopeIndex::build(&doc("x.rs", RUST));
        let d = doc("x.rs", RUST);
        let rows = header_rows(&d, &index, 4, 2, 30);
        assert_eq!(rows.len(), 1);
        assert!(ansi::strip_ansi(&rows[0]).starts_with("    fn inner()"));
    }

    #[test]
    fn header_is_underlined_and_padded() {
        let row = format_header("fn x() {", 12);
        assert!(row.starts_with("\x1b[4m"));
        assert_eq!(ansi::display_width(&row), 12);
        assert!(ansi::strip_ansi(&row).ends_with("────"));
    }

    #[test]
    fn removed_lines_do_not_open_scopes() {
        let d = RenderedDocument::from_lines(
            Path::new("x.rs"),
            vec![
                DocLine::new("fn gone() {", LineKind::Removed),
                DocLine::new("fn kept() {", LineKind::Added),
                DocLine::new("    body();", LineKind::Context),
                DocLine::new("}", LineKind::Context),
            ],
        );
        let index = ScopeIndex::build(&d);
        assert_eq!(index.len(), 1);
        assert_eq!(index.active(2, 5)[0].doc_index, 1);
    }

    #[test]
    fn unknown_language_has_no_scopes() {
        assert!(ScopeIndex::build(&doc("notes.txt", "fn a() {\n  b\n}\n")).is_empty());
    }

    #[test]
    fn tabs_count_four_columns() {
        assert_eq!(indent_of("\t\tx"), 8);
        assert_eq!(indent_of("  \tx"), 6);
    }
}
