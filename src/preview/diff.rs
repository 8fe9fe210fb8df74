//! Diff preview: hunks merged into a full-file view with row shading.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::PreviewResult;
use crate::preview::document::{DocLine, LineKind, RenderedDocument};
use crate::preview::highlight::Highlighter;
use crate::preview::text::{colorize, read_source_lines, sanitize_line};
use crate::preview::PreviewOptions;
use crate::render::ansi::{self, Token, RESET};
use crate::services::VersionControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMarker {
    Context,
    Added,
    Removed,
}

/// One `@@ -old_start,old_count +new_start,new_count @@` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<(DiffMarker, String)>,
}

/// Merge hunks into the current file lines.
///
/// Every current line appears once, in order; removed lines are inserted
/// where they used to be. `removed_styled` holds the rendered text of the
/// removed lines in hunk order.
pub fn merge_hunks(
    current: Vec<String>,
    hunks: &[DiffHunk],
    mut removed_styled: impl Iterator<Item = String>,
) -> Vec<DocLine> {
    let n = current.len();
    let mut kinds = vec![LineKind::Context; n];
    let mut inserts: BTreeMap<usize, Vec<String>> = BTreeMap::new();

    for hunk in hunks {
        // a pure deletion is reported as "after line new_start"
        let mut cursor = if hunk.new_count == 0 {
            hunk.new_start
        } else {
            hunk.new_start.saturating_sub(1)
        };
        for (marker, text) in &hunk.lines {
            match marker {
                DiffMarker::Context => cursor += 1,
                DiffMarker::Added => {
                    if let Some(kind) = kinds.get_mut(cursor) {
                        *kind = LineKind::Added;
                    }
                    cursor += 1;
                }
                DiffMarker::Removed => {
                    let styled = removed_styled.next().unwrap_or_else(|| text.clone());
                    inserts.entry(cursor.min(n)).or_default().push(styled);
                }
            }
        }
    }

    let mut merged = Vec::with_capacity(n + inserts.values().map(Vec::len).sum::<usize>());
    let mut current = current.into_iter();
    for idx in 0..=n {
        if let Some(removed) = inserts.remove(&idx) {
            merged.extend(removed.into_iter().map(|t| DocLine::new(t, LineKind::Removed)));
        }
        if let Some(text) = current.next() {
            merged.push(DocLine::new(text, kinds[idx]));
        }
    }
    merged
}

/// Diff view of `path`, or `None` when there is no usable hunk set.
pub fn build_diff(
    path: &Path,
    options: &PreviewOptions,
    highlighter: &Highlighter,
    vcs: &dyn VersionControl,
) -> PreviewResult<Option<RenderedDocument>> {
    let Some(hunks) = vcs.diff_hunks(path) else {
        return Ok(None);
    };
    if hunks.is_empty() {
        return Ok(None);
    }

    let size = fs::metadata(path)?.len();
    let current = colorize(path, read_source_lines(path)?, size, options, highlighter);
    let removed: Vec<String> = hunks
        .iter()
        .flat_map(|h| &h.lines)
        .filter(|(m, _)| *m == DiffMarker::Removed)
        .map(|(_, t)| sanitize_line(t))
        .collect();
    let removed = colorize(path, removed, size, options, highlighter);

    let mut lines = merge_hunks(current, &hunks, removed.into_iter());
    for line in &mut lines {
        line.text = if options.colorize {
            shade(&line.text, line.kind)
        } else {
            format!("{}{}", plain_marker(line.kind), line.text)
        };
    }
    debug!(path = %path.display(), hunks = hunks.len(), "diff preview");

    let mut doc = RenderedDocument::from_lines(path, lines);
    doc.is_diff = true;
    doc.gutter = if options.colorize { 0 } else { 2 };
    Ok(Some(doc))
}

fn plain_marker(kind: LineKind) -> &'static str {
    match kind {
        LineKind::Added => "+ ",
        LineKind::Removed => "- ",
        _ => "  ",
    }
}

// ── Shading and contrast ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const ADDED_BG: Rgb = Rgb(36, 74, 52);
pub const REMOVED_BG: Rgb = Rgb(92, 43, 49);

/// Minimum WCAG contrast ratio for foregrounds on a shaded row.
pub const MIN_CONTRAST: f64 = 4.5;

pub fn background_for(kind: LineKind) -> Option<Rgb> {
    match kind {
        LineKind::Added => Some(ADDED_BG),
        LineKind::Removed => Some(REMOVED_BG),
        _ => None,
    }
}

fn bg_sequence(bg: Rgb) -> String {
    format!("\x1b[48;2;{};{};{}m", bg.0, bg.1, bg.2)
}

/// Apply the row background for `kind`; other kinds pass through unchanged.
pub fn shade(text: &str, kind: LineKind) -> String {
    let Some(bg) = background_for(kind) else {
        return text.to_string();
    };
    let bg_seq = bg_sequence(bg);
    let mut out = String::with_capacity(text.len() + 32);
    out.push_str(&bg_seq);
    for token in ansi::tokens(text) {
        match token {
            Token::Escape(seq) if ansi::is_sgr(seq) => {
                let raw = &seq[2..seq.len() - 1];
                let resets = raw.split(';').any(|p| p.is_empty() || p == "0");
                let params = correct_params(raw, bg);
                if !params.is_empty() {
                    out.push_str(&format!("\x1b[{params}m"));
                }
                if resets {
                    out.push_str(&bg_seq);
                }
            }
            Token::Escape(seq) => out.push_str(seq),
            Token::Char(c) => out.push(c),
        }
    }
    out.push_str(RESET);
    out
}

fn channel(c: u8) -> f64 {
    let c = f64::from(c) / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn luminance(rgb: Rgb) -> f64 {
    0.2126 * channel(rgb.0) + 0.7152 * channel(rgb.1) + 0.0722 * channel(rgb.2)
}

pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let (la, lb) = (luminance(a), luminance(b));
    let (hi, lo) = if la > lb { (la, lb) } else { (lb, la) };
    (hi + 0.05) / (lo + 0.05)
}

/// Blend `fg` toward white until it reaches [`MIN_CONTRAST`] against `bg`.
/// Returns `None` when it already does.
pub fn boost(fg: Rgb, bg: Rgb) -> Option<Rgb> {
    if contrast_ratio(fg, bg) >= MIN_CONTRAST {
        return None;
    }
    let lift = |c: u8, t: f64| -> u8 { (f64::from(c) + (255.0 - f64::from(c)) * t).round() as u8 };
    for step in 1..=10 {
        let t = f64::from(step) / 10.0;
        let candidate = Rgb(lift(fg.0, t), lift(fg.1, t), lift(fg.2, t));
        if contrast_ratio(candidate, bg) >= MIN_CONTRAST {
            return Some(candidate);
        }
    }
    Some(Rgb(255, 255, 255))
}

const BASIC: [Rgb; 16] = [
    Rgb(0, 0, 0),
    Rgb(205, 0, 0),
    Rgb(0, 205, 0),
    Rgb(205, 205, 0),
    Rgb(0, 0, 238),
    Rgb(205, 0, 205),
    Rgb(0, 205, 205),
    Rgb(229, 229, 229),
    Rgb(127, 127, 127),
    Rgb(255, 0, 0),
    Rgb(0, 255, 0),
    Rgb(255, 255, 0),
    Rgb(92, 92, 255),
    Rgb(255, 0, 255),
    Rgb(0, 255, 255),
    Rgb(255, 255, 255),
];

/// xterm 256-color palette entry.
pub fn xterm_rgb(index: u8) -> Rgb {
    match index {
        0..=15 => BASIC[usize::from(index)],
        16..=231 => {
            let i = index - 16;
            let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            Rgb(level(i / 36), level((i / 6) % 6), level(i % 6))
        }
        _ => {
            let v = 8 + (index - 232) * 10;
            Rgb(v, v, v)
        }
    }
}

/// Rewrite low-contrast foregrounds in one SGR parameter list.
fn correct_params(params: &str, bg: Rgb) -> String {
    let nums: Vec<Option<u16>> = params
        .split(';')
        .map(|p| if p.is_empty() { Some(0) } else { p.parse().ok() })
        .collect();
    if nums.iter().any(Option::is_none) {
        return params.to_string();
    }
    let nums: Vec<u16> = nums.into_iter().flatten().collect();

    let mut out: Vec<String> = Vec::with_capacity(nums.len());
    let mut i = 0;
    let fg_param = |rgb: Rgb| match boost(rgb, bg) {
        Some(b) => format!("38;2;{};{};{}", b.0, b.1, b.2),
        None => format!("38;2;{};{};{}", rgb.0, rgb.1, rgb.2),
    };
    while i < nums.len() {
        let p = nums[i];
        match p {
            // faint only ever lowers contrast
            2 => {}
            30..=37 | 90..=97 => {
                let idx = if p >= 90 { p - 90 + 8 } else { p - 30 };
                let rgb = BASIC[usize::from(idx)];
                match boost(rgb, bg) {
                    Some(_) => out.push(fg_param(rgb)),
                    None => out.push(p.to_string()),
                }
            }
            38 if nums.get(i + 1) == Some(&5) && i + 2 < nums.len() => {
                let n = nums[i + 2].min(255) as u8;
                let rgb = xterm_rgb(n);
                match boost(rgb, bg) {
                    Some(_) => out.push(fg_param(rgb)),
                    None => out.push(format!("38;5;{n}")),
                }
                i += 2;
            }
            38 if nums.get(i + 1) == Some(&2) && i + 4 < nums.len() => {
                let c = |v: u16| v.min(255) as u8;
                out.push(fg_param(Rgb(c(nums[i + 2]), c(nums[i + 3]), c(nums[i + 4]))));
                i += 4;
            }
            48 if nums.get(i + 1) == Some(&5) && i + 2 < nums.len() => {
                out.push(format!("48;5;{}", nums[i + 2]));
                i += 2;
            }
            48 if nums.get(i + 1) == Some(&2) && i + 4 < nums.len() => {
                out.push(format!("48;2;{};{};{}", nums[i + 2], nums[i + 3], nums[i + 4]));
                i += 4;
            }
            other => out.push(other.to_string()),
        }
        i += 1;
    }
    out.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::text::build_file;
    use crate::render::ansi::strip_ansi;
    use crate::render::line_map::LineMap;
    use crate::services::Badge;
    use tempfile::TempDir;

    struct FixedVcs(Option<Vec<DiffHunk>>);

    impl VersionControl for FixedVcs {
        fn diff_hunks(&self, _path: &Path) -> Option<Vec<DiffHunk>> {
            self.0.clone()
        }

        fn status_badge(&self, _path: &Path) -> Badge {
            Badge::Modified
        }
    }

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    /// Old line 5 replaced by two new lines.
    fn replace_line_five() -> DiffHunk {
        DiffHunk {
            old_start: 5,
            old_count: 1,
            new_start: 5,
            new_count: 2,
            lines: vec![
                (DiffMarker::Removed, "old5".into()),
                (DiffMarker::Added, "new5a".into()),
                (DiffMarker::Added, "new5b".into()),
            ],
        }
    }

    fn current_after_replace() -> Vec<String> {
        lines(&["l1", "l2", "l3", "l4", "new5a", "new5b", "l6", "l7"])
    }

    #[test]
    fn merge_replacement_hunk() {
        let merged = merge_hunks(current_after_replace(), &[replace_line_five()], std::iter::empty());
        let kinds: Vec<LineKind> = merged.iter().map(|l| l.kind).collect();
        use LineKind::*;
        assert_eq!(
            kinds,
            vec![Context, Context, Context, Context, Removed, Added, Added, Context, Context]
        );
        assert_eq!(merged[4].text, "old5");
        assert_eq!(merged[7].text, "l6");

        let mut doc = RenderedDocument::from_lines(Path::new("f"), merged);
        doc.is_diff = true;
        let map = LineMap::build(&doc, None);
        assert_eq!(map.line_for_row(4), None);
        assert_eq!(map.line_for_row(5), Some(5));
        assert_eq!(map.line_for_row(7), Some(7));
        assert_eq!(map.row_for_line(7), Some(7));
    }

    #[test]
    fn merge_pure_deletion_inserts_after_anchor() {
        let hunk = DiffHunk {
            old_start: 3,
            old_count: 1,
            new_start: 2,
            new_count: 0,
            lines: vec![(DiffMarker::Removed, "gone".into())],
        };
        let merged = merge_hunks(lines(&["a", "b", "c"]), &[hunk], std::iter::empty());
        let texts: Vec<&str> = merged.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "gone", "c"]);
    }

    #[test]
    fn merge_deletion_at_end_of_file() {
        let hunk = DiffHunk {
            old_start: 3,
            old_count: 2,
            new_start: 2,
            new_count: 0,
            lines: vec![
                (DiffMarker::Removed, "x".into()),
                (DiffMarker::Removed, "y".into()),
            ],
        };
        let merged = merge_hunks(lines(&["a", "b"]), &[hunk], std::iter::empty());
        let texts: Vec<&str> = merged.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "x", "y"]);
    }

    #[test]
    fn merge_with_context_lines() {
        let hunk = DiffHunk {
            old_start: 1,
            old_count: 2,
            new_start: 1,
            new_count: 2,
            lines: vec![
                (DiffMarker::Context, "a".into()),
                (DiffMarker::Removed, "b".into()),
                (DiffMarker::Added, "B".into()),
            ],
        };
        let merged = merge_hunks(lines(&["a", "B", "c"]), &[hunk], std::iter::empty());
        let kinds: Vec<LineKind> = merged.iter().map(|l| l.kind).collect();
        use LineKind::*;
        assert_eq!(kinds, vec![Context, Removed, Added, Context]);
    }

    #[test]
    fn counts_and_numbering_match_plain_build() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, current_after_replace().join("\n")).unwrap();
        let options = PreviewOptions {
            colorize: false,
            ..PreviewOptions::default()
        };
        let h = Highlighter::new(None);
        let vcs = FixedVcs(Some(vec![replace_line_five()]));
        let diff = build_diff(&path, &options, &h, &vcs).unwrap().unwrap();
        let plain = build_file(&path, &options, &h).unwrap();

        let removed = diff.lines.iter().filter(|l| l.kind == LineKind::Removed).count();
        let kept = diff
            .lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Added))
            .count();
        assert_eq!(kept, diff.lines.len() - removed);
        assert_eq!(kept, plain.lines.len());

        let numbered: Vec<String> = diff
            .lines
            .iter()
            .filter(|l| l.kind.advances())
            .map(|l| strip_ansi(&l.text)[diff.gutter..].to_string())
            .collect();
        let plain_texts: Vec<String> = plain.lines.iter().map(|l| l.text.clone()).collect();
        assert_eq!(numbered, plain_texts);
    }

    #[test]
    fn no_hunks_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, "a\n").unwrap();
        let h = Highlighter::new(None);
        let opts = PreviewOptions::default();
        assert!(build_diff(&path, &opts, &h, &FixedVcs(None)).unwrap().is_none());
        assert!(build_diff(&path, &opts, &h, &FixedVcs(Some(vec![]))).unwrap().is_none());
    }

    #[test]
    fn shading_leaves_context_untouched() {
        let text = "\x1b[38;5;240mdim\x1b[0m";
        assert_eq!(shade(text, LineKind::Context), text);
        assert_eq!(shade(text, LineKind::Text), text);
    }

    #[test]
    fn shading_keeps_visible_text() {
        let text = "\x1b[38;5;240mdim\x1b[0m rest";
        let shaded = shade(text, LineKind::Added);
        assert!(shaded.starts_with("\x1b[48;2;36;74;52m"));
        assert_eq!(strip_ansi(&shaded), "dim rest");
        // background re-applied after the inner reset
        assert!(shaded.contains("\x1b[0m\x1b[48;2;36;74;52m"));
    }

    #[test]
    fn readable_foreground_is_unchanged() {
        let text = "\x1b[38;2;230;230;230mok";
        let shaded = shade(text, LineKind::Added);
        assert!(shaded.contains("\x1b[38;2;230;230;230m"));
        assert_eq!(correct_params("38;5;231", ADDED_BG), "38;5;231");
        assert_eq!(correct_params("1;37", REMOVED_BG), "1;37");
    }

    #[test]
    fn dim_foreground_is_only_brightened() {
        for bg in [ADDED_BG, REMOVED_BG] {
            for fg in [Rgb(60, 60, 60), Rgb(101, 115, 126), Rgb(0, 0, 0), Rgb(120, 20, 20)] {
                let boosted = boost(fg, bg).expect("low contrast");
                assert!(boosted.0 >= fg.0 && boosted.1 >= fg.1 && boosted.2 >= fg.2);
                assert!(contrast_ratio(boosted, bg) >= MIN_CONTRAST);
            }
        }
    }

    #[test]
    fn corrected_params_still_parse() {
        for params in ["38;5;240", "30", "90", "2;38;2;50;60;70", "1;38;5;236;48;5;17"] {
            let out = correct_params(params, REMOVED_BG);
            for part in out.split(';') {
                assert!(part.parse::<u16>().is_ok(), "{out}");
            }
            let seq = format!("\x1b[{out}m");
            let toks: Vec<Token> = ansi::tokens(&seq).collect();
            assert_eq!(toks, vec![Token::Escape(&seq)]);
        }
    }

    #[test]
    fn faint_is_dropped_on_shaded_rows() {
        assert_eq!(correct_params("2", ADDED_BG), "");
        let shaded = shade("\x1b[2mx", LineKind::Removed);
        assert_eq!(shaded, "\x1b[48;2;92;43;49mx\x1b[0m");
    }

    #[test]
    fn xterm_palette_samples() {
        assert_eq!(xterm_rgb(16), Rgb(0, 0, 0));
        assert_eq!(xterm_rgb(231), Rgb(255, 255, 255));
        assert_eq!(xterm_rgb(232), Rgb(8, 8, 8));
        assert_eq!(xterm_rgb(196), Rgb(255, 0, 0));
    }
}
