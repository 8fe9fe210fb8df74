//! Directory preview: a depth- and count-bounded tree listing.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PreviewError, PreviewResult};
use crate::fs::ignore::should_ignore;
use crate::preview::cache::mtime_ns;
use crate::preview::document::{DocLine, RenderedDocument};
use crate::preview::text::sanitize_line;
use crate::preview::PreviewOptions;
use crate::services::VersionControl;

pub const DEFAULT_MAX_DEPTH: usize = 32;
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;
pub const ENTRY_GROWTH_STEP: usize = 500;
pub const HARD_MAX_ENTRIES: usize = 20_000;

const SIZE_LABEL_MIN_BYTES: u64 = 10 * 1024;
const DOC_SUMMARY_READ_BYTES: usize = 4096;
const DOC_SUMMARY_MAX_FILE_BYTES: u64 = 256 * 1024;
const DOC_SUMMARY_MAX_CHARS: usize = 96;

const DIR_COLOR: &str = "\x1b[1;34m";
const FILE_COLOR: &str = "\x1b[38;5;252m";
const BRANCH_COLOR: &str = "\x1b[2;38;5;245m";
const NOTE_COLOR: &str = "\x1b[2;38;5;250m";
const DOC_COLOR: &str = "\x1b[2;38;5;244m";
const SIZE_COLOR: &str = "\x1b[38;5;109m";
const RESET: &str = "\x1b[0m";

/// Modification times of every directory a listing read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirStamps(Vec<(PathBuf, u128)>);

impl DirStamps {
    fn record(&mut self, dir: &Path) {
        let mtime = fs::metadata(dir).map(|m| mtime_ns(&m)).unwrap_or(0);
        self.0.push((dir.to_path_buf(), mtime));
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    /// False once any recorded directory changed, vanished or became
    /// unreadable.
    pub fn is_current(&self) -> bool {
        self.0.iter().all(|(dir, mtime)| {
            fs::metadata(dir).is_ok_and(|m| m.is_dir() && mtime_ns(&m) == *mtime)
        })
    }
}

/// A rendered listing and the directories it was read from.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub document: RenderedDocument,
    pub stamps: DirStamps,
}

struct Child {
    name: String,
    path: PathBuf,
    is_dir: bool,
    size: Option<u64>,
}

struct Walker<'a> {
    options: &'a PreviewOptions,
    vcs: Option<&'a dyn VersionControl>,
    lines: Vec<DocLine>,
    stamps: DirStamps,
    emitted: usize,
    max_entries: usize,
    truncated: bool,
}

impl Walker<'_> {
    fn children(&mut self, dir: &Path) -> std::io::Result<Vec<Child>> {
        self.stamps.record(dir);
        let mut children = Vec::new();
        for entry in fs::read_dir(dir)?.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.options.show_hidden && name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if self.options.skip_ignored && should_ignore(&path, &self.options.ignore) {
                continue;
            }
            // symlinks are listed but never followed
            let meta = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(_) => continue,
            };
            children.push(Child {
                name,
                path,
                is_dir: meta.is_dir(),
                size: (!meta.is_dir()).then(|| meta.len()),
            });
        }
        children.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(children)
    }

    fn walk(&mut self, dir: &Path, prefix: &str, depth: usize) {
        if depth > self.options.max_depth || self.truncated {
            return;
        }
        let children = match self.children(dir) {
            Ok(c) => c,
            Err(e) => {
                self.lines.push(DocLine::synthetic(format!(
                    "{BRANCH_COLOR}{prefix}└─{RESET} {NOTE_COLOR}<error: {e}>{RESET}"
                )));
                return;
            }
        };

        let count = children.len();
        for (idx, child) in children.into_iter().enumerate() {
            if self.emitted >= self.max_entries {
                self.truncated = true;
                return;
            }
            let last = idx + 1 == count;
            self.lines.push(DocLine::text(self.entry_row(&child, prefix, last)));
            self.emitted += 1;
            if child.is_dir {
                let nested = format!("{prefix}{}", if last { "   " } else { "│  " });
                self.walk(&child.path, &nested, depth + 1);
            }
        }
    }

    fn entry_row(&self, child: &Child, prefix: &str, last: bool) -> String {
        let branch = if last { "└─ " } else { "├─ " };
        let (color, suffix) = if child.is_dir {
            (DIR_COLOR, "/")
        } else {
            (FILE_COLOR, "")
        };
        let mut row = format!(
            "{BRANCH_COLOR}{prefix}{branch}{RESET}{color}{}{suffix}{RESET}",
            sanitize_line(&child.name)
        );
        if let Some(size) = child.size {
            if self.options.size_labels && size >= SIZE_LABEL_MIN_BYTES {
                row.push_str(&format!("{SIZE_COLOR} [{} KB]{RESET}", size / 1024));
            }
        }
        if let Some(vcs) = self.vcs {
            row.push_str(vcs.status_badge(&child.path).label());
        }
        if self.options.doc_summaries && !child.is_dir {
            if let Some(summary) = doc_summary(&child.path, child.size) {
                row.push_str(&format!("{DOC_COLOR}  -- {summary}{RESET}"));
            }
        }
        row
    }
}

/// Render a directory tree listing.
pub fn build_directory(
    path: &Path,
    options: &PreviewOptions,
    vcs: Option<&dyn VersionControl>,
) -> PreviewResult<DirectoryListing> {
    let root = path.canonicalize()?;
    let mut walker = Walker {
        options,
        vcs,
        lines: Vec::new(),
        stamps: DirStamps::default(),
        emitted: 0,
        max_entries: options.max_entries.clamp(1, HARD_MAX_ENTRIES),
        truncated: false,
    };
    let badge = vcs.map(|v| v.status_badge(&root).label()).unwrap_or("");
    walker.lines.push(DocLine::synthetic(format!(
        "{DIR_COLOR}{}/{RESET}{badge}",
        sanitize_line(&root.to_string_lossy())
    )));
    walker.lines.push(DocLine::synthetic(""));
    walker.walk(&root, "", 1);

    if walker.truncated {
        let note = PreviewError::Truncated(walker.max_entries);
        walker
            .lines
            .push(DocLine::synthetic(format!("{NOTE_COLOR}... {note} ...{RESET}")));
    }
    debug!(
        path = %root.display(),
        entries = walker.emitted,
        dirs = walker.stamps.len(),
        truncated = walker.truncated,
        "directory preview"
    );

    let mut document = RenderedDocument::from_lines(path, walker.lines);
    document.is_directory = true;
    document.truncated = walker.truncated;
    Ok(DirectoryListing {
        document,
        stamps: walker.stamps,
    })
}

// ── Doc summaries ───────────────────────────────────────────────────────────

/// PEP 263 style `# -*- coding: utf-8 -*-` line.
fn is_coding_cookie(line: &str) -> bool {
    line.starts_with('#') && (line.contains("coding:") || line.contains("coding="))
}

fn normalize_summary(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let candidate = sanitize_line(&joined);
    if candidate.is_empty() {
        return None;
    }
    if candidate.chars().count() > DOC_SUMMARY_MAX_CHARS {
        let cut: String = candidate.chars().take(DOC_SUMMARY_MAX_CHARS - 3).collect();
        return Some(format!("{}...", cut.trim_end()));
    }
    Some(candidate)
}

/// First sentence-ish line of a file's leading comment or docstring.
pub fn doc_summary(path: &Path, size: Option<u64>) -> Option<String> {
    if size.is_some_and(|s| s > DOC_SUMMARY_MAX_FILE_BYTES) {
        return None;
    }
    let mut buf = vec![0u8; DOC_SUMMARY_READ_BYTES];
    let n = fs::File::open(path).ok()?.read(&mut buf).ok()?;
    let sample = &buf[..n];
    if sample.is_empty() || sample.contains(&0) {
        return None;
    }
    let text = String::from_utf8_lossy(sample);
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text.lines().collect();
    summary_from_lines(&lines)
}

fn skip_blank(lines: &[&str], mut idx: usize) -> usize {
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    idx
}

fn summary_from_lines(lines: &[&str]) -> Option<String> {
    let mut idx = skip_blank(lines, 0);
    if idx < lines.len() && lines[idx].trim_start().starts_with("#!") {
        idx += 1;
    }
    if idx < lines.len() && is_coding_cookie(lines[idx].trim()) {
        idx += 1;
    }
    idx = skip_blank(lines, idx);
    let first = lines.get(idx)?.trim_start();

    for delimiter in ["\"\"\"", "'''"] {
        if let Some(body) = first.strip_prefix(delimiter) {
            return delimited_summary(lines, idx, body, delimiter, str::trim);
        }
    }
    if let Some(body) = first.strip_prefix("/*") {
        return delimited_summary(lines, idx, body, "*/", strip_stars);
    }
    for prefix in ["#", "//", "--", ";"] {
        if first.starts_with(prefix) {
            return lines[idx..]
                .iter()
                .map(|l| l.trim())
                .take_while(|l| l.starts_with(prefix))
                .find_map(|l| normalize_summary(l.trim_start_matches(prefix)));
        }
    }
    None
}

fn strip_stars(line: &str) -> &str {
    line.trim_start_matches('*')
}

fn delimited_summary(
    lines: &[&str],
    idx: usize,
    body: &str,
    close: &str,
    clean: fn(&str) -> &str,
) -> Option<String> {
    if let Some((inner, _)) = body.split_once(close) {
        return normalize_summary(clean(inner.trim()));
    }
    if let Some(summary) = normalize_summary(clean(body.trim())) {
        return Some(summary);
    }
    for line in &lines[idx + 1..] {
        let line = line.trim();
        if let Some((inner, _)) = line.split_once(close) {
            return normalize_summary(clean(inner.trim()));
        }
        if let Some(summary) = normalize_summary(clean(line)) {
            return Some(summary);
        }
    }
    None
}
