//! Content search through `rg --json`.

use std::path::{Component, Path};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, warn};

use crate::services::{run_bounded, Search, SearchMatch};

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(2);
const PREVIEW_MAX_CHARS: usize = 220;

pub struct RipgrepSearch {
    pub show_hidden: bool,
    pub skip_ignored: bool,
    pub timeout: Duration,
}

impl Default for RipgrepSearch {
    fn default() -> Self {
        Self {
            show_hidden: false,
            skip_ignored: true,
            timeout: SEARCH_TIMEOUT,
        }
    }
}

fn preview_text(text: &str) -> String {
    let clean = text.trim_end_matches(['\r', '\n']).replace('\t', "    ");
    if clean.chars().count() <= PREVIEW_MAX_CHARS {
        return clean;
    }
    let cut: String = clean.chars().take(PREVIEW_MAX_CHARS - 3).collect();
    format!("{cut}...")
}

/// One `rg --json` record, if it is a usable match under `root`.
pub fn parse_record(line: &str, root: &Path) -> Option<SearchMatch> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    if value.get("type")?.as_str()? != "match" {
        return None;
    }
    let data = value.get("data")?;
    let rel = Path::new(data.get("path")?.get("text")?.as_str()?);
    if rel.is_absolute() || rel.components().any(|c| c == Component::ParentDir) {
        return None;
    }
    let line_number = data
        .get("line_number")
        .and_then(|n| n.as_u64())
        .filter(|n| *n > 0)
        .unwrap_or(1) as usize;
    let column = data
        .get("submatches")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .and_then(|m| m.get("start"))
        .and_then(|s| s.as_u64())
        .map(|s| s as usize + 1)
        .unwrap_or(1);
    let text = data
        .get("lines")
        .and_then(|l| l.get("text"))
        .and_then(|t| t.as_str())
        .unwrap_or("");

    let rel = rel.strip_prefix(".").unwrap_or(rel);
    Some(SearchMatch {
        path: root.join(rel),
        line: line_number,
        column,
        preview: preview_text(text),
    })
}

/// Parse full `rg --json` output, sorted by path, line and column.
pub fn parse_output(output: &str, root: &Path, limit: usize) -> Vec<SearchMatch> {
    let mut matches: Vec<SearchMatch> = output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| parse_record(l, root))
        .take(limit)
        .collect();
    matches.sort_by(|a, b| (&a.path, a.line, a.column).cmp(&(&b.path, b.line, b.column)));
    matches
}

impl Search for RipgrepSearch {
    fn search(&self, root: &Path, query: &str, limit: usize) -> Vec<SearchMatch> {
        if query.is_empty() {
            return Vec::new();
        }
        let mut cmd = Command::new("rg");
        cmd.current_dir(root).args([
            "--json",
            "--line-number",
            "--column",
            "--smart-case",
            "--fixed-strings",
        ]);
        if !self.skip_ignored {
            cmd.arg("--no-ignore");
        }
        if self.show_hidden {
            cmd.arg("--hidden");
        }
        cmd.arg("--").arg(query).arg(".");

        match run_bounded(&mut cmd, "rg", self.timeout) {
            // exit code 1 means no matches
            Ok(out) if out.success || out.code == Some(1) => {
                let matches = parse_output(&out.stdout, root, limit);
                debug!(query, hits = matches.len(), "content search");
                matches
            }
            Ok(out) => {
                warn!(code = ?out.code, "rg failed");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "rg unavailable");
                Vec::new()
            }
        }
    }
}
