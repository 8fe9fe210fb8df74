//! `git` command-line collaborator: diff hunks and status badges.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::PreviewResult;
use crate::preview::diff::{DiffHunk, DiffMarker};
use crate::services::{run_bounded, Badge, VersionControl};

pub const GIT_TIMEOUT: Duration = Duration::from_millis(200);

/// Diff invocations tried in order; the first with hunks wins. `HEAD`
/// compares against the working file the hunks are merged into, so it goes
/// first. The index-only forms cover repositories without a commit.
const DIFF_ARGS: [&[&str]; 3] = [
    &["diff", "--no-color", "-U0", "HEAD", "--"],
    &["diff", "--cached", "--no-color", "-U0", "--"],
    &["diff", "--no-color", "-U0", "--"],
];

pub struct GitCli {
    root: PathBuf,
    repo_root: Option<PathBuf>,
    git_dir: Option<PathBuf>,
    badges: HashMap<PathBuf, Badge>,
    hunk_header: Option<Regex>,
    timeout: Duration,
}

impl GitCli {
    /// Locate the repository containing `root` and read its status.
    pub fn discover(root: &Path) -> Self {
        Self::discover_with_timeout(root, GIT_TIMEOUT)
    }

    pub fn discover_with_timeout(root: &Path, timeout: Duration) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut git = Self {
            root,
            repo_root: None,
            git_dir: None,
            badges: HashMap::new(),
            hunk_header: Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").ok(),
            timeout,
        };
        match git.locate() {
            Ok(Some((repo, dir))) => {
                debug!(repo = %repo.display(), "git repository");
                git.repo_root = Some(repo);
                git.git_dir = Some(dir);
                git.refresh();
            }
            Ok(None) => debug!(root = %git.root.display(), "not a git repository"),
            Err(err) => warn!(error = %err, "git unavailable"),
        }
        git
    }

    pub fn git_dir(&self) -> Option<&Path> {
        self.git_dir.as_deref()
    }

    pub fn repo_root(&self) -> Option<&Path> {
        self.repo_root.as_deref()
    }

    fn git(&self, cwd: &Path, args: &[&str]) -> PreviewResult<Option<String>> {
        let out = run_bounded(
            Command::new("git").arg("-C").arg(cwd).args(args),
            "git",
            self.timeout,
        )?;
        Ok(out.success.then_some(out.stdout))
    }

    fn locate(&self) -> PreviewResult<Option<(PathBuf, PathBuf)>> {
        let Some(out) = self.git(&self.root, &["rev-parse", "--show-toplevel", "--git-dir"])? else {
            return Ok(None);
        };
        let mut lines = out.lines().map(str::trim).filter(|l| !l.is_empty());
        let (Some(top), Some(dir)) = (lines.next(), lines.next()) else {
            return Ok(None);
        };
        let repo = PathBuf::from(top);
        let repo = repo.canonicalize().unwrap_or(repo);
        let dir = PathBuf::from(dir);
        let dir = if dir.is_absolute() { dir } else { repo.join(dir) };
        Ok(Some((repo, dir)))
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        let repo = self.repo_root.as_deref()?;
        let path = path.canonicalize().ok()?;
        path.strip_prefix(repo).ok().map(Path::to_path_buf)
    }
}

impl VersionControl for GitCli {
    fn diff_hunks(&self, path: &Path) -> Option<Vec<DiffHunk>> {
        let repo = self.repo_root.as_deref()?;
        let header = self.hunk_header.as_ref()?;
        if self.status_badge(path) == Badge::Untracked {
            return None;
        }
        let rel = self.relative(path)?;
        let rel = rel.to_string_lossy();

        for args in DIFF_ARGS {
            let mut full: Vec<&str> = args.to_vec();
            full.push(rel.as_ref());
            match self.git(repo, &full) {
                Ok(Some(text)) => {
                    let hunks = parse_hunks(&text, header);
                    if !hunks.is_empty() {
                        return Some(hunks);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(error = %err, "git diff failed");
                    return None;
                }
            }
        }
        None
    }

    fn status_badge(&self, path: &Path) -> Badge {
        if let Some(badge) = self.badges.get(path) {
            return *badge;
        }
        path.canonicalize()
            .ok()
            .and_then(|p| self.badges.get(&p).copied())
            .unwrap_or_default()
    }

    fn changed_files(&self) -> Vec<PathBuf> {
        self.badges
            .iter()
            .filter(|(path, badge)| **badge != Badge::None && path.is_file())
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn refresh(&mut self) {
        let Some(repo) = self.repo_root.clone() else {
            return;
        };
        let args = ["status", "--porcelain=v1", "-z", "--untracked-files=normal"];
        match self.git(&repo, &args) {
            Ok(Some(out)) => {
                self.badges = badges_from_porcelain(&out, &repo, &self.root);
                debug!(entries = self.badges.len(), "git status");
            }
            Ok(None) => self.badges.clear(),
            Err(err) => warn!(error = %err, "git status failed"),
        }
    }
}

fn number(m: Option<regex::Match<'_>>, default: usize) -> usize {
    m.and_then(|m| m.as_str().parse().ok()).unwrap_or(default)
}

/// Parse `-U0` unified diff text into hunks.
pub fn parse_hunks(text: &str, header: &Regex) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut current: Option<DiffHunk> = None;

    for line in text.lines() {
        if let Some(caps) = header.captures(line) {
            hunks.extend(current.take());
            current = Some(DiffHunk {
                old_start: number(caps.get(1), 0),
                old_count: number(caps.get(2), 1),
                new_start: number(caps.get(3), 0),
                new_count: number(caps.get(4), 1),
                lines: Vec::new(),
            });
            continue;
        }
        let Some(hunk) = current.as_mut() else {
            continue;
        };
        if let Some(rest) = line.strip_prefix('+').filter(|_| !line.starts_with("+++ ")) {
            hunk.lines.push((DiffMarker::Added, rest.to_string()));
        } else if let Some(rest) = line.strip_prefix('-').filter(|_| !line.starts_with("--- ")) {
            hunk.lines.push((DiffMarker::Removed, rest.to_string()));
        } else if let Some(rest) = line.strip_prefix(' ') {
            hunk.lines.push((DiffMarker::Context, rest.to_string()));
        }
    }
    hunks.extend(current);
    hunks
}

fn merge_badge(map: &mut HashMap<PathBuf, Badge>, path: PathBuf, badge: Badge) {
    let slot = map.entry(path).or_default();
    if *slot != Badge::Modified {
        *slot = badge;
    }
}

/// Badges for every changed path under `root` and each of its ancestors
/// up to `root`. Modified wins over untracked on shared directories.
pub fn badges_from_porcelain(output: &str, repo: &Path, root: &Path) -> HashMap<PathBuf, Badge> {
    let mut map = HashMap::new();
    let mut records = output.split('\0');
    while let Some(record) = records.next() {
        if record.len() < 4 || record.as_bytes()[2] != b' ' {
            continue;
        }
        let (status, rel) = record.split_at(3);
        let status = &status[..2];
        if status.contains('R') || status.contains('C') {
            // rename and copy records carry the source path as an extra field
            records.next();
        }
        if status == "!!" {
            continue;
        }
        let badge = if status == "??" {
            Badge::Untracked
        } else {
            Badge::Modified
        };
        let target = repo.join(rel.trim_end_matches('/'));
        if !target.starts_with(root) {
            continue;
        }
        let mut current = Some(target.as_path());
        while let Some(path) = current.filter(|p| p.starts_with(root)) {
            merge_badge(&mut map, path.to_path_buf(), badge);
            current = path.parent();
        }
    }
    map
}
