//! Collaborator capabilities consumed by the preview engine and scheduler.
//!
//! Each collaborator is an object-safe trait. [`Services`] is built in two
//! phases: [`Services::offline`] gives inert implementations, then the
//! `with_*` methods bind the real ones once the root path is known.

pub mod git;
pub mod search;
pub mod watch;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{PreviewError, PreviewResult};
use crate::preview::diff::DiffHunk;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Version-control status shown next to tree and directory rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Badge {
    #[default]
    None,
    Modified,
    Untracked,
}

impl Badge {
    /// Styled label, empty for `None`.
    pub fn label(self) -> &'static str {
        match self {
            Badge::None => "",
            Badge::Modified => " \x1b[38;5;214m[M]\x1b[0m",
            Badge::Untracked => " \x1b[38;5;42m[?]\x1b[0m",
        }
    }
}

pub trait VersionControl {
    /// Hunks of `path` against the reference revision, or `None` when no
    /// usable diff exists (clean file, untracked file, tool failure).
    fn diff_hunks(&self, path: &Path) -> Option<Vec<DiffHunk>>;

    fn status_badge(&self, path: &Path) -> Badge;

    /// Files with a badge, in no particular order.
    fn changed_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Re-read working-tree status. Called after the VCS signature changes.
    fn refresh(&mut self) {}
}

pub trait Watch {
    /// Opaque hash of the watched directories' listings.
    fn tree_signature(&self, watched: &[PathBuf]) -> u64;

    /// Opaque hash of the repository state (HEAD, index).
    fn vcs_signature(&self) -> u64;
}

/// One parsed content-search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// 1-based byte column of the match start.
    pub column: usize,
    pub preview: String,
}

pub trait Search {
    fn search(&self, root: &Path, query: &str, limit: usize) -> Vec<SearchMatch>;
}

pub struct NoVcs;

impl VersionControl for NoVcs {
    fn diff_hunks(&self, _path: &Path) -> Option<Vec<DiffHunk>> {
        None
    }

    fn status_badge(&self, _path: &Path) -> Badge {
        Badge::None
    }
}

pub struct NoSearch;

impl Search for NoSearch {
    fn search(&self, _root: &Path, _query: &str, _limit: usize) -> Vec<SearchMatch> {
        Vec::new()
    }
}

pub struct StillWatch;

impl Watch for StillWatch {
    fn tree_signature(&self, _watched: &[PathBuf]) -> u64 {
        0
    }

    fn vcs_signature(&self) -> u64 {
        0
    }
}

pub struct Services {
    pub vcs: Box<dyn VersionControl>,
    pub watch: Box<dyn Watch>,
    pub search: Box<dyn Search>,
}

impl Services {
    pub fn offline() -> Self {
        Self {
            vcs: Box::new(NoVcs),
            watch: Box::new(StillWatch),
            search: Box::new(NoSearch),
        }
    }

    pub fn with_vcs(mut self, vcs: impl VersionControl + 'static) -> Self {
        self.vcs = Box::new(vcs);
        self
    }

    pub fn with_watch(mut self, watch: impl Watch + 'static) -> Self {
        self.watch = Box::new(watch);
        self
    }

    pub fn with_search(mut self, search: impl Search + 'static) -> Self {
        self.search = Box::new(search);
        self
    }
}

/// Output of a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
}

/// Run `cmd` and wait at most `timeout` for it to exit.
///
/// Stdout is drained on a helper thread so a chatty child cannot stall on a
/// full pipe. A child still running at the deadline is killed.
pub fn run_bounded(
    cmd: &mut Command,
    tool: &'static str,
    timeout: Duration,
) -> PreviewResult<ToolOutput> {
    let unavailable = |reason: String| PreviewError::ExternalToolUnavailable { tool, reason };

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| unavailable(e.to_string()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| unavailable("no stdout pipe".to_string()))?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                debug!(tool, "killed after timeout");
                return Err(unavailable(format!("timed out after {timeout:?}")));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(unavailable(e.to_string())),
        }
    };

    let bytes = reader
        .join()
        .map_err(|_| unavailable("output reader panicked".to_string()))?;
    Ok(ToolOutput {
        success: status.success(),
        code: status.code(),
        stdout: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
