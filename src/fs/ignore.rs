use std::path::Path;

/// Directory and file names skipped by listings and watch signatures.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
];

pub fn default_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

/// Whether the final component of `path` exactly matches a pattern.
///
/// Only the entry's own name is checked; a root that happens to live under
/// an ignored name is still listed.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy();
    patterns.iter().any(|p| *p == name)
}
