//! File logging. Stdout belongs to the terminal UI, so tracing output only
//! goes to a file, and only when one is configured.

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::error::{AppError, Result};

/// Install the global subscriber writing to `log_path`.
///
/// `RUST_LOG` overrides the default `info` filter. The parent directory
/// is created if missing.
pub fn init(log_path: &Path) -> Result<()> {
    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)?;

    let file_name = log_path
        .file_name()
        .ok_or_else(|| AppError::Logging(format!("{} is not a file path", log_path.display())))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("nested").join("lv.log");
        // a second init in the same test binary fails, the directory is made either way
        let _ = init(&log);
        assert!(tmp.path().join("nested").is_dir());
    }

    #[test]
    fn rejects_path_without_file_name() {
        let err = init(Path::new("/")).unwrap_err();
        assert!(matches!(err, AppError::Logging(_)));
    }
}
