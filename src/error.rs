use std::path::PathBuf;

use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or frame write errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Log subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Failures raised inside preview builders and overlays.
///
/// None of these escape `build_preview`: each one is turned into a
/// degraded document plus a status message.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Binary or image content that has no text rendering.
    #[error("unsupported content: {0}")]
    UnsupportedContent(String),

    /// Every decoder in the chain rejected the bytes.
    #[error("could not decode {}", .0.display())]
    EncodingFailure(PathBuf),

    /// A diff, highlight or search tool is missing or failed.
    #[error("{tool} unavailable: {reason}")]
    ExternalToolUnavailable { tool: &'static str, reason: String },

    /// A size, depth or count ceiling was reached.
    #[error("truncated after {0} entries")]
    Truncated(usize),

    /// An escape sequence could not be parsed.
    #[error("malformed escape sequence")]
    MalformedEscapeInput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PreviewResult<T> = std::result::Result<T, PreviewError>;
