use std::path::{Path, PathBuf};

/// How a logical line relates to the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Ordinary file content or directory entry.
    Text,
    /// Unchanged line inside a diff view.
    Context,
    /// Line present in the working copy but not in the reference.
    Added,
    /// Line present only in the reference; occupies a row, not a line number.
    Removed,
    /// Header, placeholder or truncation marker.
    Synthetic,
}

impl LineKind {
    /// Whether this line consumes a post-change file line number.
    pub fn advances(self) -> bool {
        !matches!(self, LineKind::Removed | LineKind::Synthetic)
    }
}

/// One styled logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocLine {
    pub text: String,
    pub kind: LineKind,
}

impl DocLine {
    pub fn new(text: impl Into<String>, kind: LineKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, LineKind::Text)
    }

    pub fn synthetic(text: impl Into<String>) -> Self {
        Self::new(text, LineKind::Synthetic)
    }
}

/// Image file detected by signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub path: PathBuf,
    pub format: &'static str,
}

/// Output of a preview builder for one target.
///
/// Immutable once built. When `image` is set, `lines` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub path: PathBuf,
    pub lines: Vec<DocLine>,
    pub is_directory: bool,
    pub is_diff: bool,
    pub truncated: bool,
    pub image: Option<ImageRef>,
    /// Columns of plain `+ `/`- ` markers at the start of each diff row.
    pub gutter: usize,
}

impl RenderedDocument {
    pub fn from_lines(path: &Path, lines: Vec<DocLine>) -> Self {
        Self {
            path: path.to_path_buf(),
            lines,
            is_directory: false,
            is_diff: false,
            truncated: false,
            image: None,
            gutter: 0,
        }
    }

    pub fn image(path: &Path, format: &'static str) -> Self {
        Self {
            image: Some(ImageRef {
                path: path.to_path_buf(),
                format,
            }),
            ..Self::from_lines(path, Vec::new())
        }
    }

    /// A single dimmed line explaining why there is nothing to show.
    pub fn placeholder(path: &Path, message: &str) -> Self {
        Self::from_lines(
            path,
            vec![DocLine::synthetic(format!("\x1b[2m{message}\x1b[0m"))],
        )
    }

    pub fn empty() -> Self {
        Self::from_lines(Path::new(""), Vec::new())
    }

    /// Number of lines that carry a post-change line number.
    pub fn logical_line_count(&self) -> usize {
        self.lines.iter().filter(|l| l.kind.advances()).count()
    }

    pub fn kind_label(&self) -> &'static str {
        if self.image.is_some() {
            "image"
        } else if self.is_directory {
            "dir"
        } else if self.is_diff {
            "diff"
        } else {
            "text"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_document_has_no_lines() {
        let doc = RenderedDocument::image(Path::new("a.png"), "png");
        assert!(doc.lines.is_empty());
        assert_eq!(doc.image.as_ref().map(|i| i.format), Some("png"));
        assert_eq!(doc.kind_label(), "image");
    }

    #[test]
    fn removed_and_synthetic_do_not_advance() {
        assert!(LineKind::Text.advances());
        assert!(LineKind::Added.advances());
        assert!(LineKind::Context.advances());
        assert!(!LineKind::Removed.advances());
        assert!(!LineKind::Synthetic.advances());
    }

    #[test]
    fn logical_count_skips_synthetic() {
        let doc = RenderedDocument::from_lines(
            Path::new("x"),
            vec![
                DocLine::synthetic("header"),
                DocLine::text("a"),
                DocLine::new("gone", LineKind::Removed),
                DocLine::new("b", LineKind::Added),
            ],
        );
        assert_eq!(doc.logical_line_count(), 2);
    }
}
