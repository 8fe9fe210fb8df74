//! Preview composition: picks a builder for a target, runs it through the
//! caches and turns every failure into a placeholder document.

pub mod cache;
pub mod diff;
pub mod directory;
pub mod document;
pub mod highlight;
pub mod text;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PreviewError;
use crate::fs::ignore::default_patterns;
use crate::render::sticky::ScopeIndex;
use crate::services::VersionControl;

use self::cache::{DocumentKey, FileSignature, PreviewCache};
use self::directory::DirStamps;
use self::document::RenderedDocument;
use self::highlight::Highlighter;

/// Inputs that change what a builder produces. Part of every cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewOptions {
    pub colorize: bool,
    pub colorize_max_bytes: u64,
    pub syntax_theme: String,
    pub diff: bool,
    pub show_hidden: bool,
    pub skip_ignored: bool,
    pub ignore: Vec<String>,
    pub max_depth: usize,
    pub max_entries: usize,
    pub size_labels: bool,
    pub doc_summaries: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            colorize: true,
            colorize_max_bytes: 256_000,
            syntax_theme: highlight::DEFAULT_THEME.to_string(),
            diff: true,
            show_hidden: false,
            skip_ignored: true,
            ignore: default_patterns(),
            max_depth: directory::DEFAULT_MAX_DEPTH,
            max_entries: directory::DEFAULT_MAX_ENTRIES,
            size_labels: true,
            doc_summaries: true,
        }
    }
}

/// Which builder handled a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderPath {
    Directory,
    Image,
    BinaryPlaceholder,
    Diff,
    PlainText,
    Unreadable,
}

/// Result of [`PreviewEngine::build_preview`].
#[derive(Debug, Clone)]
pub struct BuiltPreview {
    pub document: Arc<RenderedDocument>,
    pub path: BuilderPath,
    /// Transient status message for degraded builds.
    pub status: Option<String>,
}

impl BuiltPreview {
    fn new(document: RenderedDocument, path: BuilderPath) -> Self {
        Self {
            document: Arc::new(document),
            path,
            status: None,
        }
    }

    fn degraded(target: &Path, err: &PreviewError) -> Self {
        warn!(path = %target.display(), error = %err, "preview degraded");
        let (doc, status) = match err {
            PreviewError::UnsupportedContent(what) => (
                RenderedDocument::placeholder(target, &format!("<{what}>")),
                None,
            ),
            other => (
                RenderedDocument::placeholder(target, &format!("<{other}>")),
                Some(other.to_string()),
            ),
        };
        let path = match err {
            PreviewError::UnsupportedContent(_) => BuilderPath::BinaryPlaceholder,
            _ => BuilderPath::Unreadable,
        };
        Self {
            document: Arc::new(doc),
            path,
            status,
        }
    }
}

/// Owns the highlighter and the builder caches.
pub struct PreviewEngine {
    highlighter: Highlighter,
    directories: PreviewCache<DocumentKey, (Arc<RenderedDocument>, Arc<DirStamps>)>,
    diffs: PreviewCache<DocumentKey, Option<Arc<RenderedDocument>>>,
    scopes: PreviewCache<DocumentKey, Arc<ScopeIndex>>,
    vcs_signature: u64,
    tree_signature: u64,
}

impl PreviewEngine {
    pub fn new(syntax_theme: Option<&str>, cache_capacity: usize) -> Self {
        Self {
            highlighter: Highlighter::new(syntax_theme),
            directories: PreviewCache::new("directory", cache_capacity),
            diffs: PreviewCache::new("diff", cache_capacity),
            scopes: PreviewCache::new("scope", cache_capacity),
            vcs_signature: 0,
            tree_signature: 0,
        }
    }

    /// Record the latest watch signatures; they take part in cache keys.
    pub fn set_signatures(&mut self, tree: u64, vcs: u64) {
        self.tree_signature = tree;
        self.vcs_signature = vcs;
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    fn key(&self, file: FileSignature, options: &PreviewOptions) -> DocumentKey {
        DocumentKey {
            file,
            options: options.clone(),
            vcs_signature: self.vcs_signature,
            tree_signature: self.tree_signature,
        }
    }

    /// Build the document for `target`.
    ///
    /// `file -> {image, binary placeholder, diff, plain text}` and
    /// `directory -> listing`. Never fails; errors become placeholders.
    pub fn build_preview(
        &mut self,
        target: &Path,
        options: &PreviewOptions,
        vcs: &dyn VersionControl,
    ) -> BuiltPreview {
        let signature = match FileSignature::of(target) {
            Ok(sig) => sig,
            Err(err) => return BuiltPreview::degraded(target, &PreviewError::Io(err)),
        };

        if target.is_dir() {
            return self.directory(target, signature, options, vcs);
        }

        if options.diff {
            match self.diff(target, signature, options, vcs) {
                Ok(Some(doc)) => {
                    return BuiltPreview {
                        document: doc,
                        path: BuilderPath::Diff,
                        status: None,
                    }
                }
                Ok(None) => {}
                Err(err) => debug!(path = %target.display(), error = %err, "diff unavailable"),
            }
        }

        match text::build_file(target, options, &self.highlighter) {
            Ok(doc) if doc.image.is_some() => BuiltPreview::new(doc, BuilderPath::Image),
            Ok(doc) => BuiltPreview::new(doc, BuilderPath::PlainText),
            Err(err) => BuiltPreview::degraded(target, &err),
        }
    }

    fn directory(
        &mut self,
        target: &Path,
        signature: FileSignature,
        options: &PreviewOptions,
        vcs: &dyn VersionControl,
    ) -> BuiltPreview {
        let key = self.key(signature, options);
        if let Some((doc, stamps)) = self.directories.get(&key) {
            if stamps.is_current() {
                return BuiltPreview {
                    document: doc,
                    path: BuilderPath::Directory,
                    status: None,
                };
            }
            debug!(path = %target.display(), "nested directory changed");
            self.directories.remove(&key);
        }
        match directory::build_directory(target, options, Some(vcs)) {
            Ok(listing) => {
                let built = BuiltPreview::new(listing.document, BuilderPath::Directory);
                self.directories
                    .put(key, (Arc::clone(&built.document), Arc::new(listing.stamps)));
                built
            }
            Err(err) => BuiltPreview::degraded(target, &err),
        }
    }

    fn diff(
        &mut self,
        target: &Path,
        signature: FileSignature,
        options: &PreviewOptions,
        vcs: &dyn VersionControl,
    ) -> Result<Option<Arc<RenderedDocument>>, PreviewError> {
        let key = self.key(signature, options);
        if let Some(cached) = self.diffs.get(&key) {
            return Ok(cached);
        }
        let built = diff::build_diff(target, options, &self.highlighter, vcs)?.map(Arc::new);
        self.diffs.put(key, built.clone());
        Ok(built)
    }

    /// Symbol scopes of `doc`, cached by the document's file signature.
    pub fn scopes(&mut self, doc: &RenderedDocument, options: &PreviewOptions) -> Arc<ScopeIndex> {
        if doc.is_directory || doc.image.is_some() {
            return Arc::new(ScopeIndex::default());
        }
        let Ok(signature) = FileSignature::of(&doc.path) else {
            return Arc::new(ScopeIndex::build(doc));
        };
        let mut key = self.key(signature, options);
        key.tree_signature = 0;
        if !doc.is_diff {
            key.vcs_signature = 0;
        }
        if let Some(index) = self.scopes.get(&key) {
            return index;
        }
        let index = Arc::new(ScopeIndex::build(doc));
        self.scopes.put(key, Arc::clone(&index));
        index
    }
}
