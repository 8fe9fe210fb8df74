//! Configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (higher wins, values merge field by field):
//! 1. CLI flags (`--no-diff`, `--nowrap`, `--show-hidden`, ...)
//! 2. Explicit `--config <file>`
//! 3. `$LAZYVIEW_CONFIG` (path to a config file)
//! 4. Project-local `.lazyview.toml` in the current working directory
//! 5. Global `<config dir>/lazyview/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::preview::{directory, highlight, PreviewOptions};

pub const DEFAULT_COLORIZE_MAX_BYTES: u64 = 256_000;
pub const DEFAULT_CACHE_CAPACITY: usize = crate::preview::cache::DEFAULT_CAPACITY;
pub const DEFAULT_LEFT_WIDTH_PERCENT: u16 = 30;
pub const DEFAULT_TICK_MS: u64 = 120;
pub const DEFAULT_TREE_POLL_TICKS: u32 = 8;
pub const DEFAULT_VCS_POLL_TICKS: u32 = 16;
pub const DEFAULT_STATUS_TICKS: u32 = 10;

// ── Section configs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Show dotfiles in the tree and directory previews.
    pub show_hidden: Option<bool>,
    /// Write tracing output here. Logging is off when unset.
    pub log_file: Option<PathBuf>,
    /// Capture the mouse for clicks, wheel scrolling and drag selection.
    pub mouse: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PreviewConfig {
    pub wrap: Option<bool>,
    /// Syntect theme name.
    pub syntax_theme: Option<String>,
    /// Files above this size are shown without highlighting.
    pub colorize_max_bytes: Option<u64>,
    pub colorize: Option<bool>,
    /// Prefer a diff view for files with uncommitted changes.
    pub diff: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DirectoryConfig {
    pub max_depth: Option<usize>,
    pub max_entries: Option<usize>,
    pub size_labels: Option<bool>,
    pub doc_summaries: Option<bool>,
    pub skip_ignored: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries per preview cache.
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LayoutConfig {
    /// Initial tree pane width as a share of the terminal.
    pub left_width_percent: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatchConfig {
    /// Input wait per tick.
    pub tick_ms: Option<u64>,
    pub tree_poll_ticks: Option<u32>,
    pub vcs_poll_ticks: Option<u32>,
    /// Lifetime of a status message.
    pub status_ticks: Option<u32>,
}

/// Custom color overrides (hex strings like `"#89b4fa"`).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ThemeColorsConfig {
    pub tree_dir_fg: Option<String>,
    pub tree_selected_bg: Option<String>,
    pub status_bg: Option<String>,
    pub status_fg: Option<String>,
    pub border_fg: Option<String>,
    pub accent_fg: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ThemeConfig {
    /// "dark", "light" or "custom".
    pub scheme: Option<String>,
    pub custom: Option<ThemeColorsConfig>,
}

/// Top-level configuration, one field per TOML table.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub preview: PreviewConfig,
    pub directory: DirectoryConfig,
    pub cache: CacheConfig,
    pub layout: LayoutConfig,
    pub watch: WatchConfig,
    pub theme: ThemeConfig,
}

// ── File discovery ───────────────────────────────────────────────────────────

/// Config files to try, highest priority first.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("LAZYVIEW_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    paths.push(PathBuf::from(".lazyview.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("lazyview").join("config.toml"));
    }

    paths
}

/// Read and parse one config file. Missing files are silently skipped;
/// parse errors print a warning since logging is not set up yet.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!("lazyview: ignoring config {}: {}", path.display(), e);
            None
        }
    }
}

// ── Merge and load ───────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                show_hidden: other.general.show_hidden.or(self.general.show_hidden),
                log_file: other.general.log_file.clone().or(self.general.log_file),
                mouse: other.general.mouse.or(self.general.mouse),
            },
            preview: PreviewConfig {
                wrap: other.preview.wrap.or(self.preview.wrap),
                syntax_theme: other
                    .preview
                    .syntax_theme
                    .clone()
                    .or(self.preview.syntax_theme),
                colorize_max_bytes: other
                    .preview
                    .colorize_max_bytes
                    .or(self.preview.colorize_max_bytes),
                colorize: other.preview.colorize.or(self.preview.colorize),
                diff: other.preview.diff.or(self.preview.diff),
            },
            directory: DirectoryConfig {
                max_depth: other.directory.max_depth.or(self.directory.max_depth),
                max_entries: other.directory.max_entries.or(self.directory.max_entries),
                size_labels: other.directory.size_labels.or(self.directory.size_labels),
                doc_summaries: other
                    .directory
                    .doc_summaries
                    .or(self.directory.doc_summaries),
                skip_ignored: other.directory.skip_ignored.or(self.directory.skip_ignored),
            },
            cache: CacheConfig {
                capacity: other.cache.capacity.or(self.cache.capacity),
            },
            layout: LayoutConfig {
                left_width_percent: other
                    .layout
                    .left_width_percent
                    .or(self.layout.left_width_percent),
            },
            watch: WatchConfig {
                tick_ms: other.watch.tick_ms.or(self.watch.tick_ms),
                tree_poll_ticks: other.watch.tree_poll_ticks.or(self.watch.tree_poll_ticks),
                vcs_poll_ticks: other.watch.vcs_poll_ticks.or(self.watch.vcs_poll_ticks),
                status_ticks: other.watch.status_ticks.or(self.watch.status_ticks),
            },
            theme: ThemeConfig {
                scheme: other.theme.scheme.clone().or(self.theme.scheme),
                custom: other.theme.custom.clone().or(self.theme.custom),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` comes from `--config`; `cli_overrides` holds the
    /// values set by other CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        Self::load_from(&candidate_paths(), cli_config_path, cli_overrides)
    }

    fn load_from(
        candidates: &[PathBuf],
        cli_config_path: Option<&Path>,
        cli_overrides: Option<&AppConfig>,
    ) -> AppConfig {
        let mut config = AppConfig::default();

        // lowest priority first so later merges win
        for path in candidates.iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Getters with built-in defaults ───────────────────────────────────────

    pub fn show_hidden(&self) -> bool {
        self.general.show_hidden.unwrap_or(false)
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.general.log_file.as_deref()
    }

    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(true)
    }

    pub fn wrap(&self) -> bool {
        self.preview.wrap.unwrap_or(true)
    }

    pub fn syntax_theme(&self) -> &str {
        self.preview
            .syntax_theme
            .as_deref()
            .unwrap_or(highlight::DEFAULT_THEME)
    }

    pub fn colorize(&self) -> bool {
        self.preview.colorize.unwrap_or(true)
    }

    pub fn colorize_max_bytes(&self) -> u64 {
        self.preview
            .colorize_max_bytes
            .unwrap_or(DEFAULT_COLORIZE_MAX_BYTES)
    }

    pub fn diff(&self) -> bool {
        self.preview.diff.unwrap_or(true)
    }

    pub fn max_depth(&self) -> usize {
        self.directory
            .max_depth
            .unwrap_or(directory::DEFAULT_MAX_DEPTH)
            .max(1)
    }

    /// Entry ceiling, clamped to the hard maximum.
    pub fn max_entries(&self) -> usize {
        self.directory
            .max_entries
            .unwrap_or(directory::DEFAULT_MAX_ENTRIES)
            .clamp(1, directory::HARD_MAX_ENTRIES)
    }

    pub fn size_labels(&self) -> bool {
        self.directory.size_labels.unwrap_or(true)
    }

    pub fn doc_summaries(&self) -> bool {
        self.directory.doc_summaries.unwrap_or(true)
    }

    pub fn skip_ignored(&self) -> bool {
        self.directory.skip_ignored.unwrap_or(true)
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    pub fn left_width_percent(&self) -> u16 {
        self.layout
            .left_width_percent
            .unwrap_or(DEFAULT_LEFT_WIDTH_PERCENT)
            .clamp(10, 90)
    }

    pub fn tick_ms(&self) -> u64 {
        self.watch.tick_ms.unwrap_or(DEFAULT_TICK_MS).max(1)
    }

    pub fn tree_poll_ticks(&self) -> u32 {
        self.watch
            .tree_poll_ticks
            .unwrap_or(DEFAULT_TREE_POLL_TICKS)
            .max(1)
    }

    pub fn vcs_poll_ticks(&self) -> u32 {
        self.watch
            .vcs_poll_ticks
            .unwrap_or(DEFAULT_VCS_POLL_TICKS)
            .max(1)
    }

    pub fn status_ticks(&self) -> u32 {
        self.watch.status_ticks.unwrap_or(DEFAULT_STATUS_TICKS)
    }

    /// Builder options derived from this configuration.
    pub fn preview_options(&self) -> PreviewOptions {
        PreviewOptions {
            colorize: self.colorize(),
            colorize_max_bytes: self.colorize_max_bytes(),
            syntax_theme: self.syntax_theme().to_string(),
            diff: self.diff(),
            show_hidden: self.show_hidden(),
            skip_ignored: self.skip_ignored(),
            max_depth: self.max_depth(),
            max_entries: self.max_entries(),
            size_labels: self.size_labels(),
            doc_summaries: self.doc_summaries(),
            ..PreviewOptions::default()
        }
    }
}
