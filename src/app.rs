use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use ratatui::layout::Rect;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::fs::tree::{tree_order_key, TreeState, PICKER_MAX_FILES};
use crate::preview::directory::{ENTRY_GROWTH_STEP, HARD_MAX_ENTRIES};
use crate::preview::document::{LineKind, RenderedDocument};
use crate::preview::{PreviewEngine, PreviewOptions};
use crate::render::ansi;
use crate::render::line_map::{self, DisplayLayout};
use crate::render::overlay::{QueryOverlay, RowCol, Selection};
use crate::render::sticky::ScopeIndex;
use crate::services::{SearchMatch, Services};
use crate::theme::{resolve_theme, ThemeColors};
use crate::ui::{self, Panes};

pub const PICKER_RESULT_LIMIT: usize = 200;
pub const FILTER_RESULT_LIMIT: usize = 500;
pub const MIN_PANE_WIDTH: u16 = 12;
pub const HISTORY_LIMIT: usize = 100;
pub const HORIZONTAL_STEP: usize = 8;
pub const WHEEL_STEP: isize = 3;

/// Single-line text input with a byte cursor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub text: String,
    pub cursor: usize,
}

impl InputLine {
    pub fn insert(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) -> bool {
        let Some(prev) = self.text[..self.cursor].chars().next_back() else {
            return false;
        };
        self.cursor -= prev.len_utf8();
        self.text.remove(self.cursor);
        true
    }

    pub fn left(&mut self) -> bool {
        match self.text[..self.cursor].chars().next_back() {
            Some(prev) => {
                self.cursor -= prev.len_utf8();
                true
            }
            None => false,
        }
    }

    pub fn right(&mut self) -> bool {
        match self.text[self.cursor..].chars().next() {
            Some(next) => {
                self.cursor += next.len_utf8();
                true
            }
            None => false,
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.len();
    }
}

/// Scroll offset that keeps `selected` inside a list of `rows` rows.
pub fn keep_visible(selected: usize, scroll: usize, rows: usize) -> usize {
    if rows == 0 || selected < scroll {
        return selected.min(scroll);
    }
    if selected >= scroll + rows {
        return selected + 1 - rows;
    }
    scroll
}

/// One fuzzy picker result, relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerHit {
    pub path: PathBuf,
    pub score: i64,
    /// Character positions of the matched query characters.
    pub indices: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct PickerState {
    pub input: InputLine,
    pub candidates: Vec<PathBuf>,
    pub hits: Vec<PickerHit>,
    pub selected: usize,
    pub scroll: usize,
}

impl PickerState {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        let mut state = Self {
            candidates,
            ..Self::default()
        };
        state.refilter();
        state
    }

    /// Re-rank the candidates against the current query.
    pub fn refilter(&mut self) {
        let query = self.input.text.trim();
        self.hits = if query.is_empty() {
            self.candidates
                .iter()
                .take(PICKER_RESULT_LIMIT)
                .map(|path| PickerHit {
                    path: path.clone(),
                    score: 0,
                    indices: Vec::new(),
                })
                .collect()
        } else {
            let matcher = SkimMatcherV2::default();
            let mut scored: Vec<PickerHit> = self
                .candidates
                .iter()
                .filter_map(|path| {
                    let text = path.to_string_lossy();
                    matcher
                        .fuzzy_indices(&text, query)
                        .map(|(score, indices)| PickerHit {
                            path: path.clone(),
                            score,
                            indices,
                        })
                })
                .collect();
            scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
            scored.truncate(PICKER_RESULT_LIMIT);
            scored
        };
        self.selected = 0;
        self.scroll = 0;
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        let Some(last) = self.hits.len().checked_sub(1) else {
            return false;
        };
        let next = self.selected.saturating_add_signed(delta).min(last);
        let moved = next != self.selected;
        self.selected = next;
        moved
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.hits.get(self.selected).map(|h| h.path.as_path())
    }
}

/// Content filter backed by the search collaborator.
#[derive(Debug, Default)]
pub struct FilterState {
    pub input: InputLine,
    pub hits: Vec<SearchMatch>,
    pub selected: usize,
    pub scroll: usize,
    /// Typing edits the query; otherwise keys move through hits.
    pub editing: bool,
}

impl FilterState {
    pub fn selected_hit(&self) -> Option<&SearchMatch> {
        self.hits.get(self.selected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Picker,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMark {
    Set,
    Jump,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub path: PathBuf,
    pub scroll: usize,
}

/// Pointer drag in progress over the preview pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drag {
    pub anchor: RowCol,
    /// Last reported pointer cell, in terminal coordinates.
    pub pointer: (u16, u16),
    /// Rows scrolled per idle tick while the pointer is past an edge.
    pub edge_step: isize,
}

/// Auto-scroll speed for a pointer `overshoot` rows past a pane `span`
/// rows tall.
pub fn drag_scroll_step(overshoot: usize, span: usize) -> usize {
    overshoot.clamp(1, (span / 2).max(1)) * 2
}

/// Selection from `anchor` to `point` that includes both cells.
fn drag_selection(anchor: RowCol, point: RowCol) -> Selection {
    let (start, end) = if point >= anchor {
        (anchor, point)
    } else {
        (point, anchor)
    };
    Selection {
        start,
        end: RowCol {
            row: end.row,
            col: end.col + 1,
        },
    }
}

/// Back/forward stacks of previewed paths.
#[derive(Debug, Default)]
pub struct History {
    back: Vec<PathBuf>,
    forward: Vec<PathBuf>,
}

impl History {
    pub fn record(&mut self, from: PathBuf) {
        if self.back.last() != Some(&from) {
            self.back.push(from);
            if self.back.len() > HISTORY_LIMIT {
                self.back.remove(0);
            }
        }
        self.forward.clear();
    }

    pub fn go_back(&mut self, current: PathBuf) -> Option<PathBuf> {
        let target = self.back.pop()?;
        self.forward.push(current);
        Some(target)
    }

    pub fn go_forward(&mut self, current: PathBuf) -> Option<PathBuf> {
        let target = self.forward.pop()?;
        self.back.push(current);
        Some(target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    /// Tick at which the message disappears.
    pub expires_at: u64,
}

/// Pane width bounds for a terminal `total` columns wide.
fn clamp_left_width(width: u16, total: u16) -> u16 {
    let max = total.saturating_sub(MIN_PANE_WIDTH + 1);
    let min = MIN_PANE_WIDTH.min(max);
    width.clamp(min, max.max(min))
}

/// All mutable state of a session. Owned by the scheduler; handlers get
/// `&mut App` and report whether they changed anything.
pub struct App {
    pub root: PathBuf,
    pub tree: TreeState,
    pub engine: PreviewEngine,
    pub services: Services,
    pub options: PreviewOptions,
    pub theme: ThemeColors,

    pub document: Arc<RenderedDocument>,
    pub layout: DisplayLayout,
    pub scopes: Arc<ScopeIndex>,
    pub preview_scroll: usize,
    pub preview_x: usize,
    pub wrap: bool,
    /// Per-directory entry ceilings raised by "show more".
    pub entry_ceilings: HashMap<PathBuf, usize>,

    pub area: Rect,
    pub left_width: u16,
    left_width_percent: u16,

    pub status: Option<StatusMessage>,
    pub status_ticks: u32,
    pub tick: u64,
    pub dirty: bool,
    pub should_quit: bool,

    pub mode: Mode,
    pub picker: Option<PickerState>,
    pub filter: Option<FilterState>,
    pub marks: HashMap<char, Mark>,
    pub pending_mark: Option<PendingMark>,
    pub history: History,
    pub show_help: bool,
    pub query: Option<QueryOverlay>,
    /// Display row where the current selection started.
    pub selection_anchor: Option<usize>,
    /// Character-level selection made with the mouse.
    pub pointer_selection: Option<Selection>,
    pub drag: Option<Drag>,
}

impl App {
    /// Create the session rooted at `root` and build the first preview.
    pub fn new(root: &Path, config: &AppConfig, services: Services) -> Result<Self> {
        let options = config.preview_options();
        let ignore = if options.skip_ignored {
            options.ignore.clone()
        } else {
            Vec::new()
        };
        let tree = TreeState::new(root, config.show_hidden(), ignore)?;
        let mut app = Self {
            root: root.to_path_buf(),
            tree,
            engine: PreviewEngine::new(Some(config.syntax_theme()), config.cache_capacity()),
            services,
            options,
            theme: resolve_theme(&config.theme),
            document: Arc::new(RenderedDocument::empty()),
            layout: DisplayLayout::default(),
            scopes: Arc::new(ScopeIndex::default()),
            preview_scroll: 0,
            preview_x: 0,
            wrap: config.wrap(),
            entry_ceilings: HashMap::new(),
            area: Rect::default(),
            left_width: 0,
            left_width_percent: config.left_width_percent(),
            status: None,
            status_ticks: config.status_ticks(),
            tick: 0,
            dirty: true,
            should_quit: false,
            mode: Mode::Normal,
            picker: None,
            filter: None,
            marks: HashMap::new(),
            pending_mark: None,
            history: History::default(),
            show_help: false,
            query: None,
            selection_anchor: None,
            pointer_selection: None,
            drag: None,
        };
        app.refresh_preview();
        Ok(app)
    }

    pub fn panes(&self) -> Panes {
        ui::panes(self.area, self.left_width)
    }

    pub fn preview_rows(&self) -> usize {
        self.panes().preview.height as usize
    }

    // ── Status ───────────────────────────────────────────────────────────────

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: false,
            expires_at: self.tick + u64::from(self.status_ticks),
        });
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!(message = %text, "status error");
        self.status = Some(StatusMessage {
            text,
            is_error: true,
            expires_at: self.tick + u64::from(self.status_ticks),
        });
    }

    /// Drop the status message once its tick has come.
    pub fn expire_status(&mut self) -> bool {
        match &self.status {
            Some(msg) if self.tick >= msg.expires_at => {
                self.status = None;
                true
            }
            _ => false,
        }
    }

    // ── Viewport ─────────────────────────────────────────────────────────────

    /// Adopt a newly measured terminal area and clamp everything that
    /// depends on it.
    pub fn measure(&mut self, area: Rect) -> bool {
        let mut changed = false;
        if area != self.area {
            if self.area.width == 0 {
                self.left_width = (u32::from(area.width) * u32::from(self.left_width_percent) / 100) as u16;
            }
            self.area = area;
            changed = true;
        }
        let clamped = clamp_left_width(self.left_width, area.width);
        if clamped != self.left_width {
            self.left_width = clamped;
            changed = true;
        }
        if self.layout.wrap_width != self.wrap_width() {
            self.rebuild_layout();
            changed = true;
        }
        changed |= self.clamp_preview_scroll();
        changed
    }

    /// Derived bounds: list scroll windows and the preview scroll ceiling.
    pub fn recompute_bounds(&mut self) -> bool {
        let panes = self.panes();
        let mut changed = false;
        match self.mode {
            Mode::Filter => {
                if let Some(filter) = self.filter.as_mut() {
                    let rows = (panes.tree.height as usize).saturating_sub(1);
                    let scroll = keep_visible(filter.selected, filter.scroll, rows);
                    changed |= scroll != filter.scroll;
                    filter.scroll = scroll;
                }
            }
            _ => changed |= self.tree.update_scroll(panes.tree.height as usize),
        }
        if let Some(picker) = self.picker.as_mut() {
            let rows = crate::components::picker::list_rows(self.area);
            let scroll = keep_visible(picker.selected, picker.scroll, rows);
            changed |= scroll != picker.scroll;
            picker.scroll = scroll;
        }
        changed |= self.clamp_preview_scroll();
        changed
    }

    fn wrap_width(&self) -> Option<usize> {
        let width = self.panes().preview.width as usize;
        (self.wrap && width > 0).then_some(width)
    }

    pub fn max_preview_scroll(&self) -> usize {
        self.layout.map.row_count().saturating_sub(self.preview_rows().max(1))
    }

    fn clamp_preview_scroll(&mut self) -> bool {
        let max = self.max_preview_scroll();
        if self.preview_scroll > max {
            self.preview_scroll = max;
            return true;
        }
        false
    }

    pub fn resize_left(&mut self, delta: i16) -> bool {
        let next = clamp_left_width(self.left_width.saturating_add_signed(delta), self.area.width);
        if next == self.left_width {
            return false;
        }
        self.left_width = next;
        if self.wrap {
            self.rebuild_layout();
        }
        self.clamp_preview_scroll();
        true
    }

    // ── Preview ──────────────────────────────────────────────────────────────

    /// Path the preview pane should show.
    pub fn preview_target(&self) -> Option<PathBuf> {
        if self.mode == Mode::Filter {
            if let Some(hit) = self.filter.as_ref().and_then(FilterState::selected_hit) {
                return Some(hit.path.clone());
            }
        }
        self.tree.selected().map(|item| item.path.clone())
    }

    fn options_for(&self, target: &Path) -> PreviewOptions {
        match self.entry_ceilings.get(target) {
            Some(&ceiling) => PreviewOptions {
                max_entries: ceiling,
                ..self.options.clone()
            },
            None => self.options.clone(),
        }
    }

    /// Rebuild the document for the current target. Scroll is kept when
    /// the target did not change.
    pub fn refresh_preview(&mut self) -> bool {
        let Some(target) = self.preview_target() else {
            self.document = Arc::new(RenderedDocument::empty());
            self.rebuild_layout();
            return true;
        };
        let options = self.options_for(&target);
        let built = self
            .engine
            .build_preview(&target, &options, self.services.vcs.as_ref());
        debug!(path = %target.display(), builder = ?built.path, "preview built");
        if let Some(message) = built.status {
            self.set_error(message);
        }
        let same_target = built.document.path == self.document.path;
        self.document = built.document;
        if !same_target {
            self.preview_scroll = 0;
            self.preview_x = 0;
            self.selection_anchor = None;
            self.pointer_selection = None;
            self.drag = None;
        }
        self.rebuild_layout();
        self.clamp_preview_scroll();
        true
    }

    /// Re-wrap the current document and look up its scopes.
    pub fn rebuild_layout(&mut self) {
        self.layout = DisplayLayout::build(&self.document, self.wrap_width());
        self.scopes = self.engine.scopes(&self.document, &self.options);
    }

    pub fn scroll_preview(&mut self, delta: isize) -> bool {
        self.scroll_preview_to(self.preview_scroll.saturating_add_signed(delta))
    }

    pub fn scroll_preview_to(&mut self, row: usize) -> bool {
        let next = row.min(self.max_preview_scroll());
        let moved = next != self.preview_scroll;
        self.preview_scroll = next;
        moved
    }

    pub fn scroll_horizontal(&mut self, delta: isize) -> bool {
        if self.wrap {
            return false;
        }
        let next = self.preview_x.saturating_add_signed(delta);
        let moved = next != self.preview_x;
        self.preview_x = next;
        moved
    }

    /// Scroll so logical `line` is the first row of the window.
    pub fn jump_to_line(&mut self, line: usize) -> bool {
        match self.layout.map.row_for_line(line) {
            Some(row) => self.scroll_preview_to(row),
            None => false,
        }
    }

    /// Logical line at the top of the preview window.
    pub fn top_line(&self) -> Option<usize> {
        self.layout.map.nearest_line(self.preview_scroll)
    }

    pub fn scroll_percent(&self) -> f64 {
        line_map::scroll_percent(self.preview_scroll, self.layout.map.row_count(), self.preview_rows())
    }

    pub fn toggle_wrap(&mut self) -> bool {
        self.wrap = !self.wrap;
        let line = self.top_line();
        self.preview_x = 0;
        self.rebuild_layout();
        if let Some(line) = line {
            self.jump_to_line(line);
        }
        self.clamp_preview_scroll();
        self.set_status(if self.wrap { "wrap on" } else { "wrap off" });
        true
    }

    pub fn toggle_diff(&mut self) -> bool {
        self.options.diff = !self.options.diff;
        self.refresh_preview();
        self.set_status(if self.options.diff { "diff view on" } else { "diff view off" });
        true
    }

    pub fn toggle_hidden(&mut self) -> bool {
        self.tree.toggle_hidden();
        self.options.show_hidden = self.tree.show_hidden;
        self.refresh_preview();
        true
    }

    /// Raise the entry ceiling of the previewed directory.
    pub fn show_more(&mut self) -> bool {
        if !(self.document.is_directory && self.document.truncated) {
            return false;
        }
        let path = self.document.path.clone();
        let current = self
            .entry_ceilings
            .get(&path)
            .copied()
            .unwrap_or(self.options.max_entries);
        let next = (current + ENTRY_GROWTH_STEP).min(HARD_MAX_ENTRIES);
        if next == current {
            return false;
        }
        self.entry_ceilings.insert(path, next);
        self.refresh_preview();
        self.set_status(format!("showing up to {next} entries"));
        true
    }

    pub fn toggle_selection(&mut self) -> bool {
        if self.pointer_selection.take().is_some() {
            self.selection_anchor = None;
            return true;
        }
        self.selection_anchor = match self.selection_anchor {
            Some(_) => None,
            None => Some(self.preview_scroll),
        };
        true
    }

    pub fn selection(&self) -> Option<Selection> {
        self.pointer_selection.or_else(|| {
            self.selection_anchor
                .map(|anchor| Selection::rows(anchor, self.preview_scroll))
        })
    }

    /// Move the query's current match to the next (or previous) line that
    /// contains it and scroll there.
    pub fn next_match(&mut self, forward: bool) -> bool {
        let Some(query) = self.query.as_ref() else {
            return false;
        };
        let needle = query.query.to_lowercase();
        if needle.is_empty() {
            return false;
        }
        let from = query.current_line.or_else(|| self.top_line()).unwrap_or(0);
        let lines: Vec<usize> = self
            .document
            .lines
            .iter()
            .filter(|l| l.kind.advances())
            .enumerate()
            .filter(|(_, l)| ansi::strip_ansi(&l.text).to_lowercase().contains(&needle))
            .map(|(i, _)| i + 1)
            .collect();
        let found = if forward {
            lines.iter().find(|&&n| n > from).or(lines.first())
        } else {
            lines.iter().rev().find(|&&n| n < from).or(lines.last())
        };
        let Some(&line) = found else {
            self.set_status(format!("no match for {}", query.query));
            return true;
        };
        if let Some(query) = self.query.as_mut() {
            query.current_line = Some(line);
        }
        self.jump_to_line(line);
        true
    }

    // ── Tree navigation ──────────────────────────────────────────────────────

    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.tree.move_selection(delta) {
            self.refresh_preview();
            return true;
        }
        false
    }

    pub fn select_first(&mut self) -> bool {
        self.tree.select_first() && self.refresh_preview()
    }

    pub fn select_last(&mut self) -> bool {
        self.tree.select_last() && self.refresh_preview()
    }

    pub fn expand_selected(&mut self) -> bool {
        self.tree.expand_selected()
    }

    pub fn collapse_selected(&mut self) -> bool {
        if self.tree.collapse_selected() {
            self.refresh_preview();
            return true;
        }
        false
    }

    /// Select `path` in the tree and preview it, recording history.
    pub fn navigate_to(&mut self, path: &Path) -> bool {
        let current = self.preview_target();
        if !self.tree.reveal(path) {
            self.set_error(format!("not in tree: {}", path.display()));
            return true;
        }
        if let Some(current) = current.filter(|c| c != path) {
            self.history.record(current);
        }
        self.refresh_preview();
        true
    }

    fn revisit(&mut self, target: Option<PathBuf>) -> bool {
        let Some(target) = target else {
            return false;
        };
        if self.tree.reveal(&target) {
            self.refresh_preview();
        } else {
            self.set_error(format!("gone: {}", target.display()));
        }
        true
    }

    pub fn history_back(&mut self) -> bool {
        let Some(current) = self.preview_target() else {
            return false;
        };
        let target = self.history.go_back(current);
        self.revisit(target)
    }

    pub fn history_forward(&mut self) -> bool {
        let Some(current) = self.preview_target() else {
            return false;
        };
        let target = self.history.go_forward(current);
        self.revisit(target)
    }

    // ── Marks ────────────────────────────────────────────────────────────────

    pub fn set_mark(&mut self, key: char) -> bool {
        let Some(path) = self.preview_target() else {
            return false;
        };
        self.marks.insert(
            key,
            Mark {
                path,
                scroll: self.preview_scroll,
            },
        );
        self.set_status(format!("mark '{key}' set"));
        true
    }

    pub fn jump_to_mark(&mut self, key: char) -> bool {
        let Some(mark) = self.marks.get(&key).cloned() else {
            self.set_status(format!("no mark '{key}'"));
            return true;
        };
        self.navigate_to(&mark.path);
        self.scroll_preview_to(mark.scroll);
        true
    }

    // ── Picker ───────────────────────────────────────────────────────────────

    pub fn open_picker(&mut self) -> bool {
        let candidates = self.tree.all_files(PICKER_MAX_FILES);
        debug!(files = candidates.len(), "picker opened");
        self.picker = Some(PickerState::new(candidates));
        self.mode = Mode::Picker;
        true
    }

    pub fn close_picker(&mut self) -> bool {
        self.picker = None;
        self.mode = Mode::Normal;
        true
    }

    pub fn accept_picker(&mut self) -> bool {
        let target = self
            .picker
            .as_ref()
            .and_then(PickerState::selected_path)
            .map(|rel| self.root.join(rel));
        self.close_picker();
        if let Some(target) = target {
            self.navigate_to(&target);
        }
        true
    }

    // ── Content filter ───────────────────────────────────────────────────────

    pub fn open_filter(&mut self) -> bool {
        match self.filter.as_mut() {
            Some(filter) => filter.editing = true,
            None => {
                self.filter = Some(FilterState {
                    editing: true,
                    ..FilterState::default()
                })
            }
        }
        self.mode = Mode::Filter;
        true
    }

    /// Run the search for the typed query and preview the first hit.
    pub fn submit_filter(&mut self) -> bool {
        let Some(filter) = self.filter.as_mut() else {
            return false;
        };
        let query = filter.input.text.trim().to_string();
        filter.editing = false;
        if query.is_empty() {
            return self.close_filter();
        }
        let hits = self
            .services
            .search
            .search(&self.root, &query, FILTER_RESULT_LIMIT);
        info!(query = %query, hits = hits.len(), "content filter");
        let count = hits.len();
        if let Some(filter) = self.filter.as_mut() {
            filter.hits = hits;
            filter.selected = 0;
            filter.scroll = 0;
        }
        self.query = Some(QueryOverlay {
            query,
            current_line: None,
        });
        if count == 0 {
            self.set_status("no matches");
        } else {
            self.set_status(format!("{count} matches"));
        }
        self.preview_hit();
        true
    }

    /// Preview the selected hit at its line.
    fn preview_hit(&mut self) {
        let line = self
            .filter
            .as_ref()
            .and_then(FilterState::selected_hit)
            .map(|hit| hit.line);
        self.refresh_preview();
        if let Some(line) = line {
            if let Some(query) = self.query.as_mut() {
                query.current_line = Some(line);
            }
            self.jump_to_line(line);
        }
    }

    pub fn move_filter_selection(&mut self, delta: isize) -> bool {
        let Some(filter) = self.filter.as_mut() else {
            return false;
        };
        let Some(last) = filter.hits.len().checked_sub(1) else {
            return false;
        };
        let next = filter.selected.saturating_add_signed(delta).min(last);
        if next == filter.selected {
            return false;
        }
        filter.selected = next;
        self.preview_hit();
        true
    }

    /// Leave the filter at the selected hit, keeping the match overlay.
    pub fn accept_filter(&mut self) -> bool {
        let hit = self
            .filter
            .as_ref()
            .and_then(FilterState::selected_hit)
            .cloned();
        self.filter = None;
        self.mode = Mode::Normal;
        let Some(hit) = hit else {
            return true;
        };
        self.navigate_to(&hit.path);
        if let Some(query) = self.query.as_mut() {
            query.current_line = Some(hit.line);
        }
        self.jump_to_line(hit.line);
        true
    }

    pub fn close_filter(&mut self) -> bool {
        self.filter = None;
        self.query = None;
        self.mode = Mode::Normal;
        self.refresh_preview();
        true
    }

    // ── Change navigation ────────────────────────────────────────────────────

    /// Display rows where a run of added or removed rows begins.
    pub fn change_block_rows(&self) -> Vec<usize> {
        if !self.document.is_diff {
            return Vec::new();
        }
        let mut starts = Vec::new();
        let mut in_block = false;
        for (row, kind) in self.layout.kinds.iter().enumerate() {
            let change = matches!(kind, LineKind::Added | LineKind::Removed);
            if change && !in_block {
                starts.push(row);
            }
            in_block = change;
        }
        starts
    }

    /// Scroll start that puts `row` a third of the way down the window.
    fn centered_start(&self, row: usize) -> usize {
        let third = (self.preview_rows() / 3).max(1);
        row.saturating_sub(third).min(self.max_preview_scroll())
    }

    fn neighbour_block(&self, blocks: &[usize], forward: bool) -> Option<usize> {
        let reading_line = self.preview_scroll + self.preview_rows() / 3;
        let current = blocks.iter().rev().find(|&&row| row <= reading_line).copied();
        match (current, forward) {
            (None, true) => blocks.first().copied(),
            (None, false) => None,
            (Some(cur), true) => blocks.iter().find(|&&row| row > cur).copied(),
            (Some(cur), false) => blocks.iter().rev().find(|&&row| row < cur).copied(),
        }
    }

    /// Changed files under the root in tree order.
    fn changed_files_in_order(&self) -> Vec<(Vec<(bool, String)>, PathBuf)> {
        let mut files: Vec<_> = self
            .services
            .vcs
            .changed_files()
            .into_iter()
            .filter_map(|path| {
                let rel = path.strip_prefix(&self.root).ok()?;
                let hidden = rel
                    .components()
                    .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
                if hidden && !self.tree.show_hidden {
                    return None;
                }
                Some((tree_order_key(rel, false), path))
            })
            .collect();
        files.sort();
        files
    }

    /// Step to the next (or previous) change block in the diff preview.
    /// Past the last block, move on to the next changed file in tree order,
    /// wrapping around at the ends.
    pub fn jump_to_change(&mut self, forward: bool) -> bool {
        let blocks = self.change_block_rows();
        if let Some(row) = self.neighbour_block(&blocks, forward) {
            let start = self.centered_start(row);
            if start != self.preview_scroll {
                self.preview_scroll = start;
                return true;
            }
        }

        self.services.vcs.refresh();
        let files = self.changed_files_in_order();
        if files.is_empty() {
            self.set_status("no changes");
            return true;
        }
        let anchor = self
            .tree
            .selected()
            .and_then(|item| Some(tree_order_key(item.path.strip_prefix(&self.root).ok()?, item.is_dir)));
        let found = match &anchor {
            Some(key) if forward => files.iter().find(|(k, _)| k > key),
            Some(key) => files.iter().rev().find(|(k, _)| k < key),
            None => None,
        };
        let wrapped = anchor.is_some() && found.is_none();
        let fallback = if forward { files.first() } else { files.last() };
        let Some((_, target)) = found.or(fallback).cloned() else {
            return false;
        };
        let wrap_note = if forward {
            "wrapped to first change"
        } else {
            "wrapped to last change"
        };

        if self.preview_target().as_deref() == Some(target.as_path()) {
            let edge = if forward { blocks.first() } else { blocks.last() };
            let Some(&row) = edge else {
                return false;
            };
            self.preview_scroll = self.centered_start(row);
            self.set_status(wrap_note);
            return true;
        }

        self.navigate_to(&target);
        let blocks = self.change_block_rows();
        let edge = if forward { blocks.first() } else { blocks.last() };
        if let Some(&row) = edge {
            self.preview_scroll = self.centered_start(row);
        }
        if wrapped {
            self.set_status(wrap_note);
        }
        debug!(path = %target.display(), forward, "jump to change");
        true
    }

    // ── Mouse ────────────────────────────────────────────────────────────────

    /// Click on row `offset` of the tree pane. In filter mode the first row
    /// is the query and the rest are hits.
    pub fn click_list_row(&mut self, offset: usize) -> bool {
        if self.mode == Mode::Filter {
            let Some(filter) = self.filter.as_mut() else {
                return false;
            };
            let Some(index) = offset.checked_sub(1).map(|o| filter.scroll + o) else {
                return false;
            };
            if index >= filter.hits.len() {
                return false;
            }
            filter.editing = false;
            filter.selected = index;
            self.preview_hit();
            return true;
        }
        let index = self.tree.scroll_offset + offset;
        if index >= self.tree.flat_items.len() {
            return false;
        }
        if index == self.tree.selected_index {
            return if self.tree.selected().is_some_and(|item| item.is_expanded) {
                self.collapse_selected()
            } else {
                self.expand_selected()
            };
        }
        self.tree.selected_index = index;
        self.refresh_preview()
    }

    /// Document position under a pointer cell, plus the auto-scroll step
    /// when the pointer is above or below the preview pane.
    fn preview_point(&self, column: u16, row: u16) -> (RowCol, isize) {
        let pane = self.panes().preview;
        let rows = usize::from(pane.height.max(1));
        let top = usize::from(pane.y);
        let row = usize::from(row);
        let (offset, edge) = if row < top {
            (0, -(drag_scroll_step(top - row, rows) as isize))
        } else if row >= top + rows {
            (rows - 1, drag_scroll_step(row + 1 - top - rows, rows) as isize)
        } else {
            (row - top, 0)
        };
        let col = usize::from(column.saturating_sub(pane.x)).min(usize::from(pane.width));
        let last_row = self.layout.map.row_count().saturating_sub(1);
        let point = RowCol {
            row: (self.preview_scroll + offset).min(last_row),
            col: self.preview_x + col,
        };
        (point, edge)
    }

    pub fn begin_drag(&mut self, column: u16, row: u16) -> bool {
        let (anchor, _) = self.preview_point(column, row);
        self.drag = Some(Drag {
            anchor,
            pointer: (column, row),
            edge_step: 0,
        });
        self.selection_anchor = None;
        self.pointer_selection = None;
        true
    }

    pub fn extend_drag(&mut self, column: u16, row: u16) -> bool {
        let Some(mut drag) = self.drag else {
            return false;
        };
        let (_, edge) = self.preview_point(column, row);
        let scrolled = edge != 0 && self.scroll_preview(edge);
        let (point, _) = self.preview_point(column, row);
        drag.pointer = (column, row);
        drag.edge_step = edge;
        self.drag = Some(drag);
        let selection = drag_selection(drag.anchor, point);
        let changed = self.pointer_selection != Some(selection);
        self.pointer_selection = Some(selection);
        changed || scrolled
    }

    /// Finish a drag. A press and release on one cell is a plain click and
    /// leaves nothing selected.
    pub fn end_drag(&mut self) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if self.pointer_selection == Some(drag_selection(drag.anchor, drag.anchor)) {
            self.pointer_selection = None;
        }
        if let Some(selection) = self.pointer_selection {
            debug!(from = selection.start.row, to = selection.end.row, "pointer selection");
        }
        true
    }

    /// Keep scrolling while a drag holds the pointer past a pane edge.
    pub fn drag_autoscroll(&mut self) -> bool {
        match self.drag {
            Some(drag) if drag.edge_step != 0 => {
                let (column, row) = drag.pointer;
                self.extend_drag(column, row)
            }
            _ => false,
        }
    }

    // ── Watch refresh ────────────────────────────────────────────────────────

    /// Directories whose listings the watch collaborator should hash.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.tree.expanded_dirs()
    }

    /// React to new watch signatures. Only the parts that changed are
    /// re-read; the preview is always rebuilt.
    pub fn apply_signatures(&mut self, tree: u64, vcs: u64, tree_changed: bool, vcs_changed: bool) -> bool {
        if !tree_changed && !vcs_changed {
            return false;
        }
        self.engine.set_signatures(tree, vcs);
        if vcs_changed {
            self.services.vcs.refresh();
        }
        if tree_changed {
            if let Err(err) = self.tree.reload() {
                self.set_error(format!("refresh failed: {err}"));
            }
        }
        info!(tree_changed, vcs_changed, "watch refresh");
        self.refresh_preview()
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::preview::diff::{DiffHunk, DiffMarker};
    use crate::services::{Badge, Search, VersionControl};
    use std::fs::{self, File};
    use tempfile::TempDir;

    struct FixedSearch(Vec<SearchMatch>);

    /// Reports `files` as changed. `file_a.txt` has two one-line additions
    /// far apart; every other changed file has one at its first line.
    struct ChangedFiles(Vec<PathBuf>);

    fn added_at(line: usize) -> DiffHunk {
        DiffHunk {
            old_start: line - 1,
            old_count: 0,
            new_start: line,
            new_count: 1,
            lines: vec![(DiffMarker::Added, format!("line {line}"))],
        }
    }

    impl VersionControl for ChangedFiles {
        fn diff_hunks(&self, path: &Path) -> Option<Vec<DiffHunk>> {
            if !self.0.iter().any(|p| p == path) {
                return None;
            }
            if path.ends_with("file_a.txt") {
                Some(vec![added_at(5), added_at(30)])
            } else {
                Some(vec![added_at(1)])
            }
        }

        fn status_badge(&self, path: &Path) -> Badge {
            if self.0.iter().any(|p| p == path) {
                Badge::Modified
            } else {
                Badge::None
            }
        }

        fn changed_files(&self) -> Vec<PathBuf> {
            self.0.clone()
        }
    }

    fn with_changes(app: &mut App, files: Vec<PathBuf>) {
        app.services = Services::offline().with_vcs(ChangedFiles(files));
        app.apply_signatures(0, 1, false, true);
    }

    fn status_text(app: &App) -> &str {
        app.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    impl Search for FixedSearch {
        fn search(&self, _root: &Path, _query: &str, _limit: usize) -> Vec<SearchMatch> {
            self.0.clone()
        }
    }

    pub(crate) fn setup_app() -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::write(dir.path().join("alpha").join("inner.txt"), "inside\n").unwrap();
        fs::write(
            dir.path().join("file_a.txt"),
            (1..=40).map(|n| format!("line {n}\n")).collect::<String>(),
        )
        .unwrap();
        File::create(dir.path().join("file_b.rs")).unwrap();
        File::create(dir.path().join(".hidden")).unwrap();
        let mut app = App::new(dir.path(), &AppConfig::default(), Services::offline()).unwrap();
        app.measure(Rect::new(0, 0, 80, 12));
        (dir, app)
    }

    #[test]
    fn input_line_edits_at_cursor() {
        let mut input = InputLine::default();
        input.insert('a');
        input.insert('é');
        input.insert('c');
        assert!(input.left());
        assert!(input.backspace());
        assert_eq!(input.text, "ac");
        assert_eq!(input.cursor, 1);
        input.home();
        assert!(!input.backspace());
        input.end();
        assert!(!input.right());
    }

    #[test]
    fn keep_visible_follows_selection() {
        assert_eq!(keep_visible(0, 5, 3), 0);
        assert_eq!(keep_visible(9, 0, 3), 7);
        assert_eq!(keep_visible(4, 3, 3), 3);
    }

    #[test]
    fn picker_ranks_matches() {
        let mut picker = PickerState::new(vec![
            PathBuf::from("src/main.rs"),
            PathBuf::from("README.md"),
            PathBuf::from("src/app.rs"),
        ]);
        assert_eq!(picker.hits.len(), 3);
        picker.input.text = "app".into();
        picker.refilter();
        assert_eq!(picker.selected_path(), Some(Path::new("src/app.rs")));
        assert!(!picker.hits[0].indices.is_empty());
        picker.input.text = "zzz".into();
        picker.refilter();
        assert!(picker.hits.is_empty());
        assert!(!picker.move_selection(1));
    }

    #[test]
    fn history_walks_both_ways() {
        let mut history = History::default();
        history.record(PathBuf::from("a"));
        history.record(PathBuf::from("b"));
        assert_eq!(history.go_back(PathBuf::from("c")), Some(PathBuf::from("b")));
        assert_eq!(history.go_forward(PathBuf::from("b")), Some(PathBuf::from("c")));
        assert_eq!(history.go_forward(PathBuf::from("c")), None);
    }

    #[test]
    fn left_width_is_clamped() {
        assert_eq!(clamp_left_width(2, 80), MIN_PANE_WIDTH);
        assert_eq!(clamp_left_width(79, 80), 80 - MIN_PANE_WIDTH - 1);
        assert_eq!(clamp_left_width(5, 0), 0);
    }

    #[test]
    fn measure_reports_change_once() {
        let (_dir, mut app) = setup_app();
        assert_eq!(app.left_width, 24);
        assert!(!app.measure(Rect::new(0, 0, 80, 12)));
        assert!(app.measure(Rect::new(0, 0, 100, 12)));
    }

    #[test]
    fn selection_moves_preview() {
        let (dir, mut app) = setup_app();
        assert_eq!(app.document.path, dir.path());
        assert!(app.move_selection(3));
        let target = app.preview_target().unwrap();
        assert_eq!(target, dir.path().join("file_a.txt"));
        assert_eq!(app.document.path, target);
        assert_eq!(app.document.logical_line_count(), 40);
    }

    #[test]
    fn hidden_toggle_changes_rows() {
        let (_dir, mut app) = setup_app();
        let before = app.tree.flat_items.len();
        app.toggle_hidden();
        assert_eq!(app.tree.flat_items.len(), before + 1);
        assert!(app.options.show_hidden);
    }

    #[test]
    fn preview_scroll_is_bounded() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        let rows = app.preview_rows();
        assert!(app.scroll_preview(1_000));
        assert_eq!(app.preview_scroll, 40 - rows);
        assert!(!app.scroll_preview(1));
        assert!((app.scroll_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn jump_to_line_scrolls() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        assert!(app.jump_to_line(10));
        assert_eq!(app.top_line(), Some(10));
    }

    #[test]
    fn status_expires_by_tick() {
        let (_dir, mut app) = setup_app();
        app.set_status("hello");
        app.tick += u64::from(app.status_ticks) - 1;
        assert!(!app.expire_status());
        app.tick += 1;
        assert!(app.expire_status());
        assert!(app.status.is_none());
    }

    #[test]
    fn navigate_records_history() {
        let (dir, mut app) = setup_app();
        let inner = dir.path().join("alpha").join("inner.txt");
        assert!(app.navigate_to(&inner));
        assert_eq!(app.preview_target(), Some(inner.clone()));
        assert!(app.history_back());
        assert_eq!(app.preview_target(), Some(dir.path().to_path_buf()));
        assert!(app.history_forward());
        assert_eq!(app.preview_target(), Some(inner));
    }

    #[test]
    fn marks_restore_path_and_scroll() {
        let (dir, mut app) = setup_app();
        let file = dir.path().join("file_a.txt");
        app.navigate_to(&file);
        app.scroll_preview(5);
        app.set_mark('a');
        app.select_first();
        assert!(app.jump_to_mark('a'));
        assert_eq!(app.preview_target(), Some(file));
        assert_eq!(app.preview_scroll, 5);
    }

    #[test]
    fn filter_hits_drive_preview_and_query() {
        let (dir, mut app) = setup_app();
        let file = dir.path().join("file_a.txt");
        app.services = Services::offline().with_search(FixedSearch(vec![SearchMatch {
            path: file.clone(),
            line: 12,
            column: 1,
            preview: "line 12".into(),
        }]));
        app.open_filter();
        for c in "line 12".chars() {
            app.filter.as_mut().unwrap().input.insert(c);
        }
        app.submit_filter();
        assert_eq!(app.document.path, file);
        assert_eq!(app.top_line(), Some(12));
        assert_eq!(app.query.as_ref().unwrap().current_line, Some(12));

        app.accept_filter();
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.tree.selected().unwrap().path, file);
        assert!(app.query.is_some());
    }

    #[test]
    fn next_match_cycles_lines() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        app.query = Some(QueryOverlay {
            query: "line 3".into(),
            current_line: None,
        });
        assert!(app.next_match(true));
        assert_eq!(app.query.as_ref().unwrap().current_line, Some(3));
        app.next_match(true);
        assert_eq!(app.query.as_ref().unwrap().current_line, Some(30));
        app.next_match(false);
        assert_eq!(app.query.as_ref().unwrap().current_line, Some(3));
    }

    #[test]
    fn empty_filter_query_closes() {
        let (_dir, mut app) = setup_app();
        app.open_filter();
        app.submit_filter();
        assert!(app.filter.is_none());
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn change_jumps_walk_blocks_then_files_in_tree_order() {
        let (dir, mut app) = setup_app();
        let inner = dir.path().join("alpha").join("inner.txt");
        let file_a = dir.path().join("file_a.txt");
        // reported out of tree order
        with_changes(&mut app, vec![file_a.clone(), inner.clone()]);

        assert!(app.jump_to_change(true));
        assert_eq!(app.preview_target(), Some(inner.clone()));
        assert_eq!(app.preview_scroll, 0);

        assert!(app.jump_to_change(true));
        assert_eq!(app.preview_target(), Some(file_a.clone()));
        let blocks = app.change_block_rows();
        assert_eq!(blocks, vec![4, 29]);
        let third = app.preview_rows() / 3;
        assert_eq!(app.preview_scroll, 4 - third);

        assert!(app.jump_to_change(true));
        assert_eq!(app.preview_target(), Some(file_a.clone()));
        assert_eq!(app.preview_scroll, (29 - third).min(app.max_preview_scroll()));

        assert!(app.jump_to_change(true));
        assert_eq!(app.preview_target(), Some(inner));
        assert_eq!(status_text(&app), "wrapped to first change");

        assert!(app.jump_to_change(false));
        assert_eq!(app.preview_target(), Some(file_a));
        assert_eq!(status_text(&app), "wrapped to last change");
        assert_eq!(app.preview_scroll, (29 - third).min(app.max_preview_scroll()));
    }

    #[test]
    fn change_jump_back_steps_to_previous_block() {
        let (dir, mut app) = setup_app();
        let file_a = dir.path().join("file_a.txt");
        with_changes(&mut app, vec![file_a.clone()]);
        app.navigate_to(&file_a);
        app.scroll_preview_to(usize::MAX);
        let third = app.preview_rows() / 3;

        assert!(app.jump_to_change(false));
        assert_eq!(app.preview_scroll, 4 - third);
        // only one changed file, so backing past the first block wraps in place
        assert!(app.jump_to_change(false));
        assert_eq!(app.preview_target(), Some(file_a));
        assert_eq!(app.preview_scroll, (29 - third).min(app.max_preview_scroll()));
        assert_eq!(status_text(&app), "wrapped to last change");
    }

    #[test]
    fn change_jump_without_changes_reports_it() {
        let (_dir, mut app) = setup_app();
        let before = app.preview_target();
        assert!(app.jump_to_change(true));
        assert_eq!(status_text(&app), "no changes");
        assert_eq!(app.preview_target(), before);
    }

    #[test]
    fn hidden_changes_are_skipped() {
        let (dir, mut app) = setup_app();
        let hidden = dir.path().join(".hidden");
        let file_b = dir.path().join("file_b.rs");
        with_changes(&mut app, vec![hidden, file_b.clone()]);
        assert!(app.jump_to_change(true));
        assert_eq!(app.preview_target(), Some(file_b));
    }

    #[test]
    fn drag_step_grows_with_overshoot() {
        assert_eq!(drag_scroll_step(1, 11), 2);
        assert_eq!(drag_scroll_step(3, 11), 6);
        assert_eq!(drag_scroll_step(50, 11), 10);
        assert_eq!(drag_scroll_step(0, 1), 2);
    }

    #[test]
    fn clicking_tree_rows_selects_then_toggles() {
        let (dir, mut app) = setup_app();
        let alpha = dir.path().join("alpha");
        let row = app.tree.find_index_by_path(&alpha).unwrap() - app.tree.scroll_offset;
        let before = app.tree.flat_items.len();

        assert!(app.click_list_row(row));
        assert_eq!(app.preview_target(), Some(alpha));
        assert!(app.click_list_row(row));
        assert_eq!(app.tree.flat_items.len(), before + 1);
        assert!(app.click_list_row(row));
        assert_eq!(app.tree.flat_items.len(), before);
        assert!(!app.click_list_row(100));
    }

    #[test]
    fn drag_selects_inclusive_cells_and_click_clears() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        let pane = app.panes().preview;

        assert!(app.begin_drag(pane.x + 2, pane.y + 3));
        assert!(app.extend_drag(pane.x + 5, pane.y + 1));
        assert!(app.end_drag());
        assert_eq!(
            app.selection(),
            Some(Selection {
                start: RowCol { row: 1, col: 5 },
                end: RowCol { row: 3, col: 3 },
            })
        );

        app.begin_drag(pane.x + 4, pane.y + 4);
        app.extend_drag(pane.x + 4, pane.y + 4);
        app.end_drag();
        assert_eq!(app.selection(), None);
    }

    #[test]
    fn drag_past_bottom_edge_keeps_scrolling() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        let pane = app.panes().preview;
        let below = pane.y + pane.height + 2;

        app.begin_drag(pane.x, pane.y);
        assert!(app.extend_drag(pane.x, below));
        let step = drag_scroll_step(3, usize::from(pane.height));
        assert_eq!(app.preview_scroll, step);
        assert!(app.drag_autoscroll());
        assert_eq!(app.preview_scroll, 2 * step);
        let last = usize::from(pane.height) - 1;
        assert_eq!(app.selection().unwrap().end.row, 2 * step + last);

        while app.drag_autoscroll() {}
        assert_eq!(app.preview_scroll, app.max_preview_scroll());
        app.end_drag();
        assert!(!app.drag_autoscroll());
        assert!(app.selection().is_some());
    }

    #[test]
    fn keyboard_selection_replaces_pointer_selection() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        let pane = app.panes().preview;
        app.begin_drag(pane.x, pane.y);
        app.extend_drag(pane.x + 3, pane.y + 2);
        app.end_drag();
        assert!(app.pointer_selection.is_some());
        app.toggle_selection();
        assert!(app.pointer_selection.is_none());
    }
}
