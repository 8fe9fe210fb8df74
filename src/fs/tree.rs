use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::ignore::should_ignore;

/// Upper bound on files collected for the picker.
pub const PICKER_MAX_FILES: usize = 20_000;

/// Sort key that orders relative paths the way the tree displays them:
/// directories before files at each level, then by case-insensitive name.
/// Every component but the last is a directory.
pub fn tree_order_key(rel: &Path, is_dir: bool) -> Vec<(bool, String)> {
    let names: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    let last = names.len().saturating_sub(1);
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| (idx == last && !is_dir, name.to_lowercase()))
        .collect()
}

/// A node in the filesystem tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_hidden: bool,
    pub children: Option<Vec<TreeNode>>,
    pub is_expanded: bool,
    pub depth: usize,
}

impl TreeNode {
    /// Create a node for `path`. Symlinks are followed for the dir check.
    pub fn new(path: &Path, depth: usize) -> Result<Self> {
        let metadata = fs::metadata(path).or_else(|_| fs::symlink_metadata(path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self {
            is_hidden: name.starts_with('.'),
            name,
            path: path.to_path_buf(),
            is_dir: metadata.is_dir(),
            children: None,
            is_expanded: false,
            depth,
        })
    }

    /// Read, filter and sort the node's children.
    ///
    /// Directories sort before files, then by case-insensitive name.
    /// Unreadable entries are skipped.
    pub fn load_children(&mut self, ignore: &[String]) -> Result<()> {
        if !self.is_dir {
            return Ok(());
        }
        let mut children: Vec<TreeNode> = fs::read_dir(&self.path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| !should_ignore(p, ignore))
            .filter_map(|p| TreeNode::new(&p, self.depth + 1).ok())
            .collect();
        children.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        self.children = Some(children);
        Ok(())
    }
}

/// A flattened tree row for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
}

/// State for the tree pane.
pub struct TreeState {
    pub root: TreeNode,
    pub flat_items: Vec<FlatItem>,
    pub selected_index: usize,
    pub scroll_offset: usize,
    pub show_hidden: bool,
    pub ignore: Vec<String>,
}

impl TreeState {
    /// Create a tree rooted at `path` with the root expanded.
    pub fn new(path: &Path, show_hidden: bool, ignore: Vec<String>) -> Result<Self> {
        let mut root = TreeNode::new(path, 0)?;
        if root.is_dir {
            root.load_children(&ignore)?;
            root.is_expanded = true;
        }
        let mut state = Self {
            root,
            flat_items: Vec::new(),
            selected_index: 0,
            scroll_offset: 0,
            show_hidden,
            ignore,
        };
        state.flatten();
        Ok(state)
    }

    /// Rebuild the flat list, respecting `show_hidden`. The root is always
    /// included.
    pub fn flatten(&mut self) {
        self.flat_items.clear();
        Self::flatten_node(&self.root, &mut self.flat_items, self.show_hidden, true, true);
        if !self.flat_items.is_empty() && self.selected_index >= self.flat_items.len() {
            self.selected_index = self.flat_items.len() - 1;
        }
    }

    fn flatten_node(
        node: &TreeNode,
        items: &mut Vec<FlatItem>,
        show_hidden: bool,
        is_last: bool,
        is_root: bool,
    ) {
        if !is_root && !show_hidden && node.is_hidden {
            return;
        }
        items.push(FlatItem {
            name: node.name.clone(),
            path: node.path.clone(),
            is_dir: node.is_dir,
            depth: node.depth,
            is_expanded: node.is_expanded,
            is_last_sibling: is_last,
        });
        if !node.is_expanded {
            return;
        }
        if let Some(children) = &node.children {
            let visible: Vec<&TreeNode> = children
                .iter()
                .filter(|c| show_hidden || !c.is_hidden)
                .collect();
            for (i, child) in visible.iter().enumerate() {
                Self::flatten_node(child, items, show_hidden, i + 1 == visible.len(), false);
            }
        }
    }

    pub fn selected(&self) -> Option<&FlatItem> {
        self.flat_items.get(self.selected_index)
    }

    /// Move the selection by `delta` rows, clamped. Returns whether it moved.
    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.flat_items.is_empty() {
            return false;
        }
        let last = self.flat_items.len() - 1;
        let next = self.selected_index.saturating_add_signed(delta).min(last);
        let moved = next != self.selected_index;
        self.selected_index = next;
        moved
    }

    pub fn select_first(&mut self) -> bool {
        let moved = self.selected_index != 0;
        self.selected_index = 0;
        moved
    }

    pub fn select_last(&mut self) -> bool {
        let last = self.flat_items.len().saturating_sub(1);
        let moved = self.selected_index != last;
        self.selected_index = last;
        moved
    }

    fn find_node_mut<'a>(node: &'a mut TreeNode, target: &Path) -> Option<&'a mut TreeNode> {
        if node.path == target {
            return Some(node);
        }
        if !target.starts_with(&node.path) {
            return None;
        }
        node.children
            .as_mut()?
            .iter_mut()
            .find_map(|child| Self::find_node_mut(child, target))
    }

    fn expand_path(&mut self, path: &Path) -> bool {
        let ignore = self.ignore.clone();
        match Self::find_node_mut(&mut self.root, path) {
            Some(node) if node.is_dir && !node.is_expanded => {
                if node.children.is_none() {
                    let _ = node.load_children(&ignore);
                }
                node.is_expanded = true;
                true
            }
            _ => false,
        }
    }

    /// Expand the selected directory. Returns whether the tree changed.
    pub fn expand_selected(&mut self) -> bool {
        let Some(item) = self.selected().cloned() else {
            return false;
        };
        if !item.is_dir || item.is_expanded {
            return false;
        }
        let changed = self.expand_path(&item.path);
        if changed {
            self.flatten();
        }
        changed
    }

    /// Collapse the selected directory, or jump to its parent.
    pub fn collapse_selected(&mut self) -> bool {
        let Some(item) = self.selected().cloned() else {
            return false;
        };
        if item.is_dir && item.is_expanded && item.depth > 0 {
            if let Some(node) = Self::find_node_mut(&mut self.root, &item.path) {
                node.is_expanded = false;
                self.flatten();
                return true;
            }
        }
        let Some(parent) = item.path.parent() else {
            return false;
        };
        match self.find_index_by_path(parent) {
            Some(idx) => {
                self.selected_index = idx;
                true
            }
            None => false,
        }
    }

    /// Expand every ancestor of `path` and select it.
    pub fn reveal(&mut self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root.path) else {
            return false;
        };
        let mut current = self.root.path.clone();
        let mut changed = false;
        let parents: Vec<_> = rel.parent().into_iter().flat_map(|p| p.components()).collect();
        for component in parents {
            current.push(component);
            changed |= self.expand_path(&current);
        }
        if changed {
            self.flatten();
        }
        match self.find_index_by_path(path) {
            Some(idx) => {
                self.selected_index = idx;
                true
            }
            None => changed,
        }
    }

    /// Keep the selection visible in a pane of `visible_height` rows.
    pub fn update_scroll(&mut self, visible_height: usize) -> bool {
        let before = self.scroll_offset;
        if visible_height == 0 {
            return false;
        }
        if self.selected_index < self.scroll_offset {
            self.scroll_offset = self.selected_index;
        } else if self.selected_index >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected_index + 1 - visible_height;
        }
        let max = self.flat_items.len().saturating_sub(visible_height);
        self.scroll_offset = self.scroll_offset.min(max);
        before != self.scroll_offset
    }

    pub fn toggle_hidden(&mut self) {
        self.show_hidden = !self.show_hidden;
        let path = self.selected().map(|i| i.path.clone());
        self.flatten();
        if let Some(idx) = path.and_then(|p| self.find_index_by_path(&p)) {
            self.selected_index = idx;
        }
    }

    pub fn find_index_by_path(&self, path: &Path) -> Option<usize> {
        self.flat_items.iter().position(|item| item.path == path)
    }

    /// Expanded directories in display order, root first.
    pub fn expanded_dirs(&self) -> Vec<PathBuf> {
        self.flat_items
            .iter()
            .filter(|item| item.is_dir && item.is_expanded)
            .map(|item| item.path.clone())
            .collect()
    }

    fn collect_expanded(node: &TreeNode, out: &mut HashSet<PathBuf>) {
        if node.is_expanded {
            out.insert(node.path.clone());
            for child in node.children.iter().flatten() {
                Self::collect_expanded(child, out);
            }
        }
    }

    /// Re-read the tree from disk, keeping expansion and selection.
    pub fn reload(&mut self) -> Result<()> {
        let mut expanded = HashSet::new();
        Self::collect_expanded(&self.root, &mut expanded);
        let selected = self.selected().map(|i| i.path.clone());

        let mut root = TreeNode::new(&self.root.path, 0)?;
        if root.is_dir {
            root.load_children(&self.ignore)?;
            root.is_expanded = true;
        }
        self.root = root;

        let mut ordered: Vec<&PathBuf> = expanded.iter().collect();
        ordered.sort_by_key(|p| p.components().count());
        for path in ordered {
            self.expand_path(path);
        }
        self.flatten();
        if let Some(idx) = selected.and_then(|p| self.find_index_by_path(&p)) {
            self.selected_index = idx;
        }
        Ok(())
    }

    /// Files under the root for the picker, as paths relative to it.
    pub fn all_files(&self, limit: usize) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.path.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(read) = fs::read_dir(&dir) else {
                continue;
            };
            let mut entries: Vec<_> = read.filter_map(|e| e.ok()).collect();
            entries.sort_by_key(|e| e.file_name());
            for entry in entries.into_iter().rev() {
                let path = entry.path();
                let name = entry.file_name();
                if !self.show_hidden && name.to_string_lossy().starts_with('.') {
                    continue;
                }
                if should_ignore(&path, &self.ignore) {
                    continue;
                }
                let Ok(kind) = entry.file_type() else {
                    continue;
                };
                if kind.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root.path) {
                    out.push(rel.to_path_buf());
                    if out.len() >= limit {
                        return out;
                    }
                }
            }
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ignore::default_patterns;
    use std::fs::{self, File};
    use tempfile::TempDir;

    #[test]
    fn order_key_matches_display_order() {
        let tmp = setup_test_dir();
        fs::write(tmp.path().join("alpha").join("z.txt"), "").unwrap();
        let mut state = TreeState::new(tmp.path(), false, Vec::new()).unwrap();
        state.reveal(&tmp.path().join("alpha").join("z.txt"));

        let shown: Vec<_> = state.flat_items.iter().skip(1).collect();
        let mut sorted = shown.clone();
        sorted.sort_by_key(|item| {
            tree_order_key(item.path.strip_prefix(tmp.path()).unwrap(), item.is_dir)
        });
        let paths = |items: &[&FlatItem]| items.iter().map(|i| i.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths(&sorted), paths(&shown));
    }

    fn setup_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        File::create(dir.path().join("file_a.txt")).unwrap();
        File::create(dir.path().join("file_b.rs")).unwrap();
        File::create(dir.path().join(".hidden")).unwrap();
        File::create(dir.path().join("alpha").join("inner.txt")).unwrap();
        dir
    }

    fn state(dir: &TempDir) -> TreeState {
        TreeState::new(dir.path(), false, default_patterns()).unwrap()
    }

    fn names(state: &TreeState) -> Vec<&str> {
        state.flat_items.iter().skip(1).map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn dirs_first_then_files_hidden_and_ignored_skipped() {
        let dir = setup_test_dir();
        let state = state(&dir);
        assert_eq!(names(&state), vec!["alpha", "beta", "file_a.txt", "file_b.rs"]);
        assert!(state.flat_items.last().unwrap().is_last_sibling);
    }

    #[test]
    fn toggle_hidden_shows_dotfiles() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        state.toggle_hidden();
        assert!(names(&state).contains(&".hidden"));
        state.toggle_hidden();
        assert!(!names(&state).contains(&".hidden"));
    }

    #[test]
    fn expand_and_collapse() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        state.selected_index = 1;
        assert!(state.expand_selected());
        assert_eq!(state.flat_items[2].name, "inner.txt");
        assert_eq!(state.flat_items[2].depth, 2);
        assert!(state.collapse_selected());
        assert_eq!(state.flat_items[2].name, "beta");
    }

    #[test]
    fn collapse_on_file_jumps_to_parent() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        state.selected_index = 3;
        assert!(state.collapse_selected());
        assert_eq!(state.selected_index, 0);
    }

    #[test]
    fn reveal_expands_ancestors() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        let target = state.root.path.join("alpha").join("inner.txt");
        assert!(state.reveal(&target));
        assert_eq!(state.selected().unwrap().path, target);
    }

    #[test]
    fn reload_keeps_expansion_and_picks_up_new_files() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        state.selected_index = 1;
        state.expand_selected();
        File::create(dir.path().join("alpha").join("new.txt")).unwrap();
        state.reload().unwrap();
        let n = names(&state);
        assert!(n.contains(&"new.txt"));
        assert!(n.contains(&"inner.txt"));
        assert_eq!(state.selected().unwrap().name, "alpha");
    }

    #[test]
    fn move_selection_clamps() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        assert!(!state.move_selection(-5));
        assert!(state.move_selection(100));
        assert_eq!(state.selected_index, state.flat_items.len() - 1);
    }

    #[test]
    fn scroll_follows_selection() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        state.selected_index = 4;
        assert!(state.update_scroll(2));
        assert_eq!(state.scroll_offset, 3);
        state.selected_index = 0;
        state.update_scroll(2);
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn expanded_dirs_lists_root_first() {
        let dir = setup_test_dir();
        let mut state = state(&dir);
        state.selected_index = 1;
        state.expand_selected();
        let dirs = state.expanded_dirs();
        assert_eq!(dirs[0], state.root.path);
        assert_eq!(dirs.len(), 2);
    }

    #[test]
    fn picker_files_are_relative_and_filtered() {
        let dir = setup_test_dir();
        let state = state(&dir);
        let files = state.all_files(100);
        assert_eq!(
            files,
            vec![
                PathBuf::from("alpha/inner.txt"),
                PathBuf::from("file_a.txt"),
                PathBuf::from("file_b.rs"),
            ]
        );
        assert_eq!(state.all_files(1).len(), 1);
    }
}
