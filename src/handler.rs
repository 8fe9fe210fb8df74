use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::{App, Mode, PendingMark, HORIZONTAL_STEP, WHEEL_STEP};

/// Outcome of offering a key to one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Not mine; try the next handler.
    Pass,
    /// Consumed without visible change.
    Clean,
    /// Consumed and state changed.
    Dirty,
}

impl From<bool> for Claim {
    fn from(changed: bool) -> Self {
        if changed {
            Claim::Dirty
        } else {
            Claim::Clean
        }
    }
}

type Handler = fn(&mut App, KeyEvent) -> Claim;

/// Handlers in the order they are offered a key.
const CHAIN: &[Handler] = &[
    resize_keys,
    pending_mark,
    history_keys,
    overlay_keys,
    picker_keys,
    filter_keys,
    normal_keys,
];

/// Offer `key` to each handler until one claims it. Returns whether the
/// screen needs a redraw.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    for handler in CHAIN {
        match handler(app, key) {
            Claim::Pass => continue,
            claim => return claim == Claim::Dirty,
        }
    }
    false
}

/// Route a pointer event to the pane under it. Returns whether the screen
/// needs a redraw.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) -> bool {
    if app.mode == Mode::Picker || app.show_help || app.pending_mark.is_some() {
        return false;
    }
    let panes = app.panes();
    let at = Position::new(mouse.column, mouse.row);
    let over_tree = panes.tree.contains(at);
    let over_preview = panes.preview.contains(at);
    match mouse.kind {
        MouseEventKind::ScrollDown | MouseEventKind::ScrollUp => {
            let down = mouse.kind == MouseEventKind::ScrollDown;
            if over_preview {
                app.scroll_preview(if down { WHEEL_STEP } else { -WHEEL_STEP })
            } else if over_tree && app.mode == Mode::Filter {
                app.move_filter_selection(if down { 1 } else { -1 })
            } else if over_tree {
                app.move_selection(if down { 1 } else { -1 })
            } else {
                false
            }
        }
        MouseEventKind::Down(MouseButton::Left) if over_tree => {
            app.click_list_row(usize::from(mouse.row - panes.tree.y))
        }
        MouseEventKind::Down(MouseButton::Left) if over_preview => {
            app.begin_drag(mouse.column, mouse.row)
        }
        MouseEventKind::Drag(MouseButton::Left) => app.extend_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(),
        _ => false,
    }
}

fn ctrl(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
}

fn resize_keys(app: &mut App, key: KeyEvent) -> Claim {
    if !key.modifiers.contains(KeyModifiers::SHIFT) {
        return Claim::Pass;
    }
    match key.code {
        KeyCode::Left => app.resize_left(-2).into(),
        KeyCode::Right => app.resize_left(2).into(),
        _ => Claim::Pass,
    }
}

/// The key after `m` or `'` names the mark.
fn pending_mark(app: &mut App, key: KeyEvent) -> Claim {
    let Some(pending) = app.pending_mark.take() else {
        return Claim::Pass;
    };
    match key.code {
        KeyCode::Char(c) if !ctrl(&key) => {
            match pending {
                PendingMark::Set => app.set_mark(c),
                PendingMark::Jump => app.jump_to_mark(c),
            };
        }
        _ => app.set_status("mark cancelled"),
    }
    Claim::Dirty
}

fn history_keys(app: &mut App, key: KeyEvent) -> Claim {
    if !key.modifiers.contains(KeyModifiers::ALT) {
        return Claim::Pass;
    }
    match key.code {
        KeyCode::Left => app.history_back().into(),
        KeyCode::Right => app.history_forward().into(),
        _ => Claim::Pass,
    }
}

fn overlay_keys(app: &mut App, key: KeyEvent) -> Claim {
    match key.code {
        KeyCode::Char('p') if ctrl(&key) => {
            if app.mode == Mode::Picker {
                app.close_picker().into()
            } else {
                app.show_help = false;
                app.open_picker().into()
            }
        }
        KeyCode::Char('?') if app.mode == Mode::Normal => {
            app.show_help = !app.show_help;
            Claim::Dirty
        }
        KeyCode::Char('/') => {
            let browsing_hits = app.mode == Mode::Filter
                && app.filter.as_ref().is_some_and(|f| !f.editing);
            if app.mode == Mode::Normal || browsing_hits {
                app.show_help = false;
                app.open_filter().into()
            } else {
                Claim::Pass
            }
        }
        _ => Claim::Pass,
    }
}

fn picker_keys(app: &mut App, key: KeyEvent) -> Claim {
    if app.mode != Mode::Picker {
        return Claim::Pass;
    }
    match key.code {
        KeyCode::Esc => return app.close_picker().into(),
        KeyCode::Enter => return app.accept_picker().into(),
        KeyCode::Char('c') if ctrl(&key) => {
            app.quit();
            return Claim::Dirty;
        }
        _ => {}
    }
    let Some(picker) = app.picker.as_mut() else {
        return Claim::Clean;
    };
    let edited = match key.code {
        KeyCode::Up => return picker.move_selection(-1).into(),
        KeyCode::Down => return picker.move_selection(1).into(),
        KeyCode::Char('k') if ctrl(&key) => return picker.move_selection(-1).into(),
        KeyCode::Char('j') if ctrl(&key) => return picker.move_selection(1).into(),
        KeyCode::Left => return picker.input.left().into(),
        KeyCode::Right => return picker.input.right().into(),
        KeyCode::Home => {
            picker.input.home();
            return Claim::Dirty;
        }
        KeyCode::End => {
            picker.input.end();
            return Claim::Dirty;
        }
        KeyCode::Backspace => picker.input.backspace(),
        KeyCode::Char(c) if !ctrl(&key) => {
            picker.input.insert(c);
            true
        }
        _ => false,
    };
    if edited {
        picker.refilter();
    }
    edited.into()
}

fn filter_keys(app: &mut App, key: KeyEvent) -> Claim {
    if app.mode != Mode::Filter {
        return Claim::Pass;
    }
    let Some(editing) = app.filter.as_ref().map(|f| f.editing) else {
        return Claim::Pass;
    };
    if editing {
        return match key.code {
            KeyCode::Esc => app.close_filter().into(),
            KeyCode::Enter => app.submit_filter().into(),
            KeyCode::Char('c') if ctrl(&key) => {
                app.quit();
                Claim::Dirty
            }
            KeyCode::Char('j') if ctrl(&key) => app.move_filter_selection(1).into(),
            KeyCode::Char('k') if ctrl(&key) => app.move_filter_selection(-1).into(),
            _ => edit_filter_query(app, key),
        };
    }
    match key.code {
        KeyCode::Esc => app.close_filter().into(),
        KeyCode::Enter => app.accept_filter().into(),
        KeyCode::Char('j') | KeyCode::Char('n') | KeyCode::Down => {
            app.move_filter_selection(1).into()
        }
        KeyCode::Char('k') | KeyCode::Char('N') | KeyCode::Up => {
            app.move_filter_selection(-1).into()
        }
        KeyCode::PageDown => app.move_filter_selection(10).into(),
        KeyCode::PageUp => app.move_filter_selection(-10).into(),
        // Preview scrolling and quitting fall through to the normal keys.
        _ => Claim::Pass,
    }
}

fn edit_filter_query(app: &mut App, key: KeyEvent) -> Claim {
    let Some(input) = app.filter.as_mut().map(|f| &mut f.input) else {
        return Claim::Clean;
    };
    match key.code {
        KeyCode::Left => input.left().into(),
        KeyCode::Right => input.right().into(),
        KeyCode::Home => {
            input.home();
            Claim::Dirty
        }
        KeyCode::End => {
            input.end();
            Claim::Dirty
        }
        KeyCode::Backspace => input.backspace().into(),
        KeyCode::Char(c) if !ctrl(&key) => {
            input.insert(c);
            Claim::Dirty
        }
        _ => Claim::Clean,
    }
}

fn normal_keys(app: &mut App, key: KeyEvent) -> Claim {
    if app.show_help && matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
        app.show_help = false;
        return Claim::Dirty;
    }
    let half_page = (app.preview_rows() / 2).max(1) as isize;
    let page = app.preview_rows().max(1) as isize;
    if ctrl(&key) {
        return match key.code {
            KeyCode::Char('c') => {
                app.quit();
                Claim::Dirty
            }
            KeyCode::Char('d') => app.scroll_preview(half_page).into(),
            KeyCode::Char('u') => app.scroll_preview(-half_page).into(),
            _ => Claim::Pass,
        };
    }
    // Tree movement is reserved for the tree; the filter list owns j/k.
    let in_tree = app.mode == Mode::Normal;
    match key.code {
        KeyCode::Char('q') => {
            app.quit();
            Claim::Dirty
        }
        KeyCode::Char('j') | KeyCode::Down if in_tree => app.move_selection(1).into(),
        KeyCode::Char('k') | KeyCode::Up if in_tree => app.move_selection(-1).into(),
        KeyCode::Char('g') if in_tree => app.select_first().into(),
        KeyCode::Char('G') if in_tree => app.select_last().into(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right if in_tree => {
            app.expand_selected().into()
        }
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Backspace if in_tree => {
            app.collapse_selected().into()
        }
        KeyCode::Char('J') => app.scroll_preview(1).into(),
        KeyCode::Char('K') => app.scroll_preview(-1).into(),
        KeyCode::PageDown => app.scroll_preview(page).into(),
        KeyCode::PageUp => app.scroll_preview(-page).into(),
        KeyCode::Home => app.scroll_preview_to(0).into(),
        KeyCode::End => app.scroll_preview_to(usize::MAX).into(),
        KeyCode::Char('<') => app.scroll_horizontal(-(HORIZONTAL_STEP as isize)).into(),
        KeyCode::Char('>') => app.scroll_horizontal(HORIZONTAL_STEP as isize).into(),
        KeyCode::Char('.') => app.toggle_hidden().into(),
        KeyCode::Char('w') => app.toggle_wrap().into(),
        KeyCode::Char('d') => app.toggle_diff().into(),
        KeyCode::Char('v') => app.toggle_selection().into(),
        KeyCode::Char(']') if in_tree => app.jump_to_change(true).into(),
        KeyCode::Char('[') if in_tree => app.jump_to_change(false).into(),
        KeyCode::Char('n') => app.next_match(true).into(),
        KeyCode::Char('N') => app.next_match(false).into(),
        KeyCode::Char('+') => app.show_more().into(),
        KeyCode::Char('m') => {
            app.pending_mark = Some(PendingMark::Set);
            Claim::Dirty
        }
        KeyCode::Char('\'') => {
            app.pending_mark = Some(PendingMark::Jump);
            Claim::Dirty
        }
        _ => Claim::Pass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::setup_app;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn with(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key_event(app, key(code))
    }

    fn pointer(app: &mut App, kind: MouseEventKind, column: u16, row: u16) -> bool {
        handle_mouse_event(
            app,
            MouseEvent {
                kind,
                column,
                row,
                modifiers: KeyModifiers::NONE,
            },
        )
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn q_and_ctrl_c_quit() {
        let (_dir, mut app) = setup_app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);

        let (_dir, mut app) = setup_app();
        handle_key_event(&mut app, with(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn j_moves_tree_selection() {
        let (_dir, mut app) = setup_app();
        let before = app.tree.selected_index;
        assert!(press(&mut app, KeyCode::Char('j')));
        assert_eq!(app.tree.selected_index, before + 1);
    }

    #[test]
    fn unbound_key_is_not_dirty() {
        let (_dir, mut app) = setup_app();
        assert!(!press(&mut app, KeyCode::Char('z')));
    }

    #[test]
    fn shift_arrows_resize_before_anything_else() {
        let (_dir, mut app) = setup_app();
        let width = app.left_width;
        handle_key_event(&mut app, with(KeyCode::Right, KeyModifiers::SHIFT));
        assert_eq!(app.left_width, width + 2);
        handle_key_event(&mut app, with(KeyCode::Left, KeyModifiers::SHIFT));
        assert_eq!(app.left_width, width);
    }

    #[test]
    fn pending_mark_consumes_next_key() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        app.scroll_preview(3);
        press(&mut app, KeyCode::Char('m'));
        // `q` names the mark rather than quitting.
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        assert!(app.marks.contains_key(&'q'));

        app.scroll_preview_to(0);
        press(&mut app, KeyCode::Char('\''));
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.preview_scroll, 3);
        assert!(app.pending_mark.is_none());
    }

    #[test]
    fn help_toggles_and_esc_closes() {
        let (_dir, mut app) = setup_app();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);
        press(&mut app, KeyCode::Esc);
        assert!(!app.show_help);
        press(&mut app, KeyCode::Char('?'));
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }

    #[test]
    fn picker_typing_refilters_and_enter_opens() {
        let (dir, mut app) = setup_app();
        handle_key_event(&mut app, with(KeyCode::Char('p'), KeyModifiers::CONTROL));
        assert_eq!(app.mode, Mode::Picker);
        type_str(&mut app, "fileb");
        let picker = app.picker.as_ref().unwrap();
        assert_eq!(picker.input.text, "fileb");
        assert_eq!(
            picker.selected_path(),
            Some(std::path::Path::new("file_b.rs"))
        );
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.preview_target(), Some(dir.path().join("file_b.rs")));
    }

    #[test]
    fn q_types_into_picker() {
        let (_dir, mut app) = setup_app();
        handle_key_event(&mut app, with(KeyCode::Char('p'), KeyModifiers::CONTROL));
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        assert_eq!(app.picker.as_ref().unwrap().input.text, "q");
        press(&mut app, KeyCode::Esc);
        assert!(app.picker.is_none());
    }

    #[test]
    fn slash_opens_filter_and_typing_edits() {
        let (_dir, mut app) = setup_app();
        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.mode, Mode::Filter);
        type_str(&mut app, "j/k");
        assert_eq!(app.filter.as_ref().unwrap().input.text, "j/k");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.filter.as_ref().unwrap().input.text, "j/");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.filter.is_none());
    }

    #[test]
    fn empty_filter_submit_closes() {
        let (_dir, mut app) = setup_app();
        press(&mut app, KeyCode::Char('/'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn wrap_toggle_and_scroll_keys() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        assert!(press(&mut app, KeyCode::Char('J')));
        assert_eq!(app.preview_scroll, 1);
        press(&mut app, KeyCode::End);
        assert_eq!(app.preview_scroll, app.max_preview_scroll());
        press(&mut app, KeyCode::Home);
        assert_eq!(app.preview_scroll, 0);
        let wrap = app.wrap;
        press(&mut app, KeyCode::Char('w'));
        assert_eq!(app.wrap, !wrap);
    }

    #[test]
    fn wheel_scrolls_the_pane_under_the_pointer() {
        let (dir, mut app) = setup_app();
        app.navigate_to(&dir.path().join("file_a.txt"));
        let panes = app.panes();
        assert!(pointer(&mut app, MouseEventKind::ScrollDown, panes.preview.x + 1, panes.preview.y + 1));
        assert_eq!(app.preview_scroll, WHEEL_STEP as usize);
        pointer(&mut app, MouseEventKind::ScrollUp, panes.preview.x + 1, panes.preview.y);
        assert_eq!(app.preview_scroll, 0);

        let before = app.tree.selected_index;
        assert!(pointer(&mut app, MouseEventKind::ScrollDown, panes.tree.x, panes.tree.y));
        assert_eq!(app.tree.selected_index, before + 1);
        // the status row belongs to neither pane
        assert!(!pointer(&mut app, MouseEventKind::ScrollDown, 0, panes.status.y));
    }

    #[test]
    fn click_selects_and_drag_selects_text() {
        let (dir, mut app) = setup_app();
        let file = dir.path().join("file_a.txt");
        let panes = app.panes();
        let row = (app.tree.find_index_by_path(&file).unwrap() - app.tree.scroll_offset) as u16;
        let left = MouseButton::Left;

        assert!(pointer(&mut app, MouseEventKind::Down(left), panes.tree.x + 1, panes.tree.y + row));
        assert_eq!(app.preview_target(), Some(file));

        let (x, y) = (panes.preview.x, panes.preview.y);
        pointer(&mut app, MouseEventKind::Down(left), x, y);
        assert!(pointer(&mut app, MouseEventKind::Drag(left), x + 4, y + 2));
        pointer(&mut app, MouseEventKind::Up(left), x + 4, y + 2);
        let selection = app.selection().unwrap();
        assert_eq!((selection.start.row, selection.end.row), (0, 2));
        assert!(app.drag.is_none());
    }

    #[test]
    fn pointer_is_ignored_under_overlays() {
        let (_dir, mut app) = setup_app();
        let panes = app.panes();
        handle_key_event(&mut app, with(KeyCode::Char('p'), KeyModifiers::CONTROL));
        let before = app.tree.selected_index;
        assert!(!pointer(&mut app, MouseEventKind::ScrollDown, panes.tree.x, panes.tree.y));
        assert_eq!(app.tree.selected_index, before);
        press(&mut app, KeyCode::Esc);

        press(&mut app, KeyCode::Char('?'));
        assert!(!pointer(&mut app, MouseEventKind::ScrollDown, panes.tree.x, panes.tree.y));
    }

    #[test]
    fn brackets_jump_between_changes() {
        let (_dir, mut app) = setup_app();
        assert!(press(&mut app, KeyCode::Char(']')));
        assert_eq!(app.status.as_ref().map(|s| s.text.as_str()), Some("no changes"));
        app.status = None;
        assert!(press(&mut app, KeyCode::Char('[')));
        assert!(app.status.is_some());
    }
}
