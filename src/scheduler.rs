use std::time::Duration;

use ratatui::layout::Rect;
use tracing::{debug, info};

use crate::app::App;
use crate::config::AppConfig;
use crate::error::Result;
use crate::event::{InputToken, Normalizer};
use crate::handler;
use crate::tui::TerminalIo;
use crate::ui;

/// Where the loop is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Dirty,
    Rendering,
    Quitting,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// A frame was written this tick.
    pub rendered: bool,
    /// State changed during the tick, whether or not it is drawn yet.
    pub dirty: bool,
    pub quit: bool,
}

/// Single-threaded tick loop: measure, expire, bound, draw, read, dispatch.
pub struct Scheduler {
    pub phase: LoopPhase,
    normalizer: Normalizer,
    tick_wait: Duration,
    tree_poll_ticks: u32,
    vcs_poll_ticks: u32,
    ticks_since_tree: u32,
    ticks_since_vcs: u32,
    tree_signature: u64,
    vcs_signature: u64,
}

impl Scheduler {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            phase: LoopPhase::Dirty,
            normalizer: Normalizer::default(),
            tick_wait: Duration::from_millis(config.tick_ms()),
            tree_poll_ticks: config.tree_poll_ticks(),
            vcs_poll_ticks: config.vcs_poll_ticks(),
            ticks_since_tree: 0,
            ticks_since_vcs: 0,
            tree_signature: 0,
            vcs_signature: 0,
        }
    }

    /// Take the starting signatures so the first poll only reacts to real
    /// changes.
    pub fn prime(&mut self, app: &mut App) {
        self.tree_signature = app.services.watch.tree_signature(&app.watched_dirs());
        self.vcs_signature = app.services.watch.vcs_signature();
        app.engine.set_signatures(self.tree_signature, self.vcs_signature);
    }

    /// Tick until a handler asks to quit.
    pub fn run(&mut self, app: &mut App, io: &mut dyn TerminalIo) -> Result<()> {
        self.prime(app);
        info!(root = %app.root.display(), "event loop started");
        loop {
            if self.tick(app, io)?.quit {
                break;
            }
        }
        info!(ticks = app.tick, "event loop stopped");
        Ok(())
    }

    /// One pass of the loop.
    pub fn tick(&mut self, app: &mut App, io: &mut dyn TerminalIo) -> Result<TickOutcome> {
        app.tick += 1;
        let mut changed = app.measure(io.area()?);
        changed |= app.expire_status();
        changed |= app.recompute_bounds();
        app.dirty |= changed;

        let mut outcome = TickOutcome::default();
        if app.dirty {
            self.phase = LoopPhase::Rendering;
            io.present(&ui::render_frame(app))?;
            app.dirty = false;
            outcome.rendered = true;
            self.phase = LoopPhase::Idle;
        }

        let read = io.read_token(self.tick_wait)?;
        let arrived = read.is_some();
        let after = match self.normalizer.normalize(read) {
            Some(token) => self.apply_token(app, Some(token)),
            // a swallowed LF is still input, not an idle tick
            None if arrived => TickOutcome::default(),
            None => TickOutcome {
                dirty: self.idle_work(app),
                ..TickOutcome::default()
            },
        };
        app.dirty |= after.dirty;
        outcome.dirty = outcome.rendered || app.dirty;
        outcome.quit = after.quit;
        self.phase = if outcome.quit {
            LoopPhase::Quitting
        } else if app.dirty {
            LoopPhase::Dirty
        } else {
            LoopPhase::Idle
        };
        Ok(outcome)
    }

    /// Dispatch one already-normalized token.
    pub fn apply_token(&mut self, app: &mut App, token: Option<InputToken>) -> TickOutcome {
        let dirty = match token {
            Some(InputToken::Key(key)) => handler::handle_key_event(app, key),
            Some(InputToken::Mouse(mouse)) => handler::handle_mouse_event(app, mouse),
            Some(InputToken::Resize(width, height)) => {
                debug!(width, height, "resize");
                app.measure(Rect::new(0, 0, width, height));
                true
            }
            None => false,
        };
        app.dirty |= dirty;
        TickOutcome {
            rendered: false,
            dirty,
            quit: app.should_quit,
        }
    }

    /// Poll the watch signatures when their intervals come due and rebuild
    /// only on change.
    fn idle_work(&mut self, app: &mut App) -> bool {
        self.ticks_since_tree += 1;
        self.ticks_since_vcs += 1;

        let mut tree_changed = false;
        if self.ticks_since_tree >= self.tree_poll_ticks {
            self.ticks_since_tree = 0;
            let signature = app.services.watch.tree_signature(&app.watched_dirs());
            tree_changed = signature != self.tree_signature;
            self.tree_signature = signature;
        }

        let mut vcs_changed = false;
        if self.ticks_since_vcs >= self.vcs_poll_ticks {
            self.ticks_since_vcs = 0;
            let signature = app.services.watch.vcs_signature();
            vcs_changed = signature != self.vcs_signature;
            self.vcs_signature = signature;
        }

        let refreshed =
            app.apply_signatures(self.tree_signature, self.vcs_signature, tree_changed, vcs_changed);
        app.drag_autoscroll() | refreshed
    }
}
