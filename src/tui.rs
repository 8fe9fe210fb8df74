use std::io::{self, BufWriter, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, buffer::Buffer, layout::Rect, Terminal};

use crate::error::{AppError, Result};
use crate::event::InputToken;

/// What the scheduler needs from a terminal.
pub trait TerminalIo {
    /// Current viewport size.
    fn area(&self) -> Result<Rect>;

    /// Write a complete frame in one flush.
    fn present(&mut self, frame: &Buffer) -> Result<()>;

    /// Wait at most `timeout` for one input token.
    fn read_token(&mut self, timeout: Duration) -> Result<Option<InputToken>>;
}

/// Raw-mode, alternate-screen terminal.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<BufWriter<Stdout>>>,
    mouse_enabled: bool,
}

impl Tui {
    /// Enter raw mode and the alternate screen, optionally capturing the
    /// mouse.
    pub fn new(enable_mouse: bool) -> Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;
        if enable_mouse {
            execute!(stdout, EnableMouseCapture)?;
        }
        let backend = CrosstermBackend::new(BufWriter::new(stdout));
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            mouse_enabled: enable_mouse,
        })
    }

    /// Restore the terminal to its original state.
    pub fn restore(&mut self) -> Result<()> {
        if self.mouse_enabled {
            execute!(self.terminal.backend_mut(), DisableMouseCapture)?;
        }
        terminal::disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl TerminalIo for Tui {
    fn area(&self) -> Result<Rect> {
        let size = self.terminal.size()?;
        Ok(Rect::new(0, 0, size.width, size.height))
    }

    fn present(&mut self, frame: &Buffer) -> Result<()> {
        self.terminal
            .draw(|f| {
                let area = f.area().intersection(frame.area);
                let target = f.buffer_mut();
                for y in area.top()..area.bottom() {
                    for x in area.left()..area.right() {
                        if let (Some(dst), Some(src)) = (target.cell_mut((x, y)), frame.cell((x, y))) {
                            *dst = src.clone();
                        }
                    }
                }
            })
            .map_err(|e| AppError::Terminal(format!("frame write failed: {e}")))?;
        Ok(())
    }

    fn read_token(&mut self, timeout: Duration) -> Result<Option<InputToken>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => Some(InputToken::Key(key)),
            Event::Mouse(mouse) if mouse.kind != MouseEventKind::Moved => {
                Some(InputToken::Mouse(mouse))
            }
            Event::Resize(w, h) => Some(InputToken::Resize(w, h)),
            _ => None,
        })
    }
}

/// Install a panic hook that restores the terminal before printing panic info.
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture);
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}
