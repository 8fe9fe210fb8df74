use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent};

/// One unit of input read by the scheduler per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputToken {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// The terminal was resized; the next tick re-measures.
    Resize(u16, u16),
}

impl InputToken {
    pub fn key(code: KeyCode) -> Self {
        InputToken::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    pub fn ctrl(c: char) -> Self {
        InputToken::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    /// A carriage return as the terminal reports it.
    fn is_carriage_return(&self) -> bool {
        matches!(self, InputToken::Key(k) if k.code == KeyCode::Enter)
    }

    /// A bare line feed arrives as Ctrl+J in raw mode.
    fn is_line_feed(&self) -> bool {
        matches!(
            self,
            InputToken::Key(k) if k.code == KeyCode::Char('j') && k.modifiers == KeyModifiers::CONTROL
        )
    }
}

/// Coalesces a CR LF pair into a single Enter.
///
/// A CR yields Enter and arms the filter; an LF right after it is dropped.
/// A lone LF is the Ctrl+J key and passes through unchanged. Any other
/// token, or an idle tick, disarms the filter.
#[derive(Debug, Default)]
pub struct Normalizer {
    skip_next_lf: bool,
}

impl Normalizer {
    pub fn normalize(&mut self, token: Option<InputToken>) -> Option<InputToken> {
        let token = match token {
            Some(token) => token,
            None => {
                self.skip_next_lf = false;
                return None;
            }
        };
        if token.is_carriage_return() {
            self.skip_next_lf = true;
            return Some(InputToken::key(KeyCode::Enter));
        }
        if std::mem::take(&mut self.skip_next_lf) && token.is_line_feed() {
            return None;
        }
        Some(token)
    }
}
