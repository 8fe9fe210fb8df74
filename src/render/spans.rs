//! Conversion of styled rows into ratatui lines.
//!
//! Escape sequences are fed through a `vte` parser so SGR handling follows
//! the same state machine a terminal would use.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use tracing::trace;

use crate::error::{PreviewError, PreviewResult};
use crate::render::ansi::{self, Token};

/// Glyph shown for an `ESC` byte that does not start a sequence.
const LITERAL_ESC: char = '\u{241b}';

struct SgrPerformer {
    base: Style,
    style: Style,
}

impl vte::Perform for SgrPerformer {
    fn print(&mut self, _c: char) {}

    fn execute(&mut self, _byte: u8) {}

    fn hook(&mut self, _params: &vte::Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        params: &vte::Params,
        _intermediates: &[u8],
        _ignore: bool,
        action: char,
    ) {
        if action != 'm' {
            return;
        }
        let params: Vec<u16> = params.iter().flat_map(|sub| sub.iter().copied()).collect();
        match apply_sgr(self.style, self.base, &params) {
            Ok(style) => self.style = style,
            Err(err) => trace!(error = %err, ?params, "sgr ignored"),
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

fn basic_color(n: u16) -> Color {
    match n {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        _ => Color::Gray,
    }
}

fn bright_color(n: u16) -> Color {
    match n {
        0 => Color::DarkGray,
        1 => Color::LightRed,
        2 => Color::LightGreen,
        3 => Color::LightYellow,
        4 => Color::LightBlue,
        5 => Color::LightMagenta,
        6 => Color::LightCyan,
        _ => Color::White,
    }
}

/// Extended color at `params[i]` (the `5` or `2` selector); returns the
/// color and how many parameters it consumed.
fn extended_color(params: &[u16], i: usize) -> PreviewResult<(Color, usize)> {
    match params.get(i) {
        Some(5) => {
            let n = params.get(i + 1).ok_or(PreviewError::MalformedEscapeInput)?;
            Ok((Color::Indexed(*n as u8), 2))
        }
        Some(2) => match params.get(i + 1..i + 4) {
            Some([r, g, b]) => Ok((Color::Rgb(*r as u8, *g as u8, *b as u8), 4)),
            _ => Err(PreviewError::MalformedEscapeInput),
        },
        _ => Err(PreviewError::MalformedEscapeInput),
    }
}

/// Fold SGR parameters into `style`. A malformed extended color rejects
/// the whole sequence.
pub fn apply_sgr(style: Style, base: Style, params: &[u16]) -> PreviewResult<Style> {
    if params.is_empty() {
        return Ok(base);
    }
    let mut style = style;
    let mut i = 0;
    while i < params.len() {
        match params[i] {
            0 => style = base,
            1 => style = style.add_modifier(Modifier::BOLD),
            2 => style = style.add_modifier(Modifier::DIM),
            3 => style = style.add_modifier(Modifier::ITALIC),
            4 => style = style.add_modifier(Modifier::UNDERLINED),
            5 => style = style.add_modifier(Modifier::SLOW_BLINK),
            7 => style = style.add_modifier(Modifier::REVERSED),
            9 => style = style.add_modifier(Modifier::CROSSED_OUT),
            21 | 22 => style = style.remove_modifier(Modifier::BOLD | Modifier::DIM),
            23 => style = style.remove_modifier(Modifier::ITALIC),
            24 => style = style.remove_modifier(Modifier::UNDERLINED),
            25 => style = style.remove_modifier(Modifier::SLOW_BLINK),
            27 => style = style.remove_modifier(Modifier::REVERSED),
            29 => style = style.remove_modifier(Modifier::CROSSED_OUT),
            n @ 30..=37 => style = style.fg(basic_color(n - 30)),
            38 => {
                let (color, used) = extended_color(params, i + 1)?;
                style = style.fg(color);
                i += used;
            }
            39 => style.fg = base.fg,
            n @ 40..=47 => style = style.bg(basic_color(n - 40)),
            48 => {
                let (color, used) = extended_color(params, i + 1)?;
                style = style.bg(color);
                i += used;
            }
            49 => style.bg = base.bg,
            n @ 90..=97 => style = style.fg(bright_color(n - 90)),
            n @ 100..=107 => style = style.bg(bright_color(n - 100)),
            _ => {}
        }
        i += 1;
    }
    Ok(style)
}

/// Convert one styled row into a ratatui line on top of `base`.
pub fn to_line(row: &str, base: Style) -> Line<'static> {
    let mut parser = vte::Parser::new();
    let mut performer = SgrPerformer { base, style: base };
    let mut spans = Vec::new();
    let mut text = String::new();
    let mut text_style = base;

    for token in ansi::tokens(row) {
        match token {
            Token::Escape(seq) => {
                for byte in seq.bytes() {
                    parser.advance(&mut performer, byte);
                }
                if performer.style != text_style {
                    if !text.is_empty() {
                        spans.push(Span::styled(std::mem::take(&mut text), text_style));
                    }
                    text_style = performer.style;
                }
            }
            Token::Char('\x1b') => text.push(LITERAL_ESC),
            Token::Char('\t') => text.push(' '),
            Token::Char(c) => text.push(c),
        }
    }
    if !text.is_empty() {
        spans.push(Span::styled(text, text_style));
    }
    Line::from(spans)
}
