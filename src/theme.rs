//! Pane chrome colors: two built-in palettes and config overrides.
//!
//! Preview text carries its own colors as escape sequences; these only
//! style the tree, borders, status row and overlays.

use ratatui::style::Color;

use crate::config::{ThemeColorsConfig, ThemeConfig};

#[derive(Debug, Clone)]
pub struct ThemeColors {
    pub tree_fg: Color,
    pub tree_selected_bg: Color,
    pub tree_dir_fg: Color,
    pub tree_hidden_fg: Color,

    pub preview_fg: Color,

    pub status_bg: Color,
    pub status_fg: Color,

    pub border_fg: Color,
    pub overlay_bg: Color,

    pub error_fg: Color,
    pub accent_fg: Color,
    pub dim_fg: Color,
}

/// Catppuccin Mocha.
pub fn dark_theme() -> ThemeColors {
    ThemeColors {
        tree_fg: Color::Rgb(205, 214, 244),
        tree_selected_bg: Color::Rgb(69, 71, 90),
        tree_dir_fg: Color::Rgb(137, 180, 250),
        tree_hidden_fg: Color::Rgb(108, 112, 134),

        preview_fg: Color::Rgb(205, 214, 244),

        status_bg: Color::Rgb(30, 30, 46),
        status_fg: Color::Rgb(205, 214, 244),

        border_fg: Color::Rgb(88, 91, 112),
        overlay_bg: Color::Rgb(49, 50, 68),

        error_fg: Color::Rgb(243, 139, 168),
        accent_fg: Color::Rgb(203, 166, 247),
        dim_fg: Color::Rgb(108, 112, 134),
    }
}

/// Catppuccin Latte.
pub fn light_theme() -> ThemeColors {
    ThemeColors {
        tree_fg: Color::Rgb(76, 79, 105),
        tree_selected_bg: Color::Rgb(204, 208, 218),
        tree_dir_fg: Color::Rgb(30, 102, 245),
        tree_hidden_fg: Color::Rgb(156, 160, 176),

        preview_fg: Color::Rgb(76, 79, 105),

        status_bg: Color::Rgb(239, 241, 245),
        status_fg: Color::Rgb(76, 79, 105),

        border_fg: Color::Rgb(172, 176, 190),
        overlay_bg: Color::Rgb(230, 233, 239),

        error_fg: Color::Rgb(210, 15, 57),
        accent_fg: Color::Rgb(136, 57, 239),
        dim_fg: Color::Rgb(156, 160, 176),
    }
}

/// Parse `"#aabbcc"` (the `#` is optional).
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn override_with(slot: &mut Color, hex: Option<&String>) {
    if let Some(color) = hex.and_then(|h| parse_hex_color(h)) {
        *slot = color;
    }
}

fn apply_custom_colors(theme: &mut ThemeColors, custom: &ThemeColorsConfig) {
    override_with(&mut theme.tree_dir_fg, custom.tree_dir_fg.as_ref());
    override_with(&mut theme.tree_selected_bg, custom.tree_selected_bg.as_ref());
    override_with(&mut theme.status_bg, custom.status_bg.as_ref());
    override_with(&mut theme.status_fg, custom.status_fg.as_ref());
    override_with(&mut theme.border_fg, custom.border_fg.as_ref());
    override_with(&mut theme.accent_fg, custom.accent_fg.as_ref());
}

/// `"light"` picks the light palette, `"custom"` starts from dark and
/// applies overrides, anything else is dark.
pub fn resolve_theme(config: &ThemeConfig) -> ThemeColors {
    match config.scheme.as_deref().unwrap_or("dark") {
        "light" => light_theme(),
        "custom" => {
            let mut theme = dark_theme();
            if let Some(custom) = &config.custom {
                apply_custom_colors(&mut theme, custom);
            }
            theme
        }
        _ => dark_theme(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex() {
        assert_eq!(parse_hex_color("#ff8000"), Some(Color::Rgb(255, 128, 0)));
        assert_eq!(parse_hex_color("00ff00"), Some(Color::Rgb(0, 255, 0)));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn unknown_scheme_is_dark() {
        let cfg = ThemeConfig {
            scheme: Some("solarized".into()),
            custom: None,
        };
        assert_eq!(resolve_theme(&cfg).status_bg, dark_theme().status_bg);
    }

    #[test]
    fn custom_overrides_only_valid_colors() {
        let cfg = ThemeConfig {
            scheme: Some("custom".into()),
            custom: Some(ThemeColorsConfig {
                accent_fg: Some("#010203".into()),
                border_fg: Some("nope".into()),
                ..ThemeColorsConfig::default()
            }),
        };
        let theme = resolve_theme(&cfg);
        assert_eq!(theme.accent_fg, Color::Rgb(1, 2, 3));
        assert_eq!(theme.border_fg, dark_theme().border_fg);
    }
}
