//! Syntax coloring as an ordered ladder of strategies.
//!
//! Each tier either colors every line or returns `None`; the raw tier
//! always succeeds, so the ladder never yields a partially styled file.

use std::path::Path;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use tracing::debug;

use crate::render::ansi::RESET;

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Syntect,
    Tokenizer,
    Raw,
}

pub const LADDER: [Tier; 3] = [Tier::Syntect, Tier::Tokenizer, Tier::Raw];

/// Detect the language name for a file from its extension or shebang.
pub fn detect_syntax_name(path: &Path, first_line: &str) -> Option<&'static str> {
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some("py") => "Python",
        Some("rs") => "Rust",
        Some("yaml" | "yml") => "YAML",
        Some("json") => "JSON",
        Some("toml") => "TOML",
        Some("sh" | "bash" | "zsh") => "Bash",
        Some("sql") => "SQL",
        Some("md" | "markdown") => "Markdown",
        Some("html" | "htm") => "HTML",
        Some("css") => "CSS",
        Some("js" | "jsx" | "mjs") => "JavaScript",
        Some("ts" | "tsx") => "TypeScript",
        Some("c" | "h") => "C",
        Some("cpp" | "hpp" | "cc") => "C++",
        Some("java") => "Java",
        Some("go") => "Go",
        Some("rb") => "Ruby",
        Some("lua") => "Lua",
        Some(_) => return None,
        None => return detect_from_shebang(first_line),
    };
    Some(name)
}

fn detect_from_shebang(first_line: &str) -> Option<&'static str> {
    if !first_line.starts_with("#!") {
        return None;
    }
    let line = first_line.to_lowercase();
    if line.contains("python") {
        Some("Python")
    } else if line.contains("bash") || line.contains("/sh") {
        Some("Bash")
    } else if line.contains("ruby") {
        Some("Ruby")
    } else if line.contains("node") || line.contains("deno") {
        Some("JavaScript")
    } else {
        None
    }
}

/// Load a theme from the built-in theme set by name, with fallback.
pub fn load_theme(theme_name: Option<&str>) -> Option<Theme> {
    let mut ts = ThemeSet::load_defaults();
    let name = theme_name.unwrap_or(DEFAULT_THEME);
    ts.themes
        .remove(name)
        .or_else(|| ts.themes.remove(DEFAULT_THEME))
}

pub struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Option<Theme>,
}

impl Highlighter {
    pub fn new(theme_name: Option<&str>) -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_nonewlines(),
            theme: load_theme(theme_name),
        }
    }

    /// Color `lines` with the first tier that succeeds.
    pub fn highlight(&self, path: &Path, lines: &[String]) -> (Tier, Vec<String>) {
        let first = lines.first().map(String::as_str).unwrap_or("");
        let language = detect_syntax_name(path, first);
        for tier in LADDER {
            if let Some(out) = self.run_tier(tier, language, lines) {
                debug!(path = %path.display(), ?tier, "highlighted");
                return (tier, out);
            }
        }
        (Tier::Raw, lines.to_vec())
    }

    pub fn run_tier(
        &self,
        tier: Tier,
        language: Option<&str>,
        lines: &[String],
    ) -> Option<Vec<String>> {
        match tier {
            Tier::Syntect => self.syntect(language?, lines),
            Tier::Tokenizer => tokenize(language?, lines),
            Tier::Raw => Some(lines.to_vec()),
        }
    }

    fn syntect(&self, language: &str, lines: &[String]) -> Option<Vec<String>> {
        let theme = self.theme.as_ref()?;
        let syntax = self.syntaxes.find_syntax_by_name(language)?;
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            let ranges = highlighter.highlight_line(line, &self.syntaxes).ok()?;
            let mut styled = as_24_bit_terminal_escaped(&ranges, false);
            styled.push_str(RESET);
            out.push(styled);
        }
        Some(out)
    }
}

// ── Minimal tokenizer tier ──────────────────────────────────────────────────

const KEYWORD: &str = "\x1b[38;5;176m";
const STRING: &str = "\x1b[38;5;114m";
const COMMENT: &str = "\x1b[38;5;245m";
const NUMBER: &str = "\x1b[38;5;173m";

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "case", "class", "const", "continue", "def", "do", "else",
    "enum", "export", "false", "fn", "for", "from", "func", "function", "if", "impl", "import",
    "in", "interface", "let", "local", "match", "mod", "mut", "None", "null", "pub", "return",
    "self", "static", "struct", "switch", "trait", "true", "True", "False", "type", "use", "var",
    "while", "with", "yield",
];

fn comment_marker(language: &str) -> Option<&'static str> {
    match language {
        "Python" | "Bash" | "Ruby" | "YAML" | "TOML" => Some("#"),
        "SQL" | "Lua" => Some("--"),
        "Rust" | "C" | "C++" | "Java" | "Go" | "JavaScript" | "TypeScript" | "CSS" => Some("//"),
        _ => None,
    }
}

/// Keyword, string, comment and number coloring without a grammar.
fn tokenize(language: &str, lines: &[String]) -> Option<Vec<String>> {
    let comment = comment_marker(language);
    Some(lines.iter().map(|l| tokenize_line(l, comment)).collect())
}

fn tokenize_line(line: &str, comment: Option<&str>) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + 16);
    let mut i = 0;
    let mut colored = false;

    while i < chars.len() {
        let c = chars[i];
        let rest: String = chars[i..].iter().take(2).collect();
        if let Some(marker) = comment {
            if rest.starts_with(marker) {
                out.push_str(COMMENT);
                out.extend(&chars[i..]);
                out.push_str(RESET);
                return out;
            }
        }
        if c == '"' || c == '\'' {
            let mut j = i + 1;
            while j < chars.len() && chars[j] != c {
                if chars[j] == '\\' {
                    j += 1;
                }
                j += 1;
            }
            let end = (j + 1).min(chars.len());
            out.push_str(STRING);
            out.extend(&chars[i..end]);
            out.push_str(RESET);
            colored = true;
            i = end;
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if KEYWORDS.contains(&word.as_str()) {
                out.push_str(KEYWORD);
                out.push_str(&word);
                out.push_str(RESET);
                colored = true;
            } else if word.chars().all(|ch| ch.is_ascii_digit()) {
                out.push_str(NUMBER);
                out.push_str(&word);
                out.push_str(RESET);
                colored = true;
            } else {
                out.push_str(&word);
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    if !colored {
        return line.to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ansi::strip_ansi;
    use std::path::PathBuf;

    #[test]
    fn detect_syntax_by_extension() {
        assert_eq!(detect_syntax_name(Path::new("test.py"), ""), Some("Python"));
        assert_eq!(detect_syntax_name(Path::new("main.rs"), ""), Some("Rust"));
        assert_eq!(detect_syntax_name(Path::new("c.yml"), ""), Some("YAML"));
        assert_eq!(detect_syntax_name(Path::new("notes.xyz"), ""), None);
    }

    #[test]
    fn detect_shebang() {
        let p = PathBuf::from("script");
        assert_eq!(detect_syntax_name(&p, "#!/usr/bin/env python3"), Some("Python"));
        assert_eq!(detect_syntax_name(&p, "#!/bin/sh"), Some("Bash"));
        assert_eq!(detect_syntax_name(&p, "hello"), None);
    }

    #[test]
    fn load_theme_invalid_falls_back() {
        assert!(load_theme(Some("no such theme")).is_some());
    }

    #[test]
    fn syntect_colors_rust() {
        let h = Highlighter::new(None);
        let lines = vec!["fn main() {}".to_string()];
        let (tier, out) = h.highlight(Path::new("main.rs"), &lines);
        assert_eq!(tier, Tier::Syntect);
        assert!(out[0].contains("\x1b[38;2;"));
        assert_eq!(strip_ansi(&out[0]), "fn main() {}");
    }

    #[test]
    fn unknown_language_is_raw() {
        let h = Highlighter::new(None);
        let lines = vec!["just text".to_string()];
        let (tier, out) = h.highlight(Path::new("notes.xyz"), &lines);
        assert_eq!(tier, Tier::Raw);
        assert_eq!(out, lines);
    }

    #[test]
    fn tokenizer_colors_every_line_or_leaves_it() {
        let lines = vec![
            "let x = \"hi\"; // note".to_string(),
            "plain words".to_string(),
        ];
        let out = tokenize("Rust", &lines).expect("tokenizer");
        assert_eq!(out.len(), 2);
        assert!(out[0].contains(KEYWORD));
        assert!(out[0].contains(STRING));
        assert!(out[0].contains(COMMENT));
        assert_eq!(out[1], "plain words");
        for (styled, raw) in out.iter().zip(&lines) {
            assert_eq!(&strip_ansi(styled), raw);
        }
    }

    #[test]
    fn tokenizer_numbers_need_whole_word() {
        let out = tokenize_line("x1 = 42", Some("#"));
        assert!(out.contains(&format!("{NUMBER}42{RESET}")));
        assert!(!out.contains(&format!("{NUMBER}1")));
    }

    #[test]
    fn tokenizer_requires_language() {
        let h = Highlighter::new(None);
        assert!(h.run_tier(Tier::Tokenizer, None, &[]).is_none());
        assert_eq!(h.run_tier(Tier::Raw, None, &["a".into()]), Some(vec!["a".to_string()]));
    }
}
