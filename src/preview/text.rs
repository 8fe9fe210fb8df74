//! Plain file preview: signature sniffing, binary probe, decoding and
//! control-byte sanitizing.

use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{PreviewError, PreviewResult};
use crate::preview::document::{DocLine, RenderedDocument};
use crate::preview::highlight::Highlighter;
use crate::preview::PreviewOptions;

pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
pub const BINARY_PROBE_BYTES: usize = 4096;

/// Decode strategies, tried in order. The last one never fails.
const DECODERS: [fn(&[u8]) -> Option<String>; 3] = [decode_utf8_bom, decode_utf8, decode_latin1];

fn decode_utf8_bom(bytes: &[u8]) -> Option<String> {
    let rest = bytes.strip_prefix(b"\xef\xbb\xbf")?;
    String::from_utf8(rest.to_vec()).ok()
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| b as char).collect())
}

pub fn decode(bytes: &[u8]) -> Option<String> {
    DECODERS.iter().find_map(|decoder| decoder(bytes))
}

fn is_disallowed_control(c: char) -> bool {
    let n = c as u32;
    (n < 0x20 && c != '\t') || (0x7f..=0x9f).contains(&n)
}

/// Rewrite control characters (other than tab) to a visible `\xNN` form.
pub fn sanitize_line(line: &str) -> String {
    if !line.chars().any(is_disallowed_control) {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 8);
    for c in line.chars() {
        if is_disallowed_control(c) {
            out.push_str(&format!("\\x{:02x}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decoded, sanitized lines of a text file.
pub fn read_source_lines(path: &Path) -> PreviewResult<Vec<String>> {
    let bytes = fs::read(path)?;
    if bytes[..bytes.len().min(BINARY_PROBE_BYTES)].contains(&0) {
        return Err(PreviewError::UnsupportedContent(format!(
            "binary file, {} bytes",
            bytes.len()
        )));
    }
    let text = decode(&bytes).ok_or_else(|| PreviewError::EncodingFailure(path.to_path_buf()))?;
    Ok(text.lines().map(sanitize_line).collect())
}

/// Source lines colored through the highlight ladder when allowed.
pub fn colorize(
    path: &Path,
    lines: Vec<String>,
    size: u64,
    options: &PreviewOptions,
    highlighter: &Highlighter,
) -> Vec<String> {
    if !options.colorize || size > options.colorize_max_bytes {
        return lines;
    }
    highlighter.highlight(path, &lines).1
}

pub fn build_file(
    path: &Path,
    options: &PreviewOptions,
    highlighter: &Highlighter,
) -> PreviewResult<RenderedDocument> {
    let mut head = [0u8; PNG_SIGNATURE.len()];
    let mut file = fs::File::open(path)?;
    let n = file.read(&mut head)?;
    if head[..n] == *PNG_SIGNATURE {
        debug!(path = %path.display(), "png signature");
        return Ok(RenderedDocument::image(path, "png"));
    }

    let size = fs::metadata(path)?.len();
    let lines = read_source_lines(path)?;
    if lines.is_empty() {
        return Ok(RenderedDocument::placeholder(path, "<empty file>"));
    }
    let styled = colorize(path, lines, size, options, highlighter);
    Ok(RenderedDocument::from_lines(
        path,
        styled.into_iter().map(DocLine::text).collect(),
    ))
}
