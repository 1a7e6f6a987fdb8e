//! Column-width and GBK utilities for thermal printers
//!
//! Receipt columns are measured in printer columns, not bytes or chars:
//! under the GBK code page an ASCII glyph takes one column and a CJK glyph
//! takes two. This module provides:
//! - Display width of chars and strings
//! - Replacing control and unencodable characters with printable ones
//! - Truncating/padding strings to a column width on char boundaries
//! - Converting UTF-8 to GBK while preserving ESC/POS commands

use tracing::instrument;

/// Stands in for characters GBK cannot encode
pub const REPLACEMENT_CHAR: char = '?';

/// GBK byte length of a character, `None` if GBK cannot encode it
fn gbk_len(c: char) -> Option<usize> {
    if c.is_ascii() {
        return Some(1);
    }
    let mut buf = [0u8; 4];
    let (encoded, _, had_errors) = encoding_rs::GBK.encode(c.encode_utf8(&mut buf));
    if had_errors { None } else { Some(encoded.len()) }
}

/// Printer columns taken by a single character
///
/// Characters GBK cannot encode go out as [`REPLACEMENT_CHAR`], one column.
pub fn char_width(c: char) -> usize {
    gbk_len(c).unwrap_or(1)
}

/// Make text safe to place inside a receipt line
///
/// Control characters (newlines, ESC, GS, ...) become spaces so sale data
/// can neither break a row nor smuggle in printer commands; characters GBK
/// cannot encode become [`REPLACEMENT_CHAR`].
pub fn printable(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_control() {
                ' '
            } else if gbk_len(c).is_none() {
                REPLACEMENT_CHAR
            } else {
                c
            }
        })
        .collect()
}

/// Printer columns taken by a string
pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Truncate a string to at most `max_width` columns
///
/// Never splits a character: a wide glyph that would straddle the limit is
/// dropped entirely.
pub fn truncate_width(s: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let w = char_width(c);
        if width + w > max_width {
            break;
        }
        result.push(c);
        width += w;
    }
    result
}

/// Pad a string to a column width
///
/// The text is made [`printable`] and truncated first, so the result is
/// always exactly `width` columns on the wire.
pub fn pad_width(s: &str, width: usize, align_right: bool) -> String {
    let fitted = truncate_width(&printable(s), width);
    let spaces = width - display_width(&fitted);
    if align_right {
        format!("{}{}", " ".repeat(spaces), fitted)
    } else {
        format!("{}{}", fitted, " ".repeat(spaces))
    }
}

/// Left-justified fixed-width column
pub fn fit_column(s: &str, width: usize) -> String {
    pad_width(s, width, false)
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to GBK
///
/// ASCII bytes (0x00-0x7F) pass through untouched, which protects ESC/POS
/// commands from being corrupted. Runs of bytes >= 0x80 are decoded as
/// UTF-8 and re-encoded as GBK.
///
/// Also handles:
/// - Re-enabling Chinese mode after INIT command (ESC @)
/// - Euro symbol (€) via the PC858 code page
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn convert_to_gbk(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() * 2);

    // FS & - Enable Chinese mode
    // FS C 1 - Select GBK code page
    result.extend_from_slice(&[0x1C, 0x26, 0x1C, 0x43, 0x01]);

    let mut pending = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        // INIT (ESC @) resets the printer to its default code page
        if b == 0x1B && bytes.get(i + 1) == Some(&0x40) {
            flush_pending(&mut pending, &mut result);
            result.extend_from_slice(&[0x1B, 0x40, 0x1C, 0x26]);
            i += 2;
            continue;
        }

        if b < 0x80 {
            flush_pending(&mut pending, &mut result);
            result.push(b);
        } else {
            pending.push(b);
        }
        i += 1;
    }

    flush_pending(&mut pending, &mut result);

    // FS . - Exit Chinese mode
    result.extend_from_slice(&[0x1C, 0x2E]);

    result
}

/// Re-encode a run of non-ASCII UTF-8 bytes as GBK
///
/// Unencodable characters become [`REPLACEMENT_CHAR`] rather than the HTML
/// character references `encoding_rs` would emit.
fn flush_pending(pending: &mut Vec<u8>, result: &mut Vec<u8>) {
    if pending.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(pending);
    let mut parts = s.split('€').peekable();

    while let Some(part) = parts.next() {
        if !part.is_empty() {
            let (gbk, _, had_errors) = encoding_rs::GBK.encode(part);
            if had_errors {
                let replaced: String = part
                    .chars()
                    .map(|c| if gbk_len(c).is_some() { c } else { REPLACEMENT_CHAR })
                    .collect();
                result.extend_from_slice(&encoding_rs::GBK.encode(&replaced).0);
            } else {
                result.extend_from_slice(&gbk);
            }
        }
        if parts.peek().is_some() {
            // Exit Chinese -> PC858 -> Euro -> Enter Chinese
            result.extend_from_slice(&[0x1C, 0x2E, 0x1B, 0x74, 19, 0xD5, 0x1C, 0x26]);
        }
    }
    pending.clear();
}
