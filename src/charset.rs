//! Class-index-to-symbol tables for CTC decoding.

use std::fs;
use std::path::Path;

use crate::error::OcrError;

/// Symbol reserved at index 0 of the built-in table.
pub const BLANK_TOKEN: &str = "blank";

/// Number of entries in the built-in table.
pub const DEFAULT_CHARSET_LEN: usize = 97;

/// Built-in symbol table: the CTC blank, digits, punctuation, upper- and
/// lower-case Latin letters, and space. 97 entries; the table ends with a
/// duplicate space class, matching recognition heads that reserve one at the
/// tail.
pub fn default_charset() -> Vec<String> {
    let mut charset: Vec<String> = Vec::with_capacity(DEFAULT_CHARSET_LEN);
    charset.push(BLANK_TOKEN.to_string());
    for c in '0'..='9' {
        charset.push(c.to_string());
    }
    for c in ':'..='@' {
        charset.push(c.to_string());
    }
    for c in 'A'..='Z' {
        charset.push(c.to_string());
    }
    for c in '['..='`' {
        charset.push(c.to_string());
    }
    for c in 'a'..='z' {
        charset.push(c.to_string());
    }
    for c in '{'..='~' {
        charset.push(c.to_string());
    }
    for c in '!'..='/' {
        charset.push(c.to_string());
    }
    charset.push(" ".to_string());
    charset.push(" ".to_string());
    charset
}

/// Loads a symbol table from `path`, one symbol per line, taken verbatim.
///
/// An unset (empty) path, a missing file, or an empty file falls back to the
/// built-in table. An existing file that cannot be read is fatal.
pub fn load_charset(path: &str) -> Result<Vec<String>, OcrError> {
    if path.is_empty() {
        return Ok(default_charset());
    }
    let path = Path::new(path);
    if !path.exists() {
        return Ok(default_charset());
    }
    let content = fs::read_to_string(path).map_err(|e| {
        OcrError::Charset(format!("failed to open charset file {}: {e}", path.display()))
    })?;
    let symbols: Vec<String> = content.lines().map(|line| line.to_string()).collect();
    if symbols.is_empty() {
        return Ok(default_charset());
    }
    Ok(symbols)
}
