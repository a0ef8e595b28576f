//! Payload ingestion for write operations
//!
//! Hex strings and script files share one digit grammar: hex byte pairs,
//! whitespace ignored. Scripts also allow `#` comments running to the end
//! of the line.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors while turning user input into bytes
#[derive(Debug, Error)]
pub enum InputError {
    /// A line ended in the middle of a byte
    #[error("line {line}: odd number of hex digits")]
    OddDigits {
        /// 1-based line number
        line: usize,
    },

    /// A character that is neither hex, whitespace nor a comment
    #[error("line {line}: invalid hex character '{ch}'")]
    InvalidChar {
        /// 1-based line number
        line: usize,
        /// Offending character
        ch: char,
    },

    /// The input file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Parse one line of hex digits, ignoring whitespace
fn parse_hex_line(text: &str, line: usize, out: &mut Vec<u8>) -> Result<(), InputError> {
    let mut high: Option<u8> = None;

    for ch in text.chars().filter(|c| !c.is_whitespace()) {
        let nibble = ch
            .to_digit(16)
            .ok_or(InputError::InvalidChar { line, ch })? as u8;
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }

    if high.is_some() {
        return Err(InputError::OddDigits { line });
    }
    Ok(())
}

/// Parse a hex byte string such as `0xDEADBEEF` or `de ad be ef`
pub fn parse_hex_string(s: &str) -> Result<Vec<u8>, InputError> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    let mut out = Vec::with_capacity(digits.len() / 2);
    parse_hex_line(digits, 1, &mut out)?;
    Ok(out)
}

/// Parse the contents of a hex script
pub fn parse_script(text: &str) -> Result<Vec<u8>, InputError> {
    let mut out = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let content = match raw.split_once('#') {
            Some((before, _comment)) => before,
            None => raw,
        };
        parse_hex_line(content, i + 1, &mut out)?;
    }

    Ok(out)
}

/// Read and parse a hex script file
pub fn read_script(path: &Path) -> Result<Vec<u8>, InputError> {
    let text = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = parse_script(&text)?;
    log::debug!("Script {:?}: {} bytes", path, data.len());
    Ok(data)
}

/// Read a raw binary file
pub fn read_binary(path: &Path) -> Result<Vec<u8>, InputError> {
    let data = fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("File {:?}: {} bytes", path, data.len());
    Ok(data)
}
