//! Reversible text encoding for key identifiers
//!
//! Key identifiers may contain control characters (some platforms report
//! Ctrl+Shift+L as U+000C). The encoding is:
//!
//! - a backslash is written as `\\`
//! - control characters and whitespace other than a plain space are written
//!   as `\u{HEX}` with lowercase hex digits
//! - every other character is written as-is
//!
//! Decoding additionally accepts `\xHH`, `\n`, `\r` and `\t`, which is how
//! older calibration files stored the same values.

use std::fmt::Write;
use std::str::CharIndices;

/// Errors produced while decoding an escaped identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscapeError {
    #[error("dangling backslash at end of input")]
    Dangling,

    #[error("unknown escape sequence '\\{sequence}' at offset {offset}")]
    UnknownEscape { sequence: char, offset: usize },

    #[error("malformed hex escape at offset {0}")]
    MalformedHex(usize),

    #[error("{0:#x} is not a valid code point")]
    InvalidCodePoint(u32),
}

fn needs_escape(c: char) -> bool {
    c.is_control() || (c.is_whitespace() && c != ' ')
}

/// Encode a raw identifier
pub fn encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' {
            out.push_str("\\\\");
        } else if needs_escape(c) {
            // Writing to a String cannot fail
            let _ = write!(out, "\\u{{{:x}}}", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode an escaped identifier back to its raw form
pub fn decode(escaped: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.char_indices();

    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let (_, sequence) = chars.next().ok_or(EscapeError::Dangling)?;
        let decoded = match sequence {
            '\\' => '\\',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'x' => {
                let digits: String = (0..2).filter_map(|_| chars.next().map(|(_, d)| d)).collect();
                parse_code_point(&digits, 2, offset)?
            }
            'u' => {
                match chars.next() {
                    Some((_, '{')) => {}
                    _ => return Err(EscapeError::MalformedHex(offset)),
                }
                let digits = take_until_brace(&mut chars, offset)?;
                parse_code_point(&digits, digits.len(), offset)?
            }
            other => {
                return Err(EscapeError::UnknownEscape {
                    sequence: other,
                    offset,
                })
            }
        };
        out.push(decoded);
    }

    Ok(out)
}

fn take_until_brace(chars: &mut CharIndices<'_>, offset: usize) -> Result<String, EscapeError> {
    let mut digits = String::new();
    loop {
        match chars.next() {
            Some((_, '}')) => return Ok(digits),
            Some((_, d)) if d.is_ascii_hexdigit() && digits.len() < 6 => digits.push(d),
            _ => return Err(EscapeError::MalformedHex(offset)),
        }
    }
}

fn parse_code_point(digits: &str, expected_len: usize, offset: usize) -> Result<char, EscapeError> {
    if digits.is_empty()
        || digits.len() != expected_len
        || !digits.chars().all(|d| d.is_ascii_hexdigit())
    {
        return Err(EscapeError::MalformedHex(offset));
    }
    let value = u32::from_str_radix(digits, 16).map_err(|_| EscapeError::MalformedHex(offset))?;
    char::from_u32(value).ok_or(EscapeError::InvalidCodePoint(value))
}
