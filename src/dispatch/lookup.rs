//! Clipboard classification and popup rendering
//!
//! Every hotkey dispatch ends in exactly one `LookupResult`; each variant has
//! its own rendering function so outcomes are tested as values, not strings.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::codes::{parse_code, CodeFormatError, CodeMap};

use super::clipboard;

/// Longest clipboard echo shown in a popup, ellipsis included
pub const PREVIEW_LEN: usize = 20;

/// Longest error message shown in a popup, ellipsis included
pub const ERROR_LEN: usize = 50;

const ELLIPSIS: &str = "...";

/// Why clipboard content is not a code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Empty,
    /// Not exactly four characters
    WrongLength { preview: String },
    /// Four characters, but not all letters
    NonAlphabetic { preview: String },
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::Empty => "empty",
            InvalidReason::WrongLength { .. } => "length",
            InvalidReason::NonAlphabetic { .. } => "non-alphabetic",
        }
    }
}

/// Outcome of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found { code: String, description: String },
    NotFound { code: String },
    InvalidClipboard(InvalidReason),
    ClipboardUnavailable,
}

/// Outcome tag reported to tray subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Found,
    NotFound,
    Invalid,
    Unavailable,
    Error,
}

impl LookupResult {
    pub fn kind(&self) -> LookupKind {
        match self {
            LookupResult::Found { .. } => LookupKind::Found,
            LookupResult::NotFound { .. } => LookupKind::NotFound,
            LookupResult::InvalidClipboard(_) => LookupKind::Invalid,
            LookupResult::ClipboardUnavailable => LookupKind::Unavailable,
        }
    }

    /// Normalized code, when the clipboard held a valid one
    pub fn code(&self) -> Option<&str> {
        match self {
            LookupResult::Found { code, .. } | LookupResult::NotFound { code } => Some(code),
            _ => None,
        }
    }

    /// Popup text for this outcome
    pub fn render(&self) -> String {
        match self {
            LookupResult::Found { code, description } => render_found(code, description),
            LookupResult::NotFound { code } => render_not_found(code),
            LookupResult::InvalidClipboard(reason) => render_invalid(reason),
            LookupResult::ClipboardUnavailable => render_unavailable(),
        }
    }
}

/// Classify clipboard text against the current code mapping
pub fn classify(text: &str, codes: &CodeMap) -> LookupResult {
    match parse_code(text) {
        Ok(code) => match codes.get(&code) {
            Some(description) => LookupResult::Found {
                description: description.clone(),
                code,
            },
            None => LookupResult::NotFound { code },
        },
        Err(CodeFormatError::Empty) => LookupResult::InvalidClipboard(InvalidReason::Empty),
        Err(CodeFormatError::WrongLength(_)) => {
            LookupResult::InvalidClipboard(InvalidReason::WrongLength {
                preview: preview(text),
            })
        }
        Err(CodeFormatError::NonAlphabetic) => {
            LookupResult::InvalidClipboard(InvalidReason::NonAlphabetic {
                preview: preview(text),
            })
        }
    }
}

/// Normalized clipboard text, shortened to `PREVIEW_LEN`
fn preview(text: &str) -> String {
    ellipsize(&crate::codes::normalize(text), PREVIEW_LEN).into_owned()
}

/// Cut `text` to at most `max` characters, marking the cut with "..."
pub fn ellipsize(text: &str, max: usize) -> Cow<'_, str> {
    if text.chars().count() <= max {
        return Cow::Borrowed(text);
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    Cow::Owned(cut)
}

pub fn render_found(code: &str, description: &str) -> String {
    format!("{code}: {description}")
}

pub fn render_not_found(code: &str) -> String {
    format!("{code}: Code not found")
}

pub fn render_invalid(reason: &InvalidReason) -> String {
    match reason {
        InvalidReason::Empty => "Clipboard is empty.\nCopy a 4-letter code first.".to_string(),
        InvalidReason::WrongLength { preview } => {
            format!("{}\nNeed a 4-letter code.", quote(preview))
        }
        InvalidReason::NonAlphabetic { preview } => {
            format!("{}\nCodes are letters only.", quote(preview))
        }
    }
}

fn quote(preview: &str) -> String {
    if preview.ends_with(ELLIPSIS) {
        format!("Invalid content: '{preview}'")
    } else {
        format!("Invalid code: '{preview}'")
    }
}

pub fn render_unavailable() -> String {
    format!("Clipboard access failed.\n{}", clipboard::remediation_hint())
}

/// Generic popup for an unexpected failure during dispatch
pub fn render_error(message: &str) -> String {
    format!("Error processing clipboard:\n{}", ellipsize(message, ERROR_LEN))
}
