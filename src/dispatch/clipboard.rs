//! Clipboard access

/// Clipboard could not be read at all
#[derive(Debug, thiserror::Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Source of clipboard text
pub trait ClipboardSource: Send + Sync {
    /// Current clipboard text; non-text content reads as empty
    fn read_text(&self) -> Result<String, ClipboardError>;
}

/// OS clipboard via arboard
///
/// A new handle is opened per read: the clipboard owner may change between
/// hotkey presses and handles are not shareable across threads on every
/// platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardSource for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| ClipboardError(e.to_string()))?;
        match clipboard.get_text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError(e.to_string())),
        }
    }
}

/// What the user can do when the clipboard is unavailable
///
/// On Linux arboard talks to the X11 selection directly, so a Wayland
/// desktop needs XWayland.
pub fn remediation_hint() -> &'static str {
    if cfg!(target_os = "linux") {
        "On Linux, set DISPLAY to a running X server.\nOn Wayland, enable XWayland."
    } else if cfg!(target_os = "macos") {
        "On macOS, check that the pboard service is running."
    } else if cfg!(target_os = "windows") {
        "On Windows, close apps holding the clipboard open."
    } else {
        "Please try again."
    }
}
