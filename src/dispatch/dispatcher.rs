//! Action dispatcher
//!
//! Runs on the hook thread when the hotkey fires: clipboard, lookup, popup.
//! Whatever happens, the outcome is a popup; nothing unwinds into the hook.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::codes::CodeBook;
use crate::events::EngineEvent;
use crate::hotkey::HotkeyAction;

use super::clipboard::ClipboardSource;
use super::lookup::{classify, render_error, LookupKind, LookupResult};
use super::popup::{PointerPosition, PopupDisplay};

/// Shown on demand from the tray and as the startup liveness check
pub const HELP_MESSAGE: &str = "Bird Code Decode\n\nHotkey: Ctrl+Shift+L\n\nCopy a 4-letter bird code to clipboard\nthen press the hotkey.";

/// Shown on first run, after calibration, or when enabled in preferences
pub const WELCOME_MESSAGE: &str = "Welcome to Bird Code Decode!\n\n\
1. Copy a 4-letter bird code to your clipboard\n\
2. Press Ctrl+Shift+L\n\
3. A popup shows the full bird name";

/// Unexpected failure while dispatching
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch panicked: {0}")]
    Panicked(String),
}

pub struct Dispatcher {
    clipboard: Box<dyn ClipboardSource>,
    codes: Arc<CodeBook>,
    popup: Arc<dyn PopupDisplay>,
    pointer: PointerPosition,
    events: broadcast::Sender<EngineEvent>,
}

impl Dispatcher {
    pub fn new(
        clipboard: Box<dyn ClipboardSource>,
        codes: Arc<CodeBook>,
        popup: Arc<dyn PopupDisplay>,
        pointer: PointerPosition,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            clipboard,
            codes,
            popup,
            pointer,
            events,
        }
    }

    /// Classify the current clipboard against the current code snapshot
    pub fn lookup(&self) -> LookupResult {
        match self.clipboard.read_text() {
            Ok(text) => classify(&text, &self.codes.snapshot()),
            Err(e) => {
                warn!(error = %e, "clipboard read failed");
                LookupResult::ClipboardUnavailable
            }
        }
    }

    /// Look up the clipboard and show the outcome
    ///
    /// A panic anywhere in lookup or rendering is contained and shown as a
    /// generic processing error.
    pub fn dispatch(&self) -> Result<LookupResult, DispatchError> {
        self.emit(EngineEvent::HotkeyTriggered);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let result = self.lookup();
            self.show_message(&result.render());
            result
        }));

        match outcome {
            Ok(result) => {
                if let LookupResult::InvalidClipboard(reason) = &result {
                    debug!(reason = reason.as_str(), "clipboard content rejected");
                }
                info!(kind = ?result.kind(), code = ?result.code(), "lookup complete");
                self.emit(EngineEvent::LookupCompleted {
                    kind: result.kind(),
                    code: result.code().map(str::to_string),
                });
                Ok(result)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%message, "dispatch panicked");
                let fallback = render_error(&message);
                if panic::catch_unwind(AssertUnwindSafe(|| self.show_message(&fallback))).is_err() {
                    error!("error popup panicked as well");
                }
                self.emit(EngineEvent::LookupCompleted {
                    kind: LookupKind::Error,
                    code: None,
                });
                Err(DispatchError::Panicked(message))
            }
        }
    }

    /// Manual test popup
    pub fn show_help(&self) {
        self.show_message(HELP_MESSAGE);
    }

    pub fn show_welcome(&self) {
        self.show_message(WELCOME_MESSAGE);
    }

    /// Show a popup next to the pointer
    pub fn show_message(&self, message: &str) {
        self.popup.show(message, self.pointer.anchor());
    }

    pub fn codes(&self) -> &Arc<CodeBook> {
        &self.codes
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}

impl HotkeyAction for Dispatcher {
    fn trigger(&self) {
        if let Err(e) = self.dispatch() {
            warn!(error = %e, "hotkey dispatch failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}
