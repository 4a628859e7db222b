//! Transient popups near the pointer
//!
//! `show` never blocks the caller: each popup gets its own thread that opens
//! it on the surface, keeps it up for the configured duration and closes it.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Default time a popup stays visible
pub const POPUP_DURATION: Duration = Duration::from_millis(3000);

/// Distance between the pointer and the popup's top-left corner
pub const POINTER_OFFSET: f64 = 20.0;

/// Screen position of a popup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

/// Last pointer position seen on the input stream
///
/// Written by the hook thread, read when a popup is placed.
#[derive(Debug, Clone, Default)]
pub struct PointerPosition(Arc<Mutex<Option<(f64, f64)>>>);

impl PointerPosition {
    pub fn set(&self, x: f64, y: f64) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some((x, y));
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Popup anchor offset from the pointer; the screen origin if it never moved
    pub fn anchor(&self) -> Anchor {
        let (x, y) = self.last().unwrap_or((0.0, 0.0));
        Anchor {
            x: x + POINTER_OFFSET,
            y: y + POINTER_OFFSET,
        }
    }
}

/// Fire-and-forget popup display
pub trait PopupDisplay: Send + Sync {
    fn show(&self, message: &str, anchor: Anchor);
}

/// Something popups can be drawn on
pub trait PopupSurface: Send + Sync + 'static {
    fn open(&self, id: u64, message: &str, anchor: Anchor);
    fn close(&self, id: u64);
}

/// Popups that close themselves after a fixed duration
pub struct TimedPopup<S> {
    surface: Arc<S>,
    duration: Duration,
    next_id: AtomicU64,
}

impl<S: PopupSurface> TimedPopup<S> {
    pub fn new(surface: S, duration: Duration) -> Self {
        Self {
            surface: Arc::new(surface),
            duration,
            next_id: AtomicU64::new(1),
        }
    }
}

impl<S: PopupSurface> PopupDisplay for TimedPopup<S> {
    fn show(&self, message: &str, anchor: Anchor) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let surface = Arc::clone(&self.surface);
        let duration = self.duration;
        let message = message.to_string();

        let spawned = thread::Builder::new()
            .name(format!("popup-{id}"))
            .spawn(move || {
                surface.open(id, &message, anchor);
                thread::sleep(duration);
                surface.close(id);
            });
        if let Err(e) = spawned {
            warn!(?e, id, "failed to spawn popup thread");
        }
    }
}

/// Draws popups as framed blocks on stderr
#[derive(Debug, Default)]
pub struct TerminalSurface;

impl PopupSurface for TerminalSurface {
    fn open(&self, id: u64, message: &str, anchor: Anchor) {
        debug!(id, x = anchor.x, y = anchor.y, "popup shown");
        let mut stderr = io::stderr().lock();
        if let Err(e) = stderr.write_all(frame(message).as_bytes()) {
            warn!(?e, id, "failed to draw popup");
        }
    }

    fn close(&self, id: u64) {
        debug!(id, "popup dismissed");
    }
}

/// Box-drawn frame around a possibly multi-line message
fn frame(message: &str) -> String {
    let width = message.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = "─".repeat(width + 2);

    let mut out = format!("┌{rule}┐\n");
    for line in message.lines() {
        let pad = width - line.chars().count();
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(pad)));
    }
    out.push_str(&format!("└{rule}┘\n"));
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Display that records what would have been shown
    #[derive(Default)]
    pub struct RecordingPopup {
        pub shown: Mutex<Vec<(String, Anchor)>>,
    }

    impl RecordingPopup {
        pub fn messages(&self) -> Vec<String> {
            self.shown.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    impl PopupDisplay for RecordingPopup {
        fn show(&self, message: &str, anchor: Anchor) {
            self.shown.lock().unwrap().push((message.to_string(), anchor));
        }
    }
}
