//! Global hotkey listener lifecycle
//!
//! Owns the per-run hotkey state (pressed keys, debounce) and attaches it to
//! the input hook. All matching and dispatching happens inline on the hook
//! thread: it is the single producer of key events, so the state needs no
//! locking. `start()` builds fresh state, `stop()` drops it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dispatch::PointerPosition;

use super::hook::{HookFlow, HookHandle, InputEvent, InputHook};
use super::keys::KeyIdentifier;
use super::matcher::CombinationMatcher;
use super::tracker::{KeyAction, KeyTracker};

/// Action run on the hook thread when the hotkey fires
///
/// Implementations must not panic out and must return in bounded time.
pub trait HotkeyAction: Send + Sync {
    fn trigger(&self);
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("failed to attach input hook: {0}")]
    Hook(String),

    #[error("calibrated key '{0}' is a modifier and cannot complete Ctrl+Shift")]
    ModifierAsHotkey(KeyIdentifier),
}

/// Global hotkey listener for Ctrl+Shift+<calibrated key>
pub struct HotkeyListener {
    hook: Arc<dyn InputHook>,
    hotkey: KeyIdentifier,
    debounce: Duration,
    action: Arc<dyn HotkeyAction>,
    pointer: PointerPosition,
    handle: Mutex<Option<HookHandle>>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(
        hook: Arc<dyn InputHook>,
        hotkey: KeyIdentifier,
        debounce: Duration,
        action: Arc<dyn HotkeyAction>,
        pointer: PointerPosition,
    ) -> Self {
        Self {
            hook,
            hotkey,
            debounce,
            action,
            pointer,
            handle: Mutex::new(None),
        }
    }

    /// Start receiving key events
    ///
    /// Idempotent: calling it while already running is a no-op. Fails if the
    /// OS hook cannot be attached or has stopped delivering events.
    pub fn start(&self) -> Result<(), HotkeyError> {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(HookHandle::is_attached) {
            if self.hook.is_alive() {
                debug!("hotkey listener already running");
                return Ok(());
            }
            // Attached to a hook whose thread is gone
            *handle = None;
            warn!("input hook died under a running hotkey listener");
            return Err(HotkeyError::Hook("input hook thread has exited".to_string()));
        }

        let mut engine = HotkeyEngine {
            tracker: KeyTracker::new(),
            matcher: CombinationMatcher::new(self.hotkey.clone(), self.debounce)?,
            action: Arc::clone(&self.action),
            pointer: self.pointer.clone(),
        };

        *handle = Some(self.hook.attach(Box::new(move |event| engine.handle(event)))?);
        info!(hotkey = %self.hotkey, "hotkey listener started");
        Ok(())
    }

    /// Stop the hotkey listener
    ///
    /// Safe to call repeatedly and during shutdown. A dispatch already in
    /// progress completes before this returns.
    pub fn stop(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.detach();
            info!("hotkey listener stopped");
        }
    }

    /// Check if the listener is attached and the OS hook is alive
    pub fn is_running(&self) -> bool {
        self.hook.is_alive()
            && self
                .handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .is_some_and(HookHandle::is_attached)
    }
}

/// Per-run state, owned by the hook handler closure
struct HotkeyEngine {
    tracker: KeyTracker,
    matcher: CombinationMatcher,
    action: Arc<dyn HotkeyAction>,
    pointer: PointerPosition,
}

impl HotkeyEngine {
    fn handle(&mut self, event: &InputEvent) -> HookFlow {
        match event {
            InputEvent::Key(key_event) => {
                self.tracker.apply(key_event);
                if key_event.action == KeyAction::Pressed
                    && self.matcher.on_press(self.tracker.pressed(), Instant::now())
                {
                    debug!(hotkey = %self.matcher.hotkey(), "hotkey matched");
                    self.action.trigger();
                }
            }
            InputEvent::PointerMoved { x, y } => self.pointer.set(*x, *y),
        }
        HookFlow::Continue
    }
}
