//! Hotkey module for global keyboard event listening
//!
//! Tracks pressed keys from the OS event stream and fires an action when
//! Ctrl+Shift+<calibrated key> is held.

mod hook;
mod keys;
mod listener;
mod matcher;
mod tracker;

#[cfg(test)]
pub(crate) use hook::testing;
pub use hook::{EventHandler, HookFlow, HookHandle, InputEvent, InputHook, RdevHook};
pub use keys::{KeyIdentifier, ModifierFamily};
pub use listener::{HotkeyAction, HotkeyError, HotkeyListener};
pub use matcher::DEBOUNCE_WINDOW;
pub use tracker::{KeyAction, KeyEvent, KeyTracker, PressedKeySet};
