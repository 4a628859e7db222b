//! Hotkey action: clipboard lookup and popup display

mod clipboard;
mod dispatcher;
mod lookup;
mod popup;

pub use clipboard::{ClipboardError, ClipboardSource, SystemClipboard};
pub use dispatcher::{DispatchError, Dispatcher, HELP_MESSAGE, WELCOME_MESSAGE};
pub use lookup::{classify, InvalidReason, LookupKind, LookupResult};
pub use popup::{Anchor, PointerPosition, PopupDisplay, PopupSurface, TerminalSurface, TimedPopup, POPUP_DURATION};
