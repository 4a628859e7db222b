//! Engine events
//!
//! Broadcast from the hook thread and the control channel to subscribed
//! tray clients.

use serde::{Deserialize, Serialize};

use crate::dispatch::LookupKind;

/// Events emitted while the daemon runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Hotkey matched and cleared debounce
    HotkeyTriggered,

    /// Dispatch finished
    LookupCompleted {
        kind: LookupKind,
        /// Normalized code, if the clipboard held one
        code: Option<String>,
    },

    /// Code mapping was swapped for a fresh snapshot
    CodesReloaded { count: usize },
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::HotkeyTriggered => write!(f, "HOTKEY_TRIGGERED"),
            EngineEvent::LookupCompleted { kind, code } => match code {
                Some(code) => write!(f, "LOOKUP_COMPLETED ({kind:?} {code})"),
                None => write!(f, "LOOKUP_COMPLETED ({kind:?})"),
            },
            EngineEvent::CodesReloaded { count } => write!(f, "CODES_RELOADED ({count})"),
        }
    }
}
