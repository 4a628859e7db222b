//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::calibration::Provenance;
use crate::events::EngineEvent;

/// Requests from the tray to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Show the help popup
    ShowHelp,

    /// Reload the code mapping after it was edited
    Reload,

    /// Toggle the startup welcome popup
    SetShowWelcome { enabled: bool },

    /// Subscribe to engine event notifications
    Subscribe,

    /// Stop the daemon
    Quit,
}

/// Responses from the daemon to the tray
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Request carried out
    Ok,

    /// Code mapping reloaded
    Reloaded { count: usize },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from the daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: EngineEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether the hotkey listener is attached to a live input hook
    pub hotkey_active: bool,

    /// Escaped calibrated key identifier
    pub calibrated_key: String,

    /// Whether the key was detected or is the default guess
    pub calibration: Provenance,

    /// Entries in the current code snapshot
    pub code_count: usize,

    pub show_welcome: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}
