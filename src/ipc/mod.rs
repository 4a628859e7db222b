//! IPC module for daemon-tray communication

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::{Server, TrayActions};
