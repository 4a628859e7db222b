use std::path::PathBuf;

use thiserror::Error;

use crate::hotkey::HotkeyError;

use super::escape::EscapeError;

#[derive(Error, Debug)]
pub enum CalibrationError {
    /// The user declined to finish setup; startup must stop
    #[error("hotkey setup was aborted by the user")]
    Aborted,

    #[error("failed to access calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("calibration file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("calibrated key cannot be decoded: {0}")]
    Escape(#[from] EscapeError),

    #[error("cannot listen for the calibration key: {0}")]
    Hook(#[from] HotkeyError),

    #[error("cannot {action} while the wizard is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}
