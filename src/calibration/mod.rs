//! Hotkey calibration
//!
//! Detects, persists and restores the key identifier the local keyboard
//! reports for Ctrl+Shift+L.

mod error;
pub mod escape;
mod prompt;
mod store;
mod wizard;

use std::sync::Arc;

use tracing::{info, warn};

use crate::hotkey::InputHook;

pub use error::CalibrationError;
pub use prompt::TerminalPrompt;
pub use store::{CalibrationRecord, CalibrationStore, Provenance};
pub use wizard::{run_wizard, CalibrationPrompt, WizardTiming};

/// Result of resolving the calibration at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    pub record: CalibrationRecord,
    /// The wizard ran during this startup
    pub fresh: bool,
}

/// Load the saved calibration, running the wizard when there is none
///
/// Falls back to the default key (marked `DefaultFallback`, not persisted)
/// only when the wizard produced nothing. A user abort is returned as
/// `CalibrationError::Aborted` and never falls back.
pub fn resolve(
    store: &CalibrationStore,
    hook: Arc<dyn InputHook>,
    prompt: &mut dyn CalibrationPrompt,
    timing: WizardTiming,
    force: bool,
) -> Result<Calibration, CalibrationError> {
    if !force {
        match store.load() {
            Ok(Some(record)) => {
                info!(key = %record.key, provenance = ?record.provenance, "calibration loaded");
                return Ok(Calibration {
                    record,
                    fresh: false,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable calibration file"),
        }
    }

    match run_wizard(hook, store, prompt, timing) {
        Ok(Some(record)) => Ok(Calibration {
            record,
            fresh: true,
        }),
        Ok(None) => {
            let record = CalibrationRecord::fallback();
            warn!(key = %record.key, "calibration produced nothing, using default key");
            Ok(Calibration {
                record,
                fresh: true,
            })
        }
        Err(CalibrationError::Hook(e)) => {
            let record = CalibrationRecord::fallback();
            warn!(error = %e, key = %record.key, "cannot calibrate, using default key");
            Ok(Calibration {
                record,
                fresh: true,
            })
        }
        Err(e) => Err(e),
    }
}
