//! Calibration wizard state machine
//!
//! Detects which key identifier the local OS and layout report for the
//! user's "L" when pressed with Ctrl and Shift.
//!
//! ```text
//!  Idle ──start──► Listening ──key captured──► Detected ──save──► Saved
//!                   │    ▲
//!        close(Retry)    └───────start──── Retry
//!                   │
//!        close(Abort)──► Aborted
//! ```
//!
//! Listening attaches a private capture handler to the input hook. The
//! handler detaches itself on the same event that completes the chord, so
//! no later key is ever captured. It shares nothing with the main listener.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::hotkey::{
    EventHandler, HookFlow, HookHandle, InputEvent, InputHook, KeyAction, KeyIdentifier,
    KeyTracker, ModifierFamily, PressedKeySet,
};

use super::error::CalibrationError;
use super::store::{CalibrationRecord, CalibrationStore};

/// Wizard states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    Idle,
    Listening,
    Detected(KeyIdentifier),
    Saved(KeyIdentifier),
    Retry,
    Aborted,
}

impl WizardState {
    fn name(&self) -> &'static str {
        match self {
            WizardState::Idle => "idle",
            WizardState::Listening => "listening",
            WizardState::Detected(_) => "detected",
            WizardState::Saved(_) => "saved",
            WizardState::Retry => "retrying",
            WizardState::Aborted => "aborted",
        }
    }
}

/// The front-end's answer when the wizard is closed before detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReply {
    /// Keep going: listen again after the retry delay
    Retry,
    /// The user confirmed they want to exit without a hotkey
    Abort,
}

/// Check if `key`, just pressed, completes Ctrl+Shift+<non-modifier>
pub fn completes_chord(pressed: &PressedKeySet, key: &KeyIdentifier) -> bool {
    !key.is_modifier()
        && pressed.contains(key)
        && pressed.has_family(ModifierFamily::Ctrl)
        && pressed.has_family(ModifierFamily::Shift)
}

/// An attached capture handler and its result channel
struct Capture {
    handle: HookHandle,
    detected_rx: Receiver<KeyIdentifier>,
}

/// One-shot calibration procedure
pub struct CalibrationWizard {
    hook: Arc<dyn InputHook>,
    state: WizardState,
    capture: Option<Capture>,
}

impl CalibrationWizard {
    pub fn new(hook: Arc<dyn InputHook>) -> Self {
        Self {
            hook,
            state: WizardState::Idle,
            capture: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Begin listening for the chord (`Idle` or `Retry` -> `Listening`)
    pub fn start(&mut self) -> Result<(), CalibrationError> {
        if !matches!(self.state, WizardState::Idle | WizardState::Retry) {
            return Err(self.invalid("start listening"));
        }

        let (detected_tx, detected_rx) = mpsc::channel();
        let handle = self.hook.attach(capture_handler(detected_tx))?;
        self.capture = Some(Capture {
            handle,
            detected_rx,
        });
        self.state = WizardState::Listening;
        info!("calibration listening for Ctrl+Shift+L");
        Ok(())
    }

    /// Wait up to `timeout` for the chord (`Listening` -> `Detected`)
    pub fn wait(&mut self, timeout: Duration) -> &WizardState {
        if self.state != WizardState::Listening {
            return &self.state;
        }
        let Some(capture) = &self.capture else {
            return &self.state;
        };

        match capture.detected_rx.recv_timeout(timeout) {
            Ok(key) => {
                info!(key = %key, "calibration key detected");
                self.capture = None;
                self.state = WizardState::Detected(key);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Handler dropped without reporting (it panicked)
                warn!("calibration capture ended without a key");
                self.capture = None;
                self.state = WizardState::Retry;
            }
        }
        &self.state
    }

    /// The user closed the wizard before a key was detected
    ///
    /// `Retry` moves to `Retry`; `Abort` moves to `Aborted` and returns
    /// `CalibrationError::Aborted`. Closing after detection is a no-op, and
    /// a key captured while the front-end was asking wins over the reply.
    pub fn close(&mut self, reply: CloseReply) -> Result<(), CalibrationError> {
        match self.state {
            WizardState::Detected(_) | WizardState::Saved(_) => return Ok(()),
            WizardState::Aborted => return Err(CalibrationError::Aborted),
            _ => {}
        }

        if let Some(capture) = self.capture.take() {
            capture.handle.detach();
            if let Ok(key) = capture.detected_rx.try_recv() {
                info!(key = %key, ?reply, "calibration key detected before close");
                self.state = WizardState::Detected(key);
                return Ok(());
            }
        }

        match reply {
            CloseReply::Retry => {
                debug!("calibration closed without a key, will retry");
                self.state = WizardState::Retry;
                Ok(())
            }
            CloseReply::Abort => {
                warn!("calibration aborted by user");
                self.state = WizardState::Aborted;
                Err(CalibrationError::Aborted)
            }
        }
    }

    /// Persist the detected key (`Detected` -> `Saved`)
    pub fn save(&mut self, store: &CalibrationStore) -> Result<CalibrationRecord, CalibrationError> {
        let WizardState::Detected(key) = &self.state else {
            return Err(self.invalid("save"));
        };

        let record = CalibrationRecord::detected(key.clone());
        store.save(&record)?;
        self.state = WizardState::Saved(record.key.clone());
        Ok(record)
    }

    fn invalid(&self, action: &'static str) -> CalibrationError {
        CalibrationError::InvalidState {
            action,
            state: self.state.name(),
        }
    }
}

fn capture_handler(detected_tx: Sender<KeyIdentifier>) -> EventHandler {
    let mut tracker = KeyTracker::new();
    Box::new(move |event| {
        let InputEvent::Key(key_event) = event else {
            return HookFlow::Continue;
        };
        tracker.apply(key_event);

        if key_event.action == KeyAction::Pressed && completes_chord(tracker.pressed(), &key_event.key) {
            let _ = detected_tx.send(key_event.key.clone());
            return HookFlow::Stop;
        }
        HookFlow::Continue
    })
}

/// View layer that drives the wizard
pub trait CalibrationPrompt {
    /// Whether a user is present to answer; if not, calibration produces nothing
    fn is_interactive(&self) -> bool;

    /// Listening has (re)started
    fn listening(&mut self);

    /// A key was captured
    fn detected(&mut self, key: &KeyIdentifier);

    /// The listen window elapsed; ask the user whether to exit without a hotkey
    fn closed_without_key(&mut self) -> CloseReply;
}

/// Timing of the wizard loop
#[derive(Debug, Clone, Copy)]
pub struct WizardTiming {
    /// How long one listening attempt lasts before the front-end is asked
    pub listen_window: Duration,
    /// Pause before listening again after a retry
    pub retry_delay: Duration,
}

/// Run the wizard to completion
///
/// Returns `Ok(None)` when calibration produced nothing (no interactive user),
/// and `Err(CalibrationError::Aborted)` when the user declined setup.
pub fn run_wizard(
    hook: Arc<dyn InputHook>,
    store: &CalibrationStore,
    prompt: &mut dyn CalibrationPrompt,
    timing: WizardTiming,
) -> Result<Option<CalibrationRecord>, CalibrationError> {
    if !prompt.is_interactive() {
        info!("no interactive session, skipping calibration");
        return Ok(None);
    }

    let mut wizard = CalibrationWizard::new(hook);
    loop {
        wizard.start()?;
        prompt.listening();

        if wizard.wait(timing.listen_window) == &WizardState::Listening {
            let reply = prompt.closed_without_key();
            wizard.close(reply)?;
        }

        if let WizardState::Detected(key) = wizard.state() {
            prompt.detected(key);
            return wizard.save(store).map(Some);
        }
        thread::sleep(timing.retry_delay);
    }
}
