//! Daemon-wide state shared with the tray

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info};

use crate::calibration::CalibrationRecord;
use crate::config::Preferences;
use crate::dispatch::Dispatcher;
use crate::events::EngineEvent;
use crate::hotkey::HotkeyListener;
use crate::ipc::{DaemonStatus, TrayActions};

/// Popup shown once the listener is up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    Welcome,
    /// Help popup, doubling as a check that popups work
    Help,
}

/// Pick the popup shown once the listener is up
///
/// On the very first run the welcome was already shown ahead of
/// calibration, so nothing follows it.
pub fn choose_greeting(
    first_run: bool,
    fresh_calibration: bool,
    show_welcome: bool,
) -> Option<Greeting> {
    if first_run {
        None
    } else if fresh_calibration || show_welcome {
        Some(Greeting::Welcome)
    } else {
        Some(Greeting::Help)
    }
}

pub struct App {
    dispatcher: Arc<Dispatcher>,
    listener: Arc<HotkeyListener>,
    calibration: CalibrationRecord,
    preferences: Mutex<Preferences>,
    preferences_path: PathBuf,
    events: broadcast::Sender<EngineEvent>,
    started: Instant,
    quit: Notify,
}

impl App {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        listener: Arc<HotkeyListener>,
        calibration: CalibrationRecord,
        preferences: Preferences,
        preferences_path: PathBuf,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            dispatcher,
            listener,
            calibration,
            preferences: Mutex::new(preferences),
            preferences_path,
            events,
            started: Instant::now(),
            quit: Notify::new(),
        }
    }

    /// Show the configured startup popup
    pub fn greet(&self, greeting: Greeting) {
        debug!(?greeting, "showing startup popup");
        match greeting {
            Greeting::Welcome => self.dispatcher.show_welcome(),
            Greeting::Help => self.dispatcher.show_help(),
        }
    }

    /// Resolves once the tray asked the daemon to quit
    pub async fn quit_requested(&self) {
        self.quit.notified().await;
    }

    fn preferences(&self) -> std::sync::MutexGuard<'_, Preferences> {
        self.preferences.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TrayActions for App {
    fn status(&self) -> DaemonStatus {
        DaemonStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hotkey_active: self.listener.is_running(),
            calibrated_key: self.calibration.key.escaped(),
            calibration: self.calibration.provenance,
            code_count: self.dispatcher.codes().len(),
            show_welcome: self.preferences().show_welcome,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    fn show_help(&self) {
        self.dispatcher.show_help();
    }

    fn reload(&self) -> Result<usize> {
        let count = self
            .dispatcher
            .codes()
            .reload()
            .context("failed to reload codes")?;
        let _ = self.events.send(EngineEvent::CodesReloaded { count });
        Ok(count)
    }

    fn set_show_welcome(&self, enabled: bool) -> Result<()> {
        let mut preferences = self.preferences();
        let updated = Preferences {
            show_welcome: enabled,
        };
        updated.save(&self.preferences_path)?;
        *preferences = updated;
        info!(enabled, "welcome popup preference updated");
        Ok(())
    }

    fn quit(&self) {
        // Stores a permit if nobody is waiting yet
        self.quit.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;
    use crate::calibration::Provenance;
    use crate::codes::JsonCodeStore;
    use crate::codes::CodeBook;
    use crate::dispatch::{Anchor, PointerPosition, PopupDisplay, SystemClipboard};
    use crate::hotkey::testing::ManualHook;
    use crate::hotkey::{KeyIdentifier, DEBOUNCE_WINDOW};

    struct Silent;

    impl PopupDisplay for Silent {
        fn show(&self, _message: &str, _anchor: Anchor) {}
    }

    fn app(dir: &tempfile::TempDir) -> (App, broadcast::Receiver<EngineEvent>) {
        let codes_path = dir.path().join("bird codes.json");
        let codes = Arc::new(CodeBook::open(Box::new(JsonCodeStore::new(codes_path))));
        let (events, rx) = broadcast::channel(16);
        let pointer = PointerPosition::default();
        let dispatcher = Arc::new(Dispatcher::new(
            Box::new(SystemClipboard),
            codes,
            Arc::new(Silent),
            pointer.clone(),
            events.clone(),
        ));
        let listener = Arc::new(HotkeyListener::new(
            ManualHook::new(),
            KeyIdentifier::default_hotkey(),
            DEBOUNCE_WINDOW,
            dispatcher.clone(),
            pointer,
        ));
        listener.start().unwrap();
        let app = App::new(
            dispatcher,
            listener,
            CalibrationRecord::fallback(),
            Preferences::default(),
            dir.path().join("app_config.json"),
            events,
        );
        (app, rx)
    }

    #[test]
    fn test_choose_greeting() {
        // Welcome already shown before calibration
        assert_eq!(choose_greeting(true, true, true), None);
        assert_eq!(choose_greeting(true, false, false), None);
        assert_eq!(choose_greeting(false, true, false), Some(Greeting::Welcome));
        assert_eq!(choose_greeting(false, false, true), Some(Greeting::Welcome));
        assert_eq!(choose_greeting(false, false, false), Some(Greeting::Help));
    }

    #[test]
    fn test_status() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _rx) = app(&dir);

        let status = app.status();
        assert!(status.hotkey_active);
        assert_eq!(status.calibrated_key, "KeyL");
        assert_eq!(status.calibration, Provenance::DefaultFallback);
        // Sample codes written on first load
        assert_eq!(status.code_count, 2);
    }

    #[test]
    fn test_reload_picks_up_edits() {
        let dir = tempfile::tempdir().unwrap();
        let (app, mut rx) = app(&dir);

        fs::write(
            dir.path().join("bird codes.json"),
            r#"{"AMRO": "American Robin", "BLJA": "Blue Jay", "AMCR": "American Crow"}"#,
        )
        .unwrap();

        assert_eq!(app.reload().unwrap(), 3);
        assert_eq!(app.status().code_count, 3);
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::CodesReloaded { count: 3 });
    }

    #[test]
    fn test_show_welcome_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _rx) = app(&dir);

        app.set_show_welcome(false).unwrap();
        assert!(!app.status().show_welcome);
        let saved = Preferences::load(&dir.path().join("app_config.json")).unwrap();
        assert!(!saved.show_welcome);
    }

    #[test]
    fn test_quit_before_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _rx) = app(&dir);

        app.quit();
        tokio_test::block_on(async {
            tokio::time::timeout(Duration::from_secs(1), app.quit_requested())
                .await
                .unwrap();
        });
    }
}
