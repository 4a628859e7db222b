//! birdcode: decode 4-letter bird codes from the clipboard with a global hotkey
//!
//! The daemon:
//! - calibrates Ctrl+Shift+L for the local keyboard on first run
//! - listens for the hotkey on the OS input hook thread
//! - looks the clipboard up in the code mapping and shows a popup
//! - serves a Unix socket for the tray menu

mod app;
mod calibration;
mod codes;
mod config;
mod dispatch;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{choose_greeting, App};
use crate::calibration::{CalibrationError, CalibrationStore, TerminalPrompt, WizardTiming};
use crate::codes::{CodeBook, JsonCodeStore};
use crate::config::{Config, Preferences};
use crate::dispatch::{Dispatcher, PointerPosition, SystemClipboard, TerminalSurface, TimedPopup};
use crate::events::EngineEvent;
use crate::hotkey::{HotkeyListener, InputHook, RdevHook};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;

fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "birdcode starting");

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;
    config.ensure_dirs()?;
    info!(data_dir = ?config.data_dir, "configuration loaded");

    // Checked before anything below writes to the data dir
    let first_run = config.is_first_run();

    let codes = Arc::new(CodeBook::open(Box::new(JsonCodeStore::new(
        config.codes_path.clone(),
    ))));

    let hook: Arc<dyn InputHook> = RdevHook::global();

    // Dispatcher -> tray subscribers
    let (event_tx, _event_rx) = broadcast::channel::<EngineEvent>(64);

    let pointer = PointerPosition::default();
    let popup = Arc::new(TimedPopup::new(TerminalSurface, config.popup_duration));
    let dispatcher = Arc::new(Dispatcher::new(
        Box::new(SystemClipboard),
        codes,
        popup,
        pointer.clone(),
        event_tx.clone(),
    ));

    // A new user is greeted before being asked to press the hotkey
    if first_run {
        dispatcher.show_welcome();
    }

    // Calibration runs on this thread before the listener exists
    let calibration = {
        let store = CalibrationStore::new(config.calibration_path.clone());
        let timing = WizardTiming {
            listen_window: config.calibration_listen_window,
            retry_delay: config.calibration_retry_delay,
        };
        let mut prompt = TerminalPrompt::new(config.calibration_listen_window);
        match calibration::resolve(&store, Arc::clone(&hook), &mut prompt, timing, config.recalibrate) {
            Ok(calibration) => calibration,
            Err(CalibrationError::Aborted) => {
                error!("hotkey setup was aborted, exiting");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e).context("failed to calibrate hotkey"),
        }
    };

    let preferences = Preferences::load(&config.preferences_path).unwrap_or_else(|e| {
        warn!(error = %e, "using default preferences");
        Preferences::default()
    });

    // Start the hotkey listener (runs on the input hook thread)
    let listener = Arc::new(HotkeyListener::new(
        hook,
        calibration.record.key.clone(),
        config.debounce,
        dispatcher.clone(),
        pointer,
    ));
    listener
        .start()
        .context("failed to start hotkey listener, check input monitoring permissions")?;

    let app = Arc::new(App::new(
        dispatcher,
        Arc::clone(&listener),
        calibration.record.clone(),
        preferences,
        config.preferences_path.clone(),
        event_tx.clone(),
    ));
    if let Some(greeting) = choose_greeting(first_run, calibration.fresh, preferences.show_welcome) {
        app.greet(greeting);
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(serve(&config, app, event_tx));

    // Cleanup
    listener.stop();
    info!("birdcode stopped");

    result.map(|()| ExitCode::SUCCESS)
}

/// Serve the tray until a signal or a quit request
async fn serve(config: &Config, app: Arc<App>, events: broadcast::Sender<EngineEvent>) -> Result<()> {
    let mut shutdown = ShutdownSignal::new()?;
    let server = Server::new(&config.socket_path, app.clone(), events)?;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = app.quit_requested() => {
            info!("quit requested");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");
    server.shutdown().await;

    Ok(())
}
