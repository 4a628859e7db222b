//! Terminal front-end for the calibration wizard

use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use tracing::warn;

use crate::hotkey::KeyIdentifier;

use super::wizard::{CalibrationPrompt, CloseReply};

/// Drives the wizard over stdin/stderr
pub struct TerminalPrompt {
    listen_window: Duration,
}

impl TerminalPrompt {
    pub fn new(listen_window: Duration) -> Self {
        Self { listen_window }
    }

    fn say(&self, message: &str) {
        let mut stderr = io::stderr().lock();
        if let Err(e) = writeln!(stderr, "{message}") {
            warn!(?e, "failed to write calibration prompt");
        }
    }
}

impl CalibrationPrompt for TerminalPrompt {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn listening(&mut self) {
        self.say(&format!(
            "Hotkey setup: press Ctrl+Shift+L now ({}s)...",
            self.listen_window.as_secs()
        ));
    }

    fn detected(&mut self, key: &KeyIdentifier) {
        self.say(&format!("Detected key: {key}"));
    }

    fn closed_without_key(&mut self) -> CloseReply {
        self.say("No key detected. Exit without setting up the hotkey? [y/N]");

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            // EOF: nobody left to answer
            Ok(0) => CloseReply::Abort,
            Ok(_) => parse_reply(&answer),
            Err(e) => {
                warn!(?e, "failed to read calibration answer");
                CloseReply::Abort
            }
        }
    }
}

/// Only an explicit yes aborts
fn parse_reply(answer: &str) -> CloseReply {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => CloseReply::Abort,
        _ => CloseReply::Retry,
    }
}
