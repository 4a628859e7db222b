//! Configuration loading and management

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dispatch::POPUP_DURATION;
use crate::hotkey::DEBOUNCE_WINDOW;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding every file below
    pub data_dir: PathBuf,

    /// Code -> description mapping
    pub codes_path: PathBuf,

    /// Calibrated hotkey
    pub calibration_path: PathBuf,

    /// User preferences
    pub preferences_path: PathBuf,

    /// Path to the Unix domain socket for the tray
    pub socket_path: PathBuf,

    pub debounce: Duration,
    pub popup_duration: Duration,
    pub calibration_listen_window: Duration,
    pub calibration_retry_delay: Duration,

    /// Run the calibration wizard even if a calibration exists
    pub recalibrate: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match var("BIRDCODE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = var("HOME").context("neither BIRDCODE_DATA_DIR nor HOME is set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("birdcode")
            }
        };

        let debounce = millis(&var, "BIRDCODE_DEBOUNCE_MS")?.unwrap_or(DEBOUNCE_WINDOW);
        let popup_duration = millis(&var, "BIRDCODE_POPUP_MS")?.unwrap_or(POPUP_DURATION);
        let recalibrate = matches!(var("BIRDCODE_RECALIBRATE").as_deref(), Some("1" | "true"));

        Ok(Self {
            codes_path: data_dir.join("bird codes.json"),
            calibration_path: data_dir.join("hotkey_config.json"),
            preferences_path: data_dir.join("app_config.json"),
            socket_path: data_dir.join("birdcode.sock"),
            data_dir,
            debounce,
            popup_duration,
            calibration_listen_window: Duration::from_secs(10),
            calibration_retry_delay: Duration::from_secs(1),
            recalibrate,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }

    /// Neither a calibration nor preferences were ever written
    pub fn is_first_run(&self) -> bool {
        !self.calibration_path.exists() && !self.preferences_path.exists()
    }
}

fn millis(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    let Some(raw) = var(name) else {
        return Ok(None);
    };
    let ms: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a number of milliseconds, got '{raw}'"))?;
    if ms == 0 {
        bail!("{name} must be greater than zero");
    }
    Ok(Some(Duration::from_millis(ms)))
}

/// Persisted user preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub show_welcome: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { show_welcome: true }
    }
}

impl Preferences {
    /// Read preferences, writing the defaults if the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("invalid preferences in {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let prefs = Self::default();
                prefs.save(path)?;
                Ok(prefs)
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!(show_welcome = self.show_welcome, "preferences saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/birder")])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/home/birder/.local/share/birdcode"));
        assert!(config.codes_path.ends_with("bird codes.json"));
        assert!(config.calibration_path.ends_with("hotkey_config.json"));
        assert!(config.socket_path.ends_with("birdcode.sock"));
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.popup_duration, Duration::from_millis(3000));
        assert!(!config.recalibrate);
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BIRDCODE_DATA_DIR", "/tmp/birds"),
            ("BIRDCODE_POPUP_MS", "1500"),
            ("BIRDCODE_DEBOUNCE_MS", "250"),
            ("BIRDCODE_RECALIBRATE", "1"),
        ]))
        .unwrap();
        assert_eq!(config.preferences_path, PathBuf::from("/tmp/birds/app_config.json"));
        assert_eq!(config.popup_duration, Duration::from_millis(1500));
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert!(config.recalibrate);
    }

    #[test]
    fn test_config_rejects_bad_timing() {
        let vars = [("HOME", "/home/birder"), ("BIRDCODE_DEBOUNCE_MS", "soon")];
        assert!(Config::from_lookup(lookup(&vars)).is_err());
        let vars = [("HOME", "/home/birder"), ("BIRDCODE_POPUP_MS", "0")];
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_config_needs_a_directory() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn test_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();
        let config = Config::from_lookup(lookup(&[("BIRDCODE_DATA_DIR", data_dir.as_str())])).unwrap();
        assert!(config.is_first_run());

        Preferences::load(&config.preferences_path).unwrap();
        assert!(!config.is_first_run());
    }

    #[test]
    fn test_preferences_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_config.json");

        assert_eq!(Preferences::load(&path).unwrap(), Preferences { show_welcome: true });

        Preferences { show_welcome: false }.save(&path).unwrap();
        assert!(!Preferences::load(&path).unwrap().show_welcome);
    }
}
