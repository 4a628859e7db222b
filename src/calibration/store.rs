//! Persisted calibration record
//!
//! The calibration file is a small JSON object:
//!
//! ```json
//! { "hotkey_code": "Unknown(46)", "provenance": "detected" }
//! ```
//!
//! `hotkey_code` holds the escaped identifier (see `escape`). Files written
//! before provenance was recorded are read as `detected`; their single
//! character codes (`"l"`, `"\\x0c"`) are translated to backend key names,
//! and codes with no backend equivalent are treated as no calibration.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::hotkey::KeyIdentifier;

use super::error::CalibrationError;
use super::escape;

/// Where the calibrated key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Captured by the calibration wizard
    Detected,
    /// Guessed because calibration produced nothing
    DefaultFallback,
}

impl Default for Provenance {
    fn default() -> Self {
        Self::Detected
    }
}

/// The calibrated hotkey and how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationRecord {
    pub key: KeyIdentifier,
    pub provenance: Provenance,
}

impl CalibrationRecord {
    pub fn detected(key: KeyIdentifier) -> Self {
        Self {
            key,
            provenance: Provenance::Detected,
        }
    }

    /// Record used when no calibration is available
    pub fn fallback() -> Self {
        Self {
            key: KeyIdentifier::default_hotkey(),
            provenance: Provenance::DefaultFallback,
        }
    }
}

/// On-disk form
#[derive(Debug, Serialize, Deserialize)]
struct CalibrationFile {
    hotkey_code: String,
    #[serde(default)]
    provenance: Provenance,
}

/// Reads and writes the calibration file
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    #[cfg(test)]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the record; `None` if no usable calibration has been saved
    pub fn load(&self) -> Result<Option<CalibrationRecord>, CalibrationError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "no calibration file");
                return Ok(None);
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let file: CalibrationFile =
            serde_json::from_str(&contents).map_err(|e| CalibrationError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if file.hotkey_code.is_empty() {
            return Ok(None);
        }

        let saved = KeyIdentifier::new(escape::decode(&file.hotkey_code)?);
        let Some(key) = saved.to_backend() else {
            warn!(path = ?self.path, key = %saved, "saved hotkey can never be reported, calibrating again");
            return Ok(None);
        };
        if key != saved {
            info!(from = %saved, to = %key, "translated legacy hotkey code");
        }

        Ok(Some(CalibrationRecord {
            key,
            provenance: file.provenance,
        }))
    }

    /// Persist the record, replacing any previous file
    pub fn save(&self, record: &CalibrationRecord) -> Result<(), CalibrationError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let file = CalibrationFile {
            hotkey_code: record.key.escaped(),
            provenance: record.provenance,
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| CalibrationError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        info!(path = ?self.path, key = %record.key, provenance = ?record.provenance, "calibration saved");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> CalibrationError {
        CalibrationError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CalibrationStore {
        CalibrationStore::new(dir.path().join("hotkey_config.json"))
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.exists());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_round_trip_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let record = CalibrationRecord::detected(KeyIdentifier::new("Unknown(46)"));

        store.save(&record).unwrap();

        // A fresh store stands in for a process restart
        let reloaded = store_in(&dir).load().unwrap();
        assert_eq!(reloaded, Some(record));
    }

    #[test]
    fn test_round_trip_keeps_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&CalibrationRecord::fallback()).unwrap();

        let reloaded = store.load().unwrap().unwrap();
        assert_eq!(reloaded.provenance, Provenance::DefaultFallback);
        assert_eq!(reloaded.key, KeyIdentifier::default_hotkey());
    }

    #[test]
    fn test_file_contains_escaped_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&CalibrationRecord::detected(KeyIdentifier::new("\u{c}")))
            .unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(contents.contains(r#""hotkey_code": "\\u{c}""#));
        assert!(!contents.contains('\u{c}'));
    }

    #[test]
    fn test_legacy_file_without_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"hotkey_code": "\\x0c"}"#).unwrap();

        let record = store.load().unwrap().unwrap();
        assert_eq!(record.key, KeyIdentifier::new("KeyL"));
        assert_eq!(record.provenance, Provenance::Detected);
    }

    #[test]
    fn test_legacy_letter_maps_to_key_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"hotkey_code": "l"}"#).unwrap();

        let record = store.load().unwrap().unwrap();
        assert_eq!(record.key, KeyIdentifier::new("KeyL"));
    }

    #[test]
    fn test_unreportable_key_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"hotkey_code": "\u{e9}"}"#).unwrap();

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_empty_code_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"hotkey_code": ""}"#).unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(CalibrationError::Corrupt { .. })));
    }
}
