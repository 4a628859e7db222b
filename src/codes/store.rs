//! Code mapping persistence
//!
//! The mapping lives in a JSON object file keyed by uppercase 4-letter codes.
//! A missing file is created with sample entries so the tool works out of
//! the box.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{info, warn};

use super::code::parse_code;

/// Code -> description, sorted by code
pub type CodeMap = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum CodeStoreError {
    #[error("failed to access code file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("code file {path} is not a JSON object of strings: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load/save contract of the mapping store
pub trait CodeStore: Send + Sync {
    fn load(&self) -> Result<CodeMap, CodeStoreError>;
    fn save(&self, codes: &CodeMap) -> Result<(), CodeStoreError>;
}

/// Entries written when no code file exists yet
pub fn sample_codes() -> CodeMap {
    CodeMap::from([
        ("ABCD".to_string(), "Sample code description".to_string()),
        ("TEST".to_string(), "This is a test code".to_string()),
    ])
}

/// JSON file backed store
#[derive(Debug, Clone)]
pub struct JsonCodeStore {
    path: PathBuf,
}

impl JsonCodeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CodeStoreError {
        CodeStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CodeStore for JsonCodeStore {
    fn load(&self) -> Result<CodeMap, CodeStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let sample = sample_codes();
                info!(path = ?self.path, "code file missing, writing sample codes");
                self.save(&sample)?;
                return Ok(sample);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&contents).map_err(|source| CodeStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let mut codes = CodeMap::new();
        for (key, description) in raw {
            match parse_code(&key) {
                Ok(code) => {
                    codes.insert(code, description);
                }
                Err(e) => warn!(key = %key, reason = %e, "skipping invalid code entry"),
            }
        }
        Ok(codes)
    }

    fn save(&self, codes: &CodeMap) -> Result<(), CodeStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(codes).map_err(|source| CodeStoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        info!(path = ?self.path, count = codes.len(), "codes saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_sample() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCodeStore::new(dir.path().join("bird codes.json"));

        let codes = store.load().unwrap();
        assert_eq!(codes, sample_codes());
        assert!(store.path().exists());
    }

    #[test]
    fn test_keys_are_normalized_and_invalid_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCodeStore::new(dir.path().join("bird codes.json"));
        fs::write(
            store.path(),
            r#"{"robi": "American Robin", " AMCR ": "American Crow", "TOOLONG": "x", "AB1D": "y"}"#,
        )
        .unwrap();

        let codes = store.load().unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes["ROBI"], "American Robin");
        assert_eq!(codes["AMCR"], "American Crow");
    }

    #[test]
    fn test_save_is_sorted_and_reloadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCodeStore::new(dir.path().join("bird codes.json"));
        let codes = CodeMap::from([
            ("ZEBR".to_string(), "Zebra Finch".to_string()),
            ("AMRO".to_string(), "American Robin".to_string()),
        ]);

        store.save(&codes).unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(contents.find("AMRO").unwrap() < contents.find("ZEBR").unwrap());
        assert_eq!(store.load().unwrap(), codes);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCodeStore::new(dir.path().join("bird codes.json"));
        fs::write(store.path(), "[1, 2]").unwrap();

        assert!(matches!(store.load(), Err(CodeStoreError::Parse { .. })));
    }
}
