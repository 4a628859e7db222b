//! Live view of the code mapping
//!
//! Readers take an `Arc` snapshot; `reload` swaps in a freshly loaded map
//! instead of mutating the current one, so the hook thread never observes a
//! half-updated mapping while the editor saves.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use super::store::{CodeMap, CodeStore, CodeStoreError};

pub struct CodeBook {
    store: Box<dyn CodeStore>,
    current: RwLock<Arc<CodeMap>>,
}

impl CodeBook {
    /// Load the initial snapshot; an unreadable store starts empty
    pub fn open(store: Box<dyn CodeStore>) -> Self {
        let codes = match store.load() {
            Ok(codes) => {
                info!(count = codes.len(), "codes loaded");
                codes
            }
            Err(e) => {
                warn!(error = %e, "failed to load codes, starting with none");
                CodeMap::new()
            }
        };
        Self {
            store,
            current: RwLock::new(Arc::new(codes)),
        }
    }

    /// Current immutable snapshot
    pub fn snapshot(&self) -> Arc<CodeMap> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[cfg(test)]
    pub fn lookup(&self, code: &str) -> Option<String> {
        self.snapshot().get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Reload from the store and swap the snapshot
    ///
    /// On failure the previous snapshot stays in place.
    pub fn reload(&self) -> Result<usize, CodeStoreError> {
        let codes = self.store.load()?;
        let count = codes.len();
        self.swap(codes);
        info!(count, "codes reloaded");
        Ok(count)
    }

    fn swap(&self, codes: CodeMap) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(codes);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Store whose contents the test rewrites, standing in for the editor
    #[derive(Default)]
    struct MemoryStore {
        codes: Mutex<Option<CodeMap>>,
    }

    impl CodeStore for Arc<MemoryStore> {
        fn load(&self) -> Result<CodeMap, CodeStoreError> {
            self.codes.lock().unwrap().clone().ok_or_else(|| CodeStoreError::Io {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            })
        }

        fn save(&self, codes: &CodeMap) -> Result<(), CodeStoreError> {
            *self.codes.lock().unwrap() = Some(codes.clone());
            Ok(())
        }
    }

    fn codes(entries: &[(&str, &str)]) -> CodeMap {
        entries
            .iter()
            .map(|(code, desc)| (code.to_string(), desc.to_string()))
            .collect()
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let store = Arc::new(MemoryStore::default());
        store.save(&codes(&[("ROBI", "Robin")])).unwrap();
        let book = CodeBook::open(Box::new(Arc::clone(&store)));

        let before = book.snapshot();
        store.save(&codes(&[("ROBI", "American Robin"), ("AMCR", "American Crow")])).unwrap();
        assert_eq!(book.reload().unwrap(), 2);

        // Old snapshot is untouched
        assert_eq!(before["ROBI"], "Robin");
        assert_eq!(book.lookup("ROBI").as_deref(), Some("American Robin"));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let store = Arc::new(MemoryStore::default());
        store.save(&codes(&[("ROBI", "Robin")])).unwrap();
        let book = CodeBook::open(Box::new(Arc::clone(&store)));

        *store.codes.lock().unwrap() = None;
        assert!(book.reload().is_err());
        assert_eq!(book.lookup("ROBI").as_deref(), Some("Robin"));
    }

    #[test]
    fn test_unreadable_store_starts_empty() {
        let book = CodeBook::open(Box::new(Arc::new(MemoryStore::default())));
        assert_eq!(book.len(), 0);
        assert_eq!(book.lookup("ROBI"), None);
    }
}
