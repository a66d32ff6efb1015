//! In-memory secret store.
//!
//! Used by tests and by short-lived processes (a deploy step holding only a
//! token) that must not touch disk.

use std::collections::HashMap;
use std::sync::Mutex;

use zeroize::Zeroizing;

use super::SecretStore;
use crate::error::Result;

/// Volatile store. Values are zeroized when removed or dropped.
#[derive(Default)]
pub struct Memory {
    entries: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .lock()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for Memory {
    fn get_key(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries.get(name).cloned())
    }

    fn set_key(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(name.to_string(), Zeroizing::new(bytes.to_vec()));
        Ok(())
    }

    fn delete_key(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.remove(name);
        Ok(())
    }
}
