//! Durable client-side storage capability.
//!
//! DESIGN
//! ======
//! The core persists exactly two keys: the credential token and the cached
//! user snapshot. Storage is abstracted behind a small trait shaped like
//! browser local storage so the core is testable without a real backend.
//! The surface is infallible: a storage backend that fails logs and keeps
//! serving its in-memory view rather than propagating I/O faults into the
//! session layer.
//!
//! The credential helpers below are the only writers of the two keys, and
//! they always write or clear the pair together. That is what keeps durable
//! state and in-memory session state from diverging past a single pending
//! operation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;

use crate::types::User;

/// Storage key holding the credential token.
pub const TOKEN_KEY: &str = "token";
/// Storage key holding the serialized user snapshot.
pub const USER_KEY: &str = "user";

/// Key-value storage capability. Mirrors the browser local-storage surface.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

// =============================================================================
// CREDENTIAL PAIR
// =============================================================================

/// Persist the credential pair. Both keys are written in one call so a
/// reader never observes a token without its user snapshot.
pub(crate) fn store_credentials(storage: &dyn Storage, token: &str, user: &User) {
    storage.set(TOKEN_KEY, token);
    match serde_json::to_string(user) {
        Ok(serialized) => storage.set(USER_KEY, &serialized),
        Err(e) => warn!(error = %e, "failed to serialize user snapshot; storing token only"),
    }
}

/// Replace only the cached user snapshot, leaving the token untouched.
pub(crate) fn store_user_snapshot(storage: &dyn Storage, user: &User) {
    match serde_json::to_string(user) {
        Ok(serialized) => storage.set(USER_KEY, &serialized),
        Err(e) => warn!(error = %e, "failed to serialize user snapshot"),
    }
}

/// Read the credential pair. Returns `None` unless both the token and a
/// decodable user snapshot are present.
pub(crate) fn read_credentials(storage: &dyn Storage) -> Option<(String, User)> {
    let token = storage.get(TOKEN_KEY)?;
    let raw = storage.get(USER_KEY)?;
    match serde_json::from_str::<User>(&raw) {
        Ok(user) => Some((token, user)),
        Err(e) => {
            warn!(error = %e, "stored user snapshot is not decodable; treating as absent");
            None
        }
    }
}

/// Remove both credential keys. Safe to call when neither is present.
pub(crate) fn clear_credentials(storage: &dyn Storage) {
    storage.remove(TOKEN_KEY);
    storage.remove(USER_KEY);
}

// =============================================================================
// MEMORY BACKEND
// =============================================================================

/// In-memory storage for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(key);
    }
}

// =============================================================================
// FILE BACKEND
// =============================================================================

/// File-backed storage for native hosts: a JSON object rewritten on every
/// mutation. Load happens once at construction; write failures are logged
/// and the in-memory view stays authoritative for the process lifetime.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open the storage file, loading any existing entries. A missing or
    /// undecodable file starts empty rather than failing construction.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "storage file is not decodable; starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self { path, entries: Mutex::new(entries) }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let serialized = match serde_json::to_string_pretty(entries) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(error = %e, "failed to serialize storage entries");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, serialized) {
            warn!(path = %self.path.display(), error = %e, "failed to write storage file");
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
