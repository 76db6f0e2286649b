//! Ports to the environment the auth context runs in: browser-style storage,
//! navigation, and the external session provider.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Local storage key set by the login form's "remember me" option.
pub const REMEMBER_ME_KEY: &str = "rememberMe";
/// Session storage key set when the user chose not to be remembered.
pub const SESSION_ONLY_KEY: &str = "sessionOnly";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StorageArea {
    Local,
    Session,
}

/// Key/value storage that survives page reloads (local) or the tab (session).
pub trait BrowserStorage: Send + Sync {
    fn get(&self, area: StorageArea, key: &str) -> Option<String>;
    fn set(&self, area: StorageArea, key: &str, value: &str);
    fn remove(&self, area: StorageArea, key: &str);
}

/// In-memory storage for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: Mutex<HashMap<(StorageArea, String), String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BrowserStorage for InMemoryStorage {
    fn get(&self, area: StorageArea, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries.get(&(area, key.to_string())).cloned()
    }

    fn set(&self, area: StorageArea, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert((area, key.to_string()), value.to_string());
        }
    }

    fn remove(&self, area: StorageArea, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&(area, key.to_string()));
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(path.to_string());
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionProviderError {
    #[error("remote sign-out failed: {0}")]
    SignOut(String),
}

/// The external owner of the session. Only sign-out is driven from here;
/// session changes arrive as [`crate::SessionSnapshot`] values.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_out(&self) -> Result<(), SessionProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_areas_are_separate() {
        let storage = InMemoryStorage::new();
        storage.set(StorageArea::Local, REMEMBER_ME_KEY, "true");
        assert_eq!(storage.get(StorageArea::Session, REMEMBER_ME_KEY), None);
        assert_eq!(storage.get(StorageArea::Local, REMEMBER_ME_KEY).as_deref(), Some("true"));

        storage.remove(StorageArea::Local, REMEMBER_ME_KEY);
        assert_eq!(storage.get(StorageArea::Local, REMEMBER_ME_KEY), None);
    }

    #[test]
    fn navigator_records_in_order() {
        let nav = RecordingNavigator::new();
        nav.navigate("/dashboard");
        nav.navigate("/login");
        assert_eq!(nav.visited(), vec!["/dashboard", "/login"]);
    }
}
