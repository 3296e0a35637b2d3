//! Settings storage seam
//!
//! The content side only ever reads settings. Any failure to read degrades
//! to defaults: extension enabled, no profiles.

use std::cell::RefCell;
use std::path::PathBuf;

use kh_core::StoredSettings;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait SettingsStore {
    fn load(&self) -> Result<StoredSettings, StoreError>;
}

/// Read settings, falling back to defaults on any error.
pub fn load_or_default<S: SettingsStore + ?Sized>(store: &S) -> StoredSettings {
    match store.load() {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("failed to read settings, using defaults: {e}");
            StoredSettings::default()
        }
    }
}

/// In-memory store, writable by the host between reads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: RefCell<StoredSettings>,
    failure: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new(settings: StoredSettings) -> Self {
        Self {
            settings: RefCell::new(settings),
            failure: RefCell::new(None),
        }
    }

    pub fn set(&self, settings: StoredSettings) {
        *self.settings.borrow_mut() = settings;
    }

    pub fn update<F: FnOnce(&mut StoredSettings)>(&self, f: F) {
        f(&mut self.settings.borrow_mut());
    }

    /// Make subsequent reads fail with `reason`, or succeed again with `None`.
    pub fn fail_with(&self, reason: Option<&str>) {
        *self.failure.borrow_mut() = reason.map(str::to_string);
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<StoredSettings, StoreError> {
        if let Some(reason) = self.failure.borrow().as_ref() {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        Ok(self.settings.borrow().clone())
    }
}

/// Settings exported from the extension's storage as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(json: &str) -> Result<StoredSettings, StoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl SettingsStore for JsonStore {
    fn load(&self) -> Result<StoredSettings, StoreError> {
        let json = std::fs::read_to_string(&self.path)?;
        Self::parse(&json)
    }
}
