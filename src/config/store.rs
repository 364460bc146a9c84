//! Settings persistence and change propagation.

use super::settings::{SettingChange, SettingKey, Settings, SharedSettings};
use crate::constants::config::{APP_DIR, FILENAME};
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the change channel; slow subscribers see `Lagged`
const CHANGE_CAPACITY: usize = 32;

/// Asynchronous key/value storage for settings.
///
/// Every successful `set_value` is broadcast to subscribers.
pub trait SettingsStore {
    fn get_value(&self, key: SettingKey) -> impl Future<Output = Result<bool>>;

    fn set_value(&self, key: SettingKey, value: bool) -> impl Future<Output = Result<()>>;

    fn subscribe(&self) -> broadcast::Receiver<SettingChange>;
}

/// Volatile store, used when nothing should touch disk
pub struct MemoryStore {
    values: RefCell<HashMap<SettingKey, bool>>,
    changes: broadcast::Sender<SettingChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            values: RefCell::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    async fn get_value(&self, key: SettingKey) -> Result<bool> {
        Ok(self
            .values
            .borrow()
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value()))
    }

    async fn set_value(&self, key: SettingKey, value: bool) -> Result<()> {
        self.values.borrow_mut().insert(key, value);
        // no subscribers is fine
        let _ = self.changes.send(SettingChange { key, value });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

/// Settings persisted as pretty JSON in the user's config directory
pub struct JsonFileStore {
    path: PathBuf,
    changes: broadcast::Sender<SettingChange>,
}

impl JsonFileStore {
    /// Default location: `<config_dir>/kibana-clicker/settings.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    pub fn open_default() -> Self {
        Self::at(Self::default_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            path: path.into(),
            changes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file; a missing file means all defaults
    pub fn read(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!(path = ?self.path, "Settings file not found, using defaults");
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {:?}", self.path))?;

        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings JSON from {:?}", self.path))?;
        Ok(settings)
    }

    pub fn write(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(settings)
            .context("Failed to serialize settings to JSON")?;

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings to {:?}", self.path))?;

        info!(path = ?self.path, "Saved settings");
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    async fn get_value(&self, key: SettingKey) -> Result<bool> {
        Ok(self.read()?.get(key))
    }

    async fn set_value(&self, key: SettingKey, value: bool) -> Result<()> {
        let mut settings = self.read()?;
        settings.set(key, value);
        self.write(&settings)?;
        let _ = self.changes.send(SettingChange { key, value });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

/// Read every key, keeping the value from `fallback` for keys that fail.
pub async fn load_settings<S: SettingsStore>(store: &S, fallback: Settings) -> Settings {
    let mut settings = fallback;
    for key in SettingKey::ALL {
        match store.get_value(key).await {
            Ok(value) => settings.set(key, value),
            Err(e) => {
                warn!(setting = %key, error = %e, "Failed to read setting, keeping previous value")
            }
        }
    }
    settings
}

/// Keep `shared` current with a store's change stream.
///
/// Must be called inside a `LocalSet`. The task ends when the store is dropped.
pub fn spawn_settings_sync(
    mut changes: broadcast::Receiver<SettingChange>,
    shared: SharedSettings,
) -> JoinHandle<()> {
    tokio::task::spawn_local(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    shared.apply(change);
                    debug!(setting = %change.key, value = change.value, "Setting changed");
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Settings subscriber lagged, some changes were skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::task::LocalSet;

    /// Store whose reads fail for selected keys
    struct FlakyStore {
        broken: Vec<SettingKey>,
        inner: MemoryStore,
    }

    impl SettingsStore for FlakyStore {
        async fn get_value(&self, key: SettingKey) -> Result<bool> {
            if self.broken.contains(&key) {
                anyhow::bail!("storage unavailable");
            }
            self.inner.get_value(key).await
        }

        async fn set_value(&self, key: SettingKey, value: bool) -> Result<()> {
            self.inner.set_value(key, value).await
        }

        fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn test_memory_store_defaults_and_updates() {
        let store = MemoryStore::new();
        assert!(store.get_value(SettingKey::PreserveDateRange).await.unwrap());
        assert!(!store.get_value(SettingKey::PreserveQuery).await.unwrap());

        let mut changes = store.subscribe();
        store.set_value(SettingKey::PreserveQuery, true).await.unwrap();
        assert!(store.get_value(SettingKey::PreserveQuery).await.unwrap());
        assert_eq!(
            changes.recv().await.unwrap(),
            SettingChange {
                key: SettingKey::PreserveQuery,
                value: true
            }
        );
    }

    #[tokio::test]
    async fn test_load_settings_falls_back_per_key() {
        let store = FlakyStore {
            broken: vec![SettingKey::PreserveColumns],
            inner: MemoryStore::new(),
        };
        store.set_value(SettingKey::PreserveFilters, true).await.unwrap();
        store.set_value(SettingKey::PreserveColumns, true).await.unwrap();

        let mut fallback = Settings::default();
        fallback.preserve_columns = false;
        let settings = load_settings(&store, fallback).await;

        assert!(settings.preserve_filters);
        assert!(!settings.preserve_columns);
        assert!(settings.preserve_date_range);
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = JsonFileStore::at(&path);

        assert_eq!(store.read().unwrap(), Settings::default());
        store.set_value(SettingKey::InjectTableLinks, true).await.unwrap();
        assert!(path.exists());

        let reopened = JsonFileStore::at(&path);
        assert!(reopened.get_value(SettingKey::InjectTableLinks).await.unwrap());
        assert!(reopened.get_value(SettingKey::PreserveDateRange).await.unwrap());
    }

    #[tokio::test]
    async fn test_json_store_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::at(&path);

        let err = store.get_value(SettingKey::PreserveQuery).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings JSON"));

        let settings = load_settings(&store, Settings::default()).await;
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_settings_sync_applies_changes() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let store = MemoryStore::new();
                let shared = SharedSettings::new(Settings::default());
                let handle = spawn_settings_sync(store.subscribe(), shared.clone());

                store.set_value(SettingKey::PreserveFilters, true).await.unwrap();
                store.set_value(SettingKey::PreserveDateRange, false).await.unwrap();
                drop(store);
                handle.await.unwrap();

                let settings = shared.get();
                assert!(settings.preserve_filters);
                assert!(!settings.preserve_date_range);
            })
            .await;
    }
}
