//! Key/value settings persisted as a JSON object in `settings.json`

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::error::{logged, storage_err, LedgerResult};
use crate::storage::atomic::atomic_write;
use crate::storage::StorageContext;

/// String settings keyed by name
#[derive(Debug, Clone)]
pub struct SettingsStore {
    ctx: StorageContext,
}

impl SettingsStore {
    pub fn new(ctx: StorageContext) -> Self {
        Self { ctx }
    }

    fn path(&self) -> PathBuf {
        self.ctx.config().settings_path()
    }

    /// Load every setting; an unparsable file reads as empty
    fn load(&self) -> LedgerResult<BTreeMap<String, String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&path).map_err(storage_err(&path))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings file unreadable, using defaults");
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, settings: &BTreeMap<String, String>) -> LedgerResult<()> {
        let path = self.path();
        let mut json = serde_json::to_string_pretty(settings).map_err(storage_err(&path))?;
        json.push('\n');
        atomic_write(&path, &json).map_err(storage_err(&path))
    }

    /// Value for `key`, or `default` when unset
    pub fn get(&self, key: &str, default: &str) -> LedgerResult<String> {
        let settings = logged("get_setting", self.load())?;
        Ok(settings
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> LedgerResult<()> {
        logged("set_setting", self.update(|s| {
            s.insert(key.to_string(), value.to_string());
        }))?;
        tracing::debug!(key, "setting stored");
        Ok(())
    }

    /// Remove `key`; returns the previous value if there was one
    pub fn remove(&self, key: &str) -> LedgerResult<Option<String>> {
        let mut previous = None;
        logged("remove_setting", self.update(|s| previous = s.remove(key)))?;
        Ok(previous)
    }

    pub fn all(&self) -> LedgerResult<BTreeMap<String, String>> {
        logged("list_settings", self.load())
    }

    fn update<F: FnOnce(&mut BTreeMap<String, String>)>(&self, apply: F) -> LedgerResult<()> {
        let mut settings = self.load()?;
        apply(&mut settings);
        self.persist(&settings)
    }
}
