//! Runtime configuration values that staff can change while the bot runs.

use crate::ledger::{LedgerResult, TableFiles};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const CONFIG_TABLE: &str = "config";

/// Key of the active game place
pub const PLACE_ID: &str = "PLACE_ID";
/// Key of the active game universe, used for population lookups
pub const UNIVERSE_ID: &str = "UNIVERSE_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigRow {
    key: String,
    value: String,
}

/// Persistent string key/value store
#[derive(Debug)]
pub struct RuntimeConfig {
    values: DashMap<String, String>,
    files: Arc<TableFiles>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            values: DashMap::new(),
            files: Arc::new(TableFiles::in_memory()),
        }
    }
}

impl RuntimeConfig {
    /// Load the config table
    ///
    /// # Errors
    /// Returns an error if the table file cannot be read or decoded.
    pub async fn load(files: Arc<TableFiles>) -> LedgerResult<Self> {
        let values = DashMap::new();
        for row in files.load::<ConfigRow>(CONFIG_TABLE).await? {
            values.insert(row.key, row.value);
        }
        Ok(Self { values, files })
    }

    async fn save(&self) -> LedgerResult<()> {
        self.files
            .save(CONFIG_TABLE, || {
                let mut rows: Vec<ConfigRow> = self
                    .values
                    .iter()
                    .map(|e| ConfigRow {
                        key: e.key().clone(),
                        value: e.value().clone(),
                    })
                    .collect();
                rows.sort_by(|a, b| a.key.cmp(&b.key));
                rows
            })
            .await
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }

    /// Set a value, replacing any previous one
    pub async fn set(&self, key: &str, value: impl Into<String>) -> LedgerResult<()> {
        let value = value.into();
        info!(key, value = %value, "Runtime config changed");
        self.values.insert(key.to_string(), value);
        self.save().await
    }

    /// Set `key` to `default` only if it has no value yet.
    ///
    /// Returns whether the default was written.
    pub async fn seed(&self, key: &str, default: impl Into<String>) -> LedgerResult<bool> {
        let seeded = match self.values.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(default.into());
                true
            }
        };
        if seeded {
            self.save().await?;
        }
        Ok(seeded)
    }

    #[must_use]
    pub fn place_id(&self) -> Option<String> {
        self.get(PLACE_ID)
    }

    #[must_use]
    pub fn universe_id(&self) -> Option<String> {
        self.get(UNIVERSE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_only_when_absent() {
        let config = RuntimeConfig::default();
        assert!(config.seed(PLACE_ID, "100").await.unwrap());
        assert!(!config.seed(PLACE_ID, "200").await.unwrap());
        assert_eq!(config.place_id().as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let config = RuntimeConfig::default();
        config.seed(UNIVERSE_ID, "1").await.unwrap();
        config.set(UNIVERSE_ID, "2").await.unwrap();
        assert_eq!(config.universe_id().as_deref(), Some("2"));
        assert!(config.get("MISSING").is_none());
    }

    #[tokio::test]
    async fn test_values_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(TableFiles::new(dir.path()));

        let config = RuntimeConfig::load(Arc::clone(&files)).await.unwrap();
        config.seed(PLACE_ID, "100").await.unwrap();
        config.set(PLACE_ID, "300").await.unwrap();

        let reloaded = RuntimeConfig::load(files).await.unwrap();
        assert_eq!(reloaded.place_id().as_deref(), Some("300"));
        assert!(!reloaded.seed(PLACE_ID, "100").await.unwrap());
    }
}
