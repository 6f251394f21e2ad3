//! YAML table files backing the ledger, rank store and runtime config.

use crate::ledger::{LedgerError, LedgerResult};
use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Directory of table files, one YAML list per relation.
///
/// An in-memory instance has no directory and never touches the disk.
#[derive(Debug, Default)]
pub struct TableFiles {
    dir: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl TableFiles {
    /// Tables stored under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Tables that live only for the lifetime of the process
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn path_for(dir: &Path, table: &str) -> PathBuf {
        dir.join(format!("{table}.yaml"))
    }

    /// Load every row of a table. A missing file is an empty table.
    pub async fn load<T: DeserializeOwned>(&self, table: &str) -> LedgerResult<Vec<T>> {
        let Some(dir) = &self.dir else {
            return Ok(Vec::new());
        };
        let path = Self::path_for(dir, table);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LedgerError::io(path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_yaml::from_str(&content).map_err(|e| LedgerError::yaml(table, e))
    }

    /// Rewrite a table from a snapshot.
    ///
    /// The snapshot is taken while holding the write lock so a slower writer
    /// can never overwrite the file with older rows.
    pub async fn save<T, F>(&self, table: &str, snapshot: F) -> LedgerResult<()>
    where
        T: Serialize,
        F: FnOnce() -> Vec<T>,
    {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| LedgerError::io(dir, e))?;

        let rows = snapshot();
        let yaml = serde_yaml::to_string(&rows).map_err(|e| LedgerError::yaml(table, e))?;

        let path = Self::path_for(dir, table);
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|e| LedgerError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| LedgerError::io(&path, e))?;

        debug!(table, rows = rows.len(), "Table saved");
        Ok(())
    }
}
