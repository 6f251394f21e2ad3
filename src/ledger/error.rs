//! Error types for the case ledger
//!
//! This module defines the errors that can occur while persisting ledger tables.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing a table file failed
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table could not be encoded or decoded
    #[error("Malformed table {table}: {source}")]
    Yaml {
        table: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(table: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            table: table.into(),
            source,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LedgerError::io(
            "data/bans.yaml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(error.to_string(), "Failed to access data/bans.yaml: denied");
    }
}
