//! Case ledger for the moderation console
//!
//! Persistent moderation state: active bans, warnings, staff strikes, the
//! punishment history trail, blacklisted groups and runtime configuration.
//! Each relation is kept in memory and mirrored to a YAML table file.

mod error;
mod files;
mod record;
pub mod runtime_config;
mod store;

pub use error::{LedgerError, LedgerResult};
pub use files::TableFiles;
pub use record::{
    Actor, Ban, BlacklistedGroup, HistoryEntry, PunishmentKind, Strike, Warning,
};
pub use runtime_config::RuntimeConfig;
pub use store::Ledger;
