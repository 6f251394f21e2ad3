//! Error types for moderation operations

use crate::ledger::LedgerError;
use crate::lookup::LookupError;
use crate::permissions::Rank;
use thiserror::Error;

/// Errors that can occur when executing a moderation operation
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The actor's rank is below the operation's requirement
    #[error("You need the {required} rank or higher to do that")]
    PermissionDenied { required: Rank },

    /// Blank player input
    #[error("Please provide a username or user id")]
    InvalidPlayerReference,

    #[error("Could not find player {0}")]
    PlayerNotFound(String),

    #[error("Could not find group {0}")]
    GroupNotFound(u64),

    #[error("Could not find a group role matching {0}")]
    RoleNotFound(String),

    /// Strike and log operations need the target on the staff list
    #[error("<@{0}> is not a staff member")]
    NotStaff(u64),

    /// A setting the operation depends on has no value
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Game statistics are unavailable")]
    StatsUnavailable,

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for moderation operations
pub type ModerationResult<T> = Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ModerationError::PermissionDenied {
                required: Rank::Manager
            }
            .to_string(),
            "You need the manager rank or higher to do that"
        );
        assert_eq!(
            ModerationError::NotStaff(42).to_string(),
            "<@42> is not a staff member"
        );
        assert_eq!(
            ModerationError::NotConfigured("GROUP_ID").to_string(),
            "GROUP_ID is not configured"
        );
    }
}
