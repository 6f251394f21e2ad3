//! Error types for the action relay

use thiserror::Error;

/// Errors that can occur while relaying an action
#[derive(Debug, Error)]
pub enum RelayError {
    /// The modqueue could not be reached
    #[error("Modqueue unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The modqueue answered with a non-success status
    #[error("Modqueue rejected {action} with HTTP {status}: {body}")]
    Rejected {
        action: String,
        status: u16,
        body: String,
    },
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RelayError::Rejected {
            action: "ban".into(),
            status: 401,
            body: "bad secret".into(),
        };
        assert_eq!(
            error.to_string(),
            "Modqueue rejected ban with HTTP 401: bad secret"
        );
    }
}
