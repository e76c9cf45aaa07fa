//! Error types for pathoracle.

use std::io;

use thiserror::Error;

use crate::types::PathFingerprint;

/// Result type alias for pathoracle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pathoracle.
#[derive(Error, Debug)]
pub enum Error {
    // Selection errors
    #[error("pinned path {0} is not among the candidate paths")]
    PinnedPathNotFound(PathFingerprint),

    #[error("pinned path {0} went down")]
    PinnedPathDown(PathFingerprint),

    // Oracle errors
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    // Address errors
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Stats sink errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors talking to the path oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("oracle returned non 2xx status code: {status}")]
    Status { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no oracle location configured")]
    NoLocation,
}

impl Error {
    /// Check if the error leaves the connection without a meaningful path
    /// configuration. Callers are expected to terminate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::PinnedPathNotFound(_) | Error::PinnedPathDown(_) | Error::InvalidConfig(_)
        )
    }

    /// Check if error is recoverable (should retry later).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Oracle(OracleError::Request(_) | OracleError::Status { .. }) | Error::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_errors_are_fatal() {
        let err = Error::PinnedPathNotFound(PathFingerprint::new("x"));
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "pinned path x is not among the candidate paths");
    }

    #[test]
    fn test_oracle_status_is_recoverable() {
        let err = Error::from(OracleError::Status { status: 503 });
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_address_and_io_classification() {
        let err = Error::InvalidAddress("1-x".into());
        assert!(!err.is_fatal());
        assert!(!err.is_recoverable());

        let err = Error::from(io::Error::other("disk"));
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "IO error: disk");
    }
}
