//! Worker Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A worker error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The manifest was served with a status that is neither success nor an
    /// accepted redirect.
    #[display("manifest request failed with status {_0}")]
    Status(#[error(not(source))] u16),
    /// No response could be obtained.
    #[display("transport error")]
    Transport,
    /// The manifest body could not be decoded.
    #[display("invalid manifest")]
    InvalidManifest,
    /// The manifest could not be folded against the stored version; nothing
    /// was evicted and the stored version is unchanged.
    #[display("reconciliation failed")]
    Reconcile,
    /// The cache store failed.
    #[display("cache store error")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(status) => *status >= 500,
            Self::Transport | Self::Store => true,
            Self::InvalidManifest | Self::Reconcile => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Status(503).is_retryable());
        assert!(!ErrorKind::Status(404).is_retryable());
        assert!(ErrorKind::Transport.is_retryable());
        assert!(!ErrorKind::InvalidManifest.is_retryable());
    }
}
