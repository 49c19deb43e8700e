//! Transport Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A transport error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request could not be sent or no response arrived.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Response headers arrived but the body could not be read.
    #[display("failed to read response body: {_0}")]
    Body(#[error(not(source))] String),
    /// The transport could not be constructed.
    #[display("transport setup failed")]
    Setup,
    /// No canned response was registered for the URL (mock only).
    #[display("no response registered for: {_0}")]
    Unregistered(#[error(not(source))] String),
}
