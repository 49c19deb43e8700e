//! Invalidation Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An invalidation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for invalidation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A change descriptor names a flag nobody knows how to evaluate. The
    /// manifest is broken; nothing must be evicted on its behalf.
    #[display("unknown expression: {_0}")]
    UnknownExpression(#[error(not(source))] String),
    /// A descriptor flag that needs a `value` came without one.
    #[display("expression `{_0}` requires a value")]
    MissingValue(#[error(not(source))] String),
    /// A descriptor value is not a scalar (string, number or boolean).
    #[display("invalid expression value: {_0}")]
    InvalidValue(#[error(not(source))] String),
    /// A regular expression failed to compile.
    #[display("invalid pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// The manifest document is not valid JSON of the expected shape.
    #[display("invalid manifest")]
    InvalidManifest,
    /// The manifest lists no versions at all.
    #[display("manifest contains no versions")]
    EmptyManifest,
    /// The stored version record cannot be decoded.
    #[display("invalid version record")]
    InvalidVersionRecord,
    /// The cache store failed.
    #[display("cache store error")]
    Store,
}
