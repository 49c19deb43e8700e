//! Command-line Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("cache store error")]
    Store,
    #[display("network error")]
    Transport,
    #[display("update check failed")]
    Update,
    /// The origin or the cache is temporarily unavailable; running the same
    /// command again later may succeed.
    #[display("temporarily unavailable, try again later")]
    Unavailable,
    #[display("failed to write output")]
    Output,
}
