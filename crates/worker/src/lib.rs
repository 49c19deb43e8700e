//! The runtime half of swcache: everything that reacts to outside events.
//!
//! - [`Interceptor`] answers intercepted requests from the cache, the
//!   network or a spare origin.
//! - [`Worker`] runs the escape check on startup and an update check
//!   whenever a connected page asks for one, reporting back through
//!   [`ClientEvent`]s.

pub mod error;
mod events;
mod intercept;
mod spare;
mod worker;

pub use crate::events::ClientEvent;
pub use crate::intercept::{Interception, Interceptor};
pub use crate::spare::{HostMirror, SpareResolver};
pub use crate::worker::{UPDATE_MESSAGE, Worker};
