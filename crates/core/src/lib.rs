//! Incremental cache invalidation driven by a version manifest.
//!
//! A deployed site publishes a small manifest listing, newest first, every
//! version together with *what changed* in it. Each client remembers the last
//! version it applied (its [`VersionMarker`]). An update check walks the
//! manifest from the top down to that version, folds every change descriptor
//! on the way into a [`ChangeSet`], and the [`CacheSweeper`] evicts every
//! cached key the change set matches.
//!
//! # Architecture
//! - [`MatchExpression`]: one predicate over cache keys, built from a
//!   manifest descriptor (`{"flag": ..., "value": ...}`).
//! - [`ChangeSet`]: the ordered expressions of one update check, or the
//!   decision to refresh everything.
//! - [`RuleTable`]: which URLs are cacheable at all, and which of them
//!   survive a site-wide clean.
//! - [`VersionStore`]: the durable [`VersionMarker`], kept in the same store
//!   as the cached responses under [`VERSION_KEY`].
//! - [`Reconciler`]: manifest + stored marker → change set + new marker.
//! - [`CacheSweeper`]: change set → evicted keys.

mod changeset;
pub mod error;
mod expression;
mod manifest;
mod reconcile;
pub mod rules;
mod sweep;
mod version;

pub use crate::changeset::ChangeSet;
pub use crate::expression::{Descriptor, DescriptorValue, ExpressionKind, MatchExpression};
pub use crate::manifest::{Manifest, ManifestEntry, VersionTag};
pub use crate::reconcile::{Reconciler, Reconciliation, Walk, walk};
pub use crate::rules::{CacheRule, PatternRule, RuleTable, cache_key};
pub use crate::sweep::CacheSweeper;
pub use crate::version::{VERSION_KEY, VersionMarker, VersionStore};
