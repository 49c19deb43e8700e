//! The update manifest published by the site.
//!
//! ```json
//! {
//!     "global": 2,
//!     "info": [
//!         {"version": "3"},
//!         {"version": "2", "change": [{"flag": "file", "value": "x.js"}]},
//!         {"version": "1"}
//!     ]
//! }
//! ```

use crate::error::{ErrorKind, Result};
use crate::expression::Descriptor;
use exn::{OptionExt, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Opaque version identifier: compared for equality, never ordered.
///
/// Both strings and numbers appear in the wild; `"1"` and `1` are different
/// versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(Value);
impl From<&str> for VersionTag {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}
impl From<u64> for VersionTag {
    fn from(value: u64) -> Self {
        Self(Value::from(value))
    }
}
impl Display for VersionTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.0 {
            Value::String(s) => write!(f, "{s}"),
            other => write!(f, "{other}"),
        }
    }
}

/// One deployed version and what changed in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub version: VersionTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Vec<Descriptor>>,
}
impl ManifestEntry {
    pub fn new(version: impl Into<VersionTag>) -> Self {
        Self {
            version: version.into(),
            change: None,
        }
    }

    pub fn with_change(mut self, descriptor: Descriptor) -> Self {
        self.change.get_or_insert_with(Vec::new).push(descriptor);
        self
    }

    /// Change descriptors, empty when the entry carries none.
    pub fn changes(&self) -> &[Descriptor] {
        self.change.as_deref().unwrap_or_default()
    }
}

/// The manifest document, entries ordered newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Breaking-change epoch; any change forces a full refresh.
    #[serde(default)]
    pub global: VersionTag,
    pub info: Vec<ManifestEntry>,
}
impl Manifest {
    pub fn new(global: impl Into<VersionTag>, info: Vec<ManifestEntry>) -> Self {
        Self {
            global: global.into(),
            info,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidManifest)
    }

    /// The newest entry.
    pub fn latest(&self) -> Result<&ManifestEntry> {
        self.info.first().ok_or_raise(|| ErrorKind::EmptyManifest)
    }
}
