//! Folding the manifest against the stored version.

use crate::changeset::ChangeSet;
use crate::error::Result;
use crate::expression::MatchExpression;
use crate::manifest::{Manifest, ManifestEntry, VersionTag};
use crate::rules::RuleTable;
use crate::version::{VersionMarker, VersionStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of walking the manifest down to the client's version.
#[derive(Debug)]
pub enum Walk {
    /// The client's version was found; the change set holds every change
    /// made after it.
    Bounded(ChangeSet),
    /// The client's version is not listed (too old, or the manifest was
    /// truncated): the changes in between are unknown.
    Unbounded,
}

/// Walk `info` (newest first) until the entry for `local`, collecting the
/// changes of every entry before it.
///
/// Fails on the first descriptor that cannot be turned into an expression.
pub fn walk(info: &[ManifestEntry], local: &VersionTag, rules: &Arc<RuleTable>) -> Result<Walk> {
    let mut changes = ChangeSet::new(Arc::clone(rules));
    for entry in info {
        if &entry.version == local {
            return Ok(Walk::Bounded(changes));
        }
        for descriptor in entry.changes() {
            changes.push(MatchExpression::from_descriptor(descriptor)?);
        }
    }
    Ok(Walk::Unbounded)
}

/// Result of one reconciliation.
#[derive(Debug)]
pub enum Reconciliation {
    /// No marker was stored: nothing can be stale, nothing is evicted.
    FirstRun { version: VersionMarker },
    /// A returning client: evict whatever `changes` matches.
    Changes { changes: ChangeSet, version: VersionMarker },
}
impl Reconciliation {
    /// The marker that was persisted.
    pub fn version(&self) -> &VersionMarker {
        match self {
            Self::FirstRun { version } | Self::Changes { version, .. } => version,
        }
    }
}

/// Turns a manifest and the stored [`VersionMarker`] into a [`ChangeSet`]
/// and persists the new marker.
#[derive(Clone)]
pub struct Reconciler {
    versions: VersionStore,
    rules: Arc<RuleTable>,
    escape: u32,
}

impl Reconciler {
    /// `escape` seeds the escape counter of a fresh installation; returning
    /// clients keep the value already stored.
    pub fn new(versions: VersionStore, rules: Arc<RuleTable>, escape: u32) -> Self {
        Self { versions, rules, escape }
    }

    /// Reconcile against `manifest`.
    ///
    /// The new marker is written only after the change set has been fully
    /// computed: a manifest that fails to fold leaves the stored marker
    /// untouched, so the next check retries from the same baseline. Once
    /// written, the marker is not rolled back if evicting the returned
    /// changes later fails.
    #[instrument(skip_all, fields(global = %manifest.global))]
    pub async fn reconcile(&self, manifest: &Manifest) -> Result<Reconciliation> {
        let latest = manifest.latest()?;
        let stored = self.versions.read().await?;
        let version = VersionMarker {
            global: manifest.global.clone(),
            local: latest.version.clone(),
            escape: stored.as_ref().map_or(Some(self.escape), |stored| stored.escape),
        };

        let Some(stored) = stored else {
            self.versions.write(&version).await?;
            info!(local = %version.local, "First run, recorded version without evicting");
            return Ok(Reconciliation::FirstRun { version });
        };

        let mut changes = match walk(&manifest.info, &stored.local, &self.rules)? {
            Walk::Bounded(changes) => changes,
            Walk::Unbounded => {
                info!(local = %stored.local, "Stored version not in manifest, cleaning site-wide");
                let mut changes = ChangeSet::new(Arc::clone(&self.rules));
                changes.reset_to(MatchExpression::All);
                changes
            },
        };
        if manifest.global != stored.global {
            info!(from = %stored.global, to = %manifest.global, "Global epoch changed, refreshing everything");
            changes.force_full_refresh();
        }

        self.versions.write(&version).await?;
        info!(
            from = %stored.local,
            to = %version.local,
            expressions = changes.expressions().len(),
            force_refresh = changes.is_force_refresh(),
            "Reconciled manifest"
        );
        Ok(Reconciliation::Changes { changes, version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::expression::{Descriptor, ExpressionKind};
    use crate::rules::PatternRule;
    use crate::version::VERSION_KEY;
    use swcache_store::store::MemoryStore;
    use swcache_store::{CacheStore, StoreHandle};

    fn file(value: &str) -> Descriptor {
        Descriptor::new("file", Some(value.into()))
    }

    fn manifest() -> Manifest {
        Manifest::new(
            1u64,
            vec![
                ManifestEntry::new("3"),
                ManifestEntry::new("2").with_change(file("x.js")),
                ManifestEntry::new("1"),
            ],
        )
    }

    fn marker(global: u64, local: &str) -> VersionMarker {
        VersionMarker {
            global: VersionTag::from(global),
            local: VersionTag::from(local),
            escape: Some(0),
        }
    }

    async fn reconciler_with(stored: Option<VersionMarker>) -> (StoreHandle, Reconciler) {
        let store: StoreHandle = Arc::new(MemoryStore::default());
        let versions = VersionStore::new(store.clone());
        if let Some(stored) = stored {
            versions.write(&stored).await.unwrap();
        }
        let rules = Arc::new(RuleTable::default().with_rule(PatternRule::new("assets", r"\.js$").unwrap()));
        (store, Reconciler::new(versions, rules, 7))
    }

    fn kinds(changes: &ChangeSet) -> Vec<ExpressionKind> {
        changes.expressions().iter().map(MatchExpression::kind).collect()
    }

    #[test]
    fn test_walk_bounded() {
        let rules = Arc::default();
        let Walk::Bounded(changes) = walk(&manifest().info, &VersionTag::from("1"), &rules).unwrap() else {
            panic!("expected bounded walk");
        };
        assert_eq!(kinds(&changes), vec![ExpressionKind::File]);
        assert!(changes.matches("https://example.com/x.js"));
    }

    #[test]
    fn test_walk_stops_at_stored_version() {
        let rules = Arc::default();
        let info = vec![
            ManifestEntry::new("3").with_change(file("a.css")),
            ManifestEntry::new("2"),
            ManifestEntry::new("1").with_change(Descriptor::new("bogus", None)),
        ];
        // The entry for the stored version (and anything older) is never evaluated.
        let Walk::Bounded(changes) = walk(&info, &VersionTag::from("2"), &rules).unwrap() else {
            panic!("expected bounded walk");
        };
        assert_eq!(kinds(&changes), vec![ExpressionKind::File]);
    }

    #[test]
    fn test_walk_unbounded() {
        let rules = Arc::default();
        let walked = walk(&manifest().info, &VersionTag::from("0"), &rules).unwrap();
        assert!(matches!(walked, Walk::Unbounded));
    }

    #[tokio::test]
    async fn test_first_run_records_version_without_changes() {
        let (store, reconciler) = reconciler_with(None).await;
        let result = reconciler.reconcile(&manifest()).await.unwrap();
        let Reconciliation::FirstRun { version } = result else {
            panic!("expected first run");
        };
        assert_eq!(version.local, VersionTag::from("3"));
        assert_eq!(version.global, VersionTag::from(1u64));
        assert_eq!(version.escape, Some(7));
        assert_eq!(VersionStore::new(store).read().await.unwrap(), Some(version));
    }

    #[tokio::test]
    async fn test_up_to_date_is_noop() {
        let (_store, reconciler) = reconciler_with(Some(marker(1, "3"))).await;
        let Reconciliation::Changes { changes, version } = reconciler.reconcile(&manifest()).await.unwrap() else {
            panic!("expected changes");
        };
        assert!(changes.is_empty());
        assert!(!changes.is_force_refresh());
        assert_eq!(version, marker(1, "3"));
    }

    #[tokio::test]
    async fn test_incremental_changes() {
        let (store, reconciler) = reconciler_with(Some(marker(1, "1"))).await;
        let Reconciliation::Changes { changes, version } = reconciler.reconcile(&manifest()).await.unwrap() else {
            panic!("expected changes");
        };
        assert_eq!(kinds(&changes), vec![ExpressionKind::File]);
        assert!(!changes.is_force_refresh());
        assert_eq!(version.local, VersionTag::from("3"));
        // Escape counter carried over from storage, not reseeded.
        assert_eq!(version.escape, Some(0));
        assert_eq!(VersionStore::new(store).read().await.unwrap(), Some(version));
    }

    #[tokio::test]
    async fn test_unknown_version_cleans_site_wide() {
        let (_store, reconciler) = reconciler_with(Some(marker(1, "0"))).await;
        let Reconciliation::Changes { changes, .. } = reconciler.reconcile(&manifest()).await.unwrap() else {
            panic!("expected changes");
        };
        assert_eq!(kinds(&changes), vec![ExpressionKind::All]);
        assert!(changes.matches("https://example.com/app.js"));
    }

    #[tokio::test]
    async fn test_global_change_forces_full_refresh() {
        for local in ["3", "1", "0"] {
            let (_store, reconciler) = reconciler_with(Some(marker(0, local))).await;
            let Reconciliation::Changes { changes, .. } = reconciler.reconcile(&manifest()).await.unwrap() else {
                panic!("expected changes");
            };
            assert!(changes.is_force_refresh(), "local = {local}");
            assert!(changes.expressions().is_empty());
        }
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let (_store, reconciler) = reconciler_with(Some(marker(1, "1"))).await;
        reconciler.reconcile(&manifest()).await.unwrap();
        let Reconciliation::Changes { changes, .. } = reconciler.reconcile(&manifest()).await.unwrap() else {
            panic!("expected changes");
        };
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_flag_keeps_stored_version() {
        let (store, reconciler) = reconciler_with(Some(marker(1, "1"))).await;
        let broken = Manifest::new(
            1u64,
            vec![
                ManifestEntry::new("3").with_change(Descriptor::new("bogus", None)),
                ManifestEntry::new("1"),
            ],
        );
        let err = reconciler.reconcile(&broken).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownExpression(_)));
        assert_eq!(VersionStore::new(store).read().await.unwrap(), Some(marker(1, "1")));
    }

    #[tokio::test]
    async fn test_empty_manifest_writes_nothing() {
        let (store, reconciler) = reconciler_with(None).await;
        let err = reconciler.reconcile(&Manifest::new(1u64, vec![])).await.unwrap_err();
        assert_eq!(*err, ErrorKind::EmptyManifest);
        assert!(store.get(VERSION_KEY).await.unwrap().is_none());
    }
}
