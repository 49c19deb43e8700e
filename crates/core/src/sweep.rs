use crate::changeset::ChangeSet;
use crate::version::VERSION_KEY;
use futures::{StreamExt, future, stream};
use swcache_store::StoreHandle;
use tracing::{debug, instrument, warn};

const DEFAULT_CONCURRENCY: usize = 8;

/// Evicts every cached entry a [`ChangeSet`] matches.
///
/// Eviction is best effort: an entry that cannot be listed is skipped, and a
/// delete that fails is logged and the key stays cached (and is left out of
/// the result). Either way the remaining keys are still evicted. The version
/// record is never touched.
#[derive(Clone)]
pub struct CacheSweeper {
    store: StoreHandle,
    concurrency: usize,
}

impl CacheSweeper {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Maximum number of deletes in flight at once (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Delete every matching key and return the keys actually evicted, in
    /// listing order.
    #[instrument(skip_all, fields(store = self.store.name()))]
    pub async fn sweep(&self, changes: &ChangeSet) -> Vec<String> {
        if changes.is_empty() {
            return Vec::new();
        }
        let candidates: Vec<String> = self
            .store
            .keys_stream()
            .filter_map(|entry| async move {
                match entry {
                    Ok(entry) => Some(entry.key),
                    Err(err) => {
                        warn!(error = ?err, retryable = err.is_retryable(), "Skipping unreadable cache entry");
                        None
                    },
                }
            })
            .filter(|key| future::ready(key != VERSION_KEY && changes.matches(key)))
            .collect()
            .await;

        let evicted: Vec<Option<String>> = stream::iter(candidates)
            .map(|key| async move {
                match self.store.delete(&key).await {
                    Ok(true) => {
                        debug!(key, "Evicted");
                        Some(key)
                    },
                    // Someone else got there first.
                    Ok(false) => None,
                    Err(err) => {
                        warn!(key, error = ?err, retryable = err.is_retryable(), "Failed to evict, entry stays cached");
                        None
                    },
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        evicted.into_iter().flatten().collect()
    }
}
