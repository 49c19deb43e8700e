//! Startup escape check and update checks.

use crate::error::{ErrorKind, Result};
use crate::events::ClientEvent;
use exn::ResultExt;
use std::sync::Arc;
use swcache_core::{CacheSweeper, Manifest, Reconciler, Reconciliation, RuleTable, VersionStore};
use swcache_fetch::{FetchRequest, TransportHandle};
use swcache_store::StoreHandle;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};
use url::Url;

/// Payload a page sends to request an update check.
pub const UPDATE_MESSAGE: &str = "update";

const EVENT_CAPACITY: usize = 16;

/// Drives version checks against the site's manifest.
///
/// Pages connect with [`subscribe`](Self::subscribe) and receive
/// broadcast [`ClientEvent`]s; the result of an update check is returned
/// to whoever asked for it.
pub struct Worker {
    store: StoreHandle,
    transport: TransportHandle,
    rules: Arc<RuleTable>,
    manifest_url: Url,
    escape: u32,
    sweeper: CacheSweeper,
    events: broadcast::Sender<ClientEvent>,
}

impl Worker {
    pub fn new(store: StoreHandle, transport: TransportHandle, rules: Arc<RuleTable>, manifest_url: Url) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sweeper: CacheSweeper::new(Arc::clone(&store)),
            store,
            transport,
            rules,
            manifest_url,
            escape: 0,
            events,
        }
    }

    /// The escape constant of this build. Any other value found in storage
    /// wipes the cache on [`start`](Self::start).
    pub fn with_escape(mut self, escape: u32) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweeper = self.sweeper.with_concurrency(concurrency);
        self
    }

    /// A receiver for events broadcast to every connected page.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Escape check, run once before anything else.
    ///
    /// When a version record exists and its escape counter is not this
    /// build's, the whole store (version record included) is cleared and
    /// [`ClientEvent::Escape`] is broadcast. Returns whether the cache was
    /// wiped.
    #[instrument(skip_all, fields(escape = self.escape))]
    pub async fn start(&self) -> Result<bool> {
        let versions = VersionStore::new(Arc::clone(&self.store));
        let Some(stored) = versions.read().await.or_raise(|| ErrorKind::Store)? else {
            debug!("No version record, nothing to escape");
            return Ok(false);
        };
        if stored.escape == Some(self.escape) {
            return Ok(false);
        }
        info!(stored = ?stored.escape, "Escape counter changed, wiping cache");
        self.store.clear().await.or_raise(|| ErrorKind::Store)?;
        self.broadcast(ClientEvent::Escape);
        Ok(true)
    }

    /// React to a message from a page. Only [`UPDATE_MESSAGE`] does
    /// anything; the returned event goes back to the sender.
    pub async fn handle_message(&self, payload: &str) -> Result<Option<ClientEvent>> {
        if payload != UPDATE_MESSAGE {
            debug!(payload, "Ignoring message");
            return Ok(None);
        }
        self.check_update().await.map(Some)
    }

    /// Fetch the manifest, reconcile it against the stored version and evict
    /// whatever changed.
    ///
    /// A failure before reconciliation leaves the stored version untouched,
    /// so the next check retries the same window.
    #[instrument(skip_all, fields(manifest = %self.manifest_url))]
    pub async fn check_update(&self) -> Result<ClientEvent> {
        let response = self
            .transport
            .fetch(&FetchRequest::new(self.manifest_url.clone()))
            .await
            .or_raise(|| ErrorKind::Transport)?;
        if !response.is_acceptable() {
            exn::bail!(ErrorKind::Status(response.status));
        }
        let manifest = Manifest::parse(&response.body).or_raise(|| ErrorKind::InvalidManifest)?;

        let versions = VersionStore::new(Arc::clone(&self.store));
        let reconciler = Reconciler::new(versions, Arc::clone(&self.rules), self.escape);
        let reconciliation = reconciler.reconcile(&manifest).await.or_raise(|| ErrorKind::Reconcile)?;
        let event = match reconciliation {
            Reconciliation::FirstRun { version } => ClientEvent::Update { update: None, version },
            Reconciliation::Changes { changes, version } => {
                let evicted = self.sweeper.sweep(&changes).await;
                info!(evicted = evicted.len(), "Update check complete");
                ClientEvent::Update {
                    update: (!evicted.is_empty()).then_some(evicted),
                    version,
                }
            },
        };
        Ok(event)
    }

    fn broadcast(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("No connected pages to notify");
        }
    }
}
