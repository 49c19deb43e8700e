use std::sync::Arc;
use swcache_core::{PatternRule, RuleTable, VERSION_KEY, VersionMarker, VersionStore};
use swcache_fetch::MockTransport;
use swcache_store::store::MemoryStore;
use swcache_worker::error::ErrorKind;
use swcache_worker::{ClientEvent, Worker};
use url::Url;

const MANIFEST_URL: &str = "https://example.com/update.json";

const MANIFEST: &str = r#"{
    "global": 1,
    "info": [
        {"version": "3"},
        {"version": "2", "change": [{"flag": "file", "value": "x.js"}]},
        {"version": "1"}
    ]
}"#;

const CACHED: [&str; 4] = [
    "https://example.com/",
    "https://example.com/js/x.js",
    "https://example.com/js/y.js",
    "https://fonts.example.com/a.woff2",
];

fn rules() -> Arc<RuleTable> {
    Arc::new(
        RuleTable::default()
            .with_rule(PatternRule::new("fonts", r"\.woff2$").unwrap().with_clean(false))
            .with_rule(PatternRule::new("site", ".*").unwrap().with_host("example.com")),
    )
}

fn marker(global: u64, local: &str, escape: Option<u32>) -> VersionMarker {
    VersionMarker {
        global: global.into(),
        local: local.into(),
        escape,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    transport: Arc<MockTransport>,
    worker: Worker,
}

async fn harness(stored: Option<VersionMarker>, manifest: (u16, &str)) -> Harness {
    let store = Arc::new(MemoryStore::with_entries(CACHED.map(|key| (key, "cached"))));
    if let Some(stored) = stored {
        VersionStore::new(store.clone()).write(&stored).await.unwrap();
    }
    let transport = Arc::new(MockTransport::new());
    transport.respond(MANIFEST_URL, manifest.0, manifest.1).await;
    let worker = Worker::new(store.clone(), transport.clone(), rules(), Url::parse(MANIFEST_URL).unwrap());
    Harness {
        store,
        transport,
        worker,
    }
}

async fn stored_marker(store: &Arc<MemoryStore>) -> Option<VersionMarker> {
    VersionStore::new(store.clone()).read().await.unwrap()
}

#[tokio::test]
async fn test_first_run_records_version_and_evicts_nothing() {
    let h = harness(None, (200, MANIFEST)).await;
    let event = h.worker.handle_message("update").await.unwrap().unwrap();
    assert_eq!(
        event,
        ClientEvent::Update {
            update: None,
            version: marker(1, "3", Some(0)),
        }
    );
    assert_eq!(h.store.snapshot().await.len(), CACHED.len() + 1);
    assert_eq!(stored_marker(&h.store).await, Some(marker(1, "3", Some(0))));
}

#[tokio::test]
async fn test_incremental_update_evicts_changed_file() {
    let h = harness(Some(marker(1, "1", Some(0))), (200, MANIFEST)).await;
    let event = h.worker.check_update().await.unwrap();
    assert_eq!(
        event,
        ClientEvent::Update {
            update: Some(vec!["https://example.com/js/x.js".to_string()]),
            version: marker(1, "3", Some(0)),
        }
    );
    assert!(!h.store.snapshot().await.contains(&"https://example.com/js/x.js".to_string()));
    assert_eq!(stored_marker(&h.store).await, Some(marker(1, "3", Some(0))));
}

#[tokio::test]
async fn test_second_check_is_noop() {
    let h = harness(Some(marker(1, "1", Some(0))), (200, MANIFEST)).await;
    h.worker.check_update().await.unwrap();
    let ClientEvent::Update { update, .. } = h.worker.check_update().await.unwrap() else {
        panic!("expected update event");
    };
    assert_eq!(update, None);
    assert_eq!(h.transport.requests_for(MANIFEST_URL).await, 2);
}

#[tokio::test]
async fn test_unknown_version_keeps_protected_entries() {
    let h = harness(Some(marker(1, "0", Some(0))), (200, MANIFEST)).await;
    let ClientEvent::Update { update, .. } = h.worker.check_update().await.unwrap() else {
        panic!("expected update event");
    };
    assert_eq!(update.unwrap().len(), 3);
    assert_eq!(h.store.snapshot().await, vec!["https://fonts.example.com/a.woff2", VERSION_KEY]);
}

#[tokio::test]
async fn test_global_change_evicts_everything() {
    let h = harness(Some(marker(0, "3", Some(0))), (200, MANIFEST)).await;
    let ClientEvent::Update { update, version } = h.worker.check_update().await.unwrap() else {
        panic!("expected update event");
    };
    assert_eq!(update.unwrap().len(), CACHED.len());
    assert_eq!(version, marker(1, "3", Some(0)));
    assert_eq!(h.store.snapshot().await, vec![VERSION_KEY]);
}

#[tokio::test]
async fn test_failed_manifest_request_changes_nothing() {
    let h = harness(Some(marker(1, "1", Some(0))), (404, "not found")).await;
    let err = h.worker.check_update().await.unwrap_err();
    assert_eq!(*err, ErrorKind::Status(404));
    assert_eq!(stored_marker(&h.store).await, Some(marker(1, "1", Some(0))));
    assert_eq!(h.store.snapshot().await.len(), CACHED.len() + 1);
}

#[tokio::test]
async fn test_malformed_manifest() {
    let h = harness(Some(marker(1, "1", Some(0))), (200, "<html></html>")).await;
    let err = h.worker.check_update().await.unwrap_err();
    assert_eq!(*err, ErrorKind::InvalidManifest);
}

#[tokio::test]
async fn test_unknown_flag_aborts_before_eviction() {
    let manifest = r#"{"global":1,"info":[{"version":"2","change":[{"flag":"nope"}]},{"version":"1"}]}"#;
    let h = harness(Some(marker(1, "1", Some(0))), (200, manifest)).await;
    let err = h.worker.check_update().await.unwrap_err();
    assert_eq!(*err, ErrorKind::Reconcile);
    assert_eq!(stored_marker(&h.store).await, Some(marker(1, "1", Some(0))));
    assert_eq!(h.store.snapshot().await.len(), CACHED.len() + 1);
}

#[tokio::test]
async fn test_other_messages_are_ignored() {
    let h = harness(None, (200, MANIFEST)).await;
    assert_eq!(h.worker.handle_message("refresh").await.unwrap(), None);
    assert!(h.transport.requests().await.is_empty());
}

#[tokio::test]
async fn test_escape_mismatch_wipes_cache_and_notifies() {
    let h = harness(Some(marker(1, "3", Some(1))), (200, MANIFEST)).await;
    let mut page = h.worker.subscribe();
    assert!(h.worker.start().await.unwrap());
    assert_eq!(page.try_recv().unwrap(), ClientEvent::Escape);
    assert!(h.store.snapshot().await.is_empty());
    assert!(h.transport.requests().await.is_empty());

    // With the record gone, the next check is a first run.
    let ClientEvent::Update { update, version } = h.worker.check_update().await.unwrap() else {
        panic!("expected update event");
    };
    assert_eq!(update, None);
    assert_eq!(version.escape, Some(0));
}

#[tokio::test]
async fn test_matching_escape_keeps_cache() {
    let h = harness(Some(marker(1, "3", Some(4))), (200, MANIFEST)).await;
    let worker = h.worker.with_escape(4);
    let mut page = worker.subscribe();
    assert!(!worker.start().await.unwrap());
    assert!(page.try_recv().is_err());
    assert_eq!(h.store.snapshot().await.len(), CACHED.len() + 1);
}

#[tokio::test]
async fn test_start_without_record_does_nothing() {
    let h = harness(None, (200, MANIFEST)).await;
    assert!(!h.worker.start().await.unwrap());
    assert_eq!(h.store.snapshot().await.len(), CACHED.len());
}
