//! Properties of the poll/reconcile scheme: cross-tab convergence,
//! last-fetch-wins, the persist-failure policy, the guard against a
//! stale fetch clobbering a racing local write, and clean poller
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use aidlink_client::{ClientError, DEFAULT_POLL_INTERVAL, MemoryBackend, StoreBackend, SyncClient};
use aidlink_types::{Collection, HelpRequest, RequestStatus};

fn request(id: &str) -> HelpRequest {
    HelpRequest {
        id: id.to_string(),
        requester_id: "u1".to_string(),
        responder_id: None,
        status: RequestStatus::Pending,
        kind: "Chest Pain".to_string(),
        location: "X".to_string(),
        severity: "High".to_string(),
        timestamp: 0,
        outcome: None,
        emotional_status: None,
    }
}

#[tokio::test]
async fn a_write_in_one_tab_reaches_another_within_one_poll() {
    let backend = MemoryBackend::new();
    let tab_a = SyncClient::new(Arc::new(backend.clone()));
    let tab_b = SyncClient::new(Arc::new(backend.clone()));
    tab_a.load_initial().await;
    tab_b.load_initial().await;

    tab_a.requests.apply(vec![request("r1")]).await.unwrap();
    assert!(tab_b.requests.snapshot().is_empty(), "no push channel");

    tab_b.requests.poll_once().await;
    assert_eq!(tab_b.requests.snapshot(), tab_a.requests.snapshot());
}

#[tokio::test]
async fn last_writer_wins_at_collection_granularity() {
    let backend = MemoryBackend::new();
    let tab_a = SyncClient::new(Arc::new(backend.clone()));
    let tab_b = SyncClient::new(Arc::new(backend.clone()));
    tab_a.load_initial().await;
    tab_b.load_initial().await;

    // Both tabs read-modify-write from the same (empty) base; B lands
    // last, so A's slice is silently gone. The documented hazard.
    tab_a.requests.apply(vec![request("from-a")]).await.unwrap();
    tab_b.requests.apply(vec![request("from-b")]).await.unwrap();

    tab_a.requests.poll_once().await;
    let snapshot = tab_a.requests.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "from-b");
}

#[tokio::test]
async fn failed_persist_keeps_local_state_until_poll_reconciles() {
    let backend = MemoryBackend::new();
    let tab = SyncClient::new(Arc::new(backend.clone()));
    tab.load_initial().await;

    backend.set_fail_writes(true);
    let err = tab.requests.apply(vec![request("r1")]).await.unwrap_err();
    assert!(matches!(err, ClientError::PersistFailure { .. }));
    // Optimistic state retained, not rolled back.
    assert_eq!(tab.requests.snapshot().len(), 1);

    // Once the store recovers, the next poll restores its truth: the
    // write was lost and that loss becomes visible.
    backend.set_fail_writes(false);
    tab.requests.poll_once().await;
    assert!(tab.requests.snapshot().is_empty());
}

/// Backend whose fetch captures the store contents, then stalls until
/// the test releases it — a long-running GET whose response was built
/// before a concurrent write landed.
struct GatedBackend {
    inner: MemoryBackend,
    fetch_entered: Arc<Notify>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl StoreBackend for GatedBackend {
    async fn fetch(&self, collection: Collection) -> Result<Vec<Value>> {
        let stale = self.inner.fetch(collection).await?;
        self.fetch_entered.notify_one();
        let _permit = self.gate.acquire().await?;
        Ok(stale)
    }

    async fn replace(&self, collection: Collection, records: Vec<Value>) -> Result<()> {
        self.inner.replace(collection, records).await
    }

    async fn append_log(&self, record: Value) -> Result<()> {
        self.inner.append_log(record).await
    }
}

#[tokio::test]
async fn stale_fetch_never_clobbers_a_racing_local_write() {
    let fetch_entered = Arc::new(Notify::new());
    let gate = Arc::new(Semaphore::new(0));
    let sync = SyncClient::new(Arc::new(GatedBackend {
        inner: MemoryBackend::new(),
        fetch_entered: Arc::clone(&fetch_entered),
        gate: Arc::clone(&gate),
    }));

    let handle = sync.requests.clone();
    let poll = tokio::spawn(async move { handle.poll_once().await });
    fetch_entered.notified().await;

    // Fetch in flight holds an empty snapshot; the user acts now.
    sync.requests.apply(vec![request("r1")]).await.unwrap();

    gate.add_permits(1);
    poll.await.unwrap();

    // The stale (empty) snapshot was discarded.
    let snapshot = sync.requests.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "r1");
}

#[tokio::test(start_paused = true)]
async fn poller_converges_tabs_and_stops_on_cancel() {
    let backend = MemoryBackend::new();
    let tab_a = SyncClient::new(Arc::new(backend.clone()));
    let tab_b = SyncClient::new(Arc::new(backend.clone()));
    tab_a.load_initial().await;
    tab_b.load_initial().await;

    let cancel = CancellationToken::new();
    let poller = tab_b.run_poller(DEFAULT_POLL_INTERVAL, cancel.clone());

    tab_a.requests.apply(vec![request("r1")]).await.unwrap();

    let mut converged = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if tab_b.requests.snapshot().len() == 1 {
            converged = true;
            break;
        }
    }
    assert!(
        converged,
        "tab B sees the write within the default poll interval"
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), poller)
        .await
        .expect("poller exits promptly after cancellation")
        .unwrap();
}
