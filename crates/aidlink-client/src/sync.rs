//! Poll/reconcile state synchronization. Each collection has a local
//! cache in a watch channel; user actions update the cache first and
//! persist afterwards (optimistic), while a fixed-interval poller
//! re-fetches the store and replaces the cache when it differs. The
//! fetched version wins on mismatch — last-fetch-wins, no versioning —
//! except that a poll result is discarded if a local write landed while
//! the fetch was in flight, so a stale snapshot never clobbers a write
//! that has not reached the store yet.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aidlink_types::models::new_id;
use aidlink_types::{AdminLog, Collection, HelpRequest, User};

use crate::backend::StoreBackend;
use crate::error::ClientError;

/// Reference poll interval: one second, matching the original scheme.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One collection's local cache plus its sync machinery.
pub struct CollectionHandle<T> {
    collection: Collection,
    backend: Arc<dyn StoreBackend>,
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    cache: watch::Sender<Vec<T>>,
    /// Bumped on every local write; a poll started before the bump must
    /// not overwrite the cache.
    revision: Mutex<u64>,
    /// Serializes persistence of optimistic writes in issuance order.
    persist_lock: tokio::sync::Mutex<()>,
}

impl<T> Clone for CollectionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection,
            backend: Arc::clone(&self.backend),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> CollectionHandle<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    fn new(collection: Collection, backend: Arc<dyn StoreBackend>) -> Self {
        let (cache, _) = watch::channel(Vec::new());
        Self {
            collection,
            backend,
            shared: Arc::new(Shared {
                cache,
                revision: Mutex::new(0),
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.shared.cache.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.shared.cache.subscribe()
    }

    fn revision(&self) -> MutexGuard<'_, u64> {
        self.shared.revision.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the local cache without persisting. Counts as a local
    /// write for poll reconciliation purposes (used when a fresh
    /// authoritative fetch, e.g. at login, is installed directly).
    pub fn replace_local(&self, records: Vec<T>) {
        let mut revision = self.revision();
        *revision += 1;
        self.shared.cache.send_replace(records);
    }

    /// Optimistic write: the cache is updated synchronously, before any
    /// await, so this tab sees its own action immediately; persistence
    /// follows. On persist failure the local state is retained — the
    /// next poll reconciles truth once the store recovers.
    pub async fn apply(&self, records: Vec<T>) -> Result<(), ClientError> {
        {
            let mut revision = self.revision();
            *revision += 1;
            self.shared.cache.send_replace(records.clone());
        }

        let correlation_id = new_id();
        let values = match encode(&records) {
            Ok(values) => values,
            Err(e) => {
                warn!(
                    "Could not encode {} write {}: {}",
                    self.collection, correlation_id, e
                );
                return Err(ClientError::PersistFailure { correlation_id });
            }
        };

        let _guard = self.shared.persist_lock.lock().await;
        if let Err(e) = self.backend.replace(self.collection, values).await {
            warn!(
                "Persist of {} write {} failed, keeping optimistic state: {:#}",
                self.collection, correlation_id, e
            );
            return Err(ClientError::PersistFailure { correlation_id });
        }

        Ok(())
    }

    /// One poll tick: fetch, diff, replace on change. Fetch or decode
    /// failures are skipped until the next tick.
    pub async fn poll_once(&self) {
        let revision_before = *self.revision();

        let values = match self.backend.fetch(self.collection).await {
            Ok(values) => values,
            Err(e) => {
                debug!("Poll fetch of {} failed, skipping: {:#}", self.collection, e);
                return;
            }
        };

        let fetched: Vec<T> = match serde_json::from_value(Value::Array(values)) {
            Ok(records) => records,
            Err(e) => {
                warn!("Poll of {} returned undecodable data: {}", self.collection, e);
                return;
            }
        };

        let revision = self.revision();
        if *revision != revision_before {
            debug!(
                "Local write to {} raced the poll, discarding fetched snapshot",
                self.collection
            );
            return;
        }

        let changed = *self.shared.cache.borrow() != fetched;
        if changed {
            self.shared.cache.send_replace(fetched);
        }
    }
}

fn encode<T: Serialize>(records: &[T]) -> Result<Vec<Value>, serde_json::Error> {
    records.iter().map(serde_json::to_value).collect()
}

/// The three typed collection caches of one tab.
#[derive(Clone)]
pub struct SyncClient {
    pub users: CollectionHandle<User>,
    pub requests: CollectionHandle<HelpRequest>,
    pub admin_logs: CollectionHandle<AdminLog>,
    backend: Arc<dyn StoreBackend>,
}

impl SyncClient {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            users: CollectionHandle::new(Collection::Users, Arc::clone(&backend)),
            requests: CollectionHandle::new(Collection::Requests, Arc::clone(&backend)),
            admin_logs: CollectionHandle::new(Collection::AdminLogs, Arc::clone(&backend)),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Startup load: fetch each collection once. A failed fetch leaves
    /// that cache empty rather than blocking anything.
    pub async fn load_initial(&self) {
        info!("Loading initial collection state");
        self.poll_all().await;
    }

    pub async fn poll_all(&self) {
        self.users.poll_once().await;
        self.requests.poll_once().await;
        self.admin_logs.poll_once().await;
    }

    /// Background poll loop. Cancelling the token stops it cleanly; an
    /// in-flight fetch is dropped mid-way, discarding its result.
    pub fn run_poller(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so ticks land
            // one interval after startup, like the original timer.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = client.poll_all() => {}
                        }
                    }
                }
            }
            debug!("Poller stopped");
        })
    }
}
