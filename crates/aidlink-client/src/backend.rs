//! Storage backend seam for the sync layer. The real app talks HTTP to
//! the collection endpoints; tests share one in-memory store between
//! several simulated tabs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use aidlink_types::Collection;
use aidlink_types::models::seed_records;

#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Authoritative contents of a collection.
    async fn fetch(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Replace the whole collection.
    async fn replace(&self, collection: Collection, records: Vec<Value>) -> Result<()>;

    /// Append one record to the admin log; the store prepends it.
    async fn append_log(&self, record: Value) -> Result<()>;
}

/// HTTP backend against the `/api/{users,requests,admin/logs}` routes.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, collection: Collection) -> String {
        format!("{}/api/{}", self.base_url, collection.route_path())
    }
}

#[async_trait]
impl StoreBackend for HttpBackend {
    async fn fetch(&self, collection: Collection) -> Result<Vec<Value>> {
        let records = self
            .client
            .get(self.url(collection))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(records)
    }

    async fn replace(&self, collection: Collection, records: Vec<Value>) -> Result<()> {
        self.client
            .post(self.url(collection))
            .json(&records)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn append_log(&self, record: Value) -> Result<()> {
        self.client
            .post(self.url(Collection::AdminLogs))
            .json(&record)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// In-memory backend with the same seeding behavior as the file store.
/// Clones share state, so several `SyncClient`s over clones of one
/// `MemoryBackend` behave like browser tabs against one server.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    collections: Arc<Mutex<HashMap<Collection, Vec<Value>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until cleared; reads keep working. Lets
    /// tests exercise the persist-failure policy.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Collection, Vec<Value>>> {
        self.collections.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn fetch(&self, collection: Collection) -> Result<Vec<Value>> {
        Ok(self
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_else(|| seed_records(collection)))
    }

    async fn replace(&self, collection: Collection, records: Vec<Value>) -> Result<()> {
        self.check_writable()?;
        self.lock().insert(collection, records);
        Ok(())
    }

    async fn append_log(&self, record: Value) -> Result<()> {
        self.check_writable()?;
        let mut collections = self.lock();
        let logs = collections.entry(Collection::AdminLogs).or_default();
        logs.insert(0, record);
        Ok(())
    }
}
