//! Flat-file JSON persistence: one file per collection, each read and
//! written as a whole. Reads fail soft so a missing or damaged file
//! degrades to the seed default instead of taking the app down; writes
//! report failure to the caller as a distinct condition.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use aidlink_types::models::seed_records;
use aidlink_types::Collection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to persist {collection}: {source}")]
    Io {
        collection: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {collection}: {source}")]
    Encode {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        info!("File store rooted at {}", data_dir.display());
        Self { data_dir }
    }

    fn file_path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(format!("{}.json", collection.name()))
    }

    /// Current contents of a collection. Never fails: a missing,
    /// unreadable, or unparseable file yields the seed default (the
    /// single administrator record for users, empty otherwise).
    pub async fn read(&self, collection: Collection) -> Vec<Value> {
        let path = self.file_path(collection);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} has never been written, serving seed", collection);
                return seed_records(collection);
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return seed_records(collection);
            }
        };

        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!("Corrupt collection file {}: {}", path.display(), e);
                seed_records(collection)
            }
        }
    }

    /// Overwrite the entire collection. There is no merge: callers
    /// read-modify-write the full record set.
    pub async fn replace(
        &self,
        collection: Collection,
        records: &[Value],
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records).map_err(|source| StoreError::Encode {
            collection: collection.name(),
            source,
        })?;

        self.write_file(collection, json).await
    }

    /// Prepend a record to the admin log (newest-first ordering) via
    /// read-modify-write of the whole collection.
    pub async fn append_log(&self, record: Value) -> Result<(), StoreError> {
        let mut logs = self.read(Collection::AdminLogs).await;
        logs.insert(0, record);
        self.replace(Collection::AdminLogs, &logs).await
    }

    async fn write_file(&self, collection: Collection, json: String) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            collection: collection.name(),
            source,
        };

        if let Some(parent) = self.file_path(collection).parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        fs::write(self.file_path(collection), json)
            .await
            .map_err(io_err)?;

        debug!("Wrote {}", collection);
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store(tag: &str) -> FileStore {
        let dir = std::env::temp_dir().join(format!("aidlink_store_test_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        FileStore::new(dir)
    }

    #[tokio::test]
    async fn missing_users_file_yields_seeded_admin() {
        let store = temp_store("seed");
        let users = store.read(Collection::Users).await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["id"], "admin-1");
        assert_eq!(users[0]["email"], "admin@example.com");
    }

    #[tokio::test]
    async fn missing_requests_file_yields_empty() {
        let store = temp_store("empty");
        assert!(store.read(Collection::Requests).await.is_empty());
        assert!(store.read(Collection::AdminLogs).await.is_empty());
    }

    #[tokio::test]
    async fn replace_then_read_round_trips() {
        let store = temp_store("rw");
        let records = vec![json!({"id": "r1", "status": "pending"})];
        store.replace(Collection::Requests, &records).await.unwrap();
        assert_eq!(store.read(Collection::Requests).await, records);

        // A second replace fully overwrites, no merge.
        store.replace(Collection::Requests, &[]).await.unwrap();
        assert!(store.read(Collection::Requests).await.is_empty());
    }

    #[tokio::test]
    async fn append_log_prepends_newest_first() {
        let store = temp_store("log");
        store.append_log(json!({"id": "l1"})).await.unwrap();
        store.append_log(json!({"id": "l2"})).await.unwrap();

        let logs = store.read(Collection::AdminLogs).await;
        assert_eq!(logs[0]["id"], "l2");
        assert_eq!(logs[1]["id"], "l1");
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_seed() {
        let store = temp_store("corrupt");
        std::fs::create_dir_all(store.data_dir()).unwrap();
        std::fs::write(store.data_dir().join("users.json"), "not json {").unwrap();

        let users = store.read(Collection::Users).await;
        assert_eq!(users[0]["id"], "admin-1");
    }
}
