//! Document record storage keyed by `(area, name)`.

use crate::config::Config;
use crate::processing::DocumentRecord;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised by document stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing file could not be read or written.
    #[error("store I/O failed for {path}: {source}")]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Backing file contents could not be decoded or encoded.
    #[error("store file {path} is malformed: {source}")]
    Format {
        /// Backing file.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Whether an upsert created or replaced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed under the key.
    Inserted,
    /// An existing record was replaced.
    Updated,
}

/// Insert-or-update sink for document records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `record` under its natural key.
    async fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, StoreError>;

    /// Fetch the record stored under `(area, name)`.
    async fn get(&self, area: &str, name: &str) -> Result<Option<DocumentRecord>, StoreError>;
}

type RecordMap = BTreeMap<(String, String), DocumentRecord>;

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<RecordMap>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, StoreError> {
        let previous = self
            .records
            .lock()
            .await
            .insert(record.key(), record.clone());
        Ok(if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    async fn get(&self, area: &str, name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&(area.to_string(), name.to_string()))
            .cloned())
    }
}

/// Store persisted as a JSON array in a single file, rewritten on every upsert.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store backed by `path`; the file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<RecordMap, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(RecordMap::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        let records: Vec<DocumentRecord> =
            serde_json::from_slice(&bytes).map_err(|source| self.format_error(source))?;
        Ok(records
            .into_iter()
            .map(|record| (record.key(), record))
            .collect())
    }

    async fn write(&self, records: &RecordMap) -> Result<(), StoreError> {
        let rows: Vec<&DocumentRecord> = records.values().collect();
        let bytes = serde_json::to_vec_pretty(&rows).map_err(|source| self.format_error(source))?;
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn format_error(&self, source: serde_json::Error) -> StoreError {
        StoreError::Format {
            path: self.path.clone(),
            source,
        }
    }

    /// Backing file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn upsert(&self, record: &DocumentRecord) -> Result<UpsertOutcome, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let previous = records.insert(record.key(), record.clone());
        self.write(&records).await?;
        Ok(if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    async fn get(&self, area: &str, name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        Ok(records.remove(&(area.to_string(), name.to_string())))
    }
}

/// Build the store selected by configuration.
pub fn get_document_store(config: &Config) -> Arc<dyn DocumentStore> {
    match &config.store_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using JSON file document store");
            Arc::new(JsonFileStore::new(path.clone()))
        }
        None => {
            tracing::info!("Using in-memory document store");
            Arc::new(MemoryStore::new())
        }
    }
}
