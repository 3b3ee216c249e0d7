use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{sleep, Duration};

use crate::constants::{EXPECTED_DB_VERSION, LOCK_RETRY_ATTEMPTS, LOCK_RETRY_DELAY_MS};
use crate::error::AppError;
use crate::session::{start_time_sort_key, SessionRecord};

/// The whole collection serialized as one JSON document: a keyed mapping of
/// session id to record, plus a format version.
#[derive(Debug, Serialize, Deserialize)]
struct SessionsDocument {
    version: String,
    sessions: BTreeMap<String, SessionRecord>,
}

impl SessionsDocument {
    fn empty() -> Self {
        SessionsDocument {
            version: EXPECTED_DB_VERSION.to_string(),
            sessions: BTreeMap::new(),
        }
    }
}

/// In-process advisory write lock with bounded retry.
///
/// Cooperative only: it serializes write-backs within this process, not
/// across processes. A sibling process mutating the same document can still
/// interleave with us; that risk is accepted for the flat-file backend.
#[derive(Clone, Default)]
pub struct AdvisoryLock {
    inner: Arc<Mutex<()>>,
}

impl AdvisoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, retrying briefly instead of blocking without bound.
    pub async fn acquire(&self) -> Result<OwnedMutexGuard<()>, AppError> {
        for _ in 0..LOCK_RETRY_ATTEMPTS {
            match self.inner.clone().try_lock_owned() {
                Ok(guard) => return Ok(guard),
                Err(_) => sleep(Duration::from_millis(LOCK_RETRY_DELAY_MS)).await,
            }
        }
        Err(AppError::LockTimeout(
            "advisory write lock was not released in time".to_string(),
        ))
    }
}

/// Flat-file session record store: one JSON document per deployment.
///
/// Every operation re-reads the document from disk so that writes made
/// through a sibling store handle are visible; nothing is cached between
/// calls. Mutations run read-modify-write under the advisory lock and
/// replace the document through a temp file + rename.
#[derive(Clone)]
pub struct JsonFileRecordStore {
    path: PathBuf,
    lock: AdvisoryLock,
}

impl JsonFileRecordStore {
    /// A store handle for the document at `path`. The file is created lazily
    /// on the first write; a missing file reads as an empty collection.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: AdvisoryLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<SessionsDocument, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionsDocument::empty())
            }
            Err(e) => return Err(e.into()),
        };

        // A corrupt document is surfaced, never silently reset: resetting
        // would clobber every session on the next write-back.
        let document: SessionsDocument = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Storage(format!(
                "session document {} is unreadable: {}",
                self.path.display(),
                e
            ))
        })?;

        if document.version != EXPECTED_DB_VERSION {
            return Err(AppError::Storage(format!(
                "unsupported session document version '{}', expected '{}'",
                document.version, EXPECTED_DB_VERSION
            )));
        }

        Ok(document)
    }

    fn write_document(&self, document: &SessionsDocument) -> Result<(), AppError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, document)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| {
            AppError::Storage(format!(
                "failed to replace session document {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Insert the record, or replace all fields if the id already exists.
    pub async fn upsert(&self, record: &SessionRecord) -> Result<(), AppError> {
        let _guard = self.lock.acquire().await?;
        let mut document = self.read_document().await?;
        document.sessions.insert(record.id.clone(), record.clone());
        self.write_document(&document)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        Ok(self.read_document().await?.sessions.get(id).cloned())
    }

    /// All records, newest first by start time.
    pub async fn list_all(&self) -> Result<Vec<SessionRecord>, AppError> {
        let document = self.read_document().await?;
        let mut records: Vec<SessionRecord> = document.sessions.into_values().collect();
        records.sort_by_key(|r| std::cmp::Reverse(start_time_sort_key(&r.start_time)));
        Ok(records)
    }

    /// Remove the record and return it so the caller can locate its blob.
    pub async fn delete_by_id(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        let _guard = self.lock.acquire().await?;
        let mut document = self.read_document().await?;
        let removed = document.sessions.remove(id);
        if removed.is_some() {
            self.write_document(&document)?;
        }
        Ok(removed)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        Ok(self.read_document().await?.sessions.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acquire_times_out_when_held() {
        let lock = AdvisoryLock::new();
        let _held = lock.acquire().await.unwrap();

        let result = lock.acquire().await;
        assert!(matches!(result, Err(AppError::LockTimeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_succeeds_after_release() {
        let lock = AdvisoryLock::new();
        let held = lock.acquire().await.unwrap();

        let contender = lock.clone();
        let waiter = tokio::spawn(async move { contender.acquire().await.is_ok() });

        sleep(Duration::from_millis(50)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileRecordStore::open(dir.path().join("sessions.json"));
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error_not_a_reset() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileRecordStore::open(&path);
        assert!(matches!(
            store.count().await,
            Err(AppError::Storage(_))
        ));
        // The broken document is still on disk, untouched.
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
    }
}
