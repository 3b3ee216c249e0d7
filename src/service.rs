use log::{error, warn};
use uuid::Uuid;

use crate::blob_store::{content_type_for, BlobStore, StoredBlob};
use crate::config::{RecordStoreKind, ServerConfig};
use crate::constants::MAX_UPLOAD_BYTES;
use crate::db::SqliteRecordStore;
use crate::error::AppError;
use crate::json_store::JsonFileRecordStore;
use crate::record_store::RecordStore;
use crate::session::{PublicSession, SessionRecord, UploadMetadata};

/// Upload metadata after validation, with the session id settled.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub id: String,
    pub patient_id: String,
    pub assessment: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: i64,
}

/// An open blob ready to stream back to a client.
pub struct VideoStream {
    pub file: tokio::fs::File,
    pub size: u64,
    pub content_type: &'static str,
}

/// Orchestrates the blob store and the record store. All blob access is
/// mediated by session id through this service; clients never address the
/// uploads directory directly.
pub struct SessionService {
    blobs: BlobStore,
    records: RecordStore,
}

impl SessionService {
    pub fn new(blobs: BlobStore, records: RecordStore) -> Self {
        Self { blobs, records }
    }

    /// Build the service from configuration, creating the data directory
    /// and opening the configured record backend.
    pub async fn open(config: &ServerConfig) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let blobs = BlobStore::open(config.uploads_dir(), MAX_UPLOAD_BYTES).await?;
        let records = match config.record_store {
            RecordStoreKind::Sqlite => {
                RecordStore::Sqlite(SqliteRecordStore::open(&config.sqlite_path()).await?)
            }
            RecordStoreKind::Jsonfile => {
                RecordStore::JsonFile(JsonFileRecordStore::open(config.json_path()))
            }
        };
        Ok(Self::new(blobs, records))
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn backend_name(&self) -> &'static str {
        self.records.backend_name()
    }

    /// Validate client metadata for an upload. A blank patientId is a hard
    /// failure; a missing session id is synthesized server-side.
    pub fn prepare_upload(&self, metadata: UploadMetadata) -> Result<PreparedUpload, AppError> {
        if metadata.patient_id.trim().is_empty() {
            return Err(AppError::Validation("patientId is required".to_string()));
        }

        let id = metadata
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(PreparedUpload {
            id,
            patient_id: metadata.patient_id,
            assessment: metadata.assessment,
            start_time: metadata.start_time,
            end_time: metadata.end_time,
            duration_ms: metadata.duration_ms.max(0),
        })
    }

    /// Record a session whose blob has already been promoted. The blob is
    /// written first by design: if this record write fails, the blob stays
    /// behind as an orphan (logged, not rolled back) and the store is still
    /// consistent for every other session.
    pub async fn commit_upload(
        &self,
        prepared: PreparedUpload,
        blob: StoredBlob,
    ) -> Result<String, AppError> {
        let record = SessionRecord {
            id: prepared.id,
            patient_id: prepared.patient_id,
            assessment: prepared.assessment,
            start_time: prepared.start_time,
            end_time: prepared.end_time,
            duration_ms: prepared.duration_ms,
            filename: blob.filename,
            filepath: blob.filepath,
            size: blob.size,
            created_at: None,
        };

        if let Err(e) = self.records.upsert(&record).await {
            error!(
                "session record write failed for {}; stored blob {} is orphaned: {}",
                record.id, record.filepath, e
            );
            return Err(e);
        }

        Ok(record.id)
    }

    /// Validate, store, and record a whole clip held in memory. Used by
    /// local tooling and tests; the HTTP path streams chunk-wise instead.
    pub async fn upload_bytes(
        &self,
        metadata: UploadMetadata,
        extension: &str,
        data: &[u8],
    ) -> Result<String, AppError> {
        let prepared = self.prepare_upload(metadata)?;
        let mut writer = self.blobs.stage().await?;
        writer.append(data).await?;
        let staged = writer.finish().await?;
        let stored = self.blobs.promote(staged, &prepared.id, extension).await?;
        self.commit_upload(prepared, stored).await
    }

    /// Public projections of every session, newest first.
    pub async fn list(&self) -> Result<Vec<PublicSession>, AppError> {
        let records = self.records.list_all().await?;
        Ok(records.iter().map(PublicSession::from).collect())
    }

    /// Resolve a session id to its blob for playback. NotFound covers both
    /// a missing record and a record whose file is gone from disk.
    pub async fn fetch_video(&self, id: &str) -> Result<VideoStream, AppError> {
        let record = self
            .records
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

        let (file, size) = self.blobs.get(&record.filepath).await?;
        Ok(VideoStream {
            file,
            size,
            content_type: content_type_for(&record.filename),
        })
    }

    /// Delete a session. The record goes first so a racing fetch never
    /// serves a half-deleted session; blob removal is best-effort and a
    /// failure there does not fail the delete.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let record = self
            .records
            .delete_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if let Err(e) = self.blobs.delete(&record.filepath).await {
            warn!(
                "failed to remove video file {} for deleted session {}: {}",
                record.filepath, record.id, e
            );
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        self.records.count().await
    }
}
