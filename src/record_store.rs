use crate::db::SqliteRecordStore;
use crate::error::AppError;
use crate::json_store::JsonFileRecordStore;
use crate::session::SessionRecord;

/// The configured session record backend. Exactly one backend per
/// deployment; the two are never blended or fallen back between.
#[derive(Clone)]
pub enum RecordStore {
    Sqlite(SqliteRecordStore),
    JsonFile(JsonFileRecordStore),
}

impl RecordStore {
    /// Insert the record, or replace all fields if the id already exists.
    pub async fn upsert(&self, record: &SessionRecord) -> Result<(), AppError> {
        match self {
            RecordStore::Sqlite(store) => store.upsert(record).await,
            RecordStore::JsonFile(store) => store.upsert(record).await,
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        match self {
            RecordStore::Sqlite(store) => store.get_by_id(id).await,
            RecordStore::JsonFile(store) => store.get_by_id(id).await,
        }
    }

    /// All records, newest first by start time.
    pub async fn list_all(&self) -> Result<Vec<SessionRecord>, AppError> {
        match self {
            RecordStore::Sqlite(store) => store.list_all().await,
            RecordStore::JsonFile(store) => store.list_all().await,
        }
    }

    /// Remove the record and return it so the caller can locate its blob.
    pub async fn delete_by_id(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        match self {
            RecordStore::Sqlite(store) => store.delete_by_id(id).await,
            RecordStore::JsonFile(store) => store.delete_by_id(id).await,
        }
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        match self {
            RecordStore::Sqlite(store) => store.count().await,
            RecordStore::JsonFile(store) => store.count().await,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            RecordStore::Sqlite(_) => "sqlite",
            RecordStore::JsonFile(_) => "jsonfile",
        }
    }
}
