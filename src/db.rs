use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

use crate::constants::EXPECTED_DB_VERSION;
use crate::error::AppError;
use crate::queries::{ddl, metadata, sessions};
use crate::session::{start_time_sort_key, SessionRecord};

/// Open (creating if needed) a session database in WAL mode.
pub async fn open_database_connection(db_path: &Path) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create tables and indexes, then stamp or verify the schema version.
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(&ddl::create_metadata_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_sessions_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_sessions_start_time_index())
        .execute(pool)
        .await?;

    let sql = metadata::select_by_key("version");
    let version: Option<String> = sqlx::query_scalar(&sql).fetch_optional(pool).await?;

    match version {
        Some(v) if v != EXPECTED_DB_VERSION => Err(AppError::Storage(format!(
            "unsupported database version '{}', expected '{}'",
            v, EXPECTED_DB_VERSION
        ))),
        Some(_) => Ok(()),
        None => {
            let sql = metadata::upsert("version", EXPECTED_DB_VERSION);
            sqlx::query(&sql).execute(pool).await?;
            Ok(())
        }
    }
}

/// Relational session record store: a single sessions table with id as the
/// primary key. Upserts are one statement, so every operation is atomic and
/// safe under concurrent connections.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open the database file and prepare the schema.
    pub async fn open(db_path: &Path) -> Result<Self, AppError> {
        let pool = open_database_connection(db_path).await?;
        init_database_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the record, or replace all fields if the id already exists.
    pub async fn upsert(&self, record: &SessionRecord) -> Result<(), AppError> {
        let sql = sessions::upsert(record, start_time_sort_key(&record.start_time));
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        let sql = sessions::select_by_id(id);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(record_from_row).transpose()
    }

    /// All records, newest first by start time.
    pub async fn list_all(&self) -> Result<Vec<SessionRecord>, AppError> {
        let sql = sessions::select_all_newest_first();
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Remove the row and return it so the caller can locate its blob.
    pub async fn delete_by_id(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = sessions::select_by_id(id);
        let row = sqlx::query(&sql).fetch_optional(&mut *tx).await?;
        let record = row.as_ref().map(record_from_row).transpose()?;

        if record.is_some() {
            let sql = sessions::delete_by_id(id);
            sqlx::query(&sql).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(record)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let sql = sessions::count();
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

/// Map a row fetched with the RECORD_COLUMNS order back into a record.
fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, AppError> {
    Ok(SessionRecord {
        id: row.try_get(0)?,
        patient_id: row.try_get(1)?,
        assessment: row.try_get(2)?,
        start_time: row.try_get(3)?,
        end_time: row.try_get(4)?,
        duration_ms: row.try_get(5)?,
        filename: row.try_get(6)?,
        filepath: row.try_get(7)?,
        size: row.try_get(8)?,
        created_at: row.try_get(9)?,
    })
}

/// Create a pool backed by a database file inside a temporary directory.
/// Returns the directory guard; keep it alive for the lifetime of the pool.
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), AppError> {
    let dir = tempfile::TempDir::new()?;
    let pool = open_database_connection(&dir.path().join("test.sqlite")).await?;
    init_database_schema(&pool).await?;
    Ok((pool, dir))
}
