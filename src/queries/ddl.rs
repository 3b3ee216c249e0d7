use sea_query::{ColumnDef, Expr, Index, SqliteQueryBuilder, Table};

use crate::schema::{Metadata, Sessions};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS sessions (
///     id TEXT PRIMARY KEY,
///     patient_id TEXT NOT NULL,
///     assessment TEXT NOT NULL,
///     start_time TEXT NOT NULL,
///     end_time TEXT NOT NULL,
///     duration_ms INTEGER NOT NULL DEFAULT 0,
///     start_time_ms INTEGER NOT NULL DEFAULT 0,
///     filename TEXT NOT NULL,
///     filepath TEXT NOT NULL,
///     size INTEGER NOT NULL DEFAULT 0,
///     created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
/// )
///
/// start_time_ms is the parsed start_time in epoch milliseconds (0 when the
/// client sent something unparsable) so listings can order in SQL.
pub fn create_sessions_table() -> String {
    Table::create()
        .table(Sessions::Table)
        .if_not_exists()
        .col(ColumnDef::new(Sessions::Id).string().primary_key())
        .col(ColumnDef::new(Sessions::PatientId).string().not_null())
        .col(ColumnDef::new(Sessions::Assessment).string().not_null())
        .col(ColumnDef::new(Sessions::StartTime).string().not_null())
        .col(ColumnDef::new(Sessions::EndTime).string().not_null())
        .col(
            ColumnDef::new(Sessions::DurationMs)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(Sessions::StartTimeMs)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(Sessions::Filename).string().not_null())
        .col(ColumnDef::new(Sessions::Filepath).string().not_null())
        .col(
            ColumnDef::new(Sessions::Size)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(Sessions::CreatedAt)
                .string()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_sessions_start_time_ms ON sessions(start_time_ms)
pub fn create_sessions_start_time_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_sessions_start_time_ms")
        .table(Sessions::Table)
        .col(Sessions::StartTimeMs)
        .to_string(SqliteQueryBuilder)
}
