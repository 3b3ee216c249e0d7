use sea_query::{Expr, Func, OnConflict, Order, Query, SqliteQueryBuilder};

use crate::schema::Sessions;
use crate::session::SessionRecord;

/// INSERT INTO sessions (id, patient_id, assessment, start_time, end_time,
/// duration_ms, start_time_ms, filename, filepath, size) VALUES (...)
/// ON CONFLICT (id) DO UPDATE SET <all columns except id and created_at>
///
/// A re-upload with the same id replaces every client- and server-assigned
/// field but keeps the original created_at.
pub fn upsert(record: &SessionRecord, start_time_ms: i64) -> String {
    Query::insert()
        .into_table(Sessions::Table)
        .columns([
            Sessions::Id,
            Sessions::PatientId,
            Sessions::Assessment,
            Sessions::StartTime,
            Sessions::EndTime,
            Sessions::DurationMs,
            Sessions::StartTimeMs,
            Sessions::Filename,
            Sessions::Filepath,
            Sessions::Size,
        ])
        .values_panic([
            record.id.as_str().into(),
            record.patient_id.as_str().into(),
            record.assessment.as_str().into(),
            record.start_time.as_str().into(),
            record.end_time.as_str().into(),
            record.duration_ms.into(),
            start_time_ms.into(),
            record.filename.as_str().into(),
            record.filepath.as_str().into(),
            record.size.into(),
        ])
        .on_conflict(
            OnConflict::column(Sessions::Id)
                .update_columns([
                    Sessions::PatientId,
                    Sessions::Assessment,
                    Sessions::StartTime,
                    Sessions::EndTime,
                    Sessions::DurationMs,
                    Sessions::StartTimeMs,
                    Sessions::Filename,
                    Sessions::Filepath,
                    Sessions::Size,
                ])
                .to_owned(),
        )
        .to_string(SqliteQueryBuilder)
}

/// SELECT id, patient_id, assessment, start_time, end_time, duration_ms,
/// filename, filepath, size, created_at FROM sessions WHERE id = ?
pub fn select_by_id(id: &str) -> String {
    Query::select()
        .columns(RECORD_COLUMNS)
        .from(Sessions::Table)
        .and_where(Expr::col(Sessions::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT <record columns> FROM sessions ORDER BY start_time_ms DESC
pub fn select_all_newest_first() -> String {
    Query::select()
        .columns(RECORD_COLUMNS)
        .from(Sessions::Table)
        .order_by(Sessions::StartTimeMs, Order::Desc)
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM sessions WHERE id = ?
pub fn delete_by_id(id: &str) -> String {
    Query::delete()
        .from_table(Sessions::Table)
        .and_where(Expr::col(Sessions::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(id) FROM sessions
pub fn count() -> String {
    Query::select()
        .expr(Func::count(Expr::col(Sessions::Id)))
        .from(Sessions::Table)
        .to_string(SqliteQueryBuilder)
}

/// Column order shared by the row-to-record mapping in db.rs.
const RECORD_COLUMNS: [Sessions; 10] = [
    Sessions::Id,
    Sessions::PatientId,
    Sessions::Assessment,
    Sessions::StartTime,
    Sessions::EndTime,
    Sessions::DurationMs,
    Sessions::Filename,
    Sessions::Filepath,
    Sessions::Size,
    Sessions::CreatedAt,
];
