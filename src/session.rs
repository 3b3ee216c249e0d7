use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// One recorded clip plus its metadata, keyed by an opaque session id.
///
/// Field names serialize as camelCase: the JSON document on disk and the
/// HTTP API share the same wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub patient_id: String,
    pub assessment: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: i64,
    pub filename: String,
    pub filepath: String,
    pub size: i64,
    /// Server-assigned insertion timestamp. The relational backend fills it
    /// in; the flat-file backend leaves it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Client-supplied upload metadata before the server assigns storage fields.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub session_id: Option<String>,
    pub patient_id: String,
    pub assessment: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: i64,
}

/// The subset of a record safe to expose to clients. Never carries the
/// storage path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSession {
    pub id: String,
    pub patient_id: String,
    pub assessment: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: i64,
    pub size: i64,
}

impl From<&SessionRecord> for PublicSession {
    fn from(record: &SessionRecord) -> Self {
        PublicSession {
            id: record.id.clone(),
            patient_id: record.patient_id.clone(),
            assessment: record.assessment.clone(),
            start_time: record.start_time.clone(),
            end_time: record.end_time.clone(),
            duration_ms: record.duration_ms,
            size: record.size,
        }
    }
}

/// Millisecond sort key for newest-first listings. A record whose startTime
/// does not parse as RFC 3339 sorts as if it were recorded at the epoch.
pub fn start_time_sort_key(start_time: &str) -> i64 {
    DateTime::parse_from_rfc3339(start_time)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}
