//! Session record store tests, run against both backends: the SQLite table
//! and the JSON flat file guarded by the advisory write lock.

use gait_session_server::db::SqliteRecordStore;
use gait_session_server::json_store::JsonFileRecordStore;
use gait_session_server::record_store::RecordStore;
use gait_session_server::session::SessionRecord;

fn sample_record(id: &str, patient_id: &str, start_time: &str) -> SessionRecord {
    SessionRecord {
        id: id.to_string(),
        patient_id: patient_id.to_string(),
        assessment: "good".to_string(),
        start_time: start_time.to_string(),
        end_time: start_time.to_string(),
        duration_ms: 4000,
        filename: format!("{}.webm", id),
        filepath: format!("/tmp/uploads/{}.webm", id),
        size: 1234,
        created_at: None,
    }
}

async fn open_backends() -> Vec<(RecordStore, tempfile::TempDir)> {
    let sqlite_dir = tempfile::TempDir::new().unwrap();
    let sqlite = SqliteRecordStore::open(&sqlite_dir.path().join("sessions.sqlite"))
        .await
        .unwrap();

    let json_dir = tempfile::TempDir::new().unwrap();
    let json = JsonFileRecordStore::open(json_dir.path().join("sessions.json"));

    vec![
        (RecordStore::Sqlite(sqlite), sqlite_dir),
        (RecordStore::JsonFile(json), json_dir),
    ]
}

/// Compare records ignoring the server-assigned insertion timestamp, which
/// only the relational backend fills in.
fn assert_same_session(actual: &SessionRecord, expected: &SessionRecord) {
    let mut actual = actual.clone();
    actual.created_at = None;
    assert_eq!(&actual, expected);
}

#[tokio::test]
async fn upsert_then_get_roundtrip() {
    for (store, _guard) in open_backends().await {
        let record = sample_record("s1", "patient-1", "2024-01-01T10:00:00Z");
        store.upsert(&record).await.unwrap();

        let fetched = store.get_by_id("s1").await.unwrap().unwrap();
        assert_same_session(&fetched, &record);

        assert!(store.get_by_id("missing").await.unwrap().is_none());
    }
}

#[tokio::test]
async fn upsert_same_id_overwrites_all_fields() {
    for (store, _guard) in open_backends().await {
        let first = sample_record("s1", "patient-1", "2024-01-01T10:00:00Z");
        store.upsert(&first).await.unwrap();

        let mut second = sample_record("s1", "patient-2", "2024-02-02T10:00:00Z");
        second.assessment = "poor".to_string();
        second.size = 9999;
        store.upsert(&second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1, "{}", store.backend_name());
        let fetched = store.get_by_id("s1").await.unwrap().unwrap();
        assert_same_session(&fetched, &second);
    }
}

#[tokio::test]
async fn sqlite_backend_assigns_created_at() {
    let (pool, _guard) = gait_session_server::db::create_test_connection_in_temporary_file()
        .await
        .unwrap();
    let store = SqliteRecordStore::from_pool(pool);

    store
        .upsert(&sample_record("s1", "patient-1", "2024-01-01T10:00:00Z"))
        .await
        .unwrap();
    let fetched = store.get_by_id("s1").await.unwrap().unwrap();
    assert!(fetched.created_at.is_some());
}

#[tokio::test]
async fn list_is_sorted_newest_first() {
    for (store, _guard) in open_backends().await {
        // Inserted out of order on purpose
        for (id, start) in [
            ("jan", "2024-01-01T00:00:00Z"),
            ("mar", "2024-03-01T00:00:00Z"),
            ("feb", "2024-02-01T00:00:00Z"),
        ] {
            store.upsert(&sample_record(id, "p", start)).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["mar", "feb", "jan"], "{}", store.backend_name());
    }
}

#[tokio::test]
async fn unparsable_start_time_sorts_as_epoch() {
    for (store, _guard) in open_backends().await {
        store
            .upsert(&sample_record("ok", "p", "2024-03-01T00:00:00Z"))
            .await
            .unwrap();
        store
            .upsert(&sample_record("broken", "p", "not a timestamp"))
            .await
            .unwrap();

        // Listing never throws; the broken record sorts to the end.
        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["ok", "broken"], "{}", store.backend_name());
    }
}

#[tokio::test]
async fn delete_returns_the_record_once() {
    for (store, _guard) in open_backends().await {
        let record = sample_record("s1", "patient-1", "2024-01-01T10:00:00Z");
        store.upsert(&record).await.unwrap();

        let deleted = store.delete_by_id("s1").await.unwrap().unwrap();
        assert_eq!(deleted.filepath, record.filepath);

        assert!(store.get_by_id("s1").await.unwrap().is_none());
        assert!(store.delete_by_id("s1").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}

#[tokio::test]
async fn delete_unknown_id_changes_nothing() {
    for (store, _guard) in open_backends().await {
        store
            .upsert(&sample_record("keep", "p", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert!(store.delete_by_id("missing").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get_by_id("keep").await.unwrap().is_some());
    }
}

#[tokio::test]
async fn concurrent_upserts_to_different_ids_lose_nothing() {
    for (store, _guard) in open_backends().await {
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("session-{}", i);
                let start = format!("2024-01-0{}T00:00:00Z", i + 1);
                store
                    .upsert(&sample_record(&id, &format!("patient-{}", i), &start))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 8, "{}", store.backend_name());
        for i in 0..8 {
            let record = store
                .get_by_id(&format!("session-{}", i))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(record.patient_id, format!("patient-{}", i));
        }
    }
}

#[tokio::test]
async fn json_store_rereads_the_document_for_every_call() {
    // Two handles over the same file, as two connections on one server (or
    // two sequential processes) would hold. Writes through one must be
    // visible through the other without any shared in-memory state.
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("sessions.json");
    let writer = JsonFileRecordStore::open(&path);
    let reader = JsonFileRecordStore::open(&path);

    writer
        .upsert(&sample_record("s1", "patient-1", "2024-01-01T10:00:00Z"))
        .await
        .unwrap();
    assert_eq!(reader.count().await.unwrap(), 1);

    reader.delete_by_id("s1").await.unwrap().unwrap();
    assert_eq!(writer.count().await.unwrap(), 0);
}

#[tokio::test]
async fn json_document_matches_the_wire_format() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("sessions.json");
    let store = JsonFileRecordStore::open(&path);

    store
        .upsert(&sample_record("s1", "patient-1", "2024-01-01T10:00:00Z"))
        .await
        .unwrap();

    let document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let entry = &document["sessions"]["s1"];
    assert_eq!(entry["patientId"], "patient-1");
    assert_eq!(entry["durationMs"], 4000);
    assert_eq!(entry["filename"], "s1.webm");
}
