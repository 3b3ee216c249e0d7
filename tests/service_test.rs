//! Session service tests below the HTTP layer: validation, orchestration of
//! blob + record writes, and delete semantics.

use tokio::io::AsyncReadExt;

use gait_session_server::config::{RecordStoreKind, ServerConfig};
use gait_session_server::error::AppError;
use gait_session_server::service::SessionService;
use gait_session_server::session::UploadMetadata;

async fn open_service(kind: RecordStoreKind) -> (SessionService, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().unwrap();
    let config = ServerConfig {
        port: 0,
        data_dir: dir.path().to_path_buf(),
        record_store: kind,
    };
    let service = SessionService::open(&config).await.unwrap();
    (service, dir)
}

fn metadata(session_id: Option<&str>, patient_id: &str) -> UploadMetadata {
    UploadMetadata {
        session_id: session_id.map(str::to_string),
        patient_id: patient_id.to_string(),
        assessment: "good".to_string(),
        start_time: "2024-01-01T10:00:00Z".to_string(),
        end_time: "2024-01-01T10:00:04Z".to_string(),
        duration_ms: 4000,
    }
}

#[tokio::test]
async fn upload_then_fetch_returns_identical_bytes() {
    for kind in [RecordStoreKind::Sqlite, RecordStoreKind::Jsonfile] {
        let (service, _guard) = open_service(kind).await;

        let id = service
            .upload_bytes(metadata(Some("clip-1"), "patient-1"), "webm", b"payload")
            .await
            .unwrap();
        assert_eq!(id, "clip-1");

        let video = service.fetch_video("clip-1").await.unwrap();
        assert_eq!(video.size, 7);
        assert_eq!(video.content_type, "video/webm");

        let mut file = video.file;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"payload");
    }
}

#[tokio::test]
async fn blank_patient_id_fails_validation() {
    let (service, _guard) = open_service(RecordStoreKind::Sqlite).await;

    let result = service
        .upload_bytes(metadata(Some("clip-1"), "  "), "webm", b"payload")
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(service.count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_session_id_is_synthesized() {
    let (service, _guard) = open_service(RecordStoreKind::Sqlite).await;

    let id = service
        .upload_bytes(metadata(None, "patient-1"), "webm", b"payload")
        .await
        .unwrap();
    assert!(!id.is_empty());

    let listed = service.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
}

#[tokio::test]
async fn negative_duration_is_stored_as_zero() {
    let (service, _guard) = open_service(RecordStoreKind::Sqlite).await;

    let mut meta = metadata(Some("clip-1"), "patient-1");
    meta.duration_ms = -250;
    service.upload_bytes(meta, "webm", b"payload").await.unwrap();

    let listed = service.list().await.unwrap();
    assert_eq!(listed[0].duration_ms, 0);
}

#[tokio::test]
async fn fetch_after_delete_is_not_found() {
    for kind in [RecordStoreKind::Sqlite, RecordStoreKind::Jsonfile] {
        let (service, _guard) = open_service(kind).await;

        service
            .upload_bytes(metadata(Some("clip-1"), "patient-1"), "webm", b"payload")
            .await
            .unwrap();
        service.delete("clip-1").await.unwrap();

        assert!(matches!(
            service.fetch_video("clip-1").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.delete("clip-1").await,
            Err(AppError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn public_listing_never_exposes_paths() {
    let (service, _guard) = open_service(RecordStoreKind::Jsonfile).await;

    service
        .upload_bytes(metadata(Some("clip-1"), "patient-1"), "webm", b"payload")
        .await
        .unwrap();

    let listed = service.list().await.unwrap();
    let value = serde_json::to_value(&listed).unwrap();
    let entry = value.as_array().unwrap()[0].as_object().unwrap();
    assert!(!entry.contains_key("filepath"));
    assert!(!entry.contains_key("filename"));
}
