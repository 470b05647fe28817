//! Record store integration tests.

use labreport_core::models::{AnalysisRecord, FilePayload, PatientInfo, RecordParts};
use labreport_core::store::{RecordStore, SqliteRecordStore, StorageFault};
use labreport_core::testing::run_store_conformance_tests;

fn make_record(label: &str, timestamp: i64) -> AnalysisRecord {
    AnalysisRecord::restore(RecordParts {
        id: format!("record-{}", label),
        timestamp,
        files: vec![FilePayload::from_bytes(
            format!("{}.jpg", label),
            "image/jpeg",
            b"\xff\xd8\xff\xe0",
        )],
        patient_info: Some(PatientInfo::named("李四")),
        analysis_result: format!("**检测项目**: {}\n结果正常", label),
        summary: label.to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_file_store_conformance() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteRecordStore::open(dir.path().join("records.sqlite3")).unwrap();
    run_store_conformance_tests(&store).await.unwrap();
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.sqlite3");

    let first = make_record("血常规", 1_700_000_000_000);
    let second = make_record("肝功能", 1_700_000_100_000);
    {
        let store = SqliteRecordStore::open(&path).unwrap();
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
    }

    let reopened = SqliteRecordStore::open(&path).unwrap();
    let records = reopened.list_all().await.unwrap();
    assert_eq!(records, vec![first, second]);
    assert_eq!(records[0].files()[0].decode().unwrap(), b"\xff\xd8\xff\xe0");
}

#[tokio::test]
async fn test_delete_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.sqlite3");

    let keep = make_record("尿常规", 1);
    let removed = make_record("甲功", 2);
    {
        let store = SqliteRecordStore::open(&path).unwrap();
        store.save(&keep).await.unwrap();
        store.save(&removed).await.unwrap();
        store.delete_by_id(removed.id()).await.unwrap();
    }

    let reopened = SqliteRecordStore::open(&path).unwrap();
    reopened.delete_by_id(removed.id()).await.unwrap();
    assert_eq!(reopened.list_all().await.unwrap(), vec![keep]);
}

#[tokio::test]
async fn test_duplicate_id_keeps_original() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    let original = make_record("血脂", 10);

    let mut parts = make_record("血脂", 20).into_parts();
    parts.analysis_result = "overwritten".into();
    let impostor = AnalysisRecord::restore(parts).unwrap();

    store.save(&original).await.unwrap();
    let err = store.save(&impostor).await.unwrap_err();
    assert_eq!(err, StorageFault::DuplicateId(original.id().to_string()));
    assert!(err.is_invariant_violation());

    let records = store.list_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].analysis_result(), original.analysis_result());
}

#[test]
fn test_record_without_files_cannot_be_restored() {
    let mut parts = make_record("空", 1).into_parts();
    parts.files.clear();
    assert!(AnalysisRecord::restore(parts).is_err());
}
