use chrono::{TimeZone, Utc};
use dirproxy_core::core::LAST_ERROR_ATTRIBUTE;
use dirproxy_core::{
    AttributeStore, ErrorKind, ErrorRecord, FileAttributeStore, HealthStatus, ProfileId,
    ServiceError,
};
use std::sync::Arc;

mod common;
use common::{fake_backend::FakeBackend, init_test_logging, memory_store, open_service};

#[tokio::test]
async fn open_failure_is_recorded_and_survives_restart() {
    init_test_logging();

    let store = memory_store();
    let backend = Arc::new(FakeBackend::new());
    backend.fail_profile("corp");

    let service = open_service(backend.clone(), store.clone());
    let before = Utc::now();
    let err = service
        .get_connection(Some("corp"))
        .await
        .expect_err("refused connection must fail");
    let after = Utc::now();

    let ServiceError::ConnectionOpenFailure(raised) = err else {
        panic!("expected an open failure");
    };
    assert_eq!(raised.code(), ErrorKind::ConnectionOpenFailure);
    assert!(raised.message().contains("connection refused"));

    let recorded = service.last_failure(Some("corp")).unwrap().expect("recorded");
    assert_eq!(recorded, raised, "the caller sees exactly what was recorded");
    let at = service.last_failure_time(Some("corp")).unwrap().unwrap();
    assert_eq!(at, raised.occurred_at());
    assert!(before <= at && at <= after);
    service.close().await;

    // ── "restart": a new service instance on the same store ──────────────
    let restarted = open_service(Arc::new(FakeBackend::new()), store.clone());
    assert_eq!(restarted.last_failure(Some("corp")).unwrap(), Some(raised.clone()));
    assert_eq!(restarted.last_failure_time(Some("corp")).unwrap(), Some(at));
    assert_eq!(restarted.all_last_failures().unwrap().len(), 1);
}

#[tokio::test]
async fn newer_failure_overwrites_older_one() {
    init_test_logging();

    let service = open_service(Arc::new(FakeBackend::new()), memory_store());
    let old = ErrorRecord::new(
        ErrorKind::ConnectionOpenFailure,
        "bind timed out",
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
    );
    let new = ErrorRecord::new(
        ErrorKind::ConnectionOpenFailure,
        "certificate expired",
        Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
    );

    service.record_failure(Some("lab"), old).unwrap();
    service.record_failure(Some("lab"), new.clone()).unwrap();

    let all = service.all_last_failures().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all.get(&ProfileId::from("lab")), Some(&new));
}

#[tokio::test]
async fn corrupt_snapshot_means_no_known_failures() {
    init_test_logging();

    for blob in ["{not json", "[]", r#"{"version":1,"failures":{"corp":{"code":"nope"}}}"#, ""] {
        let store = memory_store();
        store
            .write_attribute(LAST_ERROR_ATTRIBUTE, Some(blob))
            .unwrap();

        let service = open_service(Arc::new(FakeBackend::new()), store.clone());
        assert!(
            service.all_last_failures().unwrap().is_empty(),
            "blob {blob:?} should load as empty"
        );
    }
}

#[tokio::test]
async fn snapshot_is_versioned_json() {
    init_test_logging();

    let store = memory_store();
    let service = open_service(Arc::new(FakeBackend::new()), store.clone());
    service
        .record_failure(
            Some("corp"),
            ErrorRecord::new(
                ErrorKind::ConnectionOpenFailure,
                "connection refused",
                Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            ),
        )
        .unwrap();

    let raw = store
        .read_attribute(LAST_ERROR_ATTRIBUTE)
        .unwrap()
        .expect("written through");
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["version"], 1);
    assert_eq!(json["failures"]["corp"]["code"], "connection_open_failure");
    assert_eq!(json["failures"]["corp"]["message"], "connection refused");
}

#[tokio::test]
async fn file_store_persists_across_instances() -> anyhow::Result<()> {
    init_test_logging();

    let dir = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new());
    backend.fail_profile("lab");

    let first = open_service(backend.clone(), Arc::new(FileAttributeStore::at(dir.path())?));
    assert!(first.get_connection(Some("lab")).await.is_err());
    first.close().await;

    let second = open_service(backend, Arc::new(FileAttributeStore::at(dir.path())?));
    let record = second
        .last_failure(Some("lab"))?
        .expect("failure reloaded from disk");
    assert_eq!(record.code(), ErrorKind::ConnectionOpenFailure);

    let store = FileAttributeStore::at(dir.path())?;
    store.write_attribute(LAST_ERROR_ATTRIBUTE, None)?;
    assert_eq!(store.read_attribute(LAST_ERROR_ATTRIBUTE)?, None);
    Ok(())
}

#[tokio::test]
async fn health_reports_failing_and_recovered_profiles() {
    init_test_logging();

    let backend = Arc::new(FakeBackend::new());
    let service = open_service(backend.clone(), memory_store());

    let healthy = service.health_snapshot().unwrap();
    assert_eq!(healthy.len(), 1);
    assert_eq!(healthy[0].status, HealthStatus::Good);

    backend.fail_profile("corp");
    backend.fail_profile("lab");
    assert!(service.get_connection(Some("corp")).await.is_err());
    assert!(service.get_connection(Some("lab")).await.is_err());

    let failing = service.health_snapshot().unwrap();
    assert_eq!(failing.len(), 2);
    assert!(failing.iter().all(|r| r.status == HealthStatus::Warn));
    assert!(failing[0].detail.contains("corp"));
    assert!(failing[0].detail.contains("failing since"));

    backend.heal_profile("lab");
    service.get_connection(Some("lab")).await.unwrap();

    let mixed = service.health_snapshot().unwrap();
    assert_eq!(mixed[0].status, HealthStatus::Warn, "corp still down");
    assert_eq!(mixed[1].status, HealthStatus::Good, "lab recovered");
    assert_eq!(backend.open_count(), 3, "health never probes the backend");
}
