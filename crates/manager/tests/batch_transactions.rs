//! Batches in both modes and caller-driven transactions

mod common;

use cfgstore::{BatchMode, BatchOperation, ErrorCode, Record, StorageFormat};
use common::{device, device_dir, dir_contents, DeviceConfig, TestManagerBuilder};
use serde_json::json;

#[tokio::test]
async fn test_lenient_batch_reports_each_failure() {
    let (manager, _dir) = TestManagerBuilder::new().build();

    let result = manager
        .create_batch(
            vec![
                device("d1", "One", 1),
                device("d2", "Two", 0),
                device("d3", "Three", 3),
            ],
            Some(BatchMode::Lenient),
        )
        .await
        .unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert!(result.is_partially_successful());
    assert!(result.failures["create:d2"].contains("port must be non-zero"));

    assert!(manager.exists::<DeviceConfig>("d1").await.unwrap());
    assert!(!manager.exists::<DeviceConfig>("d2").await.unwrap());
    assert!(manager.exists::<DeviceConfig>("d3").await.unwrap());
}

#[tokio::test]
async fn test_lenient_delete_batch_tolerates_absent_ids() {
    let (manager, _dir) = TestManagerBuilder::new().build();
    manager
        .create("d1", |id| device(id, "One", 1))
        .await
        .unwrap();

    let result = manager
        .delete_batch::<DeviceConfig>(vec!["d1".into(), "nope".into()], None)
        .await
        .unwrap();
    assert!(result.is_fully_successful());
    assert_eq!(result.success_count, 2);
}

#[tokio::test]
async fn test_strict_batch_failure_restores_files_cache_and_index() {
    let (manager, dir) = TestManagerBuilder::new().build();
    let original = manager
        .create("A1", |id| device(id, "Foo", 8080))
        .await
        .unwrap();
    manager
        .create("A2", |id| device(id, "Bar", 8081))
        .await
        .unwrap();
    let before = dir_contents(&device_dir(dir.path()));

    let mut changed = original.clone();
    changed.port = 9;
    let err = manager
        .execute_batch(
            vec![
                BatchOperation::Update(changed),
                BatchOperation::Create(device("B1", "New", 1)),
                BatchOperation::Delete("A2".into()),
                BatchOperation::Create(device("B2", "Invalid", 0)),
                BatchOperation::Create(device("B3", "Never", 3)),
            ],
            Some(BatchMode::Strict),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::BatchPartialFailure);
    assert_eq!(err.root_code(), ErrorCode::ValidationFailed);
    match &err {
        cfgstore::Error::BatchPartialFailure {
            operation,
            completed,
            ..
        } => {
            assert_eq!(operation, "create:B2");
            assert_eq!(*completed, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(dir_contents(&device_dir(dir.path())), before);

    let a1 = manager.get::<DeviceConfig>("A1").await.unwrap();
    assert_eq!(a1.port, 8080);
    assert_eq!(a1.version(), 1);
    assert_eq!(manager.get::<DeviceConfig>("A2").await.unwrap().port, 8081);
    assert!(!manager.exists::<DeviceConfig>("B1").await.unwrap());
    assert!(!manager.exists::<DeviceConfig>("B3").await.unwrap());

    let index = manager.index_entries::<DeviceConfig>().await.unwrap();
    let mut ids: Vec<_> = index.keys().cloned().collect();
    ids.sort();
    assert_eq!(ids, vec!["A1".to_string(), "A2".to_string()]);

    let stats = manager.statistics().transactions;
    assert_eq!(stats.begun, 1);
    assert_eq!(stats.rolled_back, 1);
    assert_eq!(stats.committed, 0);
}

#[tokio::test]
async fn test_strict_batch_rollback_removes_files_it_created() {
    let (manager, dir) = TestManagerBuilder::new()
        .with_format(StorageFormat::SingleObject)
        .with_scan_all(true)
        .build();
    let devices = device_dir(dir.path());

    let err = manager
        .create_batch(
            vec![device("A1", "Foo", 1), device("A2", "Bar", 0)],
            Some(BatchMode::Strict),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::BatchPartialFailure);

    assert!(!devices.join("A1.json").exists());
    assert!(dir_contents(&devices).is_empty());
    assert!(!manager.exists::<DeviceConfig>("A1").await.unwrap());
    assert!(manager.get::<DeviceConfig>("A1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_strict_batch_success_commits() {
    let (manager, _dir) = TestManagerBuilder::new().build();
    let result = manager
        .add_batch(
            vec![device("A1", "Foo", 1), device("A2", "Bar", 2)],
            false,
            Some(BatchMode::Strict),
        )
        .await
        .unwrap();

    assert!(result.is_fully_successful());
    assert_eq!(result.success_count, 2);
    assert_eq!(manager.get_all::<DeviceConfig>().await.unwrap().len(), 2);

    let stats = manager.statistics().transactions;
    assert_eq!(stats.committed, 1);
    assert_eq!(stats.rolled_back, 0);
}

#[tokio::test]
async fn test_batch_mode_defaults_to_configuration() {
    let (manager, _dir) = TestManagerBuilder::new()
        .with_batch_mode(BatchMode::Strict)
        .build();

    let err = manager
        .create_batch(vec![device("A1", "Foo", 1), device("A2", "Bar", 0)], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::BatchPartialFailure);
    assert!(!manager.exists::<DeviceConfig>("A1").await.unwrap());

    let result = manager
        .create_batch(
            vec![device("A1", "Foo", 1), device("A2", "Bar", 0)],
            Some(BatchMode::Lenient),
        )
        .await
        .unwrap();
    assert_eq!(result.success_count, 1);
}

#[tokio::test]
async fn test_strict_rollback_after_provider_save_failure() {
    let (manager, provider, dir) = TestManagerBuilder::new().build_instrumented();
    provider.fail_saves_of("bad");

    let err = manager
        .create_batch(
            vec![device("ok", "Fine", 1), device("bad", "Broken", 2)],
            Some(BatchMode::Strict),
        )
        .await
        .unwrap_err();
    assert_eq!(err.root_code(), ErrorCode::WriteError);
    assert_eq!(provider.saves(), 1);

    assert!(!manager.exists::<DeviceConfig>("ok").await.unwrap());
    assert!(!device_dir(dir.path()).join("configs.json").exists());
}

#[tokio::test]
async fn test_strict_export_batch_undoes_written_files() {
    let (manager, dir) = TestManagerBuilder::new().build();
    manager
        .create("A1", |id| device(id, "Foo", 1))
        .await
        .unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    let err = manager
        .export_batch::<DeviceConfig>(
            vec![("A1".into(), first.clone()), ("missing".into(), second.clone())],
            Some(BatchMode::Strict),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!first.exists());
    assert!(!second.exists());
}

#[tokio::test]
async fn test_import_batch_keeps_file_ids() {
    let (manager, dir) = TestManagerBuilder::new().build();
    let one = dir.path().join("one.json");
    let two = dir.path().join("two.json");
    std::fs::write(&one, json!({"id": "I1", "name": "One", "port": 1}).to_string()).unwrap();
    std::fs::write(&two, json!([{"id": "I2", "name": "Two", "port": 2}]).to_string()).unwrap();

    let result = manager
        .import_batch::<DeviceConfig>(
            vec![one, two, dir.path().join("absent.json")],
            Some(BatchMode::Lenient),
        )
        .await
        .unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(manager.get::<DeviceConfig>("I2").await.unwrap().port, 2);
}

#[tokio::test]
async fn test_batch_without_provider_fails_fast() {
    let dir = tempfile::TempDir::new().unwrap();
    let manager = cfgstore::ConfigManager::new(cfgstore::ManagerConfig::new(dir.path()));
    let err = manager
        .create_batch(vec![device("A1", "Foo", 1)], Some(BatchMode::Lenient))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ProviderNotRegistered);
}

#[tokio::test]
async fn test_manual_transaction_rollback() {
    let (manager, dir) = TestManagerBuilder::new().build();
    let kept = manager
        .create("A1", |id| device(id, "Foo", 8080))
        .await
        .unwrap();
    let before = dir_contents(&device_dir(dir.path()));

    let mut tx = manager.begin_transaction();
    manager
        .create_in("B1", |id| device(id, "Bar", 1), Some(&mut tx))
        .await
        .unwrap();
    let mut changed = kept.clone();
    changed.port = 1;
    manager.update_in(&mut changed, Some(&mut tx)).await.unwrap();
    manager
        .clone_record_in::<DeviceConfig>("A1", "C1", Some(&mut tx))
        .await
        .unwrap();
    assert_eq!(tx.len(), 3);

    manager.rollback_transaction(&mut tx).await.unwrap();
    assert!(!tx.is_active());

    assert_eq!(dir_contents(&device_dir(dir.path())), before);
    assert_eq!(manager.get::<DeviceConfig>("A1").await.unwrap().port, 8080);
    assert!(!manager.exists::<DeviceConfig>("B1").await.unwrap());
    assert!(!manager.exists::<DeviceConfig>("C1").await.unwrap());
}

#[tokio::test]
async fn test_manual_transaction_commit_is_final() {
    let (manager, _dir) = TestManagerBuilder::new().build();

    let mut tx = manager.begin_transaction();
    manager
        .create_in("A1", |id| device(id, "Foo", 8080), Some(&mut tx))
        .await
        .unwrap();
    manager
        .delete_in::<DeviceConfig>("absent", Some(&mut tx))
        .await
        .unwrap();
    manager.commit_transaction(&mut tx).unwrap();

    let err = manager.commit_transaction(&mut tx).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TransactionCommitFailed);
    let err = manager.rollback_transaction(&mut tx).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TransactionRollbackFailed);

    assert!(manager.exists::<DeviceConfig>("A1").await.unwrap());
}

#[tokio::test]
async fn test_rolled_back_delete_restores_cached_record() {
    let (manager, _dir) = TestManagerBuilder::new().build();
    manager
        .create("A1", |id| device(id, "Foo", 8080))
        .await
        .unwrap();

    let mut tx = manager.begin_transaction();
    manager
        .delete_in::<DeviceConfig>("A1", Some(&mut tx))
        .await
        .unwrap();
    assert!(manager.get::<DeviceConfig>("A1").await.is_err());
    manager.rollback_transaction(&mut tx).await.unwrap();

    let restored = manager.get::<DeviceConfig>("A1").await.unwrap();
    assert_eq!(restored.port, 8080);
    assert_eq!(restored.id(), "A1");
}
