//! Readers and writers racing index rebuilds and rollbacks

mod common;

use cfgstore::{BatchMode, ErrorCode};
use common::{device, device_dir, read_json, DeviceConfig, TestManagerBuilder};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_during_reload_all_never_overwrites() {
    let (manager, dir) = TestManagerBuilder::new().build();
    manager
        .create("A1", |id| device(id, "Foo", 8080))
        .await
        .unwrap();

    let reloader = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for _ in 0..100 {
                manager.reload_all::<DeviceConfig>().await.unwrap();
            }
        })
    };
    let creators: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let err = manager
                        .create("A1", |id| device(id, "Intruder", 1))
                        .await
                        .unwrap_err();
                    assert_eq!(err.code(), ErrorCode::AlreadyExists);
                }
            })
        })
        .collect();

    reloader.await.unwrap();
    for creator in creators {
        creator.await.unwrap();
    }

    let stored = manager.reload::<DeviceConfig>("A1").await.unwrap();
    assert_eq!(stored.meta.name, "Foo");
    assert_eq!(stored.port, 8080);
    let json = read_json(&device_dir(dir.path()).join("configs.json"));
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_during_reload_all_always_find_the_record() {
    let (manager, _dir) = TestManagerBuilder::new().build();
    manager
        .create("A1", |id| device(id, "Foo", 8080))
        .await
        .unwrap();

    let reloader = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for _ in 0..100 {
                manager.reload_all::<DeviceConfig>().await.unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let mut misses = 0;
                for _ in 0..200 {
                    if !manager.exists::<DeviceConfig>("A1").await.unwrap() {
                        misses += 1;
                    }
                    match manager.get::<DeviceConfig>("A1").await {
                        Ok(record) => assert_eq!(record.port, 8080),
                        Err(_) => misses += 1,
                    }
                }
                misses
            })
        })
        .collect();

    reloader.await.unwrap();
    for reader in readers {
        assert_eq!(reader.await.unwrap(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_untouched_records_stay_readable_during_strict_rollback() {
    let (manager, _dir) = TestManagerBuilder::new().build();
    manager
        .create("K1", |id| device(id, "Keep", 8080))
        .await
        .unwrap();

    let batches = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for _ in 0..25 {
                let err = manager
                    .create_batch(
                        vec![device("B1", "New", 1), device("B2", "Invalid", 0)],
                        Some(BatchMode::Strict),
                    )
                    .await
                    .unwrap_err();
                assert_eq!(err.code(), ErrorCode::BatchPartialFailure);
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let mut misses = 0;
                for _ in 0..200 {
                    if !manager.exists::<DeviceConfig>("K1").await.unwrap() {
                        misses += 1;
                    }
                    if manager.reload::<DeviceConfig>("K1").await.is_err() {
                        misses += 1;
                    }
                }
                misses
            })
        })
        .collect();

    batches.await.unwrap();
    for reader in readers {
        assert_eq!(reader.await.unwrap(), 0);
    }

    assert!(!manager.exists::<DeviceConfig>("B1").await.unwrap());
    assert_eq!(manager.get::<DeviceConfig>("K1").await.unwrap().port, 8080);
    assert_eq!(manager.statistics().transactions.rolled_back, 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_creates_of_distinct_ids_all_persist() {
    let (manager, dir) = TestManagerBuilder::new().build();
    let handles: Vec<_> = (0..32u16)
        .map(|n| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .create(&format!("D{n}"), |id| device(id, "Dev", 1000 + n))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let json = read_json(&device_dir(dir.path()).join("configs.json"));
    assert_eq!(json.as_array().unwrap().len(), 32);

    assert_eq!(manager.reload_all::<DeviceConfig>().await.unwrap(), 32);
    for n in 0..32u16 {
        let record = manager.get::<DeviceConfig>(&format!("D{n}")).await.unwrap();
        assert_eq!(record.port, 1000 + n);
    }
}
