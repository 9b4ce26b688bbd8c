use std::path::PathBuf;
use std::time::Duration;

use orc_core::{JobType, PoolConfig, StoreConfig};
use orc_executor::{DirectExecutor, DirectExecutorConfig};
use orc_store::Store;

use crate::{PoolEvent, PoolManager};

async fn test_store() -> Store {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("orchestrator.db");
    std::mem::forget(dir);
    Store::open(&StoreConfig::new(path)).await.expect("open store")
}

fn sleepy_executor() -> DirectExecutor {
    DirectExecutor::new(DirectExecutorConfig {
        worker_binary: PathBuf::from("sh"),
        db_path: PathBuf::from("/tmp/does-not-matter.db"),
        args: vec!["-c".to_string(), "sleep 5".to_string()],
        extra_env: Vec::new(),
    })
}

fn fast_pool_config() -> PoolConfig {
    PoolConfig {
        fleets: vec![(JobType::Notebook, 1)],
        hung_threshold: Duration::from_millis(10),
        dead_threshold: Duration::from_millis(10),
        supervision_interval: Duration::from_millis(20),
        shutdown_grace: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn start_launches_configured_fleet_and_emits_started() {
    let store = test_store().await;
    let pool = PoolManager::new(store, sleepy_executor(), fast_pool_config());
    let mut events = pool.subscribe();

    pool.start().await.unwrap();

    match events.try_recv() {
        Ok(PoolEvent::Started) => {}
        other => panic!("expected Started event, got {other:?}"),
    }
}

#[tokio::test]
async fn supervise_reaps_stale_worker_and_launches_replacement() {
    let store = test_store().await;
    let pool = PoolManager::new(store.clone(), sleepy_executor(), fast_pool_config());
    let mut events = pool.subscribe();

    pool.start().await.unwrap();
    assert!(matches!(events.try_recv(), Ok(PoolEvent::Started)));

    // The pool manager's first launch for a fresh instance is deterministic:
    // job-type-index-sequence, with sequence starting at zero.
    let worker_id = store.register_worker(JobType::Notebook, "notebook-0-0").await.unwrap();

    // The worker's heartbeat is fresh at registration; wait past the (very
    // short, test-tuned) dead threshold so the next pass treats it as stale.
    tokio::time::sleep(Duration::from_millis(30)).await;

    pool.supervise_once().await.unwrap();

    let mut saw_reaped = false;
    let mut saw_replaced = false;
    while let Ok(event) = events.try_recv() {
        match event {
            PoolEvent::WorkerReaped { worker_id: reaped } => {
                assert_eq!(reaped, worker_id);
                saw_reaped = true;
            }
            PoolEvent::WorkerReplaced { job_type, worker_index } => {
                assert_eq!(job_type, JobType::Notebook);
                assert_eq!(worker_index, 0);
                saw_replaced = true;
            }
            _ => {}
        }
    }
    assert!(saw_reaped, "expected a WorkerReaped event");
    assert!(saw_replaced, "expected a WorkerReplaced event");

    let worker = store.get_worker(worker_id).await.unwrap().unwrap();
    assert_eq!(worker.status, orc_core::WorkerStatus::Dead);
}

#[tokio::test]
async fn shutdown_stops_all_managed_workers() {
    let store = test_store().await;
    let pool = PoolManager::new(store, sleepy_executor(), fast_pool_config());
    pool.start().await.unwrap();

    let mut events = pool.subscribe();
    pool.shutdown().await.unwrap();

    let mut saw_stopped = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, PoolEvent::Stopped) {
            saw_stopped = true;
        }
    }
    assert!(saw_stopped, "expected a Stopped event");
}
