use std::path::PathBuf;
use std::time::Duration;

use orc_backend::Backend;
use orc_core::{BackendConfig, JobType, PoolConfig, StoreConfig};
use orc_executor::{DirectExecutor, DirectExecutorConfig};
use orc_pool::{PoolEvent, PoolManager};
use orc_store::Store;

use crate::{LifecycleManager, LifecyclePolicy};

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

fn fast_pool_config(fleets: Vec<(JobType, usize)>) -> PoolConfig {
    PoolConfig {
        fleets,
        hung_threshold: Duration::from_millis(50),
        dead_threshold: Duration::from_millis(50),
        supervision_interval: Duration::from_millis(20),
        shutdown_grace: Duration::from_millis(50),
    }
}

fn fast_backend_config() -> BackendConfig {
    BackendConfig {
        poll_interval: Duration::from_millis(5),
        timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn one_shot_build_with_no_operations_starts_and_stops_the_pool() {
    let store = test_store().await;
    let pool = PoolManager::new(
        store.clone(),
        sleepy_executor(),
        fast_pool_config(vec![(JobType::Notebook, 1)]),
    );
    let mut pool_events = pool.subscribe();
    let backend = Backend::new(store.clone(), fast_backend_config());

    let manager = LifecycleManager::new(
        store,
        pool,
        backend,
        LifecyclePolicy::OneShot,
        Duration::from_millis(50),
    );

    manager.run_build(Vec::new()).await.unwrap();

    let mut saw_started = false;
    let mut saw_stopped = false;
    while let Ok(event) = pool_events.try_recv() {
        match event {
            PoolEvent::Started => saw_started = true,
            PoolEvent::Stopped => saw_stopped = true,
            _ => {}
        }
    }
    assert!(saw_started, "one-shot build should start the pool");
    assert!(saw_stopped, "one-shot build should stop the pool on exit");
}

#[tokio::test]
async fn persistent_build_attaches_to_an_already_running_pool() {
    let store = test_store().await;
    let worker_id = store.register_worker(JobType::Notebook, "existing-worker").await.unwrap();
    store.update_heartbeat(worker_id).await.unwrap();

    // No fleets configured: if the manager mistakenly tried to start a
    // fresh pool it would simply have nothing to launch, so the only
    // observable signal is whether it saw the pool as already running.
    let pool = PoolManager::new(store.clone(), sleepy_executor(), fast_pool_config(Vec::new()));
    let mut pool_events = pool.subscribe();
    let backend = Backend::new(store.clone(), fast_backend_config());

    let manager = LifecycleManager::new(
        store,
        pool,
        backend,
        LifecyclePolicy::Persistent,
        Duration::from_secs(60),
    );

    assert!(manager.pool_already_running().await.unwrap());

    manager.run_build(Vec::new()).await.unwrap();

    // Persistent mode never stops a pool it didn't start.
    let mut saw_stopped = false;
    while let Ok(event) = pool_events.try_recv() {
        if matches!(event, PoolEvent::Stopped) {
            saw_stopped = true;
        }
    }
    assert!(!saw_stopped, "persistent build must not stop a pool it attached to");
}

#[tokio::test]
async fn persistent_build_starts_a_pool_when_none_is_running() {
    let store = test_store().await;
    let pool = PoolManager::new(
        store.clone(),
        sleepy_executor(),
        fast_pool_config(vec![(JobType::Notebook, 1)]),
    );
    let mut pool_events = pool.subscribe();
    let backend = Backend::new(store.clone(), fast_backend_config());

    let manager = LifecycleManager::new(
        store,
        pool,
        backend,
        LifecyclePolicy::Persistent,
        Duration::from_millis(50),
    );

    assert!(!manager.pool_already_running().await.unwrap());

    manager.run_build(Vec::new()).await.unwrap();

    let mut saw_started = false;
    let mut saw_stopped = false;
    while let Ok(event) = pool_events.try_recv() {
        match event {
            PoolEvent::Started => saw_started = true,
            PoolEvent::Stopped => saw_stopped = true,
            _ => {}
        }
    }
    assert!(saw_started, "persistent build should start a pool when none is running");
    assert!(!saw_stopped, "persistent build leaves the pool it started running on exit");
}

