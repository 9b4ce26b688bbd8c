use std::path::PathBuf;
use std::time::Duration;

use orc_core::{BackendConfig, JobType, Payload, StoreConfig};
use orc_store::Store;
use serde_json::json;

use crate::{Backend, BackendEvent, Operation};

async fn test_store() -> Store {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("orchestrator.db");
    std::mem::forget(dir);
    Store::open(&StoreConfig::new(path)).await.expect("open store")
}

fn fast_config() -> BackendConfig {
    BackendConfig {
        poll_interval: Duration::from_millis(5),
        timeout: Duration::from_millis(500),
    }
}

fn operation(output: &str, hash: &str) -> Operation {
    Operation {
        job_type: JobType::Notebook,
        input_file: PathBuf::from("/in/a.ipynb"),
        output_file: PathBuf::from(output),
        content_hash: hash.to_string(),
        payload: Payload::new(json!({ "kind": "notebook" })).unwrap(),
        priority: 0,
        max_attempts: 3,
    }
}

#[tokio::test]
async fn execute_operation_serves_cache_hit_without_inserting_a_job() {
    let store = test_store().await;
    store
        .add_to_cache(&PathBuf::from("/out/a.html"), "hash-a", &json!({ "cached": true }))
        .await
        .unwrap();

    let backend = Backend::new(store, fast_config());
    let mut events = backend.subscribe();

    backend.execute_operation(operation("/out/a.html", "hash-a")).await.unwrap();

    assert_eq!(backend.active_count().await, 0);
    match events.try_recv() {
        Ok(BackendEvent::CacheHit { output_file }) => assert_eq!(output_file, PathBuf::from("/out/a.html")),
        other => panic!("expected CacheHit event, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_for_completion_drains_as_a_worker_processes_the_job() {
    let store = test_store().await;
    let backend = Backend::new(store.clone(), fast_config());

    backend.execute_operation(operation("/out/b.html", "hash-b")).await.unwrap();
    assert_eq!(backend.active_count().await, 1);

    // Stand in for a worker: claim the job and record its result metadata,
    // without writing to the cache directly — that is the backend's job.
    let store_for_worker = store.clone();
    tokio::spawn(async move {
        let worker_id = store_for_worker.register_worker(JobType::Notebook, "bg-worker").await.unwrap();
        loop {
            if let Some(job) = store_for_worker.claim_next_job(JobType::Notebook, worker_id).await.unwrap() {
                store_for_worker
                    .update_job_status(
                        job.id,
                        orc_core::JobStatus::Completed,
                        None,
                        Some(&json!({ "ok": true })),
                    )
                    .await
                    .unwrap();
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    backend.wait_for_completion().await.unwrap();
    assert_eq!(backend.active_count().await, 0);

    // The backend, not the worker, must have written the cache entry.
    let cached = store.check_cache(&PathBuf::from("/out/b.html"), "hash-b").await.unwrap();
    assert_eq!(cached, Some(json!({ "ok": true })));
}

#[tokio::test]
async fn wait_for_completion_surfaces_first_terminal_failure() {
    let store = test_store().await;
    let backend = Backend::new(store.clone(), fast_config());

    backend.execute_operation(operation("/out/c.html", "hash-c")).await.unwrap();

    let worker_id = store.register_worker(JobType::Notebook, "bg-worker-2").await.unwrap();
    let job = store.claim_next_job(JobType::Notebook, worker_id).await.unwrap().unwrap();
    store
        .update_job_status(job.id, orc_core::JobStatus::Failed, Some("renderer crashed"), None)
        .await
        .unwrap();

    let result = backend.wait_for_completion().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn wait_for_completion_times_out_on_a_stuck_job() {
    let store = test_store().await;
    let backend = Backend::new(store, fast_config());
    backend.execute_operation(operation("/out/d.html", "hash-d")).await.unwrap();

    let result = backend.wait_for_completion().await;
    assert!(matches!(result, Err(orc_core::OrchestratorError::Timeout { .. })));
}
