use std::path::PathBuf;
use std::pin::Pin;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use orc_core::{Job, JobType, Payload, RuntimeConfig, StoreConfig};
use orc_store::Store;
use serde_json::json;

use crate::{EchoProcessor, JobOutcome, Processor, ProcessorError, WorkerRuntime};

async fn test_store() -> Store {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("orchestrator.db");
    std::mem::forget(dir);
    Store::open(&StoreConfig::new(path)).await.expect("open store")
}

fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        poll_interval: std::time::Duration::from_millis(5),
        max_poll_interval: std::time::Duration::from_millis(20),
        heartbeat_interval: std::time::Duration::from_millis(50),
        backoff_after_empty_polls: 3,
        backoff_factor: 1.2,
        orphan_check_every_polls: 1_000_000,
        register_retry_initial: std::time::Duration::from_millis(1),
        register_retry_max_attempts: 3,
    }
}

struct CountingProcessor {
    calls: Arc<AtomicUsize>,
}

impl Processor for CountingProcessor {
    fn process(
        &self,
        _job: &Job,
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, ProcessorError>> + Send + '_>> {
        let calls = self.calls.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(JobOutcome {
                result_metadata: json!({ "ok": true }),
            })
        })
    }
}

struct FailingProcessor;

impl Processor for FailingProcessor {
    fn process(
        &self,
        _job: &Job,
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, ProcessorError>> + Send + '_>> {
        Box::pin(async move { Err(ProcessorError::new("boom")) })
    }
}

#[tokio::test]
async fn echo_processor_succeeds_and_caches_hash() {
    let store = test_store().await;
    let job_id = store
        .add_job(
            JobType::Notebook,
            &PathBuf::from("/in/a"),
            &PathBuf::from("/out/a"),
            "hash-123",
            &Payload::new(json!({ "kind": "notebook" })).unwrap(),
            0,
            3,
        )
        .await
        .unwrap();

    let worker_id = store.register_worker(JobType::Notebook, "direct-0").await.unwrap();
    let claimed = store.claim_next_job(JobType::Notebook, worker_id).await.unwrap().unwrap();
    assert_eq!(claimed.id, job_id);

    let outcome = EchoProcessor.process(&claimed).await.unwrap();
    assert_eq!(outcome.result_metadata, json!({ "echoed_content_hash": "hash-123" }));
}

#[tokio::test]
async fn runtime_processes_one_job_then_drains_to_completion() {
    let store = test_store().await;
    let job_id = store
        .add_job(
            JobType::Notebook,
            &PathBuf::from("/in/a"),
            &PathBuf::from("/out/a"),
            "h",
            &Payload::new(json!({ "kind": "notebook" })).unwrap(),
            0,
            3,
        )
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = WorkerRuntime::new(
        store.clone(),
        JobType::Notebook,
        "direct-test-1",
        fast_config(),
        CountingProcessor { calls: calls.clone() },
    );
    let shutdown = runtime.shutdown_handle();

    let handle = tokio::spawn(runtime.run());

    // Give the loop a little time to claim and finish the single job, then
    // ask it to stop gracefully.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    handle.await.unwrap().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let worker = store.find_worker_by_container_id("direct-test-1").await.unwrap().unwrap();
    assert_eq!(worker.jobs_processed, 1);

    // The runtime records result metadata on the row; it does not write
    // `results_cache` itself (that is the backend's responsibility).
    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.result_metadata, Some(json!({ "ok": true })));
    assert!(store.check_cache(&PathBuf::from("/out/a"), "h").await.unwrap().is_none());
}

#[tokio::test]
async fn runtime_records_failure_without_crashing() {
    let store = test_store().await;
    store
        .add_job(
            JobType::Notebook,
            &PathBuf::from("/in/a"),
            &PathBuf::from("/out/a"),
            "h",
            &Payload::new(json!({ "kind": "notebook" })).unwrap(),
            0,
            1,
        )
        .await
        .unwrap();

    let runtime = WorkerRuntime::new(
        store.clone(),
        JobType::Notebook,
        "direct-test-2",
        fast_config(),
        FailingProcessor,
    );
    let shutdown = runtime.shutdown_handle();
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    handle.await.unwrap().unwrap();

    let worker = store.find_worker_by_container_id("direct-test-2").await.unwrap().unwrap();
    assert_eq!(worker.jobs_failed, 1);
}
