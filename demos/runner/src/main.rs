mod cli;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use orc_backend::{Backend, Operation};
use orc_core::{BackendConfig, JobType, Payload, PoolConfig, RuntimeConfig, StoreConfig};
use orc_executor::{DirectExecutor, DirectExecutorConfig};
use orc_lifecycle::{LifecycleManager, LifecyclePolicy};
use orc_pool::PoolManager;
use orc_runtime::{EchoProcessor, WorkerRuntime};
use orc_store::Store;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            notebook_workers,
            plantuml_workers,
            drawio_workers,
            jobs_per_type,
        } => run_build(cli.db_path, notebook_workers, plantuml_workers, drawio_workers, jobs_per_type).await,
        Command::Worker => run_worker().await,
    }
}

async fn run_build(
    db_path: PathBuf,
    notebook_workers: usize,
    plantuml_workers: usize,
    drawio_workers: usize,
    jobs_per_type: usize,
) -> Result<()> {
    let store = Store::open(&StoreConfig::new(&db_path)).await.context("open store")?;

    let worker_binary = env::current_exe().context("locate own executable for worker spawn")?;
    let executor = DirectExecutor::new(DirectExecutorConfig {
        worker_binary,
        db_path: db_path.clone(),
        args: vec!["worker".to_string()],
        extra_env: Vec::new(),
    });

    let fleets = vec![
        (JobType::Notebook, notebook_workers),
        (JobType::Plantuml, plantuml_workers),
        (JobType::Drawio, drawio_workers),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .collect();

    let pool = PoolManager::new(store.clone(), executor, PoolConfig::new(fleets));
    let backend = Backend::new(store.clone(), BackendConfig::default());
    let mut backend_events = backend.subscribe();

    let manager = LifecycleManager::new(
        store,
        pool,
        backend,
        LifecyclePolicy::OneShot,
        PoolConfig::DEFAULT_DEAD_THRESHOLD,
    );

    let reporter = tokio::spawn(async move {
        while let Ok(event) = backend_events.recv().await {
            match event {
                orc_backend::BackendEvent::Submitted { job_id } => {
                    tracing::info!(job_id, "submitted");
                }
                orc_backend::BackendEvent::CacheHit { output_file } => {
                    tracing::info!(output_file = %output_file.display(), "cache hit");
                }
                orc_backend::BackendEvent::Completed { job_id } => {
                    tracing::info!(job_id, "completed");
                }
                orc_backend::BackendEvent::Failed { job_id, message } => {
                    tracing::warn!(job_id, message, "failed");
                }
                orc_backend::BackendEvent::Timeout { outstanding } => {
                    tracing::warn!(outstanding, "wait_for_completion timed out");
                }
            }
        }
    });

    let operations = synthetic_operations(jobs_per_type);
    let outcome = manager.run_build(operations).await;
    reporter.abort();

    match outcome {
        Ok(()) => {
            println!("build completed");
            Ok(())
        }
        Err(err) => {
            eprintln!("build finished with an error: {err}");
            Err(err.into())
        }
    }
}

fn synthetic_operations(jobs_per_type: usize) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(jobs_per_type * JobType::ALL.len());
    for job_type in JobType::ALL {
        for i in 0..jobs_per_type {
            let input_file = PathBuf::from(format!("/tmp/orc-demo/in/{job_type}/{i}"));
            let output_file = PathBuf::from(format!("/tmp/orc-demo/out/{job_type}/{i}.html"));
            let content_hash = format!("{job_type}-{i}-demo-hash");
            ops.push(Operation {
                job_type,
                input_file,
                output_file,
                content_hash,
                payload: Payload::new(serde_json::json!({ "kind": job_type.as_str() })).expect("kind is set"),
                priority: 0,
                max_attempts: 3,
            });
        }
    }
    ops
}

async fn run_worker() -> Result<()> {
    let db_path = env::var("DB_PATH").context("DB_PATH not set")?;
    let worker_type = env::var("WORKER_TYPE").context("WORKER_TYPE not set")?;
    let container_id = env::var("WORKER_CONTAINER_ID").context("WORKER_CONTAINER_ID not set")?;

    let job_type = JobType::from_str(&worker_type).map_err(|e| anyhow::anyhow!(e))?;
    let store = Store::open(&StoreConfig::new(db_path)).await.context("open store")?;

    let mut config = RuntimeConfig::default();
    if let Ok(raw) = env::var("WORKER_POLL_INTERVAL") {
        if let Ok(secs) = raw.parse::<f64>() {
            config.poll_interval = Duration::from_secs_f64(secs);
        }
    }
    if let Ok(raw) = env::var("WORKER_HEARTBEAT_INTERVAL") {
        if let Ok(secs) = raw.parse::<f64>() {
            config.heartbeat_interval = Duration::from_secs_f64(secs);
        }
    }
    if let Ok(raw) = env::var("WORKER_MAX_POLL_INTERVAL") {
        if let Ok(secs) = raw.parse::<f64>() {
            config.max_poll_interval = Duration::from_secs_f64(secs);
        }
    }

    let runtime = WorkerRuntime::new(store, job_type, container_id, config, EchoProcessor);
    runtime.run().await?;
    Ok(())
}
