use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use orc_core::{BackendConfig, JobStatus, JobType, OrchestratorError, Payload};
use orc_store::Store;
use tokio::sync::{broadcast, Mutex};

/// One unit of submitted work, mirroring [`Store::add_job`]'s argument list.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Which worker class should process this operation.
    pub job_type: JobType,
    /// Absolute host path to the input.
    pub input_file: PathBuf,
    /// Absolute host path the output will be written to.
    pub output_file: PathBuf,
    /// Fingerprint of input contents plus transform parameters.
    pub content_hash: String,
    /// Opaque worker-specific parameters.
    pub payload: Payload,
    /// Higher values dispatched first. Defaults to 0.
    pub priority: i64,
    /// Attempts permitted before the job is terminally failed.
    pub max_attempts: i64,
}

/// Progress events mirroring the `events` rows the backend's activity
/// produces, so a caller can drive a progress surface without a second
/// store handle (section 4.5, Progress reporting).
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// An operation was inserted as a new job.
    Submitted {
        /// The new job's id.
        job_id: i64,
    },
    /// An operation matched an existing cache entry; no job was inserted.
    CacheHit {
        /// The output path the cache hit was served for.
        output_file: PathBuf,
    },
    /// A submitted job reached `Completed`.
    Completed {
        /// The completed job's id.
        job_id: i64,
    },
    /// A submitted job reached `Failed` (attempts exhausted).
    Failed {
        /// The failed job's id.
        job_id: i64,
        /// The terminal error message.
        message: String,
    },
    /// The overall wait deadline elapsed with jobs still outstanding.
    Timeout {
        /// How many jobs were still outstanding when the deadline hit.
        outstanding: usize,
    },
}

/// Tracks a job this backend instance submitted, between `execute_operation`
/// and the job reaching a terminal state.
struct ActiveJob {
    output_file: PathBuf,
}

/// The caller-facing submit-and-wait facade. One instance corresponds to one
/// build: submit every operation the planner emits, then drain to
/// completion.
pub struct Backend {
    store: Store,
    config: BackendConfig,
    active: Mutex<HashMap<i64, ActiveJob>>,
    events_tx: broadcast::Sender<BackendEvent>,
}

impl Backend {
    /// Build a backend over `store`, using `config`'s poll interval and
    /// overall timeout.
    pub fn new(store: Store, config: BackendConfig) -> Self {
        let (events_tx, _) = broadcast::channel(1024);
        Self {
            store,
            config,
            active: Mutex::new(HashMap::new()),
            events_tx,
        }
    }

    /// Subscribe to this backend's progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events_tx.subscribe()
    }

    /// Submit one operation: serve it from the cache if a matching entry
    /// exists, otherwise insert a new job and track it as active.
    pub async fn execute_operation(&self, op: Operation) -> Result<(), OrchestratorError> {
        if let Some(_metadata) = self.store.check_cache(&op.output_file, &op.content_hash).await? {
            self.store
                .record_event(orc_core::EventKind::CacheHit, None, None, &op.content_hash)
                .await;
            let _ = self.events_tx.send(BackendEvent::CacheHit {
                output_file: op.output_file,
            });
            return Ok(());
        }

        let job_id = self
            .store
            .add_job(
                op.job_type,
                &op.input_file,
                &op.output_file,
                &op.content_hash,
                &op.payload,
                op.priority,
                op.max_attempts,
            )
            .await?;

        self.active.lock().await.insert(
            job_id,
            ActiveJob {
                output_file: op.output_file,
            },
        );
        let _ = self.events_tx.send(BackendEvent::Submitted { job_id });
        Ok(())
    }

    /// How many submitted jobs have not yet reached a terminal state.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Poll every submitted job until the active set empties or the
    /// deadline in `config.timeout` elapses. Surfaces the first terminal
    /// failure encountered, if any, after draining the rest.
    pub async fn wait_for_completion(&self) -> Result<(), OrchestratorError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut first_failure: Option<OrchestratorError> = None;

        loop {
            if self.active.lock().await.is_empty() {
                break;
            }

            if Instant::now() >= deadline {
                let outstanding = self.active.lock().await.len();
                let _ = self.events_tx.send(BackendEvent::Timeout { outstanding });
                return Err(OrchestratorError::Timeout {
                    elapsed_secs: self.config.timeout.as_secs(),
                });
            }

            // Belt-and-braces mirror of the pool manager's dead-worker
            // recovery, so forward progress holds even without one running.
            let _ = self.store.reset_jobs_of_dead_workers().await;

            let ids: Vec<i64> = self.active.lock().await.keys().copied().collect();
            for id in ids {
                let Some(job) = self.store.get_job(id).await? else {
                    self.active.lock().await.remove(&id);
                    continue;
                };

                match job.status {
                    JobStatus::Completed => {
                        // The cache write is the backend's responsibility
                        // (section 4.5): the worker only records the result
                        // metadata on the row, and it is read back here, once
                        // per terminal transition.
                        if let Some(metadata) = &job.result_metadata {
                            let _ = self
                                .store
                                .add_to_cache(&job.output_file, &job.content_hash, metadata)
                                .await;
                        } else {
                            tracing::warn!(job_id = id, "job completed with no result metadata, skipping cache write");
                        }
                        self.active.lock().await.remove(&id);
                        let _ = self.events_tx.send(BackendEvent::Completed { job_id: id });
                    }
                    JobStatus::Failed => {
                        self.active.lock().await.remove(&id);
                        let message = job.error.clone().unwrap_or_else(|| "unknown error".to_string());
                        let _ = self.events_tx.send(BackendEvent::Failed {
                            job_id: id,
                            message: message.clone(),
                        });
                        if first_failure.is_none() {
                            first_failure = Some(OrchestratorError::ProcessorFailed { job_id: id, message });
                        }
                    }
                    JobStatus::Pending | JobStatus::Processing => {}
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Output path a still-active job is targeting, if tracked.
    pub async fn active_output_file(&self, job_id: i64) -> Option<PathBuf> {
        self.active.lock().await.get(&job_id).map(|a| a.output_file.clone())
    }
}
