use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use orc_core::{JobStatus, JobType, OrchestratorError, RuntimeConfig, WorkerStatus};
use orc_store::Store;

use crate::orphan::{is_orphaned, recorded_parent_pid};
use crate::processor::Processor;

/// The loop every worker executable runs: register, heartbeat, atomically
/// claim one job of its type, process it, report result, repeat.
///
/// Generic over the [`Processor`] that plugs in the worker-specific business
/// logic; the runtime itself only ever forwards job rows to it.
pub struct WorkerRuntime<P: Processor> {
    store: Store,
    job_type: JobType,
    container_id: String,
    config: RuntimeConfig,
    processor: Arc<P>,
    shutdown: Arc<AtomicBool>,
}

impl<P: Processor> WorkerRuntime<P> {
    /// Build a runtime for a worker of `job_type`, identified to the store by
    /// `container_id` (an opaque, executor-assigned handle — see the worker
    /// executor's path/handle conventions).
    pub fn new(
        store: Store,
        job_type: JobType,
        container_id: impl Into<String>,
        config: RuntimeConfig,
        processor: P,
    ) -> Self {
        Self {
            store,
            job_type,
            container_id: container_id.into(),
            config,
            processor: Arc::new(processor),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone-able flag other tasks (e.g. a signal handler) can use to
    /// request graceful shutdown without holding a reference to `self`.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Register in `workers`, install signal handlers, then run the poll
    /// loop until a graceful shutdown is requested or the parent process is
    /// found to be gone.
    pub async fn run(self) -> Result<(), OrchestratorError> {
        let worker_id = self.register().await?;
        self.install_signal_handlers();

        let recorded_parent = recorded_parent_pid();
        let mut poll_interval = self.config.poll_interval;
        let mut empty_polls: u32 = 0;
        let mut last_heartbeat = Instant::now() - self.config.heartbeat_interval;
        let mut polls_since_orphan_check: u32 = 0;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!(worker_id, "graceful shutdown requested, exiting poll loop");
                break;
            }

            match self.store.claim_next_job(self.job_type, worker_id).await {
                Ok(Some(job)) => {
                    tracing::debug!(worker_id, job_id = job.id, "claimed job");
                    empty_polls = 0;
                    poll_interval = self.config.poll_interval;

                    // Force a heartbeat write on claim, per the heartbeat
                    // policy (section 4.2): don't wait for the next interval
                    // tick to tell the pool manager this worker is alive.
                    let _ = self.store.mark_worker_status(worker_id, WorkerStatus::Busy).await;
                    let _ = self.store.update_heartbeat(worker_id).await;
                    last_heartbeat = Instant::now();

                    let started = Instant::now();
                    let outcome = self.processor.process(&job).await;
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

                    match outcome {
                        Ok(result) => {
                            // Record the result metadata on the row rather than
                            // writing `results_cache` directly: the backend owns
                            // the cache-write responsibility (section 4.5) and
                            // reads this back once it observes the job complete.
                            let _ = self
                                .store
                                .update_job_status(
                                    job.id,
                                    JobStatus::Completed,
                                    None,
                                    Some(&result.result_metadata),
                                )
                                .await;
                            let _ = self
                                .store
                                .record_job_outcome(worker_id, true, elapsed_ms)
                                .await;
                        }
                        Err(err) => {
                            tracing::warn!(worker_id, job_id = job.id, error = %err, "processor failed");
                            let _ = self
                                .store
                                .update_job_status(job.id, JobStatus::Failed, Some(&err.0), None)
                                .await;
                            let _ = self
                                .store
                                .record_job_outcome(worker_id, false, elapsed_ms)
                                .await;
                        }
                    }
                }
                Ok(None) => {
                    empty_polls = empty_polls.saturating_add(1);
                    if empty_polls >= self.config.backoff_after_empty_polls {
                        poll_interval = poll_interval
                            .mul_f64(self.config.backoff_factor)
                            .min(self.config.max_poll_interval);
                    }
                }
                Err(err) => {
                    // Transient claim contention: treated as "no job this
                    // cycle" per the error taxonomy (section 7), not fatal.
                    tracing::warn!(worker_id, error = %err, "claim failed, retrying next poll");
                }
            }

            if last_heartbeat.elapsed() >= self.config.heartbeat_interval {
                let _ = self.store.update_heartbeat(worker_id).await;
                last_heartbeat = Instant::now();
            }

            polls_since_orphan_check += 1;
            if polls_since_orphan_check >= self.config.orphan_check_every_polls {
                polls_since_orphan_check = 0;
                if is_orphaned(recorded_parent) {
                    tracing::warn!(worker_id, "parent process is gone, exiting");
                    return Ok(());
                }
            }

            tokio::time::sleep(poll_interval).await;
        }

        let _ = self.store.mark_worker_status(worker_id, WorkerStatus::Dead).await;
        Ok(())
    }

    async fn register(&self) -> Result<i64, OrchestratorError> {
        let mut attempt: u32 = 0;
        let mut backoff = self.config.register_retry_initial;
        loop {
            match self.store.register_worker(self.job_type, &self.container_id).await {
                Ok(id) => return Ok(id),
                Err(err) if attempt + 1 < self.config.register_retry_max_attempts => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "worker registration contended, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn install_signal_handlers(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let Ok(mut term) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                else {
                    return;
                };
                tokio::select! {
                    _ = term.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
            shutdown.store(true, Ordering::SeqCst);
        });
    }
}
