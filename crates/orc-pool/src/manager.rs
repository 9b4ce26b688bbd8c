use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use orc_core::{EventKind, JobType, OrchestratorError, PoolConfig, WorkerStatus};
use orc_executor::WorkerExecutor;
use orc_store::Store;
use tokio::sync::{broadcast, Mutex};

/// State transitions the supervision loop drives, broadcast so a caller
/// (a lifecycle manager, or a monitoring surface) can subscribe without
/// polling the store (section 4.4, Observability).
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// The pool finished launching its configured fleets.
    Started,
    /// A worker's heartbeat went stale past the dead threshold and it was
    /// reaped; its in-flight job (if any) was reset to `pending`.
    WorkerReaped {
        /// The reaped worker's db id.
        worker_id: i64,
    },
    /// A replacement worker was launched for a reaped slot.
    WorkerReplaced {
        /// The job type of the replaced slot.
        job_type: JobType,
        /// The fleet-local index of the replaced slot.
        worker_index: usize,
    },
    /// The pool was shut down; all managed workers were stopped.
    Stopped,
}

struct ManagedWorker<H> {
    job_type: JobType,
    worker_index: usize,
    launch_id: String,
    handle: H,
    worker_id: Option<i64>,
}

/// Supervises a fixed per-type fleet of workers, launched through a
/// configured [`WorkerExecutor`]. One pool manager instance corresponds to
/// one build's worker population.
pub struct PoolManager<E: WorkerExecutor> {
    store: Store,
    executor: Arc<E>,
    config: PoolConfig,
    managed: Mutex<Vec<ManagedWorker<E::Handle>>>,
    launch_seq: AtomicU64,
    events_tx: broadcast::Sender<PoolEvent>,
}

impl<E: WorkerExecutor> PoolManager<E> {
    /// Build a pool manager for `config`'s fleets, using `executor` to
    /// launch workers.
    pub fn new(store: Store, executor: E, config: PoolConfig) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            store,
            executor: Arc::new(executor),
            config,
            managed: Mutex::new(Vec::new()),
            launch_seq: AtomicU64::new(0),
            events_tx,
        }
    }

    /// Subscribe to pool state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events_tx.subscribe()
    }

    /// Launch `count` workers for each configured `(job_type, count)` fleet.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        let fleets = self.config.fleets.clone();
        for (job_type, count) in fleets {
            for idx in 0..count {
                self.launch_one(job_type, idx).await?;
            }
        }
        self.store.record_event(EventKind::PoolStarted, None, None, "").await;
        let _ = self.events_tx.send(PoolEvent::Started);
        Ok(())
    }

    async fn launch_one(&self, job_type: JobType, worker_index: usize) -> Result<(), OrchestratorError> {
        let seq = self.launch_seq.fetch_add(1, Ordering::SeqCst);
        let launch_id = format!("{}-{worker_index}-{seq}", job_type.as_str());
        let handle = self.executor.start(job_type, worker_index, &launch_id).await?;
        self.managed.lock().await.push(ManagedWorker {
            job_type,
            worker_index,
            launch_id,
            handle,
            worker_id: None,
        });
        Ok(())
    }

    /// One supervision pass: mark hung workers, reap dead ones (resetting
    /// their in-flight jobs), and launch replacements for any reaped slot.
    /// Run on an interval by [`Self::run_supervision_loop`].
    pub async fn supervise_once(&self) -> Result<(), OrchestratorError> {
        self.resolve_pending_worker_ids().await;

        // Read-only lookahead before the mutating pass below, so a stale
        // heartbeat is visible in logs even if the subsequent mark/reap
        // queries race with a heartbeat write and find nothing.
        let stale = self.store.list_stale_workers(self.config.hung_threshold).await?;
        if !stale.is_empty() {
            tracing::debug!(?stale, "workers past the hung threshold this pass");
        }

        self.store.mark_hung_workers(self.config.hung_threshold).await?;
        let reaped = self.store.reap_dead_workers(self.config.dead_threshold).await?;

        for worker_id in reaped {
            let _ = self.events_tx.send(PoolEvent::WorkerReaped { worker_id });
            self.replace_reaped(worker_id).await?;
        }
        Ok(())
    }

    /// Correlate just-launched handles with the db row the worker registers
    /// for itself once it has started up (it may take a poll or two).
    async fn resolve_pending_worker_ids(&self) {
        let mut managed = self.managed.lock().await;
        for mw in managed.iter_mut() {
            if mw.worker_id.is_some() {
                continue;
            }
            if let Ok(Some(worker)) = self.store.find_worker_by_container_id(&mw.launch_id).await {
                mw.worker_id = Some(worker.id);
            }
        }
    }

    async fn replace_reaped(&self, dead_worker_id: i64) -> Result<(), OrchestratorError> {
        let slot = {
            let managed = self.managed.lock().await;
            managed
                .iter()
                .position(|mw| mw.worker_id == Some(dead_worker_id))
        };
        let Some(idx) = slot else {
            // Not one of ours (or already replaced); nothing to do.
            return Ok(());
        };

        let (job_type, worker_index, still_running) = {
            let mut managed = self.managed.lock().await;
            let mw = &mut managed[idx];
            let still_running = self.executor.is_running(&mut mw.handle).await;
            (mw.job_type, mw.worker_index, still_running)
        };

        if still_running {
            // Hung but alive: force-kill before replacing (section 4.4 step 3).
            let mut managed = self.managed.lock().await;
            let mw = &mut managed[idx];
            let _ = self.executor.force_kill(&mut mw.handle).await;
        }

        self.managed.lock().await.remove(idx);
        self.launch_one(job_type, worker_index).await?;
        let _ = self.events_tx.send(PoolEvent::WorkerReplaced { job_type, worker_index });
        Ok(())
    }

    /// Run [`Self::supervise_once`] on `config.supervision_interval` until
    /// `stop` is set. Intended to be spawned as its own task.
    pub async fn run_supervision_loop(&self, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::SeqCst) {
            if let Err(err) = self.supervise_once().await {
                tracing::warn!(error = %err, "pool supervision pass failed");
            }
            tokio::time::sleep(self.config.supervision_interval).await;
        }
    }

    /// Mark all managed workers `dead`, request a graceful stop, wait up to
    /// `shutdown_grace`, then force-kill survivors. Resets any jobs they
    /// still own back to `pending`.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        let mut managed = self.managed.lock().await;

        for mw in managed.iter_mut() {
            if let Some(worker_id) = mw.worker_id {
                let _ = self.store.mark_worker_status(worker_id, WorkerStatus::Dead).await;
                let _ = self.store.reset_job_for_worker(worker_id).await;
            }
            let _ = self.executor.stop(&mut mw.handle).await;
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        while Instant::now() < deadline {
            let mut all_stopped = true;
            for mw in managed.iter_mut() {
                if self.executor.is_running(&mut mw.handle).await {
                    all_stopped = false;
                }
            }
            if all_stopped {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        for mw in managed.iter_mut() {
            if self.executor.is_running(&mut mw.handle).await {
                let _ = self.executor.force_kill(&mut mw.handle).await;
            }
        }

        managed.clear();
        self.store.record_event(EventKind::PoolStopped, None, None, "").await;
        let _ = self.events_tx.send(PoolEvent::Stopped);
        Ok(())
    }
}
