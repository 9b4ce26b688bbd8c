use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use orc_backend::{Backend, Operation};
use orc_core::OrchestratorError;
use orc_executor::WorkerExecutor;
use orc_pool::PoolManager;
use orc_store::Store;

/// How a build's pool of workers is acquired and released (section 4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePolicy {
    /// Start a fresh pool for this build, and stop it (clearing `workers`)
    /// on exit regardless of outcome. Guarantees no residue.
    OneShot,
    /// Attach to an already-running pool if one is detected by live
    /// heartbeats; otherwise start one and leave it running on exit.
    Persistent,
}

/// Composes a [`PoolManager`] and a [`Backend`] for one build.
pub struct LifecycleManager<E: WorkerExecutor> {
    store: Store,
    pool: Arc<PoolManager<E>>,
    backend: Backend,
    policy: LifecyclePolicy,
    liveness_threshold: Duration,
}

impl<E: WorkerExecutor> LifecycleManager<E> {
    /// Build a lifecycle manager. `liveness_threshold` is the heartbeat
    /// freshness window used to decide whether an existing pool counts as
    /// "already running" under [`LifecyclePolicy::Persistent`] — callers
    /// typically pass the same value as the pool's configured dead threshold.
    pub fn new(
        store: Store,
        pool: PoolManager<E>,
        backend: Backend,
        policy: LifecyclePolicy,
        liveness_threshold: Duration,
    ) -> Self {
        Self {
            store,
            pool: Arc::new(pool),
            backend,
            policy,
            liveness_threshold,
        }
    }

    /// Whether a pool already appears to be running, judged by live
    /// heartbeats on `idle`/`busy` workers. Stale entries are reaped first
    /// so a crashed-but-unreaped pool is never mistaken for a live one.
    pub async fn pool_already_running(&self) -> Result<bool, OrchestratorError> {
        self.store.reap_dead_workers(self.liveness_threshold).await?;
        let live = self.store.count_live_workers(self.liveness_threshold).await?;
        Ok(live > 0)
    }

    /// Submit `operations` and drain them to completion, acquiring and
    /// releasing the worker pool per the configured [`LifecyclePolicy`].
    pub async fn run_build(&self, operations: Vec<Operation>) -> Result<(), OrchestratorError> {
        let (started_fresh, stop_on_exit) = match self.policy {
            LifecyclePolicy::OneShot => {
                self.pool.start().await?;
                (true, true)
            }
            LifecyclePolicy::Persistent => {
                if self.pool_already_running().await? {
                    tracing::info!("attaching to an already-running pool");
                    (false, false)
                } else {
                    self.pool.start().await?;
                    (true, false)
                }
            }
        };

        // Supervision runs over workers this instance itself launched,
        // whether or not it will also stop them on exit: an attached-to pool
        // is some other process's responsibility, but a freshly started
        // persistent pool has no one else watching it for this build.
        let supervision = started_fresh.then(|| {
            let pool = self.pool.clone();
            let stop = Arc::new(AtomicBool::new(false));
            let task_stop = stop.clone();
            (tokio::spawn(async move { pool.run_supervision_loop(task_stop).await }), stop)
        });

        for operation in operations {
            self.backend.execute_operation(operation).await?;
        }
        let result = self.backend.wait_for_completion().await;

        if let Some((handle, stop)) = supervision {
            stop.store(true, Ordering::SeqCst);
            let _ = handle.await;
        }

        if stop_on_exit {
            self.pool.shutdown().await?;
        }

        result
    }
}
