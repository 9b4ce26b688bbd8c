use std::future::Future;

use orc_core::{JobType, OrchestratorError};

/// Abstracts the worker process launch mechanism behind a common interface
/// so the pool manager is agnostic to which strategy is configured. A build
/// is single-executor-type per run; mixing direct and container workers
/// within one pool is not required.
///
/// Methods return `impl Future` rather than being declared `async fn` in a
/// `dyn`-compatible way: the pool manager is generic over `E: WorkerExecutor`
/// rather than holding a trait object, so this stays on native async with no
/// extra boxing.
pub trait WorkerExecutor: Send + Sync + 'static {
    /// An opaque handle to a launched worker, specific to this executor.
    type Handle: Send + Sync;

    /// Launch worker `worker_index` of `job_type`, tagging it with
    /// `launch_id` (the value the worker must register itself under, so the
    /// pool manager can later correlate its db row with this handle).
    fn start(
        &self,
        job_type: JobType,
        worker_index: usize,
        launch_id: &str,
    ) -> impl Future<Output = Result<Self::Handle, OrchestratorError>> + Send;

    /// Request a graceful stop (e.g. `SIGTERM` for a direct child, a
    /// container stop for an isolated worker). Does not block until exit.
    fn stop(&self, handle: &mut Self::Handle) -> impl Future<Output = Result<(), OrchestratorError>> + Send;

    /// Whether the launched process/container is still running.
    fn is_running(&self, handle: &mut Self::Handle) -> impl Future<Output = bool> + Send;

    /// Unconditionally terminate the launched process/container.
    fn force_kill(&self, handle: &mut Self::Handle) -> impl Future<Output = Result<(), OrchestratorError>> + Send;
}
