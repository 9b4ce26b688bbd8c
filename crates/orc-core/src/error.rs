/// The crate-wide error taxonomy (see error handling design).
///
/// Call sites that need to branch on failure kind match this directly; call
/// sites that only need a human-readable chain wrap it (or a lower-level
/// error) in `anyhow::Context` instead of inventing another enum.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The store was under write contention beyond its configured busy timeout.
    #[error("store busy: lock not acquired within the configured timeout")]
    StoreBusy,

    /// An I/O or engine-level failure from the durable store.
    #[error("store error: {0}")]
    StoreIo(String),

    /// `claim_next_job` could not be completed (distinct from "no job available").
    #[error("claim failed: {0}")]
    ClaimFailed(String),

    /// The worker executor could not launch a worker process.
    #[error("failed to launch {worker_type} worker: {reason}")]
    WorkerLaunchFailed {
        /// The job type the worker would have serviced.
        worker_type: String,
        /// Why the launch failed.
        reason: String,
    },

    /// The backend's overall wait deadline elapsed before all jobs reached a terminal state.
    #[error("timed out after {elapsed_secs}s waiting for completion")]
    Timeout {
        /// How long the backend waited before giving up.
        elapsed_secs: u64,
    },

    /// A worker's processor returned an error for a specific job.
    #[error("job {job_id} failed: {message}")]
    ProcessorFailed {
        /// The job that failed.
        job_id: i64,
        /// The processor's error message.
        message: String,
    },

    /// A referenced entity does not exist in the store.
    #[error("{entity} {id} not found")]
    NotFound {
        /// The kind of entity looked up (`"job"`, `"worker"`).
        entity: &'static str,
        /// The id that was not found.
        id: i64,
    },

    /// A host path the container executor was asked to convert is not rooted
    /// under any known host mount prefix (section 4.3, path conversion rules).
    #[error("path {path} is not rooted under a known host prefix")]
    PathNotRooted {
        /// The offending path.
        path: String,
    },
}
