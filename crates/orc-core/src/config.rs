use std::path::PathBuf;
use std::time::Duration;

use crate::types::JobType;

/// Configuration for opening the durable store.
///
/// Re-architected from the source's shared global configuration: an explicit
/// struct threaded through constructors rather than module-level state.
/// Environment variables (`DB_PATH`) feed this once at process startup.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Minimum busy timeout before contention surfaces as an error.
    pub busy_timeout: Duration,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
}

impl StoreConfig {
    /// Busy timeout floor mandated by the concurrency model (section 4.1).
    pub const MIN_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

    /// A reasonable default pool size for an embedded orchestrator.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

    /// Build a config at `path` with the mandated busy-timeout floor.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Self::MIN_BUSY_TIMEOUT,
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Configuration for the worker runtime's polling loop.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Base polling interval (`WORKER_POLL_INTERVAL`).
    pub poll_interval: Duration,
    /// Ceiling for adaptive backoff (`WORKER_MAX_POLL_INTERVAL`).
    pub max_poll_interval: Duration,
    /// Heartbeat write interval (`WORKER_HEARTBEAT_INTERVAL`).
    pub heartbeat_interval: Duration,
    /// Consecutive empty polls before backoff begins to multiply the sleep.
    pub backoff_after_empty_polls: u32,
    /// Multiplicative backoff factor applied once the threshold above is crossed.
    pub backoff_factor: f64,
    /// How often (in polls) to check the parent process is still alive.
    pub orphan_check_every_polls: u32,
    /// Retry schedule for worker registration under transient store contention.
    pub register_retry_initial: Duration,
    /// Maximum registration retry attempts.
    pub register_retry_max_attempts: u32,
}

impl RuntimeConfig {
    /// Base poll interval default.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// Backoff ceiling default.
    pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);
    /// Heartbeat interval default.
    pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
    /// Empty-poll backoff threshold default (~5s idle at the base interval).
    pub const DEFAULT_BACKOFF_AFTER_EMPTY_POLLS: u32 = 50;
    /// Gentle backoff multiplier default.
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.2;
    /// Orphan-check cadence default (~5s at the base interval).
    pub const DEFAULT_ORPHAN_CHECK_EVERY_POLLS: u32 = 50;
    /// Registration retry initial backoff default.
    pub const DEFAULT_REGISTER_RETRY_INITIAL: Duration = Duration::from_millis(500);
    /// Registration retry attempt ceiling default.
    pub const DEFAULT_REGISTER_RETRY_MAX_ATTEMPTS: u32 = 5;
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            max_poll_interval: Self::DEFAULT_MAX_POLL_INTERVAL,
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
            backoff_after_empty_polls: Self::DEFAULT_BACKOFF_AFTER_EMPTY_POLLS,
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
            orphan_check_every_polls: Self::DEFAULT_ORPHAN_CHECK_EVERY_POLLS,
            register_retry_initial: Self::DEFAULT_REGISTER_RETRY_INITIAL,
            register_retry_max_attempts: Self::DEFAULT_REGISTER_RETRY_MAX_ATTEMPTS,
        }
    }
}

/// Configuration for the pool manager's supervised fleets.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// `(job_type, desired worker count)` for each managed fleet.
    pub fleets: Vec<(JobType, usize)>,
    /// Heartbeat staleness beyond which a worker is marked `hung`.
    pub hung_threshold: Duration,
    /// Heartbeat staleness beyond which a worker is marked `dead` and reaped.
    pub dead_threshold: Duration,
    /// Interval between supervision passes.
    pub supervision_interval: Duration,
    /// How long to wait for a graceful stop before force-killing on shutdown.
    pub shutdown_grace: Duration,
}

impl PoolConfig {
    /// Hung threshold default.
    pub const DEFAULT_HUNG_THRESHOLD: Duration = Duration::from_secs(30);
    /// Dead threshold default.
    pub const DEFAULT_DEAD_THRESHOLD: Duration = Duration::from_secs(60);
    /// Supervision interval default.
    pub const DEFAULT_SUPERVISION_INTERVAL: Duration = Duration::from_secs(10);
    /// Graceful-shutdown grace period default.
    pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

    /// Build a config for the given fleets, using the mandated defaults.
    pub fn new(fleets: Vec<(JobType, usize)>) -> Self {
        Self {
            fleets,
            hung_threshold: Self::DEFAULT_HUNG_THRESHOLD,
            dead_threshold: Self::DEFAULT_DEAD_THRESHOLD,
            supervision_interval: Self::DEFAULT_SUPERVISION_INTERVAL,
            shutdown_grace: Self::DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Configuration for the backend's submission/wait cycle.
#[derive(Debug, Clone, Copy)]
pub struct BackendConfig {
    /// Completion-polling interval.
    pub poll_interval: Duration,
    /// Overall deadline for `wait_for_completion`.
    pub timeout: Duration,
}

impl BackendConfig {
    /// Poll interval default.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// Overall deadline default.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}
