use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of job types this core dispatches.
///
/// Re-architected from the source's polymorphic file-type/operation classes
/// (see design notes): a flat enumeration rather than a class hierarchy, since
/// every job type shares the same `process(job) -> result | error` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Executable notebook conversion.
    Notebook,
    /// PlantUML diagram rendering.
    Plantuml,
    /// Draw.io diagram rendering.
    Drawio,
}

impl JobType {
    /// All known job types, for fleet configuration iteration.
    pub const ALL: [JobType; 3] = [JobType::Notebook, JobType::Plantuml, JobType::Drawio];

    /// Stable string form used as the `job_type` / `worker_type` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Notebook => "notebook",
            JobType::Plantuml => "plantuml",
            JobType::Drawio => "drawio",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `job_type`/`worker_type` column held a value outside the closed set.
#[derive(Debug, thiserror::Error)]
#[error("unknown job type: {0}")]
pub struct UnknownJobType(pub String);

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notebook" => Ok(JobType::Notebook),
            "plantuml" => Ok(JobType::Plantuml),
            "drawio" => Ok(JobType::Drawio),
            other => Err(UnknownJobType(other.to_string())),
        }
    }
}

/// Job lifecycle state. Initial `Pending`; terminal `Completed`/`Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker, in flight.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with a terminal error (attempts exhausted).
    Failed,
}

impl JobStatus {
    /// True for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Stable string form used as the `status` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `status` column held a value outside the closed set.
#[derive(Debug, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct UnknownJobStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownJobStatus(other.to_string())),
        }
    }
}

/// Worker health state. `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    /// Registered, polling, no job claimed.
    Idle,
    /// Currently processing a claimed job.
    Busy,
    /// Heartbeat older than the hung threshold, but not yet reaped.
    Hung,
    /// Reaped by the pool manager; terminal.
    Dead,
}

impl WorkerStatus {
    /// Stable string form used as the `status` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Hung => "hung",
            WorkerStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `status` column held a value outside the closed set.
#[derive(Debug, thiserror::Error)]
#[error("unknown worker status: {0}")]
pub struct UnknownWorkerStatus(pub String);

impl FromStr for WorkerStatus {
    type Err = UnknownWorkerStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(WorkerStatus::Idle),
            "busy" => Ok(WorkerStatus::Busy),
            "hung" => Ok(WorkerStatus::Hung),
            "dead" => Ok(WorkerStatus::Dead),
            other => Err(UnknownWorkerStatus(other.to_string())),
        }
    }
}

/// Opaque, worker-specific job parameters. The core neither parses nor
/// validates the contents beyond requiring the `kind` field to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload(pub serde_json::Value);

impl Payload {
    /// Build a payload, failing if the required `kind` field is absent.
    pub fn new(value: serde_json::Value) -> Result<Self, MissingPayloadKind> {
        if value.get("kind").is_none() {
            return Err(MissingPayloadKind);
        }
        Ok(Payload(value))
    }

    /// The required `kind` discriminator, as a string.
    pub fn kind(&self) -> &str {
        self.0
            .get("kind")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    /// Serialize to the self-describing text blob stored in the `payload` column.
    pub fn to_text(&self) -> String {
        self.0.to_string()
    }

    /// Parse the text blob read back from the `payload` column.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Payload(serde_json::from_str(text)?))
    }
}

/// `Payload::new` was given a value with no `kind` field.
#[derive(Debug, thiserror::Error)]
#[error("payload is missing the required 'kind' field")]
pub struct MissingPayloadKind;

/// A unit of work, as stored in the `jobs` relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Monotonically assigned identifier.
    pub id: i64,
    /// Which worker class may claim this job.
    pub job_type: JobType,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Higher values dispatched first.
    pub priority: i64,
    /// Absolute host path to the input.
    pub input_file: PathBuf,
    /// Absolute host path to the output.
    pub output_file: PathBuf,
    /// Fingerprint of input contents plus transform parameters.
    pub content_hash: String,
    /// Opaque worker-specific parameters.
    pub payload: Payload,
    /// Number of claim attempts made so far.
    pub attempts: i64,
    /// Attempts permitted before the job is terminally failed.
    pub max_attempts: i64,
    /// Worker currently holding the claim, if `Processing`.
    pub worker_id: Option<i64>,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
    /// When the job was last claimed.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal error text, set only when `Failed`.
    pub error: Option<String>,
    /// Structured descriptor of the produced artifact, set by the worker
    /// when the job reaches `Completed`. Carried on the row (rather than
    /// only in `results_cache`) so the component that owns the cache-write
    /// responsibility (the backend, per section 4.5) can read it back
    /// without reaching into worker-internal state.
    pub result_metadata: Option<serde_json::Value>,
}

/// A registered worker process, as stored in the `workers` relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Monotonically assigned identifier.
    pub id: i64,
    /// The `job_type` this worker services.
    pub worker_type: JobType,
    /// Opaque executor-assigned handle (process id or container id).
    pub container_id: String,
    /// Current health state.
    pub status: WorkerStatus,
    /// When the worker registered.
    pub started_at: DateTime<Utc>,
    /// Last heartbeat write.
    pub last_heartbeat: DateTime<Utc>,
    /// Lifetime successful job count.
    pub jobs_processed: i64,
    /// Lifetime failed job count.
    pub jobs_failed: i64,
    /// Rolling average processing time, milliseconds.
    pub avg_processing_time_ms: f64,
}

/// A content-addressed memoization entry, as stored in `results_cache`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Part of the composite key: the output path the artifact lives at.
    pub output_file: PathBuf,
    /// Part of the composite key: the content fingerprint that produced it.
    pub content_hash: String,
    /// Structured descriptor of the produced artifact.
    pub result_metadata: serde_json::Value,
    /// When the entry was first written.
    pub created_at: DateTime<Utc>,
    /// When the entry was last looked up.
    pub last_accessed: DateTime<Utc>,
    /// Number of times the entry has been looked up.
    pub access_count: i64,
}

/// The closed set of audit-log event kinds. Append-only; not part of the
/// dispatch protocol and may be discarded without correctness impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A job was inserted into `jobs`.
    JobSubmitted,
    /// A job was atomically claimed by a worker.
    JobClaimed,
    /// A job reached `Completed`.
    JobCompleted,
    /// A job reached `Failed`.
    JobFailed,
    /// A submission matched an existing cache entry and skipped execution.
    CacheHit,
    /// A worker registered.
    WorkerRegistered,
    /// A worker wrote a heartbeat.
    WorkerHeartbeat,
    /// The pool manager reaped a dead worker.
    WorkerReaped,
    /// The pool manager launched a fleet.
    PoolStarted,
    /// The pool manager shut a fleet down.
    PoolStopped,
}

impl EventKind {
    /// Stable string form used as the `kind` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::JobSubmitted => "job_submitted",
            EventKind::JobClaimed => "job_claimed",
            EventKind::JobCompleted => "job_completed",
            EventKind::JobFailed => "job_failed",
            EventKind::CacheHit => "cache_hit",
            EventKind::WorkerRegistered => "worker_registered",
            EventKind::WorkerHeartbeat => "worker_heartbeat",
            EventKind::WorkerReaped => "worker_reaped",
            EventKind::PoolStarted => "pool_started",
            EventKind::PoolStopped => "pool_stopped",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only audit log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonically assigned identifier.
    pub id: i64,
    /// When the event was recorded.
    pub ts: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
    /// The job involved, if any.
    pub job_id: Option<i64>,
    /// The worker involved, if any.
    pub worker_id: Option<i64>,
    /// Free-form context.
    pub detail: String,
}
