use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use orc_core::{CacheEntry, Event, EventKind, Job, JobStatus, JobType, Payload, Worker, WorkerStatus};
use orc_core::OrchestratorError;

#[derive(sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: i64,
    pub job_type: String,
    pub status: String,
    pub priority: i64,
    pub input_file: String,
    pub output_file: String,
    pub content_hash: String,
    pub payload: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub worker_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result_metadata: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = OrchestratorError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            job_type: JobType::from_str(&row.job_type)
                .map_err(|e| OrchestratorError::StoreIo(e.to_string()))?,
            status: JobStatus::from_str(&row.status)
                .map_err(|e| OrchestratorError::StoreIo(e.to_string()))?,
            priority: row.priority,
            input_file: PathBuf::from(row.input_file),
            output_file: PathBuf::from(row.output_file),
            content_hash: row.content_hash,
            payload: Payload::from_text(&row.payload)
                .map_err(|e| OrchestratorError::StoreIo(e.to_string()))?,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            worker_id: row.worker_id,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error: row.error,
            result_metadata: row
                .result_metadata
                .map(|text| serde_json::from_str(&text))
                .transpose()
                .map_err(|e: serde_json::Error| OrchestratorError::StoreIo(e.to_string()))?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct WorkerRow {
    pub id: i64,
    pub worker_type: String,
    pub container_id: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub jobs_processed: i64,
    pub jobs_failed: i64,
    pub avg_processing_time_ms: f64,
}

impl TryFrom<WorkerRow> for Worker {
    type Error = OrchestratorError;

    fn try_from(row: WorkerRow) -> Result<Self, Self::Error> {
        Ok(Worker {
            id: row.id,
            worker_type: JobType::from_str(&row.worker_type)
                .map_err(|e| OrchestratorError::StoreIo(e.to_string()))?,
            container_id: row.container_id,
            status: WorkerStatus::from_str(&row.status)
                .map_err(|e| OrchestratorError::StoreIo(e.to_string()))?,
            started_at: row.started_at,
            last_heartbeat: row.last_heartbeat,
            jobs_processed: row.jobs_processed,
            jobs_failed: row.jobs_failed,
            avg_processing_time_ms: row.avg_processing_time_ms,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CacheRow {
    pub output_file: String,
    pub content_hash: String,
    pub result_metadata: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
}

impl TryFrom<CacheRow> for CacheEntry {
    type Error = OrchestratorError;

    fn try_from(row: CacheRow) -> Result<Self, Self::Error> {
        Ok(CacheEntry {
            output_file: PathBuf::from(row.output_file),
            content_hash: row.content_hash,
            result_metadata: serde_json::from_str(&row.result_metadata)
                .map_err(|e| OrchestratorError::StoreIo(e.to_string()))?,
            created_at: row.created_at,
            last_accessed: row.last_accessed,
            access_count: row.access_count,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EventRow {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub kind: String,
    pub job_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub detail: String,
}

impl TryFrom<EventRow> for Event {
    type Error = OrchestratorError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "job_submitted" => EventKind::JobSubmitted,
            "job_claimed" => EventKind::JobClaimed,
            "job_completed" => EventKind::JobCompleted,
            "job_failed" => EventKind::JobFailed,
            "cache_hit" => EventKind::CacheHit,
            "worker_registered" => EventKind::WorkerRegistered,
            "worker_heartbeat" => EventKind::WorkerHeartbeat,
            "worker_reaped" => EventKind::WorkerReaped,
            "pool_started" => EventKind::PoolStarted,
            "pool_stopped" => EventKind::PoolStopped,
            other => return Err(OrchestratorError::StoreIo(format!("unknown event kind: {other}"))),
        };
        Ok(Event {
            id: row.id,
            ts: row.ts,
            kind,
            job_id: row.job_id,
            worker_id: row.worker_id,
            detail: row.detail,
        })
    }
}
