use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use orc_core::{
    CacheEntry, EventKind, Job, JobStatus, JobType, OrchestratorError, Payload, StoreConfig,
    Worker, WorkerStatus,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::rows::{CacheRow, EventRow, JobRow, WorkerRow};
use crate::schema::CREATE_TABLES;

fn store_err(err: sqlx::Error) -> OrchestratorError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Database(_) if is_busy(&err) => {
            OrchestratorError::StoreBusy
        }
        _ => OrchestratorError::StoreIo(err.to_string()),
    }
}

fn is_busy(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::PoolTimedOut)
        || err
            .as_database_error()
            .map(|db| db.message().contains("database is locked") || db.message().contains("busy"))
            .unwrap_or(false)
}

/// A handle to the durable store. Cheaply `Clone`-able; internally a
/// connection pool, so a single `Store` value may be shared across tasks.
///
/// Concurrency mode: the underlying pool opens the database in WAL journaling
/// mode with a busy timeout at or above the mandated 30s floor, so short
/// writer contention is absorbed by SQLite's own retry rather than surfacing
/// as an error. One physical connection is checked out per concurrent
/// operation and never shared while in use.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if absent) the database at `config.path`, bootstrap the
    /// schema, and configure the pragmas the concurrency model requires.
    pub async fn open(config: &StoreConfig) -> Result<Self, OrchestratorError> {
        let busy_timeout = config.busy_timeout.max(StoreConfig::MIN_BUSY_TIMEOUT);
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .busy_timeout(busy_timeout)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(store_err)?;

        sqlx::query(CREATE_TABLES)
            .execute(&pool)
            .await
            .map_err(store_err)?;

        Ok(Self { pool })
    }

    /// Insert a new pending job. Returns the assigned id.
    pub async fn add_job(
        &self,
        job_type: JobType,
        input_file: &Path,
        output_file: &Path,
        content_hash: &str,
        payload: &Payload,
        priority: i64,
        max_attempts: i64,
    ) -> Result<i64, OrchestratorError> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO jobs
                (job_type, status, priority, input_file, output_file, content_hash,
                 payload, attempts, max_attempts, worker_id, created_at, started_at,
                 completed_at, error, result_metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, NULL, ?9, NULL, NULL, NULL, NULL)
            RETURNING id
            "#,
        )
        .bind(job_type.as_str())
        .bind(JobStatus::Pending.as_str())
        .bind(priority)
        .bind(input_file.to_string_lossy().to_string())
        .bind(output_file.to_string_lossy().to_string())
        .bind(content_hash)
        .bind(payload.to_text())
        .bind(max_attempts)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let id: i64 = row.try_get("id").map_err(store_err)?;
        self.record_event(EventKind::JobSubmitted, Some(id), None, content_hash)
            .await;
        Ok(id)
    }

    /// The central algorithm: atomically claim the highest-priority, oldest
    /// eligible pending job of `job_type` for `worker_id`, in a single write
    /// statement. Never a compound select-then-update.
    pub async fn claim_next_job(
        &self,
        job_type: JobType,
        worker_id: i64,
    ) -> Result<Option<Job>, OrchestratorError> {
        let now = Utc::now();
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'processing', worker_id = ?1, started_at = ?2, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM jobs
                WHERE job_type = ?3 AND status = 'pending' AND attempts < max_attempts
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
            )
            RETURNING id, job_type, status, priority, input_file, output_file, content_hash,
                      payload, attempts, max_attempts, worker_id, created_at, started_at,
                      completed_at, error, result_metadata
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .bind(job_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            Some(row) => {
                let job = Job::try_from(row)?;
                self.record_event(EventKind::JobClaimed, Some(job.id), Some(worker_id), "")
                    .await;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Transition a job's status, setting timestamps/error per the data-model invariants.
    ///
    /// `result_metadata` is written only for the `Completed` transition: it
    /// is the structured descriptor the backend later reads back to
    /// populate `results_cache` (section 4.5) — callers transitioning to any
    /// other status pass `None`.
    pub async fn update_job_status(
        &self,
        id: i64,
        new_status: JobStatus,
        error: Option<&str>,
        result_metadata: Option<&serde_json::Value>,
    ) -> Result<(), OrchestratorError> {
        let now = Utc::now();
        match new_status {
            JobStatus::Completed => {
                sqlx::query(
                    "UPDATE jobs SET status = ?1, completed_at = ?2, error = NULL, result_metadata = ?3 WHERE id = ?4",
                )
                .bind(new_status.as_str())
                .bind(now)
                .bind(result_metadata.map(|m| m.to_string()))
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
                self.record_event(EventKind::JobCompleted, Some(id), None, "")
                    .await;
            }
            JobStatus::Failed => {
                sqlx::query("UPDATE jobs SET status = ?1, completed_at = ?2, error = ?3 WHERE id = ?4")
                    .bind(new_status.as_str())
                    .bind(now)
                    .bind(error.unwrap_or("unknown error"))
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(store_err)?;
                self.record_event(EventKind::JobFailed, Some(id), None, error.unwrap_or(""))
                    .await;
            }
            JobStatus::Pending => {
                sqlx::query(
                    "UPDATE jobs SET status = ?1, worker_id = NULL, started_at = NULL WHERE id = ?2",
                )
                .bind(new_status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
            }
            JobStatus::Processing => {
                sqlx::query("UPDATE jobs SET status = ?1 WHERE id = ?2")
                    .bind(new_status.as_str())
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(store_err)?;
            }
        }
        Ok(())
    }

    /// Look up a cache entry, bumping its access counter best-effort. The bump
    /// is not required to be transactional with the read (open question,
    /// resolved in favor of best-effort per the design notes).
    pub async fn check_cache(
        &self,
        output_file: &Path,
        content_hash: &str,
    ) -> Result<Option<serde_json::Value>, OrchestratorError> {
        let output = output_file.to_string_lossy().to_string();
        let row: Option<CacheRow> = sqlx::query_as(
            "SELECT output_file, content_hash, result_metadata, created_at, last_accessed, access_count
             FROM results_cache WHERE output_file = ?1 AND content_hash = ?2",
        )
        .bind(&output)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let Some(row) = row else { return Ok(None) };
        let metadata = row.result_metadata.clone();

        let now = Utc::now();
        if let Err(err) = sqlx::query(
            "UPDATE results_cache SET last_accessed = ?1, access_count = access_count + 1
             WHERE output_file = ?2 AND content_hash = ?3",
        )
        .bind(now)
        .bind(&output)
        .bind(content_hash)
        .execute(&self.pool)
        .await
        {
            tracing::warn!(error = %err, "cache access bump failed, ignoring");
        }

        let metadata: serde_json::Value = serde_json::from_str(&metadata)
            .map_err(|e| OrchestratorError::StoreIo(e.to_string()))?;
        Ok(Some(metadata))
    }

    /// Insert a cache entry. Idempotent on the composite key.
    pub async fn add_to_cache(
        &self,
        output_file: &Path,
        content_hash: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO results_cache
                (output_file, content_hash, result_metadata, created_at, last_accessed, access_count)
            VALUES (?1, ?2, ?3, ?4, ?4, 0)
            ON CONFLICT (output_file, content_hash) DO NOTHING
            "#,
        )
        .bind(output_file.to_string_lossy().to_string())
        .bind(content_hash)
        .bind(metadata.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Register a new worker. Retries on transient lock contention are the
    /// caller's responsibility (the worker runtime's bounded backoff); this
    /// call itself is a single autocommit statement.
    pub async fn register_worker(
        &self,
        worker_type: JobType,
        container_id: &str,
    ) -> Result<i64, OrchestratorError> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO workers
                (worker_type, container_id, status, started_at, last_heartbeat,
                 jobs_processed, jobs_failed, avg_processing_time_ms)
            VALUES (?1, ?2, ?3, ?4, ?4, 0, 0, 0.0)
            RETURNING id
            "#,
        )
        .bind(worker_type.as_str())
        .bind(container_id)
        .bind(WorkerStatus::Idle.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let id: i64 = row.try_get("id").map_err(store_err)?;
        self.record_event(EventKind::WorkerRegistered, None, Some(id), container_id)
            .await;
        Ok(id)
    }

    /// Write a heartbeat for `id`.
    pub async fn update_heartbeat(&self, id: i64) -> Result<(), OrchestratorError> {
        let now = Utc::now();
        sqlx::query("UPDATE workers SET last_heartbeat = ?1 WHERE id = ?2")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Set a worker's status directly (used for idle/busy transitions).
    pub async fn mark_worker_status(
        &self,
        id: i64,
        status: WorkerStatus,
    ) -> Result<(), OrchestratorError> {
        sqlx::query("UPDATE workers SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Record the outcome of a claimed job against the owning worker's
    /// rolling statistics, then return it to `idle`.
    pub async fn record_job_outcome(
        &self,
        worker_id: i64,
        success: bool,
        processing_time_ms: f64,
    ) -> Result<(), OrchestratorError> {
        let column = if success { "jobs_processed" } else { "jobs_failed" };
        sqlx::query(&format!(
            "UPDATE workers SET {column} = {column} + 1,
             avg_processing_time_ms =
                (avg_processing_time_ms * (jobs_processed + jobs_failed) + ?1)
                / (jobs_processed + jobs_failed + 1),
             status = ?2
             WHERE id = ?3"
        ))
        .bind(processing_time_ms)
        .bind(WorkerStatus::Idle.as_str())
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Return worker ids whose heartbeat is older than `threshold` and not
    /// already `dead`. A read-only primitive; callers decide what to do.
    pub async fn list_stale_workers(&self, threshold: Duration) -> Result<Vec<i64>, OrchestratorError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(threshold).unwrap_or_default();
        let rows = sqlx::query("SELECT id FROM workers WHERE last_heartbeat < ?1 AND status != 'dead'")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter()
            .map(|r| r.try_get::<i64, _>("id").map_err(store_err))
            .collect()
    }

    /// Mark every worker staler than `threshold` (and not dead) as `hung`, in
    /// one statement. Returns the ids marked.
    pub async fn mark_hung_workers(&self, threshold: Duration) -> Result<Vec<i64>, OrchestratorError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(threshold).unwrap_or_default();
        let rows = sqlx::query(
            "UPDATE workers SET status = 'hung' WHERE last_heartbeat < ?1 AND status NOT IN ('dead', 'hung') RETURNING id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter()
            .map(|r| r.try_get::<i64, _>("id").map_err(store_err))
            .collect()
    }

    /// The dead-worker recovery transaction: atomically mark every worker
    /// staler than `threshold` as `dead` and reset any job it still owns back
    /// to `pending` with its `worker_id` cleared.
    pub async fn reap_dead_workers(&self, threshold: Duration) -> Result<Vec<i64>, OrchestratorError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(threshold).unwrap_or_default();
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let rows = sqlx::query("SELECT id FROM workers WHERE last_heartbeat < ?1 AND status != 'dead'")
            .bind(cutoff)
            .fetch_all(&mut *tx)
            .await
            .map_err(store_err)?;
        let ids: Vec<i64> = rows
            .into_iter()
            .map(|r| r.try_get::<i64, _>("id"))
            .collect::<Result<_, _>>()
            .map_err(store_err)?;

        if ids.is_empty() {
            tx.commit().await.map_err(store_err)?;
            return Ok(ids);
        }

        sqlx::query("UPDATE workers SET status = 'dead' WHERE last_heartbeat < ?1 AND status != 'dead'")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        sqlx::query(
            "UPDATE jobs SET status = 'pending', worker_id = NULL, started_at = NULL
             WHERE status = 'processing' AND worker_id IN (
                 SELECT id FROM workers WHERE status = 'dead'
             )",
        )
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;

        for id in &ids {
            self.record_event(EventKind::WorkerReaped, None, Some(*id), "heartbeat stale")
                .await;
        }
        Ok(ids)
    }

    /// Reset any `processing` job still assigned to `worker_id` back to
    /// `pending`. The single-worker primitive used inside reap transactions
    /// and directly by the pool manager's shutdown path.
    pub async fn reset_job_for_worker(&self, worker_id: i64) -> Result<(), OrchestratorError> {
        sqlx::query(
            "UPDATE jobs SET status = 'pending', worker_id = NULL, started_at = NULL
             WHERE worker_id = ?1 AND status = 'processing'",
        )
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Belt-and-braces reconciliation: reset every `processing` job whose
    /// owning worker is already `dead`, regardless of who marked it so. A
    /// single autocommit statement (subquery + update), safe to call even if
    /// the pool manager is not running.
    pub async fn reset_jobs_of_dead_workers(&self) -> Result<u64, OrchestratorError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'pending', worker_id = NULL, started_at = NULL
             WHERE status = 'processing' AND worker_id IN (
                 SELECT id FROM workers WHERE status = 'dead'
             )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected())
    }

    /// Fetch a single job by id.
    pub async fn get_job(&self, id: i64) -> Result<Option<Job>, OrchestratorError> {
        let row: Option<JobRow> = sqlx::query_as(
            "SELECT id, job_type, status, priority, input_file, output_file, content_hash,
                    payload, attempts, max_attempts, worker_id, created_at, started_at,
                    completed_at, error, result_metadata
             FROM jobs WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Job::try_from).transpose()
    }

    /// Fetch a single worker by id.
    pub async fn get_worker(&self, id: i64) -> Result<Option<Worker>, OrchestratorError> {
        let row: Option<WorkerRow> = sqlx::query_as(
            "SELECT id, worker_type, container_id, status, started_at, last_heartbeat,
                    jobs_processed, jobs_failed, avg_processing_time_ms
             FROM workers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Worker::try_from).transpose()
    }

    /// Look up a worker by the executor-assigned `container_id`. Used by the
    /// pool manager to correlate a just-launched handle with the db row the
    /// worker registers for itself, once it has started up.
    pub async fn find_worker_by_container_id(
        &self,
        container_id: &str,
    ) -> Result<Option<Worker>, OrchestratorError> {
        let row: Option<WorkerRow> = sqlx::query_as(
            "SELECT id, worker_type, container_id, status, started_at, last_heartbeat,
                    jobs_processed, jobs_failed, avg_processing_time_ms
             FROM workers WHERE container_id = ?1",
        )
        .bind(container_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Worker::try_from).transpose()
    }

    /// Count workers currently `idle` or `busy`, with a fresh heartbeat (newer
    /// than `threshold`). Used by the lifecycle manager to detect whether a
    /// pool is already running before deciding to start one (persistent-mode
    /// reuse, section 4.6).
    pub async fn count_live_workers(&self, threshold: Duration) -> Result<i64, OrchestratorError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(threshold).unwrap_or_default();
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM workers
             WHERE status IN ('idle', 'busy') AND last_heartbeat >= ?1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        row.try_get::<i64, _>("n").map_err(store_err)
    }

    /// Best-effort append to the audit log. Never fails the caller; a failed
    /// event write is logged and swallowed, since the log is explicitly not
    /// part of the dispatch protocol.
    pub async fn record_event(
        &self,
        kind: EventKind,
        job_id: Option<i64>,
        worker_id: Option<i64>,
        detail: &str,
    ) {
        let now = Utc::now();
        if let Err(err) = sqlx::query(
            "INSERT INTO events (ts, kind, job_id, worker_id, detail) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(now)
        .bind(kind.as_str())
        .bind(job_id)
        .bind(worker_id)
        .bind(detail)
        .execute(&self.pool)
        .await
        {
            tracing::warn!(error = %err, %kind, "event append failed, ignoring");
        }
    }

    /// Direct pool access for tests that need to reach past the public API
    /// (e.g. backdating a heartbeat to simulate staleness without sleeping).
    #[cfg(test)]
    pub(crate) fn raw_pool_for_tests(&self) -> &SqlitePool {
        &self.pool
    }

    /// Recent events, newest first. For monitoring surfaces only.
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<orc_core::Event>, OrchestratorError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, ts, kind, job_id, worker_id, detail FROM events ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(orc_core::Event::try_from).collect()
    }
}
