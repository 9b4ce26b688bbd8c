/// Schema bootstrap, run idempotently on every `Store::open`.
///
/// No external migration tool is introduced at this scale (see ambient-stack
/// notes): the store owns its own `CREATE TABLE IF NOT EXISTS` bootstrap.
pub(crate) const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    job_type        TEXT NOT NULL,
    status          TEXT NOT NULL,
    priority        INTEGER NOT NULL DEFAULT 0,
    input_file      TEXT NOT NULL,
    output_file     TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    payload         TEXT NOT NULL,
    attempts        INTEGER NOT NULL DEFAULT 0,
    max_attempts    INTEGER NOT NULL DEFAULT 3,
    worker_id       INTEGER,
    created_at      TEXT NOT NULL,
    started_at      TEXT,
    completed_at    TEXT,
    error           TEXT,
    result_metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_claim
    ON jobs (job_type, status, priority DESC, created_at ASC);

CREATE TABLE IF NOT EXISTS workers (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    worker_type             TEXT NOT NULL,
    container_id            TEXT NOT NULL UNIQUE,
    status                  TEXT NOT NULL,
    started_at              TEXT NOT NULL,
    last_heartbeat          TEXT NOT NULL,
    jobs_processed          INTEGER NOT NULL DEFAULT 0,
    jobs_failed             INTEGER NOT NULL DEFAULT 0,
    avg_processing_time_ms  REAL NOT NULL DEFAULT 0.0
);

CREATE INDEX IF NOT EXISTS idx_workers_heartbeat
    ON workers (status, last_heartbeat);

CREATE TABLE IF NOT EXISTS results_cache (
    output_file     TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    result_metadata TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    last_accessed   TEXT NOT NULL,
    access_count    INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (output_file, content_hash)
);

CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    ts          TEXT NOT NULL,
    kind        TEXT NOT NULL,
    job_id      INTEGER,
    worker_id   INTEGER,
    detail      TEXT NOT NULL DEFAULT ''
);
"#;
