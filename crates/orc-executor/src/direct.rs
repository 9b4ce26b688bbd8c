use std::path::PathBuf;

use orc_core::{JobType, OrchestratorError};
use tokio::process::Command;

use crate::traits::WorkerExecutor;

/// Configuration for [`DirectExecutor`]: spawns workers as in-process
/// children inheriting the native filesystem and the store file path.
#[derive(Debug, Clone)]
pub struct DirectExecutorConfig {
    /// Path to the worker executable to spawn.
    pub worker_binary: PathBuf,
    /// Path to the shared store file, passed as `DB_PATH`.
    pub db_path: PathBuf,
    /// Arguments passed to every spawned worker, before the env-based contract.
    pub args: Vec<String>,
    /// Additional environment variables merged into every spawn.
    pub extra_env: Vec<(String, String)>,
}

/// A launched in-process child worker.
pub struct DirectHandle {
    child: tokio::process::Child,
}

/// Launches workers as direct subprocesses of the orchestrator.
pub struct DirectExecutor {
    config: DirectExecutorConfig,
}

impl DirectExecutor {
    /// Build a direct executor from its configuration.
    pub fn new(config: DirectExecutorConfig) -> Self {
        Self { config }
    }
}

impl WorkerExecutor for DirectExecutor {
    type Handle = DirectHandle;

    async fn start(
        &self,
        job_type: JobType,
        worker_index: usize,
        launch_id: &str,
    ) -> Result<Self::Handle, OrchestratorError> {
        let mut cmd = Command::new(&self.config.worker_binary);
        cmd.args(&self.config.args)
            .env("DB_PATH", &self.config.db_path)
            .env("WORKER_TYPE", job_type.as_str())
            .env("WORKER_INDEX", worker_index.to_string())
            .env("WORKER_CONTAINER_ID", launch_id)
            .kill_on_drop(true);
        for (key, value) in &self.config.extra_env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|err| OrchestratorError::WorkerLaunchFailed {
            worker_type: job_type.as_str().to_string(),
            reason: err.to_string(),
        })?;

        tracing::info!(worker_type = %job_type, worker_index, launch_id, "spawned direct worker");
        Ok(DirectHandle { child })
    }

    async fn stop(&self, handle: &mut Self::Handle) -> Result<(), OrchestratorError> {
        // Graceful: send SIGTERM so the worker's own signal handler drains
        // its in-flight job before exiting (section 4.2 cancellation).
        #[cfg(unix)]
        if let Some(pid) = handle.child.id() {
            // Safety: `pid` is a live child pid obtained from this same
            // `Child` handle; `kill(pid, SIGTERM)` cannot affect unrelated
            // processes and its return value is checked only for logging.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                tracing::warn!(pid, "SIGTERM delivery to worker failed");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = handle.child.start_kill();
        }
        Ok(())
    }

    async fn is_running(&self, handle: &mut Self::Handle) -> bool {
        matches!(handle.child.try_wait(), Ok(None))
    }

    async fn force_kill(&self, handle: &mut Self::Handle) -> Result<(), OrchestratorError> {
        handle
            .child
            .kill()
            .await
            .map_err(|err| OrchestratorError::StoreIo(err.to_string()))
    }
}
