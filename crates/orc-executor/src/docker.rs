use std::path::PathBuf;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::models::HostConfig;
use orc_core::{JobType, OrchestratorError};

use crate::traits::WorkerExecutor;

/// Fixed container-local mount points, per the filesystem layout contract
/// (section 6): workers never see host-absolute paths directly.
pub const SOURCE_MOUNT: &str = "/source";
/// Container-local mount for the writable output directory.
pub const WORKSPACE_MOUNT: &str = "/workspace";
/// Container-local path the shared store file is mounted at.
pub const STORE_MOUNT: &str = "/data/orchestrator.db";

/// Configuration for [`ContainerExecutor`]: launches workers in an isolated
/// container runtime with a read-only source mount and a read-write
/// workspace mount.
#[derive(Debug, Clone)]
pub struct ContainerExecutorConfig {
    /// Image to run for every worker in the managed fleet.
    pub image: String,
    /// Host path mounted read-only at [`SOURCE_MOUNT`].
    pub host_data_dir: PathBuf,
    /// Host path mounted read-write at [`WORKSPACE_MOUNT`].
    pub host_workspace: PathBuf,
    /// Host path of the shared store file, mounted read-write at [`STORE_MOUNT`].
    pub host_db_path: PathBuf,
}

/// A launched container worker.
pub struct ContainerHandle {
    container_id: String,
}

/// Launches workers as isolated containers with mounted source and output
/// directories, using the Docker Engine API.
pub struct ContainerExecutor {
    docker: Docker,
    config: ContainerExecutorConfig,
}

impl ContainerExecutor {
    /// Build a container executor against an already-connected Docker client.
    pub fn new(docker: Docker, config: ContainerExecutorConfig) -> Self {
        Self { docker, config }
    }
}

impl WorkerExecutor for ContainerExecutor {
    type Handle = ContainerHandle;

    async fn start(
        &self,
        job_type: JobType,
        worker_index: usize,
        launch_id: &str,
    ) -> Result<Self::Handle, OrchestratorError> {
        let name = format!("orc-worker-{}-{}", job_type.as_str(), worker_index);
        let launch_err = |reason: String| OrchestratorError::WorkerLaunchFailed {
            worker_type: job_type.as_str().to_string(),
            reason,
        };

        let binds = vec![
            format!("{}:{}:ro", self.config.host_data_dir.display(), SOURCE_MOUNT),
            format!("{}:{}:rw", self.config.host_workspace.display(), WORKSPACE_MOUNT),
            format!("{}:{}:rw", self.config.host_db_path.display(), STORE_MOUNT),
        ];
        let env = vec![
            format!("HOST_DATA_DIR={}", self.config.host_data_dir.display()),
            format!("HOST_WORKSPACE={}", self.config.host_workspace.display()),
            format!("DB_PATH={STORE_MOUNT}"),
            format!("WORKER_TYPE={}", job_type.as_str()),
            format!("WORKER_INDEX={worker_index}"),
            format!("WORKER_CONTAINER_ID={launch_id}"),
        ];

        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };
        let config = Config {
            image: Some(self.config.image.clone()),
            env: Some(env),
            host_config: Some(HostConfig {
                binds: Some(binds),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|err| launch_err(err.to_string()))?;

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|err| launch_err(err.to_string()))?;

        tracing::info!(worker_type = %job_type, worker_index, container_id = %created.id, "started container worker");
        Ok(ContainerHandle {
            container_id: created.id,
        })
    }

    async fn stop(&self, handle: &mut Self::Handle) -> Result<(), OrchestratorError> {
        self.docker
            .stop_container(&handle.container_id, Some(StopContainerOptions { t: 10 }))
            .await
            .map_err(|err| OrchestratorError::StoreIo(err.to_string()))
    }

    async fn is_running(&self, handle: &mut Self::Handle) -> bool {
        match self.docker.inspect_container(&handle.container_id, None).await {
            Ok(info) => info.state.and_then(|s| s.running).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn force_kill(&self, handle: &mut Self::Handle) -> Result<(), OrchestratorError> {
        let _ = self
            .docker
            .kill_container(&handle.container_id, None::<KillContainerOptions<String>>)
            .await;
        self.docker
            .remove_container(
                &handle.container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|err| OrchestratorError::StoreIo(err.to_string()))
    }
}
