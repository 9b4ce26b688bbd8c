use std::path::PathBuf;

use orc_core::JobType;

use crate::{DirectExecutor, DirectExecutorConfig, WorkerExecutor};

fn long_running_config() -> DirectExecutorConfig {
    DirectExecutorConfig {
        worker_binary: PathBuf::from("sh"),
        db_path: PathBuf::from("/tmp/does-not-matter.db"),
        args: vec!["-c".to_string(), "sleep 5".to_string()],
        extra_env: Vec::new(),
    }
}

#[tokio::test]
async fn direct_executor_reports_running_then_not() {
    let executor = DirectExecutor::new(long_running_config());
    let mut handle = executor
        .start(JobType::Notebook, 0, "direct-test")
        .await
        .unwrap();

    assert!(executor.is_running(&mut handle).await);
    executor.force_kill(&mut handle).await.unwrap();
    assert!(!executor.is_running(&mut handle).await);
}

#[tokio::test]
async fn direct_executor_start_failure_is_reported() {
    let config = DirectExecutorConfig {
        worker_binary: PathBuf::from("/no/such/binary-should-not-exist"),
        db_path: PathBuf::from("/tmp/does-not-matter.db"),
        args: Vec::new(),
        extra_env: Vec::new(),
    };
    let executor = DirectExecutor::new(config);
    let result = executor.start(JobType::Notebook, 0, "direct-test-missing").await;
    assert!(result.is_err());
}
