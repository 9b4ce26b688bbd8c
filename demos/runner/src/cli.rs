use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Minimal driver for the job orchestration core: submits a handful of
/// synthetic jobs through a one-shot build and prints the outcome. Not a
/// course planner or a real worker — those are external collaborators
/// (section 1) the core only specifies a contract for.
#[derive(Debug, Parser)]
#[command(name = "orc-demo-runner", version, about)]
pub struct Cli {
    /// Path to the durable store file. Created if missing.
    #[arg(long, env = "DB_PATH", default_value = "orchestrator-demo.db")]
    pub db_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a one-shot build: start a small worker pool, submit synthetic
    /// notebook/plantuml/drawio jobs, wait for completion, stop the pool.
    Build {
        /// Notebook workers to launch.
        #[arg(long, default_value_t = 2)]
        notebook_workers: usize,
        /// PlantUML workers to launch.
        #[arg(long, default_value_t = 1)]
        plantuml_workers: usize,
        /// Drawio workers to launch.
        #[arg(long, default_value_t = 1)]
        drawio_workers: usize,
        /// Synthetic jobs to submit per job type.
        #[arg(long, default_value_t = 5)]
        jobs_per_type: usize,
    },
    /// Internal entry point: run a single worker's poll loop. Launched by
    /// `Build` via the direct executor, not meant to be invoked directly.
    /// Reads `DB_PATH`, `WORKER_TYPE`, `WORKER_CONTAINER_ID` from the
    /// environment, per the direct-executor launch contract (section 6).
    #[command(hide = true)]
    Worker,
}
