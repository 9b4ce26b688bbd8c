#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Shared types, configuration, and error taxonomy for the job orchestration core.

mod config;
mod error;
mod types;

pub use config::{BackendConfig, PoolConfig, RuntimeConfig, StoreConfig};
pub use error::OrchestratorError;
pub use types::{
    CacheEntry, Event, EventKind, Job, JobStatus, JobType, Payload, Worker, WorkerStatus,
};
