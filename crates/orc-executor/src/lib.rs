#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! The worker executor: launches and terminates worker processes under one
//! of two strategies — [`DirectExecutor`] (in-process subprocess) or
//! [`ContainerExecutor`] (isolated container runtime with mounted source and
//! output directories). Both implement the common [`WorkerExecutor`] trait so
//! the pool manager is agnostic to which is configured.

mod direct;
mod docker;
mod path;
mod traits;

pub use direct::{DirectExecutor, DirectExecutorConfig, DirectHandle};
pub use docker::{ContainerExecutor, ContainerExecutorConfig, ContainerHandle};
pub use path::host_to_container_path;
pub use traits::WorkerExecutor;

#[cfg(test)]
mod tests;
