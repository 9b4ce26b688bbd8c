#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! The worker runtime: the polling loop every worker executable runs.
//!
//! Thin by design: it owns registration, heartbeating, adaptive polling,
//! orphan detection, and graceful/forced shutdown. Worker-specific business
//! logic (notebook execution, diagram rendering) plugs in through the
//! [`Processor`] trait; this crate never inspects job payloads.

mod orphan;
mod processor;
mod runtime;

pub use processor::{EchoProcessor, JobOutcome, Processor, ProcessorError};
pub use runtime::WorkerRuntime;

#[cfg(test)]
mod tests;
