use std::future::Future;
use std::pin::Pin;

use orc_core::Job;

/// The outcome of successfully processing a job: a structured descriptor of
/// the produced artifact, written to `results_cache` by the caller once the
/// job completes. The artifact itself lives on the filesystem; this is only
/// the cache-worthy metadata about it.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Structured descriptor of the produced artifact.
    pub result_metadata: serde_json::Value,
}

/// A processor-reported failure, converted by the runtime into a terminal
/// `failed` job record (or a retry, if attempts remain).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ProcessorError(pub String);

impl ProcessorError {
    /// Build a processor error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The sole extension point the worker runtime exposes. The runtime forwards
/// the whole claimed job row and never parses or validates `payload`
/// contents itself — that is entirely the processor's concern.
///
/// Defined with a boxed-future method rather than a native `async fn` so
/// runtimes can hold a processor behind `Arc<dyn Processor>` and swap
/// implementations (notebook / plantuml / drawio) without this crate
/// knowing about any of them.
pub trait Processor: Send + Sync + 'static {
    /// Process one claimed job, producing a cache-worthy result or a
    /// terminal error. Must not panic on ordinary processing failures —
    /// return `Err` instead, so the runtime can record `status=failed`
    /// without the worker process crashing.
    fn process(
        &self,
        job: &Job,
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, ProcessorError>> + Send + '_>>;
}

/// A trivial processor usable for tests and demos: always succeeds,
/// echoing the job's `content_hash` back as the result metadata. Built-in
/// processors for `notebook`, `plantuml`, `drawio` are out of scope for the
/// core (section 1); real worker binaries implement [`Processor`] against
/// their own business logic.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProcessor;

impl Processor for EchoProcessor {
    fn process(
        &self,
        job: &Job,
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, ProcessorError>> + Send + '_>> {
        let hash = job.content_hash.clone();
        Box::pin(async move {
            Ok(JobOutcome {
                result_metadata: serde_json::json!({ "echoed_content_hash": hash }),
            })
        })
    }
}
