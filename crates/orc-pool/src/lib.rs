#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! The pool manager: supervises a fixed per-type fleet of workers, detects
//! stale heartbeats, reaps dead workers, resets their in-flight jobs to
//! pending, and restarts replacements.

mod manager;

pub use manager::{PoolEvent, PoolManager};

#[cfg(test)]
mod tests;
