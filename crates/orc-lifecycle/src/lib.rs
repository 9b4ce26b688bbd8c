#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Composes the pool manager and backend for one build, under one of two
//! reuse policies.

mod manager;

pub use manager::{LifecycleManager, LifecyclePolicy};

#[cfg(test)]
mod tests;
