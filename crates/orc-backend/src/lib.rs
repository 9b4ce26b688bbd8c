#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! The caller-facing backend: submits operations (with cache short-circuit)
//! and blocks until every submitted job reaches a terminal state.

mod backend;

pub use backend::{Backend, BackendEvent, Operation};

#[cfg(test)]
mod tests;
