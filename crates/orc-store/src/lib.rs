#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! The durable store: an embedded SQLite database providing atomic job
//! claim, worker registration/heartbeat, and content-addressed caching.
//!
//! See [`Store::claim_next_job`] for the central algorithm this crate exists
//! to get right: a single write statement that selects and transitions one
//! pending row, so concurrent claimers of the same job type never collide.

mod rows;
mod schema;
mod store;

pub use store::Store;
