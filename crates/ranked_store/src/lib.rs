//! Typed client for the ranked vote store.
//!
//! Wraps Redis sorted sets (vote tallies, read back as ranked ranges) and
//! hashes (per-session standing answers). All tally mutations go through
//! atomic `ZINCRBY`, so concurrent writers never lose increments.

pub mod client;
pub mod error;

pub use client::RankedStore;
pub use error::{Result, StoreError};
