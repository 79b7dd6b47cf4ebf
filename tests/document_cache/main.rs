//! Document Cache Tests
//!
//! Managed documents seen through whole requests:
//! - change-version reloads and frozen snapshots
//! - row lock contention between runtimes
//! - read-only documents and write-back rules

#[path = "../common/mod.rs"]
mod common;

mod locking;
mod read_only;
mod reload;
