//! Control Flow Tests
//!
//! try / catch / finally, break and call-stack transformations run as
//! parsed scripts inside full requests.

#[path = "../common/mod.rs"]
mod common;

mod parsing;
mod try_catch;
