//! Context Binding Tests
//!
//! Labels, localisation and path queries driven through parsed scripts
//! against managed and static documents.

#[path = "../common/mod.rs"]
mod common;

mod labels;
mod providers;
