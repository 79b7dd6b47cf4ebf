//! Core types for WorkDoc
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: Error type hierarchy shared by every layer
//! - DocumentId / NodeId: Tree instance identity and arena node ids
//! - DocumentTree: In-memory element tree with a read-only toggle and stable refs
//! - NodePath / PathEvaluator: Path query grammar and the default evaluator
//! - TreeRef / NodeRef / NodeHandle: Shared snapshots and generation-tagged handles

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handle;
pub mod path;
pub mod tree;
pub mod types;

pub use error::{Error, Result};
pub use handle::{share, NodeHandle, NodeRef, TreeRef};
pub use path::{
    split_context_label, DefaultPathEvaluator, NodePath, NodeTest, PathEvaluator,
    PathParseError, Predicate, Step,
};
pub use tree::{DocumentTree, SerialNode};
pub use types::{DocumentId, NodeId};
