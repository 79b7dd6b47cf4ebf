//! Context binding for WorkDoc
//!
//! - ContextTable: label → node bindings, localisation scopes, path queries
//! - DocumentProvider: lazy loading and lifecycle of document labels
//! - labels: built-in document and contextual labels

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod labels;
pub mod provider;
pub mod table;

pub use provider::{DocumentProvider, EmptyDocumentProvider, StaticDocumentProvider};
pub use table::{ContextTable, PathContext};
