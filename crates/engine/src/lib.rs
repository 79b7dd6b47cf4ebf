//! Document cache engine for WorkDoc
//!
//! - ManagedDocument: one cached document with change-version reload
//! - CacheManager: composite-key map of managed documents
//! - ManagedDocumentProvider: binds managed documents to context labels
//! - WorkDocConfig: `workdoc.toml` runtime configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod managed;
pub mod manager;
pub mod provider;

pub use config::{WorkDocConfig, CONFIG_FILE_NAME};
pub use managed::{DocumentState, ManagedDocument, OpenDocument};
pub use manager::CacheManager;
pub use provider::ManagedDocumentProvider;
