//! WorkDoc - document context and cache runtime
//!
//! WorkDoc binds labelled documents into a request context, caches
//! persisted documents across requests with change-version reloads and row
//! locks, and runs command scripts with try / catch / finally semantics.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use workdoc::{
//!     shared, CacheManager, CommandList, AssignCommand, ManagedDocumentProvider,
//!     MemoryStore, Request, RequestContext, RowKey,
//! };
//!
//! let store = MemoryStore::new();
//! // Reads ./workdoc.toml, writing the defaults first if it is missing
//! let manager = Arc::new(CacheManager::open_dir(std::path::Path::new("."))?);
//! let conn = shared(store.connect());
//!
//! let location = manager.location(RowKey::new("DOCS", "orders"), "ORDERS");
//! let mut ctx = RequestContext::new().with_connection(conn.clone());
//! ctx.table_mut().register_provider(
//!     "orders",
//!     Arc::new(ManagedDocumentProvider::new(manager.clone(), location, conn)),
//! );
//!
//! let commands = CommandList::new().with(AssignCommand::new(":{orders}/STATUS", "open"));
//! Request::new(ctx).execute(&commands)?;
//! ```
//!
//! # Architecture
//!
//! - [`core`]: document trees, path queries, node handles, errors
//! - [`storage`]: storage locations, store connections, LOB accessors
//! - [`context`]: the context binding table and document providers
//! - [`engine`]: managed documents, the cache manager, configuration
//! - [`executor`]: commands, the runner, the markup parser, requests

pub use workdoc_context as context;
pub use workdoc_core as core;
pub use workdoc_engine as engine;
pub use workdoc_executor as executor;
pub use workdoc_storage as storage;

pub use workdoc_context::{ContextTable, DocumentProvider, PathContext};
pub use workdoc_core::{DocumentTree, Error, NodeRef, Result, SerialNode, TreeRef};
pub use workdoc_engine::{
    CacheManager, DocumentState, ManagedDocument, ManagedDocumentProvider, OpenDocument,
    WorkDocConfig,
};
pub use workdoc_executor::*;
pub use workdoc_storage::{
    shared, LockWait, MemoryStore, RowKey, SharedConnection, StorageKind, StorageLocation,
    StoreConnection,
};
