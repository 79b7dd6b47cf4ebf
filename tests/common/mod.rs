//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::{Arc, Once};
pub use workdoc::{
    shared, CacheManager, CommandList, CommandParser, ControlFlow, DocumentTree, Error,
    ManagedDocument, ManagedDocumentProvider, MemoryStore, Request, RequestContext, RowKey,
    SerialNode, SharedConnection, StorageKind, StorageLocation, WorkDocConfig,
};
use workdoc::storage::LobValue;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Store fixtures
// ============================================================================

/// Table used by every fixture row
pub const DOC_TABLE: &str = "DOCS";

/// Row key in the fixture table
pub fn row(key: &str) -> RowKey {
    RowKey::new(DOC_TABLE, key)
}

/// Writable character location rooted at `root_name`
pub fn location(key: &str, root_name: &str) -> StorageLocation {
    StorageLocation::new(row(key), root_name)
}

/// Seed `store` with a committed JSON document
pub fn seed(store: &MemoryStore, key: &str, doc: &SerialNode) {
    let tree = DocumentTree::from_serial(doc).expect("fixture document");
    let json = tree.to_json_string().expect("fixture serialises");
    store.put_committed(row(key), LobValue::Character(json));
}

/// Committed document at `key`, parsed back into a tree
pub fn committed_tree(store: &MemoryStore, key: &str) -> Option<DocumentTree> {
    match store.committed(&row(key))? {
        LobValue::Character(text) => DocumentTree::parse_from(&text).ok(),
        LobValue::Binary(_) => None,
    }
}

/// `<ORDERS><ORDER code="A"/><ORDER code="B"/></ORDERS>`
pub fn orders_doc() -> SerialNode {
    SerialNode::new("ORDERS")
        .with_child(SerialNode::new("ORDER").with_attr("code", "A"))
        .with_child(SerialNode::new("ORDER").with_attr("code", "B"))
}

// ============================================================================
// Request fixtures
// ============================================================================

/// Everything one request against a memory store needs
///
/// Clones share both the store and the cache manager.
#[derive(Clone)]
pub struct Harness {
    pub store: MemoryStore,
    pub manager: Arc<CacheManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(WorkDocConfig::default())
    }

    /// Harness whose cache manager uses `config`
    pub fn with_config(config: WorkDocConfig) -> Self {
        init_tracing();
        Harness {
            store: MemoryStore::new(),
            manager: Arc::new(CacheManager::new(config).expect("valid config")),
        }
    }

    /// Another runtime sharing this harness's store but not its cache
    pub fn sibling(&self) -> Self {
        Harness {
            store: self.store.clone(),
            manager: Arc::new(CacheManager::new(self.manager.config().clone()).expect("valid config")),
        }
    }

    /// A request with its own connection and `label` bound to the row `key`
    pub fn request(&self, label: &str, key: &str, root_name: &str) -> (Request, SharedConnection) {
        self.request_at(label, location(key, root_name))
    }

    /// A request with its own connection and `label` bound to `location`
    pub fn request_at(&self, label: &str, location: StorageLocation) -> (Request, SharedConnection) {
        let conn = shared(self.store.connect());
        let mut ctx = RequestContext::new().with_connection(conn.clone());
        ctx.bind_root(workdoc::core::share(DocumentTree::create_empty("ROOT")));
        let provider =
            ManagedDocumentProvider::new(Arc::clone(&self.manager), location, conn.clone());
        ctx.table_mut().register_provider(label, Arc::new(provider));
        (Request::new(ctx), conn)
    }
}

/// Parse a command script from its serial markup
pub fn script(markup: SerialNode) -> CommandList {
    let tree = DocumentTree::from_serial(&markup).expect("script markup");
    CommandParser::with_builtins()
        .parse_document(&tree)
        .expect("script parses")
}
