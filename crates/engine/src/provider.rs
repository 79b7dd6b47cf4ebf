//! Cache-backed document provider
//!
//! Binds a managed document into a context table: the first reference to
//! the label opens the document in the request's transaction, `close`
//! writes it back and `abort` discards it.

use crate::manager::CacheManager;
use crate::managed::{ManagedDocument, OpenDocument};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use workdoc_context::DocumentProvider;
use workdoc_core::{Result, TreeRef};
use workdoc_storage::{SharedConnection, StorageLocation};

/// Provider opening a managed document on load
pub struct ManagedDocumentProvider {
    manager: Arc<CacheManager>,
    location: StorageLocation,
    auto_ids: bool,
    connection: SharedConnection,
    opened: Mutex<Option<Arc<ManagedDocument>>>,
    session: Mutex<Option<OpenDocument>>,
}

impl ManagedDocumentProvider {
    /// Provider for `location`, opening it through `connection`
    pub fn new(
        manager: Arc<CacheManager>,
        location: StorageLocation,
        connection: SharedConnection,
    ) -> Self {
        let auto_ids = manager.config().auto_ids;
        ManagedDocumentProvider {
            manager,
            location,
            auto_ids,
            connection,
            opened: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Entry opened by the last load, if any
    pub fn document(&self) -> Option<Arc<ManagedDocument>> {
        self.opened.lock().clone()
    }

    /// Whether this provider's transaction mutated its document
    pub fn is_modified(&self) -> bool {
        self.session.lock().as_ref().map_or(false, OpenDocument::is_modified)
    }
}

impl DocumentProvider for ManagedDocumentProvider {
    fn load(&self, label: &str) -> Result<TreeRef> {
        let doc = self.manager.get_or_create(&self.location, self.auto_ids);
        let open = {
            let mut conn = self.connection.lock();
            doc.open(&mut **conn)?
        };
        debug!(target: "workdoc::cache", label, key = %doc.cache_key(), "managed document opened for label");
        let tree = Arc::clone(open.tree());
        *self.session.lock() = Some(open);
        *self.opened.lock() = Some(doc);
        Ok(tree)
    }

    fn close(&self) -> Result<()> {
        let Some(doc) = self.opened.lock().clone() else {
            return Ok(());
        };
        if let Some(open) = self.session.lock().take() {
            let mut conn = self.connection.lock();
            doc.close(open, &mut **conn)?;
        }
        self.opened.lock().take();
        Ok(())
    }

    fn abort(&self) -> Result<()> {
        self.session.lock().take();
        if let Some(doc) = self.opened.lock().take() {
            doc.abort();
        }
        Ok(())
    }
}
