//! Document providers
//!
//! A provider supplies the tree behind a document label the first time the
//! label is referenced, and takes part in the request lifecycle through
//! `close` (success) and `abort` (failure).

use workdoc_core::{share, DocumentTree, Result, TreeRef};

/// Source of a document label's tree
pub trait DocumentProvider: Send + Sync {
    /// Load the tree for `label`
    fn load(&self, label: &str) -> Result<TreeRef>;

    /// Persist and release the document at the end of a successful request
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Discard the document after a failed request
    fn abort(&self) -> Result<()> {
        Ok(())
    }
}

/// Provider of a fresh, empty, writable document
#[derive(Debug, Clone)]
pub struct EmptyDocumentProvider {
    root_name: String,
}

impl EmptyDocumentProvider {
    /// Documents get a root element named `root_name`
    pub fn new(root_name: impl Into<String>) -> Self {
        EmptyDocumentProvider {
            root_name: root_name.into(),
        }
    }
}

impl DocumentProvider for EmptyDocumentProvider {
    fn load(&self, _label: &str) -> Result<TreeRef> {
        Ok(share(DocumentTree::create_empty(self.root_name.clone())))
    }
}

/// Provider handing out one pre-built tree
#[derive(Debug, Clone)]
pub struct StaticDocumentProvider {
    tree: TreeRef,
}

impl StaticDocumentProvider {
    /// Serve `tree` on every load
    pub fn new(tree: TreeRef) -> Self {
        StaticDocumentProvider { tree }
    }
}

impl DocumentProvider for StaticDocumentProvider {
    fn load(&self, _label: &str) -> Result<TreeRef> {
        Ok(std::sync::Arc::clone(&self.tree))
    }
}
