//! Shared tree handles
//!
//! Trees are shared as [`TreeRef`] (`Arc<RwLock<DocumentTree>>`). The cache
//! layer never mutates a tree it has handed out into a *different* document:
//! on reload it swaps in a brand-new `TreeRef`, so anyone still holding the
//! previous one keeps a consistent, frozen snapshot.
//!
//! ## The Contract
//!
//! - [`NodeRef`] = tree handle + node id. It keeps its tree alive and always
//!   reads the snapshot it was issued from.
//! - [`NodeHandle`] = document id + node id, with no ownership. Long-lived
//!   callers store these and re-resolve against the current tree, getting
//!   [`Error::StaleNode`] if the tree has been replaced since.

use crate::error::{Error, Result};
use crate::tree::DocumentTree;
use crate::types::{DocumentId, NodeId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Shared, lockable document tree
pub type TreeRef = Arc<RwLock<DocumentTree>>;

/// Wrap a tree for sharing
pub fn share(tree: DocumentTree) -> TreeRef {
    Arc::new(RwLock::new(tree))
}

/// A node together with the tree snapshot that owns it
#[derive(Clone)]
pub struct NodeRef {
    tree: TreeRef,
    node: NodeId,
    document: DocumentId,
}

impl NodeRef {
    /// Reference `node` inside `tree`
    pub fn new(tree: TreeRef, node: NodeId) -> Self {
        let document = tree.read().id();
        NodeRef {
            tree,
            node,
            document,
        }
    }

    /// Reference the root of `tree`
    pub fn root_of(tree: TreeRef) -> Self {
        let (document, node) = {
            let guard = tree.read();
            (guard.id(), guard.root())
        };
        NodeRef {
            tree,
            node,
            document,
        }
    }

    /// Owning tree
    #[inline]
    pub fn tree(&self) -> &TreeRef {
        &self.tree
    }

    /// Node id within the tree
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Identity of the owning tree instance
    #[inline]
    pub fn document_id(&self) -> DocumentId {
        self.document
    }

    /// Detach into an ownership-free handle
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            document: self.document,
            node: self.node,
        }
    }

    /// Whether both refs point into the same tree instance
    pub fn same_document(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree)
    }

    /// Whether the node is still live and reachable from its root
    pub fn is_attached(&self) -> bool {
        self.tree.read().is_attached(self.node)
    }

    /// Element name
    pub fn name(&self) -> Result<String> {
        Ok(self.tree.read().name(self.node)?.to_string())
    }

    /// Text content
    pub fn text(&self) -> Result<Option<String>> {
        Ok(self.tree.read().text(self.node)?.map(str::to_string))
    }

    /// Attribute value
    pub fn attr(&self, name: &str) -> Result<Option<String>> {
        Ok(self.tree.read().attr(self.node, name)?.map(str::to_string))
    }

    /// Stable ref of the node (generated on first request)
    pub fn stable_ref(&self) -> Result<String> {
        self.tree.write().stable_ref(self.node)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_document(other) && self.node == other.node
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("document", &self.document)
            .field("node", &self.node)
            .finish()
    }
}

/// Generation-tagged node address without tree ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    /// Tree instance the handle was issued from
    pub document: DocumentId,
    /// Node within that tree
    pub node: NodeId,
}

impl NodeHandle {
    /// Re-attach to `current`, failing if it is a different tree instance
    pub fn resolve(&self, current: &TreeRef) -> Result<NodeRef> {
        let actual = current.read().id();
        if actual != self.document {
            return Err(Error::StaleNode {
                expected: self.document.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(NodeRef {
            tree: Arc::clone(current),
            node: self.node,
            document: actual,
        })
    }
}
