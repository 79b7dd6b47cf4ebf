//! Context binding table
//!
//! Maps labels to nodes so that script code can address several loaded
//! documents at once. Two kinds of label live in one namespace:
//!
//! - **Document labels** point at the root of a whole document. They are
//!   loaded on first reference through a registered [`DocumentProvider`] and
//!   cannot be removed.
//! - **Contextual labels** point at arbitrary nodes and are set and removed
//!   freely. `attach` is the default context of unqualified queries and is
//!   protected; `action` is an ordinary contextual label.
//!
//! ## Localisation
//!
//! `localise(tag)` pushes a scope that remembers the current label set;
//! `delocalise(tag)` pops it and removes every contextual label added since.
//! Rebinding or removing a label that existed before the push is not undone.
//! Document labels loaded while localised survive the pop.
//!
//! ## Queries
//!
//! Path queries may start with `:{label}` to pick their context; otherwise
//! they run against the caller's context (by default `attach`). Creating
//! queries synthesize missing nodes and are idempotent.

use crate::labels::{self, ATTACH};
use crate::provider::DocumentProvider;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use workdoc_core::{
    split_context_label, DefaultPathEvaluator, Error, NodeRef, PathEvaluator, Result, TreeRef,
};

/// Context a path query is evaluated against
#[derive(Debug, Clone, Copy)]
pub enum PathContext<'a> {
    /// The `attach` label
    Default,
    /// The node bound to a label
    Label(&'a str),
    /// An explicit node
    Node(&'a NodeRef),
}

#[derive(Debug, Clone)]
struct Binding {
    node: NodeRef,
    document_label: Option<String>,
}

#[derive(Debug)]
struct Scope {
    tag: String,
    labels: HashSet<String>,
}

/// Label-indexed table of node bindings
pub struct ContextTable {
    bindings: HashMap<String, Binding>,
    scopes: Vec<Scope>,
    providers: HashMap<String, Arc<dyn DocumentProvider>>,
    /// Document labels loaded through a provider, in load order
    loaded: Vec<String>,
    evaluator: Arc<dyn PathEvaluator>,
}

impl Default for ContextTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTable {
    /// Empty table using the default path evaluator
    pub fn new() -> Self {
        Self::with_evaluator(Arc::new(DefaultPathEvaluator))
    }

    /// Empty table using `evaluator` for path queries
    pub fn with_evaluator(evaluator: Arc<dyn PathEvaluator>) -> Self {
        ContextTable {
            bindings: HashMap::new(),
            scopes: Vec::new(),
            providers: HashMap::new(),
            loaded: Vec::new(),
            evaluator,
        }
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Register the provider of a document label
    ///
    /// The label becomes a document label: it is loaded on first reference
    /// and can no longer be set or removed as a contextual label.
    pub fn register_provider(&mut self, label: impl Into<String>, provider: Arc<dyn DocumentProvider>) {
        self.providers.insert(label.into(), provider);
    }

    /// Whether `label` names a document (built-in or registered)
    pub fn is_document_label(&self, label: &str) -> bool {
        labels::is_builtin_document_label(label)
            || self.providers.contains_key(label)
            || self
                .bindings
                .get(label)
                .map_or(false, |b| b.document_label.as_deref() == Some(label))
    }

    fn is_protected(&self, label: &str) -> bool {
        label == ATTACH || self.is_document_label(label)
    }

    /// Load a document label through its provider, if not already bound
    ///
    /// The provider is invoked at most once per label.
    pub fn load_document_label(&mut self, label: &str) -> Result<NodeRef> {
        if let Some(binding) = self.bindings.get(label) {
            return Ok(binding.node.clone());
        }
        let provider = self
            .providers
            .get(label)
            .cloned()
            .ok_or_else(|| Error::undefined_label(label))?;
        let tree = provider.load(label)?;
        let root = NodeRef::root_of(tree);
        debug!(target: "workdoc::context", label, document = %root.document_id(), "document label loaded");
        self.bindings.insert(
            label.to_string(),
            Binding {
                node: root.clone(),
                document_label: Some(label.to_string()),
            },
        );
        self.loaded.push(label.to_string());
        Ok(root)
    }

    /// Bind the root of `tree` as a document label without a provider
    pub fn bind_document(&mut self, label: &str, tree: TreeRef) -> NodeRef {
        let root = NodeRef::root_of(tree);
        self.bindings.insert(
            label.to_string(),
            Binding {
                node: root.clone(),
                document_label: Some(label.to_string()),
            },
        );
        root
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// Bind `label` to `node` without reserved-name checks
    ///
    /// When `document_label` is `None` it is inferred from the document
    /// labels bound to the node's tree.
    pub fn bind(&mut self, label: &str, node: NodeRef, document_label: Option<&str>) {
        let document_label = document_label
            .map(str::to_string)
            .or_else(|| self.document_label_of(&node));
        self.bindings.insert(
            label.to_string(),
            Binding {
                node,
                document_label,
            },
        );
    }

    /// Define a contextual label
    ///
    /// # Errors
    /// `ReservedLabel` if `label` names a document.
    pub fn set_label(&mut self, label: &str, node: NodeRef) -> Result<()> {
        if self.is_document_label(label) {
            return Err(Error::ReservedLabel {
                label: label.to_string(),
            });
        }
        self.bind(label, node, None);
        Ok(())
    }

    /// Node bound to `label`, loading a document label on first reference
    pub fn resolve(&mut self, label: &str) -> Result<NodeRef> {
        if let Some(binding) = self.bindings.get(label) {
            return Ok(binding.node.clone());
        }
        if self.providers.contains_key(label) {
            return self.load_document_label(label);
        }
        Err(Error::undefined_label(label))
    }

    /// Node bound to `label`, without loading anything
    pub fn get(&self, label: &str) -> Option<NodeRef> {
        self.bindings.get(label).map(|b| b.node.clone())
    }

    /// Remove a contextual label
    ///
    /// # Errors
    /// - `NotRemovable` for document labels and `attach`
    /// - `UndefinedLabel` if the label is not bound
    pub fn unbind(&mut self, label: &str) -> Result<()> {
        if self.is_protected(label) {
            return Err(Error::NotRemovable {
                label: label.to_string(),
            });
        }
        match self.bindings.remove(label) {
            Some(_) => Ok(()),
            None => Err(Error::undefined_label(label)),
        }
    }

    /// Whether `label` is bound or can be loaded
    pub fn exists(&self, label: &str) -> bool {
        self.bindings.contains_key(label) || self.providers.contains_key(label)
    }

    /// Whether `label` is currently bound
    pub fn is_label_loaded(&self, label: &str) -> bool {
        self.bindings.contains_key(label)
    }

    /// Bound document labels, sorted
    pub fn document_labels(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .bindings
            .iter()
            .filter(|(l, b)| b.document_label.as_deref() == Some(l.as_str()))
            .map(|(l, _)| l.clone())
            .collect();
        out.sort();
        out
    }

    /// Bound contextual labels, sorted
    pub fn contextual_labels(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .bindings
            .iter()
            .filter(|(l, b)| b.document_label.as_deref() != Some(l.as_str()))
            .map(|(l, _)| l.clone())
            .collect();
        out.sort();
        out
    }

    /// Remove every removable contextual label, returning how many went
    pub fn clear_contextual_labels(&mut self) -> usize {
        let doomed: Vec<String> = self
            .contextual_labels()
            .into_iter()
            .filter(|l| !self.is_protected(l))
            .collect();
        for label in &doomed {
            self.bindings.remove(label);
        }
        doomed.len()
    }

    /// Labels (of either kind) pointing into `document_label`'s document
    pub fn labels_in_document(&self, document_label: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.document_label.as_deref() == Some(document_label))
            .map(|(l, _)| l.clone())
            .collect();
        out.sort();
        out
    }

    /// Remove every removable label pointing into `document_label`'s document
    pub fn unbind_document(&mut self, document_label: &str) -> Vec<String> {
        let doomed: Vec<String> = self
            .labels_in_document(document_label)
            .into_iter()
            .filter(|l| !self.is_protected(l))
            .collect();
        for label in &doomed {
            self.bindings.remove(label);
        }
        debug!(target: "workdoc::context", document_label, removed = doomed.len(), "document labels unbound");
        doomed
    }

    /// Whether the node bound to `label` is still reachable from its root
    pub fn is_label_still_attached(&self, label: &str) -> Result<bool> {
        self.bindings
            .get(label)
            .map(|b| b.node.is_attached())
            .ok_or_else(|| Error::undefined_label(label))
    }

    fn document_label_of(&self, node: &NodeRef) -> Option<String> {
        let mut candidates: Vec<&String> = self
            .bindings
            .iter()
            .filter(|(l, b)| {
                b.document_label.as_deref() == Some(l.as_str()) && b.node.same_document(node)
            })
            .map(|(l, _)| l)
            .collect();
        candidates.sort();
        candidates.first().map(|l| l.to_string())
    }

    // =========================================================================
    // Localisation
    // =========================================================================

    /// Push a localisation scope
    pub fn localise(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        debug!(target: "workdoc::context", tag = %tag, depth = self.scopes.len() + 1, "localise");
        self.scopes.push(Scope {
            tag,
            labels: self.bindings.keys().cloned().collect(),
        });
    }

    /// Pop the localisation scope pushed with `tag`
    ///
    /// # Errors
    /// `ScopeMismatch` if the stack is empty or `tag` is not on top; the
    /// stack is left unchanged.
    pub fn delocalise(&mut self, tag: &str) -> Result<()> {
        match self.scopes.last() {
            Some(scope) if scope.tag == tag => {}
            other => {
                return Err(Error::ScopeMismatch {
                    requested: tag.to_string(),
                    current: other.map_or_else(|| "<none>".to_string(), |s| s.tag.clone()),
                })
            }
        }
        let Some(scope) = self.scopes.pop() else {
            return Ok(());
        };
        let added: Vec<String> = self
            .bindings
            .iter()
            .filter(|(l, b)| {
                !scope.labels.contains(l.as_str())
                    && b.document_label.as_deref() != Some(l.as_str())
            })
            .map(|(l, _)| l.clone())
            .collect();
        for label in &added {
            self.bindings.remove(label);
        }
        debug!(target: "workdoc::context", tag, removed = added.len(), "delocalise");
        Ok(())
    }

    /// Whether any localisation scope is active
    pub fn is_localised(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// Tag of the innermost localisation scope
    pub fn current_scope_tag(&self) -> Option<&str> {
        self.scopes.last().map(|s| s.tag.as_str())
    }

    // =========================================================================
    // Path queries
    // =========================================================================

    fn context_node(&mut self, context: PathContext<'_>) -> Result<NodeRef> {
        match context {
            PathContext::Default => self.resolve(ATTACH),
            PathContext::Label(label) => self.resolve(label),
            PathContext::Node(node) => Ok(node.clone()),
        }
    }

    /// All nodes matched by `query`, creating missing steps when `create`
    pub fn resolve_path(
        &mut self,
        query: &str,
        context: PathContext<'_>,
        create: bool,
    ) -> Result<Vec<NodeRef>> {
        let (label, rest) = split_context_label(query)?;
        let ctx = match label {
            Some(label) => self.resolve(label)?,
            None => self.context_node(context)?,
        };
        let tree = Arc::clone(ctx.tree());
        let ids = if create {
            let mut guard = tree.write();
            self.evaluator.select_or_create(&mut guard, ctx.node(), &rest)?
        } else {
            let guard = tree.read();
            self.evaluator.select(&guard, ctx.node(), &rest)?
        };
        Ok(ids
            .into_iter()
            .map(|id| NodeRef::new(Arc::clone(&tree), id))
            .collect())
    }

    /// Exactly one node
    ///
    /// # Errors
    /// `TooFew` when nothing matches, `TooMany` when several do.
    pub fn resolve_one(
        &mut self,
        query: &str,
        context: PathContext<'_>,
        create: bool,
    ) -> Result<NodeRef> {
        let mut nodes = self.resolve_path(query, context, create)?;
        match nodes.len() {
            0 => Err(Error::TooFew {
                path: query.to_string(),
            }),
            1 => Ok(nodes.remove(0)),
            count => Err(Error::TooMany {
                path: query.to_string(),
                count,
                expected: 1,
            }),
        }
    }

    /// Zero or one node
    pub fn resolve_optional(
        &mut self,
        query: &str,
        context: PathContext<'_>,
        create: bool,
    ) -> Result<Option<NodeRef>> {
        let mut nodes = self.resolve_path(query, context, create)?;
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(Some(nodes.remove(0))),
            count => Err(Error::TooMany {
                path: query.to_string(),
                count,
                expected: 1,
            }),
        }
    }

    /// Zero or more nodes
    pub fn resolve_all(
        &mut self,
        query: &str,
        context: PathContext<'_>,
        create: bool,
    ) -> Result<Vec<NodeRef>> {
        self.resolve_path(query, context, create)
    }

    /// Text of the first node matched by `query` (`""` when none)
    pub fn resolve_string(&mut self, query: &str, context: PathContext<'_>) -> Result<String> {
        let nodes = self.resolve_path(query, context, false)?;
        match nodes.first() {
            Some(node) => Ok(node.text()?.unwrap_or_default()),
            None => Ok(String::new()),
        }
    }

    /// Absolute path of the single node `query` addresses, creating it if needed
    pub fn absolute_path_of(&mut self, query: &str, context: PathContext<'_>) -> Result<String> {
        let node = self.resolve_one(query, context, true)?;
        let guard = node.tree().read();
        guard.absolute_path(node.node())
    }

    // =========================================================================
    // Refs
    // =========================================================================

    /// Node carrying `node_ref` in any document
    ///
    /// Loaded documents are searched first, then registered documents that
    /// have not been loaded yet (which loads them).
    pub fn find_by_ref_or_none(&mut self, node_ref: &str) -> Result<Option<NodeRef>> {
        let mut seen: Vec<TreeRef> = Vec::new();
        for label in self.document_labels() {
            if let Some(binding) = self.bindings.get(&label) {
                let tree = Arc::clone(binding.node.tree());
                if let Some(found) = search(&tree, node_ref) {
                    return Ok(Some(found));
                }
                seen.push(tree);
            }
        }
        let mut pending: Vec<String> = self
            .providers
            .keys()
            .filter(|l| !self.bindings.contains_key(l.as_str()))
            .cloned()
            .collect();
        pending.sort();
        for label in pending {
            let root = self.load_document_label(&label)?;
            if seen.iter().any(|t| Arc::ptr_eq(t, root.tree())) {
                continue;
            }
            if let Some(found) = search(root.tree(), node_ref) {
                return Ok(Some(found));
            }
            seen.push(Arc::clone(root.tree()));
        }
        Ok(None)
    }

    /// As [`ContextTable::find_by_ref_or_none`], failing when absent
    pub fn find_by_ref(&mut self, node_ref: &str) -> Result<NodeRef> {
        self.find_by_ref_or_none(node_ref)?
            .ok_or_else(|| Error::NodeNotFound {
                document: "<any>".to_string(),
                node: node_ref.to_string(),
            })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the providers of loaded document labels, in load order
    ///
    /// Stops at the first failure.
    pub fn close_providers(&mut self) -> Result<()> {
        for label in &self.loaded {
            if let Some(provider) = self.providers.get(label) {
                provider.close()?;
            }
        }
        Ok(())
    }

    /// Abort the providers of loaded document labels
    ///
    /// Failures are logged and suppressed so that every provider is aborted.
    pub fn abort_providers(&mut self) {
        for label in &self.loaded {
            if let Some(provider) = self.providers.get(label) {
                if let Err(e) = provider.abort() {
                    warn!(target: "workdoc::context", label = %label, error = %e, "provider abort failed");
                }
            }
        }
    }
}

fn search(tree: &TreeRef, node_ref: &str) -> Option<NodeRef> {
    let found = tree.read().find_by_ref(node_ref);
    found.map(|id| NodeRef::new(Arc::clone(tree), id))
}
