//! In-memory document tree
//!
//! A `DocumentTree` is an arena of element nodes with parent/child/sibling
//! relationships, ordered attributes and optional text content. The tree
//! owns every node exclusively; callers address nodes through [`NodeId`].
//!
//! ## Read-only flag
//!
//! While a tree is flagged read-only every mutating method fails with
//! [`Error::ReadOnlyViolation`]. `set_read_write` is the only way to allow
//! mutation again.
//!
//! ## Stable refs
//!
//! Each node may carry a stable identifier ("ref") unique within the tree.
//! Refs are generated lazily by [`DocumentTree::stable_ref`], or eagerly for
//! every node when the tree is in auto-ids mode. Generating a ref is metadata
//! only: it is allowed on frozen trees and does not count as a modification.
//!
//! ## Modification counter
//!
//! Every successful mutation bumps a counter. The cache layer compares it
//! against a baseline to decide whether a document needs to be written back.

use crate::error::{Error, Result};
use crate::types::{DocumentId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Prefix of generated refs
const REF_PREFIX: &str = "r";

#[derive(Debug, Clone)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    node_ref: Option<String>,
}

impl Node {
    fn new(name: String, parent: Option<NodeId>) -> Self {
        Node {
            name,
            attrs: Vec::new(),
            text: None,
            parent,
            children: Vec::new(),
            node_ref: None,
        }
    }
}

/// Serial form of a node and its subtree
///
/// This is the interchange structure used by the storage accessors
/// (JSON text for character storage, MessagePack for binary storage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialNode {
    /// Element name
    pub name: String,
    /// Stable ref, if one has been assigned
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<String>,
    /// Ordered attributes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Child elements in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SerialNode>,
}

impl SerialNode {
    /// Create a bare element
    pub fn new(name: impl Into<String>) -> Self {
        SerialNode {
            name: name.into(),
            node_ref: None,
            attrs: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Builder: add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Builder: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child
    pub fn with_child(mut self, child: SerialNode) -> Self {
        self.children.push(child);
        self
    }

    /// Value of an attribute on this node
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An in-memory document tree
#[derive(Debug)]
pub struct DocumentTree {
    id: DocumentId,
    nodes: Vec<Option<Node>>,
    root: NodeId,
    read_only: bool,
    auto_ids: bool,
    modifications: u64,
    next_ref: u64,
    refs: HashMap<String, NodeId>,
}

impl DocumentTree {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create a tree holding only an empty root element
    ///
    /// New trees are read-write.
    pub fn create_empty(root_name: impl Into<String>) -> Self {
        DocumentTree {
            id: DocumentId::new(),
            nodes: vec![Some(Node::new(root_name.into(), None))],
            root: NodeId(0),
            read_only: false,
            auto_ids: false,
            modifications: 0,
            next_ref: 1,
            refs: HashMap::new(),
        }
    }

    /// Parse a tree from its serialised (JSON) form
    ///
    /// Refs present in the serialised form are kept.
    pub fn parse_from(serialised: &str) -> Result<Self> {
        let serial: SerialNode = serde_json::from_str(serialised)?;
        Self::from_serial(&serial)
    }

    /// Build a tree from a serial node structure
    ///
    /// # Errors
    /// Returns `Serialization` if two nodes carry the same ref.
    pub fn from_serial(serial: &SerialNode) -> Result<Self> {
        let mut tree = DocumentTree::create_empty(serial.name.clone());
        let root = tree.root;
        tree.load_serial_into(root, serial)?;
        tree.modifications = 0;
        Ok(tree)
    }

    fn load_serial_into(&mut self, target: NodeId, serial: &SerialNode) -> Result<()> {
        {
            let node = self.node_mut(target)?;
            node.attrs = serial.attrs.clone();
            node.text = serial.text.clone();
        }
        if let Some(r) = &serial.node_ref {
            if self.refs.contains_key(r) {
                return Err(Error::Serialization(format!(
                    "duplicate node ref '{}' in serialised document",
                    r
                )));
            }
            self.assign_ref(target, r.clone());
        }
        for child in &serial.children {
            let child_id = self.push_node(child.name.clone(), Some(target));
            self.node_mut(target)?.children.push(child_id);
            self.load_serial_into(child_id, child)?;
        }
        Ok(())
    }

    /// Copy this tree into a new tree instance with a fresh [`DocumentId`]
    ///
    /// Refs, flags and content are carried over; the modification counter
    /// starts from zero.
    pub fn fork(&self) -> Self {
        DocumentTree {
            id: DocumentId::new(),
            nodes: self.nodes.clone(),
            root: self.root,
            read_only: self.read_only,
            auto_ids: self.auto_ids,
            modifications: 0,
            next_ref: self.next_ref,
            refs: self.refs.clone(),
        }
    }

    /// Serial form of the whole tree
    pub fn to_serial(&self) -> SerialNode {
        self.serial_of(self.root)
    }

    fn serial_of(&self, id: NodeId) -> SerialNode {
        match self.nodes.get(id.0).and_then(Option::as_ref) {
            Some(node) => SerialNode {
                name: node.name.clone(),
                node_ref: node.node_ref.clone(),
                attrs: node.attrs.clone(),
                text: node.text.clone(),
                children: node.children.iter().map(|c| self.serial_of(*c)).collect(),
            },
            None => SerialNode::new(""),
        }
    }

    /// Serialise the tree to its JSON form
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_serial())?)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Identity of this tree instance
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Root element
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether mutation is currently forbidden
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether refs are assigned eagerly
    pub fn auto_ids(&self) -> bool {
        self.auto_ids
    }

    /// Freeze the tree as of this instant
    pub fn set_read_only(&mut self) {
        self.read_only = true;
    }

    /// Allow mutation
    ///
    /// With `auto_assign_ids`, every existing node without a ref gets one now
    /// and every node created afterwards gets one on creation.
    pub fn set_read_write(&mut self, auto_assign_ids: bool) {
        self.read_only = false;
        self.auto_ids = auto_assign_ids;
        if auto_assign_ids {
            let ids: Vec<NodeId> = self.live_ids().collect();
            for id in ids {
                if self.nodes[id.0].as_ref().map_or(false, |n| n.node_ref.is_none()) {
                    let r = self.generate_ref();
                    self.assign_ref(id, r);
                }
            }
        }
    }

    /// Number of successful mutations since this tree instance was created
    pub fn modification_count(&self) -> u64 {
        self.modifications
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::NodeNotFound {
                document: self.id.to_string(),
                node: id.to_string(),
            })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let document = self.id;
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::NodeNotFound {
                document: document.to_string(),
                node: id.to_string(),
            })
    }

    fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i))
    }

    /// Whether `id` names a live node of this tree
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    /// Whether `id` is live and still reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            match self.nodes.get(current.0).and_then(Option::as_ref) {
                None => return false,
                Some(node) => match node.parent {
                    None => return current == self.root,
                    Some(p) => current = p,
                },
            }
        }
    }

    /// Element name
    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(&self.node(id)?.name)
    }

    /// Parent element, `None` for the root
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Child elements in document order
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    /// Child elements with the given name, in document order
    pub fn child_elements(&self, id: NodeId, name: &str) -> Result<Vec<NodeId>> {
        let node = self.node(id)?;
        Ok(node
            .children
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].as_ref().map_or(false, |n| n.name == name))
            .collect())
    }

    fn sibling(&self, id: NodeId, offset: isize) -> Result<Option<NodeId>> {
        let parent = match self.node(id)?.parent {
            Some(p) => p,
            None => return Ok(None),
        };
        let siblings = &self.node(parent)?.children;
        let pos = siblings.iter().position(|c| *c == id);
        Ok(pos
            .and_then(|p| p.checked_add_signed(offset))
            .and_then(|p| siblings.get(p).copied()))
    }

    /// Following sibling element
    pub fn next_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.sibling(id, 1)
    }

    /// Preceding sibling element
    pub fn previous_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.sibling(id, -1)
    }

    /// Attribute value
    pub fn attr(&self, id: NodeId, name: &str) -> Result<Option<&str>> {
        Ok(self
            .node(id)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str()))
    }

    /// All attributes in order
    pub fn attrs(&self, id: NodeId) -> Result<&[(String, String)]> {
        Ok(&self.node(id)?.attrs)
    }

    /// Text content
    pub fn text(&self, id: NodeId) -> Result<Option<&str>> {
        Ok(self.node(id)?.text.as_deref())
    }

    /// Descendants of `id` in document order (excluding `id` itself)
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id)?.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next)?.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Absolute path of a node, e.g. `/ROOT/ITEM[2]/NAME`
    ///
    /// A position predicate is emitted only where same-named siblings exist.
    pub fn absolute_path(&self, id: NodeId) -> Result<String> {
        let mut steps = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            match node.parent {
                None => {
                    steps.push(node.name.clone());
                    break;
                }
                Some(parent) => {
                    let same = self.child_elements(parent, &node.name)?;
                    if same.len() > 1 {
                        let pos = same.iter().position(|c| *c == current).unwrap_or(0) + 1;
                        steps.push(format!("{}[{}]", node.name, pos));
                    } else {
                        steps.push(node.name.clone());
                    }
                    current = parent;
                }
            }
        }
        steps.reverse();
        Ok(format!("/{}", steps.join("/")))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    fn check_writable(&self, operation: &'static str) -> Result<()> {
        if self.read_only {
            return Err(Error::read_only(self.id.to_string(), operation));
        }
        Ok(())
    }

    fn push_node(&mut self, name: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new(name, parent)));
        if self.auto_ids {
            let r = self.generate_ref();
            self.assign_ref(id, r);
        }
        id
    }

    /// Append a new child element to `parent`
    pub fn append_child(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId> {
        self.check_writable("append_child")?;
        self.node(parent)?;
        let id = self.push_node(name.into(), Some(parent));
        self.node_mut(parent)?.children.push(id);
        self.modifications += 1;
        Ok(id)
    }

    /// Insert a new element immediately before `reference`
    pub fn insert_before(&mut self, reference: NodeId, name: impl Into<String>) -> Result<NodeId> {
        self.check_writable("insert_before")?;
        let parent = self.node(reference)?.parent.ok_or_else(|| {
            Error::invalid_state("cannot insert a sibling before the root element")
        })?;
        let id = self.push_node(name.into(), Some(parent));
        let siblings = &mut self.node_mut(parent)?.children;
        let pos = siblings.iter().position(|c| *c == reference).unwrap_or(0);
        siblings.insert(pos, id);
        self.modifications += 1;
        Ok(id)
    }

    /// Remove a node and its subtree
    ///
    /// # Errors
    /// `InvalidState` when asked to remove the root.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.check_writable("remove")?;
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| Error::invalid_state("cannot remove the root element"))?;
        let mut doomed = self.descendants(id)?;
        doomed.push(id);
        self.node_mut(parent)?.children.retain(|c| *c != id);
        for d in doomed {
            if let Some(node) = self.nodes[d.0].take() {
                if let Some(r) = node.node_ref {
                    self.refs.remove(&r);
                }
            }
        }
        self.modifications += 1;
        Ok(())
    }

    /// Set (or overwrite) an attribute
    pub fn set_attr(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.check_writable("set_attr")?;
        let (name, value) = (name.into(), value.into());
        let node = self.node_mut(id)?;
        match node.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => node.attrs.push((name, value)),
        }
        self.modifications += 1;
        Ok(())
    }

    /// Remove an attribute, returning its previous value
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<Option<String>> {
        self.check_writable("remove_attr")?;
        let node = self.node_mut(id)?;
        let removed = node
            .attrs
            .iter()
            .position(|(k, _)| k == name)
            .map(|pos| node.attrs.remove(pos).1);
        if removed.is_some() {
            self.modifications += 1;
        }
        Ok(removed)
    }

    /// Replace text content
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<()> {
        self.check_writable("set_text")?;
        self.node_mut(id)?.text = Some(text.into());
        self.modifications += 1;
        Ok(())
    }

    /// Rename an element
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        self.check_writable("rename")?;
        self.node_mut(id)?.name = name.into();
        self.modifications += 1;
        Ok(())
    }

    // =========================================================================
    // Stable refs
    // =========================================================================

    fn generate_ref(&mut self) -> String {
        loop {
            let candidate = format!("{}{}", REF_PREFIX, self.next_ref);
            self.next_ref += 1;
            if !self.refs.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn assign_ref(&mut self, id: NodeId, r: String) {
        if let Some(n) = r
            .strip_prefix(REF_PREFIX)
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.next_ref = self.next_ref.max(n + 1);
        }
        if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::as_mut) {
            if let Some(old) = node.node_ref.replace(r.clone()) {
                self.refs.remove(&old);
            }
            self.refs.insert(r, id);
        }
    }

    /// Ref of a node, generating one if it has none yet
    pub fn stable_ref(&mut self, id: NodeId) -> Result<String> {
        if let Some(r) = &self.node(id)?.node_ref {
            return Ok(r.clone());
        }
        let r = self.generate_ref();
        self.assign_ref(id, r.clone());
        Ok(r)
    }

    /// Ref of a node, without generating one
    pub fn ref_of(&self, id: NodeId) -> Result<Option<&str>> {
        Ok(self.node(id)?.node_ref.as_deref())
    }

    /// Node carrying the given ref
    pub fn find_by_ref(&self, node_ref: &str) -> Option<NodeId> {
        self.refs.get(node_ref).copied()
    }

    // =========================================================================
    // Preserving replace
    // =========================================================================

    /// Replace this tree's contents with a copy of `source`, keeping refs
    ///
    /// Every node of this tree that structurally corresponds to a source node
    /// keeps its ref on the copied node. Correspondence: the roots correspond
    /// when their names are equal; below corresponding parents, the k-th child
    /// named `N` on one side corresponds to the k-th child named `N` on the
    /// other. Unmatched source nodes keep their own ref unless it collides
    /// with a retained one, in which case a fresh ref is generated.
    ///
    /// The tree keeps its [`DocumentId`]; all previously issued [`NodeId`]s
    /// become invalid, refs are the durable way to address nodes across this
    /// operation.
    pub fn replace_contents_preserving_ids(&mut self, source: &DocumentTree) -> Result<()> {
        self.check_writable("replace_contents_preserving_ids")?;

        let mut retained: HashMap<NodeId, String> = HashMap::new();
        if self.node(self.root)?.name == source.node(source.root)?.name {
            self.match_refs(self.root, source, source.root, &mut retained)?;
        }
        let reserved: HashSet<String> = retained.values().cloned().collect();

        self.nodes.clear();
        self.refs.clear();
        self.next_ref = self.next_ref.max(source.next_ref);
        let root_name = source.node(source.root)?.name.clone();
        self.nodes.push(Some(Node::new(root_name, None)));
        self.root = NodeId(0);
        self.copy_from(self.root, source, source.root, &retained, &reserved)?;
        self.modifications += 1;
        Ok(())
    }

    fn match_refs(
        &self,
        dest: NodeId,
        source: &DocumentTree,
        src: NodeId,
        out: &mut HashMap<NodeId, String>,
    ) -> Result<()> {
        if let Some(r) = &self.node(dest)?.node_ref {
            out.insert(src, r.clone());
        }
        let mut dest_by_name: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for child in &self.node(dest)?.children {
            dest_by_name
                .entry(self.node(*child)?.name.as_str())
                .or_default()
                .push(*child);
        }
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for child in &source.node(src)?.children {
            let name = source.node(*child)?.name.as_str();
            let k = seen.entry(name).or_insert(0);
            if let Some(d) = dest_by_name.get(name).and_then(|v| v.get(*k)) {
                self.match_refs(*d, source, *child, out)?;
            }
            *k += 1;
        }
        Ok(())
    }

    fn copy_from(
        &mut self,
        target: NodeId,
        source: &DocumentTree,
        src: NodeId,
        retained: &HashMap<NodeId, String>,
        reserved: &HashSet<String>,
    ) -> Result<()> {
        let src_node = source.node(src)?;
        {
            let node = self.node_mut(target)?;
            node.attrs = src_node.attrs.clone();
            node.text = src_node.text.clone();
        }
        let chosen = match (retained.get(&src), &src_node.node_ref) {
            (Some(r), _) => Some(r.clone()),
            (None, Some(r)) if !reserved.contains(r) && !self.refs.contains_key(r) => {
                Some(r.clone())
            }
            (None, Some(_)) => Some(self.fresh_ref_avoiding(reserved)),
            (None, None) if self.auto_ids => Some(self.fresh_ref_avoiding(reserved)),
            (None, None) => None,
        };
        if let Some(r) = chosen {
            self.assign_ref(target, r);
        }
        for child in &src_node.children {
            let name = source.node(*child)?.name.clone();
            let id = NodeId(self.nodes.len());
            self.nodes.push(Some(Node::new(name, Some(target))));
            self.node_mut(target)?.children.push(id);
            self.copy_from(id, source, *child, retained, reserved)?;
        }
        Ok(())
    }

    fn fresh_ref_avoiding(&mut self, reserved: &HashSet<String>) -> String {
        loop {
            let r = self.generate_ref();
            if !reserved.contains(&r) {
                return r;
            }
        }
    }
}
