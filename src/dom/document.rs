//! XML Tree - Arena-based DOM representation
//!
//! A single arena holds any number of documents and standalone subtrees:
//! - Arena allocation for nodes, addressed by NodeId
//! - Removed nodes free their slot for reuse; ids carry the slot generation,
//!   so a stale id reads as dead instead of aliasing a newer node
//! - String interning for names
//! - Owning-document ids kept current on every attach and detach

use super::node::{NodeId, NodeKind, XmlAttribute, XmlNode};
use super::strings::StringPool;
use super::DocumentAccess;
use crate::error::TreeError;

/// Split a qualified name into (prefix, local name)
#[inline]
pub(crate) fn split_prefix(name: &str) -> Option<(&str, &str)> {
    let pos = memchr::memchr(b':', name.as_bytes())?;
    Some((&name[..pos], &name[pos + 1..]))
}

/// Arena slot; `generation` advances every time the slot is freed
#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<XmlNode>,
}

#[inline]
fn make_id(index: u32, generation: u32) -> NodeId {
    (u64::from(generation) << 32) | u64::from(index)
}

#[inline]
fn split_id(id: NodeId) -> (usize, u32) {
    ((id & 0xFFFF_FFFF) as usize, (id >> 32) as u32)
}

/// Arena owning every node of every document built in it
#[derive(Debug)]
pub struct XmlTree {
    slots: Vec<Slot>,
    /// Indices of freed slots, reused last-in first-out
    free: Vec<u32>,
    /// Interned names
    strings: StringPool,
    /// Number of nodes not yet removed
    live: usize,
}

impl Default for XmlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlTree {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        XmlTree {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            strings: StringPool::new(),
            live: 0,
        }
    }

    fn push(&mut self, node: XmlNode) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.node = Some(node);
                return make_id(index, slot.generation);
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        make_id(index, 0)
    }

    /// Free the slot of a node that is no longer linked anywhere
    ///
    /// A slot whose generation is exhausted is retired instead of reused.
    fn discard(&mut self, id: NodeId) {
        let (index, generation) = split_id(id);
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if slot.generation != generation || slot.node.take().is_none() {
            return;
        }
        self.live -= 1;
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(index as u32);
        }
    }

    /// Number of arena slots, live or free
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Create an empty document
    pub fn new_document(&mut self, version: &str) -> NodeId {
        let id = self.push(XmlNode::document_node(version));
        if let Some(node) = self.get_node_mut(id) {
            node.document = Some(id);
        }
        id
    }

    /// Create a standalone element; a `prefix:local` name records its prefix
    pub fn new_element(&mut self, name: &str) -> NodeId {
        let prefix_id = split_prefix(name).map_or(0, |(prefix, _)| self.strings.intern(prefix));
        let name_id = self.strings.intern(name);
        self.push(XmlNode::element(name_id, prefix_id))
    }

    pub fn new_text(&mut self, content: &str) -> NodeId {
        self.push(XmlNode::character_data(NodeKind::Text, content))
    }

    pub fn new_cdata(&mut self, content: &str) -> NodeId {
        self.push(XmlNode::character_data(NodeKind::CData, content))
    }

    pub fn new_comment(&mut self, content: &str) -> NodeId {
        self.push(XmlNode::character_data(NodeKind::Comment, content))
    }

    pub fn new_processing_instruction(&mut self, target: &str) -> NodeId {
        let target_id = self.strings.intern(target);
        self.push(XmlNode::processing_instruction(target_id))
    }

    /// Create an element and append it to `parent`
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        let child = self.new_element(name);
        self.attach_new(parent, child)
    }

    /// Create a text node and append it to `parent`
    pub fn append_text(&mut self, parent: NodeId, content: &str) -> Result<NodeId, TreeError> {
        let child = self.new_text(content);
        self.attach_new(parent, child)
    }

    /// Create a comment and append it to `parent`
    pub fn append_comment(&mut self, parent: NodeId, content: &str) -> Result<NodeId, TreeError> {
        let child = self.new_comment(content);
        self.attach_new(parent, child)
    }

    fn attach_new(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, TreeError> {
        match self.append_child(parent, child) {
            Ok(()) => Ok(child),
            Err(err) => {
                self.discard(child);
                Err(err)
            }
        }
    }

    // =========================================================================
    // Node access
    // =========================================================================

    /// Get a node by ID, `None` if it never existed or was removed
    #[inline]
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        let (index, generation) = split_id(id);
        let slot = self.slots.get(index)?;
        if slot.generation != generation {
            return None;
        }
        slot.node.as_ref()
    }

    #[inline]
    fn get_node_mut(&mut self, id: NodeId) -> Option<&mut XmlNode> {
        let (index, generation) = split_id(id);
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn live_node(&self, id: NodeId) -> Result<&XmlNode, TreeError> {
        self.get_node(id).ok_or(TreeError::DeadNode(id))
    }

    fn live_node_mut(&mut self, id: NodeId) -> Result<&mut XmlNode, TreeError> {
        self.get_node_mut(id).ok_or(TreeError::DeadNode(id))
    }

    #[inline]
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.live
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    /// Qualified name of an element or processing instruction target
    pub fn name(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.name_id == 0 {
            return None;
        }
        self.strings.get_str(node.name_id)
    }

    /// Name without its namespace prefix
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        let name = self.name(id)?;
        Some(split_prefix(name).map_or(name, |(_, local)| local))
    }

    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.prefix_id == 0 {
            return None;
        }
        self.strings.get_str(node.prefix_id)
    }

    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.namespace_id == 0 {
            return None;
        }
        self.strings.get_str(node.namespace_id)
    }

    /// Character data of text, CDATA and comment nodes
    pub fn content(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        match node.kind {
            NodeKind::Document => None,
            _ => node.content.as_deref(),
        }
    }

    /// Version string a document was created with
    pub fn document_version(&self, doc: NodeId) -> Option<&str> {
        let node = self.get_node(doc)?;
        match node.kind {
            NodeKind::Document => node.content.as_deref(),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.prev_sibling
    }

    /// Owning document; `None` means the node is standalone
    pub fn document_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.document
    }

    /// First element child of a document
    pub fn root_element(&self, doc: NodeId) -> Option<NodeId> {
        if self.kind(doc)? != NodeKind::Document {
            return None;
        }
        self.children(doc)
            .find(|&child| self.kind(child) == Some(NodeKind::Element))
    }

    /// Topmost ancestor of a node (the node itself when detached)
    pub fn subtree_top(&self, id: NodeId) -> NodeId {
        let mut top = id;
        while let Some(parent) = self.parent(top) {
            top = parent;
        }
        top
    }

    /// Check whether `ancestor` is a proper ancestor of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    // =========================================================================
    // Attributes and namespaces
    // =========================================================================

    /// Attributes of a node, empty for dead or non-element nodes
    pub fn attributes(&self, id: NodeId) -> &[XmlAttribute] {
        self.get_node(id).map_or(&[], |node| node.attributes.as_slice())
    }

    /// Get attribute value by name
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        let name_id = self.strings.lookup(name)?;
        self.attributes(id)
            .iter()
            .find(|attr| attr.name_id == name_id)
            .map(|attr| attr.value.as_str())
    }

    /// Resolve the name of a stored attribute
    pub fn attribute_name(&self, attr: &XmlAttribute) -> &str {
        self.strings.get_str(attr.name_id).unwrap_or("")
    }

    /// All attribute names and values for a node
    pub fn attribute_values(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.attributes(id)
            .iter()
            .map(|attr| (self.attribute_name(attr), attr.value.as_str()))
            .collect()
    }

    /// Set an attribute, replacing the value in place when it already exists
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), TreeError> {
        if self.live_node(id)?.kind != NodeKind::Element {
            return Err(TreeError::NotAnElement(id));
        }
        let prefix_id = split_prefix(name).map_or(0, |(prefix, _)| self.strings.intern(prefix));
        let name_id = self.strings.intern(name);

        let node = self.live_node_mut(id)?;
        match node.attributes.iter_mut().find(|attr| attr.name_id == name_id) {
            Some(attr) => attr.value = value.to_string(),
            None => node
                .attributes
                .push(XmlAttribute::new(name_id, prefix_id, value)),
        }
        Ok(())
    }

    /// Remove an attribute, returning its value
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let name_id = self.strings.lookup(name)?;
        let node = self.get_node_mut(id)?;
        let pos = node.attributes.iter().position(|attr| attr.name_id == name_id)?;
        Some(node.attributes.remove(pos).value)
    }

    /// Bind an element to a namespace URI, optionally replacing its prefix
    pub fn set_namespace(
        &mut self,
        id: NodeId,
        prefix: Option<&str>,
        uri: &str,
    ) -> Result<(), TreeError> {
        if self.live_node(id)?.kind != NodeKind::Element {
            return Err(TreeError::NotAnElement(id));
        }
        let prefix_id = prefix.map(|p| self.strings.intern(p));
        let namespace_id = self.strings.intern(uri);

        let node = self.live_node_mut(id)?;
        if let Some(prefix_id) = prefix_id {
            node.prefix_id = prefix_id;
        }
        node.namespace_id = namespace_id;
        Ok(())
    }

    // =========================================================================
    // Linking
    // =========================================================================

    /// Append a detached node as the last child of `parent`
    ///
    /// The child and its subtree take over the parent's owning document.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let parent_node = self.live_node(parent)?;
        let (parent_kind, document) = (parent_node.kind, parent_node.document);
        let child_node = self.live_node(child)?;
        let (child_kind, child_parent) = (child_node.kind, child_node.parent);

        if !parent_kind.is_container() {
            return Err(TreeError::NotAContainer(parent));
        }
        if child_kind == NodeKind::Document {
            return Err(TreeError::DocumentAsChild(child));
        }
        if child_parent.is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(TreeError::WouldCycle { parent, child });
        }
        if parent_kind == NodeKind::Document
            && child_kind == NodeKind::Element
            && self.root_element(parent).is_some()
        {
            return Err(TreeError::RootElementExists(parent));
        }

        self.link_child(parent, child);
        self.set_document(child, document);
        Ok(())
    }

    /// Link a child node to its parent
    fn link_child(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.get_node(parent).and_then(|n| n.last_child);

        if let Some(last_id) = last_child {
            if let Some(node) = self.get_node_mut(child) {
                node.prev_sibling = Some(last_id);
            }
            if let Some(node) = self.get_node_mut(last_id) {
                node.next_sibling = Some(child);
            }
        } else if let Some(node) = self.get_node_mut(parent) {
            node.first_child = Some(child);
        }

        if let Some(node) = self.get_node_mut(parent) {
            node.last_child = Some(child);
        }
        if let Some(node) = self.get_node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn set_document(&mut self, root: NodeId, document: Option<NodeId>) {
        let subtree: Vec<NodeId> = std::iter::once(root).chain(self.descendants(root)).collect();
        for id in subtree {
            if let Some(node) = self.get_node_mut(id) {
                node.document = document;
            }
        }
    }

    /// Graft a detached element onto a document as its root element
    ///
    /// Returns the previous root element, which is detached, not removed.
    pub fn set_root_element(
        &mut self,
        doc: NodeId,
        element: NodeId,
    ) -> Result<Option<NodeId>, TreeError> {
        if self.live_node(doc)?.kind != NodeKind::Document {
            return Err(TreeError::NotADocument(doc));
        }
        let element_node = self.live_node(element)?;
        if element_node.kind != NodeKind::Element {
            return Err(TreeError::NotAnElement(element));
        }
        if element_node.parent.is_some() {
            return Err(TreeError::AlreadyAttached(element));
        }

        let previous = self.root_element(doc);
        if let Some(old) = previous {
            self.detach(old)?;
        }
        self.append_child(doc, element)?;
        Ok(previous)
    }

    /// Unlink a node from its parent and siblings
    ///
    /// The node keeps its own children; the whole subtree becomes standalone.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        let node = self.live_node(id)?;
        let Some(parent) = node.parent else {
            return Ok(());
        };
        let (prev, next) = (node.prev_sibling, node.next_sibling);

        match prev {
            Some(prev_id) => {
                if let Some(n) = self.get_node_mut(prev_id) {
                    n.next_sibling = next;
                }
            }
            None => {
                if let Some(n) = self.get_node_mut(parent) {
                    n.first_child = next;
                }
            }
        }
        match next {
            Some(next_id) => {
                if let Some(n) = self.get_node_mut(next_id) {
                    n.prev_sibling = prev;
                }
            }
            None => {
                if let Some(n) = self.get_node_mut(parent) {
                    n.last_child = prev;
                }
            }
        }

        let node = self.live_node_mut(id)?;
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;

        self.set_document(id, None);
        Ok(())
    }

    /// Detach a node and destroy it together with everything still below it
    ///
    /// Returns the number of nodes removed.
    pub fn remove(&mut self, id: NodeId) -> Result<usize, TreeError> {
        self.detach(id)?;
        let subtree: Vec<NodeId> = std::iter::once(id).chain(self.descendants(id)).collect();
        for &node in &subtree {
            self.discard(node);
        }
        Ok(subtree.len())
    }

    /// Copy a node with its name, namespace, attributes and content, but no children
    pub fn shallow_copy(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let copy = self.live_node(id)?.unlinked_copy();
        let is_document = copy.kind == NodeKind::Document;
        let new_id = self.push(copy);
        if is_document {
            if let Some(node) = self.get_node_mut(new_id) {
                node.document = Some(new_id);
            }
        }
        Ok(new_id)
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        let first = self.get_node(id).and_then(|n| n.first_child);
        ChildIter {
            tree: self,
            next: first,
        }
    }

    /// Iterate over all descendants of a node in document order
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        let mut child_id = self.get_node(id).and_then(|n| n.last_child);
        while let Some(cid) = child_id {
            stack.push(cid);
            child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
        }
        DescendantIter { tree: self, stack }
    }

    /// XPath string-value: concatenated descendant text for elements and documents
    pub fn string_value(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Element) | Some(NodeKind::Document) => self
                .descendants(id)
                .filter_map(|d| {
                    let node = self.get_node(d)?;
                    if node.is_text() {
                        node.content.as_deref()
                    } else {
                        None
                    }
                })
                .collect(),
            Some(_) => self.content(id).unwrap_or("").to_string(),
            None => String::new(),
        }
    }
}

/// Iterator over child nodes
pub struct ChildIter<'t> {
    tree: &'t XmlTree,
    next: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first, pre-order)
pub struct DescendantIter<'t> {
    tree: &'t XmlTree,
    stack: Vec<NodeId>,
}

impl Iterator for DescendantIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Push children in reverse so the first child is visited first
        let mut child_id = self.tree.get_node(current).and_then(|n| n.last_child);
        while let Some(id) = child_id {
            self.stack.push(id);
            child_id = self.tree.get_node(id).and_then(|n| n.prev_sibling);
        }

        Some(current)
    }
}

// =============================================================================
// Document view for XPath evaluation
// =============================================================================

/// Read-only view of one document inside an [`XmlTree`]
///
/// Building a view costs nothing; document order is worked out only for the
/// nodes an evaluation actually sorts.
pub struct XmlDocumentView<'a> {
    tree: &'a XmlTree,
    document: NodeId,
}

impl<'a> XmlDocumentView<'a> {
    pub fn new(tree: &'a XmlTree, document: NodeId) -> Self {
        XmlDocumentView { tree, document }
    }

    pub fn tree(&self) -> &'a XmlTree {
        self.tree
    }

    pub fn document_id(&self) -> NodeId {
        self.document
    }
}

impl DocumentAccess for XmlDocumentView<'_> {
    fn document_node_id(&self) -> NodeId {
        self.document
    }

    fn root_element_id(&self) -> Option<NodeId> {
        self.tree.root_element(self.document)
    }

    fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.tree.get_node(id)
    }

    fn node_name(&self, id: NodeId) -> Option<&str> {
        self.tree.name(id)
    }

    fn node_local_name(&self, id: NodeId) -> Option<&str> {
        self.tree.local_name(id)
    }

    fn node_prefix(&self, id: NodeId) -> Option<&str> {
        self.tree.prefix(id)
    }

    fn node_namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.tree.namespace_uri(id)
    }

    fn text_content(&self, id: NodeId) -> Option<&str> {
        let node = self.tree.get_node(id)?;
        if node.is_text() {
            node.content.as_deref()
        } else {
            None
        }
    }

    fn get_attribute(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.tree.attribute(node_id, name)
    }

    fn get_attribute_values(&self, node_id: NodeId) -> Vec<(&str, &str)> {
        self.tree.attribute_values(node_id)
    }

    fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.children(id).collect()
    }

    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.descendants(id).collect()
    }
}
