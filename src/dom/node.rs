//! XML Node representation
//!
//! Uses NodeId (u32) for compact node references. Every relation between
//! nodes (parent, children, siblings, owning document) is an index into the
//! owning [`XmlTree`](super::XmlTree) arena, never a pointer.

/// Node identifier: arena slot index in the low 32 bits, slot generation in
/// the high 32 bits
///
/// A slot freed by a removal is reused with the next generation, so an id
/// held across the removal stays dead instead of naming the new node.
pub type NodeId = u64;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
}

impl NodeKind {
    /// Whether nodes of this kind may hold children
    #[inline]
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Element)
    }
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    /// Owning document; a document node owns itself
    pub(crate) document: Option<NodeId>,
    /// Index into string pool for name (elements, PIs), or 0
    pub(crate) name_id: u32,
    /// Index into string pool for namespace prefix, or 0
    pub(crate) prefix_id: u32,
    /// Index into string pool for namespace URI, or 0
    pub(crate) namespace_id: u32,
    /// Character data for text, CDATA and comments; version for documents
    pub(crate) content: Option<String>,
    pub(crate) attributes: Vec<XmlAttribute>,
}

impl XmlNode {
    fn blank(kind: NodeKind) -> Self {
        XmlNode {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            document: None,
            name_id: 0,
            prefix_id: 0,
            namespace_id: 0,
            content: None,
            attributes: Vec::new(),
        }
    }

    /// Create a new document node
    pub(crate) fn document_node(version: &str) -> Self {
        let mut node = Self::blank(NodeKind::Document);
        node.content = Some(version.to_string());
        node
    }

    /// Create a new element node
    pub(crate) fn element(name_id: u32, prefix_id: u32) -> Self {
        let mut node = Self::blank(NodeKind::Element);
        node.name_id = name_id;
        node.prefix_id = prefix_id;
        node
    }

    /// Create a character data node (text, CDATA or comment)
    pub(crate) fn character_data(kind: NodeKind, content: &str) -> Self {
        let mut node = Self::blank(kind);
        node.content = Some(content.to_string());
        node
    }

    /// Create a processing instruction node
    pub(crate) fn processing_instruction(target_id: u32) -> Self {
        let mut node = Self::blank(NodeKind::ProcessingInstruction);
        node.name_id = target_id;
        node
    }

    /// Copy of this node without any links to other nodes
    pub(crate) fn unlinked_copy(&self) -> Self {
        XmlNode {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            document: None,
            ..self.clone()
        }
    }

    /// Type of this node
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Parent node, `None` for detached nodes and documents
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    #[inline]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    #[inline]
    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    #[inline]
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    /// Owning document, `None` for standalone nodes
    #[inline]
    pub fn document(&self) -> Option<NodeId> {
        self.document
    }

    /// Check if this is an element node
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Check if this is a text or CDATA node
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CData)
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    /// Check if this node has attributes
    #[inline]
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Attributes in insertion order
    #[inline]
    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    /// Character data, if any
    #[inline]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// Stored attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Index into string pool for the qualified attribute name
    pub name_id: u32,
    /// Index into string pool for namespace prefix, or 0
    pub prefix_id: u32,
    pub value: String,
}

impl XmlAttribute {
    pub fn new(name_id: u32, prefix_id: u32, value: &str) -> Self {
        XmlAttribute {
            name_id,
            prefix_id,
            value: value.to_string(),
        }
    }
}
