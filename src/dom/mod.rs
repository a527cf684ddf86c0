//! DOM Module - Arena-based mutable XML tree
//!
//! Implements the tree the walkers, copier and query dispatcher operate on:
//! - Arena allocation for nodes
//! - Generational NodeIds; removed nodes free their slot for reuse
//! - String interning for element/attribute names
//! - Owning-document tracking so standalone subtrees are detectable

pub mod document;
pub mod node;
pub mod strings;

pub use document::{ChildIter, DescendantIter, XmlDocumentView, XmlTree};
pub use node::{NodeId, NodeKind, XmlAttribute, XmlNode};
pub use strings::StringPool;

/// Read-only document access used by the XPath engine
pub trait DocumentAccess {
    /// ID of the document node (the XPath root `/`)
    fn document_node_id(&self) -> NodeId;

    /// Get root element ID
    fn root_element_id(&self) -> Option<NodeId>;

    /// Get a node by ID
    fn get_node(&self, id: NodeId) -> Option<&XmlNode>;

    /// Get node name as string
    fn node_name(&self, id: NodeId) -> Option<&str>;

    /// Get node local name (without prefix)
    fn node_local_name(&self, id: NodeId) -> Option<&str>;

    /// Get the namespace prefix of an element
    fn node_prefix(&self, id: NodeId) -> Option<&str>;

    /// Get the namespace URI of an element
    fn node_namespace_uri(&self, id: NodeId) -> Option<&str>;

    /// Get text content of a text node
    fn text_content(&self, id: NodeId) -> Option<&str>;

    /// Get attribute value by name
    fn get_attribute(&self, node_id: NodeId, name: &str) -> Option<&str>;

    /// Get all attribute names and values
    fn get_attribute_values(&self, node_id: NodeId) -> Vec<(&str, &str)>;

    /// Children as a collected Vec
    fn children_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// Descendants in document order as a collected Vec
    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId>;

    // === Navigation methods for XPath axes ===

    fn node_kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.next_sibling
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.prev_sibling
    }
}

/// XPath string-value of a node
///
/// Text-like nodes yield their content; elements and the document yield the
/// concatenated text of all descendants.
pub fn node_string_value<D: DocumentAccess + ?Sized>(doc: &D, id: NodeId) -> String {
    match doc.node_kind_of(id) {
        Some(NodeKind::Element) | Some(NodeKind::Document) => {
            let mut result = String::new();
            for desc in doc.descendants_vec(id) {
                if let Some(text) = doc.text_content(desc) {
                    result.push_str(text);
                }
            }
            result
        }
        Some(NodeKind::Text) | Some(NodeKind::CData) => {
            doc.text_content(id).unwrap_or("").to_string()
        }
        Some(NodeKind::Comment) | Some(NodeKind::ProcessingInstruction) => doc
            .get_node(id)
            .and_then(|n| n.content())
            .unwrap_or("")
            .to_string(),
        None => String::new(),
    }
}
