//! xmlwalk - Traversal, query and copy helpers over a mutable XML tree
//!
//! Components:
//! - Walkers: pre-order subtree walk with deletion-safe callbacks, ancestor walk
//! - Copy: deep copy that leaves out hidden, metadata or comment nodes
//! - Query: XPath dispatch to per-node callbacks, standalone nodes included
//! - Lookup: `<tag name=".." val=".."/>` child lookup and integer accessors

pub mod copy;
pub mod dom;
pub mod error;
pub mod lookup;
pub mod query;
pub mod walk;
pub mod xpath;

pub use copy::{copy, is_hidden, ExcludeFlags};
pub use dom::{NodeId, NodeKind, XmlTree};
pub use error::{AttrError, QueryError, TreeError};
pub use lookup::{
    attr_long, child_long, find_child, get_child_long, get_child_value, get_long, LONG_SENTINEL,
};
pub use query::{query_for_each, EphemeralDocument, QueryDispatcher};
pub use walk::{
    for_each_comment, for_each_element, for_each_node_type, walk_ancestors_and_self, NodeSlot,
};
pub use xpath::XPathValue;

/// Declaration written at the top of serialized documents
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n";

/// Version given to documents created by this crate
pub const XML_VERSION: &str = "1.0";

/// Reserved attribute and element names
pub mod markers {
    /// Attribute marking a node hidden when set to [`TRUE_VALUE`]
    pub const HIDDEN_ATTR: &str = "hidden";
    pub const TRUE_VALUE: &str = "true";
    /// Element name of metadata nodes
    pub const META_ELEMENT: &str = "meta";
    pub const NAME_ATTR: &str = "name";
    pub const VAL_ATTR: &str = "val";
}
