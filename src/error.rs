//! Error types at the tree, query and accessor boundaries

use thiserror::Error;

use crate::dom::NodeId;

/// Structural tree operation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} does not exist or was removed")]
    DeadNode(NodeId),
    #[error("node {0} cannot hold children")]
    NotAContainer(NodeId),
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0} is not a document")]
    NotADocument(NodeId),
    #[error("node {0} is already attached to a parent")]
    AlreadyAttached(NodeId),
    #[error("document node {0} cannot become a child")]
    DocumentAsChild(NodeId),
    #[error("document {0} already has a root element")]
    RootElementExists(NodeId),
    #[error("appending {child} under {parent} would create a cycle")]
    WouldCycle { parent: NodeId, child: NodeId },
}

/// Typed attribute read failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttrError {
    #[error("attribute '{0}' is missing")]
    Missing(String),
    #[error("attribute '{name}' is not an integer: {value:?}")]
    NotNumeric { name: String, value: String },
    #[error("no <{tag}> child named '{name}'")]
    MissingChild { tag: String, name: String },
}

/// Query compile / evaluation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("cannot compile '{pattern}': {message}")]
    Compile { pattern: String, message: String },
    #[error("cannot evaluate '{pattern}': {message}")]
    Evaluate { pattern: String, message: String },
    #[error(transparent)]
    Tree(#[from] TreeError),
}
