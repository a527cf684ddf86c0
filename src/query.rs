//! XPath query dispatch
//!
//! Evaluates a pattern against the document owning a context node and hands
//! every selected node to a callback, in document order. A context node that
//! belongs to no document is grafted onto a scratch document for the duration
//! of the query and returned to its standalone state afterwards.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::dom::{NodeId, XmlDocumentView, XmlTree};
use crate::error::{QueryError, TreeError};
use crate::xpath::{compile, evaluate_compiled, CompiledCache, CompiledExpr, EvalContext, XPathValue};
use crate::XML_VERSION;

// =============================================================================
// Ephemeral document
// =============================================================================

/// Scratch document holding a standalone subtree while a query runs
///
/// Derefs to the tree it borrows. On drop the grafted subtree is detached
/// again before the scratch document is removed, so the grafted nodes are
/// never destroyed with it.
pub struct EphemeralDocument<'t> {
    tree: &'t mut XmlTree,
    document: NodeId,
    graft: NodeId,
}

impl<'t> EphemeralDocument<'t> {
    /// Graft the topmost ancestor of `node` onto a new document
    pub fn graft(tree: &'t mut XmlTree, node: NodeId) -> Result<Self, TreeError> {
        let graft = tree.subtree_top(node);
        let document = tree.new_document(XML_VERSION);
        if let Err(err) = tree.append_child(document, graft) {
            if let Err(cleanup) = tree.remove(document) {
                error!(document, %cleanup, "failed to discard ephemeral document");
            }
            return Err(err);
        }
        trace!(document, graft, "grafted standalone subtree");
        Ok(EphemeralDocument {
            tree,
            document,
            graft,
        })
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    /// Top of the grafted subtree
    pub fn grafted(&self) -> NodeId {
        self.graft
    }
}

impl Deref for EphemeralDocument<'_> {
    type Target = XmlTree;

    fn deref(&self) -> &XmlTree {
        self.tree
    }
}

impl DerefMut for EphemeralDocument<'_> {
    fn deref_mut(&mut self) -> &mut XmlTree {
        self.tree
    }
}

impl Drop for EphemeralDocument<'_> {
    fn drop(&mut self) {
        // callbacks may have removed or moved the graft themselves
        if self.tree.is_alive(self.graft) && self.tree.parent(self.graft) == Some(self.document) {
            if let Err(err) = self.tree.detach(self.graft) {
                error!(node = self.graft, %err, "failed to ungraft subtree from ephemeral document");
            }
        }
        if self.tree.is_alive(self.document) {
            if let Err(err) = self.tree.remove(self.document) {
                error!(document = self.document, %err, "failed to discard ephemeral document");
            }
        }
    }
}

/// Run `body` against the document owning `root`, grafting onto a scratch
/// document when there is none
fn with_owning_document<R>(
    tree: &mut XmlTree,
    root: NodeId,
    body: impl FnOnce(&mut XmlTree, NodeId) -> R,
) -> Result<R, TreeError> {
    if !tree.is_alive(root) {
        return Err(TreeError::DeadNode(root));
    }
    match tree.document_of(root) {
        Some(document) => Ok(body(tree, document)),
        None => {
            let mut scratch = EphemeralDocument::graft(tree, root)?;
            let document = scratch.document();
            Ok(body(&mut *scratch, document))
        }
    }
}

fn evaluate_at(
    tree: &XmlTree,
    document: NodeId,
    root: NodeId,
    expr: &CompiledExpr,
) -> Result<XPathValue, String> {
    let view = XmlDocumentView::new(tree, document);
    let ctx = EvalContext::new(&view, root);
    evaluate_compiled(expr, &ctx)
}

// =============================================================================
// Node set
// =============================================================================

/// Query result as slots emptied one by one during dispatch
#[derive(Debug, Default)]
pub(crate) struct NodeSet {
    slots: Vec<Option<NodeId>>,
}

impl NodeSet {
    /// Non-node-set values select nothing
    pub(crate) fn from_value(value: XPathValue, pattern: &str) -> Self {
        match value {
            XPathValue::NodeSet(nodes) => NodeSet {
                slots: nodes.into_iter().map(Some).collect(),
            },
            other => {
                debug!(pattern, result = other.type_name(), "query did not select nodes");
                NodeSet::default()
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Take each node out of its slot and pass it on if it is still alive
    pub(crate) fn drain_live<F>(&mut self, tree: &mut XmlTree, mut callback: F)
    where
        F: FnMut(&mut XmlTree, NodeId),
    {
        for slot in &mut self.slots {
            let Some(id) = slot.take() else { continue };
            if !tree.is_alive(id) {
                debug!(node = id, "selected node was removed earlier in the query, skipping");
                continue;
            }
            callback(tree, id);
        }
    }
}

fn dispatch<F>(tree: &mut XmlTree, root: NodeId, pattern: &str, expr: &CompiledExpr, callback: F)
where
    F: FnMut(&mut XmlTree, NodeId),
{
    let outcome = with_owning_document(tree, root, |tree, document| {
        let value = match evaluate_at(tree, document, root, expr) {
            Ok(value) => value,
            Err(message) => {
                warn!(pattern, %message, "query evaluation failed");
                return;
            }
        };
        let mut nodes = NodeSet::from_value(value, pattern);
        trace!(pattern, selected = nodes.len(), "dispatching query results");
        nodes.drain_live(tree, callback);
    });
    if let Err(err) = outcome {
        error!(node = root, pattern, %err, "cannot run query");
    }
}

/// Evaluate `pattern` with `root` as context node and call `callback` for
/// every selected node
///
/// Relative patterns are scoped to `root`; absolute ones see its whole
/// document. Malformed patterns and non-node-set results select nothing.
pub fn query_for_each<F>(tree: &mut XmlTree, root: NodeId, pattern: &str, callback: F)
where
    F: FnMut(&mut XmlTree, NodeId),
{
    match compile(pattern) {
        Ok(expr) => dispatch(tree, root, pattern, &expr, callback),
        Err(message) => warn!(pattern, %message, "query compile failed"),
    }
}

// =============================================================================
// Dispatcher with compiled expression cache
// =============================================================================

/// [`query_for_each`] with compiled patterns kept in an LRU cache
#[derive(Default)]
pub struct QueryDispatcher {
    cache: CompiledCache,
}

impl QueryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        QueryDispatcher {
            cache: CompiledCache::new(capacity),
        }
    }

    fn compiled(&mut self, pattern: &str) -> Result<Arc<CompiledExpr>, QueryError> {
        self.cache
            .get_or_compile(pattern)
            .map_err(|message| QueryError::Compile {
                pattern: pattern.to_string(),
                message,
            })
    }

    pub fn query_for_each<F>(&mut self, tree: &mut XmlTree, root: NodeId, pattern: &str, callback: F)
    where
        F: FnMut(&mut XmlTree, NodeId),
    {
        match self.compiled(pattern) {
            Ok(expr) => dispatch(tree, root, pattern, &expr, callback),
            Err(err) => warn!(%err, "query compile failed"),
        }
    }

    /// Raw value of `pattern` evaluated at `root`
    ///
    /// For a standalone `root` the scratch document is gone by the time this
    /// returns, so a selected document node id is no longer alive.
    pub fn evaluate(
        &mut self,
        tree: &mut XmlTree,
        root: NodeId,
        pattern: &str,
    ) -> Result<XPathValue, QueryError> {
        let expr = self.compiled(pattern)?;
        with_owning_document(tree, root, |tree, document| {
            evaluate_at(tree, document, root, &expr)
        })?
        .map_err(|message| QueryError::Evaluate {
            pattern: pattern.to_string(),
            message,
        })
    }

    /// Number of compiled patterns currently cached
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// doc > obj > [int(name=a), str > [int(name=b)], int(name=c)]
    fn sample() -> (XmlTree, NodeId, NodeId) {
        let mut tree = XmlTree::new();
        let doc = tree.new_document(XML_VERSION);
        let obj = tree.new_element("obj");
        tree.set_root_element(doc, obj).unwrap();
        let a = tree.append_element(obj, "int").unwrap();
        tree.set_attribute(a, "name", "a").unwrap();
        let s = tree.append_element(obj, "str").unwrap();
        let b = tree.append_element(s, "int").unwrap();
        tree.set_attribute(b, "name", "b").unwrap();
        let c = tree.append_element(obj, "int").unwrap();
        tree.set_attribute(c, "name", "c").unwrap();
        (tree, doc, obj)
    }

    fn names(tree: &mut XmlTree, root: NodeId, pattern: &str) -> Vec<String> {
        let mut seen = Vec::new();
        query_for_each(tree, root, pattern, |tree, id| {
            seen.push(tree.attribute(id, "name").unwrap_or("").to_string());
        });
        seen
    }

    #[test]
    fn test_relative_pattern_scoped_to_root() {
        let (mut tree, _, obj) = sample();
        let s = tree.children(obj).nth(1).unwrap();
        assert_eq!(names(&mut tree, obj, "int"), vec!["a", "c"]);
        assert_eq!(names(&mut tree, s, "int"), vec!["b"]);
        assert_eq!(names(&mut tree, obj, ".//int"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_absolute_pattern_sees_whole_document() {
        let (mut tree, _, obj) = sample();
        let s = tree.children(obj).nth(1).unwrap();
        assert_eq!(names(&mut tree, s, "//int"), vec!["a", "b", "c"]);
        assert_eq!(names(&mut tree, s, "/obj/int[@name='c']"), vec!["c"]);
    }

    #[test]
    fn test_callback_can_mutate() {
        let (mut tree, _, obj) = sample();
        query_for_each(&mut tree, obj, "//int", |tree, id| {
            tree.set_attribute(id, "seen", "true").unwrap();
        });
        assert_eq!(names(&mut tree, obj, "//int[@seen='true']").len(), 3);
    }

    #[test]
    fn test_removed_nodes_are_skipped() {
        let (mut tree, _, obj) = sample();
        let mut seen = Vec::new();
        query_for_each(&mut tree, obj, "//int | //str", |tree, id| {
            seen.push(tree.name(id).unwrap().to_string());
            if tree.name(id) == Some("int") && tree.attribute(id, "name") == Some("a") {
                let s = tree.next_sibling(id).unwrap();
                tree.remove(s).unwrap();
            }
        });
        // str and the int inside it went away before their turn
        assert_eq!(seen, vec!["int", "int"]);
    }

    #[test]
    fn test_malformed_and_non_nodeset_patterns_select_nothing() {
        let (mut tree, _, obj) = sample();
        let before = tree.node_count();
        for pattern in ["int[", "count(int)", "'text'", "$unbound"] {
            let mut calls = 0;
            query_for_each(&mut tree, obj, pattern, |_, _| calls += 1);
            assert_eq!(calls, 0, "pattern {pattern:?}");
        }
        assert_eq!(tree.node_count(), before);
    }

    #[test]
    fn test_dead_root_selects_nothing() {
        let (mut tree, _, obj) = sample();
        let a = tree.first_child(obj).unwrap();
        tree.remove(a).unwrap();
        let mut calls = 0;
        query_for_each(&mut tree, a, ".", |_, _| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_standalone_root_is_restored() {
        let mut tree = XmlTree::new();
        let obj = tree.new_element("obj");
        tree.append_element(obj, "int").unwrap();
        let before = tree.node_count();

        let mut seen = Vec::new();
        query_for_each(&mut tree, obj, ".", |tree, id| {
            // the graft is in place while callbacks run
            assert!(tree.document_of(id).is_some());
            seen.push(id);
        });
        assert_eq!(seen, vec![obj]);
        assert!(tree.parent(obj).is_none());
        assert!(tree.document_of(obj).is_none());
        assert_eq!(tree.node_count(), before);
    }

    #[test]
    fn test_standalone_inner_node() {
        let mut tree = XmlTree::new();
        let obj = tree.new_element("obj");
        let list = tree.append_element(obj, "list").unwrap();
        let item = tree.append_element(list, "int").unwrap();
        tree.append_element(obj, "int").unwrap();

        let mut seen = Vec::new();
        query_for_each(&mut tree, list, "int", |_, id| seen.push(id));
        assert_eq!(seen, vec![item]);

        let mut all = 0;
        query_for_each(&mut tree, list, "/obj//int", |_, _| all += 1);
        assert_eq!(all, 2);
        assert!(tree.parent(obj).is_none());
        assert_eq!(tree.parent(list), Some(obj));
    }

    #[test]
    fn test_callback_removing_standalone_root() {
        let mut tree = XmlTree::new();
        let obj = tree.new_element("obj");
        tree.append_element(obj, "int").unwrap();
        query_for_each(&mut tree, obj, ".", |tree, id| {
            tree.remove(id).unwrap();
        });
        assert!(!tree.is_alive(obj));
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn test_repeated_standalone_queries_reuse_arena() {
        let mut tree = XmlTree::new();
        let obj = tree.new_element("obj");
        tree.append_element(obj, "int").unwrap();

        let mut calls = 0;
        for _ in 0..1_000 {
            query_for_each(&mut tree, obj, ".", |_, _| calls += 1);
        }
        assert_eq!(calls, 1_000);
        assert_eq!(tree.node_count(), 2);
        // the scratch document keeps landing in the same freed slot
        assert_eq!(tree.slot_count(), 3);
    }

    #[test]
    fn test_ephemeral_document_guard() {
        let mut tree = XmlTree::new();
        let obj = tree.new_element("obj");
        let document = {
            let scratch = EphemeralDocument::graft(&mut tree, obj).unwrap();
            assert_eq!(scratch.grafted(), obj);
            assert_eq!(scratch.root_element(scratch.document()), Some(obj));
            scratch.document()
        };
        assert!(!tree.is_alive(document));
        assert!(tree.is_alive(obj));
        assert!(tree.document_of(obj).is_none());
    }

    #[test]
    fn test_dispatcher_caches_patterns() {
        let (mut tree, _, obj) = sample();
        let mut dispatcher = QueryDispatcher::with_capacity(8);
        let mut calls = 0;
        dispatcher.query_for_each(&mut tree, obj, "int", |_, _| calls += 1);
        dispatcher.query_for_each(&mut tree, obj, "int", |_, _| calls += 1);
        dispatcher.query_for_each(&mut tree, obj, "int[", |_, _| calls += 1);
        assert_eq!(calls, 4);
        assert_eq!(dispatcher.cached_len(), 1);
    }

    #[test]
    fn test_dispatcher_evaluate() {
        let (mut tree, _, obj) = sample();
        let mut dispatcher = QueryDispatcher::new();
        assert_eq!(
            dispatcher.evaluate(&mut tree, obj, "count(//int)").unwrap(),
            XPathValue::Number(3.0)
        );
        assert!(matches!(
            dispatcher.evaluate(&mut tree, obj, "int["),
            Err(QueryError::Compile { .. })
        ));
        assert!(matches!(
            dispatcher.evaluate(&mut tree, obj, "$missing"),
            Err(QueryError::Evaluate { .. })
        ));

        let a = tree.first_child(obj).unwrap();
        tree.remove(a).unwrap();
        assert_eq!(
            dispatcher.evaluate(&mut tree, a, "."),
            Err(QueryError::Tree(TreeError::DeadNode(a)))
        );
    }
}
