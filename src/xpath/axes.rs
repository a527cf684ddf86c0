//! XPath Axes Implementation
//!
//! Node-yielding axes return candidates in axis order: forward axes in
//! document order, reverse axes (ancestor, preceding, preceding-sibling)
//! nearest node first, so positional predicates count the right way.
//!
//! Attributes are not nodes in the arena; the attribute axis is resolved by
//! the evaluator directly and the namespace axis is always empty.

use super::compiler::CompiledNodeTest;
use super::parser::Axis;
use crate::dom::{DocumentAccess, NodeId, NodeKind};

/// Navigate along an axis from a context node
pub fn navigate<D: DocumentAccess>(doc: &D, context: NodeId, axis: Axis) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children_vec(context),
        Axis::Descendant => doc.descendants_vec(context),
        Axis::DescendantOrSelf => {
            let mut result = vec![context];
            result.extend(doc.descendants_vec(context));
            result
        }
        Axis::Parent => doc.parent_of(context).into_iter().collect(),
        Axis::Ancestor => ancestors(doc, context).collect(),
        Axis::AncestorOrSelf => std::iter::once(context)
            .chain(ancestors(doc, context))
            .collect(),
        Axis::FollowingSibling => siblings(doc, context, D::next_sibling_of).collect(),
        Axis::PrecedingSibling => siblings(doc, context, D::prev_sibling_of).collect(),
        Axis::Following => following(doc, context),
        Axis::Preceding => preceding(doc, context),
        Axis::Self_ => vec![context],
        Axis::Attribute | Axis::Namespace => Vec::new(),
    }
}

fn ancestors<D: DocumentAccess>(doc: &D, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    std::iter::successors(doc.parent_of(node), move |&id| doc.parent_of(id))
}

fn siblings<'d, D: DocumentAccess>(
    doc: &'d D,
    node: NodeId,
    step: fn(&D, NodeId) -> Option<NodeId>,
) -> impl Iterator<Item = NodeId> + 'd {
    std::iter::successors(step(doc, node), move |&id| step(doc, id))
}

/// following:: - siblings after the node and after each ancestor, with their subtrees
fn following<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    for node in std::iter::once(context).chain(ancestors(doc, context)) {
        for sibling in siblings(doc, node, D::next_sibling_of) {
            result.push(sibling);
            result.extend(doc.descendants_vec(sibling));
        }
    }
    result
}

/// preceding:: - mirror of following::, nearest first, ancestors excluded
fn preceding<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    for node in std::iter::once(context).chain(ancestors(doc, context)) {
        for sibling in siblings(doc, node, D::prev_sibling_of) {
            result.extend(doc.descendants_vec(sibling).into_iter().rev());
            result.push(sibling);
        }
    }
    result
}

/// Check if a node matches a node test
pub fn matches_node_test<D: DocumentAccess>(
    doc: &D,
    node_id: NodeId,
    node_test: &CompiledNodeTest,
) -> bool {
    let Some(kind) = doc.node_kind_of(node_id) else {
        return false;
    };

    match node_test {
        CompiledNodeTest::Node => true,
        CompiledNodeTest::Text => matches!(kind, NodeKind::Text | NodeKind::CData),
        CompiledNodeTest::Comment => kind == NodeKind::Comment,
        CompiledNodeTest::ProcessingInstruction(target) => {
            kind == NodeKind::ProcessingInstruction
                && target
                    .as_deref()
                    .is_none_or(|t| doc.node_name(node_id) == Some(t))
        }
        _ if kind != NodeKind::Element => false,
        CompiledNodeTest::Any => true,
        CompiledNodeTest::Name(name) => doc.node_name(node_id) == Some(name.as_str()),
        CompiledNodeTest::QName(prefix, local) => {
            doc.node_prefix(node_id) == Some(prefix.as_str())
                && doc.node_local_name(node_id) == Some(local.as_str())
        }
        CompiledNodeTest::NamespaceWildcard(prefix) => {
            doc.node_prefix(node_id) == Some(prefix.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{XmlDocumentView, XmlTree};
    use pretty_assertions::assert_eq;

    /// doc > root > [a > [a1, a2], b, c > [c1]]
    fn sample() -> (XmlTree, Vec<NodeId>) {
        let mut tree = XmlTree::new();
        let doc = tree.new_document("1.0");
        let root = tree.new_element("root");
        tree.set_root_element(doc, root).unwrap();
        let a = tree.append_element(root, "a").unwrap();
        let a1 = tree.append_element(a, "a1").unwrap();
        let a2 = tree.append_element(a, "a2").unwrap();
        let b = tree.append_element(root, "b").unwrap();
        let c = tree.append_element(root, "c").unwrap();
        let c1 = tree.append_element(c, "c1").unwrap();
        (tree, vec![doc, root, a, a1, a2, b, c, c1])
    }

    #[test]
    fn test_child_and_descendant() {
        let (tree, ids) = sample();
        let view = XmlDocumentView::new(&tree, ids[0]);
        assert_eq!(navigate(&view, ids[1], Axis::Child), vec![ids[2], ids[5], ids[6]]);
        assert_eq!(navigate(&view, ids[1], Axis::Descendant).len(), 6);
        assert_eq!(navigate(&view, ids[2], Axis::DescendantOrSelf), vec![ids[2], ids[3], ids[4]]);
    }

    #[test]
    fn test_ancestor_axis() {
        let (tree, ids) = sample();
        let view = XmlDocumentView::new(&tree, ids[0]);
        // a1 -> a, root, document
        assert_eq!(navigate(&view, ids[3], Axis::Ancestor), vec![ids[2], ids[1], ids[0]]);
        assert_eq!(navigate(&view, ids[3], Axis::AncestorOrSelf).len(), 4);
    }

    #[test]
    fn test_sibling_axes() {
        let (tree, ids) = sample();
        let view = XmlDocumentView::new(&tree, ids[0]);
        assert_eq!(navigate(&view, ids[5], Axis::FollowingSibling), vec![ids[6]]);
        assert_eq!(navigate(&view, ids[6], Axis::PrecedingSibling), vec![ids[5], ids[2]]);
    }

    #[test]
    fn test_following_and_preceding() {
        let (tree, ids) = sample();
        let view = XmlDocumentView::new(&tree, ids[0]);
        // following of a2: b, c, c1
        assert_eq!(navigate(&view, ids[4], Axis::Following), vec![ids[5], ids[6], ids[7]]);
        // preceding of c1: b, a2, a1, a (nearest first, ancestors excluded)
        assert_eq!(
            navigate(&view, ids[7], Axis::Preceding),
            vec![ids[5], ids[4], ids[3], ids[2]]
        );
    }

    #[test]
    fn test_node_tests() {
        let mut tree = XmlTree::new();
        let doc = tree.new_document("1.0");
        let root = tree.new_element("root");
        tree.set_root_element(doc, root).unwrap();
        let prefixed = tree.append_element(root, "ns:item").unwrap();
        let comment = tree.append_comment(root, "note").unwrap();
        let text = tree.append_text(root, "t").unwrap();
        let view = XmlDocumentView::new(&tree, doc);

        assert!(matches_node_test(&view, root, &CompiledNodeTest::Any));
        assert!(!matches_node_test(&view, comment, &CompiledNodeTest::Any));
        assert!(matches_node_test(&view, comment, &CompiledNodeTest::Comment));
        assert!(matches_node_test(&view, text, &CompiledNodeTest::Text));
        assert!(matches_node_test(&view, text, &CompiledNodeTest::Node));
        assert!(matches_node_test(
            &view,
            prefixed,
            &CompiledNodeTest::QName("ns".to_string(), "item".to_string())
        ));
        assert!(!matches_node_test(
            &view,
            prefixed,
            &CompiledNodeTest::QName("other".to_string(), "item".to_string())
        ));
        assert!(matches_node_test(
            &view,
            prefixed,
            &CompiledNodeTest::NamespaceWildcard("ns".to_string())
        ));
        assert!(!matches_node_test(&view, prefixed, &CompiledNodeTest::Name("item".to_string())));
    }
}
