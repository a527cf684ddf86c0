//! XPath Evaluation Engine
//!
//! Runs compiled op lists on a value stack against any [`DocumentAccess`].

use std::collections::{HashMap, HashSet};

use super::axes::{matches_node_test, navigate};
use super::compiler::{CompiledExpr, CompiledNodeTest, Op, Predicate};
use super::functions;
use super::parser::{Axis, BinaryOp};
use super::value::{parse_number, XPathValue};
use crate::dom::{node_string_value, DocumentAccess, NodeId};

/// Evaluation context - generic over document type
pub struct EvalContext<'a, D: DocumentAccess> {
    pub doc: &'a D,
    pub context_node: NodeId,
    pub context_position: usize,
    pub context_size: usize,
}

impl<'a, D: DocumentAccess> EvalContext<'a, D> {
    pub fn new(doc: &'a D, context_node: NodeId) -> Self {
        EvalContext {
            doc,
            context_node,
            context_position: 1,
            context_size: 1,
        }
    }
}

/// Evaluate an XPath expression with the root element as context node
#[must_use = "XPath evaluation result should be used"]
pub fn evaluate<D: DocumentAccess>(doc: &D, xpath: &str) -> Result<XPathValue, String> {
    let context = doc.root_element_id().unwrap_or(doc.document_node_id());
    evaluate_from_node(doc, context, xpath)
}

/// Evaluate an XPath expression from a specific context node
#[must_use = "XPath evaluation result should be used"]
pub fn evaluate_from_node<D: DocumentAccess>(
    doc: &D,
    context_node: NodeId,
    xpath: &str,
) -> Result<XPathValue, String> {
    let compiled = super::compiler::compile(xpath)?;
    evaluate_compiled(&compiled, &EvalContext::new(doc, context_node))
}

fn pop(stack: &mut Vec<XPathValue>) -> Result<XPathValue, String> {
    stack
        .pop()
        .ok_or_else(|| "evaluation stack underflow".to_string())
}

/// Evaluate a compiled expression
pub fn evaluate_compiled<D: DocumentAccess>(
    expr: &CompiledExpr,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, String> {
    let doc = ctx.doc;
    let mut stack: Vec<XPathValue> = Vec::with_capacity(4);

    for op in &expr.ops {
        let value = match op {
            Op::Root => XPathValue::single_node(doc.document_node_id()),
            Op::Context => XPathValue::single_node(ctx.context_node),
            Op::Number(n) => XPathValue::Number(*n),
            Op::String(s) => XPathValue::String(s.clone()),
            Op::Variable(name) => return Err(format!("unbound variable ${}", name)),

            Op::Step(axis, node_test, predicates) => match pop(&mut stack)? {
                XPathValue::NodeSet(nodes) if *axis == Axis::Attribute => {
                    attribute_values(doc, &nodes, node_test)
                }
                XPathValue::NodeSet(nodes) => {
                    XPathValue::NodeSet(apply_step(doc, &nodes, *axis, node_test, predicates)?)
                }
                _ => XPathValue::empty_nodeset(),
            },

            Op::Filter(predicate) => match pop(&mut stack)? {
                XPathValue::NodeSet(nodes) => {
                    XPathValue::NodeSet(apply_predicate(doc, nodes, predicate)?)
                }
                other => return Err(format!("cannot filter a {}", other.type_name())),
            },

            Op::Union => {
                let right = pop(&mut stack)?;
                let left = pop(&mut stack)?;
                match (left, right) {
                    (XPathValue::NodeSet(mut nodes), XPathValue::NodeSet(more)) => {
                        let mut seen: HashSet<NodeId> = nodes.iter().copied().collect();
                        nodes.extend(more.into_iter().filter(|&n| seen.insert(n)));
                        sort_document_order(doc, &mut nodes);
                        XPathValue::NodeSet(nodes)
                    }
                    _ => return Err("union requires two node-sets".to_string()),
                }
            }

            Op::Negate => XPathValue::Number(-number_of(doc, &pop(&mut stack)?)),

            Op::Binary(op) => {
                let right = pop(&mut stack)?;
                let left = pop(&mut stack)?;
                binary(doc, *op, &left, &right)
            }

            Op::Call(name, arg_count) => {
                let split = stack
                    .len()
                    .checked_sub(*arg_count)
                    .ok_or_else(|| format!("{}() is missing arguments", name))?;
                let args = stack.split_off(split);
                functions::call(name, args, ctx)?
            }
        };
        stack.push(value);
    }

    Ok(stack.pop().unwrap_or_else(XPathValue::empty_nodeset))
}

/// Apply one location step to every node of a node set
fn apply_step<D: DocumentAccess>(
    doc: &D,
    nodes: &[NodeId],
    axis: Axis,
    node_test: &CompiledNodeTest,
    predicates: &[Predicate],
) -> Result<Vec<NodeId>, String> {
    let mut seen = HashSet::with_capacity(nodes.len());
    let mut result = Vec::with_capacity(nodes.len());

    for &node in nodes {
        let mut candidates: Vec<NodeId> = navigate(doc, node, axis)
            .into_iter()
            .filter(|&c| matches_node_test(doc, c, node_test))
            .collect();
        for predicate in predicates {
            candidates = apply_predicate(doc, candidates, predicate)?;
        }
        result.extend(candidates.into_iter().filter(|&c| seen.insert(c)));
    }

    sort_document_order(doc, &mut result);
    Ok(result)
}

fn apply_predicate<D: DocumentAccess>(
    doc: &D,
    nodes: Vec<NodeId>,
    predicate: &Predicate,
) -> Result<Vec<NodeId>, String> {
    match predicate {
        Predicate::Position(pos) => Ok(pos
            .checked_sub(1)
            .and_then(|i| nodes.get(i))
            .copied()
            .into_iter()
            .collect()),
        Predicate::AttrEq(name, value) => Ok(nodes
            .into_iter()
            .filter(|&n| doc.get_attribute(n, name) == Some(value.as_str()))
            .collect()),
        Predicate::Expr(expr) => {
            let size = nodes.len();
            let mut kept = Vec::new();
            for (i, &node) in nodes.iter().enumerate() {
                let inner = EvalContext {
                    doc,
                    context_node: node,
                    context_position: i + 1,
                    context_size: size,
                };
                let keep = match evaluate_compiled(expr, &inner)? {
                    XPathValue::Number(n) => n == (i + 1) as f64,
                    other => other.to_boolean(),
                };
                if keep {
                    kept.push(node);
                }
            }
            Ok(kept)
        }
    }
}

/// Attribute selections become strings: none, one, or a list
fn attribute_values<D: DocumentAccess>(
    doc: &D,
    nodes: &[NodeId],
    node_test: &CompiledNodeTest,
) -> XPathValue {
    let mut values: Vec<String> = Vec::new();
    for &node in nodes {
        match node_test {
            CompiledNodeTest::Any | CompiledNodeTest::Node => values.extend(
                doc.get_attribute_values(node)
                    .into_iter()
                    .map(|(_, v)| v.to_string()),
            ),
            CompiledNodeTest::Name(name) => {
                values.extend(doc.get_attribute(node, name).map(str::to_string))
            }
            CompiledNodeTest::QName(prefix, local) => values.extend(
                doc.get_attribute(node, &format!("{}:{}", prefix, local))
                    .map(str::to_string),
            ),
            _ => {}
        }
    }

    if values.len() > 1 {
        XPathValue::StringList(values)
    } else {
        values
            .pop()
            .map_or_else(XPathValue::empty_nodeset, XPathValue::String)
    }
}

/// Sort nodes into document order
///
/// Each node is keyed by its path of sibling indices from the top of its
/// tree. Only the sibling lists along those paths are read, so the cost
/// follows the nodes being sorted rather than the size of the document.
pub(crate) fn sort_document_order<D: DocumentAccess>(doc: &D, nodes: &mut [NodeId]) {
    if nodes.len() < 2 {
        return;
    }
    let mut sibling_index = HashMap::new();
    nodes.sort_by_cached_key(|&id| order_key(doc, id, &mut sibling_index));
}

/// Removed nodes sort last
fn order_key<D: DocumentAccess>(
    doc: &D,
    id: NodeId,
    sibling_index: &mut HashMap<NodeId, usize>,
) -> Vec<usize> {
    if doc.get_node(id).is_none() {
        return vec![usize::MAX];
    }
    let mut path = Vec::new();
    let mut current = id;
    while let Some(parent) = doc.parent_of(current) {
        if !sibling_index.contains_key(&current) {
            for (index, child) in doc.children_vec(parent).into_iter().enumerate() {
                sibling_index.insert(child, index);
            }
        }
        path.push(sibling_index.get(&current).copied().unwrap_or(usize::MAX));
        current = parent;
    }
    path.reverse();
    path
}

/// string() of a value, resolving node sets through the document
pub(crate) fn string_of<D: DocumentAccess>(doc: &D, value: &XPathValue) -> String {
    match value {
        XPathValue::NodeSet(nodes) => nodes
            .first()
            .map(|&n| node_string_value(doc, n))
            .unwrap_or_default(),
        other => other.to_string_value(),
    }
}

/// number() of a value, resolving node sets through the document
pub(crate) fn number_of<D: DocumentAccess>(doc: &D, value: &XPathValue) -> f64 {
    match value {
        XPathValue::NodeSet(_) => parse_number(&string_of(doc, value)),
        other => other.to_number(),
    }
}

fn binary<D: DocumentAccess>(
    doc: &D,
    op: BinaryOp,
    left: &XPathValue,
    right: &XPathValue,
) -> XPathValue {
    let arith = |f: fn(f64, f64) -> f64| {
        XPathValue::Number(f(number_of(doc, left), number_of(doc, right)))
    };
    match op {
        BinaryOp::Or => XPathValue::Boolean(left.to_boolean() || right.to_boolean()),
        BinaryOp::And => XPathValue::Boolean(left.to_boolean() && right.to_boolean()),
        BinaryOp::Eq => XPathValue::Boolean(equals(doc, left, right, false)),
        BinaryOp::NotEq => XPathValue::Boolean(equals(doc, left, right, true)),
        BinaryOp::Lt => XPathValue::Boolean(relate(doc, left, right, |a, b| a < b)),
        BinaryOp::LtEq => XPathValue::Boolean(relate(doc, left, right, |a, b| a <= b)),
        BinaryOp::Gt => XPathValue::Boolean(relate(doc, left, right, |a, b| a > b)),
        BinaryOp::GtEq => XPathValue::Boolean(relate(doc, left, right, |a, b| a >= b)),
        BinaryOp::Add => arith(|a, b| a + b),
        BinaryOp::Sub => arith(|a, b| a - b),
        BinaryOp::Mul => arith(|a, b| a * b),
        BinaryOp::Div => arith(|a, b| a / b),
        BinaryOp::Mod => arith(|a, b| a % b),
    }
}

/// `=` and `!=`: node sets compare existentially, each side converted to the
/// other side's type
fn equals<D: DocumentAccess>(doc: &D, left: &XPathValue, right: &XPathValue, negate: bool) -> bool {
    use XPathValue as V;
    let holds = |equal: bool| equal != negate;

    match (left, right) {
        (V::NodeSet(l), V::NodeSet(r)) => {
            let rs: Vec<String> = r.iter().map(|&n| node_string_value(doc, n)).collect();
            l.iter().any(|&n| {
                let ls = node_string_value(doc, n);
                rs.iter().any(|s| holds(*s == ls))
            })
        }
        (V::NodeSet(nodes), V::Boolean(b)) | (V::Boolean(b), V::NodeSet(nodes)) => {
            holds(!nodes.is_empty() == *b)
        }
        (V::NodeSet(nodes), V::Number(x)) | (V::Number(x), V::NodeSet(nodes)) => nodes
            .iter()
            .any(|&n| holds(parse_number(&node_string_value(doc, n)) == *x)),
        (V::NodeSet(nodes), other) | (other, V::NodeSet(nodes)) => {
            let s = other.to_string_value();
            nodes.iter().any(|&n| holds(node_string_value(doc, n) == s))
        }
        (V::Boolean(_), _) | (_, V::Boolean(_)) => holds(left.to_boolean() == right.to_boolean()),
        (V::Number(_), _) | (_, V::Number(_)) => holds(left.to_number() == right.to_number()),
        (V::StringList(values), other) | (other, V::StringList(values)) => {
            let s = other.to_string_value();
            values.iter().any(|v| holds(*v == s))
        }
        (V::String(l), V::String(r)) => holds(l == r),
    }
}

/// `<`, `<=`, `>`, `>=`: numeric, existential over node sets and string lists
fn relate<D: DocumentAccess>(
    doc: &D,
    left: &XPathValue,
    right: &XPathValue,
    cmp: fn(f64, f64) -> bool,
) -> bool {
    let numbers = |value: &XPathValue| -> Vec<f64> {
        match value {
            XPathValue::NodeSet(nodes) => nodes
                .iter()
                .map(|&n| parse_number(&node_string_value(doc, n)))
                .collect(),
            XPathValue::StringList(values) => values.iter().map(|s| parse_number(s)).collect(),
            other => vec![other.to_number()],
        }
    };
    let rs = numbers(right);
    numbers(left)
        .into_iter()
        .any(|a| rs.iter().any(|&b| cmp(a, b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{XmlDocumentView, XmlTree};
    use pretty_assertions::assert_eq;

    /// <obj><int name="a" val="1"/><int name="b" val="2"/><str name="s">hi</str></obj>
    fn sample() -> (XmlTree, NodeId) {
        let mut tree = XmlTree::new();
        let doc = tree.new_document("1.0");
        let obj = tree.new_element("obj");
        tree.set_root_element(doc, obj).unwrap();
        for (name, val) in [("a", "1"), ("b", "2")] {
            let int = tree.append_element(obj, "int").unwrap();
            tree.set_attribute(int, "name", name).unwrap();
            tree.set_attribute(int, "val", val).unwrap();
        }
        let s = tree.append_element(obj, "str").unwrap();
        tree.set_attribute(s, "name", "s").unwrap();
        tree.append_text(s, "hi").unwrap();
        (tree, doc)
    }

    fn nodes(result: XPathValue) -> Vec<NodeId> {
        result.as_nodeset().unwrap().to_vec()
    }

    #[test]
    fn test_simple_path() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        assert_eq!(nodes(evaluate(&view, "/obj/int").unwrap()).len(), 2);
        assert_eq!(nodes(evaluate(&view, "/").unwrap()), vec![doc]);
    }

    #[test]
    fn test_descendant() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        let result = nodes(evaluate(&view, "//str").unwrap());
        assert_eq!(result.len(), 1);
        assert_eq!(tree.name(result[0]), Some("str"));
    }

    #[test]
    fn test_relative_from_context() {
        let (tree, doc) = sample();
        let obj = tree.root_element(doc).unwrap();
        let view = XmlDocumentView::new(&tree, doc);
        assert_eq!(nodes(evaluate_from_node(&view, obj, "int").unwrap()).len(), 2);
        assert_eq!(nodes(evaluate_from_node(&view, obj, ".").unwrap()), vec![obj]);
    }

    #[test]
    fn test_predicates() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        let second = nodes(evaluate(&view, "/obj/*[2]").unwrap());
        assert_eq!(tree.attribute(second[0], "name"), Some("b"));

        let by_attr = nodes(evaluate(&view, "//int[@name='b']").unwrap());
        assert_eq!(by_attr, second);

        let general = nodes(evaluate(&view, "//int[@val > 1]").unwrap());
        assert_eq!(general, second);

        let last = nodes(evaluate(&view, "/obj/*[position() = last()]").unwrap());
        assert_eq!(tree.name(last[0]), Some("str"));
    }

    #[test]
    fn test_positional_predicate_per_parent() {
        let mut tree = XmlTree::new();
        let doc = tree.new_document("1.0");
        let root = tree.new_element("root");
        tree.set_root_element(doc, root).unwrap();
        for _ in 0..2 {
            let group = tree.append_element(root, "group").unwrap();
            tree.append_element(group, "item").unwrap();
            tree.append_element(group, "item").unwrap();
        }
        let view = XmlDocumentView::new(&tree, doc);
        assert_eq!(nodes(evaluate(&view, "//group/item[1]").unwrap()).len(), 2);
        assert_eq!(nodes(evaluate(&view, "(//group/item)[1]").unwrap()).len(), 1);
    }

    #[test]
    fn test_attribute_values() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        assert_eq!(
            evaluate(&view, "/obj/int[1]/@val").unwrap(),
            XPathValue::String("1".to_string())
        );
        assert_eq!(
            evaluate(&view, "/obj/int/@name").unwrap(),
            XPathValue::StringList(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(evaluate(&view, "/obj/@missing").unwrap(), XPathValue::empty_nodeset());
    }

    #[test]
    fn test_union_in_document_order() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        let result = nodes(evaluate(&view, "//str | //int").unwrap());
        let names: Vec<_> = result.iter().map(|&n| tree.name(n).unwrap()).collect();
        assert_eq!(names, vec!["int", "int", "str"]);
    }

    #[test]
    fn test_comparisons_and_arithmetic() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        assert_eq!(evaluate(&view, "count(/obj/*)").unwrap().to_number(), 3.0);
        assert!(evaluate(&view, "//str = 'hi'").unwrap().to_boolean());
        assert!(evaluate(&view, "//str != 'bye'").unwrap().to_boolean());
        assert_eq!(evaluate(&view, "1 + 2 * 3").unwrap().to_number(), 7.0);
        assert_eq!(evaluate(&view, "-(7 mod 4)").unwrap().to_number(), -3.0);
        assert_eq!(evaluate(&view, "10 div 4").unwrap().to_number(), 2.5);
    }

    #[test]
    fn test_errors() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        assert!(evaluate(&view, "$undefined").is_err());
        assert!(evaluate(&view, "1 | 2").is_err());
        assert!(evaluate(&view, "nosuch()").is_err());
        assert!(evaluate(&view, "/obj[").is_err());
    }

    #[test]
    fn test_empty_program_yields_empty_nodeset() {
        let (tree, doc) = sample();
        let view = XmlDocumentView::new(&tree, doc);
        let expr = CompiledExpr { ops: Vec::new() };
        let result = evaluate_compiled(&expr, &EvalContext::new(&view, doc)).unwrap();
        assert_eq!(result, XPathValue::empty_nodeset());
    }

    #[test]
    fn test_document_order_ignores_id_order() {
        let mut tree = XmlTree::new();
        let doc = tree.new_document("1.0");
        let obj = tree.new_element("obj");
        tree.set_root_element(doc, obj).unwrap();
        let first = tree.append_element(obj, "first").unwrap();
        let inner = tree.append_element(first, "inner").unwrap();
        let second = tree.append_element(obj, "second").unwrap();
        // move `first` behind `second`; ids no longer follow document order
        tree.detach(first).unwrap();
        tree.append_child(obj, first).unwrap();

        let view = XmlDocumentView::new(&tree, doc);
        let result = nodes(evaluate(&view, "//inner | //second | //first").unwrap());
        assert_eq!(result, vec![second, first, inner]);

        let mut with_dead = vec![inner, 9_999, obj, doc];
        sort_document_order(&view, &mut with_dead);
        assert_eq!(with_dead, vec![doc, obj, inner, 9_999]);
    }
}
