//! XPath Expression Compiler
//!
//! Flattens the AST into a postfix op list for the stack evaluator. Two
//! common predicate shapes get dedicated ops: `[n]` and `[@attr = 'value']`.

use super::parser::{Axis, BinaryOp, Expr, NodeTest, Step};

/// Compiled XPath expression
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub ops: Vec<Op>,
}

/// Compiled operation
#[derive(Debug, Clone)]
pub enum Op {
    /// Push the document node
    Root,
    /// Push the context node
    Context,
    /// Replace the node set on top of the stack by a location step applied to
    /// each of its nodes; predicates see each context node's candidates in
    /// axis order
    Step(Axis, CompiledNodeTest, Vec<Predicate>),
    /// Filter the node set on top of the stack in document order
    Filter(Predicate),
    /// Union two node sets
    Union,
    /// Push literal number
    Number(f64),
    /// Push literal string
    String(String),
    /// Call function (name, arg count)
    Call(String, usize),
    Binary(BinaryOp),
    Negate,
    Variable(String),
}

/// Compiled predicate
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `[n]`
    Position(usize),
    /// `[@name = 'value']`
    AttrEq(String, String),
    /// Anything else
    Expr(Box<CompiledExpr>),
}

/// Compiled node test
#[derive(Debug, Clone)]
pub enum CompiledNodeTest {
    Any,
    Name(String),
    QName(String, String),
    NamespaceWildcard(String),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}

impl From<&NodeTest> for CompiledNodeTest {
    fn from(test: &NodeTest) -> Self {
        match test {
            NodeTest::Any => CompiledNodeTest::Any,
            NodeTest::Name(n) => CompiledNodeTest::Name(n.clone()),
            NodeTest::QName(prefix, local) => CompiledNodeTest::QName(prefix.clone(), local.clone()),
            NodeTest::NamespaceWildcard(prefix) => CompiledNodeTest::NamespaceWildcard(prefix.clone()),
            NodeTest::Node => CompiledNodeTest::Node,
            NodeTest::Text => CompiledNodeTest::Text,
            NodeTest::Comment => CompiledNodeTest::Comment,
            NodeTest::ProcessingInstruction(target) => {
                CompiledNodeTest::ProcessingInstruction(target.clone())
            }
        }
    }
}

impl CompiledExpr {
    /// Compile a parsed expression
    pub fn compile(expr: &Expr) -> Self {
        let mut ops = Vec::new();
        emit(expr, &mut ops);
        CompiledExpr { ops }
    }
}

fn emit(expr: &Expr, ops: &mut Vec<Op>) {
    match expr {
        Expr::Root => ops.push(Op::Root),
        Expr::Number(n) => ops.push(Op::Number(*n)),
        Expr::String(s) => ops.push(Op::String(s.clone())),
        Expr::Variable(name) => ops.push(Op::Variable(name.clone())),
        Expr::Negate(inner) => {
            emit(inner, ops);
            ops.push(Op::Negate);
        }
        Expr::Binary(left, op, right) => {
            emit(left, ops);
            emit(right, ops);
            ops.push(Op::Binary(*op));
        }
        Expr::Union(left, right) => {
            emit(left, ops);
            emit(right, ops);
            ops.push(Op::Union);
        }
        Expr::Path(base, step) => {
            emit(base, ops);
            ops.push(step_op(step));
        }
        Expr::Filter(base, pred) => {
            emit(base, ops);
            ops.push(Op::Filter(compile_predicate(pred)));
        }
        Expr::Step(step) => {
            ops.push(Op::Context);
            ops.push(step_op(step));
        }
        Expr::Function(name, args) => {
            for arg in args {
                emit(arg, ops);
            }
            ops.push(Op::Call(name.clone(), args.len()));
        }
    }
}

fn step_op(step: &Step) -> Op {
    let predicates = step.predicates.iter().map(compile_predicate).collect();
    Op::Step(step.axis, (&step.node_test).into(), predicates)
}

fn compile_predicate(pred: &Expr) -> Predicate {
    match pred {
        Expr::Number(n) if *n >= 1.0 && n.fract() == 0.0 => Predicate::Position(*n as usize),
        Expr::Binary(lhs, BinaryOp::Eq, rhs) => attr_eq(lhs, rhs)
            .unwrap_or_else(|| Predicate::Expr(Box::new(CompiledExpr::compile(pred)))),
        _ => Predicate::Expr(Box::new(CompiledExpr::compile(pred))),
    }
}

/// Match `@name = 'value'` in either operand order
fn attr_eq(lhs: &Expr, rhs: &Expr) -> Option<Predicate> {
    let (step, value) = match (lhs, rhs) {
        (Expr::Step(step), Expr::String(value)) | (Expr::String(value), Expr::Step(step)) => {
            (step, value)
        }
        _ => return None,
    };
    match &step.node_test {
        NodeTest::Name(name) if step.axis == Axis::Attribute && step.predicates.is_empty() => {
            Some(Predicate::AttrEq(name.clone(), value.clone()))
        }
        _ => None,
    }
}

/// Compile an XPath expression string
pub fn compile(xpath: &str) -> Result<CompiledExpr, String> {
    let expr = super::parser::parse(xpath)?;
    Ok(CompiledExpr::compile(&expr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple() {
        let compiled = compile("/root").unwrap();
        assert!(matches!(compiled.ops[0], Op::Root));
        assert!(matches!(compiled.ops[1], Op::Step(Axis::Child, CompiledNodeTest::Name(ref n), _) if n == "root"));
    }

    #[test]
    fn test_position_fast_path() {
        let compiled = compile("int[2]").unwrap();
        match &compiled.ops[1] {
            Op::Step(_, _, preds) => assert!(matches!(preds[..], [Predicate::Position(2)])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_attr_eq_fast_path_either_order() {
        for pattern in ["int[@name='count']", "int['count' = @name]"] {
            let compiled = compile(pattern).unwrap();
            match &compiled.ops[1] {
                Op::Step(_, _, preds) => assert!(
                    matches!(&preds[..], [Predicate::AttrEq(n, v)] if n == "name" && v == "count")
                ),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_general_predicate() {
        let compiled = compile("int[@val > 3]").unwrap();
        match &compiled.ops[1] {
            Op::Step(_, _, preds) => assert!(matches!(preds[..], [Predicate::Expr(_)])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compile_error() {
        assert!(compile("//").is_err());
    }
}
