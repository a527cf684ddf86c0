//! XPath Parser
//!
//! Recursive descent parser for XPath 1.0 expressions. Binary operators are
//! parsed by precedence level, lowest (`or`) first.

use super::lexer::{Lexer, Token};

/// XPath expression AST node
#[derive(Debug, Clone)]
pub enum Expr {
    /// Root path (/)
    Root,
    /// Union of two expressions (|)
    Union(Box<Expr>, Box<Expr>),
    /// Path expression (expr/step)
    Path(Box<Expr>, Box<Step>),
    /// Filter expression with predicate
    Filter(Box<Expr>, Box<Expr>),
    /// Function call
    Function(String, Vec<Expr>),
    /// Binary operation
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    /// Unary negation
    Negate(Box<Expr>),
    /// Literal number
    Number(f64),
    /// Literal string
    String(String),
    /// Variable reference
    Variable(String),
    /// Location step relative to the context node
    Step(Box<Step>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Location step in a path
#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// `axis::node()` without predicates (`.`, `..` and the `//` expansion)
    fn any_node(axis: Axis) -> Self {
        Step {
            axis,
            node_test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

/// XPath axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Self_,
    Attribute,
    Namespace,
}

impl Axis {
    pub fn from_name(s: &str) -> Option<Self> {
        let axis = match s {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "self" => Axis::Self_,
            "attribute" => Axis::Attribute,
            "namespace" => Axis::Namespace,
            _ => return None,
        };
        Some(axis)
    }
}

/// Node test in a location step
#[derive(Debug, Clone)]
pub enum NodeTest {
    /// Matches any element (*)
    Any,
    /// Matches elements with name
    Name(String),
    /// Matches prefix:localname
    QName(String, String),
    /// Matches prefix:*
    NamespaceWildcard(String),
    /// node() - matches any node
    Node,
    /// text() - matches text nodes
    Text,
    /// comment() - matches comments
    Comment,
    /// processing-instruction() - matches PIs
    ProcessingInstruction(Option<String>),
}

/// Operator recognised at a precedence level
fn binary_op(level: usize, token: &Token) -> Option<BinaryOp> {
    let op = match (level, token) {
        (0, Token::Or) => BinaryOp::Or,
        (1, Token::And) => BinaryOp::And,
        (2, Token::Eq) => BinaryOp::Eq,
        (2, Token::NotEq) => BinaryOp::NotEq,
        (3, Token::Lt) => BinaryOp::Lt,
        (3, Token::LtEq) => BinaryOp::LtEq,
        (3, Token::Gt) => BinaryOp::Gt,
        (3, Token::GtEq) => BinaryOp::GtEq,
        (4, Token::Plus) => BinaryOp::Add,
        (4, Token::Minus) => BinaryOp::Sub,
        (5, Token::Star) => BinaryOp::Mul,
        (5, Token::Div) => BinaryOp::Div,
        (5, Token::Mod) => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

/// First level below the binary operators
const UNARY_LEVEL: usize = 6;

/// XPath parser over a pre-lexed token stream
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, String> {
        Ok(Parser {
            tokens: Lexer::new(input).tokenize()?,
            pos: 0,
        })
    }

    /// Parse a complete expression; trailing tokens are an error
    pub fn parse(&mut self) -> Result<Expr, String> {
        if self.tokens.is_empty() {
            return Err("empty expression".to_string());
        }
        let expr = self.parse_expr()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(format!("unexpected {:?} after expression", token)),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(format!("expected {:?}, found {:?}", expected, self.peek()))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, String> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, String> {
        if level == UNARY_LEVEL {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = self.peek().and_then(|t| binary_op(level, t)) {
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        let mut left = self.parse_path()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Name(_)
                    | Token::NameTest(_)
                    | Token::NodeType(_)
                    | Token::Star
                    | Token::At
                    | Token::Axis(_)
                    | Token::Dot
                    | Token::DoubleDot
            )
        )
    }

    fn parse_path(&mut self) -> Result<Expr, String> {
        let head = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.starts_step() {
                    return Ok(Expr::Root);
                }
                Expr::Path(Box::new(Expr::Root), Box::new(self.parse_step()?))
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let step = self.parse_step()?;
                descend(Expr::Root, step)
            }
            _ if self.starts_step() => Expr::Step(Box::new(self.parse_step()?)),
            _ => self.parse_filter()?,
        };
        self.parse_trailing_steps(head)
    }

    fn parse_trailing_steps(&mut self, mut expr: Expr) -> Result<Expr, String> {
        loop {
            expr = match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    Expr::Path(Box::new(expr), Box::new(self.parse_step()?))
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    let step = self.parse_step()?;
                    descend(expr, step)
                }
                _ => return Ok(expr),
            };
        }
    }

    fn parse_filter(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::LeftBracket) {
            let pred = self.parse_expr()?;
            self.expect(Token::RightBracket)?;
            expr = Expr::Filter(Box::new(expr), Box::new(pred));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let token = self
            .bump()
            .ok_or("unexpected end of expression")?;
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::String(s) => Ok(Expr::String(s)),
            Token::Variable(name) => Ok(Expr::Variable(name)),
            Token::LeftParen => {
                let expr = self.parse_expr()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            Token::FunctionName(name) => {
                self.expect(Token::LeftParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RightParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&Token::RightParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Ok(Expr::Function(name, args))
            }
            other => Err(format!("unexpected {:?}", other)),
        }
    }

    fn parse_step(&mut self) -> Result<Step, String> {
        if self.eat(&Token::Dot) {
            return Ok(Step::any_node(Axis::Self_));
        }
        if self.eat(&Token::DoubleDot) {
            return Ok(Step::any_node(Axis::Parent));
        }

        let axis = match self.peek() {
            Some(Token::At) => Axis::Attribute,
            Some(Token::Axis(name)) => {
                Axis::from_name(name).ok_or_else(|| format!("unknown axis '{}'", name))?
            }
            _ => Axis::Child,
        };
        if matches!(self.peek(), Some(Token::At | Token::Axis(_))) {
            self.pos += 1;
        }

        let node_test = self.parse_node_test()?;
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(Token::RightBracket)?;
        }

        Ok(Step {
            axis,
            node_test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, String> {
        let token = self
            .bump()
            .ok_or("expected node test at end of expression")?;
        match token {
            Token::Star => Ok(NodeTest::Any),
            Token::Name(name) => Ok(NodeTest::Name(name)),
            Token::NameTest(qname) => Ok(match qname.split_once(':') {
                Some((prefix, "*")) => NodeTest::NamespaceWildcard(prefix.to_string()),
                Some((prefix, local)) => NodeTest::QName(prefix.to_string(), local.to_string()),
                None => NodeTest::Name(qname),
            }),
            Token::NodeType(kind) => {
                self.expect(Token::LeftParen)?;
                let target = match self.peek() {
                    Some(Token::String(s)) => Some(s.clone()),
                    _ => None,
                };
                if target.is_some() {
                    self.pos += 1;
                }
                self.expect(Token::RightParen)?;
                Ok(match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::ProcessingInstruction(target),
                })
            }
            other => Err(format!("expected node test, found {:?}", other)),
        }
    }
}

/// `base//step` is shorthand for `base/descendant-or-self::node()/step`
fn descend(base: Expr, step: Step) -> Expr {
    let all = Expr::Path(Box::new(base), Box::new(Step::any_node(Axis::DescendantOrSelf)));
    Expr::Path(Box::new(all), Box::new(step))
}

/// Parse an XPath expression string
pub fn parse(input: &str) -> Result<Expr, String> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path() {
        let expr = parse("/root/child").unwrap();
        assert!(matches!(expr, Expr::Path(..)));
    }

    #[test]
    fn test_lone_root() {
        assert!(matches!(parse("/").unwrap(), Expr::Root));
    }

    #[test]
    fn test_step_with_predicate() {
        match parse("item[@id='test']").unwrap() {
            Expr::Step(step) => {
                assert_eq!(step.axis, Axis::Child);
                assert_eq!(step.predicates.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_context_dot() {
        match parse(".").unwrap() {
            Expr::Step(step) => assert_eq!(step.axis, Axis::Self_),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_descendant_expands() {
        match parse("//item").unwrap() {
            Expr::Path(base, step) => {
                assert!(matches!(step.node_test, NodeTest::Name(ref n) if n == "item"));
                assert!(matches!(*base, Expr::Path(_, ref s) if s.axis == Axis::DescendantOrSelf));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function() {
        let expr = parse("count(//item)").unwrap();
        assert!(matches!(expr, Expr::Function(name, args) if name == "count" && args.len() == 1));
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        match parse("1 + 2 * 3").unwrap() {
            Expr::Binary(_, BinaryOp::Add, rhs) => {
                assert!(matches!(*rhs, Expr::Binary(_, BinaryOp::Mul, _)))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_union_and_filter() {
        assert!(matches!(parse("a | b").unwrap(), Expr::Union(..)));
        assert!(matches!(parse("(//a)[1]").unwrap(), Expr::Filter(..)));
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("/root/").is_err());
        assert!(parse("a[").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("bogus::a").is_err());
        assert!(parse("count(a").is_err());
    }
}
