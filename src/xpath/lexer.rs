//! XPath Lexer
//!
//! Splits an expression into tokens. Malformed input (an unterminated literal,
//! a stray character) is an error rather than a token the parser trips over
//! later.

/// XPath token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Operators
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Plus,        // +
    Minus,       // -
    Star,        // * (name test or multiply, the parser decides)
    Eq,          // =
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    And,         // and
    Or,          // or
    Mod,         // mod
    Div,         // div

    // Brackets
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Comma,        // ,

    // Literals
    Number(f64),
    String(String),

    // Names
    Name(String),         // NCName used as a name test
    NameTest(String),     // prefix:* or prefix:local
    NodeType(String),     // node, text, comment, processing-instruction
    FunctionName(String), // name directly followed by (
    Axis(String),         // axis name, the trailing :: already consumed
    Variable(String),     // $name
}

impl Token {
    /// Whether a following `*` or operator name must be read as an operator
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Name(_)
                | Token::NameTest(_)
                | Token::Number(_)
                | Token::String(_)
                | Token::Variable(_)
                | Token::RightParen
                | Token::RightBracket
                | Token::Dot
                | Token::DoubleDot
                | Token::Star
        )
    }
}

/// XPath lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    /// Tokenize the whole input
    pub fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            let after_operand = tokens.last().is_some_and(Token::ends_operand);
            match self.next_token(after_operand)? {
                Some(token) => tokens.push(token),
                None => return Ok(tokens),
            }
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.input[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    /// Next token, or `None` at end of input
    fn next_token(&mut self, after_operand: bool) -> Result<Option<Token>, String> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' | '\'' => self.string_literal(c)?,
            '0'..='9' => self.number()?,
            '.' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => self.number()?,
            '$' => {
                self.bump();
                let name = self.take_while(is_name_char);
                if name.is_empty() {
                    return Err("expected variable name after '$'".to_string());
                }
                Token::Variable(name.to_string())
            }
            c if is_name_start_char(c) => self.name(after_operand)?,
            _ => self.symbol(c)?,
        };
        Ok(Some(token))
    }

    fn symbol(&mut self, c: char) -> Result<Token, String> {
        let offset = self.pos;
        self.bump();
        let token = match c {
            '/' if self.eat('/') => Token::DoubleSlash,
            '/' => Token::Slash,
            '.' if self.eat('.') => Token::DoubleDot,
            '.' => Token::Dot,
            '<' if self.eat('=') => Token::LtEq,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::GtEq,
            '>' => Token::Gt,
            '!' if self.eat('=') => Token::NotEq,
            '@' => Token::At,
            '|' => Token::Pipe,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '=' => Token::Eq,
            ',' => Token::Comma,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            other => return Err(format!("unexpected character '{}' at offset {}", other, offset)),
        };
        Ok(token)
    }

    fn number(&mut self) -> Result<Token, String> {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_second() != Some('.') {
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        let literal = &self.input[start..self.pos];
        literal
            .parse()
            .map(Token::Number)
            .map_err(|_| format!("invalid number literal '{}'", literal))
    }

    fn string_literal(&mut self, quote: char) -> Result<Token, String> {
        let offset = self.pos;
        self.bump();
        let body = self.take_while(|c| c != quote);
        if !self.eat(quote) {
            return Err(format!("unterminated string literal at offset {}", offset));
        }
        Ok(Token::String(body.to_string()))
    }

    fn name(&mut self, after_operand: bool) -> Result<Token, String> {
        let name = self.take_while(is_name_char);

        if after_operand {
            match name {
                "and" => return Ok(Token::And),
                "or" => return Ok(Token::Or),
                "mod" => return Ok(Token::Mod),
                "div" => return Ok(Token::Div),
                _ => {}
            }
        }

        let lookahead = self.rest().trim_start();
        if lookahead.starts_with("::") {
            self.skip_whitespace();
            self.pos += 2;
            return Ok(Token::Axis(name.to_string()));
        }
        if lookahead.starts_with('(') {
            return Ok(match name {
                "node" | "text" | "comment" | "processing-instruction" => {
                    Token::NodeType(name.to_string())
                }
                _ => Token::FunctionName(name.to_string()),
            });
        }

        // prefix:local or prefix:* (no whitespace allowed around the colon)
        if self.peek() == Some(':') && self.peek_second() != Some(':') {
            self.bump();
            if self.eat('*') {
                return Ok(Token::NameTest(format!("{}:*", name)));
            }
            let local = self.take_while(is_name_char);
            if local.is_empty() {
                return Err(format!("expected local name after '{}:'", name));
            }
            return Ok(Token::NameTest(format!("{}:{}", name, local)));
        }

        Ok(Token::Name(name.to_string()))
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    fn name(s: &str) -> Token {
        Token::Name(s.to_string())
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            lex("/root/child"),
            vec![Token::Slash, name("root"), Token::Slash, name("child")]
        );
    }

    #[test]
    fn test_descendant() {
        assert_eq!(lex("//item"), vec![Token::DoubleSlash, name("item")]);
    }

    #[test]
    fn test_predicate() {
        assert_eq!(
            lex("int[@name='count']"),
            vec![
                name("int"),
                Token::LeftBracket,
                Token::At,
                name("name"),
                Token::Eq,
                Token::String("count".to_string()),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_axis_consumes_double_colon() {
        assert_eq!(
            lex("ancestor-or-self :: obj"),
            vec![Token::Axis("ancestor-or-self".to_string()), name("obj")]
        );
    }

    #[test]
    fn test_operator_names_only_after_operand() {
        assert_eq!(lex("and"), vec![name("and")]);
        assert_eq!(
            lex("a and b"),
            vec![name("a"), Token::And, name("b")]
        );
        assert_eq!(
            lex("6 div 2"),
            vec![Token::Number(6.0), Token::Div, Token::Number(2.0)]
        );
    }

    #[test]
    fn test_function_and_node_type() {
        assert_eq!(
            lex("count(text())"),
            vec![
                Token::FunctionName("count".to_string()),
                Token::LeftParen,
                Token::NodeType("text".to_string()),
                Token::LeftParen,
                Token::RightParen,
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("1.5"), vec![Token::Number(1.5)]);
        assert_eq!(lex(".5"), vec![Token::Number(0.5)]);
        assert_eq!(lex("position() = 1").last(), Some(&Token::Number(1.0)));
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(lex("ns:item"), vec![Token::NameTest("ns:item".to_string())]);
        assert_eq!(lex("ns:*"), vec![Token::NameTest("ns:*".to_string())]);
    }

    #[test]
    fn test_variable() {
        assert_eq!(lex("$limit"), vec![Token::Variable("limit".to_string())]);
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("a ! b").tokenize().is_err());
        assert!(Lexer::new("a # b").tokenize().is_err());
        assert!(Lexer::new("$").tokenize().is_err());
    }
}
