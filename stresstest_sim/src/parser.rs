//! Parser for the block/attribute configuration subset.
//!
//! Covers exactly what the generator renders plus a little slack: blocks
//! with string labels, attributes, string/number/bool/null literals,
//! traversals (`.attr`, `["key"]`, `[0]`), function calls, object and
//! tuple constructors, and `%`. Template interpolation is rejected; only
//! its escaped forms (`$${`, `%%{`) are understood.

use std::collections::BTreeMap;
use stresstest_env::Value;
use thiserror::Error;

/// A syntax error with the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Value),
    /// A bare identifier (`var`, `module`, ...), only meaningful as the
    /// root of a traversal
    Scope(String),
    Traversal(Box<Expr>, Vec<Traverser>),
    Call(String, Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Tuple(Vec<Expr>),
    Modulo(Box<Expr>, Box<Expr>),
}

/// One step of a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Traverser {
    Attr(String),
    Index(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub expr: Expr,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: String,
    pub labels: Vec<String>,
    pub body: Body,
    pub line: usize,
}

/// Attributes by name and nested blocks in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub attributes: BTreeMap<String, Attribute>,
    pub blocks: Vec<Block>,
}

/// Parses one configuration file.
pub fn parse(src: &str) -> Result<Body, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_body(true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Number(i64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Equals,
    Dot,
    Comma,
    Percent,
    Newline,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier {:?}", name),
            Token::Str(_) => "string literal".to_string(),
            Token::Number(n) => format!("number {}", n),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::Newline => "newline".to_string(),
            Token::Eof => "end of file".to_string(),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let single = match c {
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '=' => Some(Token::Equals),
            '.' => Some(Token::Dot),
            ',' => Some(Token::Comma),
            '%' => Some(Token::Percent),
            _ => None,
        };
        if let Some(tok) = single {
            tokens.push((tok, line));
            i += 1;
            continue;
        }

        match c {
            ' ' | '\t' | '\r' => i += 1,
            '\n' => {
                tokens.push((Token::Newline, line));
                line += 1;
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' => {
                let s = lex_string(&chars, &mut i, line)?;
                tokens.push((Token::Str(s), line));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|_| ParseError::new(line, format!("number {} out of range", text)))?;
                tokens.push((Token::Number(n), line));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                {
                    i += 1;
                }
                tokens.push((Token::Ident(chars[start..i].iter().collect()), line));
            }
            other => {
                return Err(ParseError::new(
                    line,
                    format!("unexpected character {:?}", other),
                ))
            }
        }
    }

    tokens.push((Token::Eof, line));
    Ok(tokens)
}

/// Lexes a quoted string starting at `chars[*i] == '"'`, leaving `*i` just
/// past the closing quote.
fn lex_string(chars: &[char], i: &mut usize, line: usize) -> Result<String, ParseError> {
    let mut out = String::new();
    *i += 1;

    loop {
        let c = *chars
            .get(*i)
            .ok_or_else(|| ParseError::new(line, "unterminated string literal"))?;

        match c {
            '"' => {
                *i += 1;
                return Ok(out);
            }
            '\n' => return Err(ParseError::new(line, "newline in string literal")),
            '\\' => {
                let escaped = match chars.get(*i + 1) {
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('"') => '"',
                    Some('\\') => '\\',
                    other => {
                        return Err(ParseError::new(
                            line,
                            format!("invalid escape sequence \\{}", other.copied().unwrap_or(' ')),
                        ))
                    }
                };
                out.push(escaped);
                *i += 2;
            }
            '$' | '%' => {
                let next = chars.get(*i + 1).copied();
                let after = chars.get(*i + 2).copied();
                if next == Some('{') {
                    return Err(ParseError::new(
                        line,
                        format!("template sequence {}{{ is not supported", c),
                    ));
                }
                if next == Some(c) && after == Some('{') {
                    out.push(c);
                    out.push('{');
                    *i += 3;
                } else {
                    out.push(c);
                    *i += 1;
                }
            }
            c => {
                out.push(c);
                *i += 1;
            }
        }
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn next(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(
            self.line(),
            format!("expected {}, found {}", expected, self.peek().describe()),
        )
    }

    fn expect(&mut self, tok: Token, expected: &str) -> Result<(), ParseError> {
        if *self.peek() == tok {
            self.next();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == Token::Newline {
            self.next();
        }
    }

    fn ident(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.next();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// An item ends at a newline, at end of file, or right before the `}`
    /// closing a one-line block.
    fn end_of_item(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Newline => {
                self.next();
                Ok(())
            }
            Token::Eof | Token::RBrace => Ok(()),
            _ => Err(self.unexpected("newline")),
        }
    }

    fn parse_body(&mut self, top_level: bool) -> Result<Body, ParseError> {
        let mut body = Body::default();

        loop {
            self.skip_newlines();
            match self.peek() {
                Token::Eof if top_level => return Ok(body),
                Token::RBrace if !top_level => return Ok(body),
                Token::Ident(_) => {}
                _ => return Err(self.unexpected("attribute or block")),
            }

            let line = self.line();
            let name = self.ident("attribute or block")?;

            if *self.peek() == Token::Equals {
                self.next();
                let expr = self.parse_expr()?;
                self.end_of_item()?;
                if body.attributes.contains_key(&name) {
                    return Err(ParseError::new(line, format!("duplicate attribute {:?}", name)));
                }
                body.attributes
                    .insert(name.clone(), Attribute { name, expr, line });
                continue;
            }

            let mut labels = Vec::new();
            while let Token::Str(label) = self.peek().clone() {
                self.next();
                labels.push(label);
            }
            self.expect(Token::LBrace, "'{' or '='")?;
            let inner = self.parse_body(false)?;
            self.expect(Token::RBrace, "'}'")?;
            self.end_of_item()?;

            body.blocks.push(Block {
                kind: name,
                labels,
                body: inner,
                line,
            });
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_postfix()?;
        while *self.peek() == Token::Percent {
            self.next();
            let right = self.parse_postfix()?;
            left = Expr::Modulo(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        let mut steps = Vec::new();

        loop {
            match self.peek() {
                Token::Dot => {
                    self.next();
                    steps.push(Traverser::Attr(self.ident("attribute name")?));
                }
                Token::LBracket => {
                    self.next();
                    self.skip_newlines();
                    let key = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(Token::RBracket, "']'")?;
                    steps.push(Traverser::Index(key));
                }
                _ => break,
            }
        }

        if steps.is_empty() {
            Ok(base)
        } else {
            Ok(Expr::Traversal(Box::new(base), steps))
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        match self.next() {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ if *self.peek() == Token::LParen => {
                    self.next();
                    let args = self.parse_list(Token::RParen)?;
                    Ok(Expr::Call(name, args))
                }
                _ => Ok(Expr::Scope(name)),
            },
            Token::LBrace => self.parse_object(),
            Token::LBracket => Ok(Expr::Tuple(self.parse_list(Token::RBracket)?)),
            Token::LParen => {
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(ParseError::new(
                line,
                format!("expected expression, found {}", other.describe()),
            )),
        }
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn parse_list(&mut self, close: Token) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if *self.peek() == close {
                self.next();
                return Ok(items);
            }
            items.push(self.parse_expr()?);
            self.skip_newlines();
            match self.peek() {
                Token::Comma => {
                    self.next();
                }
                tok if *tok == close => {}
                _ => return Err(self.unexpected("',' or closing bracket")),
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let mut entries: Vec<(String, Expr)> = Vec::new();
        loop {
            self.skip_newlines();
            let line = self.line();
            let key = match self.next() {
                Token::RBrace => return Ok(Expr::Object(entries)),
                Token::Ident(name) => name,
                Token::Str(s) => s,
                other => {
                    return Err(ParseError::new(
                        line,
                        format!("expected object key, found {}", other.describe()),
                    ))
                }
            };
            self.expect(Token::Equals, "'='")?;
            let value = self.parse_expr()?;

            if entries.iter().any(|(k, _)| *k == key) {
                return Err(ParseError::new(line, format!("duplicate object key {:?}", key)));
            }
            entries.push((key, value));

            match self.peek() {
                Token::Comma | Token::Newline => {
                    self.next();
                }
                Token::RBrace => {}
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }
    }
}
