//! Template parsing
//!
//! Grammar:
//!
//! ```text
//! template := (literal | "{{" expr "}}")*
//! expr     := ident ("." ident "(" [arg ("," arg)*] ")")*
//! arg      := string | "(" arg ")"
//! string   := '...' | "..."        (backslash escapes the next char)
//! ```

use crate::error::{Error, Result};

/// A parsed template piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Copied verbatim
    Literal(String),
    /// Evaluated against the namespace
    Expr(Expr),
}

/// Variable lookup followed by a chain of method calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    /// Variable name
    pub var: String,
    /// Method calls, applied left to right
    pub calls: Vec<Call>,
}

/// One `.method(args)` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Method name
    pub method: String,
    /// String-literal arguments
    pub args: Vec<String>,
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Split a template into literal and expression segments
pub fn parse_template(source: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }
        let mut cursor = Cursor::new(&rest[start + OPEN.len()..]);
        let expr = cursor.expr()?;
        cursor.skip_ws();
        if !cursor.eat_str(CLOSE) {
            return Err(cursor.error(&format!("expected '{CLOSE}'")));
        }
        segments.push(Segment::Expr(expr));
        rest = cursor.remaining();
    }

    if rest.contains(CLOSE) {
        return Err(Error::Template(format!(
            "unmatched '{CLOSE}' in template '{source}'"
        )));
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(segments)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if self.remaining().starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn error(&self, what: &str) -> Error {
        let near: String = self.remaining().chars().take(20).collect();
        Error::Template(format!("{what} at offset {} near '{near}'", self.pos))
    }

    fn ident(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let ident = &self.input[start..self.pos];
        if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error("expected identifier"));
        }
        Ok(ident.to_string())
    }

    fn expr(&mut self) -> Result<Expr> {
        let var = self.ident()?;
        let mut calls = Vec::new();
        while self.eat('.') {
            let method = self.ident()?;
            self.expect('(')?;
            let mut args = Vec::new();
            if !self.eat(')') {
                loop {
                    args.push(self.arg()?);
                    if self.eat(')') {
                        break;
                    }
                    self.expect(',')?;
                }
            }
            calls.push(Call { method, args });
        }
        Ok(Expr { var, calls })
    }

    fn arg(&mut self) -> Result<String> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.bump();
                let inner = self.arg()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                self.string_body(quote)
            }
            _ => Err(self.error("expected string literal")),
        }
    }

    fn string_body(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }
}
