//! Settings scripts.
//!
//! A settings script is a sequence of literal assignments:
//!
//! ```text
//! # comments run to end of line
//! DEBUG = True
//! PORT = 8080
//! HOSTS = ["alpha", "beta"]
//! DATABASE = {
//!     "name": "app",
//!     "timeout": 2.5,
//! }
//! BACKUP = DATABASE        # earlier bindings may be referenced
//! PAIR = 1, 2              # bare commas build a tuple
//! ```
//!
//! Values are `None`, `True`, `False`, integers (decimal, `0x`, `0o`, `0b`),
//! floats, strings and byte strings (`b'..'`, raw `r'..'`, triple-quoted),
//! lists, tuples, dicts with string keys and names of earlier bindings. A
//! set literal parses but yields an unsupported value, rejected on load.
//! Expressions may span lines inside brackets or after a trailing `\`.

use crate::error::{ConfigError, Result};
use crate::value::Input;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Punct(char),
    Newline,
    Eof,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
    column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    tokens: Vec<Spanned>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::script(self.line, self.column, message)
    }

    fn push(&mut self, token: Token, line: usize, column: usize) {
        self.tokens.push(Spanned {
            token,
            line,
            column,
        });
    }

    fn push_newline(&mut self) {
        let needed = self
            .tokens
            .last()
            .is_some_and(|last| last.token != Token::Newline);
        if needed {
            self.push(Token::Newline, self.line, self.column);
        }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>> {
        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '\n' => {
                    if self.depth == 0 {
                        self.push_newline();
                    }
                    self.bump();
                }
                '(' | '[' | '{' => {
                    self.bump();
                    self.depth += 1;
                    self.push(Token::Punct(c), line, column);
                }
                ')' | ']' | '}' => {
                    if self.depth == 0 {
                        return Err(self.error(format!("unmatched '{c}'")));
                    }
                    self.bump();
                    self.depth -= 1;
                    self.push(Token::Punct(c), line, column);
                }
                '=' | ',' | ':' | '+' | '-' => {
                    self.bump();
                    self.push(Token::Punct(c), line, column);
                }
                '"' | '\'' => {
                    let token = self.string(false, false)?;
                    self.push(token, line, column);
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    let token = self.number()?;
                    self.push(token, line, column);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let token = self.name_or_prefixed_string()?;
                    self.push(token, line, column);
                }
                other => return Err(self.error(format!("unexpected character {other:?}"))),
            }
        }

        if self.depth > 0 {
            return Err(self.error("unexpected end of input inside brackets"));
        }
        self.push_newline();
        self.push(Token::Eof, self.line, self.column);
        Ok(self.tokens)
    }

    fn name_or_prefixed_string(&mut self) -> Result<Token> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(), Some('"' | '\'')) {
            let prefix = name.to_ascii_lowercase();
            let (bytes, raw) = match prefix.as_str() {
                "b" => (true, false),
                "r" => (false, true),
                "br" | "rb" => (true, true),
                _ => return Err(self.error(format!("invalid string prefix `{name}`"))),
            };
            return self.string(bytes, raw);
        }
        Ok(Token::Name(name))
    }

    fn string(&mut self, bytes: bool, raw: bool) -> Result<Token> {
        let quote = self.bump().ok_or_else(|| self.error("expected quote"))?;
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        // Code units; bytes keep values below 256.
        let mut units: Vec<u32> = Vec::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string literal"))?;
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    break;
                }
            } else if c == '\n' && !triple {
                return Err(self.error("unterminated string literal"));
            } else if c == '\\' {
                let next = self
                    .bump()
                    .ok_or_else(|| self.error("unterminated string literal"))?;
                if raw {
                    units.push('\\' as u32);
                    units.push(next as u32);
                    continue;
                }
                match next {
                    '\n' => {}
                    '\\' | '\'' | '"' => units.push(next as u32),
                    'n' => units.push('\n' as u32),
                    't' => units.push('\t' as u32),
                    'r' => units.push('\r' as u32),
                    '0' => units.push(0),
                    'a' => units.push(0x07),
                    'b' => units.push(0x08),
                    'f' => units.push(0x0c),
                    'v' => units.push(0x0b),
                    'x' => units.push(self.hex_escape(2)?),
                    'u' if !bytes => units.push(self.hex_escape(4)?),
                    'U' if !bytes => units.push(self.hex_escape(8)?),
                    other => {
                        units.push('\\' as u32);
                        units.push(other as u32);
                    }
                }
                continue;
            }
            if bytes && !c.is_ascii() {
                return Err(self.error("bytes can only contain ASCII literal characters"));
            }
            units.push(c as u32);
        }

        if bytes {
            Ok(Token::Bytes(units.into_iter().map(|u| u as u8).collect()))
        } else {
            units
                .into_iter()
                .map(|u| char::from_u32(u).ok_or_else(|| self.error("invalid unicode escape")))
                .collect::<Result<String>>()
                .map(Token::Str)
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Result<u32> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("truncated hex escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn number(&mut self) -> Result<Token> {
        let radix = match (self.peek(), self.peek_at(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None,
        };

        if let Some(radix) = radix {
            self.bump();
            self.bump();
            let digits = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return i64::from_str_radix(&digits, radix)
                .map(Token::Int)
                .map_err(|_| self.error(format!("invalid integer literal `{digits}`")));
        }

        let mut text = self.take_while(|c| c.is_ascii_digit() || c == '_');
        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit() || c == '_'));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                text.push('e');
                self.bump();
                if signed {
                    text.extend(self.bump());
                }
                text.push_str(&self.take_while(|c| c.is_ascii_digit() || c == '_'));
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float literal `{text}`")))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error(format!("integer literal `{text}` out of range")))
        }
    }

    /// Consume characters matching `pred`, dropping `_` digit separators.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            self.bump();
            if c != '_' {
                out.push(c);
            }
        }
        out
    }
}

/// Deepest expression nesting accepted, matching serde_json's recursion limit.
const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    bindings: IndexMap<String, Input>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn next(&mut self) -> Spanned {
        let spanned = self.tokens[self.pos].clone();
        if spanned.token != Token::Eof {
            self.pos += 1;
        }
        spanned
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        let at = &self.tokens[self.pos];
        ConfigError::script(at.line, at.column, message)
    }

    fn eat(&mut self, c: char) -> bool {
        if *self.peek() == Token::Punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    fn program(mut self) -> Result<IndexMap<String, Input>> {
        loop {
            match self.peek().clone() {
                Token::Newline => {
                    self.pos += 1;
                }
                Token::Eof => break,
                Token::Name(name) => {
                    if matches!(name.as_str(), "None" | "True" | "False") {
                        return Err(self.error(format!("cannot assign to `{name}`")));
                    }
                    self.pos += 1;
                    self.expect('=')?;
                    let value = self.statement_value()?;
                    match self.peek() {
                        Token::Newline | Token::Eof => {}
                        _ => return Err(self.error("expected end of line")),
                    }
                    self.bindings.insert(name, value);
                }
                _ => return Err(self.error("expected an assignment")),
            }
        }
        Ok(self.bindings)
    }

    fn statement_value(&mut self) -> Result<Input> {
        let first = self.expr()?;
        if !self.eat(',') {
            return Ok(first);
        }
        let mut items = vec![first];
        while !matches!(self.peek(), Token::Newline | Token::Eof) {
            items.push(self.expr()?);
            if !self.eat(',') {
                break;
            }
        }
        Ok(Input::Tuple(items))
    }

    fn expr(&mut self) -> Result<Input> {
        if self.depth == MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = self.operand();
        self.depth -= 1;
        value
    }

    fn operand(&mut self) -> Result<Input> {
        let spanned = self.next();
        match spanned.token {
            Token::Int(i) => Ok(Input::Int(i)),
            Token::Float(f) => Ok(Input::Float(f)),
            Token::Punct(sign @ ('-' | '+')) => {
                let operand = self.expr()?;
                match (sign, operand) {
                    ('+', value @ (Input::Int(_) | Input::Float(_))) => Ok(value),
                    ('-', Input::Int(i)) => i
                        .checked_neg()
                        .map(Input::Int)
                        .ok_or_else(|| self.error("integer out of range")),
                    ('-', Input::Float(f)) => Ok(Input::Float(-f)),
                    (_, other) => Err(ConfigError::script(
                        spanned.line,
                        spanned.column,
                        format!("bad operand for unary {sign}: {}", other.kind_name()),
                    )),
                }
            }
            Token::Str(mut s) => {
                while let Token::Str(more) = self.peek() {
                    s.push_str(more);
                    self.pos += 1;
                }
                if matches!(self.peek(), Token::Bytes(_)) {
                    return Err(self.error("cannot mix bytes and str literals"));
                }
                Ok(Input::Str(s))
            }
            Token::Bytes(mut b) => {
                while let Token::Bytes(more) = self.peek() {
                    b.extend_from_slice(more);
                    self.pos += 1;
                }
                if matches!(self.peek(), Token::Str(_)) {
                    return Err(self.error("cannot mix bytes and str literals"));
                }
                Ok(Input::Bytes(b))
            }
            Token::Name(name) => match name.as_str() {
                "None" => Ok(Input::None),
                "True" => Ok(Input::Bool(true)),
                "False" => Ok(Input::Bool(false)),
                _ => self.bindings.get(&name).cloned().ok_or_else(|| {
                    ConfigError::script(
                        spanned.line,
                        spanned.column,
                        format!("name `{name}` is not defined"),
                    )
                }),
            },
            Token::Punct('[') => Ok(Input::List(self.items(']')?)),
            Token::Punct('(') => self.paren(),
            Token::Punct('{') => self.brace(),
            Token::Newline | Token::Eof => Err(ConfigError::script(
                spanned.line,
                spanned.column,
                "unexpected end of line",
            )),
            Token::Punct(c) => Err(ConfigError::script(
                spanned.line,
                spanned.column,
                format!("unexpected '{c}'"),
            )),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn items(&mut self, close: char) -> Result<Vec<Input>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                break;
            }
            items.push(self.expr()?);
            if !self.eat(',') {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn paren(&mut self) -> Result<Input> {
        if self.eat(')') {
            return Ok(Input::Tuple(Vec::new()));
        }
        let first = self.expr()?;
        if self.eat(')') {
            return Ok(first);
        }
        self.expect(',')?;
        let mut items = vec![first];
        items.extend(self.items(')')?);
        Ok(Input::Tuple(items))
    }

    fn brace(&mut self) -> Result<Input> {
        if self.eat('}') {
            return Ok(Input::Map(Vec::new()));
        }
        let first = self.expr()?;
        if !self.eat(':') {
            // Set literal: parsed for positions, rejected as a value kind.
            if self.eat(',') {
                self.items('}')?;
            } else {
                self.expect('}')?;
            }
            return Ok(Input::unsupported("set"));
        }

        let mut entries = Vec::new();
        let mut key = first;
        loop {
            let name = match key {
                Input::Str(name) => name,
                other => {
                    return Err(self.error(format!(
                        "dict keys must be strings, got {}",
                        other.kind_name()
                    )));
                }
            };
            let value = self.expr()?;
            entries.push((name, value));
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
            if self.eat('}') {
                break;
            }
            key = self.expr()?;
            self.expect(':')?;
        }
        Ok(Input::Map(entries))
    }
}

/// Parse a settings script into its top-level bindings, in definition order.
pub fn parse(source: &str) -> Result<IndexMap<String, Input>> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
        bindings: IndexMap::new(),
    }
    .program()
}
