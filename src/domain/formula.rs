//! Restricted formula language.
//!
//! Recursive descent parser and evaluator for the expressions found behind
//! `$calc:` markers. The grammar is closed:
//!
//! ```text
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := not_expr ("and" not_expr)*
//! not_expr   := "not" not_expr | comparison
//! comparison := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)?
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := ("-" | "+") unary | postfix
//! postfix    := primary ("." name | "[" or_expr "]")*
//! primary    := number | string | true | false | null | name | "(" or_expr ")"
//! ```
//!
//! Only the names bound in [`Bindings`] resolve. There are no calls,
//! assignments or attribute lookups beyond plain data access.

use crate::domain::blueprint::child;
use crate::domain::combination::{Combination, Field};
use crate::domain::error::{ParseError, ReentryError};
use crate::domain::value_ops::{compare_values, number_as_i64, truthy, type_name, values_equal};
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Name(name) => f.write_str(name),
            Expr::Member(base, key) => write!(f, "{}.{}", base, key),
            Expr::Index(base, index) => write!(f, "{}[{}]", base, index),
            Expr::Unary(UnaryOp::Neg, e) => write!(f, "-{}", e),
            Expr::Unary(UnaryOp::Plus, e) => write!(f, "+{}", e),
            Expr::Unary(UnaryOp::Not, e) => write!(f, "not {}", e),
            Expr::Binary(op, l, r) => write!(f, "({} {} {})", l, op.symbol(), r),
        }
    }
}

/// The names a formula may reference.
pub struct Bindings<'a> {
    pub enumerations: &'a Value,
    pub defaults: &'a Value,
    pub combo: &'a Combination,
}

impl<'a> Bindings<'a> {
    fn lookup(&self, name: &str) -> Option<Cow<'a, Value>> {
        match name {
            "enumerations" => Some(Cow::Borrowed(self.enumerations)),
            "defaults" => Some(Cow::Borrowed(self.defaults)),
            _ => name
                .parse::<Field>()
                .ok()
                .map(|field| Cow::Owned(self.combo.get(field))),
        }
    }
}

/// Deepest nesting of parentheses, subscripts and prefix operators.
pub const MAX_NESTING: usize = 64;
/// Most operator and access nodes one formula may build.
pub const MAX_NODES: usize = 1024;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    nodes: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
            nodes: 0,
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("expression nests deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn node(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(self.error(format!("expression has more than {} operations", MAX_NODES)));
        }
        Ok(expr)
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.pos, message)
    }

    // `offset` is a byte index into the input; reported positions count characters.
    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.input[..offset].chars().count(),
        }
    }

    fn found(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(format!("expected '{}', found {}", expected, self.found()))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.consume_keyword("or") {
            let right = self.parse_and()?;
            left = self.node(Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.consume_keyword("and") {
            let right = self.parse_not()?;
            left = self.node(Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.consume_keyword("not") {
            let operand = self.nested(Self::parse_not)?;
            return self.node(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<BinaryOp> {
        self.skip_whitespace();
        for (text, op) in [
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::Ne),
            ("<=", BinaryOp::Le),
            (">=", BinaryOp::Ge),
            ("<", BinaryOp::Lt),
            (">", BinaryOp::Gt),
        ] {
            if self.consume_exact(text) {
                return Some(op);
            }
        }
        None
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        let right = self.parse_additive()?;
        let checkpoint = self.pos;
        if self.comparison_op().is_some() {
            self.pos = checkpoint;
            self.skip_whitespace();
            return Err(self.error("chained comparisons are not supported"));
        }
        self.node(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = self.node(Expr::Binary(op, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match (self.peek(), self.peek_second()) {
                (Some('*'), Some('*')) | (Some('/'), Some('/')) => {
                    return Err(self.error(format!(
                        "operator '{}' is not supported",
                        &self.remaining()[..2]
                    )));
                }
                (Some('*'), _) => BinaryOp::Mul,
                (Some('/'), _) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.node(Expr::Binary(op, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('-') => {
                self.advance();
                let operand = self.nested(Self::parse_unary)?;
                self.node(Expr::Unary(UnaryOp::Neg, Box::new(operand)))
            }
            Some('+') => {
                self.advance();
                let operand = self.nested(Self::parse_unary)?;
                self.node(Expr::Unary(UnaryOp::Plus, Box::new(operand)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('.') => {
                    self.advance();
                    let start = self.pos;
                    let key = self.take_word();
                    if key.is_empty() {
                        self.pos = start;
                        return Err(self.error(format!(
                            "expected member name, found {}",
                            self.found()
                        )));
                    }
                    expr = self.node(Expr::Member(Box::new(expr), key.to_string()))?;
                }
                Some('[') => {
                    self.advance();
                    let index = self.nested(Self::parse_or)?;
                    self.expect_char(']')?;
                    expr = self.node(Expr::Index(Box::new(expr), Box::new(index)))?;
                }
                Some('(') => return Err(self.error("function calls are not allowed")),
                _ => break,
            }
        }
        Ok(expr)
    }

    fn take_word(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() => self.parse_number(),
            Some('.') if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                self.parse_number()
            }
            Some(quote @ ('\'' | '"')) => self.parse_string(quote),
            Some('(') => {
                self.advance();
                let inner = self.nested(Self::parse_or)?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let start = self.pos;
                let word = self.take_word();
                match word {
                    "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                    "null" | "None" => Ok(Expr::Literal(Value::Null)),
                    "and" | "or" | "not" => {
                        self.pos = start;
                        Err(self.error(format!("unexpected keyword '{}'", word)))
                    }
                    _ => Ok(Expr::Name(word.to_string())),
                }
            }
            _ => Err(self.error(format!("expected expression, found {}", self.found()))),
        }
    }

    fn parse_number(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        let mut is_float = false;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let checkpoint = self.pos;
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.pos = checkpoint;
            }
        }

        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Expr::Literal(Value::from(i)));
            }
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(|n| Expr::Literal(Value::Number(n)))
            .ok_or_else(|| self.error_at(start, format!("invalid number: {}", text)))
    }

    fn parse_string(&mut self, quote: char) -> Result<Expr, ParseError> {
        let start = self.pos;
        self.advance();
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error_at(start, "unterminated string literal")),
                Some(ch) if ch == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    _ => {
                        return Err(self.error("invalid escape sequence"));
                    }
                },
                Some(ch) => out.push(ch),
            }
        }
        Ok(Expr::Literal(Value::String(out)))
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after expression: '{}'",
                self.remaining()
            )));
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Parse and evaluate `source` against `bindings`.
pub fn evaluate(source: &str, bindings: &Bindings<'_>) -> Result<Value, ReentryError> {
    let expr = parse(source)
        .map_err(|e| ReentryError::evaluation(source, e.display_with_context(source)))?;
    let evaluator = Evaluator { source, bindings };
    Ok(evaluator.eval(&expr)?.into_owned())
}

struct Evaluator<'s, 'b> {
    source: &'s str,
    bindings: &'b Bindings<'b>,
}

impl<'s, 'b> Evaluator<'s, 'b> {
    fn fail(&self, reason: impl Into<String>) -> ReentryError {
        ReentryError::evaluation(self.source, reason)
    }

    fn eval(&self, expr: &Expr) -> Result<Cow<'b, Value>, ReentryError> {
        match expr {
            Expr::Literal(v) => Ok(Cow::Owned(v.clone())),
            Expr::Name(name) => self
                .bindings
                .lookup(name)
                .ok_or_else(|| self.fail(format!("unknown identifier '{}'", name))),
            Expr::Member(base, key) => {
                let base_value = self.eval(base)?;
                self.select(base_value, key, expr)
            }
            Expr::Index(base, index) => {
                let base_value = self.eval(base)?;
                let index_value = self.eval(index)?;
                let key = self.index_key(&base_value, &index_value)?;
                self.select(base_value, &key, expr)
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                self.unary(*op, &value).map(Cow::Owned)
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                if !truthy(&*self.eval(left)?) {
                    return Ok(Cow::Owned(Value::Bool(false)));
                }
                Ok(Cow::Owned(Value::Bool(truthy(&*self.eval(right)?))))
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                if truthy(&*self.eval(left)?) {
                    return Ok(Cow::Owned(Value::Bool(true)));
                }
                Ok(Cow::Owned(Value::Bool(truthy(&*self.eval(right)?))))
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                self.binary(*op, &l, &r).map(Cow::Owned)
            }
        }
    }

    fn select(
        &self,
        base: Cow<'b, Value>,
        key: &str,
        expr: &Expr,
    ) -> Result<Cow<'b, Value>, ReentryError> {
        let missing = || ReentryError::Reference {
            path: expr.to_string(),
        };
        match base {
            Cow::Borrowed(v) => child(v, key).map(Cow::Borrowed).ok_or_else(missing),
            Cow::Owned(v) => child(&v, key)
                .cloned()
                .map(Cow::Owned)
                .ok_or_else(missing),
        }
    }

    // Mapping keys are strings; arrays accept integer (and negative) indices.
    fn index_key(&self, base: &Value, index: &Value) -> Result<String, ReentryError> {
        match (base, index) {
            (Value::Array(items), Value::Number(n)) => {
                let i = n
                    .as_i64()
                    .ok_or_else(|| self.fail(format!("list index must be an integer, got {}", n)))?;
                let resolved = if i < 0 { items.len() as i64 + i } else { i };
                Ok(resolved.to_string())
            }
            (Value::Array(_), other) => Err(self.fail(format!(
                "list index must be an integer, got {}",
                type_name(other)
            ))),
            (Value::Object(_), Value::String(s)) => Ok(s.clone()),
            (Value::Object(_), Value::Number(n)) => Ok(match number_as_i64(n) {
                Some(i) => i.to_string(),
                None => n.to_string(),
            }),
            (Value::Object(_), Value::Bool(b)) => Ok(b.to_string()),
            (other, _) => Err(self.fail(format!("{} is not subscriptable", type_name(other)))),
        }
    }

    fn unary(&self, op: UnaryOp, value: &Value) -> Result<Value, ReentryError> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!truthy(value))),
            UnaryOp::Plus | UnaryOp::Neg => {
                let Value::Number(n) = value else {
                    return Err(self.fail(format!(
                        "bad operand type for unary {}: {}",
                        if op == UnaryOp::Neg { "-" } else { "+" },
                        type_name(value)
                    )));
                };
                if op == UnaryOp::Plus {
                    return Ok(value.clone());
                }
                if let Some(i) = n.as_i64() {
                    return i
                        .checked_neg()
                        .map(Value::from)
                        .ok_or_else(|| self.fail("integer overflow"));
                }
                self.float(-n.as_f64().unwrap_or(f64::NAN))
            }
        }
    }

    fn binary(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, ReentryError> {
        match op {
            BinaryOp::Eq => Ok(Value::Bool(values_equal(l, r))),
            BinaryOp::Ne => Ok(Value::Bool(!values_equal(l, r))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = compare_values(l, r).ok_or_else(|| {
                    self.fail(format!(
                        "'{}' not supported between {} and {}",
                        op.symbol(),
                        type_name(l),
                        type_name(r)
                    ))
                })?;
                let result = match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.arithmetic(op, l, r)
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited in eval"),
        }
    }

    fn arithmetic(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, ReentryError> {
        let (a, b) = match (l, r) {
            (Value::Number(a), Value::Number(b)) => (a, b),
            (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
                return Ok(Value::String(format!("{}{}", a, b)));
            }
            _ => {
                return Err(self.fail(format!(
                    "unsupported operand types for {}: {} and {}",
                    op.symbol(),
                    type_name(l),
                    type_name(r)
                )));
            }
        };

        if op != BinaryOp::Div {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                let result = match op {
                    BinaryOp::Add => x.checked_add(y),
                    BinaryOp::Sub => x.checked_sub(y),
                    _ => x.checked_mul(y),
                };
                return result
                    .map(Value::from)
                    .ok_or_else(|| self.fail("integer overflow"));
            }
        }

        let x = a.as_f64().unwrap_or(f64::NAN);
        let y = b.as_f64().unwrap_or(f64::NAN);
        let result = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            _ => {
                if y == 0.0 {
                    return Err(self.fail("division by zero"));
                }
                x / y
            }
        };
        self.float(result)
    }

    fn float(&self, f: f64) -> Result<Value, ReentryError> {
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| self.fail("result is not a finite number"))
    }
}
