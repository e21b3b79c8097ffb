/// Filter: table-storage (OData) filter expressions
///
/// Callers pass raw filter strings straight through to the store. The
/// builders here quote values correctly, and the parser lets the in-memory
/// store evaluate the same expressions the real service would.

use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{LottoError, Result};

/// Render `value` as an OData string literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `<property> eq '<value>'`
pub fn eq(property: &str, value: &str) -> String {
    format!("{} eq {}", property, quote(value))
}

/// Conjunction of two expressions. A blank side is dropped.
pub fn and(lhs: &str, rhs: &str) -> String {
    match (lhs.trim().is_empty(), rhs.trim().is_empty()) {
        (true, _) => rhs.to_string(),
        (_, true) => lhs.to_string(),
        _ => format!("({}) and ({})", lhs, rhs),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            _ => None,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Property(String),
    Str(String),
    Int(i64),
    Bool(bool),
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches everything; produced by a blank expression.
    All,
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Ok(Filter::All);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let filter = parser.parse_or()?;

        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected {:?} after expression", token)));
        }
        Ok(filter)
    }

    /// Evaluate against the JSON form of an entity.
    pub fn matches(&self, entity: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Compare { lhs, op, rhs } => {
                match (resolve(lhs, entity), resolve(rhs, entity)) {
                    (Some(l), Some(r)) => compare(&l, &r).is_some_and(|o| op.accepts(o)),
                    _ => false,
                }
            }
            Filter::And(terms) => terms.iter().all(|t| t.matches(entity)),
            Filter::Or(terms) => terms.iter().any(|t| t.matches(entity)),
            Filter::Not(inner) => !inner.matches(entity),
        }
    }
}

fn resolve(operand: &Operand, entity: &Value) -> Option<Value> {
    match operand {
        Operand::Property(name) => entity.get(name).cloned(),
        Operand::Str(s) => Some(Value::String(s.clone())),
        Operand::Int(i) => Some(Value::from(*i)),
        Operand::Bool(b) => Some(Value::Bool(*b)),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn invalid(reason: impl Into<String>) -> LottoError {
    LottoError::InvalidFilter {
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Word(String),
    Str(String),
    Int(i64),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' => {
                let (literal, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(literal));
                i = next;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| invalid(format!("bad number '{}'", digits)))?;
                // Int64 literals carry an `L` suffix.
                if i < chars.len() && chars[i] == 'L' {
                    i += 1;
                }
                tokens.push(Token::Int(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                // Typed literals such as datetime'...' compare as their text.
                if i < chars.len() && chars[i] == '\'' {
                    let (literal, next) = read_string(&chars, i)?;
                    tokens.push(Token::Str(literal));
                    i = next;
                } else {
                    tokens.push(Token::Word(chars[start..i].iter().collect()));
                }
            }
            other => return Err(invalid(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

/// Read a quoted literal starting at `start`; `''` is an escaped quote.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let mut literal = String::new();
    let mut i = start + 1;

    loop {
        match chars.get(i) {
            None => return Err(invalid("unterminated string literal")),
            Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                literal.push('\'');
                i += 2;
            }
            Some('\'') => return Ok((literal, i + 1)),
            Some(&c) => {
                literal.push(c);
                i += 1;
            }
        }
    }
}

/// Deepest run of nested parentheses and `not`s the parser accepts.
const MAX_NESTING: usize = 100;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut terms = vec![self.parse_and()?];
        while self.eat_word("or") {
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat_word("and") {
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::And(terms)
        })
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(invalid("expression nested too deeply"));
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<Filter> {
        if self.eat_word("not") {
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Filter::Not(Box::new(inner)));
        }

        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_or()?;
            self.depth -= 1;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                other => Err(invalid(format!("expected ')', found {:?}", other))),
            };
        }

        let lhs = self.parse_operand()?;
        let op = match self.next() {
            Some(Token::Word(w)) => CompareOp::from_keyword(&w)
                .ok_or_else(|| invalid(format!("unknown operator '{}'", w)))?,
            other => return Err(invalid(format!("expected operator, found {:?}", other))),
        };
        let rhs = self.parse_operand()?;

        Ok(Filter::Compare { lhs, op, rhs })
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Operand::Str(s)),
            Some(Token::Int(i)) => Ok(Operand::Int(i)),
            Some(Token::Word(w)) => match w.as_str() {
                "true" => Ok(Operand::Bool(true)),
                "false" => Ok(Operand::Bool(false)),
                "and" | "or" | "not" => Err(invalid(format!("unexpected keyword '{}'", w))),
                _ => Ok(Operand::Property(w)),
            },
            other => Err(invalid(format!("expected operand, found {:?}", other))),
        }
    }
}
