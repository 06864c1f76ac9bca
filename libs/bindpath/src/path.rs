//! Property-path parser
//!
//! Turns a binding expression such as `user.addresses['home'].city` into an
//! ordered list of [`Step`]s.
//!
//! ```text
//! expression := segment ('.' segment)*
//! segment    := identifier ('[' key ']')?
//! key        := digits | '\'' literal '\''
//! ```
//!
//! Parsing is total: a string either yields one canonical [`Expression`] or fails
//! with the offset (in characters) of the offending position.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Index or key attached to a step (`[3]`, `['home']`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// Unquoted digits
    Ordinal(usize),
    /// Single-quoted literal, quotes removed
    Literal(String),
}

impl IndexKey {
    /// Position for sequence access. Quoted literals count when they hold digits.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            IndexKey::Ordinal(index) => Some(*index),
            IndexKey::Literal(text) => text.parse().ok(),
        }
    }

    /// Key text as handed to indexed accessors and string-keyed maps.
    pub fn to_text(&self) -> String {
        match self {
            IndexKey::Ordinal(index) => index.to_string(),
            IndexKey::Literal(text) => text.clone(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Ordinal(index) => write!(f, "{}", index),
            IndexKey::Literal(text) => write!(f, "'{}'", text),
        }
    }
}

/// One member access, optionally indexed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub name: String,
    pub index: Option<IndexKey>,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.index {
            Some(key) => write!(f, "{}[{}]", self.name, key),
            None => f.write_str(&self.name),
        }
    }
}

/// A parsed, immutable expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    steps: SmallVec<[Step; 4]>,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Canonical text of the first `depth` steps, used to name failing segments.
    pub fn prefix(&self, depth: usize) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().take(depth).enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(&step.to_string());
        }
        out
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix(self.steps.len()))
    }
}

/// Parse an expression string
pub fn parse(expression: &str) -> Result<Expression> {
    PathParser::new(expression).parse()
}

struct PathParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    position: usize,
}

impl<'a> PathParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, offset: usize, message: &'static str) -> Error {
        Error::Parse {
            expression: self.source.to_string(),
            offset,
            message,
        }
    }

    fn parse(mut self) -> Result<Expression> {
        if self.chars.is_empty() {
            return Err(self.error(0, "empty expression"));
        }

        let mut steps = SmallVec::new();
        loop {
            steps.push(self.parse_segment()?);
            match self.current() {
                None => break,
                Some('.') => {
                    self.advance();
                    if self.current().is_none() {
                        return Err(self.error(self.position - 1, "trailing dot"));
                    }
                }
                Some(_) => return Err(self.error(self.position, "expected `.` or end of expression")),
            }
        }

        Ok(Expression {
            source: self.source.to_string(),
            steps,
        })
    }

    fn parse_segment(&mut self) -> Result<Step> {
        let start = self.position;
        match self.current() {
            Some('.') if start == 0 => return Err(self.error(0, "leading dot")),
            Some('.') => return Err(self.error(start, "empty segment")),
            Some(c) if is_identifier_start(c) => {}
            Some(_) => return Err(self.error(start, "expected identifier")),
            None => return Err(self.error(start, "empty segment")),
        }

        while let Some(c) = self.current() {
            if is_identifier_part(c) {
                self.advance();
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.position].iter().collect();

        let index = if self.current() == Some('[') {
            Some(self.parse_key()?)
        } else {
            None
        };

        Ok(Step { name, index })
    }

    fn parse_key(&mut self) -> Result<IndexKey> {
        let open = self.position;
        self.advance(); // '['

        let key = match self.current() {
            Some('\'') => {
                self.advance();
                let start = self.position;
                while let Some(c) = self.current() {
                    if c == '\'' {
                        break;
                    }
                    self.advance();
                }
                if self.current().is_none() {
                    return Err(self.error(start - 1, "unterminated quoted key"));
                }
                let literal: String = self.chars[start..self.position].iter().collect();
                self.advance(); // closing quote
                IndexKey::Literal(literal)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.position;
                while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
                let digits: String = self.chars[start..self.position].iter().collect();
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| self.error(start, "index out of range"))?;
                IndexKey::Ordinal(index)
            }
            Some(']') => return Err(self.error(self.position, "empty index")),
            None => return Err(self.error(open, "unterminated bracket")),
            Some(_) => return Err(self.error(self.position, "expected digits or quoted key")),
        };

        match self.current() {
            Some(']') => {
                self.advance();
                Ok(key)
            }
            None => Err(self.error(open, "unterminated bracket")),
            Some(_) => Err(self.error(self.position, "expected `]`")),
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
