// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Port pattern expansion.
//!
//! A port pattern is a small regular expression describing a finite set of
//! device paths, e.g. `(/dev/ttyACM)[0-2]`. The pattern is parsed into a
//! [`Node`] tree and every string it matches is enumerated:
//!
//! - character classes are sorted and de-duplicated, so `[20-1]` yields
//!   `0`, `1`, `2`
//! - concatenations vary their rightmost element fastest
//! - alternations keep branch order
//! - bounded quantifiers (`?`, `{n}`, `{n,m}`) enumerate shorter counts first
//!
//! Anything that could match an unbounded set (`*`, `+`, `{n,}`, `.`, negated
//! classes) is rejected instead of being truncated. Repeat counts are capped at
//! [`MAX_REPEAT`] and port names at [`MAX_PORT_LEN`] characters.

use std::fmt;

/// Maximum number of ports a single pattern may expand to.
pub const MAX_PORTS: usize = 1024;

/// Largest upper bound accepted in a `{n}` / `{n,m}` quantifier.
pub const MAX_REPEAT: u32 = 64;

/// Longest port name a pattern may produce, in characters.
pub const MAX_PORT_LEN: usize = 256;

/// Error returned when a port pattern cannot be expanded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern is the empty string.
    Empty,
    /// A character that cannot appear here (e.g. a stray `)`).
    UnexpectedChar { pos: usize, ch: char },
    /// `(` without a matching `)`.
    UnclosedGroup { pos: usize },
    /// `[` without a matching `]`.
    UnclosedClass { pos: usize },
    /// `[^...]` matches almost every character.
    NegatedClass { pos: usize },
    /// Range whose start is after its end, e.g. `[9-0]`.
    InvalidRange { pos: usize, start: char, end: char },
    /// A `\` at the very end of the pattern.
    DanglingEscape { pos: usize },
    /// Escape sequence other than `\d` or an escaped punctuation character.
    UnsupportedEscape { pos: usize, ch: char },
    /// `.` matches almost every character.
    Wildcard { pos: usize },
    /// `*`, `+` or `{n,}`.
    Unbounded { pos: usize },
    /// Malformed `{...}` quantifier or one with `min > max`.
    InvalidRepeat { pos: usize },
    /// Quantifier with nothing before it.
    NothingToRepeat { pos: usize },
    /// Quantifier bound above [`MAX_REPEAT`].
    RepeatTooLarge { pos: usize, max: u32 },
    /// The pattern matches more than [`MAX_PORTS`] strings.
    TooManyPorts { count: u64 },
    /// The pattern can produce a port name longer than [`MAX_PORT_LEN`].
    PortTooLong { len: u64 },
    /// The pattern matches the empty string.
    EmptyMatch,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Empty => write!(f, "port pattern is empty"),
            PatternError::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected '{}' at position {}", ch, pos)
            }
            PatternError::UnclosedGroup { pos } => {
                write!(f, "unclosed group opened at position {}", pos)
            }
            PatternError::UnclosedClass { pos } => {
                write!(f, "unclosed character class opened at position {}", pos)
            }
            PatternError::NegatedClass { pos } => write!(
                f,
                "negated character class at position {} is not a finite port set",
                pos
            ),
            PatternError::InvalidRange { pos, start, end } => write!(
                f,
                "invalid range '{}-{}' at position {}",
                start, end, pos
            ),
            PatternError::DanglingEscape { pos } => {
                write!(f, "trailing backslash at position {}", pos)
            }
            PatternError::UnsupportedEscape { pos, ch } => {
                write!(f, "unsupported escape '\\{}' at position {}", ch, pos)
            }
            PatternError::Wildcard { pos } => write!(
                f,
                "'.' at position {} is not a finite port set (escape it as '\\.')",
                pos
            ),
            PatternError::Unbounded { pos } => write!(
                f,
                "unbounded repetition at position {} would match infinitely many ports",
                pos
            ),
            PatternError::InvalidRepeat { pos } => {
                write!(f, "invalid repetition at position {}", pos)
            }
            PatternError::NothingToRepeat { pos } => {
                write!(f, "nothing to repeat at position {}", pos)
            }
            PatternError::RepeatTooLarge { pos, max } => write!(
                f,
                "repetition bound {} at position {} exceeds {}",
                max, pos, MAX_REPEAT
            ),
            PatternError::PortTooLong { len } => write!(
                f,
                "pattern can produce {}-character port names (limit is {})",
                len, MAX_PORT_LEN
            ),
            PatternError::TooManyPorts { count } => write!(
                f,
                "pattern expands to {} ports (limit is {})",
                count, MAX_PORTS
            ),
            PatternError::EmptyMatch => write!(f, "pattern matches the empty string"),
        }
    }
}

impl std::error::Error for PatternError {}

/// Parsed pattern tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Literal(char),
    /// Sorted, de-duplicated set of characters.
    Class(Vec<char>),
    Concat(Vec<Node>),
    Alternation(Vec<Node>),
    Repeat { node: Box<Node>, min: u32, max: u32 },
}

impl Node {
    /// Number of strings this node enumerates, saturating at `u64::MAX`.
    ///
    /// Duplicates are counted, so this is an upper bound on the number of
    /// distinct ports.
    pub fn count(&self) -> u64 {
        match self {
            Node::Literal(_) => 1,
            Node::Class(chars) => chars.len() as u64,
            Node::Concat(nodes) => nodes
                .iter()
                .fold(1u64, |acc, n| acc.saturating_mul(n.count())),
            Node::Alternation(nodes) => nodes
                .iter()
                .fold(0u64, |acc, n| acc.saturating_add(n.count())),
            Node::Repeat { node, min, max } => {
                let base = node.count();
                let mut total = 0u64;
                for k in *min..=*max {
                    total = total.saturating_add(base.saturating_pow(k));
                    if total == u64::MAX {
                        break;
                    }
                }
                total
            }
        }
    }

    /// Length in characters of the longest string this node matches,
    /// saturating at `u64::MAX`.
    pub fn max_len(&self) -> u64 {
        match self {
            Node::Literal(_) | Node::Class(_) => 1,
            Node::Concat(nodes) => nodes
                .iter()
                .fold(0u64, |acc, n| acc.saturating_add(n.max_len())),
            Node::Alternation(nodes) => nodes.iter().map(Node::max_len).max().unwrap_or(0),
            Node::Repeat { node, max, .. } => node.max_len().saturating_mul(u64::from(*max)),
        }
    }

    /// Enumerate every string matched by this node.
    pub fn strings(&self) -> Vec<String> {
        match self {
            Node::Literal(c) => vec![c.to_string()],
            Node::Class(chars) => chars.iter().map(|c| c.to_string()).collect(),
            Node::Concat(nodes) => nodes
                .iter()
                .fold(vec![String::new()], |acc, n| product(&acc, &n.strings())),
            Node::Alternation(nodes) => nodes.iter().flat_map(|n| n.strings()).collect(),
            Node::Repeat { node, min, max } => {
                let items = node.strings();
                let mut out = Vec::new();
                for k in *min..=*max {
                    let mut acc = vec![String::new()];
                    for _ in 0..k {
                        acc = product(&acc, &items);
                    }
                    out.extend(acc);
                }
                out
            }
        }
    }
}

fn product(prefixes: &[String], suffixes: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(prefixes.len() * suffixes.len());
    for p in prefixes {
        for s in suffixes {
            let mut joined = String::with_capacity(p.len() + s.len());
            joined.push_str(p);
            joined.push_str(s);
            out.push(joined);
        }
    }
    out
}

/// Parse a port pattern into a [`Node`] tree without enumerating it.
pub fn parse(pattern: &str) -> Result<Node, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    let mut parser = Parser {
        chars: pattern.chars().collect(),
        pos: 0,
    };
    let node = parser.alternation()?;
    match parser.peek() {
        None => Ok(node),
        Some(ch) => Err(PatternError::UnexpectedChar {
            pos: parser.pos,
            ch,
        }),
    }
}

/// Expand a port pattern into the ordered list of ports it matches.
///
/// Duplicate matches are dropped, keeping the first occurrence.
pub fn expand_port_pattern(pattern: &str) -> Result<Vec<String>, PatternError> {
    let node = parse(pattern)?;

    let count = node.count();
    if count > MAX_PORTS as u64 {
        return Err(PatternError::TooManyPorts { count });
    }
    let len = node.max_len();
    if len > MAX_PORT_LEN as u64 {
        return Err(PatternError::PortTooLong { len });
    }

    let mut ports: Vec<String> = Vec::with_capacity(count as usize);
    for port in node.strings() {
        if port.is_empty() {
            return Err(PatternError::EmptyMatch);
        }
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    Ok(ports)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn alternation(&mut self) -> Result<Node, PatternError> {
        let mut branches = vec![self.concat()?];
        while self.eat('|') {
            branches.push(self.concat()?);
        }
        if branches.len() == 1 {
            Ok(branches.remove(0))
        } else {
            Ok(Node::Alternation(branches))
        }
    }

    fn concat(&mut self) -> Result<Node, PatternError> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            if let Some(atom) = self.atom()? {
                items.push(self.quantified(atom)?);
            }
        }
        if items.len() == 1 {
            Ok(items.remove(0))
        } else {
            Ok(Node::Concat(items))
        }
    }

    /// Parse one atom. Anchors parse to `None`.
    fn atom(&mut self) -> Result<Option<Node>, PatternError> {
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Ok(None);
        };
        match c {
            '(' => {
                // Non-capturing groups enumerate the same as capturing ones.
                if self.peek() == Some('?') {
                    if self.chars.get(self.pos + 1) == Some(&':') {
                        self.pos += 2;
                    } else {
                        return Err(PatternError::UnexpectedChar { pos: self.pos, ch: '?' });
                    }
                }
                let inner = self.alternation()?;
                if !self.eat(')') {
                    return Err(PatternError::UnclosedGroup { pos: start });
                }
                Ok(Some(inner))
            }
            '[' => self.class(start).map(Some),
            '\\' => self.escape(start).map(Some),
            '^' | '$' => Ok(None),
            '.' => Err(PatternError::Wildcard { pos: start }),
            '*' | '+' | '?' | '{' => Err(PatternError::NothingToRepeat { pos: start }),
            '}' | ']' => Err(PatternError::UnexpectedChar { pos: start, ch: c }),
            _ => Ok(Some(Node::Literal(c))),
        }
    }

    fn escape(&mut self, start: usize) -> Result<Node, PatternError> {
        match self.bump() {
            None => Err(PatternError::DanglingEscape { pos: start }),
            Some('d') => Ok(Node::Class(('0'..='9').collect())),
            Some(c) if c.is_ascii_alphanumeric() => {
                Err(PatternError::UnsupportedEscape { pos: start, ch: c })
            }
            Some(c) => Ok(Node::Literal(c)),
        }
    }

    fn class(&mut self, start: usize) -> Result<Node, PatternError> {
        if self.peek() == Some('^') {
            return Err(PatternError::NegatedClass { pos: start });
        }

        let mut members: Vec<char> = Vec::new();
        let mut first = true;
        loop {
            let member_pos = self.pos;
            let c = match self.bump() {
                None => return Err(PatternError::UnclosedClass { pos: start }),
                Some(']') if !first => break,
                Some('\\') => match self.class_escape(member_pos)? {
                    ClassItem::Char(c) => c,
                    ClassItem::Set(set) => {
                        members.extend(set);
                        first = false;
                        continue;
                    }
                },
                Some(c) => c,
            };
            first = false;

            // `-` is literal at either end of the class.
            let is_range = self.peek() == Some('-')
                && self.chars.get(self.pos + 1).is_some_and(|&n| n != ']');
            if !is_range {
                members.push(c);
                continue;
            }
            self.pos += 1;
            let end = match self.bump() {
                Some('\\') => match self.class_escape(self.pos - 1)? {
                    ClassItem::Char(e) => e,
                    ClassItem::Set(_) => {
                        return Err(PatternError::UnsupportedEscape {
                            pos: self.pos - 2,
                            ch: 'd',
                        })
                    }
                },
                Some(e) => e,
                None => return Err(PatternError::UnclosedClass { pos: start }),
            };
            if c > end {
                return Err(PatternError::InvalidRange {
                    pos: member_pos,
                    start: c,
                    end,
                });
            }
            members.extend(c..=end);
        }

        members.sort_unstable();
        members.dedup();
        Ok(Node::Class(members))
    }

    fn class_escape(&mut self, pos: usize) -> Result<ClassItem, PatternError> {
        match self.bump() {
            None => Err(PatternError::DanglingEscape { pos }),
            Some('d') => Ok(ClassItem::Set(('0'..='9').collect())),
            Some(c) if c.is_ascii_alphanumeric() => {
                Err(PatternError::UnsupportedEscape { pos, ch: c })
            }
            Some(c) => Ok(ClassItem::Char(c)),
        }
    }

    fn quantified(&mut self, atom: Node) -> Result<Node, PatternError> {
        let pos = self.pos;
        let (min, max) = match self.peek() {
            Some('?') => {
                self.pos += 1;
                (0, 1)
            }
            Some('*') | Some('+') => return Err(PatternError::Unbounded { pos }),
            Some('{') => {
                self.pos += 1;
                self.repeat_bounds(pos)?
            }
            _ => return Ok(atom),
        };

        if max < min {
            return Err(PatternError::InvalidRepeat { pos });
        }
        if max > MAX_REPEAT {
            return Err(PatternError::RepeatTooLarge { pos, max });
        }
        if matches!(self.peek(), Some('?') | Some('*') | Some('+') | Some('{')) {
            return Err(PatternError::InvalidRepeat { pos: self.pos });
        }
        Ok(Node::Repeat {
            node: Box::new(atom),
            min,
            max,
        })
    }

    /// Parse the inside of `{n}`, `{n,m}` or `{,m}`; the `{` is consumed.
    fn repeat_bounds(&mut self, pos: usize) -> Result<(u32, u32), PatternError> {
        let min = self.number(pos)?;
        if self.eat('}') {
            return min.map(|n| (n, n)).ok_or(PatternError::InvalidRepeat { pos });
        }
        if !self.eat(',') {
            return Err(PatternError::InvalidRepeat { pos });
        }
        let max = self.number(pos)?;
        if !self.eat('}') {
            return Err(PatternError::InvalidRepeat { pos });
        }
        match max {
            Some(max) => Ok((min.unwrap_or(0), max)),
            None => Err(PatternError::Unbounded { pos }),
        }
    }

    fn number(&mut self, pos: usize) -> Result<Option<u32>, PatternError> {
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if digits_start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[digits_start..self.pos].iter().collect();
        text.parse::<u32>()
            .map(Some)
            .map_err(|_| PatternError::InvalidRepeat { pos })
    }
}

enum ClassItem {
    Char(char),
    Set(Vec<char>),
}
