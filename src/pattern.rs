//! Pattern algebra
//!
//! Grammar authors compose regular expressions out of smaller fragments. The
//! combinators here all take pattern *sources* and return a new source string;
//! nothing is compiled until the grammar compiler asks for it.
//!
//! The one piece with real depth is [`rewrite_backreferences`]: when several
//! patterns are merged into one alternation each of them gets wrapped in its own
//! capture group, so every capture group (and every `\N` backreference) inside
//! a later pattern shifts by the number of groups that came before it.
//!
//! ```text
//! patterns:  (a)\1        (b)\1
//! joined:    ((a)\2)|((b)\4)
//! ```
//!
//! The scanner that drives the rewrite understands just enough regex syntax to
//! get this right: escapes, (nested) character classes, non-capturing and
//! lookaround groups, and named groups.

use crate::error::CompileError;
use fancy_regex::Regex;

/// Escape `text` so that it matches itself literally.
pub fn literal(text: &str) -> String {
    regex::escape(text)
}

/// Concatenate fragments into one source.
pub fn concat<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts.into_iter().fold(String::new(), |mut acc, part| {
        acc.push_str(part.as_ref());
        acc
    })
}

/// Zero-width positive lookahead: `(?=p)`.
pub fn lookahead(pattern: impl AsRef<str>) -> String {
    format!("(?={})", pattern.as_ref())
}

/// `(?:p)?`
pub fn optional(pattern: impl AsRef<str>) -> String {
    format!("(?:{})?", pattern.as_ref())
}

/// `(?:p)*`
pub fn any_number_of_times(pattern: impl AsRef<str>) -> String {
    format!("(?:{})*", pattern.as_ref())
}

/// Non-capturing alternation: `(?:a|b|c)`.
pub fn either<I, S>(alternatives: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    format!("(?:{})", join(alternatives, "|"))
}

/// Capturing alternation: `(a|b|c)`.
pub fn either_capturing<I, S>(alternatives: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    format!("({})", join(alternatives, "|"))
}

fn join<I, S>(parts: I, separator: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        out.push_str(part.as_ref());
    }
    out
}

/// Number of capture groups (numbered and named) opened by `source`.
pub fn count_groups(source: &str) -> usize {
    Scanner::new(source)
        .filter(|token| matches!(token, Token::Group { capturing: true, .. }))
        .count()
}

/// Wrap every pattern in a capture group and join them with `join_with`,
/// shifting each pattern's backreferences past the groups that precede it.
///
/// With `join_with = "|"` this builds the matcher alternation; with an empty
/// separator it builds a sequence whose parts stay individually addressable.
pub fn rewrite_backreferences<S: AsRef<str>>(patterns: &[S], join_with: &str) -> String {
    let mut captures = 0;
    let mut out = String::new();
    for (i, pattern) in patterns.iter().enumerate() {
        if i > 0 {
            out.push_str(join_with);
        }
        captures += 1;
        let offset = captures;
        out.push('(');
        for token in Scanner::new(pattern.as_ref()) {
            match token {
                Token::Backreference(n) => {
                    out.push('\\');
                    out.push_str(&(n + offset).to_string());
                }
                Token::Group { capturing, raw } => {
                    if capturing {
                        captures += 1;
                    }
                    out.push_str(raw);
                }
                Token::Raw(raw) => out.push_str(raw),
            }
        }
        out.push(')');
    }
    out
}

/// Compile a grammar pattern. All grammar regexes are multi-line, so `^`/`$`
/// anchor at line boundaries.
pub fn build_regex(source: &str, case_insensitive: bool) -> Result<Regex, CompileError> {
    let flags = if case_insensitive { "(?mi)" } else { "(?m)" };
    Regex::new(&format!("{flags}{source}")).map_err(|e| CompileError::InvalidPattern {
        pattern: source.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    /// `\N`
    Backreference(usize),
    /// `(`, `(?:`, `(?=`, `(?P<name>` ...; `raw` is the opening text consumed
    Group { capturing: bool, raw: &'a str },
    /// Anything else, copied through untouched
    Raw(&'a str),
}

struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn class_end(&self, start: usize) -> usize {
        let bytes = self.source.as_bytes();
        let skip_leading = |mut i: usize| {
            if bytes.get(i) == Some(&b'^') {
                i += 1;
            }
            if bytes.get(i) == Some(&b']') {
                i += 1;
            }
            i
        };
        let mut i = skip_leading(start + 1);
        let mut depth = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'[' => {
                    depth += 1;
                    i = skip_leading(i + 1);
                }
                b']' => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        return i;
                    }
                }
                _ => i += 1,
            }
        }
        bytes.len()
    }

    fn escape_end(&self, start: usize) -> usize {
        match self.source[start + 1..].chars().next() {
            Some(c) => start + 1 + c.len_utf8(),
            None => self.source.len(),
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.source.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }

        match bytes[start] {
            b'\\' => {
                let digits = bytes[start + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits > 0 && bytes[start + 1] != b'0' {
                    let end = start + 1 + digits;
                    self.pos = end;
                    let n = self.source[start + 1..end].parse().unwrap_or(0);
                    return Some(Token::Backreference(n));
                }
                self.pos = self.escape_end(start);
                Some(Token::Raw(&self.source[start..self.pos]))
            }
            b'[' => {
                self.pos = self.class_end(start);
                Some(Token::Raw(&self.source[start..self.pos]))
            }
            b'(' => {
                let rest = &self.source[start..];
                let (capturing, len) = if rest.starts_with("(?P<") {
                    (true, 4)
                } else if rest.starts_with("(?<=") || rest.starts_with("(?<!") {
                    (false, 4)
                } else if rest.starts_with("(?<") {
                    (true, 3)
                } else if rest.starts_with("(?") {
                    (false, 2)
                } else {
                    (true, 1)
                };
                self.pos = start + len;
                Some(Token::Group {
                    capturing,
                    raw: &self.source[start..self.pos],
                })
            }
            _ => {
                let end = bytes[start..]
                    .iter()
                    .position(|b| matches!(b, b'\\' | b'[' | b'('))
                    .map_or(bytes.len(), |off| start + off);
                self.pos = end;
                Some(Token::Raw(&self.source[start..end]))
            }
        }
    }
}
