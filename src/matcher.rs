//! Multi-pattern matcher
//!
//! Every compiled mode owns a [`ModeMatcher`]: one alternation built from its
//! children's `begin` patterns (declared order), then its own end terminator,
//! then its illegal pattern. A single regex search finds the leftmost match;
//! the first participating wrapper group tells which rule fired.
//!
//! ## Resuming at the same position
//!
//! A begin match can be rejected after the fact (a hook ignores it). The scan
//! must then retry the *same* position with only the rules after the rejected
//! one, otherwise the rejected rule would win again. The matcher keeps one
//! lazily built alternation per rule suffix and a [`ScanCursor`] remembers
//! which suffix to use next:
//!
//! ```text
//! rules:    [b0, b1, b2, end]        cursor after b1 fired: 2
//! retry:    (b2)|(end)               searched at the same offset only
//! fallback: (b0)|(b1)|(b2)|(end)     searched from the next character
//! ```

use crate::compiler::ModeId;
use crate::error::CompileError;
use crate::pattern::{build_regex, count_groups, rewrite_backreferences};
use fancy_regex::Regex;
use once_cell::sync::OnceCell;
use std::ops::Range;

/// What a rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Enter the given child mode.
    Begin(ModeId),
    /// Terminator of the active mode (or an ancestor via `ends_with_parent`).
    End,
    Illegal,
}

/// One alternative of a matcher.
#[derive(Debug, Clone)]
pub struct Rule {
    pub source: String,
    pub kind: RuleKind,
}

/// A single matcher step.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub kind: RuleKind,
    /// Rule position within the alternation that produced the match.
    pub position: usize,
    /// Byte offset of the match in the searched text.
    pub index: usize,
    /// Rule-relative capture spans; `captures[0]` is the whole lexeme.
    pub captures: Vec<Option<Range<usize>>>,
}

impl RuleMatch {
    pub fn lexeme<'t>(&self, text: &'t str) -> &'t str {
        self.group(text, 0).unwrap_or("")
    }

    pub fn group<'t>(&self, text: &'t str, i: usize) -> Option<&'t str> {
        self.captures
            .get(i)
            .and_then(|span| span.clone())
            .map(|span| &text[span])
    }

    /// Number of capture slots, the lexeme included.
    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// One compiled alternation over a slice of rules.
#[derive(Debug)]
pub struct MultiRegex {
    regex: Option<Regex>,
    kinds: Vec<RuleKind>,
    /// Wrapper group index of each rule, ascending.
    wrappers: Vec<usize>,
    /// Capture groups inside each rule's pattern.
    widths: Vec<usize>,
}

impl MultiRegex {
    pub fn new(rules: &[Rule], case_insensitive: bool) -> Result<Self, CompileError> {
        let kinds = rules.iter().map(|r| r.kind).collect();
        if rules.is_empty() {
            return Ok(Self {
                regex: None,
                kinds,
                wrappers: Vec::new(),
                widths: Vec::new(),
            });
        }

        let mut wrappers = Vec::with_capacity(rules.len());
        let mut widths = Vec::with_capacity(rules.len());
        let mut group = 1;
        for rule in rules {
            let width = count_groups(&rule.source);
            wrappers.push(group);
            widths.push(width);
            group += 1 + width;
        }

        let sources: Vec<&str> = rules.iter().map(|r| r.source.as_str()).collect();
        let joined = rewrite_backreferences(&sources, "|");
        let regex = build_regex(&joined, case_insensitive)?;
        if regex.captures_len() != group {
            return Err(CompileError::InvalidPattern {
                pattern: joined,
                message: format!(
                    "expected {} capture groups, regex engine reports {}",
                    group - 1,
                    regex.captures_len().saturating_sub(1)
                ),
            });
        }

        Ok(Self {
            regex: Some(regex),
            kinds,
            wrappers,
            widths,
        })
    }

    /// Leftmost match at or after `from`; the earliest rule wins among
    /// alternatives matching at the same offset.
    pub fn exec(&self, text: &str, from: usize) -> Result<Option<RuleMatch>, fancy_regex::Error> {
        let Some(regex) = &self.regex else {
            return Ok(None);
        };
        if from > text.len() {
            return Ok(None);
        }
        let Some(caps) = regex.captures_from_pos(text, from)? else {
            return Ok(None);
        };

        let Some(group) = (1..caps.len()).find(|&i| caps.get(i).is_some()) else {
            return Ok(None);
        };
        let Ok(position) = self.wrappers.binary_search(&group) else {
            return Ok(None);
        };

        let width = self.widths[position];
        let captures = (group..=group + width)
            .map(|i| caps.get(i).map(|m| m.start()..m.end()))
            .collect();
        let index = caps.get(group).map_or(from, |m| m.start());

        Ok(Some(RuleMatch {
            kind: self.kinds[position],
            position,
            index,
            captures,
        }))
    }
}

/// Which rule suffix the next search starts from. Owned by the runtime, one
/// per highlight call, so compiled matchers stay immutable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursor {
    regex_index: usize,
}

impl ScanCursor {
    /// Start over with every rule.
    pub fn consider_all(&mut self) {
        self.regex_index = 0;
    }

    pub fn regex_index(&self) -> usize {
        self.regex_index
    }

    fn is_resuming(&self) -> bool {
        self.regex_index != 0
    }
}

/// Resumable matcher of one compiled mode.
#[derive(Debug)]
pub struct ModeMatcher {
    rules: Vec<Rule>,
    begin_count: usize,
    case_insensitive: bool,
    suffixes: Vec<OnceCell<MultiRegex>>,
}

impl ModeMatcher {
    /// Build the matcher; the full alternation is compiled right away so that
    /// malformed patterns surface at grammar compile time.
    pub fn new(rules: Vec<Rule>, case_insensitive: bool) -> Result<Self, CompileError> {
        let begin_count = rules
            .iter()
            .filter(|r| matches!(r.kind, RuleKind::Begin(_)))
            .count();
        let suffixes = (0..rules.len().max(1)).map(|_| OnceCell::new()).collect();
        let matcher = Self {
            rules,
            begin_count,
            case_insensitive,
            suffixes,
        };
        matcher.suffix(0)?;
        Ok(matcher)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Alternation over `rules[index..]`; `None` once past the last rule.
    fn suffix(&self, index: usize) -> Result<Option<&MultiRegex>, CompileError> {
        let Some(cell) = self.suffixes.get(index) else {
            return Ok(None);
        };
        let rules = self.rules.get(index..).unwrap_or(&[]);
        cell.get_or_try_init(|| MultiRegex::new(rules, self.case_insensitive))
            .map(Some)
    }

    /// Next match at or after `last_index`, honouring a pending resume.
    pub fn exec(
        &self,
        cursor: &mut ScanCursor,
        text: &str,
        last_index: usize,
    ) -> Result<Option<RuleMatch>, MatchFailure> {
        let mut result = match self.suffix(cursor.regex_index)? {
            Some(m) => m.exec(text, last_index)?,
            None => None,
        };

        if cursor.is_resuming() {
            let at_position = result.as_ref().is_some_and(|m| m.index == last_index);
            if !at_position {
                result = match (self.suffix(0)?, next_char_boundary(text, last_index)) {
                    (Some(m), Some(next)) => m.exec(text, next)?,
                    _ => None,
                };
            }
        }

        if let Some(found) = &result {
            cursor.regex_index += found.position + 1;
            if cursor.regex_index == self.begin_count {
                cursor.consider_all();
            }
        }
        Ok(result)
    }
}

fn next_char_boundary(text: &str, index: usize) -> Option<usize> {
    let c = text.get(index..)?.chars().next()?;
    Some(index + c.len_utf8())
}

/// Matching can fail at runtime: a lazily built suffix alternation does not
/// compile, or the backtracking engine gives up.
#[derive(Debug, thiserror::Error)]
pub enum MatchFailure {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Regex(#[from] fancy_regex::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(source: &str, id: usize) -> Rule {
        Rule {
            source: source.to_string(),
            kind: RuleKind::Begin(ModeId::new(id)),
        }
    }

    fn end(source: &str) -> Rule {
        Rule {
            source: source.to_string(),
            kind: RuleKind::End,
        }
    }

    #[test]
    fn maps_match_back_to_rule() {
        let m = MultiRegex::new(&[begin("(a)(b)", 1), begin("c", 2), end(r"\n")], false).unwrap();
        let found = m.exec("xxc", 0).unwrap().unwrap();
        assert_eq!(found.kind, RuleKind::Begin(ModeId::new(2)));
        assert_eq!(found.position, 1);
        assert_eq!(found.index, 2);
        assert_eq!(found.lexeme("xxc"), "c");

        let found = m.exec("ab", 0).unwrap().unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found.group("ab", 2), Some("b"));
    }

    #[test]
    fn earlier_rule_wins_at_same_offset() {
        let m = MultiRegex::new(&[begin("[a-z]+", 1), begin("if", 2)], false).unwrap();
        let found = m.exec("if", 0).unwrap().unwrap();
        assert_eq!(found.kind, RuleKind::Begin(ModeId::new(1)));
    }

    #[test]
    fn backreferences_stay_with_their_rule() {
        let m = MultiRegex::new(&[begin(r"(x)\1", 1), begin(r"(['\x22])\w+\1", 2)], false).unwrap();
        let text = "'abc'";
        let found = m.exec(text, 0).unwrap().unwrap();
        assert_eq!(found.kind, RuleKind::Begin(ModeId::new(2)));
        assert_eq!(found.lexeme(text), "'abc'");
        assert_eq!(found.group(text, 1), Some("'"));
    }

    #[test]
    fn empty_matcher_never_matches() {
        let m = MultiRegex::new(&[], false).unwrap();
        assert_eq!(m.exec("anything", 0).unwrap(), None);
    }

    #[test]
    fn resumes_with_later_rules_at_same_position() {
        let matcher =
            ModeMatcher::new(vec![begin("ab", 1), begin("a", 2), end("b")], false).unwrap();
        let mut cursor = ScanCursor::default();

        let first = matcher.exec(&mut cursor, "ab", 0).unwrap().unwrap();
        assert_eq!(first.kind, RuleKind::Begin(ModeId::new(1)));
        assert_eq!(cursor.regex_index(), 1);

        // Pretend the first begin was rejected: scan again without resetting.
        let second = matcher.exec(&mut cursor, "ab", 0).unwrap().unwrap();
        assert_eq!(second.kind, RuleKind::Begin(ModeId::new(2)));
        assert_eq!(second.index, 0);
        assert_eq!(cursor.regex_index(), 0);
    }

    #[test]
    fn falls_back_to_full_scan_from_next_character() {
        let matcher = ModeMatcher::new(vec![begin("a", 1), begin("z", 2)], false).unwrap();
        let mut cursor = ScanCursor::default();

        let first = matcher.exec(&mut cursor, "aa", 0).unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(cursor.regex_index(), 1);

        // Only `z` remains for offset 0 and it does not match there, so the
        // full alternation takes over from offset 1.
        let second = matcher.exec(&mut cursor, "aa", 0).unwrap().unwrap();
        assert_eq!(second.kind, RuleKind::Begin(ModeId::new(1)));
        assert_eq!(second.index, 1);
    }

    #[test]
    fn fallback_past_end_of_text_finds_nothing() {
        let matcher = ModeMatcher::new(vec![begin("a", 1), begin("z", 2)], false).unwrap();
        let mut cursor = ScanCursor::default();
        matcher.exec(&mut cursor, "a", 0).unwrap().unwrap();
        assert_eq!(matcher.exec(&mut cursor, "a", 0).unwrap(), None);
    }
}
