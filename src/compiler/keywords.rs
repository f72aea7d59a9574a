//! Keyword tables
//!
//! Compiles a [`Keywords`] definition into a `word → (scope, relevance)` map
//! plus the pattern that splits buffered text into candidate words.

use crate::error::CompileError;
use crate::grammar::Keywords;
use crate::pattern::build_regex;
use fancy_regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// Words that carry no evidence about which language the text is in.
const STRUCTURAL_WORDS: &[&str] = &[
    "of", "and", "for", "in", "not", "or", "if", "then", "parent", "list", "value",
];

const DEFAULT_WORD_PATTERN: &str = r"\w+";

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordEntry {
    /// `None` for kinds prefixed with `_`: relevance only, no highlighting.
    pub scope: Option<String>,
    pub relevance: f64,
}

#[derive(Debug)]
pub struct KeywordTable {
    pattern: Regex,
    entries: HashMap<String, KeywordEntry>,
    case_insensitive: bool,
}

impl KeywordTable {
    pub fn compile(
        keywords: &Keywords,
        case_insensitive: bool,
        aliases: &BTreeMap<String, String>,
    ) -> Result<Self, CompileError> {
        let pattern = build_regex(
            keywords.pattern.as_deref().unwrap_or(DEFAULT_WORD_PATTERN),
            case_insensitive,
        )?;

        let mut entries = HashMap::new();
        for (kind, list) in &keywords.classes {
            let scope = if kind.starts_with('_') {
                None
            } else {
                Some(aliases.get(kind).unwrap_or(kind).clone())
            };
            for raw in list.words() {
                let (word, score) = match raw.split_once('|') {
                    Some((word, score)) => (word, Some(score)),
                    None => (raw, None),
                };
                let word = if case_insensitive {
                    word.to_lowercase()
                } else {
                    word.to_string()
                };
                let relevance = score_for_keyword(&word, score);
                entries.insert(
                    word,
                    KeywordEntry {
                        scope: scope.clone(),
                        relevance,
                    },
                );
            }
        }

        Ok(Self {
            pattern,
            entries,
            case_insensitive,
        })
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Look a candidate word up, case-normalizing for case-insensitive grammars.
    pub fn lookup(&self, word: &str) -> Option<&KeywordEntry> {
        if self.case_insensitive {
            self.entries.get(&word.to_lowercase())
        } else {
            self.entries.get(word)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn score_for_keyword(word: &str, provided: Option<&str>) -> f64 {
    if let Some(score) = provided.and_then(|s| s.trim().parse::<f64>().ok()) {
        return score;
    }
    if STRUCTURAL_WORDS.contains(&word.to_lowercase().as_str()) {
        0.0
    } else {
        1.0
    }
}
