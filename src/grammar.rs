//! Declarative grammar definitions
//!
//! A grammar is data: a tree of [`Mode`]s with begin/end patterns, keyword
//! tables and nesting rules. Definitions are built either in Rust with the
//! builder methods below or loaded from JSON/YAML grammar files.
//!
//! ## References instead of cycles
//!
//! Modes form a tree. The two ways a mode can point somewhere other than an
//! inline child are:
//!
//! - `"self"` ([`ModeRef::SelfRef`]): the enclosing mode, resolved to the
//!   enclosing compiled mode's id.
//! - any other string ([`ModeRef::Named`]): an entry of the grammar's `modes`
//!   repository. This is how mutually recursive modes (a string containing a
//!   substitution containing a string) are written down without live cycles.
//!
//! ## File format
//!
//! Field names follow the camelCase convention used by existing grammar
//! collections, and the legacy `className` is accepted next to `scope`:
//!
//! ```text
//! {
//!   "name": "Example",
//!   "keywords": { "keyword": "if else", "$pattern": "\\w+" },
//!   "contains": [
//!     { "scope": "string", "begin": "\"", "end": "\"", "contains": ["escape"] },
//!     { "className": "number", "match": "\\d+" }
//!   ],
//!   "modes": { "escape": { "begin": "\\\\.", "relevance": 0 } }
//! }
//! ```

use crate::error::GrammarLoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A pattern source, or an ordered list of sources.
///
/// For `begin`/`end`/`match` a sequence is matched as the concatenation of its
/// parts, each part addressable by position for per-group scopes. For
/// `illegal` a sequence is an alternation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pattern {
    Source(String),
    Sequence(Vec<String>),
}

impl Pattern {
    pub fn sequence<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Pattern::Sequence(parts.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Pattern::Source(source.to_string())
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Pattern::Source(source)
    }
}

/// A scope label for a whole span, or one label per numbered group of a
/// sequence pattern (1-based, counting sequence parts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "RawScopeSpec")]
pub enum ScopeSpec {
    Name(String),
    Groups(BTreeMap<usize, String>),
}

// Group keys arrive as strings from JSON objects and as integers from YAML.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScopeSpec {
    Name(String),
    Groups(BTreeMap<GroupIndex, String>),
}

impl From<RawScopeSpec> for ScopeSpec {
    fn from(raw: RawScopeSpec) -> Self {
        match raw {
            RawScopeSpec::Name(name) => ScopeSpec::Name(name),
            RawScopeSpec::Groups(groups) => {
                ScopeSpec::Groups(groups.into_iter().map(|(k, v)| (k.0, v)).collect())
            }
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct GroupIndex(usize);

impl<'de> Deserialize<'de> for GroupIndex {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IndexVisitor;

        impl serde::de::Visitor<'_> for IndexVisitor {
            type Value = GroupIndex;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a capture group number")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<GroupIndex, E> {
                usize::try_from(v).map(GroupIndex).map_err(E::custom)
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<GroupIndex, E> {
                usize::try_from(v).map(GroupIndex).map_err(E::custom)
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<GroupIndex, E> {
                v.parse().map(GroupIndex).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IndexVisitor)
    }
}

impl ScopeSpec {
    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        ScopeSpec::Groups(groups.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<&str> for ScopeSpec {
    fn from(scope: &str) -> Self {
        ScopeSpec::Name(scope.to_string())
    }
}

/// Space separated words, or an explicit list. A word may carry an explicit
/// relevance as `word|N`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WordList {
    Spaced(String),
    Words(Vec<String>),
}

impl WordList {
    pub fn words(&self) -> Vec<&str> {
        match self {
            WordList::Spaced(s) => s.split_whitespace().collect(),
            WordList::Words(words) => words.iter().map(String::as_str).collect(),
        }
    }
}

/// Keyword table: scope kind → words, plus the pattern that splits buffered
/// text into candidate words (default `\w+`).
///
/// A bare string or list in a grammar file is shorthand for the `keyword` kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawKeywords")]
pub struct Keywords {
    #[serde(rename = "$pattern", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(flatten)]
    pub classes: BTreeMap<String, WordList>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKeywords {
    Words(WordList),
    Table {
        #[serde(rename = "$pattern", default)]
        pattern: Option<String>,
        #[serde(flatten)]
        classes: BTreeMap<String, WordList>,
    },
}

impl From<RawKeywords> for Keywords {
    fn from(raw: RawKeywords) -> Self {
        match raw {
            RawKeywords::Words(words) => Keywords {
                pattern: None,
                classes: BTreeMap::from([("keyword".to_string(), words)]),
            },
            RawKeywords::Table { pattern, classes } => Keywords { pattern, classes },
        }
    }
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add words under a scope kind. Kinds starting with `_` score relevance
    /// without being highlighted.
    pub fn with(mut self, kind: &str, words: impl Into<WordListInput>) -> Self {
        self.classes.insert(kind.to_string(), words.into().0);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// Words become `keyword`-kind entries.
impl From<&str> for Keywords {
    fn from(words: &str) -> Self {
        Keywords::new().with("keyword", words)
    }
}

/// Conversion helper so [`Keywords::with`] accepts both strings and slices.
pub struct WordListInput(WordList);

impl From<&str> for WordListInput {
    fn from(s: &str) -> Self {
        WordListInput(WordList::Spaced(s.to_string()))
    }
}

impl From<&[&str]> for WordListInput {
    fn from(words: &[&str]) -> Self {
        WordListInput(WordList::Words(words.iter().map(|w| w.to_string()).collect()))
    }
}

impl<const N: usize> From<[&str; N]> for WordListInput {
    fn from(words: [&str; N]) -> Self {
        WordListInput(WordList::Words(words.iter().map(|w| w.to_string()).collect()))
    }
}

/// Grammar embedded in a mode's region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubLanguage {
    /// Always this grammar.
    One(String),
    /// Autodetect among these (all registered grammars when empty).
    Candidates(Vec<String>),
}

/// Closed set of match hooks. Adding behavior means adding a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hook {
    /// Reject a begin match directly preceded by `.` (member access such as `x.if`).
    IgnoreIfPrecededByDot,
    /// Reject a begin match anywhere but offset 0 of the input.
    OnlyAtInputStart,
    /// Remember the begin's first capture; only accept an end whose first
    /// capture is identical (heredoc terminators).
    EndSameAsBegin,
}

/// A child entry of `contains`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawModeRef", into = "RawModeRef")]
pub enum ModeRef {
    /// The enclosing mode.
    SelfRef,
    /// An entry of [`GrammarDefinition::modes`].
    Named(String),
    Inline(Box<Mode>),
}

impl ModeRef {
    pub fn named(name: &str) -> Self {
        ModeRef::Named(name.to_string())
    }
}

impl From<Mode> for ModeRef {
    fn from(mode: Mode) -> Self {
        ModeRef::Inline(Box::new(mode))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawModeRef {
    Name(String),
    Mode(Box<Mode>),
}

impl From<RawModeRef> for ModeRef {
    fn from(raw: RawModeRef) -> Self {
        match raw {
            RawModeRef::Name(name) if name == "self" => ModeRef::SelfRef,
            RawModeRef::Name(name) => ModeRef::Named(name),
            RawModeRef::Mode(mode) => ModeRef::Inline(mode),
        }
    }
}

impl From<ModeRef> for RawModeRef {
    fn from(mode_ref: ModeRef) -> Self {
        match mode_ref {
            ModeRef::SelfRef => RawModeRef::Name("self".to_string()),
            ModeRef::Named(name) => RawModeRef::Name(name),
            ModeRef::Inline(mode) => RawModeRef::Mode(mode),
        }
    }
}

/// A lexical scope class.
///
/// Every attribute is optional so that a variant or an `inherit` override can
/// say "keep the base value" by leaving the field unset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Mode {
    pub scope: Option<ScopeSpec>,
    /// Legacy spelling of `scope`.
    pub class_name: Option<ScopeSpec>,
    pub begin_scope: Option<ScopeSpec>,
    pub end_scope: Option<ScopeSpec>,

    pub begin: Option<Pattern>,
    pub end: Option<Pattern>,
    /// Shorthand for a `begin` with no `end`.
    #[serde(rename = "match")]
    pub match_pattern: Option<Pattern>,
    /// Space separated words; expands to a boundary-anchored `begin`.
    pub begin_keywords: Option<String>,
    /// Text that must precede `begin` without being part of this mode.
    pub before_match: Option<String>,

    pub keywords: Option<Keywords>,
    pub illegal: Option<Pattern>,
    pub contains: Option<Vec<ModeRef>>,
    pub variants: Option<Vec<Mode>>,
    /// Mode entered as soon as this one ends.
    pub starts: Option<Box<Mode>>,
    pub relevance: Option<f64>,

    pub ends_with_parent: Option<bool>,
    pub ends_parent: Option<bool>,
    pub exclude_begin: Option<bool>,
    pub exclude_end: Option<bool>,
    pub return_begin: Option<bool>,
    pub return_end: Option<bool>,
    pub skip: Option<bool>,

    pub sub_language: Option<SubLanguage>,
    pub hooks: Option<Vec<Hook>>,
}

impl Mode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<ScopeSpec>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Per-group scopes for a sequence `begin`/`match`.
    pub fn scope_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        self.scope = Some(ScopeSpec::groups(groups));
        self
    }

    pub fn begin_scope(mut self, scope: impl Into<ScopeSpec>) -> Self {
        self.begin_scope = Some(scope.into());
        self
    }

    pub fn end_scope(mut self, scope: impl Into<ScopeSpec>) -> Self {
        self.end_scope = Some(scope.into());
        self
    }

    pub fn begin(mut self, pattern: impl Into<Pattern>) -> Self {
        self.begin = Some(pattern.into());
        self
    }

    pub fn end(mut self, pattern: impl Into<Pattern>) -> Self {
        self.end = Some(pattern.into());
        self
    }

    pub fn matches(mut self, pattern: impl Into<Pattern>) -> Self {
        self.match_pattern = Some(pattern.into());
        self
    }

    pub fn begin_keywords(mut self, words: &str) -> Self {
        self.begin_keywords = Some(words.to_string());
        self
    }

    pub fn before_match(mut self, pattern: impl Into<String>) -> Self {
        self.before_match = Some(pattern.into());
        self
    }

    pub fn keywords(mut self, keywords: impl Into<Keywords>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    pub fn illegal(mut self, pattern: impl Into<Pattern>) -> Self {
        self.illegal = Some(pattern.into());
        self
    }

    pub fn contains<I, M>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ModeRef>,
    {
        self.contains = Some(children.into_iter().map(Into::into).collect());
        self
    }

    pub fn variants<I: IntoIterator<Item = Mode>>(mut self, variants: I) -> Self {
        self.variants = Some(variants.into_iter().collect());
        self
    }

    pub fn starts(mut self, mode: Mode) -> Self {
        self.starts = Some(Box::new(mode));
        self
    }

    pub fn relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn ends_with_parent(mut self) -> Self {
        self.ends_with_parent = Some(true);
        self
    }

    pub fn ends_parent(mut self) -> Self {
        self.ends_parent = Some(true);
        self
    }

    pub fn exclude_begin(mut self) -> Self {
        self.exclude_begin = Some(true);
        self
    }

    pub fn exclude_end(mut self) -> Self {
        self.exclude_end = Some(true);
        self
    }

    pub fn return_begin(mut self) -> Self {
        self.return_begin = Some(true);
        self
    }

    pub fn return_end(mut self) -> Self {
        self.return_end = Some(true);
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = Some(true);
        self
    }

    pub fn sub_language(mut self, name: &str) -> Self {
        self.sub_language = Some(SubLanguage::One(name.to_string()));
        self
    }

    pub fn sub_language_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_language = Some(SubLanguage::Candidates(
            candidates.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.get_or_insert_with(Vec::new).push(hook);
        self
    }

    /// Copy of `self` with every attribute set on `overrides` taking precedence.
    pub fn inherit(&self, overrides: Mode) -> Mode {
        merge(self, overrides)
    }

    pub(crate) fn flag(value: Option<bool>) -> bool {
        value.unwrap_or(false)
    }
}

/// Base mode + override record: attributes present on `over` win.
pub(crate) fn merge(base: &Mode, over: Mode) -> Mode {
    let base = base.clone();
    Mode {
        scope: over.scope.or(base.scope),
        class_name: over.class_name.or(base.class_name),
        begin_scope: over.begin_scope.or(base.begin_scope),
        end_scope: over.end_scope.or(base.end_scope),
        begin: over.begin.or(base.begin),
        end: over.end.or(base.end),
        match_pattern: over.match_pattern.or(base.match_pattern),
        begin_keywords: over.begin_keywords.or(base.begin_keywords),
        before_match: over.before_match.or(base.before_match),
        keywords: over.keywords.or(base.keywords),
        illegal: over.illegal.or(base.illegal),
        contains: over.contains.or(base.contains),
        variants: over.variants.or(base.variants),
        starts: over.starts.or(base.starts),
        relevance: over.relevance.or(base.relevance),
        ends_with_parent: over.ends_with_parent.or(base.ends_with_parent),
        ends_parent: over.ends_parent.or(base.ends_parent),
        exclude_begin: over.exclude_begin.or(base.exclude_begin),
        exclude_end: over.exclude_end.or(base.exclude_end),
        return_begin: over.return_begin.or(base.return_begin),
        return_end: over.return_end.or(base.return_end),
        skip: over.skip.or(base.skip),
        sub_language: over.sub_language.or(base.sub_language),
        hooks: over.hooks.or(base.hooks),
    }
}

/// Author-supplied grammar: metadata plus the top-level mode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GrammarDefinition {
    pub name: String,
    pub aliases: Vec<String>,
    #[serde(alias = "case_insensitive")]
    pub case_insensitive: bool,
    pub disable_autodetect: bool,
    /// On a relevance tie, the grammar named here is preferred over this one.
    pub superset_of: Option<String>,
    /// Scope renames applied whenever a scope is opened.
    #[serde(alias = "classNameAliases")]
    pub scope_aliases: BTreeMap<String, String>,
    /// Named modes referenced from `contains` lists by string.
    pub modes: BTreeMap<String, Mode>,
    /// The top-level mode; `keywords`, `contains` and `illegal` live here.
    #[serde(flatten)]
    pub root: Mode,
}

impl GrammarDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn disable_autodetect(mut self) -> Self {
        self.disable_autodetect = true;
        self
    }

    pub fn superset_of(mut self, name: &str) -> Self {
        self.superset_of = Some(name.to_string());
        self
    }

    pub fn scope_alias(mut self, scope: &str, renamed: &str) -> Self {
        self.scope_aliases
            .insert(scope.to_string(), renamed.to_string());
        self
    }

    pub fn mode(mut self, name: &str, mode: Mode) -> Self {
        self.modes.insert(name.to_string(), mode);
        self
    }

    pub fn keywords(mut self, keywords: impl Into<Keywords>) -> Self {
        self.root.keywords = Some(keywords.into());
        self
    }

    pub fn illegal(mut self, pattern: impl Into<Pattern>) -> Self {
        self.root.illegal = Some(pattern.into());
        self
    }

    pub fn contains<I, M>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ModeRef>,
    {
        self.root.contains = Some(children.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_json(source: &str) -> Result<Self, GrammarLoadError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_yaml(source: &str) -> Result<Self, GrammarLoadError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Load a `.json`, `.yaml` or `.yml` grammar file. An unnamed grammar is
    /// named after the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GrammarLoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut definition = match extension.as_str() {
            "json" => Self::from_json(&source)?,
            "yaml" | "yml" => Self::from_yaml(&source)?,
            other => return Err(GrammarLoadError::UnsupportedFormat(other.to_string())),
        };
        if definition.name.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                definition.name = stem.to_string();
            }
        }
        Ok(definition)
    }
}
