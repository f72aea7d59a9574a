//! Grammar compiler
//!
//! Turns a [`GrammarDefinition`] into a [`CompiledGrammar`]: an arena of
//! immutable [`CompiledMode`]s addressed by [`ModeId`]. Parent and child links
//! are ids, so self references and mutually recursive named modes compile to a
//! finite graph without shared mutable state.
//!
//! Compilation of one mode happens in two steps. *Reserving* desugars the mode
//! (see [`passes`]), resolves its begin/end sources and terminator and takes an
//! id. *Filling* then compiles its children and its `starts` mode. Once every
//! mode is reserved the per-mode matchers are built from the children's begin
//! sources.
//!
//! Terminators propagate downwards: a child with `ends_with_parent` appends its
//! parent's terminator to its own, so it closes as soon as any ancestor could.

mod keywords;
mod passes;

pub use keywords::{KeywordEntry, KeywordTable};

use crate::error::CompileError;
use crate::grammar::{merge, GrammarDefinition, Hook, Mode, ModeRef, SubLanguage};
use crate::matcher::{ModeMatcher, Rule, RuleKind};
use crate::pattern::build_regex;
use fancy_regex::Regex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Matches at every position: the implicit begin/end of modes that declare none.
const ANY_BOUNDARY: &str = r"\B|\b";

/// Depth limit for nested compilation of parent-dependent modes.
const MAX_NESTING: usize = 64;

/// Index of a mode inside its grammar's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeId(usize);

impl ModeId {
    #[cfg(test)]
    pub(crate) fn new(index: usize) -> Self {
        ModeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Scope applied to a begin or end lexeme.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryScope {
    /// The whole lexeme as one span.
    Wrap(String),
    /// Group number → scope for each part of a sequence pattern. Parts
    /// without a scope are keyword-classified instead.
    Groups(BTreeMap<usize, Option<String>>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub ends_with_parent: bool,
    pub ends_parent: bool,
    pub exclude_begin: bool,
    pub exclude_end: bool,
    pub return_begin: bool,
    pub return_end: bool,
    pub skip: bool,
}

impl ModeFlags {
    fn of(mode: &Mode) -> Self {
        Self {
            ends_with_parent: Mode::flag(mode.ends_with_parent),
            ends_parent: Mode::flag(mode.ends_parent),
            exclude_begin: Mode::flag(mode.exclude_begin),
            exclude_end: Mode::flag(mode.exclude_end),
            return_begin: Mode::flag(mode.return_begin),
            return_end: Mode::flag(mode.return_end),
            skip: Mode::flag(mode.skip),
        }
    }
}

/// A fully resolved mode. Immutable once the grammar is compiled.
#[derive(Debug)]
pub struct CompiledMode {
    pub(crate) scope: Option<String>,
    pub(crate) begin_scope: Option<BoundaryScope>,
    pub(crate) end_scope: Option<BoundaryScope>,
    pub(crate) begin_source: String,
    pub(crate) end_re: Option<Regex>,
    pub(crate) terminator_end: String,
    pub(crate) illegal: Option<String>,
    pub(crate) keywords: Option<KeywordTable>,
    pub(crate) contains: Vec<ModeId>,
    pub(crate) starts: Option<ModeId>,
    pub(crate) relevance: f64,
    /// Whether an embedded grammar's relevance counts towards the total.
    pub(crate) sub_language_relevance: bool,
    pub(crate) flags: ModeFlags,
    pub(crate) sub_language: Option<SubLanguage>,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) parent: Option<ModeId>,
    pub(crate) matcher: ModeMatcher,
}

impl CompiledMode {
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn begin_source(&self) -> &str {
        &self.begin_source
    }

    /// Own end pattern, joined with the ancestors' when `ends_with_parent`.
    pub fn terminator_end(&self) -> &str {
        &self.terminator_end
    }

    pub fn illegal(&self) -> Option<&str> {
        self.illegal.as_deref()
    }

    pub fn contains(&self) -> &[ModeId] {
        &self.contains
    }

    pub fn starts(&self) -> Option<ModeId> {
        self.starts
    }

    /// Mode this one was compiled under; `None` for the root.
    pub fn parent(&self) -> Option<ModeId> {
        self.parent
    }

    pub fn relevance(&self) -> f64 {
        self.relevance
    }

    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    pub fn keywords(&self) -> Option<&KeywordTable> {
        self.keywords.as_ref()
    }

    pub fn sub_language(&self) -> Option<&SubLanguage> {
        self.sub_language.as_ref()
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    pub fn matcher(&self) -> &ModeMatcher {
        &self.matcher
    }

    pub(crate) fn has_hook(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }
}

/// A grammar ready for highlighting. Safe to share between threads.
#[derive(Debug)]
pub struct CompiledGrammar {
    name: String,
    aliases: Vec<String>,
    case_insensitive: bool,
    disable_autodetect: bool,
    superset_of: Option<String>,
    modes: Vec<CompiledMode>,
}

impl CompiledGrammar {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Whether autodetection may pick this grammar.
    pub fn autodetect(&self) -> bool {
        !self.disable_autodetect
    }

    pub fn superset_of(&self) -> Option<&str> {
        self.superset_of.as_deref()
    }

    pub fn root(&self) -> ModeId {
        ModeId(0)
    }

    pub fn mode(&self, id: ModeId) -> &CompiledMode {
        &self.modes[id.0]
    }

    pub fn mode_count(&self) -> usize {
        self.modes.len()
    }
}

/// Compile a grammar definition.
pub fn compile(definition: &GrammarDefinition) -> Result<CompiledGrammar, CompileError> {
    let mut compiler = Compiler {
        definition,
        drafts: Vec::new(),
        named: HashMap::new(),
    };
    compiler.compile_mode(definition.root.clone(), None, 0)?;

    let case_insensitive = definition.case_insensitive;
    let rules: Vec<Vec<Rule>> = compiler
        .drafts
        .iter()
        .map(|draft| compiler.rules_for(draft))
        .collect();

    let modes = compiler
        .drafts
        .into_iter()
        .zip(rules)
        .map(|(draft, rules)| draft.finish(ModeMatcher::new(rules, case_insensitive)?))
        .collect::<Result<Vec<_>, CompileError>>()?;

    debug!(grammar = %definition.name, modes = modes.len(), "compiled grammar");

    Ok(CompiledGrammar {
        name: definition.name.clone(),
        aliases: definition.aliases.clone(),
        case_insensitive,
        disable_autodetect: definition.disable_autodetect,
        superset_of: definition.superset_of.clone(),
        modes,
    })
}

/// A mode whose children may not be compiled yet.
struct Draft {
    scope: Option<String>,
    begin_scope: Option<BoundaryScope>,
    end_scope: Option<BoundaryScope>,
    begin_source: String,
    end_re: Option<Regex>,
    terminator_end: String,
    illegal: Option<String>,
    keywords: Option<KeywordTable>,
    contains: Vec<ModeId>,
    starts: Option<ModeId>,
    relevance: Option<f64>,
    flags: ModeFlags,
    sub_language: Option<SubLanguage>,
    hooks: Vec<Hook>,
    parent: Option<ModeId>,
}

impl Draft {
    fn finish(self, matcher: ModeMatcher) -> Result<CompiledMode, CompileError> {
        Ok(CompiledMode {
            scope: self.scope,
            begin_scope: self.begin_scope,
            end_scope: self.end_scope,
            begin_source: self.begin_source,
            end_re: self.end_re,
            terminator_end: self.terminator_end,
            illegal: self.illegal,
            keywords: self.keywords,
            contains: self.contains,
            starts: self.starts,
            relevance: self.relevance.unwrap_or(0.0),
            sub_language_relevance: self.relevance.map_or(true, |r| r > 0.0),
            flags: self.flags,
            sub_language: self.sub_language,
            hooks: self.hooks,
            parent: self.parent,
            matcher,
        })
    }
}

/// Children and `starts` of a reserved mode, compiled while filling.
struct Pending {
    contains: Vec<ModeRef>,
    starts: Option<Box<Mode>>,
}

struct Compiler<'g> {
    definition: &'g GrammarDefinition,
    drafts: Vec<Draft>,
    /// Named modes already compiled, keyed by name and, for modes that
    /// depend on their parent, the parent's terminator.
    named: HashMap<(String, Option<String>), Vec<ModeId>>,
}

impl Compiler<'_> {
    fn compile_mode(
        &mut self,
        mode: Mode,
        parent: Option<ModeId>,
        depth: usize,
    ) -> Result<ModeId, CompileError> {
        if depth > MAX_NESTING {
            return Err(CompileError::NestingTooDeep(MAX_NESTING));
        }
        let (id, pending) = self.reserve(mode, parent)?;
        self.fill(id, pending, parent, depth)?;
        Ok(id)
    }

    fn reserve(
        &mut self,
        mode: Mode,
        parent: Option<ModeId>,
    ) -> Result<(ModeId, Pending), CompileError> {
        let case_insensitive = self.definition.case_insensitive;
        let lowered = passes::lower(mode, parent.is_some(), &self.definition.scope_aliases)?;
        let mut rest = lowered.rest;
        let flags = ModeFlags::of(&rest);

        let (begin_source, end_source) = match parent {
            Some(_) => (
                lowered.begin.unwrap_or_else(|| ANY_BOUNDARY.to_string()),
                lowered
                    .end
                    .or_else(|| (!flags.ends_with_parent).then(|| ANY_BOUNDARY.to_string())),
            ),
            None => (String::new(), None),
        };

        let end_re = end_source
            .as_deref()
            .map(|source| build_regex(source, case_insensitive))
            .transpose()?;

        let mut terminator_end = end_source.clone().unwrap_or_default();
        if flags.ends_with_parent {
            if let Some(parent) = parent {
                let inherited = &self.drafts[parent.0].terminator_end;
                if !inherited.is_empty() {
                    if end_source.is_some() {
                        terminator_end.push('|');
                    }
                    terminator_end.push_str(inherited);
                }
            }
        }

        let keywords = lowered
            .keywords
            .as_ref()
            .map(|k| KeywordTable::compile(k, case_insensitive, &self.definition.scope_aliases))
            .transpose()?;

        let id = ModeId(self.drafts.len());
        self.drafts.push(Draft {
            scope: lowered.scope,
            begin_scope: lowered.begin_scope,
            end_scope: lowered.end_scope,
            begin_source,
            end_re,
            terminator_end,
            illegal: lowered.illegal,
            keywords,
            contains: Vec::new(),
            starts: None,
            relevance: rest.relevance,
            flags,
            sub_language: rest.sub_language.take(),
            hooks: lowered.hooks,
            parent,
        });

        Ok((
            id,
            Pending {
                contains: rest.contains.take().unwrap_or_default(),
                starts: rest.starts.take(),
            },
        ))
    }

    fn fill(
        &mut self,
        id: ModeId,
        pending: Pending,
        parent: Option<ModeId>,
        depth: usize,
    ) -> Result<(), CompileError> {
        let mut children = Vec::new();
        for child in pending.contains {
            match child {
                ModeRef::SelfRef => {
                    if parent.is_none() {
                        return Err(CompileError::SelfAtTopLevel(self.definition.name.clone()));
                    }
                    children.push(id);
                }
                ModeRef::Named(name) => children.extend(self.named_mode(&name, id, depth)?),
                ModeRef::Inline(mode) => {
                    for variant in expand_variants(*mode) {
                        children.push(self.compile_mode(variant, Some(id), depth + 1)?);
                    }
                }
            }
        }
        self.drafts[id.0].contains = children;

        if let Some(starts) = pending.starts {
            let starts = self.compile_mode(*starts, parent, depth + 1)?;
            self.drafts[id.0].starts = Some(starts);
        }
        Ok(())
    }

    /// Compile (or reuse) an entry of the grammar's `modes` repository as a
    /// child of `parent`. Ids are cached before the children are compiled so
    /// that recursive references close into a cycle of ids.
    fn named_mode(
        &mut self,
        name: &str,
        parent: ModeId,
        depth: usize,
    ) -> Result<Vec<ModeId>, CompileError> {
        let definition = self.definition;
        let mode = definition
            .modes
            .get(name)
            .ok_or_else(|| CompileError::UnknownModeReference(name.to_string()))?;

        let key = (
            name.to_string(),
            depends_on_parent(mode).then(|| self.drafts[parent.0].terminator_end.clone()),
        );
        if let Some(ids) = self.named.get(&key) {
            trace!(mode = name, "reusing compiled named mode");
            return Ok(ids.clone());
        }
        if depth > MAX_NESTING {
            return Err(CompileError::NestingTooDeep(MAX_NESTING));
        }

        let mut reserved = Vec::new();
        for variant in expand_variants(mode.clone()) {
            reserved.push(self.reserve(variant, Some(parent))?);
        }
        let ids: Vec<ModeId> = reserved.iter().map(|(id, _)| *id).collect();
        self.named.insert(key, ids.clone());

        for (id, pending) in reserved {
            self.fill(id, pending, Some(parent), depth + 1)?;
        }
        Ok(ids)
    }

    /// Matcher rules: children's begins in order, then the terminator, then
    /// the illegal pattern.
    fn rules_for(&self, draft: &Draft) -> Vec<Rule> {
        let mut rules: Vec<Rule> = draft
            .contains
            .iter()
            .map(|&child| Rule {
                source: self.drafts[child.0].begin_source.clone(),
                kind: RuleKind::Begin(child),
            })
            .collect();
        if !draft.terminator_end.is_empty() {
            rules.push(Rule {
                source: draft.terminator_end.clone(),
                kind: RuleKind::End,
            });
        }
        if let Some(illegal) = &draft.illegal {
            rules.push(Rule {
                source: illegal.clone(),
                kind: RuleKind::Illegal,
            });
        }
        rules
    }
}

/// A mode with N variants stands for N sibling modes, each the base merged
/// with one variant. An empty variant list is ignored.
fn expand_variants(mut mode: Mode) -> Vec<Mode> {
    match mode.variants.take() {
        Some(variants) if !variants.is_empty() => variants
            .into_iter()
            .flat_map(|variant| expand_variants(merge(&mode, variant)))
            .collect(),
        _ => vec![mode],
    }
}

/// A mode whose compiled form depends on the parent it is compiled under.
fn depends_on_parent(mode: &Mode) -> bool {
    Mode::flag(mode.ends_with_parent) || mode.starts.as_deref().is_some_and(depends_on_parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Pattern;

    fn child_ids(grammar: &CompiledGrammar, id: ModeId) -> Vec<ModeId> {
        grammar.mode(id).contains().to_vec()
    }

    #[test]
    fn children_get_default_boundaries() {
        let def = GrammarDefinition::new("t").contains([Mode::new().scope("number").begin(r"\d+")]);
        let grammar = compile(&def).unwrap();
        let root = grammar.mode(grammar.root());
        assert_eq!(root.terminator_end(), "");
        let number = grammar.mode(root.contains()[0]);
        assert_eq!(number.scope(), Some("number"));
        assert_eq!(number.terminator_end(), ANY_BOUNDARY);
        assert_eq!(number.relevance(), 0.0);
        assert_eq!(number.parent(), Some(grammar.root()));
    }

    #[test]
    fn ends_with_parent_appends_parent_terminator() {
        let def = GrammarDefinition::new("t").contains([Mode::new()
            .begin(r"\(")
            .end(r"\)")
            .contains([
                Mode::new().begin("a").ends_with_parent(),
                Mode::new().begin("b").end(";").ends_with_parent(),
            ])]);
        let grammar = compile(&def).unwrap();
        let outer = grammar.root();
        let paren = child_ids(&grammar, outer)[0];
        let children = child_ids(&grammar, paren);
        assert_eq!(grammar.mode(children[0]).terminator_end(), r"\)");
        assert_eq!(grammar.mode(children[1]).terminator_end(), r";|\)");
    }

    #[test]
    fn self_reference_points_at_enclosing_mode() {
        let def = GrammarDefinition::new("t").contains([Mode::new()
            .begin(r"\{")
            .end(r"\}")
            .contains([ModeRef::SelfRef])]);
        let grammar = compile(&def).unwrap();
        let braces = child_ids(&grammar, grammar.root())[0];
        assert_eq!(child_ids(&grammar, braces), vec![braces]);
        assert_eq!(grammar.mode_count(), 2);
    }

    #[test]
    fn self_at_top_level_is_rejected() {
        let def = GrammarDefinition::new("t").contains([ModeRef::SelfRef]);
        assert_eq!(
            compile(&def).unwrap_err(),
            CompileError::SelfAtTopLevel("t".to_string())
        );
    }

    #[test]
    fn variants_expand_to_siblings() {
        let def = GrammarDefinition::new("t").contains([Mode::new()
            .scope("string")
            .relevance(0.0)
            .variants([
                Mode::new().begin("'").end("'"),
                Mode::new().begin("\"").end("\""),
            ])]);
        let grammar = compile(&def).unwrap();
        let children = child_ids(&grammar, grammar.root());
        assert_eq!(children.len(), 2);
        assert_eq!(grammar.mode(children[0]).begin_source(), "'");
        assert_eq!(grammar.mode(children[1]).begin_source(), "\"");
        assert!(children
            .iter()
            .all(|&id| grammar.mode(id).scope() == Some("string")));
    }

    #[test]
    fn empty_variants_keep_the_base_mode() {
        let def = GrammarDefinition::new("t")
            .contains([Mode::new().scope("number").begin(r"\d+").variants([])]);
        let grammar = compile(&def).unwrap();
        let children = child_ids(&grammar, grammar.root());
        assert_eq!(children.len(), 1);
        assert_eq!(grammar.mode(children[0]).begin_source(), r"\d+");
    }

    #[test]
    fn mutually_recursive_named_modes_share_ids() {
        let def = GrammarDefinition::new("t")
            .mode(
                "string",
                Mode::new()
                    .scope("string")
                    .begin("\"")
                    .end("\"")
                    .contains([ModeRef::named("subst")]),
            )
            .mode(
                "subst",
                Mode::new()
                    .scope("subst")
                    .begin(r"\$\(")
                    .end(r"\)")
                    .contains([ModeRef::named("string")]),
            )
            .contains([ModeRef::named("string"), ModeRef::named("subst")]);
        let grammar = compile(&def).unwrap();
        let top = child_ids(&grammar, grammar.root());
        let (string, subst) = (top[0], top[1]);
        assert_eq!(child_ids(&grammar, string), vec![subst]);
        assert_eq!(child_ids(&grammar, subst), vec![string]);
        assert_eq!(grammar.mode_count(), 3);
    }

    #[test]
    fn unknown_named_mode_is_an_error() {
        let def = GrammarDefinition::new("t").contains([ModeRef::named("missing")]);
        assert_eq!(
            compile(&def).unwrap_err(),
            CompileError::UnknownModeReference("missing".to_string())
        );
    }

    #[test]
    fn runaway_parent_dependent_recursion_is_bounded() {
        let def = GrammarDefinition::new("t")
            .mode(
                "grow",
                Mode::new()
                    .begin("x")
                    .end("y")
                    .ends_with_parent()
                    .contains([ModeRef::named("grow")]),
            )
            .contains([ModeRef::named("grow")]);
        assert_eq!(
            compile(&def).unwrap_err(),
            CompileError::NestingTooDeep(MAX_NESTING)
        );
    }

    #[test]
    fn malformed_patterns_fail_compilation() {
        let def = GrammarDefinition::new("t").contains([Mode::new().begin("(")]);
        assert!(matches!(
            compile(&def),
            Err(CompileError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn starts_mode_is_compiled_under_same_parent() {
        let def = GrammarDefinition::new("t").contains([Mode::new()
            .begin("a")
            .end("b")
            .starts(Mode::new().scope("after").end("$"))]);
        let grammar = compile(&def).unwrap();
        let first = grammar.mode(child_ids(&grammar, grammar.root())[0]);
        let starts = first.starts().expect("starts");
        assert_eq!(grammar.mode(starts).parent(), Some(grammar.root()));
        assert_eq!(grammar.mode(starts).scope(), Some("after"));
    }

    #[test]
    fn explicit_zero_relevance_suppresses_sub_language_relevance() {
        let def = GrammarDefinition::new("t").contains([
            Mode::new().begin("a").sub_language("x"),
            Mode::new().begin("b").sub_language("x").relevance(0.0),
        ]);
        let grammar = compile(&def).unwrap();
        let children = child_ids(&grammar, grammar.root());
        assert!(grammar.mode(children[0]).sub_language_relevance);
        assert!(!grammar.mode(children[1]).sub_language_relevance);
    }

    #[test]
    fn match_shorthand_keeps_sequence_scopes() {
        let def = GrammarDefinition::new("t").contains([Mode::new()
            .matches(Pattern::sequence(["fn", r"\s+", "[a-z]+"]))
            .scope_groups([(1, "keyword"), (3, "title")])]);
        let grammar = compile(&def).unwrap();
        let mode = grammar.mode(child_ids(&grammar, grammar.root())[0]);
        assert_eq!(mode.begin_source(), r"(fn)(\s+)([a-z]+)");
        assert!(matches!(mode.begin_scope, Some(BoundaryScope::Groups(_))));
    }
}
