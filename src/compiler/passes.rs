//! Desugaring passes
//!
//! Each mode goes through these passes, in this order, right before it is
//! compiled:
//!
//! 1. `className` becomes `scope`
//! 2. `match` becomes `begin`
//! 3. `beforeMatch` splits the mode into a look-ahead `begin` and a `starts`
//!    mode holding the original
//! 4. per-group scopes: sequence `begin`/`end` patterns are joined and their
//!    parts' group numbers recorded
//! 5. `beginKeywords` becomes a boundary-anchored `begin`
//! 6. sequence `illegal` becomes an alternation

use super::BoundaryScope;
use crate::error::CompileError;
use crate::grammar::{Hook, Keywords, Mode, ModeRef, Pattern, ScopeSpec};
use crate::pattern::{concat, count_groups, either, lookahead, rewrite_backreferences};
use std::collections::BTreeMap;

/// A mode with every shorthand resolved. `rest` keeps the attributes the
/// passes do not touch (children, flags, sub-language, ...).
#[derive(Debug)]
pub(super) struct Lowered {
    pub scope: Option<String>,
    pub begin_scope: Option<BoundaryScope>,
    pub end_scope: Option<BoundaryScope>,
    pub begin: Option<String>,
    pub end: Option<String>,
    pub illegal: Option<String>,
    pub keywords: Option<Keywords>,
    pub hooks: Vec<Hook>,
    pub rest: Mode,
}

pub(super) fn lower(
    mut mode: Mode,
    has_parent: bool,
    aliases: &BTreeMap<String, String>,
) -> Result<Lowered, CompileError> {
    scope_class_name(&mut mode);
    compile_match(&mut mode)?;
    let mut mode = before_match(mode)?;

    let alias = |scope: String| aliases.get(&scope).cloned().unwrap_or(scope);

    let mut begin_scope = mode.begin_scope.take();
    let scope = match mode.scope.take() {
        Some(ScopeSpec::Name(name)) => Some(alias(name)),
        Some(groups @ ScopeSpec::Groups(_)) => {
            begin_scope = Some(groups);
            None
        }
        None => None,
    };

    let (begin, begin_scope) = multi_class(
        mode.begin.take(),
        begin_scope,
        "begin",
        Mode::flag(mode.skip) || Mode::flag(mode.exclude_begin) || Mode::flag(mode.return_begin),
        &alias,
    )?;
    let (end, end_scope) = multi_class(
        mode.end.take(),
        mode.end_scope.take(),
        "end",
        Mode::flag(mode.skip) || Mode::flag(mode.exclude_end) || Mode::flag(mode.return_end),
        &alias,
    )?;

    let mut hooks = mode.hooks.take().unwrap_or_default();
    let mut keywords = mode.keywords.take();
    let mut begin = begin;
    if let Some(words) = mode.begin_keywords.take().filter(|_| has_parent) {
        let alternatives: Vec<&str> = words.split_whitespace().collect();
        begin = Some(format!(r"\b({})(?!\.)(?=\b|\s)", alternatives.join("|")));
        hooks.insert(0, Hook::IgnoreIfPrecededByDot);
        keywords = keywords.or_else(|| Some(Keywords::from(words.as_str())));
    }

    let illegal = mode.illegal.take().map(|illegal| match illegal {
        Pattern::Source(source) => source,
        Pattern::Sequence(parts) => either(parts),
    });

    Ok(Lowered {
        scope,
        begin_scope,
        end_scope,
        begin,
        end,
        illegal,
        keywords,
        hooks,
        rest: mode,
    })
}

fn scope_class_name(mode: &mut Mode) {
    if let Some(class_name) = mode.class_name.take() {
        mode.scope = Some(class_name);
    }
}

fn compile_match(mode: &mut Mode) -> Result<(), CompileError> {
    if let Some(pattern) = mode.match_pattern.take() {
        if mode.begin.is_some() || mode.end.is_some() {
            return Err(CompileError::MatchWithBeginEnd);
        }
        mode.begin = Some(pattern);
    }
    Ok(())
}

/// `{ beforeMatch: P, begin: B, ...rest }` becomes
/// `{ begin: P(?=B), starts: { contains: [{ begin: B, endsParent, ...rest }] } }`.
fn before_match(mut mode: Mode) -> Result<Mode, CompileError> {
    let Some(prefix) = mode.before_match.take() else {
        return Ok(mode);
    };
    if mode.starts.is_some() {
        return Err(CompileError::BeforeMatchWithStarts);
    }

    let begin = match &mode.begin {
        Some(Pattern::Source(source)) => source.clone(),
        Some(Pattern::Sequence(parts)) => rewrite_backreferences(parts, ""),
        None => String::new(),
    };
    let keywords = mode.keywords.clone();
    mode.ends_parent = Some(true);

    Ok(Mode {
        keywords,
        begin: Some(Pattern::Source(concat([prefix, lookahead(begin)]))),
        starts: Some(Box::new(Mode {
            relevance: Some(0.0),
            contains: Some(vec![ModeRef::from(mode)]),
            ..Mode::default()
        })),
        relevance: Some(0.0),
        ..Mode::default()
    })
}

/// Resolve a boundary pattern and its scope. A sequence pattern is joined
/// into one source whose parts each sit in their own capture group; the scope
/// map is re-keyed from part numbers to those group numbers.
fn multi_class(
    pattern: Option<Pattern>,
    scope: Option<ScopeSpec>,
    which: &str,
    incompatible_flags: bool,
    alias: &dyn Fn(String) -> String,
) -> Result<(Option<String>, Option<BoundaryScope>), CompileError> {
    match pattern {
        Some(Pattern::Sequence(parts)) => {
            if incompatible_flags {
                return Err(CompileError::MultiScope(format!(
                    "skip, exclude and return flags cannot be combined with a sequence `{which}`"
                )));
            }
            let Some(ScopeSpec::Groups(names)) = scope else {
                return Err(CompileError::MultiScope(format!(
                    "a sequence `{which}` needs a group → scope map"
                )));
            };

            let mut groups = BTreeMap::new();
            let mut offset = 0;
            for (i, part) in parts.iter().enumerate() {
                let number = i + 1;
                groups.insert(number + offset, names.get(&number).cloned().map(alias));
                offset += count_groups(part);
            }
            Ok((
                Some(rewrite_backreferences(&parts, "")),
                Some(BoundaryScope::Groups(groups)),
            ))
        }
        Some(Pattern::Source(source)) => match scope {
            Some(ScopeSpec::Groups(_)) => Err(CompileError::MultiScope(format!(
                "a group → scope map needs a sequence `{which}`"
            ))),
            Some(ScopeSpec::Name(name)) => Ok((Some(source), Some(BoundaryScope::Wrap(alias(name))))),
            None => Ok((Some(source), None)),
        },
        None => Ok((None, scope_without_pattern(scope, alias))),
    }
}

fn scope_without_pattern(
    scope: Option<ScopeSpec>,
    alias: &dyn Fn(String) -> String,
) -> Option<BoundaryScope> {
    match scope {
        Some(ScopeSpec::Name(name)) => Some(BoundaryScope::Wrap(alias(name))),
        _ => None,
    }
}
