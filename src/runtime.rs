//! Mode stack runtime
//!
//! Drives one highlight call: asks the active mode's matcher for the next
//! match, applies it, and repeats until the input is exhausted.
//!
//! ## State machine
//!
//! ```text
//!            begin (child mode)            end (own or ancestor's)
//!   stack: [root, a]  ───────────▶  [root, a, b]  ───────────▶  [root, a]
//!                                                                 └─ push `starts` of b, if any
//! ```
//!
//! - **begin**: pending text is flushed, the child's scope is opened and a
//!   [`ModeContext`] pushed.
//! - **end**: contexts are popped up to the mode that owns the end (walking
//!   `ends_with_parent` ancestors and `ends_parent` modes), closing scopes and
//!   adding each popped mode's relevance.
//! - **illegal**: an error unless illegals are ignored, in which case the
//!   lexeme is plain text.
//! - **end of input**: pending text is flushed and open scopes closed. Modes
//!   still open contribute no relevance.
//!
//! Text between matches accumulates in a buffer and is classified against the
//! active mode's keyword table (or handed to an embedded grammar) whenever a
//! scope boundary is reached.

use crate::compiler::{BoundaryScope, CompiledGrammar, CompiledMode, ModeId};
use crate::emitter::{ScopeNode, TokenTree};
use crate::engine::Engine;
use crate::error::{EngineError, IllegalLexeme};
use crate::grammar::{Hook, SubLanguage};
use crate::matcher::{MatchFailure, RuleKind, RuleMatch, ScanCursor};
use std::collections::{BTreeMap, HashMap};
use std::mem;
use tracing::{debug, trace};

/// Occurrences of one keyword that still add relevance.
const MAX_KEYWORD_HITS: usize = 7;

/// Matcher iterations tolerated before the loop fuse may trip.
const MAX_ITERATIONS: usize = 100_000;

/// Characters of surrounding text kept on each side of an illegal lexeme.
const ILLEGAL_CONTEXT_CHARS: usize = 100;

/// Runtime instance of an open mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeContext {
    pub mode: ModeId,
    /// First capture of the begin match, for [`Hook::EndSameAsBegin`].
    pub begin_capture: Option<String>,
}

/// Mode stack left behind by a highlight call. Passing it to the next call
/// for the same grammar resumes inside the modes that were still open.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    grammar: String,
    stack: Vec<ModeContext>,
}

impl Continuation {
    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    /// Open modes, root first.
    pub fn stack(&self) -> &[ModeContext] {
        &self.stack
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub tree: ScopeNode,
    pub relevance: f64,
    pub continuation: Continuation,
}

pub(crate) struct Runtime<'a> {
    engine: &'a Engine,
    name: &'a str,
    grammar: &'a CompiledGrammar,
    text: &'a str,
    ignore_illegals: bool,
    safe_mode: bool,

    stack: Vec<ModeContext>,
    cursor: ScanCursor,
    emitter: TokenTree,
    buffer: String,
    relevance: f64,
    keyword_hits: HashMap<String, usize>,
    continuations: HashMap<String, Continuation>,
    /// Kind (begin or not) and offset of the previous accepted match.
    last_match: Option<(bool, usize)>,
    resume: bool,
    iterations: usize,
}

impl<'a> Runtime<'a> {
    pub fn new(
        engine: &'a Engine,
        name: &'a str,
        grammar: &'a CompiledGrammar,
        text: &'a str,
        ignore_illegals: bool,
        safe_mode: bool,
    ) -> Self {
        Self {
            engine,
            name,
            grammar,
            text,
            ignore_illegals,
            safe_mode,
            stack: vec![ModeContext {
                mode: grammar.root(),
                begin_capture: None,
            }],
            cursor: ScanCursor::default(),
            emitter: TokenTree::new(),
            buffer: String::new(),
            relevance: 0.0,
            keyword_hits: HashMap::new(),
            continuations: HashMap::new(),
            last_match: None,
            resume: false,
            iterations: 0,
        }
    }

    /// Start inside the modes a previous call left open, reopening their scopes.
    pub fn resume_from(mut self, continuation: Option<Continuation>) -> Self {
        let Some(continuation) = continuation else {
            return self;
        };
        if continuation.grammar != self.name || continuation.stack.is_empty() {
            return self;
        }
        for context in &continuation.stack[1..] {
            if let Some(scope) = self.mode(context.mode).scope() {
                self.emitter.open_node(scope);
            }
        }
        self.stack = continuation.stack;
        self
    }

    pub fn run(mut self) -> Result<Outcome, EngineError> {
        let mut index = 0;
        loop {
            self.iterations += 1;
            if self.resume {
                self.resume = false;
            } else {
                self.cursor.consider_all();
            }

            let top = self.top_mode();
            let found = top
                .matcher()
                .exec(&mut self.cursor, self.text, index)
                .map_err(|e| self.match_failure(e))?;
            let Some(found) = found else {
                break;
            };

            self.buffer.push_str(&self.text[index..found.index]);
            let processed = self.process_lexeme(&found)?;
            index = found.index + processed;
        }

        if let Some(rest) = self.text.get(index..) {
            self.buffer.push_str(rest);
        }
        self.process_buffer()?;

        trace!(grammar = self.name, relevance = self.relevance, "highlight finished");
        Ok(Outcome {
            tree: self.emitter.finalize(),
            relevance: self.relevance,
            continuation: Continuation {
                grammar: self.name.to_string(),
                stack: self.stack,
            },
        })
    }

    fn mode(&self, id: ModeId) -> &'a CompiledMode {
        let grammar: &'a CompiledGrammar = self.grammar;
        grammar.mode(id)
    }

    fn top_context(&self) -> &ModeContext {
        &self.stack[self.stack.len() - 1]
    }

    fn top_mode(&self) -> &'a CompiledMode {
        self.mode(self.top_context().mode)
    }

    /// Apply one match; returns how many bytes of input it consumed.
    fn process_lexeme(&mut self, found: &RuleMatch) -> Result<usize, EngineError> {
        let text = self.text;
        let lexeme = found.lexeme(text);

        // An empty end right where an empty begin matched would never move.
        if self.last_match == Some((true, found.index))
            && found.kind == RuleKind::End
            && lexeme.is_empty()
        {
            if !self.safe_mode {
                return Err(self.loop_detected(found.index, "zero-width begin and end at the same offset"));
            }
            return Ok(self.take_one_char(found.index));
        }
        self.last_match = Some((matches!(found.kind, RuleKind::Begin(_)), found.index));

        match found.kind {
            RuleKind::Begin(id) => return self.do_begin(id, found),
            RuleKind::Illegal if !self.ignore_illegals => return Err(self.illegal(found)),
            RuleKind::End => {
                if let Some(processed) = self.do_end(found)? {
                    return Ok(processed);
                }
            }
            RuleKind::Illegal => {}
        }

        if found.kind == RuleKind::Illegal && lexeme.is_empty() {
            return Ok(self.take_one_char(found.index));
        }

        if self.iterations > MAX_ITERATIONS && self.iterations > found.index * 3 {
            return Err(self.loop_detected(
                found.index,
                "far more matcher iterations than input consumed",
            ));
        }

        self.buffer.push_str(lexeme);
        Ok(lexeme.len())
    }

    /// Move the character at `index` into the buffer as plain text.
    fn take_one_char(&mut self, index: usize) -> usize {
        match self.text.get(index..).and_then(|rest| rest.chars().next()) {
            Some(c) => {
                self.buffer.push(c);
                c.len_utf8()
            }
            None => 1,
        }
    }

    fn do_begin(&mut self, id: ModeId, found: &RuleMatch) -> Result<usize, EngineError> {
        let text = self.text;
        let mode = self.mode(id);
        let lexeme = found.lexeme(text);

        let mut begin_capture = None;
        for hook in mode.hooks() {
            let ignored = match hook {
                Hook::IgnoreIfPrecededByDot => text[..found.index].ends_with('.'),
                Hook::OnlyAtInputStart => found.index != 0,
                Hook::EndSameAsBegin => {
                    begin_capture = found.group(text, 1).map(str::to_string);
                    false
                }
            };
            if ignored {
                return Ok(self.ignore_begin(found.index));
            }
        }

        let flags = mode.flags();
        if flags.skip {
            self.buffer.push_str(lexeme);
        } else {
            if flags.exclude_begin {
                self.buffer.push_str(lexeme);
            }
            self.process_buffer()?;
            if !flags.return_begin && !flags.exclude_begin {
                self.buffer = lexeme.to_string();
            }
        }
        self.start_new_mode(id, found, begin_capture)?;
        Ok(if flags.return_begin { 0 } else { lexeme.len() })
    }

    /// A hook rejected a begin match: retry the same offset with the rules
    /// after it, or give up on this character when none are left.
    fn ignore_begin(&mut self, index: usize) -> usize {
        if self.cursor.regex_index() == 0 {
            self.take_one_char(index)
        } else {
            self.resume = true;
            0
        }
    }

    fn start_new_mode(
        &mut self,
        id: ModeId,
        found: &RuleMatch,
        begin_capture: Option<String>,
    ) -> Result<(), EngineError> {
        let mode = self.mode(id);
        if let Some(scope) = mode.scope() {
            self.emitter.open_node(scope);
        }
        match &mode.begin_scope {
            Some(BoundaryScope::Wrap(scope)) => {
                let lexeme = mem::take(&mut self.buffer);
                self.emitter.add_keyword(&lexeme, scope);
            }
            Some(BoundaryScope::Groups(groups)) => {
                self.emit_groups(groups, found)?;
                self.buffer.clear();
            }
            None => {}
        }
        self.stack.push(ModeContext {
            mode: id,
            begin_capture,
        });
        Ok(())
    }

    /// Scoped parts become spans; unscoped parts are keyword-classified in
    /// the active mode.
    fn emit_groups(
        &mut self,
        groups: &BTreeMap<usize, Option<String>>,
        found: &RuleMatch,
    ) -> Result<(), EngineError> {
        let text = self.text;
        for (&group, scope) in groups {
            let Some(part) = found.group(text, group) else {
                continue;
            };
            match scope {
                Some(scope) => self.emitter.add_keyword(part, scope),
                None => self.process_keywords(part)?,
            }
        }
        Ok(())
    }

    fn do_end(&mut self, found: &RuleMatch) -> Result<Option<usize>, EngineError> {
        let text = self.text;
        let Some(end_depth) = self.end_of_mode(self.stack.len() - 1, found)? else {
            return Ok(None);
        };
        let ended = self.stack[end_depth].mode;
        let origin = self.top_mode();
        let flags = origin.flags();
        let lexeme = found.lexeme(text);

        match &origin.end_scope {
            Some(BoundaryScope::Wrap(scope)) => {
                self.process_buffer()?;
                self.emitter.add_keyword(lexeme, scope);
            }
            Some(BoundaryScope::Groups(groups)) => {
                self.process_buffer()?;
                self.emit_groups(groups, found)?;
            }
            None if flags.skip => self.buffer.push_str(lexeme),
            None => {
                if !(flags.return_end || flags.exclude_end) {
                    self.buffer.push_str(lexeme);
                }
                self.process_buffer()?;
                if flags.exclude_end {
                    self.buffer = lexeme.to_string();
                }
            }
        }

        while self.stack.len() > end_depth {
            let Some(context) = self.stack.pop() else {
                break;
            };
            let mode = self.mode(context.mode);
            if mode.scope().is_some() {
                self.emitter.close_node();
            }
            if !mode.flags().skip && mode.sub_language().is_none() {
                self.relevance += mode.relevance();
            }
        }

        if let Some(starts) = self.mode(ended).starts() {
            self.start_new_mode(starts, found, None)?;
        }
        Ok(Some(if flags.return_end { 0 } else { lexeme.len() }))
    }

    /// Stack depth of the mode this end match closes, if any. The root never
    /// closes.
    fn end_of_mode(&self, depth: usize, found: &RuleMatch) -> Result<Option<usize>, EngineError> {
        if depth == 0 {
            return Ok(None);
        }
        let context = &self.stack[depth];
        let mode = self.mode(context.mode);

        let mut matched = match &mode.end_re {
            Some(re) => re
                .find_from_pos(self.text, found.index)
                .map_err(|e| self.regex_failure(e))?
                .is_some_and(|m| m.start() == found.index),
            None => false,
        };
        if matched && mode.has_hook(Hook::EndSameAsBegin) {
            matched = context.begin_capture.as_deref() == found.group(self.text, 1);
        }

        if matched {
            let mut depth = depth;
            while depth > 1 && self.mode(self.stack[depth].mode).flags().ends_parent {
                depth -= 1;
            }
            return Ok(Some(depth));
        }
        if mode.flags().ends_with_parent {
            return self.end_of_mode(depth - 1, found);
        }
        Ok(None)
    }

    fn process_buffer(&mut self) -> Result<(), EngineError> {
        if self.top_mode().sub_language().is_some() {
            self.process_sub_language()?;
        } else {
            let buffer = mem::take(&mut self.buffer);
            self.process_keywords(&buffer)?;
        }
        self.buffer.clear();
        Ok(())
    }

    /// Emit `text` in the active mode, wrapping keyword hits in their scope.
    fn process_keywords(&mut self, text: &str) -> Result<(), EngineError> {
        let Some(table) = self.top_mode().keywords() else {
            self.emitter.add_text(text);
            return Ok(());
        };

        let mut last = 0;
        let mut plain = String::new();
        for word in table.pattern().find_iter(text) {
            let word = word.map_err(|e| self.regex_failure(e))?;
            plain.push_str(&text[last..word.start()]);
            last = word.end();

            let Some(entry) = table.lookup(word.as_str()) else {
                plain.push_str(word.as_str());
                continue;
            };

            self.emitter.add_text(&plain);
            plain.clear();

            let key = if self.grammar.case_insensitive() {
                word.as_str().to_lowercase()
            } else {
                word.as_str().to_string()
            };
            let hits = self.keyword_hits.entry(key).or_insert(0);
            *hits += 1;
            if *hits <= MAX_KEYWORD_HITS {
                self.relevance += entry.relevance;
            }

            match &entry.scope {
                Some(scope) => self.emitter.add_keyword(word.as_str(), scope),
                None => plain.push_str(word.as_str()),
            }
        }
        plain.push_str(&text[last..]);
        self.emitter.add_text(&plain);
        Ok(())
    }

    fn process_sub_language(&mut self) -> Result<(), EngineError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let code = mem::take(&mut self.buffer);
        let top = self.top_mode();
        let Some(sub_language) = top.sub_language() else {
            return Ok(());
        };

        let (tree, relevance, language) = match sub_language {
            SubLanguage::One(requested) => {
                let Some((name, grammar)) = self.engine.resolve(requested)? else {
                    debug!(sub_language = %requested, "unknown sub-language, emitting plain text");
                    self.emitter.add_text(&code);
                    return Ok(());
                };
                let outcome = Runtime::new(self.engine, &name, &grammar, &code, true, self.safe_mode)
                    .resume_from(self.continuations.get(requested).cloned())
                    .run()?;
                self.continuations
                    .insert(requested.clone(), outcome.continuation);
                (outcome.tree, outcome.relevance, Some(name))
            }
            SubLanguage::Candidates(candidates) => {
                let candidates: Vec<&str> = candidates.iter().map(String::as_str).collect();
                let subset = (!candidates.is_empty()).then_some(candidates.as_slice());
                let result = self.engine.highlight_auto(&code, subset)?;
                (result.tree, result.relevance, result.language)
            }
        };

        if top.sub_language_relevance {
            self.relevance += relevance;
        }
        self.emitter.add_sublanguage(tree, language.as_deref());
        Ok(())
    }

    fn illegal(&self, found: &RuleMatch) -> EngineError {
        let lexeme = found.lexeme(self.text);
        let mode = self
            .top_mode()
            .scope()
            .unwrap_or("<unnamed>")
            .to_string();
        debug!(grammar = self.name, lexeme, mode = %mode, offset = found.index, "illegal lexeme");
        EngineError::IllegalLexeme(Box::new(IllegalLexeme {
            lexeme: lexeme.to_string(),
            mode,
            offset: found.index,
            context: context_window(self.text, found.index),
        }))
    }

    fn loop_detected(&self, offset: usize, reason: &str) -> EngineError {
        EngineError::LoopDetected {
            grammar: self.name.to_string(),
            offset,
            reason: reason.to_string(),
        }
    }

    fn regex_failure(&self, error: fancy_regex::Error) -> EngineError {
        EngineError::Regex {
            grammar: self.name.to_string(),
            message: error.to_string(),
        }
    }

    fn match_failure(&self, failure: MatchFailure) -> EngineError {
        match failure {
            MatchFailure::Compile(source) => EngineError::Compile {
                grammar: self.name.to_string(),
                source,
            },
            MatchFailure::Regex(error) => self.regex_failure(error),
        }
    }
}

/// Up to [`ILLEGAL_CONTEXT_CHARS`] characters either side of `offset`.
fn context_window(text: &str, offset: usize) -> String {
    let start = text[..offset]
        .char_indices()
        .rev()
        .nth(ILLEGAL_CONTEXT_CHARS - 1)
        .map_or(0, |(i, _)| i);
    let end = text[offset..]
        .char_indices()
        .nth(ILLEGAL_CONTEXT_CHARS)
        .map_or(text.len(), |(i, _)| offset + i);
    text[start..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_window_is_bounded_on_both_sides() {
        let text = format!("{}X{}", "a".repeat(150), "b".repeat(150));
        let window = context_window(&text, 150);
        assert_eq!(window, format!("{}X{}", "a".repeat(100), "b".repeat(99)));
        assert_eq!(context_window("aXb", 1), "aXb");
    }

    #[test]
    fn context_window_respects_char_boundaries() {
        let text = "ééé!ééé";
        let offset = text.find('!').unwrap();
        assert_eq!(context_window(text, offset), text);
    }
}
