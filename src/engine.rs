//! Highlight driver
//!
//! [`Engine`] owns the grammar registry and the engine configuration. It is the
//! only entry point for highlighting: it resolves grammar names, runs the
//! runtime, and applies the safe-mode policy to whatever the runtime returns.
//!
//! ## Safe mode
//!
//! ```text
//! runtime result          safe mode                       strict mode
//! ----------------------  ------------------------------  -------------
//! Ok(outcome)             Ok(result)                      Ok(result)
//! IllegalLexeme           Ok(illegal, plain text)         Err
//! Regex                   Ok(plain text, error recorded)  Err
//! LoopDetected / Compile  Err                             Err
//! ```
//!
//! ## Autodetection
//!
//! Every candidate grammar highlights the text with illegals enabled. Results
//! are ranked by relevance; on a tie a grammar that declares itself a superset
//! of the other ranks below it. A plain-text result with relevance 0 always
//! takes part, so autodetection never fails for lack of a grammar.
//!
//! An `Engine` is `Send + Sync`: compiled grammars are immutable once built, and
//! every highlight call keeps its mode stack and tree to itself.

use crate::compiler::CompiledGrammar;
use crate::config::EngineConfig;
use crate::emitter::{escape_html, HtmlRenderer, Renderer, ScopeNode};
use crate::error::{EngineError, IllegalLexeme};
use crate::grammar::GrammarDefinition;
use crate::registry::GrammarRegistry;
use crate::runtime::{Continuation, Outcome, Runtime};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-call highlight settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightOptions {
    /// Treat illegal lexemes as plain text instead of stopping.
    pub ignore_illegals: bool,
    /// Override the engine's safe mode for this call.
    pub safe_mode: Option<bool>,
    /// Resume inside the modes a previous call left open.
    pub continuation: Option<Continuation>,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            ignore_illegals: true,
            safe_mode: None,
            continuation: None,
        }
    }
}

impl HighlightOptions {
    /// Stop at the first illegal lexeme.
    pub fn strict_illegals() -> Self {
        Self {
            ignore_illegals: false,
            ..Self::default()
        }
    }

    pub fn safe_mode(mut self, safe_mode: bool) -> Self {
        self.safe_mode = Some(safe_mode);
        self
    }

    pub fn continuation(mut self, continuation: Continuation) -> Self {
        self.continuation = Some(continuation);
        self
    }
}

/// Outcome of one highlight call.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightResult {
    /// Registered grammar name; `None` for the plain-text fallback.
    pub language: Option<String>,
    pub relevance: f64,
    /// An illegal lexeme stopped highlighting (safe mode only).
    pub illegal: bool,
    pub tree: ScopeNode,
    /// HTML rendering of `tree` with the engine's class prefix.
    pub value: String,
    pub illegal_by: Option<IllegalLexeme>,
    /// Runtime failure swallowed by safe mode.
    pub error_raised: Option<EngineError>,
    /// Runner-up of an autodetection.
    pub second_best: Option<Box<HighlightResult>>,
    /// Modes still open at the end of the text.
    pub continuation: Option<Continuation>,
}

impl HighlightResult {
    /// Plain-text result: one escaped text leaf, relevance 0.
    pub fn plain(text: &str, language: Option<String>) -> Self {
        Self {
            language,
            relevance: 0.0,
            illegal: false,
            tree: ScopeNode::plain(text),
            value: escape_html(text),
            illegal_by: None,
            error_raised: None,
            second_best: None,
            continuation: None,
        }
    }

    /// Render the scope tree with any backend.
    pub fn render<R: Renderer>(&self, renderer: R) -> R::Output {
        self.tree.render(renderer)
    }
}

/// Grammar registry plus configuration; the highlight entry point.
///
/// # Examples
///
/// ```ignore
/// let engine = Engine::with_defaults();
/// let result = engine.highlight(r#"{"a": 1}"#, "json", &HighlightOptions::default())?;
/// assert_eq!(result.language.as_deref(), Some("json"));
///
/// let guess = engine.highlight_auto("#!/bin/sh\necho hi", None)?;
/// ```
pub struct Engine {
    config: EngineConfig,
    registry: GrammarRegistry,
}

impl Engine {
    /// An engine with no grammars and default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            registry: GrammarRegistry::new(),
        }
    }

    /// An engine with the bundled grammars registered.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        crate::languages::register_defaults(&mut engine);
        engine
    }

    /// Replace the configuration. Takes `&mut self`, so no highlight can be
    /// running while it changes.
    pub fn configure(&mut self, config: EngineConfig) {
        debug!(?config, "engine configured");
        self.config = config;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register the definition produced by `factory` under `name` and
    /// `aliases`. The factory runs once, immediately.
    pub fn register_grammar<F>(&mut self, name: &str, factory: F, aliases: &[&str])
    where
        F: FnOnce() -> GrammarDefinition,
    {
        self.register_definition(name, factory(), aliases);
    }

    pub fn register_definition(&mut self, name: &str, definition: GrammarDefinition, aliases: &[&str]) {
        if self.registry.has(name) {
            warn!(grammar = name, "replacing previously registered grammar");
        }
        self.registry.register(name, definition, aliases);
    }

    pub fn unregister_grammar(&mut self, name: &str) {
        self.registry.unregister(name);
    }

    pub fn register_aliases(&mut self, aliases: &[&str], name: &str) {
        self.registry.register_aliases(aliases, name);
    }

    /// Registered grammar names, sorted.
    pub fn list_grammars(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn grammar(&self, name_or_alias: &str) -> Option<&GrammarDefinition> {
        self.registry.get(name_or_alias)
    }

    /// Whether a registered grammar takes part in autodetection.
    pub fn autodetection_enabled(&self, name_or_alias: &str) -> bool {
        self.registry
            .get(name_or_alias)
            .is_some_and(|definition| !definition.disable_autodetect)
    }

    /// Registered name and compiled form of a grammar, compiling on first use.
    pub(crate) fn resolve(
        &self,
        name_or_alias: &str,
    ) -> Result<Option<(String, Arc<CompiledGrammar>)>, EngineError> {
        let Some(name) = self.registry.resolve_name(name_or_alias) else {
            return Ok(None);
        };
        let grammar = self
            .registry
            .compiled(name)
            .map_err(|source| EngineError::Compile {
                grammar: name.to_string(),
                source,
            })?;
        Ok(grammar.map(|grammar| (name.to_string(), grammar)))
    }

    /// Highlight `text` with the named grammar.
    pub fn highlight(
        &self,
        text: &str,
        name_or_alias: &str,
        options: &HighlightOptions,
    ) -> Result<HighlightResult, EngineError> {
        let (name, grammar) = self
            .resolve(name_or_alias)?
            .ok_or_else(|| EngineError::UnknownGrammar(name_or_alias.to_string()))?;
        let safe_mode = options.safe_mode.unwrap_or(self.config.safe_mode);

        let outcome = Runtime::new(self, &name, &grammar, text, options.ignore_illegals, safe_mode)
            .resume_from(options.continuation.clone())
            .run();
        self.settle(text, name, outcome, safe_mode)
    }

    /// Apply the safe-mode policy to a runtime outcome.
    fn settle(
        &self,
        text: &str,
        name: String,
        outcome: Result<Outcome, EngineError>,
        safe_mode: bool,
    ) -> Result<HighlightResult, EngineError> {
        match outcome {
            Ok(outcome) => {
                let value = outcome
                    .tree
                    .render(HtmlRenderer::new(&self.config.class_prefix));
                Ok(HighlightResult {
                    language: Some(name),
                    relevance: outcome.relevance,
                    illegal: false,
                    tree: outcome.tree,
                    value,
                    illegal_by: None,
                    error_raised: None,
                    second_best: None,
                    continuation: Some(outcome.continuation),
                })
            }
            Err(EngineError::IllegalLexeme(illegal)) if safe_mode => {
                debug!(grammar = %name, %illegal, "illegal lexeme, falling back to plain text");
                let mut result = HighlightResult::plain(text, Some(name));
                result.illegal = true;
                result.illegal_by = Some(*illegal);
                Ok(result)
            }
            // The requested grammar compiled before the run started, so a
            // compile error here comes from an embedded grammar.
            Err(error @ (EngineError::Regex { .. } | EngineError::Compile { .. })) if safe_mode => {
                warn!(grammar = %name, %error, "highlight failed, falling back to plain text");
                let mut result = HighlightResult::plain(text, Some(name));
                result.error_raised = Some(error);
                Ok(result)
            }
            Err(error) => Err(error),
        }
    }

    /// Highlight `text` with every candidate grammar and return the most
    /// relevant result, with the runner-up in `second_best`.
    ///
    /// Candidates default to the configured `autodetect_candidates`, or every
    /// registered grammar when that list is empty. Unknown names and grammars
    /// with autodetection disabled are skipped.
    pub fn highlight_auto(
        &self,
        text: &str,
        candidates: Option<&[&str]>,
    ) -> Result<HighlightResult, EngineError> {
        let names: Vec<String> = match candidates {
            Some(candidates) => candidates.iter().map(|c| c.to_string()).collect(),
            None if !self.config.autodetect_candidates.is_empty() => {
                self.config.autodetect_candidates.clone()
            }
            None => self.list_grammars(),
        };

        let options = HighlightOptions::strict_illegals();
        let mut results = vec![HighlightResult::plain(text, None)];
        for name in names
            .iter()
            .filter(|name| self.registry.has(name) && self.autodetection_enabled(name))
        {
            match self.highlight(text, name, &options) {
                Ok(result) => results.push(result),
                Err(error) => warn!(grammar = %name, %error, "skipping autodetection candidate"),
            }
        }

        let mut ranked = self.rank(results).into_iter();
        let Some(mut best) = ranked.next() else {
            return Ok(HighlightResult::plain(text, None));
        };
        trace!(
            best = ?best.language,
            relevance = best.relevance,
            "autodetection finished"
        );
        best.second_best = ranked.next().map(Box::new);
        Ok(best)
    }

    /// Stable insertion sort by [`Engine::ranks_before`]. The ordering is not
    /// total, so a library sort could panic or reorder ties.
    fn rank(&self, results: Vec<HighlightResult>) -> Vec<HighlightResult> {
        let mut ranked: Vec<HighlightResult> = Vec::with_capacity(results.len());
        for result in results {
            let mut at = ranked.len();
            while at > 0 && self.ranks_before(&result, &ranked[at - 1]) {
                at -= 1;
            }
            ranked.insert(at, result);
        }
        ranked
    }

    fn ranks_before(&self, a: &HighlightResult, b: &HighlightResult) -> bool {
        if a.relevance != b.relevance {
            return a.relevance > b.relevance;
        }
        let (Some(a), Some(b)) = (a.language.as_deref(), b.language.as_deref()) else {
            return false;
        };
        if self.is_superset(a, b) {
            return false;
        }
        self.is_superset(b, a)
    }

    fn is_superset(&self, superset: &str, subset: &str) -> bool {
        self.registry
            .get(superset)
            .and_then(|definition| definition.superset_of.as_deref())
            .and_then(|declared| self.registry.resolve_name(declared))
            == Some(subset)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
