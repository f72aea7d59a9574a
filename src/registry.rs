//! Grammar registry
//!
//! Grammars are registered by name, looked up by name or alias
//! (case-insensitively), and compiled lazily on first use. The compiled form
//! is cached per entry and shared by every later highlight call.

use crate::compiler::{compile, CompiledGrammar};
use crate::error::CompileError;
use crate::grammar::GrammarDefinition;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

struct Entry {
    definition: GrammarDefinition,
    compiled: OnceCell<Arc<CompiledGrammar>>,
}

/// Registry of grammar definitions and their compiled forms.
///
/// # Examples
///
/// ```ignore
/// let mut registry = GrammarRegistry::new();
/// registry.register("ini", GrammarDefinition::new("INI"), &["cfg"]);
///
/// assert!(registry.has("CFG"));
/// let grammar = registry.compiled("ini")?.unwrap();
/// ```
#[derive(Default)]
pub struct GrammarRegistry {
    grammars: HashMap<String, Entry>,
    aliases: HashMap<String, String>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a grammar under `name` plus the given aliases and the
    /// definition's own aliases. Replaces an existing grammar of that name.
    pub fn register(&mut self, name: &str, definition: GrammarDefinition, aliases: &[&str]) {
        let name = name.to_lowercase();
        let own_aliases = definition.aliases.clone();
        self.grammars.insert(
            name.clone(),
            Entry {
                definition,
                compiled: OnceCell::new(),
            },
        );
        for alias in aliases.iter().copied().chain(own_aliases.iter().map(String::as_str)) {
            self.aliases.insert(alias.to_lowercase(), name.clone());
        }
        debug!(grammar = %name, "registered grammar");
    }

    /// Point extra aliases at a registered grammar.
    pub fn register_aliases(&mut self, aliases: &[&str], name: &str) {
        let name = name.to_lowercase();
        for alias in aliases {
            self.aliases.insert(alias.to_lowercase(), name.clone());
        }
    }

    /// Remove a grammar and every alias pointing at it.
    pub fn unregister(&mut self, name: &str) {
        let name = name.to_lowercase();
        self.grammars.remove(&name);
        self.aliases.retain(|_, target| *target != name);
    }

    /// Registered name for a name or alias.
    pub fn resolve_name(&self, name_or_alias: &str) -> Option<&str> {
        let key = name_or_alias.to_lowercase();
        if let Some((name, _)) = self.grammars.get_key_value(&key) {
            return Some(name.as_str());
        }
        let target = self.aliases.get(&key)?;
        self.grammars
            .get_key_value(target)
            .map(|(name, _)| name.as_str())
    }

    pub fn has(&self, name_or_alias: &str) -> bool {
        self.resolve_name(name_or_alias).is_some()
    }

    pub fn get(&self, name_or_alias: &str) -> Option<&GrammarDefinition> {
        let name = self.resolve_name(name_or_alias)?;
        self.grammars.get(name).map(|entry| &entry.definition)
    }

    /// Compiled grammar for a name or alias, compiling on first request.
    /// `Ok(None)` when nothing is registered under that name.
    pub fn compiled(
        &self,
        name_or_alias: &str,
    ) -> Result<Option<Arc<CompiledGrammar>>, CompileError> {
        let Some(name) = self.resolve_name(name_or_alias) else {
            return Ok(None);
        };
        let Some(entry) = self.grammars.get(name) else {
            return Ok(None);
        };
        if entry.compiled.get().is_some() {
            trace!(grammar = name, "compiled grammar cache hit");
        }
        entry
            .compiled
            .get_or_try_init(|| compile(&entry.definition).map(Arc::new))
            .map(|grammar| Some(Arc::clone(grammar)))
    }

    /// All registered names (sorted).
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.grammars.keys().cloned().collect();
        names.sort();
        names
    }
}
