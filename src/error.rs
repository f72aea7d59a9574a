//! Error taxonomy
//!
//! Compile-time problems ([`CompileError`]) never reach the matcher: a grammar
//! either compiles completely or not at all. Runtime problems surface as
//! [`EngineError`] from the engine boundary, where the safe-mode policy decides
//! whether an illegal lexeme becomes a flagged result or an error.

use thiserror::Error;

/// A grammar definition that cannot be turned into a compiled grammar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The regex engine rejected a pattern.
    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// `match` is shorthand for a lone `begin` and cannot be mixed with `begin`/`end`.
    #[error("`match` cannot be combined with `begin` or `end`")]
    MatchWithBeginEnd,

    /// `before_match` rewrites the mode into a `begin` + `starts` pair.
    #[error("`before_match` cannot be combined with `starts`")]
    BeforeMatchWithStarts,

    /// The grammar's top-level mode has nothing to refer back to.
    #[error("`self` is not allowed in the top-level `contains` of grammar `{0}`")]
    SelfAtTopLevel(String),

    /// A string reference in `contains` names no entry of the grammar's `modes`.
    #[error("unknown mode reference `{0}`")]
    UnknownModeReference(String),

    /// Per-group scopes used inconsistently.
    #[error("invalid per-group scopes: {0}")]
    MultiScope(String),

    /// Parent-dependent modes kept nesting without reaching a fixed point.
    #[error("mode nesting exceeds {0} levels")]
    NestingTooDeep(usize),
}

/// Where and why an illegal lexeme stopped highlighting.
#[derive(Debug, Clone, PartialEq)]
pub struct IllegalLexeme {
    /// The offending text.
    pub lexeme: String,
    /// Scope of the mode that declared the illegal pattern, or `<unnamed>`.
    pub mode: String,
    /// Byte offset of the lexeme in the highlighted text.
    pub offset: usize,
    /// Up to 100 characters either side of the offset.
    pub context: String,
}

impl std::fmt::Display for IllegalLexeme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Illegal lexeme {:?} for mode \"{}\" at offset {}",
            self.lexeme, self.mode, self.offset
        )
    }
}

/// Failures surfaced by [`Engine`](crate::engine::Engine) calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The requested grammar name or alias is not registered.
    #[error("unknown grammar `{0}`")]
    UnknownGrammar(String),

    /// The grammar failed to compile.
    #[error("failed to compile grammar `{grammar}`: {source}")]
    Compile {
        grammar: String,
        #[source]
        source: CompileError,
    },

    /// Text matched a mode's illegal pattern while illegals were not ignored.
    #[error("{0}")]
    IllegalLexeme(Box<IllegalLexeme>),

    /// The matcher stopped making progress; always a grammar defect.
    #[error("loop detected in grammar `{grammar}` at offset {offset}: {reason}")]
    LoopDetected {
        grammar: String,
        offset: usize,
        reason: String,
    },

    /// The regex engine failed while matching (e.g. backtracking limit).
    #[error("regex failure in grammar `{grammar}`: {message}")]
    Regex { grammar: String, message: String },
}

/// Grammar data files that cannot be read or deserialized.
#[derive(Debug, Error)]
pub enum GrammarLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON grammar: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML grammar: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported grammar file extension `{0}`")]
    UnsupportedFormat(String),
}
