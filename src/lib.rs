//! # hilite
//!
//! A grammar-driven syntax highlighter. Grammars are declarative trees of
//! modes (begin/end patterns, keyword tables, nesting rules); the engine
//! compiles them once and turns text into a tree of scoped spans, which
//! renderers turn into HTML or flat token lists.
//!
//! ## Pipeline
//!
//! ```text
//! GrammarDefinition ──compile──▶ CompiledGrammar (arena of modes + matchers)
//!                                       │
//! text ──▶ Runtime (mode stack) ──events──▶ TokenTree ──▶ ScopeNode ──▶ Renderer
//! ```
//!
//! - [`pattern`]: regex source combinators and backreference renumbering.
//! - [`grammar`]: the definition data model, buildable in Rust or loaded from
//!   JSON/YAML.
//! - [`compiler`]: desugaring and compilation into immutable modes.
//! - [`matcher`]: one alternation regex per mode, with resumable scanning.
//! - [`runtime`]: the mode stack that drives a single highlight call.
//! - [`emitter`]: the scope tree and its renderers.
//! - [`engine`]: grammar registry, safe-mode policy and autodetection.
//!
//! ## Usage
//!
//! ```ignore
//! use hilite::{Engine, HighlightOptions};
//!
//! let engine = Engine::with_defaults();
//! let result = engine.highlight("let x = 1;", "rust", &HighlightOptions::default())?;
//! println!("{}", result.value);
//!
//! let guess = engine.highlight_auto("echo $HOME", None)?;
//! println!("{:?} ({})", guess.language, guess.relevance);
//! ```

pub mod compiler;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod languages;
pub mod matcher;
pub mod modes;
pub mod pattern;
pub mod registry;
pub mod runtime;

pub use compiler::{compile, CompiledGrammar};
pub use config::{EngineConfig, Loader};
pub use emitter::{HtmlRenderer, Node, Renderer, ScopeNode, Token, TokenListRenderer};
pub use engine::{Engine, HighlightOptions, HighlightResult};
pub use error::{CompileError, EngineError, GrammarLoadError, IllegalLexeme};
pub use grammar::{GrammarDefinition, Hook, Keywords, Mode, ModeRef, Pattern, ScopeSpec};
pub use runtime::Continuation;
