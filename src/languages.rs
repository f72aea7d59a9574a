//! Bundled grammars
//!
//! Each submodule exposes a `definition()` factory. [`register_defaults`]
//! registers all of them with their aliases.

pub mod bash;
pub mod json;
pub mod q;
pub mod rust;

use crate::engine::Engine;

/// Register every bundled grammar under its lowercase name.
pub fn register_defaults(engine: &mut Engine) {
    engine.register_grammar("bash", bash::definition, &[]);
    engine.register_grammar("json", json::definition, &[]);
    engine.register_grammar("q", q::definition, &[]);
    engine.register_grammar("rust", rust::definition, &[]);
}
