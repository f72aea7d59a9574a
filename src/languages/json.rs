//! JSON, with the comments and single-quoted strings JSONC and JSON5 allow.

use crate::grammar::{GrammarDefinition, Keywords, Mode};
use crate::modes;

pub fn definition() -> GrammarDefinition {
    let literals = ["true", "false", "null"];

    GrammarDefinition::new("JSON")
        .aliases(["jsonc", "json5"])
        .keywords(Keywords::new().with("literal", literals))
        .contains([
            Mode::new()
                .scope("attr")
                .begin(r#"(("(\\.|[^\\"\r\n])*")|('(\\.|[^\\'\r\n])*'))(?=\s*:)"#)
                .relevance(1.01),
            Mode::new()
                .scope("punctuation")
                .matches(r"[{}\[\],:]")
                .relevance(0.0),
            modes::apos_string(),
            modes::quote_string(),
            Mode::new()
                .scope("literal")
                .begin_keywords(&literals.join(" ")),
            modes::data_number(),
            modes::c_line_comment(),
            modes::c_block_comment(),
        ])
        .illegal(r"\S")
}
