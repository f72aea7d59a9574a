//! Reusable modes and pattern fragments shared by grammar definitions.
//!
//! Every function returns a fresh [`Mode`]; callers adjust it with the builder
//! methods or [`Mode::inherit`].

use crate::grammar::{Hook, Mode, ModeRef, Pattern};
use crate::pattern::{concat, either};

pub const IDENT_RE: &str = r"[a-zA-Z]\w*";
pub const UNDERSCORE_IDENT_RE: &str = r"[a-zA-Z_]\w*";
pub const NUMBER_RE: &str = r"\b\d+(\.\d+)?";
pub const C_NUMBER_RE: &str =
    r"(-?)(\b0[xX][a-fA-F0-9]+|(\b\d+(\.\d*)?|\.\d+)([eE][-+]?\d+)?)";
pub const BINARY_NUMBER_RE: &str = r"\b(0b[01]+)";
/// Never matches.
pub const MATCH_NOTHING_RE: &str = r"\b\B";

const DOCTAG_WORDS: &str = "(TODO|FIXME|NOTE|BUG|OPTIMIZE|HACK|XXX):";

/// `\` followed by any character.
pub fn backslash_escape() -> Mode {
    Mode::new().begin(r"\\[\s\S]").relevance(0.0)
}

/// Single-quoted string on one line.
pub fn apos_string() -> Mode {
    Mode::new()
        .scope("string")
        .begin("'")
        .end("'")
        .illegal(r"\n")
        .contains([backslash_escape()])
        .relevance(1.0)
}

/// Double-quoted string on one line.
pub fn quote_string() -> Mode {
    Mode::new()
        .scope("string")
        .begin("\"")
        .end("\"")
        .illegal(r"\n")
        .contains([backslash_escape()])
        .relevance(1.0)
}

pub fn number() -> Mode {
    Mode::new().scope("number").begin(NUMBER_RE).relevance(0.0)
}

/// Decimal, hex and exponent literals with an optional leading minus.
pub fn c_number() -> Mode {
    Mode::new().scope("number").begin(C_NUMBER_RE).relevance(0.0)
}

pub fn binary_number() -> Mode {
    Mode::new()
        .scope("number")
        .begin(BINARY_NUMBER_RE)
        .relevance(0.0)
}

/// A comment between `begin` and `end`, with `TODO:`-style doctags and a
/// relevance bump for runs of ordinary English words.
pub fn comment(begin: &str, end: &str) -> Mode {
    comment_with(begin, end, Mode::new())
}

/// [`comment`] with `overrides` merged in. Children of `overrides` come
/// before the doctag and prose children.
pub fn comment_with(begin: &str, end: &str, overrides: Mode) -> Mode {
    let mut mode = Mode::new()
        .scope("comment")
        .begin(begin)
        .end(end)
        .relevance(1.0)
        .inherit(overrides);

    let prose_word = either([
        "I",
        "a",
        "is",
        "so",
        "us",
        "to",
        "at",
        "if",
        "in",
        "it",
        "on",
        r"[A-Za-z]+['](d|ve|re|ll|t|s|n)",
        r"[A-Za-z]+[-][a-z]+",
        r"[A-Za-z][a-z]{2,}",
    ]);
    let doctag = Mode::new()
        .scope("doctag")
        .begin(format!("[ ]*(?={DOCTAG_WORDS})"))
        .end(DOCTAG_WORDS)
        .exclude_begin()
        .relevance(0.0);
    let prose = Mode::new()
        .begin(concat([
            "[ ]+(",
            prose_word.as_str(),
            r"[.]?[:]?([.][ ]|[ ])){3}",
        ]))
        .relevance(1.0);

    let contains = mode.contains.get_or_insert_with(Vec::new);
    contains.push(ModeRef::from(doctag));
    contains.push(ModeRef::from(prose));
    mode
}

/// `// ...` to end of line.
pub fn c_line_comment() -> Mode {
    comment("//", "$")
}

/// `/* ... */`
pub fn c_block_comment() -> Mode {
    comment(r"/\*", r"\*/")
}

/// `# ...` to end of line.
pub fn hash_comment() -> Mode {
    comment("#", "$")
}

pub fn title() -> Mode {
    Mode::new().scope("title").begin(IDENT_RE).relevance(0.0)
}

pub fn underscore_title() -> Mode {
    Mode::new()
        .scope("title")
        .begin(UNDERSCORE_IDENT_RE)
        .relevance(0.0)
}

/// Swallows `.name` so member names are not taken for keywords.
pub fn method_guard() -> Mode {
    Mode::new()
        .begin(format!(r"\.\s*{UNDERSCORE_IDENT_RE}"))
        .relevance(0.0)
}

/// `#!/...` line, only at the very start of the input. With `binary`, the
/// line must also name that interpreter.
pub fn shebang(binary: Option<&str>) -> Mode {
    const START: &str = r"^#![ ]*/";
    let begin = match binary {
        Some(binary) => concat([START, r".*\b", binary, r"\b.*"]),
        None => START.to_string(),
    };
    Mode::new()
        .scope("meta")
        .begin(begin)
        .end("$")
        .relevance(0.0)
        .hook(Hook::OnlyAtInputStart)
}

/// Make `mode` close only on an end whose first capture repeats the begin's
/// first capture.
pub fn end_same_as_begin(mode: Mode) -> Mode {
    mode.hook(Hook::EndSameAsBegin)
}

/// Regex literal `/.../flags`.
pub fn regexp() -> Mode {
    Mode::new()
        .scope("regexp")
        .begin(r"/(?=[^/\n]*/)")
        .end(r"/[gimuy]*")
        .relevance(1.0)
        .contains([
            backslash_escape(),
            Mode::new()
                .begin(r"\[")
                .end(r"\]")
                .relevance(0.0)
                .contains([backslash_escape()]),
        ])
}

/// Number literal as JSON-like data formats write it, `NaN` and `Infinity`
/// included.
pub fn data_number() -> Mode {
    Mode::new()
        .scope("number")
        .matches(Pattern::from(
            r"([-+]?)(\b0[xX][a-fA-F0-9]+|(\b\d+(\.\d*)?|\.\d+)([eE][-+]?\d+)?)|NaN|[-+]?Infinity",
        ))
        .relevance(0.0)
}
