//! Rust.

use crate::grammar::{GrammarDefinition, Keywords, Mode, ModeRef, Pattern};
use crate::modes::{self, IDENT_RE, UNDERSCORE_IDENT_RE};
use crate::pattern::{concat, lookahead};

const KEYWORDS: &str = "abstract as async await become box break const continue crate do dyn \
    else enum extern false final fn for if impl in let loop macro match mod move mut override \
    priv pub ref return self Self static struct super trait true try type typeof union unsafe \
    unsized use virtual where while yield";

const LITERALS: &str = "true false Some None Ok Err";

const BUILT_INS: &str = "drop Copy Send Sized Sync Drop Fn FnMut FnOnce ToOwned Clone Debug \
    PartialEq PartialOrd Eq Ord AsRef AsMut Into From Default Iterator Extend IntoIterator \
    DoubleEndedIterator ExactSizeIterator SliceConcatExt ToString assert! assert_eq! bitflags! \
    bytes! cfg! col! concat! concat_idents! debug_assert! debug_assert_eq! env! eprintln! panic! \
    file! format! format_args! include_bytes! include_str! line! local_data_key! module_path! \
    option_env! print! println! select! stringify! try! unimplemented! unreachable! vec! write! \
    writeln! macro_rules! assert_ne! debug_assert_ne!";

const TYPES: &str = "i8 i16 i32 i64 i128 isize u8 u16 u32 u64 u128 usize f32 f64 str char \
    bool Box Option Result String Vec";

/// Optional width suffix of numeric literals.
const NUMBER_SUFFIX: &str = "([ui](8|16|32|64|128|size)|f(32|64))?";

pub fn definition() -> GrammarDefinition {
    let raw_ident = r"(r#)?";
    let underscore_ident = concat([raw_ident, UNDERSCORE_IDENT_RE]);
    let underscore_ident = underscore_ident.as_str();
    let ident = concat([raw_ident, IDENT_RE]);

    let function_invoke = Mode::new()
        .scope("title.function.invoke")
        .begin(concat([
            r"\b",
            r"(?!let|for|while|if|else|match\b)",
            ident.as_str(),
            lookahead(r"\s*\(").as_str(),
        ]))
        .relevance(0.0);

    let mut byte_string = modes::quote_string().begin(r#"b?""#);
    byte_string.illegal = None;

    let strings = Mode::new().scope("string").relevance(1.0).variants([
        Mode::new().begin(r#"b?r(#*)"(.|\n)*?"\1(?!#)"#),
        Mode::new().begin("b?'").end("'").contains([Mode::new()
            .scope("char.escape")
            .matches(r"\\('|\w|x\w{2}|u\w{4}|U\w{8})")
            .relevance(1.0)]),
    ]);

    let numbers = Mode::new().scope("number").relevance(0.0).variants([
        Mode::new().begin(format!(r"\b0b([01_]+){NUMBER_SUFFIX}")),
        Mode::new().begin(format!(r"\b0o([0-7_]+){NUMBER_SUFFIX}")),
        Mode::new().begin(format!(r"\b0x([A-Fa-f0-9_]+){NUMBER_SUFFIX}")),
        Mode::new().begin(format!(
            r"\b(\d[\d_]*(\.[0-9_]+)?([eE][+-]?[0-9_]+)?){NUMBER_SUFFIX}"
        )),
    ]);

    let attribute = Mode::new()
        .scope("meta")
        .begin(r"#!?\[")
        .end(r"\]")
        .relevance(1.0)
        .contains([Mode::new()
            .scope("string")
            .begin("\"")
            .end("\"")
            .relevance(1.0)
            .contains([modes::backslash_escape()])]);

    let keywords = Keywords::new()
        .with_pattern(format!("{IDENT_RE}!?"))
        .with("type", TYPES)
        .with("keyword", KEYWORDS)
        .with("literal", LITERALS)
        .with("built_in", BUILT_INS);

    GrammarDefinition::new("Rust")
        .aliases(["rs"])
        .keywords(keywords)
        .illegal("</")
        .contains([
            modes::c_line_comment(),
            modes::comment_with(r"/\*", r"\*/", Mode::new().contains([ModeRef::SelfRef])),
            byte_string,
            Mode::new()
                .scope("symbol")
                .begin(r"'[a-zA-Z_][a-zA-Z0-9_]*(?!')")
                .relevance(1.0),
            strings,
            numbers,
            sequence(
                &["fn", r"\s+", underscore_ident],
                &[(1, "keyword"), (3, "title.function")],
            ),
            attribute,
            sequence(
                &["let", r"\s+", r"(?:mut\s+)?", underscore_ident],
                &[(1, "keyword"), (3, "keyword"), (4, "variable")],
            ),
            sequence(
                &["for", r"\s+", underscore_ident, r"\s+", "in"],
                &[(1, "keyword"), (3, "variable"), (5, "keyword")],
            ),
            sequence(
                &["type", r"\s+", underscore_ident],
                &[(1, "keyword"), (3, "title.class")],
            ),
            sequence(
                &[r"(?:trait|enum|struct|union|impl|for)", r"\s+", underscore_ident],
                &[(1, "keyword"), (3, "title.class")],
            ),
            Mode::new()
                .begin(format!("{IDENT_RE}::"))
                .relevance(1.0)
                .keywords(
                    Keywords::new()
                        .with("keyword", "Self")
                        .with("built_in", BUILT_INS)
                        .with("type", TYPES),
                ),
            Mode::new().scope("punctuation").begin("->").relevance(1.0),
            function_invoke,
        ])
}

/// A `begin` sequence with one scope per listed part.
fn sequence(parts: &[&str], groups: &[(usize, &str)]) -> Mode {
    Mode::new()
        .begin(Pattern::sequence(parts.iter().copied()))
        .scope_groups(groups.iter().copied())
        .relevance(1.0)
}
