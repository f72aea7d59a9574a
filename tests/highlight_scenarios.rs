//! End-to-end highlight behavior with small purpose-built grammars.

use hilite::emitter::{Node, ScopeNode};
use hilite::grammar::{GrammarDefinition, Hook, Keywords, Mode};
use hilite::{languages, Engine, EngineError, HighlightOptions};
use rstest::rstest;

fn engine_with(name: &str, definition: GrammarDefinition) -> Engine {
    let mut engine = Engine::new();
    engine.register_definition(name, definition, &[]);
    engine
}

fn html(engine: &Engine, text: &str, name: &str) -> String {
    engine
        .highlight(text, name, &HighlightOptions::default())
        .unwrap()
        .value
}

fn text(s: &str) -> Node {
    Node::Text(s.to_string())
}

fn scoped(scope: &str, children: Vec<Node>) -> Node {
    Node::Scope(ScopeNode {
        scope: Some(scope.to_string()),
        children,
    })
}

#[test]
fn numbers_become_scoped_leaves() {
    let engine = engine_with(
        "numbers",
        GrammarDefinition::new("Numbers").contains([Mode::new().scope("number").begin(r"\d+")]),
    );
    let result = engine
        .highlight("12 34", "numbers", &HighlightOptions::default())
        .unwrap();

    assert_eq!(
        result.tree.children,
        vec![
            scoped("number", vec![text("12")]),
            text(" "),
            scoped("number", vec![text("34")]),
        ]
    );
    assert_eq!(result.relevance, 0.0);
    assert!(!result.illegal);
}

#[rstest]
#[case("")]
#[case("plain words")]
#[case("<tag> & \"quotes\" 'apos'")]
fn empty_grammar_yields_escaped_plain_text(#[case] input: &str) {
    let engine = engine_with("empty", GrammarDefinition::new("Empty"));
    let result = engine
        .highlight(input, "empty", &HighlightOptions::default())
        .unwrap();
    assert_eq!(result.tree, ScopeNode::plain(input));
    assert_eq!(result.value, hilite::emitter::escape_html(input));
    assert_eq!(result.relevance, 0.0);
}

#[test]
fn repeated_calls_build_identical_trees() {
    let engine = Engine::with_defaults();
    let source = "fn main() {\n    let v = vec![1, 2];\n    println!(\"{:?}\", v);\n}\n";
    let first = engine
        .highlight(source, "rust", &HighlightOptions::default())
        .unwrap();
    let second = engine
        .highlight(source, "rs", &HighlightOptions::default())
        .unwrap();
    assert_eq!(first.tree, second.tree);
    assert_eq!(first.relevance, second.relevance);
}

fn illegal_x() -> Engine {
    engine_with(
        "letters",
        GrammarDefinition::new("Letters")
            .illegal("X")
            .contains([Mode::new().scope("vowel").begin("[aeiou]")]),
    )
}

#[test]
fn illegal_lexeme_is_flagged_in_safe_mode() {
    let result = illegal_x()
        .highlight("baXa", "letters", &HighlightOptions::strict_illegals())
        .unwrap();
    assert!(result.illegal);
    assert_eq!(result.relevance, 0.0);
    assert_eq!(result.tree, ScopeNode::plain("baXa"));
    let illegal = result.illegal_by.unwrap();
    assert_eq!(illegal.lexeme, "X");
    assert_eq!(illegal.offset, 2);
    assert_eq!(illegal.mode, "<unnamed>");
    assert_eq!(illegal.context, "baXa");
}

#[test]
fn illegal_lexeme_is_an_error_in_strict_mode() {
    let error = illegal_x()
        .highlight(
            "baXa",
            "letters",
            &HighlightOptions::strict_illegals().safe_mode(false),
        )
        .unwrap_err();
    match error {
        EngineError::IllegalLexeme(illegal) => {
            assert_eq!(illegal.offset, 2);
            insta::assert_snapshot!(illegal.to_string(), @r#"Illegal lexeme "X" for mode "<unnamed>" at offset 2"#);
        }
        other => panic!("expected an illegal lexeme, got {other:?}"),
    }
}

#[test]
fn ignored_illegals_stay_plain_text() {
    let result = illegal_x()
        .highlight("baXa", "letters", &HighlightOptions::default())
        .unwrap();
    assert!(!result.illegal);
    insta::assert_snapshot!(result.value, @r#"b<span class="hljs-vowel">a</span>X<span class="hljs-vowel">a</span>"#);
}

fn zero_width() -> Engine {
    engine_with(
        "edges",
        GrammarDefinition::new("Edges").contains([Mode::new().scope("x").begin(r"\b")]),
    )
}

#[test]
fn zero_width_begin_and_end_advance_one_char_in_safe_mode() {
    insta::assert_snapshot!(
        html(&zero_width(), "ab", "edges"),
        @r#"<span class="hljs-x">a</span>b<span class="hljs-x"></span>"#
    );
}

#[test]
fn zero_width_begin_and_end_fail_in_strict_mode() {
    let error = zero_width()
        .highlight("ab", "edges", &HighlightOptions::default().safe_mode(false))
        .unwrap_err();
    assert!(matches!(error, EngineError::LoopDetected { offset: 0, .. }), "{error:?}");
}

#[test]
fn endless_rejected_ends_trip_the_loop_fuse() {
    let engine = engine_with(
        "stuck",
        GrammarDefinition::new("Stuck").contains([Mode::new()
            .scope("m")
            .begin("(a)")
            .end("(c)?")
            .hook(Hook::EndSameAsBegin)]),
    );
    let error = engine
        .highlight("ab", "stuck", &HighlightOptions::default())
        .unwrap_err();
    assert!(matches!(error, EngineError::LoopDetected { .. }), "{error:?}");
}

fn if_and_ident() -> Engine {
    engine_with(
        "cond",
        GrammarDefinition::new("Cond").contains([
            Mode::new().begin_keywords("if"),
            Mode::new().scope("ident").begin("[a-z]+"),
        ]),
    )
}

#[rstest]
#[case::member_access(".if", r#".<span class="hljs-ident">if</span>"#)]
#[case::keyword("if", r#"<span class="hljs-keyword">if</span>"#)]
fn begin_keywords_skip_member_access(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(html(&if_and_ident(), input, "cond"), expected);
}

#[test]
fn structural_keywords_score_nothing() {
    let result = if_and_ident()
        .highlight("if", "cond", &HighlightOptions::default())
        .unwrap();
    assert_eq!(result.relevance, 0.0);
}

#[test]
fn rejected_begin_falls_through_to_later_rules() {
    let engine = engine_with(
        "cond",
        GrammarDefinition::new("Cond").contains([
            Mode::new().begin_keywords("if"),
            Mode::new().scope("num").begin(r"\d+"),
        ]),
    );
    assert_eq!(
        html(&engine, ".if 1", "cond"),
        r#".if <span class="hljs-num">1</span>"#
    );
    assert_eq!(
        html(&engine, "x.if if", "cond"),
        r#"x.if <span class="hljs-keyword">if</span>"#
    );
}

#[test]
fn keyword_relevance_is_capped_per_word() {
    let engine = engine_with("words", GrammarDefinition::new("Words").keywords("foo"));
    let input = "foo ".repeat(20);
    let result = engine
        .highlight(&input, "words", &HighlightOptions::default())
        .unwrap();
    assert_eq!(result.relevance, 7.0);
}

#[test]
fn keyword_weights_and_hidden_kinds() {
    let engine = engine_with(
        "weights",
        GrammarDefinition::new("Weights").keywords(
            Keywords::new()
                .with("keyword", "heavy|5 light")
                .with("_hint", "quiet"),
        ),
    );
    let result = engine
        .highlight("heavy light quiet", "weights", &HighlightOptions::default())
        .unwrap();
    assert_eq!(result.relevance, 7.0);
    insta::assert_snapshot!(result.value, @r#"<span class="hljs-keyword">heavy</span> <span class="hljs-keyword">light</span> quiet"#);
}

#[test]
fn case_insensitive_grammars_match_any_case() {
    let engine = engine_with(
        "sql",
        GrammarDefinition::new("SQL")
            .case_insensitive()
            .keywords("select from"),
    );
    assert_eq!(
        html(&engine, "SELECT a FROM t", "sql"),
        r#"<span class="hljs-keyword">SELECT</span> a <span class="hljs-keyword">FROM</span> t"#
    );
}

#[test]
fn scope_aliases_rename_scopes() {
    let engine = engine_with(
        "aliased",
        GrammarDefinition::new("Aliased")
            .scope_alias("op", "operator")
            .contains([Mode::new().scope("op").begin(r"[+*]")]),
    );
    assert_eq!(
        html(&engine, "1+2", "aliased"),
        r#"1<span class="hljs-operator">+</span>2"#
    );
}

#[test]
fn sequence_scopes_classify_each_part() {
    let engine = engine_with(
        "decl",
        GrammarDefinition::new("Decl")
            .keywords(Keywords::new().with("type", "int"))
            .contains([Mode::new()
                .begin(hilite::Pattern::sequence(["var", r"\s+", r"\w+", r"\s*:\s*", "int"]))
                .scope_groups([(1, "keyword"), (3, "variable")])]),
    );
    insta::assert_snapshot!(
        html(&engine, "var count: int", "decl"),
        @r#"<span class="hljs-keyword">var</span> <span class="hljs-variable">count</span>: <span class="hljs-type">int</span>"#
    );
}

#[rstest]
#[case::include_both(Mode::new(), r#"<span class="hljs-s">"ab"</span>"#)]
#[case::exclude_begin(Mode::new().exclude_begin(), r#""<span class="hljs-s">ab"</span>"#)]
#[case::exclude_end(Mode::new().exclude_end(), r#"<span class="hljs-s">"ab</span>""#)]
fn boundary_flags_move_delimiters_out_of_scope(#[case] flags: Mode, #[case] expected: &str) {
    let string = Mode::new().scope("s").begin("\"").end("\"").inherit(flags);
    let engine = engine_with(
        "strings",
        GrammarDefinition::new("Strings").contains([string]),
    );
    let out = html(&engine, "\"ab\"", "strings").replace("&quot;", "\"");
    assert_eq!(out, expected);
}

/// The end lexeme lands in the innermost open mode, which closes together
/// with the parent that owns the end.
#[test]
fn ends_with_parent_closes_children_with_their_parent() {
    let engine = engine_with(
        "attrs",
        GrammarDefinition::new("Attrs").contains([Mode::new()
            .scope("tag")
            .begin("<")
            .end(">")
            .contains([Mode::new().scope("attr").begin(r"\w+").ends_with_parent()])]),
    );
    insta::assert_snapshot!(
        html(&engine, "<a>", "attrs"),
        @r#"<span class="hljs-tag">&lt;<span class="hljs-attr">a&gt;</span></span>"#
    );
}

#[test]
fn starts_follows_the_closed_mode() {
    let engine = engine_with(
        "pairs",
        GrammarDefinition::new("Pairs").contains([Mode::new()
            .scope("key")
            .begin(r"\w+")
            .starts(Mode::new().scope("value").end("$").ends_with_parent())]),
    );
    insta::assert_snapshot!(
        html(&engine, "name = x", "pairs"),
        @r#"<span class="hljs-key">name</span><span class="hljs-value"> = x</span>"#
    );
}

fn templates() -> Engine {
    let mut engine = Engine::new();
    engine.register_grammar("json", languages::json::definition, &[]);
    engine.register_definition(
        "template",
        GrammarDefinition::new("Template").contains([
            Mode::new()
                .begin(r"\{\{")
                .end(r"\}\}")
                .sub_language("json")
                .exclude_begin()
                .exclude_end(),
            Mode::new()
                .begin("<%")
                .end("%>")
                .sub_language("json")
                .exclude_begin()
                .exclude_end(),
        ]),
        &[],
    );
    engine
}

#[test]
fn embedded_grammar_becomes_a_language_node() {
    let result = templates()
        .highlight(r#"a {{"x":1}} b"#, "template", &HighlightOptions::default())
        .unwrap();

    insta::assert_snapshot!(
        result.value,
        @r#"a {{<span class="language-json"><span class="hljs-attr">&quot;x&quot;</span><span class="hljs-punctuation">:</span><span class="hljs-number">1</span></span>}} b"#
    );
    assert!((result.relevance - 1.01).abs() < 1e-9);
    assert!(matches!(
        &result.tree.children[1],
        Node::Scope(ScopeNode { scope: Some(scope), .. }) if scope == "language:json"
    ));
}

#[test]
fn embedded_regions_resume_where_the_previous_one_stopped() {
    insta::assert_snapshot!(
        html(&templates(), r#"<%"ab%> text <%cd"%>"#, "template"),
        @r#"&lt;%<span class="language-json"><span class="hljs-string">&quot;ab</span></span>%&gt; text &lt;%<span class="language-json"><span class="hljs-string">cd&quot;</span></span>%&gt;"#
    );
}

#[test]
fn unknown_embedded_grammar_is_plain_text() {
    let engine = engine_with(
        "outer",
        GrammarDefinition::new("Outer").contains([Mode::new()
            .begin(r"\{")
            .end(r"\}")
            .sub_language("missing")]),
    );
    assert_eq!(html(&engine, "{x}", "outer"), "{x}");
}

fn broken_embedding() -> Engine {
    let mut engine = engine_with(
        "host",
        GrammarDefinition::new("Host").contains([Mode::new()
            .begin("<")
            .end(">")
            .sub_language("broken")]),
    );
    engine.register_definition(
        "broken",
        GrammarDefinition::new("Broken").contains([Mode::new().begin("(")]),
        &[],
    );
    engine
}

#[test]
fn embedded_grammar_that_fails_to_compile_falls_back_to_plain_text() {
    let result = broken_embedding()
        .highlight("<x>", "host", &HighlightOptions::default())
        .unwrap();
    assert_eq!(result.language.as_deref(), Some("host"));
    assert_eq!(result.value, "&lt;x&gt;");
    assert_eq!(result.tree, ScopeNode::plain("<x>"));
    assert!(matches!(
        result.error_raised,
        Some(EngineError::Compile { ref grammar, .. }) if grammar == "broken"
    ));
}

#[test]
fn embedded_compile_failure_is_an_error_in_strict_mode() {
    let error = broken_embedding()
        .highlight("<x>", "host", &HighlightOptions::default().safe_mode(false))
        .unwrap_err();
    assert!(matches!(error, EngineError::Compile { ref grammar, .. } if grammar == "broken"));
}

#[test]
fn continuation_resumes_open_modes_across_calls() {
    let engine = engine_with(
        "blocks",
        GrammarDefinition::new("Blocks").contains([Mode::new()
            .scope("comment")
            .begin(r"/\*")
            .end(r"\*/")]),
    );
    let first = engine
        .highlight("a /* b", "blocks", &HighlightOptions::default())
        .unwrap();
    let continuation = first.continuation.clone().unwrap();
    assert_eq!(continuation.stack().len(), 2);

    let second = engine
        .highlight(
            "c */ d",
            "blocks",
            &HighlightOptions::default().continuation(continuation),
        )
        .unwrap();
    assert_eq!(
        second.value,
        r#"<span class="hljs-comment">c */</span> d"#
    );
    assert_eq!(second.continuation.unwrap().stack().len(), 1);
}

#[test]
fn unknown_grammar_is_reported() {
    let error = Engine::new()
        .highlight("x", "nope", &HighlightOptions::default())
        .unwrap_err();
    assert_eq!(error, EngineError::UnknownGrammar("nope".to_string()));
}

#[test]
fn compile_errors_name_the_grammar() {
    let engine = engine_with(
        "broken",
        GrammarDefinition::new("Broken").contains([Mode::new().matches("a").begin("b")]),
    );
    let error = engine
        .highlight("a", "broken", &HighlightOptions::default())
        .unwrap_err();
    assert!(
        matches!(&error, EngineError::Compile { grammar, .. } if grammar == "broken"),
        "{error:?}"
    );
}
