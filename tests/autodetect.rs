//! Language autodetection across bundled and ad-hoc grammars

use hilite::{Engine, EngineConfig, GrammarDefinition, HighlightOptions, Mode};
use rstest::rstest;

fn digits(name: &str) -> GrammarDefinition {
    GrammarDefinition::new(name).contains([Mode::new().scope("number").begin(r"\d+").relevance(1.0)])
}

#[rstest]
#[case::shebang("#!/bin/bash\necho hi\n", "bash")]
#[case::rust_items("fn main() { let x = 1; }", "rust")]
#[case::q_query("select from t where x>1", "q")]
fn bundled_grammars_are_told_apart(#[case] source: &str, #[case] expected: &str) {
    let result = Engine::with_defaults().highlight_auto(source, None).unwrap();
    assert_eq!(result.language.as_deref(), Some(expected));
    assert!(result.second_best.is_some());
}

#[test]
fn best_result_matches_a_direct_highlight() {
    let engine = Engine::with_defaults();
    let source = "#!/bin/bash\necho hi\n";
    let guess = engine.highlight_auto(source, None).unwrap();
    let direct = engine
        .highlight(source, "bash", &HighlightOptions::default())
        .unwrap();
    assert_eq!(guess.tree, direct.tree);
    assert_eq!(guess.value, direct.value);
    assert_eq!(guess.relevance, direct.relevance);
}

#[test]
fn subset_wins_a_relevance_tie_with_its_superset() {
    let mut engine = Engine::new();
    engine.register_definition("a-super", digits("Super").superset_of("b-sub"), &[]);
    engine.register_definition("b-sub", digits("Sub"), &[]);

    let result = engine.highlight_auto("1", None).unwrap();
    assert_eq!(result.language.as_deref(), Some("b-sub"));
    assert_eq!(result.relevance, 1.0);
    let second = result.second_best.unwrap();
    assert_eq!(second.language.as_deref(), Some("a-super"));
    assert_eq!(second.relevance, 1.0);
}

#[test]
fn explicit_candidates_limit_the_search() {
    let engine = Engine::with_defaults();
    let result = engine
        .highlight_auto("select from t where x>1", Some(&["bash", "json"]))
        .unwrap();
    assert_eq!(result.language.as_deref(), Some("bash"));
}

#[test]
fn unknown_candidates_are_skipped() {
    let engine = Engine::with_defaults();
    let result = engine
        .highlight_auto("select from t where x>1", Some(&["cobol", "kdb"]))
        .unwrap();
    assert_eq!(result.language.as_deref(), Some("q"));
    assert_eq!(result.second_best.unwrap().language, None);
}

#[test]
fn configured_candidates_apply_when_none_are_given() {
    let mut engine = Engine::with_defaults();
    engine.configure(EngineConfig {
        autodetect_candidates: vec!["json".to_string()],
        ..EngineConfig::default()
    });

    let result = engine.highlight_auto("select from t", None).unwrap();
    assert_eq!(result.language, None);
    assert_eq!(result.value, "select from t");
    let second = result.second_best.unwrap();
    assert_eq!(second.language.as_deref(), Some("json"));
    assert!(second.illegal);
}

#[test]
fn grammars_with_autodetect_disabled_never_win() {
    let mut engine = Engine::new();
    engine.register_definition("quiet", digits("Quiet").disable_autodetect(), &[]);
    assert!(!engine.autodetection_enabled("quiet"));

    let result = engine.highlight_auto("123", None).unwrap();
    assert_eq!(result.language, None);
    assert!(result.second_best.is_none());
}

#[test]
fn broken_candidates_do_not_abort_detection() {
    let mut engine = Engine::new();
    engine.register_definition(
        "broken",
        GrammarDefinition::new("Broken").contains([Mode::new().begin("(")]),
        &[],
    );
    engine.register_definition("digits", digits("Digits"), &[]);

    let result = engine.highlight_auto("42", None).unwrap();
    assert_eq!(result.language.as_deref(), Some("digits"));
    assert_eq!(result.second_best.unwrap().language, None);
}
