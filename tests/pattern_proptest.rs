//! Property-based tests for pattern combination and the plain-text fallback

use hilite::emitter::escape_html;
use hilite::pattern::{build_regex, count_groups, rewrite_backreferences};
use hilite::{Engine, GrammarDefinition, HighlightOptions};
use proptest::prelude::*;

/// A pattern made of capturing, non-capturing and escaped groups, plus the
/// number of capturing groups in it.
fn group_soup() -> impl Strategy<Value = (String, usize)> {
    prop::collection::vec(0..4u8, 0..12).prop_map(|pieces| {
        let mut pattern = String::new();
        let mut capturing = 0;
        for piece in pieces {
            match piece {
                0 => {
                    pattern.push_str("(a)");
                    capturing += 1;
                }
                1 => pattern.push_str("(?:b)"),
                2 => pattern.push_str(r"\(c\)"),
                _ => pattern.push_str("[(]"),
            }
        }
        (pattern, capturing)
    })
}

proptest! {
    #[test]
    fn count_groups_sees_only_capturing_groups((pattern, capturing) in group_soup()) {
        prop_assert_eq!(count_groups(&pattern), capturing);
    }

    #[test]
    fn backreferences_follow_their_pattern_after_joining(before in 0usize..4, own in 1usize..4) {
        let first = format!("{}!", "(a)".repeat(before));
        let second = format!(r"{}\1", "(b)".repeat(own));
        let joined = rewrite_backreferences(&[first.as_str(), second.as_str()], "|");
        let regex = build_regex(&joined, false).unwrap();

        let input = "b".repeat(own + 1);
        let captures = regex.captures(&input).unwrap().unwrap();
        prop_assert!(captures.get(1).is_none());
        let wrapper = before + 2;
        prop_assert_eq!(captures.get(wrapper).map(|m| m.as_str()), Some(input.as_str()));
    }

    #[test]
    fn grammar_without_rules_returns_escaped_input(input in "\\PC{0,64}") {
        let mut engine = Engine::new();
        engine.register_definition("empty", GrammarDefinition::new("Empty"), &[]);
        let result = engine
            .highlight(&input, "empty", &HighlightOptions::default())
            .unwrap();
        prop_assert_eq!(result.value, escape_html(&input));
        prop_assert_eq!(result.relevance, 0.0);
    }
}
