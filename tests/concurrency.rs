//! One engine shared by many threads

use hilite::{Engine, HighlightOptions};
use std::thread;

const SOURCES: [(&str, &str); 4] = [
    ("rust", "fn main() {\n    let answer = 42;\n}\n"),
    ("bash", "#!/bin/bash\nfor f in *.txt; do echo \"$f\"; done\n"),
    ("json", "{\"items\": [1, 2.5, null], \"ok\": true}"),
    ("q", "select sum x by y from t where z>0"),
];

#[test]
fn concurrent_highlights_match_sequential_ones() {
    let engine = Engine::with_defaults();
    let expected: Vec<String> = SOURCES
        .iter()
        .map(|(name, text)| {
            engine
                .highlight(text, name, &HighlightOptions::default())
                .unwrap()
                .value
        })
        .collect();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let engine = &engine;
                scope.spawn(move || {
                    let (name, text) = SOURCES[worker % SOURCES.len()];
                    engine
                        .highlight(text, name, &HighlightOptions::default())
                        .unwrap()
                        .value
                })
            })
            .collect();

        for (worker, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), expected[worker % SOURCES.len()]);
        }
    });
}

#[test]
fn first_use_compilation_races_are_harmless() {
    let engine = Engine::with_defaults();
    thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = &engine;
                scope.spawn(move || engine.highlight_auto("select from t where x>1", None).unwrap())
            })
            .collect();
        for handle in handles {
            let result = handle.join().unwrap();
            assert_eq!(result.language.as_deref(), Some("q"));
        }
    });
}
