//! q, the query language of kdb+.

use crate::grammar::{GrammarDefinition, Keywords, Mode};
use crate::modes;

const KEYWORDS: &str = "abs acos aj aj0 ajf ajf0 all and any asc asin asof atan attr avg avgs \
    bin binr ceiling cols cor cos count cov cross csv cut delete deltas desc dev differ distinct \
    div do dsave each ej ema enlist eval except exec exit exp fby fills first fkeys flip floor \
    get getenv group gtime hclose hcount hdel hopen hsym iasc idesc if ij ijf in insert inter inv \
    key keys last like lj ljf load log lower lsq ltime ltrim mavg max maxs mcount md5 mdev med \
    meta min mins mmax mmin mmu mod msum neg next not null or over parse peach pj prd prds prev \
    prior rand rank ratios raze read0 read1 reciprocal reval reverse rload rotate rsave rtrim \
    save scan scov sdev select set setenv show signum sin sqrt ss ssr string sublist sum sums sv \
    svar system tables tan til trim type uj ujf ungroup union update upper upsert value var view \
    views vs wavg where while within wj wj1 wsum xasc xbar xcol xcols xdesc xexp xgroup xkey \
    xlog xprev xrank from by";

pub fn definition() -> GrammarDefinition {
    GrammarDefinition::new("q")
        .aliases(["k", "kdb"])
        .keywords(
            Keywords::new()
                .with_pattern(r"(`?)[A-Za-z0-9_]+\b")
                .with("keyword", KEYWORDS)
                .with("literal", "0b 1b"),
        )
        .contains([
            // `/` starts a comment only at line start or after whitespace
            Mode::new()
                .scope("comment")
                .begin(r"(^|\s)/")
                .end("$")
                .relevance(0.0),
            modes::quote_string(),
            Mode::new()
                .scope("built_in")
                .begin(r"\.[hjmQzq]\.[a-zA-Z][a-zA-Z0-9]*")
                .relevance(1.0),
            Mode::new()
                .scope("symbol")
                .begin(r"`([\w.:]*:[\w.:/]*|[\w.:]*)")
                .relevance(1.0),
            Mode::new()
                .scope("literal")
                .begin(r"\b[01]b\b")
                .relevance(1.0),
            Mode::new()
                .scope("number")
                .begin(r"\b(\d+(\.\d+)?(e[+-]?\d+)?[efhij]?|0[NnWw][efhij]?)\b")
                .relevance(1.0),
            modes::c_number(),
        ])
}
