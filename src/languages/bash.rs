//! Bash and compatible shells.
//!
//! Strings, command substitutions and variables nest inside each other, so
//! they live in the grammar's named mode repository and refer to one another
//! by name.

use crate::grammar::{GrammarDefinition, Keywords, Mode, ModeRef, Pattern};
use crate::modes;
use crate::pattern::concat;

const KEYWORDS: [&str; 17] = [
    "if", "then", "else", "elif", "fi", "time", "for", "while", "until", "in", "do", "done",
    "case", "esac", "coproc", "function", "select",
];

const BUILT_INS: &str = "break cd continue eval exec exit export getopts hash pwd readonly \
    return shift test times trap umask unset alias bind builtin caller command declare echo \
    enable help let local logout mapfile printf read readarray source sudo type typeset ulimit \
    unalias set shopt autoload bg bindkey bye cap chdir clone comparguments compcall compctl \
    compdescribe compfiles compgroups compquote comptags comptry compvalues dirs disable disown \
    echotc echoti emulate fc fg float functions getcap getln history integer jobs kill limit log \
    noglob popd print pushd pushln rehash sched setcap setopt stat suspend ttyctl unfunction \
    unhash unlimit unsetopt vared wait whence where which zcompile zformat zftp zle zmodload \
    zparseopts zprof zpty zregexparse zsocket zstyle ztcp chcon chgrp chown chmod cp dd df dir \
    dircolors ln ls mkdir mkfifo mknod mktemp mv realpath rm rmdir shred sync touch truncate \
    vdir b2sum base32 base64 cat cksum comm csplit cut expand fmt fold head join md5sum nl \
    numfmt od paste ptx pr sha1sum sha224sum sha256sum sha384sum sha512sum shuf sort split sum \
    tac tail tr tsort unexpand uniq wc arch basename chroot date dirname du env expr factor \
    groups hostid id link logname nice nohup nproc pathchk pinky printenv readlink runcon seq \
    sleep stdbuf stty tee timeout tty uname unlink uptime users who whoami yes";

pub fn definition() -> GrammarDefinition {
    let variable = Mode::new().scope("variable").relevance(1.0).variants([
        Mode::new().begin(concat([r"\$[\w\d#@][\w\d_]*", r"(?![\w\d])(?![$])"])),
        Mode::new().begin(r"\$\{").end(r"\}").contains([
            ModeRef::SelfRef,
            Mode::new()
                .begin(":-")
                .contains([ModeRef::named("variable")])
                .into(),
        ]),
    ]);

    let subst = Mode::new()
        .scope("subst")
        .begin(r"\$\(")
        .end(r"\)")
        .relevance(1.0)
        .contains([
            ModeRef::from(modes::backslash_escape()),
            ModeRef::named("string"),
        ]);

    let string = Mode::new()
        .scope("string")
        .begin("\"")
        .end("\"")
        .relevance(1.0)
        .contains([
            ModeRef::from(modes::backslash_escape()),
            ModeRef::named("variable"),
            ModeRef::named("subst"),
        ]);

    let mut comment = modes::hash_comment();
    comment.begin = None;
    comment.end = None;
    let comment = comment
        .matches(Pattern::sequence([r"(^|\s)", "#.*$"]))
        .scope_groups([(2, "comment")]);

    let here_doc = Mode::new()
        .begin(r"<<-?\s*(?=\w+)")
        .relevance(1.0)
        .starts(Mode::new().contains([modes::end_same_as_begin(
            Mode::new().scope("string").begin(r"(\w+)").end(r"(\w+)"),
        )]));

    let arithmetic = Mode::new()
        .begin(r"\$?\(\(")
        .end(r"\)\)")
        .relevance(1.0)
        .contains([
            ModeRef::from(Mode::new().scope("number").begin(r"\d+#[0-9a-f]+").relevance(1.0)),
            ModeRef::from(modes::number()),
            ModeRef::named("variable"),
        ]);

    let function = Mode::new()
        .scope("function")
        .begin(r"\w[\w\d_]*\s*\(\s*\)\s*\{")
        .return_begin()
        .relevance(0.0)
        .contains([modes::title().begin(r"\w[\w\d_]*")]);

    GrammarDefinition::new("Bash")
        .aliases(["sh", "zsh"])
        .keywords(
            Keywords::new()
                .with_pattern(r"\b[a-z][a-z0-9._-]+\b")
                .with("keyword", KEYWORDS)
                .with("literal", ["true", "false"])
                .with("built_in", BUILT_INS),
        )
        .mode("variable", variable)
        .mode("subst", subst)
        .mode("string", string)
        .contains([
            ModeRef::from(
                modes::shebang(Some("(fish|bash|zsh|sh|csh|ksh|tcsh|dash|scsh)")).relevance(10.0),
            ),
            ModeRef::from(modes::shebang(None)),
            ModeRef::from(function),
            ModeRef::from(arithmetic),
            ModeRef::from(comment),
            ModeRef::from(here_doc),
            ModeRef::from(Mode::new().matches(r"(/[a-z._-]+)+").relevance(1.0)),
            ModeRef::named("string"),
            ModeRef::from(Mode::new().matches(r#"\\""#).relevance(1.0)),
            ModeRef::from(
                Mode::new()
                    .scope("string")
                    .begin("'")
                    .end("'")
                    .relevance(1.0),
            ),
            ModeRef::from(Mode::new().matches(r"\\'").relevance(1.0)),
            ModeRef::named("variable"),
        ])
}
