//! Command-line interface for hilite
//!
//! Usage:
//!   hilite highlight `<path>` [--language `<name>`] [--format html|tokens|tree]  - Highlight a file
//!   hilite detect `<path>` [--candidates `<a,b>`]                                - Guess a file's language
//!   hilite list-grammars                                                       - List registered grammars
//!
//! Configuration comes from the built-in defaults, `--config FILE`, `HILITE_*`
//! environment variables and `--class-prefix`, in increasing precedence.
//! Logging goes to stderr and is controlled by `HILITE_LOG` (default `hilite=warn`).

use clap::{Arg, ArgAction, ArgMatches, Command};
use config::ConfigError;
use hilite::{
    Engine, EngineConfig, GrammarDefinition, HighlightOptions, HighlightResult, Loader,
    TokenListRenderer,
};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();

    let matches = Command::new("hilite")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Grammar-driven syntax highlighting with language detection")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("TOML file layered over the built-in configuration"),
        )
        .arg(
            Arg::new("class-prefix")
                .long("class-prefix")
                .global(true)
                .help("Prefix for HTML class names (default hljs-)"),
        )
        .arg(
            Arg::new("grammar")
                .long("grammar")
                .short('g')
                .global(true)
                .action(ArgAction::Append)
                .help("Extra grammar file (.json, .yaml), registered under its `name` (or file stem when unnamed); may be repeated"),
        )
        .subcommand(
            Command::new("highlight")
                .about("Highlight a file")
                .arg(
                    Arg::new("path")
                        .help("File to highlight")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("language")
                        .long("language")
                        .short('l')
                        .help("Grammar name or alias; autodetected when omitted"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format")
                        .value_parser(["html", "tokens", "tree"])
                        .default_value("html"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail instead of falling back to plain text (also applies to autodetection)"),
                )
                .arg(
                    Arg::new("report-illegals")
                        .long("report-illegals")
                        .action(ArgAction::SetTrue)
                        .requires("language")
                        .help("Stop at illegal lexemes and report them (autodetection always does)"),
                ),
        )
        .subcommand(
            Command::new("detect")
                .about("Guess the language of a file")
                .arg(
                    Arg::new("path")
                        .help("File to inspect")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("candidates")
                        .long("candidates")
                        .value_delimiter(',')
                        .help("Comma-separated grammars to consider"),
                ),
        )
        .subcommand(Command::new("list-grammars").about("List registered grammars"))
        .get_matches();

    let strict = matches
        .subcommand_matches("highlight")
        .is_some_and(|sub| sub.get_flag("strict"));
    let engine = build_engine(&matches, strict);

    match matches.subcommand() {
        Some(("highlight", sub)) => handle_highlight_command(&engine, sub),
        Some(("detect", sub)) => handle_detect_command(&engine, sub),
        Some(("list-grammars", _)) => handle_list_grammars_command(&engine),
        _ => unreachable!(),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("HILITE_LOG").unwrap_or_else(|_| EnvFilter::new("hilite=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Bundled grammars plus any `--grammar` files, configured from the layered
/// configuration. `strict` turns safe mode off for every highlight.
fn build_engine(matches: &ArgMatches, strict: bool) -> Engine {
    let config = load_config(matches, strict).unwrap_or_else(|e| {
        eprintln!("Error loading configuration: {}", e);
        process::exit(1);
    });
    let mut engine = Engine::with_defaults();
    engine.configure(config);

    for path in matches.get_many::<String>("grammar").into_iter().flatten() {
        let definition = GrammarDefinition::from_path(path).unwrap_or_else(|e| {
            eprintln!("Error loading grammar {}: {}", path, e);
            process::exit(1);
        });
        let name = definition.name.clone();
        engine.register_definition(&name, definition, &[]);
    }
    engine
}

fn load_config(matches: &ArgMatches, strict: bool) -> Result<EngineConfig, ConfigError> {
    let mut loader = Loader::new();
    if let Some(path) = matches.get_one::<String>("config") {
        loader = loader.with_file(path);
    }
    loader = loader.with_env();
    if let Some(prefix) = matches.get_one::<String>("class-prefix") {
        loader = loader.class_prefix(prefix)?;
    }
    if strict {
        loader = loader.safe_mode(false)?;
    }
    loader.build()
}

fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file: {}", e);
        process::exit(1);
    })
}

/// Handle the highlight command
fn handle_highlight_command(engine: &Engine, matches: &ArgMatches) {
    let Some(path) = matches.get_one::<String>("path") else {
        unreachable!("path is required");
    };
    let source = read_source(path);
    let options = HighlightOptions {
        ignore_illegals: !matches.get_flag("report-illegals"),
        ..HighlightOptions::default()
    };

    let result = match matches.get_one::<String>("language") {
        Some(language) => engine.highlight(&source, language, &options),
        None => engine.highlight_auto(&source, None),
    };
    let result = result.unwrap_or_else(|e| {
        eprintln!("Highlight error: {}", e);
        process::exit(1);
    });

    if let Some(illegal) = &result.illegal_by {
        eprintln!("{}", illegal);
    }

    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("html");
    match format {
        "tokens" => print_json(&result.render(TokenListRenderer::new())),
        "tree" => print_json(&result.tree),
        _ => print!("{}", result.value),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Serialization error: {}", e);
            process::exit(1);
        }
    }
}

/// Handle the detect command
fn handle_detect_command(engine: &Engine, matches: &ArgMatches) {
    let Some(path) = matches.get_one::<String>("path") else {
        unreachable!("path is required");
    };
    let source = read_source(path);
    let candidates: Option<Vec<&str>> = matches
        .get_many::<String>("candidates")
        .map(|values| values.map(String::as_str).collect());

    let result = engine
        .highlight_auto(&source, candidates.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("Detection error: {}", e);
            process::exit(1);
        });

    print_guess("best", &result);
    if let Some(second) = &result.second_best {
        print_guess("second", second);
    }
}

fn print_guess(label: &str, result: &HighlightResult) {
    println!(
        "{:<7} {:<12} relevance {}",
        label,
        result.language.as_deref().unwrap_or("plaintext"),
        result.relevance
    );
}

/// Handle the list-grammars command
fn handle_list_grammars_command(engine: &Engine) {
    for name in engine.list_grammars() {
        let aliases = engine
            .grammar(&name)
            .map(|definition| definition.aliases.join(", "))
            .unwrap_or_default();
        if aliases.is_empty() {
            println!("  {}", name);
        } else {
            println!("  {} ({})", name, aliases);
        }
    }
}
