//! The pargen Command-Line Interface.
//!
//! Works on hook-free serialized grammars: closures cannot be expressed in
//! a file, so grammars loaded here produce raw token-index results.

use crate::cli::args::{Command, PargenArgs};
use crate::cli::output::render_success;
use crate::diagnostics::PargenError;
use crate::grammar::hooks::HookTable;
use crate::grammar::serialize::SerializedGrammar;
use crate::grammar::Grammar;
use crate::runtime::{compile, compile_with, ParseOptions};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::Path;
use std::{fs, process};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = PargenArgs::parse();
    init_logging(args.verbose);

    let result = match args.command {
        Command::Check { grammar } => handle_check(&grammar),
        Command::Parse {
            grammar,
            tokens,
            end,
            max_depth,
            config,
        } => handle_parse(&grammar, &tokens, end, max_depth, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = TermLogger::init(
        level,
        ConfigBuilder::new().set_time_format_custom(&[]).build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

fn load_grammar(path: &Path) -> Result<Grammar, PargenError> {
    let source = fs::read_to_string(path)?;
    let encoded = SerializedGrammar::from_json(&source)?;
    info!(
        "loaded {} rule entr(ies) from {}",
        encoded.rules.len(),
        path.display()
    );
    Ok(Grammar::from_serialized(&encoded, &HookTable::new())?)
}

fn load_options(config: Option<&Path>) -> Result<ParseOptions, PargenError> {
    match config {
        Some(path) => Ok(ParseOptions::from_yaml(&fs::read_to_string(path)?)?),
        None => Ok(ParseOptions::default()),
    }
}

/// Handles the `check` subcommand.
fn handle_check(path: &Path) -> Result<(), PargenError> {
    let grammar = load_grammar(path)?;
    let parser = compile(&grammar)?;
    println!(
        "ok: root {}, {} definition(s), {} rule(s), {} parser(s)",
        parser.root(),
        grammar.definition_count(),
        grammar.node_count(),
        parser.table().len()
    );
    Ok(())
}

/// Handles the `parse` subcommand.
fn handle_parse(
    grammar: &Path,
    tokens: &Path,
    end: bool,
    max_depth: Option<usize>,
    config: Option<&Path>,
) -> Result<(), PargenError> {
    let mut options = load_options(config)?;
    if end {
        options.end = true;
    }
    if let Some(max_depth) = max_depth {
        options.max_depth = max_depth;
    }

    let grammar = load_grammar(grammar)?;
    let tokens: Vec<String> = serde_json::from_str(&fs::read_to_string(tokens)?)?;
    let parser = compile_with(&grammar, options)?;
    let success = parser.parse(&tokens)?;
    println!("{}", render_success(&success, &tokens)?);
    Ok(())
}
