//! Defines the command-line arguments and subcommands for the pargen CLI.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "pargen",
    version,
    about = "Compile serialized packrat grammars and run them over token streams."
)]
pub struct PargenArgs {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and compile a serialized grammar, then report its size.
    Check {
        /// Grammar encoding (JSON). It must not reference any hooks.
        #[arg(required = true)]
        grammar: PathBuf,
    },
    /// Parse a JSON array of tokens and print the result as JSON.
    Parse {
        /// Grammar encoding (JSON).
        #[arg(required = true)]
        grammar: PathBuf,
        /// Token stream: a JSON array of strings.
        #[arg(required = true)]
        tokens: PathBuf,
        /// Require the root match to reach the end of input.
        #[arg(long)]
        end: bool,
        /// Nesting limit for rule invocations.
        #[arg(long)]
        max_depth: Option<usize>,
        /// YAML or JSON file with parse options; flags take precedence.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
