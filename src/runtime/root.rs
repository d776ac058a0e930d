//! Root entry point: compile a grammar once, parse many token streams.

use std::fmt;
use std::sync::Arc;

use log::{error, trace};
use serde::Deserialize;

use crate::diagnostics::{PargenError, ParseFailure};
use crate::errors::{EngineResult, ErrorKind, GrammarError, ParseError};
use crate::grammar::{Grammar, RuleId};
use crate::runtime::compile::{Compiler, ParserTable};
use crate::runtime::context::{CacheStats, ParseContext};
use crate::runtime::result::ParseSuccess;

pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Options fixed at compile time and applied to every root parse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// The root match must be followed by end of input.
    pub end: bool,
    /// Nesting limit for rule invocations.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            end: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_end(mut self, end: bool) -> Self {
        self.end = end;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Reads options from YAML (JSON is accepted too). Missing fields keep
    /// their defaults.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }
}

/// A compiled grammar. Cheap to clone and safe to share between threads;
/// every parse builds its own context.
#[derive(Clone)]
pub struct RootParser {
    table: Arc<ParserTable>,
    root: RuleId,
    options: ParseOptions,
}

/// What a finished root parse produced.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub result: Result<ParseSuccess, Arc<ParseError>>,
    /// Furthest primitive failure seen during the parse, successful or not.
    pub furthest: Option<Arc<ParseError>>,
    pub stats: CacheStats,
}

impl RootParser {
    pub fn new(table: Arc<ParserTable>, root: RuleId, options: ParseOptions) -> Self {
        RootParser {
            table,
            root,
            options,
        }
    }

    pub fn root(&self) -> RuleId {
        self.root
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn table(&self) -> &Arc<ParserTable> {
        &self.table
    }

    /// Builds a fresh context over `tokens`, for callers driving rules
    /// directly.
    pub fn context<'a>(&'a self, tokens: &'a [String]) -> ParseContext<'a> {
        ParseContext::new(tokens, &self.table, self.options.max_depth)
    }

    /// Parses from the start of `tokens`.
    pub fn parse(&self, tokens: &[String]) -> Result<ParseSuccess, PargenError> {
        self.parse_at(tokens, 0)
    }

    /// Parses from `pos`. Failures carry the token stream for rendering.
    pub fn parse_at(&self, tokens: &[String], pos: usize) -> Result<ParseSuccess, PargenError> {
        let outcome = self.run(tokens, pos).map_err(|err| {
            error!("parse aborted: {err}");
            PargenError::Engine(err)
        })?;
        outcome.result.map_err(|error| {
            ParseFailure::new(error, outcome.furthest, tokens.to_vec()).into()
        })
    }

    /// Runs the root rule and reports everything the context observed.
    pub fn run(&self, tokens: &[String], pos: usize) -> EngineResult<ParseOutcome> {
        trace!("parse {} over {} token(s) from {pos}", self.root, tokens.len());
        let mut ctx = self.context(tokens);
        let mut result = ctx.parse_rule(self.root, pos)?;
        if let Ok(matched) = &result {
            if self.options.end && matched.end() < tokens.len() {
                let end = matched.end();
                let error = Arc::new(ParseError::new(
                    end,
                    self.root,
                    self.root,
                    ErrorKind::EofUnmatch {
                        got: tokens.get(end).cloned(),
                    },
                ));
                ctx.record_failure(&error);
                result = Err(error);
            }
        }
        trace!(
            "parse {} finished: {}",
            self.root,
            if result.is_ok() { "ok" } else { "failed" }
        );
        Ok(ParseOutcome {
            result,
            stats: ctx.stats(),
            furthest: ctx.take_current_error(),
        })
    }
}

impl fmt::Debug for RootParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootParser")
            .field("root", &self.root)
            .field("parsers", &self.table.len())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Compiles a grammar with default options.
pub fn compile(grammar: &Grammar) -> Result<RootParser, GrammarError> {
    compile_with(grammar, ParseOptions::default())
}

/// Compiles every definition, then the root unless it is itself one of them.
pub fn compile_with(grammar: &Grammar, options: ParseOptions) -> Result<RootParser, GrammarError> {
    let mut compiler = Compiler::new();
    for rule in grammar.definitions() {
        compiler.define(rule)?;
    }
    let root = grammar.root();
    if !compiler.is_defined(root.id) {
        compiler.define(root)?;
    }
    let table = compiler.finish()?;
    Ok(RootParser::new(table, root.id, options))
}
