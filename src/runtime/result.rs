use std::sync::Arc;

use im::Vector;
use serde::Serialize;

use crate::errors::{ErrorKind, ParseError};
use crate::grammar::value::{resolve_results, Results, Value};
use crate::grammar::RuleId;

/// A successful match of `len` tokens starting at `pos`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseSuccess {
    pub pos: usize,
    pub len: usize,
    pub results: Results,
}

/// Recoverable outcome of applying one rule at one position.
pub type ParseResult = Result<ParseSuccess, Arc<ParseError>>;

impl ParseSuccess {
    pub fn new(pos: usize, len: usize, results: Results) -> Self {
        ParseSuccess { pos, len, results }
    }

    /// Position just past the match.
    pub fn end(&self) -> usize {
        self.pos + self.len
    }

    /// First result value, the usual shape after a reshape.
    pub fn value(&self) -> Option<&Value> {
        self.results.front()
    }

    /// Results with token indices replaced by token text.
    pub fn resolved(&self, tokens: &[String]) -> Results {
        resolve_results(&self.results, tokens)
    }
}

pub(crate) fn success(pos: usize, len: usize, results: Results) -> ParseResult {
    Ok(ParseSuccess::new(pos, len, results))
}

pub(crate) fn empty(pos: usize) -> ParseResult {
    success(pos, 0, Vector::new())
}

pub(crate) fn failure(pos: usize, root_id: RuleId, rule_id: RuleId, kind: ErrorKind) -> ParseResult {
    Err(Arc::new(ParseError::new(pos, root_id, rule_id, kind)))
}
