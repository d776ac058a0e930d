//! # Parse Context
//!
//! Mutable state of one parse invocation: the token stream, the packrat
//! cache, the open-item stack and the furthest primitive failure seen so
//! far. A context is built fresh for every root parse and is never shared;
//! the compiled `ParserTable` it borrows is.

use std::collections::HashMap;
use std::sync::Arc;

use im::Vector;

use crate::errors::{EngineError, EngineResult, ParseError};
use crate::grammar::value::{resolve_results, Results};
use crate::grammar::RuleId;
use crate::runtime::compile::ParserTable;
use crate::runtime::result::ParseResult;

/// Stack of results pushed by `push` children, awaiting their `pop`.
/// Persistent, so snapshots are O(1).
pub type OpenStack = Vector<Results>;

// ============================================================================
// PACKRAT CACHE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Clone)]
struct CacheEntry {
    stack_in: OpenStack,
    stack_out: OpenStack,
    result: ParseResult,
}

/// Memoized outcomes keyed by `(rule, position)`.
///
/// An entry is only valid for the open-item stack it was computed under,
/// since `pop` children read that stack.
#[derive(Default)]
pub struct PackratCache {
    entries: HashMap<(RuleId, usize), CacheEntry>,
    stats: CacheStats,
}

impl PackratCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&mut self, id: RuleId, pos: usize, stack: &OpenStack) -> Option<&CacheEntry> {
        match self.entries.get(&(id, pos)) {
            Some(entry) if entry.stack_in.ptr_eq(stack) || entry.stack_in == *stack => {
                self.stats.hits += 1;
                Some(entry)
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    fn store(&mut self, id: RuleId, pos: usize, entry: CacheEntry) {
        self.entries.insert((id, pos), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

pub struct ParseContext<'a> {
    tokens: &'a [String],
    table: &'a ParserTable,
    cache: PackratCache,
    stack: OpenStack,
    current_error: Option<Arc<ParseError>>,
    depth: usize,
    max_depth: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(tokens: &'a [String], table: &'a ParserTable, max_depth: usize) -> Self {
        ParseContext {
            tokens,
            table,
            cache: PackratCache::new(),
            stack: OpenStack::new(),
            current_error: None,
            depth: 0,
            max_depth,
        }
    }

    pub fn tokens(&self) -> &'a [String] {
        self.tokens
    }

    /// The token at `pos`; `None` past the end.
    pub fn token(&self, pos: usize) -> Option<&'a str> {
        self.tokens.get(pos).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn table(&self) -> &'a ParserTable {
        self.table
    }

    pub fn cache(&self) -> &PackratCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Furthest primitive failure so far; earliest wins on ties.
    pub fn current_error(&self) -> Option<&Arc<ParseError>> {
        self.current_error.as_ref()
    }

    pub(crate) fn take_current_error(&mut self) -> Option<Arc<ParseError>> {
        self.current_error.take()
    }

    pub fn open_stack(&self) -> &OpenStack {
        &self.stack
    }

    /// Replaces token indices in `results` with token texts.
    pub fn resolve(&self, results: &Results) -> Results {
        resolve_results(results, self.tokens)
    }

    /// Invokes the compiled parser for `id`, as a custom atom would.
    pub fn parse_rule(&mut self, id: RuleId, pos: usize) -> EngineResult<ParseResult> {
        self.parse_ref(id, id, pos)
    }

    pub(crate) fn parse_ref(
        &mut self,
        from: RuleId,
        target: RuleId,
        pos: usize,
    ) -> EngineResult<ParseResult> {
        let table = self.table;
        let parse = table.get(&target).ok_or(EngineError::DanglingRef {
            rule_id: from,
            target,
        })?;
        parse(self, pos)
    }

    // ------------------------------------------------------------------------
    // open-item stack
    // ------------------------------------------------------------------------

    pub(crate) fn snapshot(&self) -> OpenStack {
        self.stack.clone()
    }

    pub(crate) fn restore(&mut self, stack: OpenStack) {
        self.stack = stack;
    }

    pub(crate) fn push_open(&mut self, results: Results) {
        self.stack.push_back(results);
    }

    pub(crate) fn pop_open(&mut self) -> Option<Results> {
        self.stack.pop_back()
    }

    // ------------------------------------------------------------------------
    // memoization support
    // ------------------------------------------------------------------------

    /// Replays a cached outcome for `(id, pos)` if one was computed under
    /// the current open-item stack.
    pub(crate) fn recall(&mut self, id: RuleId, pos: usize) -> Option<ParseResult> {
        let entry = self.cache.lookup(id, pos, &self.stack)?;
        let (stack_out, result) = (entry.stack_out.clone(), entry.result.clone());
        self.stack = stack_out;
        Some(result)
    }

    pub(crate) fn remember(
        &mut self,
        id: RuleId,
        pos: usize,
        stack_in: OpenStack,
        result: &ParseResult,
    ) {
        let entry = CacheEntry {
            stack_in,
            stack_out: self.stack.clone(),
            result: result.clone(),
        };
        self.cache.store(id, pos, entry);
    }

    pub(crate) fn record_failure(&mut self, error: &Arc<ParseError>) {
        if !error.is_primitive() {
            return;
        }
        let further = self
            .current_error
            .as_ref()
            .map_or(true, |current| error.pos > current.pos);
        if further {
            self.current_error = Some(error.clone());
        }
    }

    pub(crate) fn enter(&mut self, rule_id: RuleId, pos: usize) -> EngineResult<()> {
        if self.depth >= self.max_depth {
            return Err(EngineError::DepthLimit {
                rule_id,
                pos,
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::grammar::value::Value;

    fn miss(pos: usize) -> Arc<ParseError> {
        Arc::new(ParseError::new(
            pos,
            RuleId(0),
            RuleId(1),
            ErrorKind::EofUnmatch { got: None },
        ))
    }

    #[test]
    fn furthest_failure_keeps_earliest_on_ties() {
        let table = ParserTable::new();
        let tokens: Vec<String> = vec![];
        let mut ctx = ParseContext::new(&tokens, &table, 8);

        let first = miss(2);
        ctx.record_failure(&first);
        ctx.record_failure(&miss(1));
        ctx.record_failure(&miss(2));
        assert!(Arc::ptr_eq(ctx.current_error().unwrap(), &first));

        ctx.record_failure(&miss(3));
        assert_eq!(ctx.current_error().unwrap().pos, 3);
    }

    #[test]
    fn cache_hit_requires_matching_stack() {
        let table = ParserTable::new();
        let tokens = vec!["a".to_string()];
        let mut ctx = ParseContext::new(&tokens, &table, 8);

        let entry_stack = ctx.snapshot();
        ctx.push_open(Vector::unit(Value::Token(0)));
        ctx.remember(RuleId(1), 0, entry_stack, &Ok(Default::default()));

        // stack now differs from the recorded entry stack
        assert!(ctx.recall(RuleId(1), 0).is_none());
        ctx.restore(OpenStack::new());
        assert!(ctx.recall(RuleId(1), 0).is_some());
        assert_eq!(ctx.open_stack().len(), 1);
        assert_eq!(ctx.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn depth_guard_trips_at_limit() {
        let table = ParserTable::new();
        let tokens: Vec<String> = vec![];
        let mut ctx = ParseContext::new(&tokens, &table, 2);
        ctx.enter(RuleId(1), 0).unwrap();
        ctx.enter(RuleId(1), 0).unwrap();
        assert_eq!(
            ctx.enter(RuleId(1), 0),
            Err(EngineError::DepthLimit {
                rule_id: RuleId(1),
                pos: 0,
                limit: 2
            })
        );
    }
}
