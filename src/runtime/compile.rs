//! # Rule Compiler
//!
//! Turns a rule graph into a table of parser closures keyed by `RuleId`.
//! Every compiled rule is wrapped in the memoizing decorator, which owns
//! the packrat cache protocol, the open-item stack restore on failure, the
//! furthest-failure tracker and the recursion guard. The per-kind closures
//! below only implement matching.
//!
//! `Ref` rules resolve their target through the context's table at call
//! time, so definitions may be compiled in any order and may be mutually
//! recursive.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use im::{OrdMap, Vector};
use log::debug;
use regex::Regex;

use crate::errors::{EngineError, EngineResult, ErrorKind, GrammarError, ParseError};
use crate::grammar::hooks::{PopValidator, TokenReshape};
use crate::grammar::value::{Results, Value};
use crate::grammar::{Rule, RuleId, RuleKind, SeqChild};
use crate::runtime::context::ParseContext;
use crate::runtime::result::{empty, failure, success, ParseResult};

pub type ParseFn =
    Arc<dyn Fn(&mut ParseContext<'_>, usize) -> EngineResult<ParseResult> + Send + Sync>;

/// Compiled parsers, one per rule id. Read-only once compilation finishes.
pub type ParserTable = HashMap<RuleId, ParseFn>;

/// Boxes a closure as a `ParseFn`.
pub fn parser<F>(f: F) -> ParseFn
where
    F: Fn(&mut ParseContext<'_>, usize) -> EngineResult<ParseResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ============================================================================
// COMPILER
// ============================================================================

#[derive(Default)]
pub struct Compiler {
    table: ParserTable,
    definitions: BTreeSet<RuleId>,
    references: Vec<(RuleId, RuleId)>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a definition. Failures raised anywhere inside it are
    /// attributed to its id.
    pub fn define(&mut self, rule: &Rule) -> Result<ParseFn, GrammarError> {
        let parse = self.compile(rule, rule.id)?;
        self.definitions.insert(rule.id);
        debug!(
            "defined {} ({}, {} rule(s))",
            rule.id,
            rule.kind_name(),
            rule.node_count()
        );
        Ok(parse)
    }

    /// Compiles `rule` and everything nested in it into the table.
    pub fn compile(&mut self, rule: &Rule, root_id: RuleId) -> Result<ParseFn, GrammarError> {
        let inner = self.compile_kind(rule, root_id)?;
        let parse = memoize(rule.id, inner);
        match self.table.entry(rule.id) {
            Entry::Occupied(_) => Err(GrammarError::DuplicateId { id: rule.id }),
            Entry::Vacant(slot) => Ok(slot.insert(parse).clone()),
        }
    }

    pub fn is_defined(&self, id: RuleId) -> bool {
        self.definitions.contains(&id)
    }

    /// Checks every reference against the definitions and freezes the table.
    pub fn finish(self) -> Result<Arc<ParserTable>, GrammarError> {
        for &(rule_id, target) in &self.references {
            if !self.definitions.contains(&target) {
                return Err(GrammarError::DanglingRef { rule_id, target });
            }
        }
        debug!(
            "compiled {} parser(s) across {} definition(s)",
            self.table.len(),
            self.definitions.len()
        );
        Ok(Arc::new(self.table))
    }

    fn patterns(&mut self, patterns: &[Rule], root_id: RuleId) -> Result<Vec<ParseFn>, GrammarError> {
        patterns.iter().map(|p| self.compile(p, root_id)).collect()
    }

    fn seq_children(
        &mut self,
        children: &[SeqChild],
        root_id: RuleId,
    ) -> Result<Arc<[CompiledChild]>, GrammarError> {
        children
            .iter()
            .map(|child| {
                Ok(CompiledChild {
                    parse: self.compile(&child.rule, root_id)?,
                    key: child.key.clone(),
                    optional: child.optional,
                    skip: child.skip,
                    push: child.push,
                    pop: child.pop.clone(),
                })
            })
            .collect()
    }

    fn compile_kind(&mut self, rule: &Rule, root_id: RuleId) -> Result<ParseFn, GrammarError> {
        let id = rule.id;
        let parse = match &rule.kind {
            RuleKind::Token { expr, reshape } => {
                let (expr, reshape) = (expr.clone(), reshape.clone());
                parser(move |ctx, pos| {
                    Ok(match ctx.token(pos) {
                        Some(token) if token == expr => {
                            success(pos, 1, Vector::unit(token_value(&reshape, token, pos)))
                        }
                        got => failure(
                            pos,
                            root_id,
                            id,
                            ErrorKind::TokenUnmatch {
                                expect: Some(expr.clone()),
                                got: got.map(str::to_string),
                            },
                        ),
                    })
                })
            }
            RuleKind::Regex { expr, reshape } => {
                let re = Regex::new(&format!("^(?:{expr})$")).map_err(|source| {
                    GrammarError::InvalidRegex {
                        rule_id: id,
                        expr: expr.clone(),
                        source,
                    }
                })?;
                let (expr, reshape) = (expr.clone(), reshape.clone());
                parser(move |ctx, pos| {
                    Ok(match ctx.token(pos) {
                        Some(token) if re.is_match(token) => {
                            success(pos, 1, Vector::unit(token_value(&reshape, token, pos)))
                        }
                        got => failure(
                            pos,
                            root_id,
                            id,
                            ErrorKind::RegexUnmatch {
                                expect: expr.clone(),
                                got: got.map(str::to_string),
                            },
                        ),
                    })
                })
            }
            RuleKind::Any { reshape } => {
                let reshape = reshape.clone();
                parser(move |ctx, pos| {
                    Ok(match ctx.token(pos) {
                        Some(token) => {
                            success(pos, 1, Vector::unit(token_value(&reshape, token, pos)))
                        }
                        None => failure(
                            pos,
                            root_id,
                            id,
                            ErrorKind::TokenUnmatch {
                                expect: None,
                                got: None,
                            },
                        ),
                    })
                })
            }
            RuleKind::Eof => parser(move |ctx, pos| {
                Ok(match ctx.token(pos) {
                    None => empty(pos),
                    Some(token) => failure(
                        pos,
                        root_id,
                        id,
                        ErrorKind::EofUnmatch {
                            got: Some(token.to_string()),
                        },
                    ),
                })
            }),
            RuleKind::Not { patterns } => {
                let patterns = self.patterns(patterns, root_id)?;
                parser(move |ctx, pos| {
                    for (index, pattern) in patterns.iter().enumerate() {
                        let stack = ctx.snapshot();
                        let outcome = pattern(ctx, pos)?;
                        ctx.restore(stack);
                        if let Ok(matched) = outcome {
                            return Ok(failure(
                                pos,
                                root_id,
                                id,
                                ErrorKind::NotIncorrectMatch {
                                    index,
                                    len: matched.len,
                                },
                            ));
                        }
                    }
                    Ok(empty(pos))
                })
            }
            RuleKind::Ref { target } => {
                let target = *target;
                self.references.push((id, target));
                parser(move |ctx, pos| ctx.parse_ref(id, target, pos))
            }
            RuleKind::Or { patterns } => {
                let patterns = self.patterns(patterns, root_id)?;
                parser(move |ctx, pos| {
                    let mut errors = Vec::with_capacity(patterns.len());
                    for pattern in patterns.iter() {
                        match pattern(ctx, pos)? {
                            Ok(matched) => return Ok(Ok(matched)),
                            Err(error) => errors.push(error),
                        }
                    }
                    Ok(failure(pos, root_id, id, ErrorKind::OrUnmatchAll { errors }))
                })
            }
            RuleKind::Seq { children, reshape } => {
                let children = self.seq_children(children, root_id)?;
                let reshape = reshape.clone();
                parser(move |ctx, pos| {
                    let mut results = Results::new();
                    let end = match run_sequence(ctx, pos, root_id, id, &children, |child, out| {
                        if !child.skip {
                            results.append(out);
                        }
                    })? {
                        Ok(end) => end,
                        Err(error) => return Ok(Err(error)),
                    };
                    if let Some(f) = &reshape {
                        let value = f(Value::List(ctx.resolve(&results)), ctx);
                        results = Vector::unit(value);
                    }
                    Ok(success(pos, end - pos, results))
                })
            }
            RuleKind::SeqObject { children, reshape } => {
                let children = self.seq_children(children, root_id)?;
                let reshape = reshape.clone();
                parser(move |ctx, pos| {
                    let mut map = OrdMap::new();
                    let end = match run_sequence(ctx, pos, root_id, id, &children, |child, out| {
                        if let (Some(key), false) = (&child.key, child.skip) {
                            map.insert(key.clone(), Value::List(out));
                        }
                    })? {
                        Ok(end) => end,
                        Err(error) => return Ok(Err(error)),
                    };
                    let object = Value::Map(map);
                    let value = match &reshape {
                        Some(f) => f(object.resolve_tokens(ctx.tokens()), ctx),
                        None => object,
                    };
                    Ok(success(pos, end - pos, Vector::unit(value)))
                })
            }
            RuleKind::Repeat {
                pattern,
                min,
                max,
                reshape_each,
                reshape,
            } => {
                if let Some(max) = *max {
                    if *min > max {
                        return Err(GrammarError::InvalidRange {
                            rule_id: id,
                            min: *min,
                            max,
                        });
                    }
                }
                let pattern = self.compile(pattern, root_id)?;
                let (min, max) = (*min, *max);
                let (each, reshape) = (reshape_each.clone(), reshape.clone());
                parser(move |ctx, pos| {
                    let mut cursor = pos;
                    let mut count = 0;
                    let mut results = Results::new();
                    while let Ok(matched) = pattern(ctx, cursor)? {
                        if matched.len == 0 {
                            return Err(EngineError::ZeroLengthRepeat {
                                rule_id: id,
                                pos: cursor,
                            });
                        }
                        count += 1;
                        cursor = matched.end();
                        match &each {
                            Some(f) => {
                                let value = f(Value::List(ctx.resolve(&matched.results)), ctx);
                                results.push_back(value);
                            }
                            None => results.append(matched.results),
                        }
                    }
                    if count < min || max.map_or(false, |max| count > max) {
                        return Ok(failure(
                            pos,
                            root_id,
                            id,
                            ErrorKind::RepeatRangeError { count, min, max },
                        ));
                    }
                    if let Some(f) = &reshape {
                        results = Vector::unit(f(Value::List(ctx.resolve(&results)), ctx));
                    }
                    Ok(success(pos, cursor - pos, results))
                })
            }
            RuleKind::Atom { parse } => {
                let parse = parse.clone();
                parser(move |ctx, pos| {
                    Ok(match parse(ctx, pos)? {
                        Ok(matched) => Ok(matched),
                        Err(child) => {
                            ctx.record_failure(&child);
                            failure(pos, root_id, id, ErrorKind::AtomParseError { child })
                        }
                    })
                })
            }
        };
        Ok(parse)
    }
}

// ============================================================================
// MEMOIZATION
// ============================================================================

/// Remaining native stack below which a rule invocation moves to a fresh segment.
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_SEGMENT: usize = 1024 * 1024;

/// Wraps a rule's parser with the packrat cache.
///
/// Nesting is bounded by `max_depth` alone: the native stack is extended
/// on demand, so deep right recursion never overflows the calling thread.
///
/// A failed attempt leaves the open-item stack exactly as it found it, so
/// sibling alternatives never observe a partial push or pop.
fn memoize(id: RuleId, inner: ParseFn) -> ParseFn {
    parser(move |ctx, pos| {
        if let Some(result) = ctx.recall(id, pos) {
            return Ok(result);
        }
        let stack_in = ctx.snapshot();
        ctx.enter(id, pos)?;
        let outcome = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || inner(ctx, pos));
        ctx.leave();
        let result = outcome?;
        if let Err(error) = &result {
            ctx.record_failure(error);
            ctx.restore(stack_in.clone());
        }
        ctx.remember(id, pos, stack_in, &result);
        Ok(result)
    })
}

// ============================================================================
// SEQUENCES
// ============================================================================

struct CompiledChild {
    parse: ParseFn,
    key: Option<String>,
    optional: bool,
    skip: bool,
    push: bool,
    pop: Option<PopValidator>,
}

/// Runs sequence children from `pos`, handing each success to `collect`.
/// Returns the final cursor.
fn run_sequence(
    ctx: &mut ParseContext<'_>,
    pos: usize,
    root_id: RuleId,
    id: RuleId,
    children: &[CompiledChild],
    mut collect: impl FnMut(&CompiledChild, Results),
) -> EngineResult<Result<usize, Arc<ParseError>>> {
    let mut cursor = pos;
    for (index, child) in children.iter().enumerate() {
        let matched = match (child.parse)(ctx, cursor)? {
            Ok(matched) => matched,
            Err(_) if child.optional => continue,
            Err(error) => {
                return Ok(Err(stop(cursor, root_id, id, ErrorKind::SeqStop {
                    index,
                    child: error,
                })))
            }
        };
        if child.push {
            ctx.push_open(matched.results.clone());
        }
        if let Some(validate) = &child.pop {
            let Some(open) = ctx.pop_open() else {
                return Ok(Err(stop(cursor, root_id, id, ErrorKind::SeqNoStackOnPop { index })));
            };
            if !validate(&open, &matched.results, ctx) {
                return Ok(Err(stop(cursor, root_id, id, ErrorKind::SeqUnmatchStack { index })));
            }
        }
        cursor = matched.end();
        collect(child, matched.results);
    }
    Ok(Ok(cursor))
}

fn stop(pos: usize, root_id: RuleId, id: RuleId, kind: ErrorKind) -> Arc<ParseError> {
    Arc::new(ParseError::new(pos, root_id, id, kind))
}

fn token_value(reshape: &Option<TokenReshape>, token: &str, pos: usize) -> Value {
    match reshape {
        Some(f) => f(token),
        None => Value::Token(pos),
    }
}
