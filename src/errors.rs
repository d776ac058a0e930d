//! # Pargen Error Model
//!
//! Three distinct classes of failure:
//!
//! - **`ParseError`**: an ordinary, locally recoverable parse failure. Any
//!   enclosing `Or` or `optional` child may absorb it. Composite kinds wrap
//!   their nested causes instead of flattening them, so the full causal chain
//!   survives to the caller.
//! - **`EngineError`**: the grammar is malformed in a way no token stream can
//!   fix (zero-length repetition, dangling reference, runaway recursion). It
//!   is never absorbed and aborts the whole parse.
//! - **`GrammarError`**: problems detected while compiling or decoding a
//!   grammar, before any token is looked at.

use std::sync::Arc;

use thiserror::Error;

use crate::grammar::RuleId;

pub mod trace;

pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// PARSE FAILURES
// ============================================================================

/// A parse failure at `pos`, raised by rule `rule_id` inside the definition
/// `root_id`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} (rule {rule_id} in {root_id}, position {pos})")]
pub struct ParseError {
    pub pos: usize,
    pub root_id: RuleId,
    pub rule_id: RuleId,
    pub kind: ErrorKind,
}

/// Failure reasons. The first four are primitive leaf mismatches; the rest
/// are raised by composite rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// `expect: None` means any token was acceptable (an `Any` at end of input).
    #[error("expected {}, got {}", describe_expected(.expect), describe_token(.got))]
    TokenUnmatch {
        expect: Option<String>,
        got: Option<String>,
    },
    #[error("expected token matching /{expect}/, got {}", describe_token(.got))]
    RegexUnmatch { expect: String, got: Option<String> },
    #[error("expected end of input, got {}", describe_token(.got))]
    EofUnmatch { got: Option<String> },
    #[error("negative lookahead alternative {index} matched {len} token(s)")]
    NotIncorrectMatch { index: usize, len: usize },
    #[error("sequence stopped at child {index}")]
    SeqStop { index: usize, child: Arc<ParseError> },
    #[error("child {index} pops an empty open-item stack")]
    SeqNoStackOnPop { index: usize },
    #[error("child {index} does not close the open item on top of the stack")]
    SeqUnmatchStack { index: usize },
    #[error("all {} alternatives failed", .errors.len())]
    OrUnmatchAll { errors: Vec<Arc<ParseError>> },
    #[error("matched {count} repetition(s), expected {}", describe_range(.min, .max))]
    RepeatRangeError {
        count: usize,
        min: usize,
        max: Option<usize>,
    },
    #[error("custom atom failed")]
    AtomParseError { child: Arc<ParseError> },
}

fn describe_expected(expect: &Option<String>) -> String {
    match expect {
        Some(token) => format!("{token:?}"),
        None => "any token".to_string(),
    }
}

fn describe_token(got: &Option<String>) -> String {
    match got {
        Some(token) => format!("{token:?}"),
        None => "end of input".to_string(),
    }
}

fn describe_range(min: &usize, max: &Option<usize>) -> String {
    match max {
        Some(max) => format!("{min}..={max}"),
        None => format!("at least {min}"),
    }
}

impl ErrorKind {
    /// Leaf mismatches are the only kinds tracked as the furthest failure.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ErrorKind::TokenUnmatch { .. }
                | ErrorKind::RegexUnmatch { .. }
                | ErrorKind::EofUnmatch { .. }
                | ErrorKind::NotIncorrectMatch { .. }
        )
    }

    /// Stable short name, as used in traces.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::TokenUnmatch { .. } => "Token_Unmatch",
            ErrorKind::RegexUnmatch { .. } => "Regex_Unmatch",
            ErrorKind::EofUnmatch { .. } => "Eof_Unmatch",
            ErrorKind::NotIncorrectMatch { .. } => "Not_IncorrectMatch",
            ErrorKind::SeqStop { .. } => "Seq_Stop",
            ErrorKind::SeqNoStackOnPop { .. } => "Seq_NoStackOnPop",
            ErrorKind::SeqUnmatchStack { .. } => "Seq_UnmatchStack",
            ErrorKind::OrUnmatchAll { .. } => "Or_UnmatchAll",
            ErrorKind::RepeatRangeError { .. } => "Repeat_RangeError",
            ErrorKind::AtomParseError { .. } => "Atom_ParseError",
        }
    }
}

impl ParseError {
    pub fn new(pos: usize, root_id: RuleId, rule_id: RuleId, kind: ErrorKind) -> Self {
        ParseError {
            pos,
            root_id,
            rule_id,
            kind,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.kind.is_primitive()
    }

    /// Nested causes, in the order they were produced.
    pub fn causes(&self) -> &[Arc<ParseError>] {
        match &self.kind {
            ErrorKind::SeqStop { child, .. } | ErrorKind::AtomParseError { child } => {
                std::slice::from_ref(child)
            }
            ErrorKind::OrUnmatchAll { errors } => errors,
            _ => &[],
        }
    }

    /// The most likely actual failure inside this cause tree: the furthest
    /// primitive failure, earliest-declared on ties. Trees with no primitive
    /// leaf fall back to the furthest leaf.
    pub fn root_cause(&self) -> &ParseError {
        let mut best: Option<&ParseError> = None;
        let mut best_leaf: &ParseError = self;
        self.visit_leaves(&mut |leaf| {
            if leaf.is_primitive() && best.map_or(true, |b| leaf.pos > b.pos) {
                best = Some(leaf);
            }
            if leaf.pos > best_leaf.pos || !best_leaf.causes().is_empty() {
                best_leaf = leaf;
            }
        });
        best.unwrap_or(best_leaf)
    }

    fn visit_leaves<'e>(&'e self, visit: &mut dyn FnMut(&'e ParseError)) {
        let causes = self.causes();
        if causes.is_empty() {
            visit(self);
        }
        for cause in causes {
            cause.visit_leaves(visit);
        }
    }
}

// ============================================================================
// FATAL ENGINE ERRORS
// ============================================================================

/// Conditions that indicate a malformed grammar and abort the parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("repeat rule {rule_id} matched zero tokens at position {pos}; it would loop forever")]
    ZeroLengthRepeat { rule_id: RuleId, pos: usize },
    #[error("reference rule {rule_id} points at undefined rule {target}")]
    DanglingRef { rule_id: RuleId, target: RuleId },
    #[error("nesting depth exceeded {limit} at rule {rule_id}, position {pos}")]
    DepthLimit {
        rule_id: RuleId,
        pos: usize,
        limit: usize,
    },
}

// ============================================================================
// GRAMMAR ERRORS
// ============================================================================

/// Errors raised while compiling or decoding a grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("rule id {id} is used more than once")]
    DuplicateId { id: RuleId },
    #[error("reference rule {rule_id} points at undefined rule {target}")]
    DanglingRef { rule_id: RuleId, target: RuleId },
    #[error("regex rule {rule_id} has an invalid pattern /{expr}/")]
    InvalidRegex {
        rule_id: RuleId,
        expr: String,
        #[source]
        source: regex::Error,
    },
    #[error("repeat rule {rule_id} has min {min} greater than max {max}")]
    InvalidRange {
        rule_id: RuleId,
        min: usize,
        max: usize,
    },
    #[error("rule {rule_id} refers to {slot} hook {index}, which the hook table does not provide")]
    MissingHook {
        rule_id: RuleId,
        slot: &'static str,
        index: u32,
    },
    #[error("malformed grammar encoding at rule entry {index}: {reason}")]
    MalformedEncoding { index: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(pos: usize, kind: ErrorKind) -> Arc<ParseError> {
        Arc::new(ParseError::new(pos, RuleId(0), RuleId(pos as u32), kind))
    }

    fn token_miss(pos: usize, expect: &str) -> Arc<ParseError> {
        leaf(
            pos,
            ErrorKind::TokenUnmatch {
                expect: Some(expect.to_string()),
                got: None,
            },
        )
    }

    #[test]
    fn messages_describe_missing_tokens() {
        let err = token_miss(2, ")");
        assert_eq!(err.kind.to_string(), "expected \")\", got end of input");
        let any = ErrorKind::TokenUnmatch {
            expect: None,
            got: None,
        };
        assert_eq!(any.to_string(), "expected any token, got end of input");
    }

    #[test]
    fn root_cause_prefers_furthest_primitive() {
        let or = ParseError::new(
            0,
            RuleId(0),
            RuleId(10),
            ErrorKind::OrUnmatchAll {
                errors: vec![
                    token_miss(1, "a"),
                    token_miss(3, "b"),
                    leaf(
                        5,
                        ErrorKind::RepeatRangeError {
                            count: 0,
                            min: 1,
                            max: None,
                        },
                    ),
                    token_miss(3, "c"),
                ],
            },
        );
        let cause = or.root_cause();
        assert_eq!(cause.pos, 3);
        assert!(matches!(&cause.kind, ErrorKind::TokenUnmatch { expect: Some(e), .. } if e == "b"));
    }

    #[test]
    fn root_cause_falls_back_to_furthest_leaf() {
        let stop = ParseError::new(
            0,
            RuleId(0),
            RuleId(1),
            ErrorKind::SeqStop {
                index: 1,
                child: leaf(4, ErrorKind::SeqNoStackOnPop { index: 0 }),
            },
        );
        assert_eq!(stop.root_cause().pos, 4);
        assert_eq!(stop.root_cause().kind.name(), "Seq_NoStackOnPop");
    }

    #[test]
    fn range_message_handles_unbounded_max() {
        let kind = ErrorKind::RepeatRangeError {
            count: 0,
            min: 1,
            max: None,
        };
        assert_eq!(kind.to_string(), "matched 0 repetition(s), expected at least 1");
    }
}
