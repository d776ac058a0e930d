//! # Rule Graph
//!
//! Declarative description of what to parse. A `Grammar` is a root `Rule`
//! plus a table of definitions that `Ref` rules point at; references are the
//! only way to express recursion, so the rule tree itself is finite while
//! the graph it describes may be cyclic.
//!
//! Every rule carries a `RuleId` that must be unique within a compiled unit:
//! it keys the packrat cache and attributes failures.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::GrammarError;
use crate::runtime::{compile_with, ParseOptions, RootParser};

pub mod hooks;
pub mod serialize;
pub mod value;

use hooks::{AtomFn, PopValidator, Reshape, TokenReshape};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Unique rule identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for RuleId {
    fn from(id: u32) -> Self {
        RuleId(id)
    }
}

/// A node of the rule graph.
#[derive(Clone)]
pub struct Rule {
    pub id: RuleId,
    pub kind: RuleKind,
}

/// The closed set of rule kinds the runtime knows how to dispatch.
#[derive(Clone)]
pub enum RuleKind {
    /// One token equal to `expr`.
    Token {
        expr: String,
        reshape: Option<TokenReshape>,
    },
    /// One token fully matching the pattern `expr` (anchored, unicode).
    Regex {
        expr: String,
        reshape: Option<TokenReshape>,
    },
    /// Any single token.
    Any { reshape: Option<TokenReshape> },
    /// End of the token stream. Consumes nothing.
    Eof,
    /// Negative lookahead: succeeds, consuming nothing, when no pattern matches.
    Not { patterns: Vec<Rule> },
    /// Indirection to a definition, resolved when invoked.
    Ref { target: RuleId },
    /// Ordered concatenation producing a flat result list.
    Seq {
        children: Vec<SeqChild>,
        reshape: Option<Reshape>,
    },
    /// Ordered concatenation producing a keyed map.
    SeqObject {
        children: Vec<SeqChild>,
        reshape: Option<Reshape>,
    },
    /// Ordered choice; first success wins.
    Or { patterns: Vec<Rule> },
    /// Greedy repetition with inclusive bounds; `max: None` is unbounded.
    Repeat {
        pattern: Box<Rule>,
        min: usize,
        max: Option<usize>,
        reshape_each: Option<Reshape>,
        reshape: Option<Reshape>,
    },
    /// Caller-supplied parser.
    Atom { parse: AtomFn },
}

/// A sequence element and its modifiers.
#[derive(Clone)]
pub struct SeqChild {
    pub rule: Rule,
    /// Name of the contribution in a `SeqObject`.
    pub key: Option<String>,
    /// Failure is tolerated; the child then contributes nothing.
    pub optional: bool,
    /// Matched but excluded from the output.
    pub skip: bool,
    /// Push the child's results onto the open-item stack.
    pub push: bool,
    /// Pop the open-item stack and validate it against the child's results.
    pub pop: Option<PopValidator>,
}

// ============================================================================
// RULE CONSTRUCTION
// ============================================================================

impl Rule {
    pub fn new(id: impl Into<RuleId>, kind: RuleKind) -> Self {
        Rule {
            id: id.into(),
            kind,
        }
    }

    pub fn token(id: impl Into<RuleId>, expr: impl Into<String>) -> Self {
        Self::new(
            id,
            RuleKind::Token {
                expr: expr.into(),
                reshape: None,
            },
        )
    }

    pub fn regex(id: impl Into<RuleId>, expr: impl Into<String>) -> Self {
        Self::new(
            id,
            RuleKind::Regex {
                expr: expr.into(),
                reshape: None,
            },
        )
    }

    pub fn any(id: impl Into<RuleId>) -> Self {
        Self::new(id, RuleKind::Any { reshape: None })
    }

    pub fn eof(id: impl Into<RuleId>) -> Self {
        Self::new(id, RuleKind::Eof)
    }

    pub fn not(id: impl Into<RuleId>, patterns: Vec<Rule>) -> Self {
        Self::new(id, RuleKind::Not { patterns })
    }

    pub fn reference(id: impl Into<RuleId>, target: impl Into<RuleId>) -> Self {
        Self::new(
            id,
            RuleKind::Ref {
                target: target.into(),
            },
        )
    }

    pub fn seq(id: impl Into<RuleId>, children: Vec<SeqChild>) -> Self {
        Self::new(
            id,
            RuleKind::Seq {
                children,
                reshape: None,
            },
        )
    }

    pub fn seq_object(id: impl Into<RuleId>, children: Vec<SeqChild>) -> Self {
        Self::new(
            id,
            RuleKind::SeqObject {
                children,
                reshape: None,
            },
        )
    }

    pub fn or(id: impl Into<RuleId>, patterns: Vec<Rule>) -> Self {
        Self::new(id, RuleKind::Or { patterns })
    }

    pub fn repeat(id: impl Into<RuleId>, pattern: Rule, min: usize, max: Option<usize>) -> Self {
        Self::new(
            id,
            RuleKind::Repeat {
                pattern: Box::new(pattern),
                min,
                max,
                reshape_each: None,
                reshape: None,
            },
        )
    }

    pub fn atom(id: impl Into<RuleId>, parse: AtomFn) -> Self {
        Self::new(id, RuleKind::Atom { parse })
    }

    /// Attaches a result reshape to a `Seq`, `SeqObject` or `Repeat`.
    /// Other kinds are returned unchanged.
    pub fn with_reshape(mut self, f: Reshape) -> Self {
        match &mut self.kind {
            RuleKind::Seq { reshape, .. }
            | RuleKind::SeqObject { reshape, .. }
            | RuleKind::Repeat { reshape, .. } => *reshape = Some(f),
            _ => {}
        }
        self
    }

    /// Attaches a per-iteration reshape to a `Repeat`.
    pub fn with_reshape_each(mut self, f: Reshape) -> Self {
        if let RuleKind::Repeat { reshape_each, .. } = &mut self.kind {
            *reshape_each = Some(f);
        }
        self
    }

    /// Attaches a token-text reshape to a `Token`, `Regex` or `Any`.
    pub fn with_token_reshape(mut self, f: TokenReshape) -> Self {
        match &mut self.kind {
            RuleKind::Token { reshape, .. }
            | RuleKind::Regex { reshape, .. }
            | RuleKind::Any { reshape } => *reshape = Some(f),
            _ => {}
        }
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            RuleKind::Token { .. } => "Token",
            RuleKind::Regex { .. } => "Regex",
            RuleKind::Any { .. } => "Any",
            RuleKind::Eof => "Eof",
            RuleKind::Not { .. } => "Not",
            RuleKind::Ref { .. } => "Ref",
            RuleKind::Seq { .. } => "Seq",
            RuleKind::SeqObject { .. } => "SeqObject",
            RuleKind::Or { .. } => "Or",
            RuleKind::Repeat { .. } => "Repeat",
            RuleKind::Atom { .. } => "Atom",
        }
    }

    /// Direct sub-rules, in declaration order. `Ref` targets are not children.
    pub fn children(&self) -> Vec<&Rule> {
        match &self.kind {
            RuleKind::Not { patterns } | RuleKind::Or { patterns } => patterns.iter().collect(),
            RuleKind::Seq { children, .. } | RuleKind::SeqObject { children, .. } => {
                children.iter().map(|c| &c.rule).collect()
            }
            RuleKind::Repeat { pattern, .. } => vec![pattern.as_ref()],
            _ => vec![],
        }
    }

    /// Visits this rule and every nested rule, pre-order.
    pub fn walk<'r>(&'r self, visit: &mut dyn FnMut(&'r Rule)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Number of rule nodes in this tree.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }
}

impl SeqChild {
    pub fn new(rule: Rule) -> Self {
        SeqChild {
            rule,
            key: None,
            optional: false,
            skip: false,
            push: false,
            pop: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn push(mut self) -> Self {
        self.push = true;
        self
    }

    pub fn pop(mut self, validator: PopValidator) -> Self {
        self.pop = Some(validator);
        self
    }
}

impl From<Rule> for SeqChild {
    fn from(rule: Rule) -> Self {
        SeqChild::new(rule)
    }
}

// ============================================================================
// GRAMMAR
// ============================================================================

/// A root rule plus the definitions reachable through `Ref`.
#[derive(Clone, Debug)]
pub struct Grammar {
    root: Rule,
    definitions: BTreeMap<RuleId, Rule>,
}

impl Grammar {
    pub fn new(root: Rule) -> Self {
        Grammar {
            root,
            definitions: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a definition and returns its id.
    pub fn define(&mut self, rule: Rule) -> RuleId {
        let id = rule.id;
        self.definitions.insert(id, rule);
        id
    }

    pub fn with_definition(mut self, rule: Rule) -> Self {
        self.define(rule);
        self
    }

    pub fn root(&self) -> &Rule {
        &self.root
    }

    pub fn definition(&self, id: RuleId) -> Option<&Rule> {
        self.definitions.get(&id)
    }

    /// Definitions in ascending id order.
    pub fn definitions(&self) -> impl Iterator<Item = &Rule> {
        self.definitions.values()
    }

    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    /// Total rule nodes across the root and all definitions, without
    /// counting the root twice when it is also a definition.
    pub fn node_count(&self) -> usize {
        let defs: usize = self.definitions.values().map(Rule::node_count).sum();
        if self.definitions.contains_key(&self.root.id) {
            defs
        } else {
            defs + self.root.node_count()
        }
    }

    /// Compiles with default options.
    pub fn compile(&self) -> Result<RootParser, GrammarError> {
        compile_with(self, ParseOptions::default())
    }
}

// ============================================================================
// DEBUG FORMATTING
// ============================================================================

fn hook<T>(slot: &Option<T>) -> Option<&'static str> {
    slot.as_ref().map(|_| "<fn>")
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.id, self.kind)
    }
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Token { expr, reshape } => f
                .debug_struct("Token")
                .field("expr", expr)
                .field("reshape", &hook(reshape))
                .finish(),
            RuleKind::Regex { expr, reshape } => f
                .debug_struct("Regex")
                .field("expr", expr)
                .field("reshape", &hook(reshape))
                .finish(),
            RuleKind::Any { reshape } => f
                .debug_struct("Any")
                .field("reshape", &hook(reshape))
                .finish(),
            RuleKind::Eof => write!(f, "Eof"),
            RuleKind::Not { patterns } => f.debug_tuple("Not").field(patterns).finish(),
            RuleKind::Ref { target } => write!(f, "Ref({target})"),
            RuleKind::Seq { children, reshape } => f
                .debug_struct("Seq")
                .field("children", children)
                .field("reshape", &hook(reshape))
                .finish(),
            RuleKind::SeqObject { children, reshape } => f
                .debug_struct("SeqObject")
                .field("children", children)
                .field("reshape", &hook(reshape))
                .finish(),
            RuleKind::Or { patterns } => f.debug_tuple("Or").field(patterns).finish(),
            RuleKind::Repeat {
                pattern,
                min,
                max,
                reshape_each,
                reshape,
            } => f
                .debug_struct("Repeat")
                .field("pattern", pattern)
                .field("min", min)
                .field("max", max)
                .field("reshape_each", &hook(reshape_each))
                .field("reshape", &hook(reshape))
                .finish(),
            RuleKind::Atom { .. } => write!(f, "Atom(<fn>)"),
        }
    }
}

impl fmt::Debug for SeqChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeqChild")
            .field("rule", &self.rule)
            .field("key", &self.key)
            .field("optional", &self.optional)
            .field("skip", &self.skip)
            .field("push", &self.push)
            .field("pop", &hook(&self.pop))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_visits_pre_order() {
        let rule = Rule::seq(
            1,
            vec![
                Rule::token(2, "a").into(),
                Rule::or(3, vec![Rule::token(4, "b"), Rule::reference(5, 9)]).into(),
            ],
        );
        let mut ids = vec![];
        rule.walk(&mut |r| ids.push(r.id.0));
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(rule.node_count(), 5);
    }

    #[test]
    fn node_count_does_not_double_count_defined_root() {
        let root = Rule::seq(1, vec![Rule::token(2, "x").into()]);
        let grammar = Grammar::new(root.clone()).with_definition(root);
        assert_eq!(grammar.node_count(), 2);
    }

    #[test]
    fn reshape_setters_ignore_unrelated_kinds() {
        let rule = Rule::eof(1).with_reshape(hooks::reshape(|v, _| v));
        assert!(matches!(rule.kind, RuleKind::Eof));
    }
}
