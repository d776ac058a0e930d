//! # Compact Grammar Encoding
//!
//! A `Grammar` flattened into tables so it can be persisted or shipped and
//! rebuilt without re-expressing any closure.
//!
//! Each rule becomes a tuple `[tag, operands, trailer]` with
//! `trailer = [id, flags, keyPtr, reshapePtr, popPtr]`. Strings (token
//! literals, patterns, keys) live in one shared `strings` table and child
//! lists in a shared `children` table. Rules are emitted in post-order, so a
//! child always sits at a lower index than its parent.
//!
//! Closures never enter the encoding. Each one is moved into a `HookTable`
//! in traversal order and referenced by index; decoding takes the table
//! back and reattaches them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::GrammarError;
use crate::grammar::hooks::HookTable;
use crate::grammar::{Grammar, Rule, RuleId, RuleKind, SeqChild};

// ============================================================================
// ENCODING TABLES
// ============================================================================

pub const TAG_TOKEN: u8 = 0;
pub const TAG_REGEX: u8 = 1;
pub const TAG_ANY: u8 = 2;
pub const TAG_EOF: u8 = 3;
pub const TAG_NOT: u8 = 4;
pub const TAG_REF: u8 = 5;
pub const TAG_SEQ: u8 = 6;
pub const TAG_SEQ_OBJECT: u8 = 7;
pub const TAG_OR: u8 = 8;
pub const TAG_REPEAT: u8 = 9;
pub const TAG_ATOM: u8 = 10;

pub const FLAG_OPTIONAL: u8 = 1;
pub const FLAG_SKIP: u8 = 2;
pub const FLAG_PUSH: u8 = 4;
pub const FLAG_POP: u8 = 8;

/// Marks an absent bound or hook inside the numeric `Repeat` operands.
pub const NONE: u32 = u32::MAX;

/// `[id, flags, keyPtr, reshapePtr, popPtr]`. The flags and the key and pop
/// pointers describe the rule's modifiers when it is used as a sequence
/// child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTrailer(
    pub u32,
    pub u8,
    pub Option<u32>,
    pub Option<u32>,
    pub Option<u32>,
);

/// `[tag, operands, trailer]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedRule(pub u8, pub Vec<u32>, pub RuleTrailer);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedGrammar {
    pub strings: Vec<String>,
    pub children: Vec<Vec<u32>>,
    pub rules: Vec<SerializedRule>,
    /// Indices into `rules` of every definition.
    pub definitions: Vec<u32>,
    /// Index into `rules` of the root.
    pub root: u32,
}

impl SerializedGrammar {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

impl Grammar {
    /// Flattens the grammar, returning the encoding and the closures it
    /// refers to.
    ///
    /// Fails when a `Repeat` bound does not fit the numeric operands.
    pub fn to_serialized(&self) -> Result<(SerializedGrammar, HookTable), GrammarError> {
        let mut encoder = Encoder::default();
        let mut by_id = HashMap::new();
        for rule in self.definitions() {
            let index = encoder.encode(rule, None)?;
            encoder.out.definitions.push(index);
            by_id.insert(rule.id, index);
        }
        encoder.out.root = match by_id.get(&self.root().id) {
            Some(&index) => index,
            None => encoder.encode(self.root(), None)?,
        };
        Ok((encoder.out, encoder.hooks))
    }

    /// Rebuilds a grammar, reattaching closures from `hooks` by index.
    pub fn from_serialized(
        encoded: &SerializedGrammar,
        hooks: &HookTable,
    ) -> Result<Grammar, GrammarError> {
        let decoder = Decoder { encoded, hooks };
        let root = decoder.rule(encoded.root as usize, None)?;
        let mut grammar = Grammar::new(root);
        for &index in &encoded.definitions {
            grammar.define(decoder.rule(index as usize, None)?);
        }
        Ok(grammar)
    }
}

// ============================================================================
// ENCODER
// ============================================================================

#[derive(Default)]
struct Encoder {
    out: SerializedGrammar,
    interned: HashMap<String, u32>,
    hooks: HookTable,
}

impl Encoder {
    fn string(&mut self, s: &str) -> u32 {
        if let Some(&ptr) = self.interned.get(s) {
            return ptr;
        }
        let ptr = self.out.strings.len() as u32;
        self.out.strings.push(s.to_string());
        self.interned.insert(s.to_string(), ptr);
        ptr
    }

    fn child_list(&mut self, indices: Vec<u32>) -> u32 {
        self.out.children.push(indices);
        (self.out.children.len() - 1) as u32
    }

    fn seq_children(&mut self, children: &[SeqChild]) -> Result<u32, GrammarError> {
        let indices = children
            .iter()
            .map(|child| self.encode(&child.rule, Some(child)))
            .collect::<Result<_, _>>()?;
        Ok(self.child_list(indices))
    }

    fn patterns(&mut self, patterns: &[Rule]) -> Result<u32, GrammarError> {
        let indices = patterns
            .iter()
            .map(|p| self.encode(p, None))
            .collect::<Result<_, _>>()?;
        Ok(self.child_list(indices))
    }

    /// Repeat bounds must fit in `u32` below the `NONE` sentinel.
    fn bound(&self, value: usize, name: &str) -> Result<u32, GrammarError> {
        u32::try_from(value)
            .ok()
            .filter(|&v| v != NONE)
            .ok_or_else(|| GrammarError::MalformedEncoding {
                index: self.out.rules.len(),
                reason: format!("repeat {name} {value} does not fit the encoding"),
            })
    }

    fn encode(&mut self, rule: &Rule, modifiers: Option<&SeqChild>) -> Result<u32, GrammarError> {
        let mut reshape_ptr = None;
        let (tag, operands) = match &rule.kind {
            RuleKind::Token { expr, reshape } | RuleKind::Regex { expr, reshape } => {
                reshape_ptr = reshape.clone().map(|f| self.hooks.add_token_reshape(f));
                let tag = if matches!(rule.kind, RuleKind::Token { .. }) {
                    TAG_TOKEN
                } else {
                    TAG_REGEX
                };
                (tag, vec![self.string(expr)])
            }
            RuleKind::Any { reshape } => {
                reshape_ptr = reshape.clone().map(|f| self.hooks.add_token_reshape(f));
                (TAG_ANY, vec![])
            }
            RuleKind::Eof => (TAG_EOF, vec![]),
            RuleKind::Not { patterns } => (TAG_NOT, vec![self.patterns(patterns)?]),
            RuleKind::Or { patterns } => (TAG_OR, vec![self.patterns(patterns)?]),
            RuleKind::Ref { target } => (TAG_REF, vec![target.0]),
            RuleKind::Seq { children, reshape } => {
                let list = self.seq_children(children)?;
                reshape_ptr = reshape.clone().map(|f| self.hooks.add_reshape(f));
                (TAG_SEQ, vec![list])
            }
            RuleKind::SeqObject { children, reshape } => {
                let list = self.seq_children(children)?;
                reshape_ptr = reshape.clone().map(|f| self.hooks.add_reshape(f));
                (TAG_SEQ_OBJECT, vec![list])
            }
            RuleKind::Repeat {
                pattern,
                min,
                max,
                reshape_each,
                reshape,
            } => {
                let pattern = self.encode(pattern, None)?;
                let each = reshape_each
                    .clone()
                    .map_or(NONE, |f| self.hooks.add_reshape(f));
                reshape_ptr = reshape.clone().map(|f| self.hooks.add_reshape(f));
                let min = self.bound(*min, "min")?;
                let max = match max {
                    Some(m) => self.bound(*m, "max")?,
                    None => NONE,
                };
                (TAG_REPEAT, vec![pattern, min, max, each])
            }
            RuleKind::Atom { parse } => (TAG_ATOM, vec![self.hooks.add_atom(parse.clone())]),
        };

        let mut flags = 0;
        let mut key_ptr = None;
        let mut pop_ptr = None;
        if let Some(child) = modifiers {
            if child.optional {
                flags |= FLAG_OPTIONAL;
            }
            if child.skip {
                flags |= FLAG_SKIP;
            }
            if child.push {
                flags |= FLAG_PUSH;
            }
            if let Some(validator) = &child.pop {
                flags |= FLAG_POP;
                pop_ptr = Some(self.hooks.add_validator(validator.clone()));
            }
            key_ptr = child.key.as_deref().map(|k| self.string(k));
        }

        self.out.rules.push(SerializedRule(
            tag,
            operands,
            RuleTrailer(rule.id.0, flags, key_ptr, reshape_ptr, pop_ptr),
        ));
        Ok((self.out.rules.len() - 1) as u32)
    }
}

// ============================================================================
// DECODER
// ============================================================================

struct Decoder<'a> {
    encoded: &'a SerializedGrammar,
    hooks: &'a HookTable,
}

fn malformed(index: usize, reason: impl Into<String>) -> GrammarError {
    GrammarError::MalformedEncoding {
        index,
        reason: reason.into(),
    }
}

impl<'a> Decoder<'a> {
    /// Decodes entry `index`. `parent` is the index of the referring entry,
    /// which must come later in post-order.
    fn rule(&self, index: usize, parent: Option<usize>) -> Result<Rule, GrammarError> {
        if let Some(parent) = parent {
            if index >= parent {
                return Err(malformed(
                    parent,
                    format!("child {index} does not precede its parent"),
                ));
            }
        }
        let SerializedRule(tag, operands, trailer) = self
            .encoded
            .rules
            .get(index)
            .ok_or_else(|| malformed(index, "no such rule entry"))?;
        let id = RuleId(trailer.0);
        let reshape_ptr = trailer.3;

        let arity = match *tag {
            TAG_ANY | TAG_EOF => 0,
            TAG_REPEAT => 4,
            TAG_TOKEN..=TAG_ATOM => 1,
            other => return Err(malformed(index, format!("unknown tag {other}"))),
        };
        if operands.len() != arity {
            return Err(malformed(
                index,
                format!("expected {arity} operand(s), found {}", operands.len()),
            ));
        }

        let token_reshape = |ptr: Option<u32>| {
            ptr.map(|p| self.hooks.token_reshape(id, p)).transpose()
        };
        let reshape = |ptr: Option<u32>| ptr.map(|p| self.hooks.reshape(id, p)).transpose();

        let kind = match *tag {
            TAG_TOKEN => RuleKind::Token {
                expr: self.string(index, operands[0])?,
                reshape: token_reshape(reshape_ptr)?,
            },
            TAG_REGEX => RuleKind::Regex {
                expr: self.string(index, operands[0])?,
                reshape: token_reshape(reshape_ptr)?,
            },
            TAG_ANY => RuleKind::Any {
                reshape: token_reshape(reshape_ptr)?,
            },
            TAG_EOF => RuleKind::Eof,
            TAG_NOT => RuleKind::Not {
                patterns: self.patterns(index, operands[0])?,
            },
            TAG_OR => RuleKind::Or {
                patterns: self.patterns(index, operands[0])?,
            },
            TAG_REF => RuleKind::Ref {
                target: RuleId(operands[0]),
            },
            TAG_SEQ => RuleKind::Seq {
                children: self.seq_children(index, operands[0])?,
                reshape: reshape(reshape_ptr)?,
            },
            TAG_SEQ_OBJECT => RuleKind::SeqObject {
                children: self.seq_children(index, operands[0])?,
                reshape: reshape(reshape_ptr)?,
            },
            TAG_REPEAT => {
                let each = operands[3];
                RuleKind::Repeat {
                    pattern: Box::new(self.rule(operands[0] as usize, Some(index))?),
                    min: operands[1] as usize,
                    max: (operands[2] != NONE).then_some(operands[2] as usize),
                    reshape_each: reshape((each != NONE).then_some(each))?,
                    reshape: reshape(reshape_ptr)?,
                }
            }
            _ => RuleKind::Atom {
                parse: self.hooks.atom(id, operands[0])?,
            },
        };
        Ok(Rule { id, kind })
    }

    fn child_list(&self, index: usize, ptr: u32) -> Result<&'a [u32], GrammarError> {
        self.encoded
            .children
            .get(ptr as usize)
            .map(Vec::as_slice)
            .ok_or_else(|| malformed(index, format!("children pointer {ptr} out of range")))
    }

    fn string(&self, index: usize, ptr: u32) -> Result<String, GrammarError> {
        self.encoded
            .strings
            .get(ptr as usize)
            .cloned()
            .ok_or_else(|| malformed(index, format!("string pointer {ptr} out of range")))
    }

    fn patterns(&self, index: usize, ptr: u32) -> Result<Vec<Rule>, GrammarError> {
        self.child_list(index, ptr)?
            .iter()
            .map(|&child| self.rule(child as usize, Some(index)))
            .collect()
    }

    fn seq_children(&self, index: usize, ptr: u32) -> Result<Vec<SeqChild>, GrammarError> {
        self.child_list(index, ptr)?
            .iter()
            .map(|&child| self.seq_child(child as usize, index))
            .collect()
    }

    fn seq_child(&self, index: usize, parent: usize) -> Result<SeqChild, GrammarError> {
        let rule = self.rule(index, Some(parent))?;
        let RuleTrailer(_, flags, key_ptr, _, pop_ptr) = &self.encoded.rules[index].2;
        let mut child = SeqChild::new(rule);
        child.optional = flags & FLAG_OPTIONAL != 0;
        child.skip = flags & FLAG_SKIP != 0;
        child.push = flags & FLAG_PUSH != 0;
        if let Some(ptr) = key_ptr {
            child.key = Some(self.string(index, *ptr)?);
        }
        if flags & FLAG_POP != 0 {
            let ptr = (*pop_ptr).ok_or_else(|| malformed(index, "pop flag without a validator"))?;
            child.pop = Some(self.hooks.validator(child.rule.id, ptr)?);
        }
        Ok(child)
    }
}
