//! Caller-supplied closures embedded in rules.
//!
//! Reshapes, pop validators and custom atoms are executable logic and cannot
//! cross the serialization boundary. A serialized grammar refers to them by
//! index into a `HookTable`, which the host rebuilds and hands back on
//! deserialization.

use std::fmt;
use std::sync::Arc;

use crate::errors::{EngineResult, GrammarError};
use crate::grammar::value::{Results, Value};
use crate::grammar::RuleId;
use crate::runtime::{ParseContext, ParseResult};

/// Post-processing of a successful `Seq`, `SeqObject` or `Repeat` match.
///
/// Receives the token-resolved accumulation (a `List` for `Seq`/`Repeat`,
/// a `Map` for `SeqObject`) and returns the rule's single result value.
pub type Reshape = Arc<dyn Fn(Value, &ParseContext<'_>) -> Value + Send + Sync>;

/// Conversion of a matched token's text, for `Token`, `Regex` and `Any`.
pub type TokenReshape = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// Validates a `pop` child against the item on top of the open-item stack.
/// Arguments are (pushed results, popped-by results, context).
pub type PopValidator = Arc<dyn Fn(&Results, &Results, &ParseContext<'_>) -> bool + Send + Sync>;

/// Escape hatch parser with full access to the context.
pub type AtomFn =
    Arc<dyn Fn(&mut ParseContext<'_>, usize) -> EngineResult<ParseResult> + Send + Sync>;

pub fn reshape<F>(f: F) -> Reshape
where
    F: Fn(Value, &ParseContext<'_>) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn token_reshape<F>(f: F) -> TokenReshape
where
    F: Fn(&str) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn pop_validator<F>(f: F) -> PopValidator
where
    F: Fn(&Results, &Results, &ParseContext<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn atom<F>(f: F) -> AtomFn
where
    F: Fn(&mut ParseContext<'_>, usize) -> EngineResult<ParseResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Validator accepting a pop when both sides resolve to the same token texts.
pub fn same_tokens() -> PopValidator {
    pop_validator(|open, close, ctx| ctx.resolve(open) == ctx.resolve(close))
}

/// Side table of closures, addressed by index from a serialized grammar.
#[derive(Clone, Default)]
pub struct HookTable {
    pub reshapes: Vec<Reshape>,
    pub token_reshapes: Vec<TokenReshape>,
    pub validators: Vec<PopValidator>,
    pub atoms: Vec<AtomFn>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reshape(&mut self, f: Reshape) -> u32 {
        self.reshapes.push(f);
        (self.reshapes.len() - 1) as u32
    }

    pub fn add_token_reshape(&mut self, f: TokenReshape) -> u32 {
        self.token_reshapes.push(f);
        (self.token_reshapes.len() - 1) as u32
    }

    pub fn add_validator(&mut self, f: PopValidator) -> u32 {
        self.validators.push(f);
        (self.validators.len() - 1) as u32
    }

    pub fn add_atom(&mut self, f: AtomFn) -> u32 {
        self.atoms.push(f);
        (self.atoms.len() - 1) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.reshapes.is_empty()
            && self.token_reshapes.is_empty()
            && self.validators.is_empty()
            && self.atoms.is_empty()
    }

    pub(crate) fn reshape(&self, rule_id: RuleId, index: u32) -> Result<Reshape, GrammarError> {
        lookup(&self.reshapes, rule_id, "reshape", index)
    }

    pub(crate) fn token_reshape(
        &self,
        rule_id: RuleId,
        index: u32,
    ) -> Result<TokenReshape, GrammarError> {
        lookup(&self.token_reshapes, rule_id, "token reshape", index)
    }

    pub(crate) fn validator(
        &self,
        rule_id: RuleId,
        index: u32,
    ) -> Result<PopValidator, GrammarError> {
        lookup(&self.validators, rule_id, "pop validator", index)
    }

    pub(crate) fn atom(&self, rule_id: RuleId, index: u32) -> Result<AtomFn, GrammarError> {
        lookup(&self.atoms, rule_id, "atom", index)
    }
}

fn lookup<T: Clone>(
    slots: &[T],
    rule_id: RuleId,
    slot: &'static str,
    index: u32,
) -> Result<T, GrammarError> {
    slots
        .get(index as usize)
        .cloned()
        .ok_or(GrammarError::MissingHook {
            rule_id,
            slot,
            index,
        })
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field("reshapes", &self.reshapes.len())
            .field("token_reshapes", &self.token_reshapes.len())
            .field("validators", &self.validators.len())
            .field("atoms", &self.atoms.len())
            .finish()
    }
}
