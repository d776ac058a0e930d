//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use pargen::grammar::hooks;
use pargen::{Grammar, Rule, RuleId, SeqChild, Value};

pub const ROOT: RuleId = RuleId(1);
pub const EXPR: RuleId = RuleId(10);

/// Splits a source string on whitespace into tokens.
pub fn toks(src: &str) -> Vec<String> {
    src.split_whitespace().map(str::to_string).collect()
}

/// `"(" Expr ")"` where `Expr = Any "+" Any | Any`.
///
/// The addition is reshaped into its numeric sum and the parenthesised form
/// into the value of its inner expression.
pub fn arithmetic() -> Grammar {
    let root = Rule::seq(
        ROOT,
        vec![
            SeqChild::new(Rule::token(2, "(")).skip(),
            Rule::reference(3, EXPR).into(),
            SeqChild::new(Rule::token(4, ")")).skip(),
        ],
    )
    .with_reshape(hooks::reshape(|value, _| {
        value.into_list().front().cloned().unwrap_or_default()
    }));
    let add = Rule::seq(
        11,
        vec![
            Rule::any(12).into(),
            SeqChild::new(Rule::token(13, "+")).skip(),
            Rule::any(14).into(),
        ],
    )
    .with_reshape(hooks::reshape(|value, _| {
        let sum: f64 = value
            .into_list()
            .iter()
            .filter_map(|v| v.as_str().and_then(|s| s.parse::<f64>().ok()))
            .sum();
        Value::Number(sum)
    }));
    let expr = Rule::or(EXPR, vec![add, Rule::any(15)]);
    Grammar::new(root).with_definition(expr)
}

/// Same shape as `arithmetic`, without any closures, so it survives a trip
/// through a file.
pub fn arithmetic_plain() -> Grammar {
    let root = Rule::seq(
        ROOT,
        vec![
            Rule::token(2, "(").into(),
            Rule::reference(3, EXPR).into(),
            Rule::token(4, ")").into(),
        ],
    );
    let add = Rule::seq(
        11,
        vec![Rule::any(12).into(), Rule::token(13, "+").into(), Rule::any(14).into()],
    );
    Grammar::new(root).with_definition(Rule::or(EXPR, vec![add, Rule::any(15)]))
}
