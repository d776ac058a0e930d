//! Structured values carried by successful parses.
//!
//! A success records what it matched as a list of `Value`s. Primitive rules
//! contribute the index of the token they consumed; reshape hooks replace
//! raw captures with arbitrary values. Collections are persistent (`im`), so
//! cloning a result out of the packrat cache or snapshotting the open-item
//! stack never deep-copies.

use std::fmt;

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

/// Ordered results of a single successful match.
pub type Results = Vector<Value>;

/// Canonical payload value produced by the runtime and by reshape hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Nil,
    /// Index of a matched token in the input stream.
    Token(usize),
    /// Token text or any string produced by a reshape.
    Str(String),
    Number(f64),
    Bool(bool),
    List(Vector<Value>),
    /// Keyed results, produced by `SeqObject`.
    Map(OrdMap<String, Value>),
}

impl Value {
    /// Returns the type name of the value (for diagnostics and tests).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Token(_) => "Token",
            Value::Str(_) => "Str",
            Value::Number(_) => "Number",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<usize> {
        match self {
            Value::Token(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vector<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OrdMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Consumes the value as a list. Non-list values become a one-element
    /// list; `Nil` becomes the empty list.
    pub fn into_list(self) -> Vector<Value> {
        match self {
            Value::List(items) => items,
            Value::Nil => Vector::new(),
            other => Vector::unit(other),
        }
    }

    /// Replaces every `Token(i)` (recursively) with the text of `tokens[i]`.
    /// Out-of-range indices resolve to `Nil`.
    pub fn resolve_tokens(&self, tokens: &[String]) -> Value {
        match self {
            Value::Token(i) => tokens
                .get(*i)
                .map(|t| Value::Str(t.clone()))
                .unwrap_or(Value::Nil),
            Value::List(items) => Value::List(resolve_results(items, tokens)),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.resolve_tokens(tokens)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Resolves token indices in every value of `results`.
pub fn resolve_results(results: &Results, tokens: &[String]) -> Results {
    results.iter().map(|v| v.resolve_tokens(tokens)).collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vector<Value>> for Value {
    fn from(items: Vector<Value>) -> Self {
        Value::List(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Token(i) => write!(f, "@{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_nested_token_indices() {
        let toks = tokens(&["a", "b"]);
        let mut map = OrdMap::new();
        map.insert("k".to_string(), Value::Token(1));
        let value = Value::List(Vector::from(vec![
            Value::Token(0),
            Value::Map(map),
            Value::Token(7),
        ]));

        let resolved = value.resolve_tokens(&toks);

        let items = resolved.as_list().unwrap();
        assert_eq!(items[0], Value::from("a"));
        assert_eq!(items[1].as_map().unwrap()["k"], Value::from("b"));
        assert!(items[2].is_nil());
    }

    #[test]
    fn display_is_compact() {
        let value = Value::List(Vector::from(vec![Value::from(1.0), Value::from("x")]));
        assert_eq!(value.to_string(), "(1 \"x\")");
    }
}
