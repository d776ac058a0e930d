//! Handles all user-facing output for the CLI.
//!
//! Results are printed as plain JSON: token indices are resolved to token
//! text and values lose their enum tags, so `["(", "1"]` prints as such
//! rather than as a list of `{"Str": ..}` objects.

use serde_json::{json, Map, Number};

use crate::grammar::value::Value;
use crate::runtime::ParseSuccess;

/// Converts a value into untagged JSON. Non-finite numbers become `null`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Token(index) => json!(index),
        Value::Str(s) => json!(s),
        Value::Number(n) => Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Bool(b) => json!(b),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// Renders a success with its results resolved against `tokens`.
pub fn render_success(success: &ParseSuccess, tokens: &[String]) -> Result<String, serde_json::Error> {
    let results: Vec<_> = success.resolved(tokens).iter().map(value_to_json).collect();
    serde_json::to_string_pretty(&json!({
        "pos": success.pos,
        "len": success.len,
        "results": results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use im::vector;

    #[test]
    fn success_prints_token_text() {
        let tokens = vec!["(".to_string(), "1".to_string()];
        let success = ParseSuccess::new(0, 2, vector![Value::Token(0), Value::Token(1)]);
        let rendered: serde_json::Value =
            serde_json::from_str(&render_success(&success, &tokens).unwrap()).unwrap();
        assert_eq!(rendered, json!({"pos": 0, "len": 2, "results": ["(", "1"]}));
    }
}
