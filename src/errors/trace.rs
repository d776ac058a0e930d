//! Explanatory traces over nested parse failures.
//!
//! A trace renders the cause tree of a `ParseError` one failure per line,
//! indented by nesting depth, with the token at each failing position:
//!
//! ```text
//! Seq_Stop #1 in #1 @2 [<eof>]: sequence stopped at child 2
//!   Token_Unmatch #4 in #1 @2 [<eof>]: expected ")", got end of input
//! ```

use std::fmt;

use crate::errors::ParseError;

const INDENT: &str = "  ";
const END_OF_INPUT: &str = "<eof>";

impl ParseError {
    /// Renders the full cause tree against the token stream it came from.
    pub fn trace(&self, tokens: &[String]) -> String {
        Trace {
            error: self,
            tokens,
            depth: 0,
        }
        .to_string()
    }

    /// One-line summary: kind, rule, position and the offending token.
    pub fn summary(&self, tokens: &[String]) -> String {
        format!(
            "{} {} in {} @{} [{}]: {}",
            self.kind.name(),
            self.rule_id,
            self.root_id,
            self.pos,
            token_at(tokens, self.pos),
            self.kind
        )
    }
}

struct Trace<'a> {
    error: &'a ParseError,
    tokens: &'a [String],
    depth: usize,
}

impl fmt::Display for Trace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.error.summary(self.tokens);
        writeln!(f, "{}{}", INDENT.repeat(self.depth), summary)?;
        for cause in self.error.causes() {
            Trace {
                error: cause,
                tokens: self.tokens,
                depth: self.depth + 1,
            }
            .fmt(f)?;
        }
        Ok(())
    }
}

fn token_at(tokens: &[String], pos: usize) -> &str {
    tokens.get(pos).map(String::as_str).unwrap_or(END_OF_INPUT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::errors::{ErrorKind, ParseError};
    use crate::grammar::RuleId;

    #[test]
    fn trace_indents_nested_causes() {
        let tokens = vec!["(".to_string(), "1".to_string()];
        let inner = Arc::new(ParseError::new(
            2,
            RuleId(1),
            RuleId(4),
            ErrorKind::TokenUnmatch {
                expect: Some(")".to_string()),
                got: None,
            },
        ));
        let outer = ParseError::new(2, RuleId(1), RuleId(1), ErrorKind::SeqStop { index: 2, child: inner });

        let trace = outer.trace(&tokens);
        let lines: Vec<&str> = trace.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Seq_Stop #1 in #1 @2 [<eof>]"));
        assert!(lines[1].starts_with("  Token_Unmatch #4 in #1 @2"));
        assert!(lines[1].contains("expected \")\""));
    }
}
