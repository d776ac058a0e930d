//! # Diagnostics
//!
//! `PargenError` is the crate's top-level error, unifying grammar, engine,
//! parse and I/O failures behind one `miette::Diagnostic`.
//!
//! A parse failure has no source text of its own, only tokens. For
//! rendering, the tokens are joined with single spaces into a named source
//! and the token at the furthest primitive failure is labelled; the full
//! cause tree goes into the help text.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::errors::{EngineError, GrammarError, ParseError};

pub type SourceArc = Arc<NamedSource<String>>;

/// Top-level failure of any pargen operation.
#[derive(Debug, Error)]
pub enum PargenError {
    #[error(transparent)]
    Parse(Box<ParseFailure>),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A root parse that no rule could recover from.
#[derive(Debug)]
pub struct ParseFailure {
    /// Failure returned by the root rule.
    pub error: Arc<ParseError>,
    /// Furthest primitive failure seen during the parse.
    pub furthest: Option<Arc<ParseError>>,
    pub tokens: Vec<String>,
    /// Token position the diagnostic points at.
    pub pos: usize,
    source: SourceArc,
    span: (usize, usize),
}

impl ParseFailure {
    pub fn new(error: Arc<ParseError>, furthest: Option<Arc<ParseError>>, tokens: Vec<String>) -> Self {
        let pos = furthest
            .as_ref()
            .map_or_else(|| error.root_cause().pos, |f| f.pos);
        let (text, span) = render_tokens(&tokens, pos);
        ParseFailure {
            error,
            furthest,
            tokens,
            pos,
            source: to_error_source(text),
            span,
        }
    }

    /// The single failure most worth showing a user.
    pub fn primary(&self) -> &ParseError {
        match &self.furthest {
            Some(furthest) => furthest.as_ref(),
            None => self.error.root_cause(),
        }
    }

    fn headline(&self) -> String {
        self.primary().kind.to_string()
    }

    pub fn trace(&self) -> String {
        self.error.trace(&self.tokens)
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse failed at token {}: {}", self.pos, self.headline())
    }
}

impl std::error::Error for ParseFailure {}

impl From<ParseFailure> for PargenError {
    fn from(failure: ParseFailure) -> Self {
        PargenError::Parse(Box::new(failure))
    }
}

impl PargenError {
    pub fn error_code(&self) -> &'static str {
        match self {
            PargenError::Parse(_) => "pargen::parse",
            PargenError::Engine(_) => "pargen::engine",
            PargenError::Grammar(_) => "pargen::grammar",
            PargenError::Io(_) => "pargen::io",
            PargenError::Json(_) => "pargen::json",
            PargenError::Yaml(_) => "pargen::yaml",
        }
    }

    pub fn as_parse_failure(&self) -> Option<&ParseFailure> {
        match self {
            PargenError::Parse(failure) => Some(&**failure),
            _ => None,
        }
    }
}

impl Diagnostic for PargenError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.error_code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            PargenError::Parse(failure) => Some(Box::new(failure.trace())),
            PargenError::Engine(EngineError::DepthLimit { .. }) => Some(Box::new(
                "a left-recursive definition is the usual cause",
            )),
            _ => None,
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.as_parse_failure()
            .map(|failure| failure.source.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let failure = self.as_parse_failure()?;
        let (offset, len) = failure.span;
        let label = LabeledSpan::new(Some(failure.headline()), offset, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Converts text into a shareable named source.
pub fn to_error_source<S: AsRef<str>>(source: S) -> SourceArc {
    Arc::new(NamedSource::new("tokens", source.as_ref().to_string()))
}

/// Joins tokens with spaces and returns the byte span of token `pos`, or
/// an empty span at the end when `pos` is past the last token.
fn render_tokens(tokens: &[String], pos: usize) -> (String, (usize, usize)) {
    let text = tokens.join(" ");
    let offset: usize = tokens.iter().take(pos).map(|t| t.len() + 1).sum();
    match tokens.get(pos) {
        Some(token) => (text, (offset, token.len())),
        None => {
            let end = text.len();
            (text, (end, 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::grammar::RuleId;

    fn tokens(src: &str) -> Vec<String> {
        src.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn span_covers_failing_token() {
        let toks = tokens("( 12 + x )");
        let (text, span) = render_tokens(&toks, 3);
        assert_eq!(&text[span.0..span.0 + span.1], "x");
        let (text, span) = render_tokens(&toks, 5);
        assert_eq!(span, (text.len(), 0));
    }

    #[test]
    fn parse_failure_points_at_furthest_error() {
        let furthest = Arc::new(ParseError::new(
            2,
            RuleId(1),
            RuleId(4),
            ErrorKind::TokenUnmatch {
                expect: Some(")".to_string()),
                got: None,
            },
        ));
        let root = Arc::new(ParseError::new(
            0,
            RuleId(1),
            RuleId(1),
            ErrorKind::SeqStop {
                index: 2,
                child: furthest.clone(),
            },
        ));
        let err: PargenError = ParseFailure::new(root, Some(furthest), tokens("( 1")).into();

        assert_eq!(err.error_code(), "pargen::parse");
        assert_eq!(
            err.to_string(),
            "parse failed at token 2: expected \")\", got end of input"
        );
        let labels: Vec<_> = Diagnostic::labels(&err).unwrap().collect();
        assert_eq!(labels[0].offset(), 3);
        assert!(Diagnostic::help(&err).unwrap().to_string().contains("Seq_Stop"));
    }
}
