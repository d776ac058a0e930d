//! # Pargen
//!
//! A packrat parser runtime. Declarative rule graphs (`grammar`) are
//! compiled into tables of memoizing parser closures (`runtime`) and applied
//! to pre-tokenized input, producing structured values or a nested,
//! traceable failure (`errors`, `diagnostics`).

pub use crate::diagnostics::{PargenError, ParseFailure};
pub use crate::errors::{EngineError, ErrorKind, GrammarError, ParseError};
pub use crate::grammar::hooks::HookTable;
pub use crate::grammar::serialize::SerializedGrammar;
pub use crate::grammar::value::{Results, Value};
pub use crate::grammar::{Grammar, Rule, RuleId, RuleKind, SeqChild};
pub use crate::runtime::{
    compile, compile_with, ParseContext, ParseOptions, ParseResult, ParseSuccess, RootParser,
};

pub mod cli;
pub mod diagnostics;
pub mod errors;
pub mod grammar;
pub mod runtime;
