//! # Parse Runtime
//!
//! Compilation of rule graphs into parser tables and their evaluation
//! against token streams.

pub mod compile;
pub mod context;
pub mod result;
pub mod root;

pub use compile::{parser, Compiler, ParseFn, ParserTable};
pub use context::{CacheStats, OpenStack, PackratCache, ParseContext};
pub use result::{ParseResult, ParseSuccess};
pub use root::{compile, compile_with, ParseOptions, ParseOutcome, RootParser, DEFAULT_MAX_DEPTH};
