mod common;

use common::{arithmetic, toks};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use pargen::{compile, compile_with, EngineError, Grammar, PargenError, ParseOptions, Rule};

fn render(err: &PargenError) -> String {
    let mut out = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .render_report(&mut out, err)
        .unwrap();
    out
}

#[test]
fn parse_failure_renders_tokens_and_trace() {
    let err = compile(&arithmetic()).unwrap().parse(&toks("( 1 + 2 3 )")).unwrap_err();
    let failure = err.as_parse_failure().unwrap();
    assert_eq!(failure.pos, 4);

    let rendered = render(&err);
    assert!(rendered.contains("pargen::parse"), "{rendered}");
    assert!(rendered.contains("( 1 + 2 3 )"), "{rendered}");
    assert!(rendered.contains("Seq_Stop"), "{rendered}");
}

#[test]
fn trace_walks_nested_causes() {
    let err = compile(&arithmetic()).unwrap().parse(&toks("( 1")).unwrap_err();
    let trace = err.as_parse_failure().unwrap().trace();
    let lines: Vec<_> = trace.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Seq_Stop #1 in #1 @2"));
    assert!(lines[1].starts_with("  Token_Unmatch #4 in #1 @2 [<eof>]"));
}

#[test]
fn engine_errors_have_their_own_code() {
    let grammar = Grammar::new(Rule::repeat(1, Rule::eof(2), 0, None));
    let parser = compile_with(&grammar, ParseOptions::default()).unwrap();
    let err = parser.parse(&[]).unwrap_err();
    assert!(matches!(err, PargenError::Engine(EngineError::ZeroLengthRepeat { .. })));
    assert_eq!(err.code().unwrap().to_string(), "pargen::engine");
    assert!(err.labels().is_none());
}
