// Regression tests: the CLI loads serialized grammars and renders failures
// with miette diagnostics.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

mod common;

use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

/// Writes a fixture under `tests/` and removes it when dropped.
struct Fixture(String);

impl Fixture {
    fn new(name: &str, contents: &str) -> Self {
        let path = format!("tests/{name}");
        fs::write(&path, contents).unwrap();
        Fixture(path)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn grammar_fixture(name: &str) -> Fixture {
    let (encoded, _) = common::arithmetic_plain().to_serialized().unwrap();
    Fixture::new(name, &encoded.to_json().unwrap())
}

#[test]
fn check_reports_grammar_size() {
    let grammar = grammar_fixture("cli_check_grammar.json");

    let mut cmd = Command::cargo_bin("pargen").unwrap();
    cmd.arg("check").arg(&grammar.0);
    cmd.assert()
        .success()
        .stdout(contains("ok: root #1").and(contains("1 definition(s)")));
}

#[test]
fn parse_prints_resolved_results() {
    let grammar = grammar_fixture("cli_parse_grammar.json");
    let tokens = Fixture::new("cli_parse_tokens.json", r#"["(", "1", "+", "2", ")"]"#);

    let mut cmd = Command::cargo_bin("pargen").unwrap();
    cmd.arg("parse").arg(&grammar.0).arg(&tokens.0).arg("--end");
    cmd.assert()
        .success()
        .stdout(contains(r#""len": 5"#).and(contains(r#""+""#)));
}

#[test]
fn cli_reports_miette_diagnostics_on_parse_failure() {
    let grammar = grammar_fixture("cli_fail_grammar.json");
    let tokens = Fixture::new("cli_fail_tokens.json", r#"["(", "1"]"#);

    let mut cmd = Command::cargo_bin("pargen").unwrap();
    cmd.arg("parse").arg(&grammar.0).arg(&tokens.0);
    cmd.assert().failure().stderr(
        contains("pargen::parse")
            .and(contains("Seq_Stop"))
            .and(contains("expected")),
    );
}

#[test]
fn config_file_options_apply() {
    let grammar = grammar_fixture("cli_config_grammar.json");
    let tokens = Fixture::new("cli_config_tokens.json", r#"["(", "1", ")", "extra"]"#);
    let config = Fixture::new("cli_config.yaml", "end: true\nmax_depth: 200\n");

    let mut lenient = Command::cargo_bin("pargen").unwrap();
    lenient.arg("parse").arg(&grammar.0).arg(&tokens.0);
    lenient.assert().success();

    let mut strict = Command::cargo_bin("pargen").unwrap();
    strict
        .arg("parse")
        .arg(&grammar.0)
        .arg(&tokens.0)
        .arg("--config")
        .arg(&config.0);
    strict
        .assert()
        .failure()
        .stderr(contains("pargen::parse").and(contains("end of input")));
}

#[test]
fn grammar_with_hooks_is_rejected() {
    let (encoded, _) = common::arithmetic().to_serialized().unwrap();
    let grammar = Fixture::new("cli_hooks_grammar.json", &encoded.to_json().unwrap());

    let mut cmd = Command::cargo_bin("pargen").unwrap();
    cmd.arg("check").arg(&grammar.0);
    cmd.assert()
        .failure()
        .stderr(contains("pargen::grammar").or(contains("hook")));
}
