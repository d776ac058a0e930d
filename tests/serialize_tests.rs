mod common;

use common::{arithmetic, arithmetic_plain, toks};
use pargen::grammar::serialize::{SerializedRule, TAG_REF};
use pargen::{compile, Grammar, GrammarError, HookTable, SerializedGrammar, Value};

#[test]
fn decoded_grammar_parses_like_the_original() {
    let original = arithmetic();
    let (encoded, hooks) = original.to_serialized().unwrap();
    assert_eq!(hooks.reshapes.len(), 2);

    let json = encoded.to_json_pretty().unwrap();
    let decoded = Grammar::from_serialized(&SerializedGrammar::from_json(&json).unwrap(), &hooks)
        .unwrap();

    assert_eq!(decoded.node_count(), original.node_count());
    for src in ["( 1 + 2 )", "( 9 )", "( 1"] {
        let tokens = toks(src);
        let expected = compile(&original).unwrap().parse(&tokens).map_err(|e| e.to_string());
        let actual = compile(&decoded).unwrap().parse(&tokens).map_err(|e| e.to_string());
        assert_eq!(actual, expected, "diverged on {src:?}");
    }
    assert_eq!(
        compile(&decoded).unwrap().parse(&toks("( 1 + 2 )")).unwrap().value(),
        Some(&Value::Number(3.0))
    );
}

#[test]
fn hook_free_grammar_needs_no_table() {
    let (encoded, hooks) = arithmetic_plain().to_serialized().unwrap();
    assert!(hooks.is_empty());

    let refs: Vec<_> = encoded
        .rules
        .iter()
        .filter(|SerializedRule(tag, ..)| *tag == TAG_REF)
        .collect();
    assert_eq!(refs.len(), 1);

    let decoded = Grammar::from_serialized(&encoded, &HookTable::new()).unwrap();
    let success = compile(&decoded).unwrap().parse(&toks("( a )")).unwrap();
    assert_eq!(success.len, 3);
}

#[test]
fn strings_are_interned() {
    let (encoded, _) = arithmetic_plain().to_serialized().unwrap();
    let mut strings = encoded.strings.clone();
    strings.sort();
    strings.dedup();
    assert_eq!(strings.len(), encoded.strings.len());
    assert_eq!(encoded.strings.len(), 3);
}

#[test]
fn hooks_must_be_supplied_on_decode() {
    let (encoded, _) = arithmetic().to_serialized().unwrap();
    let err = Grammar::from_serialized(&encoded, &HookTable::new()).unwrap_err();
    assert!(matches!(err, GrammarError::MissingHook { slot: "reshape", .. }));
}

#[test]
fn unknown_tag_is_malformed() {
    let json = r#"{"strings":[],"children":[],"rules":[[42,[],[1,0,null,null,null]]],"definitions":[],"root":0}"#;
    let encoded = SerializedGrammar::from_json(json).unwrap();
    let err = Grammar::from_serialized(&encoded, &HookTable::new()).unwrap_err();
    assert!(matches!(err, GrammarError::MalformedEncoding { index: 0, .. }));
}
