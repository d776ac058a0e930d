mod common;

use std::thread;

use common::{arithmetic, toks};
use pargen::{compile, Value};

#[test]
fn one_compiled_parser_serves_many_threads() {
    let parser = compile(&arithmetic()).unwrap();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let parser = &parser;
                scope.spawn(move || {
                    let tokens = toks(&format!("( {n} + {n} )"));
                    parser.parse(&tokens).map(|s| s.value().cloned())
                })
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            let value = handle.join().unwrap().unwrap();
            assert_eq!(value, Some(Value::Number((2 * n) as f64)));
        }
    });
}

#[test]
fn clones_share_the_table() {
    let parser = compile(&arithmetic()).unwrap();
    let clone = parser.clone();
    assert!(std::sync::Arc::ptr_eq(parser.table(), clone.table()));

    let worker = thread::spawn(move || clone.parse(&toks("( 1 )")).is_ok());
    assert!(worker.join().unwrap());
    assert!(parser.parse(&toks("( 1 )")).is_ok());
}
