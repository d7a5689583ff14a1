//! `foreach (array; keyVar; valueVar) { body }` (spec.md §4.5).

use gua::value::Value;
use gua::Interpreter;

fn eval_ok(interp: &mut Interpreter, src: &str) -> Value {
    let outcome = interp.evaluate(src);
    assert!(outcome.is_ok(), "expected success for {src:?}, got {:?}", outcome.message);
    outcome.value
}

#[test]
fn foreach_over_array_binds_key_and_value() {
    let mut interp = Interpreter::new();
    let sum = eval_ok(
        &mut interp,
        "a = {\"x\"=1,\"y\"=2,\"z\"=3}; total = 0; foreach (a; k; v) { total = total + v }; total",
    );
    match sum {
        Value::Integer(6) => {}
        other => panic!("expected sum of values 6, got {other:?}"),
    }
}

#[test]
fn foreach_over_matrix_binds_flattened_index() {
    let mut interp = Interpreter::new();
    let last_key = eval_ok(&mut interp, "m = [1,2;3,4]; lastKey = -1; foreach (m; k; v) { lastKey = k }; lastKey");
    match last_key {
        Value::Integer(3) => {}
        other => panic!("expected the final flattened index 3 for a 2x2 matrix, got {other:?}"),
    }
}

#[test]
fn foreach_break_stops_early() {
    let mut interp = Interpreter::new();
    let seen = eval_ok(
        &mut interp,
        "a = {1,2,3,4,5}; seen = 0; foreach (a; k; v) { if (v == 3) { break }; seen = seen + 1 }; seen",
    );
    match seen {
        Value::Integer(2) => {}
        other => panic!("expected to have counted 2 elements before breaking, got {other:?}"),
    }
}

#[test]
fn foreach_requires_exactly_three_clauses() {
    let mut interp = Interpreter::new();
    let outcome = interp.evaluate("a = {1,2}; foreach (a; k) { k }");
    assert!(!outcome.is_ok(), "two clauses should be rejected");
}
