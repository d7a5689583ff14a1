//! End-to-end scenarios from spec.md §8 ("Concrete end-to-end scenarios").
//!
//! Each test runs a full program through [`Interpreter::evaluate`] and checks
//! the resulting value, mirroring the seed cases verbatim.

use gua::value::Value;
use gua::Interpreter;

fn eval_ok(src: &str) -> Value {
    let mut interp = Interpreter::new();
    let outcome = interp.evaluate(src);
    assert!(outcome.is_ok(), "expected success, got {:?}", outcome.message);
    outcome.value
}

fn assert_int(v: &Value, want: i64) {
    match v {
        Value::Integer(n) => assert_eq!(*n, want),
        other => panic!("expected Integer({want}), got {other:?}"),
    }
}

fn assert_string(v: &Value, want: &[u8]) {
    match v {
        Value::String(bytes) => assert_eq!(&bytes[..], want),
        other => panic!("expected String({want:?}), got {other:?}"),
    }
}

#[test]
fn scenario_1_for_loop_accumulation() {
    let v = eval_ok("a = 0; for (i=1; i<=10; i=i+1) { a = a + i }; a");
    assert_int(&v, 55);
}

#[test]
fn scenario_2_recursive_factorial() {
    let v = eval_ok("function fact(n) { if (n<=1) { return 1 } else { return n*fact(n-1) } }; fact(6)");
    assert_int(&v, 720);
}

#[test]
fn scenario_3_matrix_inverse_round_trip() {
    let v = eval_ok("A = [1,2;3,4]; B = inv(A); isMatrixApproximatelyEqual(A*B, ident(2), 1e-9)");
    assert_int(&v, 1);
}

#[test]
fn scenario_4_array_index_assignment() {
    let v = eval_ok("a = {\"x\"=1, \"y\"=2}; a[\"z\"] = a[\"x\"] + a[\"y\"]; a[\"z\"]");
    assert_int(&v, 3);
}

#[test]
fn scenario_5_string_index_read_and_write() {
    let read = eval_ok("s = \"hello\"; s[4]");
    assert_string(&read, b"o");

    let write = eval_ok("s = \"hello\"; s[4] = \"O\"; s");
    assert_string(&write, b"hellO");
}

#[test]
fn scenario_6_macro_substitution() {
    let v = eval_ok("x = 2; y = $(\"x\"); y");
    assert_int(&v, 2);
}

#[test]
fn scenario_7_try_catch_division_by_zero() {
    let mut interp = Interpreter::new();
    let outcome = interp.evaluate("try { 1/0 } catch { -1 }");
    assert!(outcome.is_ok());
    assert_int(&outcome.value, -1);

    let error = interp.namespaces.get("GUA_ERROR", gua::namespace::Scope::Global);
    match error {
        Value::String(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            assert!(text.contains("division by zero"), "GUA_ERROR was {text:?}");
        }
        other => panic!("expected GUA_ERROR to be a String, got {other:?}"),
    }
}

#[test]
fn scenario_8_operator_precedence_and_power() {
    let v = eval_ok("(2+3*4) == 14 && (2**10) == 1024");
    assert_int(&v, 1);
}
