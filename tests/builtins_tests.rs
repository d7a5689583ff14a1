//! Built-in functions from spec.md §6.

use gua::value::Value;
use gua::Interpreter;

fn eval_ok(interp: &mut Interpreter, src: &str) -> Value {
    let outcome = interp.evaluate(src);
    assert!(outcome.is_ok(), "expected success for {src:?}, got {:?}", outcome.message);
    outcome.value
}

#[test]
fn array_and_length_and_keys() {
    let mut interp = Interpreter::new();
    let v = eval_ok(&mut interp, "a = array(10,20,30); length(a)");
    match v {
        Value::Integer(3) => {}
        other => panic!("expected length 3, got {other:?}"),
    }
}

#[test]
fn matrix_and_matrix2d_constructors() {
    let mut interp = Interpreter::new();
    let v = eval_ok(&mut interp, "m = matrix(0, 2, 3); dim(m, 0)");
    match v {
        Value::Integer(2) => {}
        other => panic!("expected first dim 2, got {other:?}"),
    }

    let elem = eval_ok(&mut interp, "n = matrix2D(2, 2, 1, 2, 3, 4); getMatrixElement(n, 0, 1)");
    match elem {
        Value::Integer(2) => {}
        other => panic!("expected element (0,1) == 2, got {other:?}"),
    }
}

#[test]
fn type_and_exists_and_tostring() {
    let mut interp = Interpreter::new();
    let t = eval_ok(&mut interp, "type(5)");
    match t {
        Value::String(s) => assert_eq!(&s[..], b"Integer"),
        other => panic!("expected type tag String, got {other:?}"),
    }

    let e = eval_ok(&mut interp, "x = 1; exists(\"x\")");
    match e {
        Value::Integer(1) => {}
        other => panic!("expected exists('x') == 1, got {other:?}"),
    }

    let rendered = eval_ok(&mut interp, "toString(42)");
    match rendered {
        Value::String(s) => assert_eq!(&s[..], b"42"),
        other => panic!("expected unquoted '42', got {other:?}"),
    }
}

#[test]
fn complex_constructor_and_arithmetic() {
    let mut interp = Interpreter::new();
    let v = eval_ok(&mut interp, "(complex(1,2) + complex(3,4)) == complex(4,6)");
    match v {
        Value::Integer(1) => {}
        other => panic!("expected complex addition to match, got {other:?}"),
    }
}

#[test]
fn error_builtin_raises_with_message() {
    let mut interp = Interpreter::new();
    let outcome = interp.evaluate("error(\"boom\")");
    assert!(!outcome.is_ok());
    assert!(outcome.message.unwrap().contains("boom"));
}

#[test]
fn eval_and_expr_builtins() {
    let mut interp = Interpreter::new();
    let v = eval_ok(&mut interp, "eval('1+2')");
    match v {
        Value::Integer(3) => {}
        other => panic!("expected eval('1+2') == 3, got {other:?}"),
    }

    let v2 = eval_ok(&mut interp, "expr('3*4')");
    match v2 {
        Value::Integer(12) => {}
        other => panic!("expected expr('3*4') == 12, got {other:?}"),
    }
}

#[test]
fn is_matrix_approximately_equal_default_tolerance() {
    let mut interp = Interpreter::new();
    let v = eval_ok(&mut interp, "isMatrixApproximatelyEqual(ident(2), ident(2))");
    match v {
        Value::Integer(1) => {}
        other => panic!("expected identical matrices to match with default tolerance, got {other:?}"),
    }
}
