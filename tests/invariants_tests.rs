//! Quantified invariants from spec.md §8 ("Testable Properties").

use gua::expr::values_equal;
use gua::namespace::Scope;
use gua::value::Value;
use gua::Interpreter;

fn eval_value(interp: &mut Interpreter, src: &str) -> Value {
    let outcome = interp.evaluate(src);
    assert!(outcome.is_ok(), "expected success for {src:?}, got {:?}", outcome.message);
    outcome.value
}

/// Invariant 1: `toString(v)` parsed as a fresh expression evaluates back to
/// a value equal to `v`, for Int, Real, String, Complex, and nested
/// Array/Matrix of such. The literal form is `Value`'s `Display`
/// implementation (quoted for String) — the `toString` built-in itself
/// renders unquoted for display purposes and is not the round-trip form.
#[test]
fn invariant_1_literal_round_trip() {
    let mut interp = Interpreter::new();
    let cases = [
        Value::Integer(42),
        Value::Integer(-7),
        Value::Real(3.5),
        Value::string(b"hello world".to_vec()),
        Value::canonicalize_complex(1.0, -2.0),
    ];
    for v in cases {
        let literal = v.to_string();
        let parsed = eval_value(&mut interp, &literal);
        assert!(values_equal(&parsed, &v), "round trip of {literal:?} gave {parsed:?}, want {v:?}");
    }

    let array = eval_value(&mut interp, "{1,2,3}");
    let array_literal = array.to_string();
    let array_parsed = eval_value(&mut interp, &array_literal);
    assert!(values_equal(&array_parsed, &array));

    let matrix = eval_value(&mut interp, "[1,2;3,4]");
    let matrix_literal = matrix.to_string();
    let matrix_parsed = eval_value(&mut interp, &matrix_literal);
    assert!(values_equal(&matrix_parsed, &matrix));
}

/// Invariant 2: for every Array `a`, `length(a) == length(keys(a))` and each
/// `a[k]` for `k in keys(a)` is defined.
#[test]
fn invariant_2_array_keys_cover_all_elements() {
    let mut interp = Interpreter::new();
    let v = eval_value(&mut interp, "a = {\"x\"=1,\"y\"=2,\"z\"=3}; length(a) == length(keys(a))");
    match v {
        Value::Integer(1) => {}
        other => panic!("expected length(a) == length(keys(a)), got {other:?}"),
    }

    let ks = eval_value(&mut interp, "keys(a)");
    let Value::Array(ks) = ks else { panic!("keys(a) did not return an Array") };
    for element in ks.borrow().elements() {
        match &element.value {
            Value::String(name) => {
                let src = format!("a[{:?}]", String::from_utf8_lossy(name));
                let looked_up = eval_value(&mut interp, &src);
                assert!(!looked_up.is_unknown(), "a[{name:?}] was Unknown");
            }
            other => panic!("unexpected key type {other:?}"),
        }
    }
}

/// Invariant 3: `A * ident(A.dimv[0]) == A`, and (when invertible)
/// `A * inv(A) ≈ ident(n)` within a real tolerance.
#[test]
fn invariant_3_identity_and_inverse() {
    let mut interp = Interpreter::new();
    let identity_product = eval_value(&mut interp, "A = [1,2;3,4]; isMatrixApproximatelyEqual(A*ident(2), A, 1e-9)");
    match identity_product {
        Value::Integer(1) => {}
        other => panic!("A * ident(2) should equal A, got {other:?}"),
    }

    let inverse_product = eval_value(&mut interp, "isMatrixApproximatelyEqual(A*inv(A), ident(2), 1e-9)");
    match inverse_product {
        Value::Integer(1) => {}
        other => panic!("A * inv(A) should approximate ident(2), got {other:?}"),
    }
}

/// Invariant 4: `a + b == b + a` for numeric scalar types and for matrices of
/// equal shape.
#[test]
fn invariant_4_addition_commutes() {
    let mut interp = Interpreter::new();
    for (a, b) in [("3", "4"), ("2.5", "1.25"), ("complex(1,2)", "complex(3,-1)")] {
        let src = format!("({a})+({b}) == ({b})+({a})");
        match eval_value(&mut interp, &src) {
            Value::Integer(1) => {}
            other => panic!("{a} + {b} should commute, got {other:?}"),
        }
    }

    let matrix_commutes = eval_value(&mut interp, "M=[1,2;3,4]; N=[5,6;7,8]; isMatrixApproximatelyEqual(M+N, N+M, 1e-9)");
    match matrix_commutes {
        Value::Integer(1) => {}
        other => panic!("matrix addition should commute, got {other:?}"),
    }
}

/// Invariant 5: setting `v[k] = x` then reading `v[k]` yields `x`; unsetting
/// restores prior observable state.
#[test]
fn invariant_5_index_set_read_unset() {
    let mut interp = Interpreter::new();
    let v = eval_value(&mut interp, "a = {\"x\"=1}; a[\"x\"] = 99; a[\"x\"]");
    match v {
        Value::Integer(99) => {}
        other => panic!("expected 99 after set, got {other:?}"),
    }

    let exists_after_unset = eval_value(&mut interp, "a = {\"x\"=1,\"y\"=2}; a[\"x\"] = NULL; exists(\"a\")");
    // `a` itself remains bound since the array still holds `\"y\"`.
    match exists_after_unset {
        Value::Integer(1) => {}
        other => panic!("expected 'a' to remain bound after unsetting one of two elements, got {other:?}"),
    }
}

/// Invariant 6: scanner idempotence — tokenizing then rendering each token's
/// span back produces a string that retokenizes identically.
#[test]
fn invariant_6_scanner_idempotence() {
    let interp = Interpreter::new();
    let source = "a = 1 + foo(2,3) * [1,2;3,4] - \"hi\\n\" ;";

    let mut pos = 0usize;
    let mut spans = Vec::new();
    loop {
        let (next_pos, token) = gua::scanner::next_token(source, pos, &interp.namespaces);
        if token.is_end() {
            break;
        }
        spans.push(token.text.to_owned());
        assert!(next_pos > pos, "scanner must make forward progress");
        pos = next_pos;
    }

    let rebuilt = spans.join("");
    let mut rebuilt_pos = 0usize;
    let mut rebuilt_spans = Vec::new();
    loop {
        let (next_pos, token) = gua::scanner::next_token(&rebuilt, rebuilt_pos, &interp.namespaces);
        if token.is_end() {
            break;
        }
        rebuilt_spans.push(token.text.to_owned());
        rebuilt_pos = next_pos;
    }

    assert_eq!(spans, rebuilt_spans);
}

/// Invariant 7: `break` inside a nested `while` in a function exits only the
/// innermost loop; `return` inside any loop exits the function.
#[test]
fn invariant_7_break_and_return_scope() {
    let mut interp = Interpreter::new();
    let break_result = eval_value(
        &mut interp,
        "function f() { outer = 0; i = 0; while (i < 3) { j = 0; while (j < 3) { if (j == 1) { break }; outer = outer + 1; j = j + 1 }; i = i + 1 }; outer }; f()",
    );
    match break_result {
        Value::Integer(3) => {}
        other => panic!("inner break should only stop the inner loop, got {other:?}"),
    }

    let return_result = eval_value(
        &mut interp,
        "function g() { i = 0; while (i < 10) { if (i == 2) { return i }; i = i + 1 }; return -1 }; g()",
    );
    match return_result {
        Value::Integer(2) => {}
        other => panic!("return inside a loop should exit the function immediately, got {other:?}"),
    }
}

/// Invariant 8: `try { error("x") } catch { 1 }` returns 1; `try { return 2 }
/// catch { 1 }` returns 2 (the `return` bypasses `catch` entirely).
#[test]
fn invariant_8_try_catch_error_vs_return() {
    let mut interp = Interpreter::new();
    let caught = eval_value(&mut interp, "try { error(\"x\") } catch { 1 }");
    match caught {
        Value::Integer(1) => {}
        other => panic!("expected catch body's value 1, got {other:?}"),
    }

    let bypassed = eval_value(&mut interp, "function h() { try { return 2 } catch { 1 } }; h()");
    match bypassed {
        Value::Integer(2) => {}
        other => panic!("return should bypass catch, got {other:?}"),
    }
}

/// spec.md §9 open question (a): `Int**Int` truncates via `pow` then cast,
/// including negative exponents — `2**-1` truncates `0.5` toward zero to
/// `0`, it is not clamped up to `2**0 == 1`.
#[test]
fn pow_negative_int_exponent_truncates_toward_zero() {
    let mut interp = Interpreter::new();
    let v = eval_value(&mut interp, "2**-1");
    match v {
        Value::Integer(0) => {}
        other => panic!("expected 2**-1 to truncate to 0, got {other:?}"),
    }

    let v2 = eval_value(&mut interp, "2**-2");
    match v2 {
        Value::Integer(0) => {}
        other => panic!("expected 2**-2 to truncate to 0, got {other:?}"),
    }
}

/// `Int/Int` stays `Int` even when inexact, matching the `Int op Int -> Int`
/// promotion rule uniformly instead of carving an exception out for `/`.
#[test]
fn inexact_int_division_stays_int() {
    let mut interp = Interpreter::new();
    let v = eval_value(&mut interp, "7/2");
    match v {
        Value::Integer(3) => {}
        other => panic!("expected 7/2 to truncate to Integer 3, got {other:?}"),
    }

    let v2 = eval_value(&mut interp, "-7/2");
    match v2 {
        Value::Integer(-3) => {}
        other => panic!("expected -7/2 to truncate toward zero to -3, got {other:?}"),
    }
}
