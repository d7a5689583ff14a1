//! The `test (tries[; desired[; tolerance]]) { body } [catch { B }]`
//! statement (spec.md §4.5) and its reporter globals (spec.md §9).

use std::time::Duration;

use gua::clock::FrozenClock;
use gua::namespace::Scope;
use gua::value::Value;
use gua::Interpreter;

fn global(interp: &Interpreter, name: &str) -> Value {
    interp.namespaces.get(name, Scope::Global)
}

#[test]
fn test_runs_requested_tries_and_reports_timing() {
    let mut interp = Interpreter::new().with_clock(FrozenClock::new(Duration::from_millis(10)));
    let outcome = interp.evaluate("test (3) { 1+1 }");
    assert!(outcome.is_ok(), "{:?}", outcome.message);

    match global(&interp, "GUA_TRIES") {
        Value::Integer(3) => {}
        other => panic!("expected GUA_TRIES == 3, got {other:?}"),
    }
    match global(&interp, "GUA_RESULT") {
        Value::Integer(2) => {}
        other => panic!("expected GUA_RESULT == 2, got {other:?}"),
    }
    match global(&interp, "GUA_TIME") {
        Value::Real(t) => assert!(t > 0.0, "GUA_TIME should be positive, got {t}"),
        other => panic!("expected GUA_TIME to be Real, got {other:?}"),
    }
}

#[test]
fn test_stops_early_on_mismatch_and_runs_catch() {
    let mut interp = Interpreter::new().with_clock(FrozenClock::new(Duration::from_millis(1)));
    let outcome = interp.evaluate("i = 0; test (5; 99) { i = i + 1; i } catch { -1 }");
    assert!(outcome.is_ok());
    match outcome.value {
        Value::Integer(-1) => {}
        other => panic!("expected catch body's -1, got {other:?}"),
    }
    // stops after the first mismatched try, not all 5.
    match global(&interp, "GUA_TRIES") {
        Value::Integer(1) => {}
        other => panic!("expected a single try before the mismatch, got {other:?}"),
    }
}

#[test]
fn test_matches_desired_with_tolerance() {
    let mut interp = Interpreter::new().with_clock(FrozenClock::new(Duration::from_millis(1)));
    let outcome = interp.evaluate("test (1; 1.0; 0.01) { 1.005 }");
    assert!(outcome.is_ok(), "{:?}", outcome.message);
    match global(&interp, "GUA_ERROR") {
        Value::String(s) => assert!(s.is_empty()),
        other => panic!("expected empty GUA_ERROR on a within-tolerance match, got {other:?}"),
    }
}

#[test]
fn test_without_catch_reports_error_in_global() {
    let mut interp = Interpreter::new().with_clock(FrozenClock::new(Duration::from_millis(1)));
    let outcome = interp.evaluate("test (2) { 1/0 }");
    assert!(outcome.is_ok(), "'test' converts the body's error back to Ok even without 'catch'");
    match global(&interp, "GUA_ERROR") {
        Value::String(s) => {
            let text = String::from_utf8_lossy(&s);
            assert!(text.contains("division by zero"), "GUA_ERROR was {text:?}");
        }
        other => panic!("expected GUA_ERROR to be a String, got {other:?}"),
    }
}
