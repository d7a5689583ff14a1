//! The injected [`gua::tracer::EvalTracer`] capability: a custom tracer
//! observes the same call/return/error events the built-in `StderrTracer`
//! would print, without going through stderr.

use std::cell::RefCell;
use std::rc::Rc;

use gua::tracer::EvalTracer;
use gua::Interpreter;

#[derive(Clone, Default)]
struct RecordingTracer {
    calls: Rc<RefCell<Vec<String>>>,
    errors: Rc<RefCell<usize>>,
}

impl EvalTracer for RecordingTracer {
    fn call(&mut self, name: &str, _depth: usize) {
        self.calls.borrow_mut().push(name.to_owned());
    }

    fn error(&mut self, _err: &gua::status::GuaError) {
        *self.errors.borrow_mut() += 1;
    }
}

#[test]
fn tracer_observes_every_recursive_call() {
    let tracer = RecordingTracer::default();
    let calls = tracer.calls.clone();
    let mut interp = Interpreter::new().with_tracer(tracer);

    let outcome = interp.evaluate("function fact(n) { if (n<=1) { return 1 } else { return n*fact(n-1) } }; fact(4)");
    assert!(outcome.is_ok());
    match outcome.value {
        gua::value::Value::Integer(24) => {}
        other => panic!("expected 4! == 24, got {other:?}"),
    }

    // fact(4) -> fact(3) -> fact(2) -> fact(1): 4 calls total.
    assert_eq!(calls.borrow().len(), 4);
    assert!(calls.borrow().iter().all(|name| name == "fact"));
}

#[test]
fn tracer_sees_errors_unwinding_out_of_evaluate() {
    let tracer = RecordingTracer::default();
    let errors = tracer.errors.clone();
    let mut interp = Interpreter::new().with_tracer(tracer);

    let outcome = interp.evaluate("1/0");
    assert!(!outcome.is_ok());
    assert_eq!(*errors.borrow(), 1);
}

#[test]
fn noop_tracer_is_the_default() {
    let mut interp = Interpreter::new();
    let outcome = interp.evaluate("1+1");
    assert!(outcome.is_ok());
}
