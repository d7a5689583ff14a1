//! Function definitions and invocation with call frames (spec.md §3, §4.6).
//!
//! A `Function` carries its name, formal arguments, and body; invocation
//! pushes a fresh namespace frame per call rather than threading arguments
//! through a slot-indexed bytecode frame, since a function body here is
//! interpreted text, not a compiled form.

use std::rc::Rc;

use crate::namespace::Scope;
use crate::status::{Flow, GuaError, Signal, Status};
use crate::value::Value;
use crate::Interpreter;

/// A formal parameter with its once-evaluated default expression value
/// (spec.md §3, "Argument").
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Rc<str>,
    pub default_value: Value,
}

pub type BuiltinFn = fn(&mut Interpreter, &[Value]) -> Result<Flow, GuaError>;

#[derive(Clone)]
pub enum FunctionKind {
    Builtin(BuiltinFn),
    /// `script` is the raw source text of the function body (the interior of
    /// the `{ }` group that followed the formal argument list).
    Script { formals: Vec<Argument>, script: Rc<str> },
}

impl std::fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Builtin(_) => write!(f, "Builtin"),
            FunctionKind::Script { formals, .. } => {
                write!(f, "Script({} formals)", formals.len())
            }
        }
    }
}

/// `{name, kind, arity, formals, script, impl, prev, next}` of spec.md §3,
/// with `formals`/`script`/`impl` folded into [`FunctionKind`] and
/// `prev`/`next` replaced by the bucket `Vec` they lived in
/// (see `crate::namespace`).
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Rc<str>,
    pub kind: FunctionKind,
}

impl Function {
    pub fn builtin(name: &str, f: BuiltinFn) -> Rc<Function> {
        Rc::new(Function { name: Rc::from(name), kind: FunctionKind::Builtin(f) })
    }

    pub fn script(name: &str, formals: Vec<Argument>, script: Rc<str>) -> Rc<Function> {
        Rc::new(Function { name: Rc::from(name), kind: FunctionKind::Script { formals, script } })
    }

    pub fn arity(&self) -> usize {
        match &self.kind {
            FunctionKind::Builtin(_) => usize::MAX,
            FunctionKind::Script { formals, .. } => formals.len(),
        }
    }
}

/// `Invoke(name, args)` (spec.md §4.6).
///
/// 1. arity may not be exceeded; shorter calls are padded with each formal's
///    default.
/// 2. `Builtin` invokes its native callback directly, in the caller's frame.
/// 3. `Script` pushes a fresh [`crate::namespace::Namespace`], binds each
///    formal at `Scope::Local`, evaluates the body, and pops the frame
///    unconditionally (on every exit path: value, error, or signal) — the
///    namespace-teardown half of spec.md §5's resource discipline.
pub fn invoke(interp: &mut Interpreter, func: Rc<Function>, args: Vec<Value>) -> Result<Flow, GuaError> {
    match &func.kind {
        FunctionKind::Builtin(native) => native(interp, &args),
        FunctionKind::Script { formals, script } => {
            if args.len() > formals.len() {
                return Err(GuaError::new(
                    Status::FunctionError,
                    format!("{}: too many arguments ({} > {})", func.name, args.len(), formals.len()),
                ));
            }
            if interp.namespaces.depth() >= interp.limits.max_call_depth {
                return Err(GuaError::new(Status::RecursionLimit, format!("{}: recursion limit exceeded", func.name)));
            }

            interp.tracer.call(&func.name, interp.namespaces.depth() + 1);
            interp.namespaces.push_frame();
            for (i, formal) in formals.iter().enumerate() {
                let value = args.get(i).cloned().unwrap_or_else(|| formal.default_value.clone());
                interp.namespaces.set(&formal.name, value, Scope::Local);
            }

            let result = crate::stmt::evaluate_block(interp, script);

            interp.namespaces.pop_frame();
            interp.tracer.ret(&func.name, interp.namespaces.depth());

            match result {
                // `Return`/`Exit` are consumed at the call boundary (spec.md §4.6);
                // any other error is wrapped so the caller sees `FunctionError`.
                Ok(Flow::Signal(Signal::Return(v))) => Ok(Flow::Value(v)),
                Ok(Flow::Signal(Signal::Exit(code))) => Ok(Flow::Signal(Signal::Exit(code))),
                Ok(other) => Ok(other),
                Err(err) => Err(GuaError::new(
                    Status::FunctionError,
                    format!("{}: {}", func.name, err.message),
                )),
            }
        }
    }
}
