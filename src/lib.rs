//! Evaluation core for the Gua scripting language (spec.md §1-§2).
//!
//! The crate's public surface is [`Interpreter`]: construct one, feed it
//! source text via [`Interpreter::evaluate`], and it runs the tree-walking
//! scanner/expression/statement pipeline described module-by-module below.
//! There is no REPL, CLI, or file driver here (spec.md §1 Non-goals) — those
//! are external collaborators that call into this crate.

pub mod array;
pub mod builtins;
pub mod clock;
pub mod constants;
pub mod expr;
pub mod function;
pub mod limits;
pub mod matrix;
pub mod namespace;
pub mod scanner;
pub mod status;
pub mod stmt;
pub mod token;
pub mod tracer;
pub mod value;

use std::rc::Rc;

use array::ArrayData;
use clock::{Clock, SystemClock};
use function::Argument;
use limits::Limits;
use namespace::{Namespaces, Scope};
use status::{Flow, Status};
use tracer::{EvalTracer, NoopTracer};
use value::Value;

/// The result of a top-level [`Interpreter::evaluate`] call (spec.md §2,
/// §7): the resulting value, and — on error — the [`Status`] tag plus the
/// accumulated human-readable message (§7's "snippet of the offending
/// source text" included). `exit N` surfaces as a successful outcome whose
/// value is the exit code (spec.md §6).
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub value: Value,
    pub status: Option<Status>,
    pub message: Option<String>,
}

impl EvalOutcome {
    pub fn is_ok(&self) -> bool {
        self.status.is_none()
    }
}

/// Owns the namespace stack and the injected capabilities (tracer, clock,
/// resource limits) that the scanner/expression/statement modules thread
/// through every call (spec.md §3-§5).
pub struct Interpreter {
    pub namespaces: Namespaces,
    pub tracer: Box<dyn EvalTracer>,
    pub clock: Box<dyn Clock>,
    pub limits: Limits,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Builds a fresh global namespace, defines every built-in (§6), and
    /// sets the predefined globals `argc`/`argv`/`env` to their empty
    /// defaults (argument and environment import are out-of-scope
    /// collaborators per spec.md §1; a host sets them via
    /// [`Self::set_argv`]/[`Self::set_env`] before the first `evaluate`).
    pub fn new() -> Self {
        let mut interp = Self {
            namespaces: Namespaces::new(),
            tracer: Box::new(NoopTracer),
            clock: Box::new(SystemClock),
            limits: Limits::new(),
        };
        builtins::register_all(&mut interp);
        interp.set_argv(Vec::new());
        interp.set_env(std::iter::empty());
        interp
    }

    pub fn with_tracer(mut self, tracer: impl EvalTracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Rebinds `argc`/`argv` at `Scope::Global` (spec.md §6).
    pub fn set_argv(&mut self, args: Vec<String>) {
        let mut argv = ArrayData::new();
        for (i, a) in args.iter().enumerate() {
            argv.set(Value::Integer(i as i64), Value::string(a.clone().into_bytes())).expect("sequential integer keys are always valid");
        }
        self.namespaces.set("argc", Value::Integer(args.len() as i64), Scope::Global);
        self.namespaces.set("argv", Value::Array(Rc::new(std::cell::RefCell::new(argv))), Scope::Global);
    }

    /// Rebinds `env` at `Scope::Global`, keyed by variable name (spec.md §6).
    pub fn set_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        let mut env = ArrayData::new();
        for (k, v) in vars {
            env.set(Value::string(k.into_bytes()), Value::string(v.into_bytes())).expect("string keys are always valid");
        }
        self.namespaces.set("env", Value::Array(Rc::new(std::cell::RefCell::new(env))), Scope::Global);
    }

    /// Defines a script function in the current frame (spec.md §4.4): the
    /// assignment forms `name(args) = { body }` and
    /// `function name(args) { body }` both resolve here.
    pub fn define_script_function(&mut self, name: &str, formals: Vec<Argument>, script: Rc<str>) {
        self.namespaces.define_function(function::Function::script(name, formals, script));
    }

    /// `Evaluate(source)` (spec.md §2): runs `source` as a full statement
    /// sequence and reports the outcome. Per spec.md §7, an error unwinding
    /// all the way out here gets the offending command's first 64 bytes of
    /// source text appended as context.
    pub fn evaluate(&mut self, source: &str) -> EvalOutcome {
        let snippet_end = source.len().min(64);
        self.tracer.statement(&source[..snippet_end]);
        match stmt::evaluate_source(self, source) {
            Ok(Flow::Signal(status::Signal::Exit(code))) => {
                EvalOutcome { value: Value::Integer(code), status: None, message: None }
            }
            Ok(flow @ Flow::Signal(_)) => {
                let Flow::Signal(signal) = &flow else { unreachable!() };
                self.tracer.signal(signal);
                EvalOutcome { value: flow.into_value(), status: None, message: None }
            }
            Ok(flow) => EvalOutcome { value: flow.into_value(), status: None, message: None },
            Err(err) => {
                let err = err.with_snippet(source);
                self.tracer.error(&err);
                EvalOutcome { value: Value::Unknown, status: Some(err.status), message: Some(err.to_string()) }
            }
        }
    }
}
