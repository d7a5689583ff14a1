//! Execution tracing infrastructure, the ambient replacement for a
//! `log`/`tracing` dependency.
//!
//! No `log`/`tracing` dependency here — instead a trait-based tracer
//! (`EvalTracer`, `NoopTracer`, `StderrTracer`) that the evaluator calls at
//! statement/call/return/error/signal boundaries, compiling away entirely
//! when [`NoopTracer`] is selected.

use crate::status::{GuaError, Signal};

/// Hook points fired by the statement/expression evaluator and function
/// call machinery.
pub trait EvalTracer {
    /// Called before a top-level statement is dispatched, with up to the
    /// first 64 bytes of its source text.
    fn statement(&mut self, _snippet: &str) {}

    /// Called when a script function call is about to push a new call frame.
    fn call(&mut self, _name: &str, _depth: usize) {}

    /// Called when a script function call's frame is popped.
    fn ret(&mut self, _name: &str, _depth: usize) {}

    /// Called when an error unwinds out of a statement.
    fn error(&mut self, _err: &GuaError) {}

    /// Called when a control-flow signal propagates out of a statement.
    fn signal(&mut self, _signal: &Signal) {}
}

/// Zero-cost tracer used in production; all hooks are empty and should be
/// optimized away entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl EvalTracer for NoopTracer {}

/// Human-readable execution log written to stderr, useful while developing
/// scripts or debugging the evaluator itself.
#[derive(Debug, Default)]
pub struct StderrTracer {
    depth: usize,
}

impl EvalTracer for StderrTracer {
    fn statement(&mut self, snippet: &str) {
        eprintln!("{:indent$}stmt: {snippet}", "", indent = self.depth * 2);
    }

    fn call(&mut self, name: &str, depth: usize) {
        self.depth = depth;
        eprintln!("{:indent$}call {name} (depth {depth})", "", indent = depth * 2);
    }

    fn ret(&mut self, name: &str, depth: usize) {
        eprintln!("{:indent$}return from {name} (depth {depth})", "", indent = depth * 2);
        self.depth = depth.saturating_sub(1);
    }

    fn error(&mut self, err: &GuaError) {
        eprintln!("{:indent$}error: {err}", "", indent = self.depth * 2);
    }

    fn signal(&mut self, signal: &Signal) {
        eprintln!("{:indent$}signal: {signal:?}", "", indent = self.depth * 2);
    }
}
