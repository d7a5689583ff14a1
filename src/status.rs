//! Control/error status tags and the accumulated-message error carrier.
//!
//! A plain enum, a `Result<T, GuaError>` alias, and manual `Display` — no
//! `thiserror`. Per the Design Note "Status as control flow":
//! `Break`/`Continue`/`Return`/`Exit` are modeled here as an explicit
//! [`Signal`] sum type, never as a textual error passed through the same
//! channel as [`GuaError`].

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Symbolic error-family status, carried by [`GuaError::status`].
///
/// Bit-exact numeric values are not part of the contract (per spec.md §6);
/// only the taxonomy is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum Status {
    UnexpectedToken,
    OutOfRange,
    Underflow,
    Overflow,
    UnterminatedString,
    UnclosedExpression,
    IllegalOperand,
    DivisionByZero,
    IllegalAssignment,
    IndexOutOfBound,
    Singular,
    RecursionLimit,
    FunctionError,
    /// Raised by the `error(msg)` built-in, or any other user/host-visible failure
    /// that doesn't fit a more specific tag above.
    Error,
}

/// An evaluator error: a [`Status`] tag plus the accumulated human-readable
/// message described in spec.md §7.
///
/// Errors unwind through `try`/`test` `catch` blocks (which convert them back
/// to `Ok`, per spec.md §4.5 and §7) or all the way out of
/// [`crate::Interpreter::evaluate`], which appends the offending command's
/// first 64 bytes as context (spec.md §7) via [`GuaError::with_snippet`].
#[derive(Debug, Clone)]
pub struct GuaError {
    pub status: Status,
    pub message: String,
    /// Up to 64 bytes of the source text where the error occurred.
    pub snippet: Option<String>,
}

impl GuaError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), snippet: None }
    }

    /// Attach (or replace) the offending source snippet, truncated to 64 bytes
    /// as specified in spec.md §7.
    pub fn with_snippet(mut self, source: &str) -> Self {
        let end = source.len().min(64);
        // Fall back to the nearest valid char boundary rather than panicking
        // on a multi-byte split; the language treats strings as byte sequences
        // (spec.md §1) but the snippet is surfaced through a Rust `String`.
        let mut end = end;
        while end > 0 && !source.is_char_boundary(end) {
            end -= 1;
        }
        self.snippet = Some(source[..end].to_string());
        self
    }

    pub fn division_by_zero() -> Self {
        Self::new(Status::DivisionByZero, "division by zero")
    }

    pub fn illegal_operand(op: &str) -> Self {
        Self::new(Status::IllegalOperand, format!("illegal operand for operator '{op}'"))
    }

    pub fn illegal_assignment(what: &str) -> Self {
        Self::new(Status::IllegalAssignment, format!("illegal assignment: {what}"))
    }
}

impl fmt::Display for GuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)?;
        if let Some(snippet) = &self.snippet {
            write!(f, " (near: {snippet:?})")?;
        }
        Ok(())
    }
}

impl std::error::Error for GuaError {}

/// Non-error control-flow signal: `break`, `continue`, `return`, `exit`.
///
/// Loops and function calls interpret these explicitly (spec.md §4.5,
/// §4.6); they never flow through [`GuaError`].
#[derive(Debug, Clone)]
pub enum Signal {
    Break,
    Continue,
    Return(Value),
    Exit(i64),
}

/// Outcome of evaluating one statement or expression: either a plain value,
/// a control-flow signal, or an error.
#[derive(Debug, Clone)]
pub enum Flow {
    Value(Value),
    Signal(Signal),
}

impl Flow {
    pub fn value(v: Value) -> Self {
        Flow::Value(v)
    }

    /// The value to use when this flow reaches a context that only wants a
    /// value (e.g. the result of a sub-expression); signals other than
    /// `Return` are not expected to appear there and are mapped to `Unknown`.
    pub fn into_value(self) -> Value {
        match self {
            Flow::Value(v) => v,
            Flow::Signal(Signal::Return(v)) => v,
            Flow::Signal(_) => Value::Unknown,
        }
    }
}

pub type EvalResult<T> = Result<T, GuaError>;

/// Result of evaluating a full statement sequence: a value/signal pair, or
/// an error that has unwound out of the block.
pub type FlowResult = EvalResult<Flow>;
