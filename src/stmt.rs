//! Statement dispatch and block evaluation (spec.md §4.5).
//!
//! A "block" is just a run of statements separated by `;` or newline; there
//! is no statement AST, only [`evaluate_source`] repeatedly asking the
//! scanner for the next token at the current cursor and branching on it.
//! Control keywords (`if`/`while`/`do`/`for`/`foreach`/`try`/`test`) are
//! handled here; anything else falls through to [`crate::expr::evaluate`],
//! which is how plain expressions, assignments, and function definitions
//! reach the evaluator (spec.md §4.4 feeds back into §4.5: a statement is
//! "an expression, evaluated for effect").

use std::time::Duration;

use crate::clock::Clock;
use crate::expr;
use crate::namespace::Scope;
use crate::scanner::{self, split_top_level};
use crate::status::{Flow, GuaError, Signal, Status};
use crate::token::{GroupKind, Keyword, TokenKind};
use crate::value::Value;
use crate::Interpreter;

pub type StmtResult = Result<(usize, Flow), GuaError>;

fn peek<'a>(interp: &Interpreter, src: &'a str, pos: usize) -> (usize, crate::token::Token<'a>) {
    scanner::next_token(src, pos, &interp.namespaces)
}

fn skip_separators(interp: &Interpreter, src: &str, mut pos: usize) -> usize {
    loop {
        let (p, t) = peek(interp, src, pos);
        if matches!(t.kind, TokenKind::Separator) {
            pos = p;
        } else {
            return pos;
        }
    }
}

/// Evaluates a self-contained run of statements to completion: a plain
/// value (the last statement's result), or the first [`Signal`] to surface
/// (a `break`/`continue`/`return`/`exit` that a loop or function call
/// further up the stack is responsible for interpreting).
pub fn evaluate_source(interp: &mut Interpreter, src: &str) -> Result<Flow, GuaError> {
    let mut pos = 0;
    let mut last = Flow::Value(Value::Unknown);
    loop {
        pos = skip_separators(interp, src, pos);
        let (_p, t) = peek(interp, src, pos);
        if t.is_end() {
            return Ok(last);
        }
        let (p2, flow) = evaluate_statement(interp, src, pos)?;
        pos = p2;
        if let Flow::Signal(_) = flow {
            return Ok(flow);
        }
        last = flow;
    }
}

/// Same as [`evaluate_source`]; named separately so call sites read as
/// "evaluate a function body" vs. "evaluate this chunk of source"
/// (spec.md §4.6).
pub fn evaluate_block(interp: &mut Interpreter, src: &str) -> Result<Flow, GuaError> {
    evaluate_source(interp, src)
}

fn evaluate_statement(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, t1) = peek(interp, src, pos);
    match t1.kind {
        TokenKind::Keyword(Keyword::If) => evaluate_if(interp, src, pos),
        TokenKind::Keyword(Keyword::While) => evaluate_while(interp, src, p1),
        TokenKind::Keyword(Keyword::Do) => evaluate_do_while(interp, src, p1),
        TokenKind::Keyword(Keyword::For) => evaluate_for(interp, src, p1),
        TokenKind::Keyword(Keyword::Foreach) => evaluate_foreach(interp, src, p1),
        TokenKind::Keyword(Keyword::Try) => evaluate_try(interp, src, p1),
        TokenKind::Keyword(Keyword::Test) => evaluate_test(interp, src, p1),
        _ => expr::evaluate(interp, src, pos),
    }
}

fn expect_group<'a>(interp: &Interpreter, src: &'a str, pos: usize, kind: GroupKind, what: &str) -> Result<(usize, &'a str), GuaError> {
    let (p, t) = peek(interp, src, pos);
    match t.kind {
        TokenKind::Group(k, text) if k == kind => Ok((p, text)),
        _ => Err(GuaError::new(Status::UnexpectedToken, format!("expected {what}")).with_snippet(&src[pos..])),
    }
}

fn truthy(v: &Value) -> Result<bool, GuaError> {
    match v {
        Value::Integer(i) => Ok(*i != 0),
        Value::Real(r) => Ok(*r != 0.0),
        Value::Complex { re, im } => Ok(*re != 0.0 || *im != 0.0),
        Value::String(s) => Ok(!s.is_empty()),
        Value::Array(a) => Ok(!a.borrow().is_empty()),
        Value::Matrix(m) => Ok(!m.borrow().is_empty()),
        Value::Unknown => Ok(false),
        _ => Err(GuaError::new(Status::IllegalOperand, "value cannot be used as a condition")),
    }
}

/// Evaluates `(cond_text)`'s interior to a boolean, propagating any signal
/// that surfaces while doing so (spec.md §4.5).
fn eval_condition(interp: &mut Interpreter, cond_text: &str) -> Result<Result<bool, Flow>, GuaError> {
    let flow = expr::evaluate(interp, cond_text, 0)?.1;
    match flow {
        Flow::Signal(_) => Ok(Err(flow)),
        Flow::Value(v) => Ok(Ok(truthy(&v)?)),
    }
}

fn evaluate_if(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, t1) = peek(interp, src, pos);
    debug_assert!(matches!(t1.kind, TokenKind::Keyword(Keyword::If)));
    let (p2, cond_text) = expect_group(interp, src, p1, GroupKind::Paren, "'(' condition ')' after 'if'")?;
    let (p3, body_text) = expect_group(interp, src, p2, GroupKind::Brace, "'{' body '}' after 'if (...)'")?;

    match eval_condition(interp, cond_text)? {
        Err(flow) => return Ok((p3, flow)),
        Ok(true) => {
            let flow = evaluate_source(interp, body_text)?;
            let pend = skip_else_chain(interp, src, p3)?;
            return Ok((pend, flow));
        }
        Ok(false) => {}
    }

    // condition false: walk elseif* else? looking for the branch to take.
    let mut pos = p3;
    loop {
        let (p, t) = peek(interp, src, pos);
        match t.kind {
            TokenKind::Keyword(Keyword::ElseIf) => {
                let (p2, cond_text) = expect_group(interp, src, p, GroupKind::Paren, "'(' condition ')' after 'elseif'")?;
                let (p3, body_text) = expect_group(interp, src, p2, GroupKind::Brace, "'{' body '}' after 'elseif (...)'")?;
                match eval_condition(interp, cond_text)? {
                    Err(flow) => return Ok((p3, flow)),
                    Ok(true) => {
                        let flow = evaluate_source(interp, body_text)?;
                        let pend = skip_else_chain(interp, src, p3)?;
                        return Ok((pend, flow));
                    }
                    Ok(false) => pos = p3,
                }
            }
            TokenKind::Keyword(Keyword::Else) => {
                let (p2, body_text) = expect_group(interp, src, p, GroupKind::Brace, "'{' body '}' after 'else'")?;
                let flow = evaluate_source(interp, body_text)?;
                return Ok((p2, flow));
            }
            _ => return Ok((pos, Flow::Value(Value::Unknown))),
        }
    }
}

/// After an `if`/`elseif` branch has already been taken, the remaining
/// `elseif`/`else` clauses must still be skipped over lexically (their
/// bodies are never evaluated) so the cursor lands past the whole chain.
fn skip_else_chain(interp: &Interpreter, src: &str, mut pos: usize) -> Result<usize, GuaError> {
    loop {
        let (p, t) = peek(interp, src, pos);
        match t.kind {
            TokenKind::Keyword(Keyword::ElseIf) => {
                let (p2, _) = expect_group(interp, src, p, GroupKind::Paren, "'(' condition ')' after 'elseif'")?;
                let (p3, _) = expect_group(interp, src, p2, GroupKind::Brace, "'{' body '}' after 'elseif (...)'")?;
                pos = p3;
            }
            TokenKind::Keyword(Keyword::Else) => {
                let (p2, _) = expect_group(interp, src, p, GroupKind::Brace, "'{' body '}' after 'else'")?;
                pos = p2;
                return Ok(pos);
            }
            _ => return Ok(pos),
        }
    }
}

fn evaluate_while(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, cond_text) = expect_group(interp, src, pos, GroupKind::Paren, "'(' condition ')' after 'while'")?;
    let (p2, body_text) = expect_group(interp, src, p1, GroupKind::Brace, "'{' body '}' after 'while (...)'")?;
    loop {
        match eval_condition(interp, cond_text)? {
            Err(flow) => return Ok((p2, flow)),
            Ok(false) => return Ok((p2, Flow::Value(Value::Unknown))),
            Ok(true) => match loop_body_outcome(evaluate_source(interp, body_text)?)? {
                LoopStep::Break => return Ok((p2, Flow::Value(Value::Unknown))),
                LoopStep::Continue => {}
                LoopStep::Propagate(flow) => return Ok((p2, flow)),
            },
        }
    }
}

fn evaluate_do_while(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, body_text) = expect_group(interp, src, pos, GroupKind::Brace, "'{' body '}' after 'do'")?;
    let (p2, t2) = peek(interp, src, p1);
    if !matches!(t2.kind, TokenKind::Keyword(Keyword::While)) {
        return Err(GuaError::new(Status::UnexpectedToken, "expected 'while' after 'do { ... }'").with_snippet(&src[p1..]));
    }
    let (p3, cond_text) = expect_group(interp, src, p2, GroupKind::Paren, "'(' condition ')' after 'do { ... } while'")?;
    loop {
        match loop_body_outcome(evaluate_source(interp, body_text)?)? {
            LoopStep::Break => return Ok((p3, Flow::Value(Value::Unknown))),
            LoopStep::Propagate(flow) => return Ok((p3, flow)),
            LoopStep::Continue => {}
        }
        match eval_condition(interp, cond_text)? {
            Err(flow) => return Ok((p3, flow)),
            Ok(false) => return Ok((p3, Flow::Value(Value::Unknown))),
            Ok(true) => {}
        }
    }
}

fn evaluate_for(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, clause_text) = expect_group(interp, src, pos, GroupKind::Paren, "'(' init; cond; step ')' after 'for'")?;
    let (p2, body_text) = expect_group(interp, src, p1, GroupKind::Brace, "'{' body '}' after 'for (...)'")?;
    let clauses = split_top_level(clause_text, b';');
    if clauses.len() != 3 {
        return Err(GuaError::new(Status::UnexpectedToken, "'for' requires exactly 'init; cond; step'"));
    }
    let (init_text, cond_text, step_text) = (clauses[0], clauses[1], clauses[2]);

    if !init_text.trim().is_empty() {
        let flow = expr::evaluate(interp, init_text, 0)?.1;
        if let Flow::Signal(_) = flow {
            return Ok((p2, flow));
        }
    }
    loop {
        if !cond_text.trim().is_empty() {
            match eval_condition(interp, cond_text)? {
                Err(flow) => return Ok((p2, flow)),
                Ok(false) => return Ok((p2, Flow::Value(Value::Unknown))),
                Ok(true) => {}
            }
        }
        match loop_body_outcome(evaluate_source(interp, body_text)?)? {
            LoopStep::Break => return Ok((p2, Flow::Value(Value::Unknown))),
            LoopStep::Propagate(flow) => return Ok((p2, flow)),
            LoopStep::Continue => {}
        }
        if !step_text.trim().is_empty() {
            let flow = expr::evaluate(interp, step_text, 0)?.1;
            if let Flow::Signal(_) = flow {
                return Ok((p2, flow));
            }
        }
    }
}

/// `foreach (array; keyVar; valueVar) { body }` (spec.md §4.5): binds each
/// element's key and value into the loop variables at `Scope::Local` and
/// evaluates `body` once per element, in insertion order. Matrix containers
/// are accepted as well as Array, with the key bound to the flattened
/// index — a natural extension of the same iteration contract, since
/// nothing in spec.md §4.5 restricts the container to Array specifically.
fn evaluate_foreach(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, clause_text) = expect_group(interp, src, pos, GroupKind::Paren, "'(' array; keyVar; valueVar ')' after 'foreach'")?;
    let (p2, body_text) = expect_group(interp, src, p1, GroupKind::Brace, "'{' body '}' after 'foreach (...)'")?;
    let parts = split_top_level(clause_text, b';');
    if parts.len() != 3 {
        return Err(GuaError::new(Status::UnexpectedToken, "'foreach' requires '(array; keyVar; valueVar)'"));
    }
    let container_flow = expr::evaluate(interp, parts[0], 0)?.1;
    let container = match container_flow {
        Flow::Signal(_) => return Ok((p2, container_flow)),
        Flow::Value(v) => v,
    };
    let key_var = parts[1].trim();
    let value_var = parts[2].trim();

    let pairs: Vec<(Value, Value)> = match &container {
        Value::Array(a) => a.borrow().elements().iter().map(|e| (e.key.clone(), e.value.clone())).collect(),
        Value::Matrix(m) => {
            let data = m.borrow();
            let dimv = data.dimv().to_vec();
            let mut pairs = Vec::with_capacity(data.len());
            for flat in 0..data.len() {
                let mut idx = vec![0usize; dimv.len()];
                let mut rem = flat;
                for d in (0..dimv.len()).rev() {
                    idx[d] = rem % dimv[d];
                    rem /= dimv[d];
                }
                pairs.push((Value::Integer(flat as i64), data.get(&idx)?));
            }
            pairs
        }
        _ => return Err(GuaError::new(Status::IllegalOperand, "'foreach' requires an Array or Matrix")),
    };

    for (key, value) in pairs {
        interp.namespaces.set(key_var, key, Scope::Local);
        interp.namespaces.set(value_var, value, Scope::Local);
        match loop_body_outcome(evaluate_source(interp, body_text)?)? {
            LoopStep::Break => break,
            LoopStep::Propagate(flow) => return Ok((p2, flow)),
            LoopStep::Continue => {}
        }
    }
    Ok((p2, Flow::Value(Value::Unknown)))
}

enum LoopStep {
    Continue,
    Break,
    Propagate(Flow),
}

/// Interprets a loop body's outcome per spec.md §4.5: `break`/`continue`
/// are consumed by the loop; any other signal (`return`/`exit`) propagates
/// to whatever called the loop.
fn loop_body_outcome(flow: Flow) -> Result<LoopStep, GuaError> {
    Ok(match flow {
        Flow::Signal(Signal::Break) => LoopStep::Break,
        Flow::Signal(Signal::Continue) => LoopStep::Continue,
        other @ Flow::Signal(_) => LoopStep::Propagate(other),
        Flow::Value(_) => LoopStep::Continue,
    })
}

/// `catch { handler }` is optional on both `try` and `test` (spec.md §4.5:
/// `try { A } [catch { B }]`). Returns the handler's source text, if a
/// `catch` clause follows at `pos`.
fn optional_catch_clause<'a>(interp: &Interpreter, src: &'a str, pos: usize) -> Result<(usize, Option<&'a str>), GuaError> {
    let (p, t) = peek(interp, src, pos);
    if matches!(t.kind, TokenKind::Keyword(Keyword::Catch)) {
        let (p2, handler_text) = expect_group(interp, src, p, GroupKind::Brace, "'{' handler '}' after 'catch'")?;
        Ok((p2, Some(handler_text)))
    } else {
        Ok((pos, None))
    }
}

/// Binds the `GUA_RESULT`/`GUA_ERROR` reporter globals (spec.md §9 "Global
/// state"), always at `Scope::Global` regardless of the frame `try`/`test`
/// runs in.
fn bind_result_error(interp: &mut Interpreter, result: Value, error: Value) {
    interp.namespaces.set("GUA_RESULT", result, Scope::Global);
    interp.namespaces.set("GUA_ERROR", error, Scope::Global);
}

/// `try { A } [catch { B }]` (spec.md §4.5, §7): a [`GuaError`] raised while
/// evaluating `A` is converted back to `Ok`, running `B` if present; a
/// [`Signal`] (`return`/`exit`) bypasses `catch` entirely and propagates.
/// `GUA_RESULT`/`GUA_ERROR` are set either way.
fn evaluate_try(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, body_text) = expect_group(interp, src, pos, GroupKind::Brace, "'{' body '}' after 'try'")?;
    let (p_end, handler_text) = optional_catch_clause(interp, src, p1)?;

    match evaluate_source(interp, body_text) {
        Ok(flow @ Flow::Signal(Signal::Return(_))) | Ok(flow @ Flow::Signal(Signal::Exit(_))) => Ok((p_end, flow)),
        Ok(flow) => {
            let value = flow.clone().into_value();
            bind_result_error(interp, value, Value::string(Vec::new()));
            Ok((p_end, flow))
        }
        Err(err) => {
            bind_result_error(interp, Value::Unknown, Value::string(err.message.clone().into_bytes()));
            match handler_text {
                Some(handler_text) => Ok((p_end, evaluate_source(interp, handler_text)?)),
                None => Ok((p_end, Flow::Value(Value::Unknown))),
            }
        }
    }
}

/// Compares a `test` iteration's result against `desired`: exact structural
/// equality when `tolerance` is absent, per-type approximate comparison
/// when present (spec.md §4.5).
fn results_match(actual: &Value, desired: &Value, tolerance: Option<f64>) -> bool {
    match tolerance {
        None => expr::values_equal(actual, desired),
        Some(tol) => match (actual, desired) {
            (Value::Matrix(a), Value::Matrix(b)) => a.borrow().is_approx_equal(&b.borrow(), tol),
            _ => match (crate::numeric::Scalar::from_value(actual), crate::numeric::Scalar::from_value(desired)) {
                (Some(sa), Some(sb)) => (sa.as_f64() - sb.as_f64()).abs() <= tol,
                _ => expr::values_equal(actual, desired),
            },
        },
    }
}

/// `test (tries[; desired[; tolerance]]) { body } [catch { B }]` (spec.md
/// §4.5): runs `body` up to `tries` times on the injected
/// [`crate::clock::Clock`], stopping early on error or (when `desired` is
/// supplied) a mismatched result, then runs `catch` if either happened.
/// Binds `GUA_RESULT`, `GUA_ERROR`, `GUA_TIME`, `GUA_AVG`, `GUA_DEVIATION`,
/// `GUA_TRIES` in the global namespace.
fn evaluate_test(interp: &mut Interpreter, src: &str, pos: usize) -> StmtResult {
    let (p1, clause_text) = expect_group(interp, src, pos, GroupKind::Paren, "'(' tries[; desired[; tolerance]] ')' after 'test'")?;
    let (p2, body_text) = expect_group(interp, src, p1, GroupKind::Brace, "'{' body '}' after 'test (...)'")?;
    let (p_end, handler_text) = optional_catch_clause(interp, src, p2)?;

    let clauses = split_top_level(clause_text, b';');
    if clauses.is_empty() || clauses.len() > 3 {
        return Err(GuaError::new(Status::UnexpectedToken, "'test' requires '(tries[; desired[; tolerance]])'"));
    }

    let tries_flow = expr::evaluate(interp, clauses[0], 0)?.1;
    let tries = match tries_flow {
        Flow::Signal(_) => return Ok((p_end, tries_flow)),
        Flow::Value(Value::Integer(n)) if n >= 0 => n as usize,
        Flow::Value(_) => return Err(GuaError::new(Status::IllegalOperand, "'test' tries count must be a non-negative Integer")),
    };
    let desired = match clauses.get(1) {
        Some(text) => {
            let flow = expr::evaluate(interp, text, 0)?.1;
            match flow {
                Flow::Signal(_) => return Ok((p_end, flow)),
                Flow::Value(v) => Some(v),
            }
        }
        None => None,
    };
    let tolerance = match clauses.get(2) {
        Some(text) => {
            let flow = expr::evaluate(interp, text, 0)?.1;
            match flow {
                Flow::Signal(_) => return Ok((p_end, flow)),
                Flow::Value(v) => Some(
                    crate::numeric::Scalar::from_value(&v)
                        .ok_or_else(|| GuaError::new(Status::IllegalOperand, "'test' tolerance must be numeric"))?
                        .as_f64(),
                ),
            }
        }
        None => None,
    };

    let mut elapsed = Vec::with_capacity(tries);
    let mut last_result = Value::Unknown;
    let mut last_error = Value::string(Vec::new());
    let mut failed = false;

    for _ in 0..tries {
        let start = interp.clock.now();
        let outcome = evaluate_source(interp, body_text);
        elapsed.push(interp.clock.now().saturating_duration_since(start));

        match outcome {
            Ok(flow @ Flow::Signal(Signal::Return(_))) | Ok(flow @ Flow::Signal(Signal::Exit(_))) => return Ok((p_end, flow)),
            Ok(flow) => {
                let value = flow.into_value();
                if let Some(desired) = &desired {
                    if !results_match(&value, desired, tolerance) {
                        last_result = value;
                        failed = true;
                        break;
                    }
                }
                last_result = value;
            }
            Err(err) => {
                last_error = Value::string(err.message.clone().into_bytes());
                failed = true;
                break;
            }
        }
    }

    let actual_tries = elapsed.len();
    let total: Duration = elapsed.iter().sum();
    let avg_secs = if actual_tries > 0 { total.as_secs_f64() / actual_tries as f64 } else { 0.0 };
    let deviation = if actual_tries > 0 {
        let variance = elapsed.iter().map(|d| (d.as_secs_f64() - avg_secs).powi(2)).sum::<f64>() / actual_tries as f64;
        variance.sqrt()
    } else {
        0.0
    };

    bind_result_error(interp, last_result, last_error);
    interp.namespaces.set("GUA_TIME", Value::Real(total.as_secs_f64()), Scope::Global);
    interp.namespaces.set("GUA_AVG", Value::Real(avg_secs), Scope::Global);
    interp.namespaces.set("GUA_DEVIATION", Value::Real(deviation), Scope::Global);
    interp.namespaces.set("GUA_TRIES", Value::Integer(actual_tries as i64), Scope::Global);

    if failed {
        match handler_text {
            Some(handler_text) => Ok((p_end, evaluate_source(interp, handler_text)?)),
            None => Ok((p_end, Flow::Value(Value::Unknown))),
        }
    } else {
        Ok((p_end, Flow::Value(Value::Unknown)))
    }
}
