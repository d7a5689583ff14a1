//! Built-in functions (spec.md §6).
//!
//! Every entry here is a [`crate::function::BuiltinFn`]: a plain
//! `fn(&mut Interpreter, &[Value]) -> Result<Flow, GuaError>` registered into
//! the global namespace by [`register_all`], called by
//! [`crate::function::invoke`] exactly like a script function would be
//! (spec.md §4.6) — the built-ins are ordinary bucket-table entries, not a
//! separate dispatch table.

use std::cell::RefCell;
use std::rc::Rc;

use crate::array::ArrayData;
use crate::expr::render_unquoted;
use crate::matrix::{Dims, MatrixData};
use crate::status::{Flow, GuaError, Signal, Status};
use crate::value::Value;
use crate::Interpreter;

pub fn register_all(interp: &mut Interpreter) {
    let entries: &[(&str, crate::function::BuiltinFn)] = &[
        ("array", array),
        ("matrix", matrix),
        ("matrix2D", matrix2d),
        ("getMatrixElement", get_matrix_element),
        ("setMatrixElement", set_matrix_element),
        ("arrayToString", array_to_string),
        ("matrixToString", matrix_to_string),
        ("dim", dim),
        ("keys", keys),
        ("length", length),
        ("ident", ident),
        ("inv", inv),
        ("complex", complex),
        ("toString", to_string_fn),
        ("type", type_fn),
        ("exists", exists),
        ("eval", eval_fn),
        ("expr", expr_fn),
        ("error", error_fn),
        ("exit", exit_fn),
        ("break", break_fn),
        ("continue", continue_fn),
        ("return", return_fn),
        ("isMatrixApproximatelyEqual", is_matrix_approx_equal),
    ];
    for (name, f) in entries {
        interp.namespaces.define_function(crate::function::Function::builtin(name, *f));
    }
}

fn arity_error(name: &str, want: &str, got: usize) -> GuaError {
    GuaError::new(Status::Error, format!("{name}: expected {want} argument(s), got {got}"))
}

fn expect_integer(name: &str, v: &Value) -> Result<i64, GuaError> {
    match v {
        Value::Integer(i) => Ok(*i),
        _ => Err(GuaError::new(Status::IllegalOperand, format!("{name}: expected an Integer argument"))),
    }
}

fn expect_string(name: &str, v: &Value) -> Result<String, GuaError> {
    match v {
        Value::String(s) => Ok(String::from_utf8_lossy(s).into_owned()),
        _ => Err(GuaError::new(Status::IllegalOperand, format!("{name}: expected a String argument"))),
    }
}

fn expect_matrix(name: &str, v: &Value) -> Result<Rc<RefCell<MatrixData>>, GuaError> {
    match v {
        Value::Matrix(m) => Ok(m.clone()),
        _ => Err(GuaError::new(Status::IllegalOperand, format!("{name}: expected a Matrix argument"))),
    }
}

/// `array(v1, v2, ...)`: builds an Array with sequential Integer keys
/// (spec.md §6).
fn array(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let mut data = ArrayData::new();
    for (i, v) in args.iter().enumerate() {
        data.set(Value::Integer(i as i64), v.clone())?;
    }
    Ok(Flow::Value(Value::Array(Rc::new(RefCell::new(data)))))
}

/// `matrix(value, d1[, d2, ...])` (spec.md §6).
fn matrix(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    if args.len() < 2 {
        return Err(arity_error("matrix", "at least 2", args.len()));
    }
    let value = args[0].clone();
    let mut dimv = Dims::new();
    for d in &args[1..] {
        let n = expect_integer("matrix", d)?;
        if n < 0 {
            return Err(GuaError::new(Status::IllegalOperand, "matrix: dimension must be non-negative"));
        }
        dimv.push(n as usize);
    }
    let m = MatrixData::filled(dimv, value)?;
    Ok(Flow::Value(Value::Matrix(Rc::new(RefCell::new(m)))))
}

/// `matrix2D(rows, cols, v11, v12, ...)` (spec.md §6).
fn matrix2d(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    if args.len() < 2 {
        return Err(arity_error("matrix2D", "at least 2", args.len()));
    }
    let rows = expect_integer("matrix2D", &args[0])? as usize;
    let cols = expect_integer("matrix2D", &args[1])? as usize;
    let m = MatrixData::from_rows(rows, cols, args[2..].to_vec())?;
    Ok(Flow::Value(Value::Matrix(Rc::new(RefCell::new(m)))))
}

fn index_args(name: &str, args: &[Value]) -> Result<Vec<usize>, GuaError> {
    args.iter()
        .map(|v| match v {
            Value::Integer(i) if *i >= 0 => Ok(*i as usize),
            _ => Err(GuaError::new(Status::IllegalOperand, format!("{name}: index must be a non-negative Integer"))),
        })
        .collect()
}

fn get_matrix_element(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    if args.is_empty() {
        return Err(arity_error("getMatrixElement", "matrix plus indices", args.len()));
    }
    let m = expect_matrix("getMatrixElement", &args[0])?;
    let idx = index_args("getMatrixElement", &args[1..])?;
    Ok(Flow::Value(m.borrow().get(&idx)?))
}

fn set_matrix_element(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    if args.len() < 2 {
        return Err(arity_error("setMatrixElement", "matrix, indices, value", args.len()));
    }
    let m = expect_matrix("setMatrixElement", &args[0])?;
    let idx = index_args("setMatrixElement", &args[1..args.len() - 1])?;
    let value = args[args.len() - 1].clone();
    m.borrow_mut().set(&idx, value.clone())?;
    Ok(Flow::Value(value))
}

fn array_to_string(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    match args.first() {
        Some(Value::Array(a)) => Ok(Flow::Value(Value::string(a.borrow().to_string_literal().into_bytes()))),
        _ => Err(GuaError::new(Status::IllegalOperand, "arrayToString: expected an Array argument")),
    }
}

fn matrix_to_string(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let m = expect_matrix("matrixToString", args.first().unwrap_or(&Value::Unknown))?;
    Ok(Flow::Value(Value::string(m.borrow().to_string_literal().into_bytes())))
}

/// `dim(m)` returns an Array of every dimension; `dim(m, i)` returns the
/// `i`-th dimension alone (spec.md §6).
fn dim(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    if args.is_empty() {
        return Err(arity_error("dim", "1 or 2", args.len()));
    }
    let m = expect_matrix("dim", &args[0])?;
    let dimv = m.borrow().dimv().to_vec();
    if let Some(i) = args.get(1) {
        let i = expect_integer("dim", i)? as usize;
        let d = dimv.get(i).copied().ok_or_else(|| GuaError::new(Status::IndexOutOfBound, "dim: dimension index out of bound"))?;
        return Ok(Flow::Value(Value::Integer(d as i64)));
    }
    let mut out = ArrayData::new();
    for (i, d) in dimv.iter().enumerate() {
        out.set(Value::Integer(i as i64), Value::Integer(*d as i64))?;
    }
    Ok(Flow::Value(Value::Array(Rc::new(RefCell::new(out)))))
}

fn keys(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    match args.first() {
        Some(Value::Array(a)) => Ok(Flow::Value(Value::Array(Rc::new(RefCell::new(a.borrow().keys()))))),
        _ => Err(GuaError::new(Status::IllegalOperand, "keys: expected an Array argument")),
    }
}

fn length(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let v = args.first().unwrap_or(&Value::Unknown);
    let n = match v {
        Value::Array(a) => a.borrow().len(),
        Value::Matrix(m) => m.borrow().len(),
        Value::String(s) => s.len(),
        _ => return Err(GuaError::new(Status::IllegalOperand, "length: expected an Array, Matrix, or String argument")),
    };
    Ok(Flow::Value(Value::Integer(n as i64)))
}

fn ident(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let n = expect_integer("ident", args.first().unwrap_or(&Value::Unknown))?;
    if n < 1 {
        return Err(GuaError::new(Status::IllegalOperand, "ident: n must be >= 1"));
    }
    let m = MatrixData::ident(n as usize)?;
    Ok(Flow::Value(Value::Matrix(Rc::new(RefCell::new(m)))))
}

fn inv(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let m = expect_matrix("inv", args.first().unwrap_or(&Value::Unknown))?;
    let inverted = m.borrow().inv()?;
    Ok(Flow::Value(Value::Matrix(Rc::new(RefCell::new(inverted)))))
}

/// `complex(re, im)` (spec.md §6): canonicalizes a zero imaginary part back
/// to `Real`, per invariant 6.
fn complex(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    if args.len() != 2 {
        return Err(arity_error("complex", "2", args.len()));
    }
    let re = crate::numeric::Scalar::from_value(&args[0])
        .ok_or_else(|| GuaError::new(Status::IllegalOperand, "complex: expected numeric arguments"))?
        .as_f64();
    let im = crate::numeric::Scalar::from_value(&args[1])
        .ok_or_else(|| GuaError::new(Status::IllegalOperand, "complex: expected numeric arguments"))?
        .as_f64();
    Ok(Flow::Value(Value::canonicalize_complex(re, im)))
}

/// `toString(v)`: the human-readable rendering, unquoted for `String`
/// (spec.md §6) — distinct from [`std::fmt::Display`] on [`Value`], which
/// quotes strings for the literal round-trip form.
fn to_string_fn(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let v = args.first().unwrap_or(&Value::Unknown);
    Ok(Flow::Value(Value::string(render_unquoted(v).into_bytes())))
}

fn type_fn(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let v = args.first().unwrap_or(&Value::Unknown);
    Ok(Flow::Value(Value::string(v.type_tag().as_bytes().to_vec())))
}

/// `exists(name)`: true if `name` is bound anywhere on the current call
/// chain (spec.md §6).
fn exists(interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let name = expect_string("exists", args.first().unwrap_or(&Value::Unknown))?;
    Ok(Flow::Value(Value::Integer(interp.namespaces.is_bound_variable(&name) as i64)))
}

/// `eval(source)`: evaluates `source` as a full statement block in the
/// caller's current frame (spec.md §6).
fn eval_fn(interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let src = expect_string("eval", args.first().unwrap_or(&Value::Unknown))?;
    crate::stmt::evaluate_source(interp, &src)
}

/// `expr(source)`: evaluates `source` as a single expression (spec.md §6).
fn expr_fn(interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let src = expect_string("expr", args.first().unwrap_or(&Value::Unknown))?;
    Ok(crate::expr::evaluate(interp, &src, 0)?.1)
}

fn error_fn(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let msg = args.first().map(render_unquoted).unwrap_or_default();
    Err(GuaError::new(Status::Error, msg))
}

fn exit_fn(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let code = match args.first() {
        Some(v) => expect_integer("exit", v)?,
        None => 0,
    };
    Ok(Flow::Signal(Signal::Exit(code)))
}

fn break_fn(_interp: &mut Interpreter, _args: &[Value]) -> Result<Flow, GuaError> {
    Ok(Flow::Signal(Signal::Break))
}

fn continue_fn(_interp: &mut Interpreter, _args: &[Value]) -> Result<Flow, GuaError> {
    Ok(Flow::Signal(Signal::Continue))
}

fn return_fn(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    let v = args.first().cloned().unwrap_or(Value::Unknown);
    Ok(Flow::Signal(Signal::Return(v)))
}

fn is_matrix_approx_equal(_interp: &mut Interpreter, args: &[Value]) -> Result<Flow, GuaError> {
    if args.len() < 2 {
        return Err(arity_error("isMatrixApproximatelyEqual", "2 or 3", args.len()));
    }
    let m1 = expect_matrix("isMatrixApproximatelyEqual", &args[0])?;
    let m2 = expect_matrix("isMatrixApproximatelyEqual", &args[1])?;
    let tol = match args.get(2) {
        Some(v) => crate::numeric::Scalar::from_value(v)
            .ok_or_else(|| GuaError::new(Status::IllegalOperand, "isMatrixApproximatelyEqual: tolerance must be numeric"))?
            .as_f64(),
        None => crate::value::ZERO,
    };
    let eq = m1.borrow().is_approx_equal(&m2.borrow(), tol);
    Ok(Flow::Value(Value::Integer(eq as i64)))
}

