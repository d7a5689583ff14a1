//! Precedence-climbing expression evaluator (spec.md §4.4).
//!
//! There is no AST: each precedence level is a function that recurses into
//! the next-tighter level, then loops consuming same-level operators,
//! re-scanning the source text at the current cursor on every step (spec.md
//! §2, §4.1). Primaries recursively call back into [`crate::stmt::evaluate_source`]
//! for bracketed sub-expressions and block bodies.
//!
//! Per spec.md §4.4 note: `&&`/`||` do NOT short-circuit on integer operands
//! — both sides are always evaluated. A [`Flow::Signal`] produced by either
//! side (e.g. a `return(...)` call nested in a sub-expression) short-circuits
//! every level immediately, since signals are control flow, not data
//! (Design Note "Status as control flow").

use std::cell::RefCell;
use std::rc::Rc;

use crate::array::ArrayData;
use crate::constants;
use crate::matrix::MatrixData;
use crate::namespace::Scope;
use crate::scanner::{self, split_top_level};
use crate::status::{Flow, GuaError, Status};
use crate::token::{GroupKind, Keyword, NumericLiteral, Op, TokenKind};
use crate::value::Value;
use crate::{numeric, Interpreter};

pub type ExprResult = Result<(usize, Flow), GuaError>;

/// Entry point: `ParseAssign` of spec.md §2, the loosest (level 16) rung of
/// the ladder.
pub fn evaluate(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    parse_assign(interp, src, pos)
}

fn peek<'a>(interp: &Interpreter, src: &'a str, pos: usize) -> (usize, crate::token::Token<'a>) {
    scanner::next_token(src, pos, &interp.namespaces)
}

fn value_of(flow: Flow) -> Option<Value> {
    match flow {
        Flow::Value(v) => Some(v),
        Flow::Signal(_) => None,
    }
}

// ---------------------------------------------------------------------
// Level 16: assignment
// ---------------------------------------------------------------------

fn parse_assign(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (p1, t1) = peek(interp, src, pos);
    match t1.kind {
        TokenKind::Keyword(Keyword::Function) => return parse_function_assign(interp, src, p1),
        TokenKind::Variable(name) | TokenKind::FunctionName(name) | TokenKind::UnboundIdent(name) => {
            let name = name.to_string();
            if let Some(flow) = try_parse_name_assign(interp, src, p1, &name)? {
                return Ok(flow);
            }
        }
        TokenKind::Operator(Op::Macro) => {
            if let Some(flow) = try_parse_macro_assign(interp, src, p1)? {
                return Ok(flow);
            }
        }
        TokenKind::Operator(Op::Indirect) => {
            if let Some(flow) = try_parse_indirect_assign(interp, src, p1)? {
                return Ok(flow);
            }
        }
        _ => {}
    }
    // No `=` follows: fall back through the ladder (spec.md §4.4).
    parse_logicor(interp, src, pos)
}

/// Lexical lookahead (pure w.r.t. evaluation) to decide whether `name` heads
/// an assignment, and if so which form; returns `None` to fall back to
/// plain expression parsing when no `=` is found where one would be needed.
fn try_parse_name_assign(interp: &mut Interpreter, src: &str, pos: usize, name: &str) -> Result<Option<(usize, Flow)>, GuaError> {
    let (p2, t2) = peek(interp, src, pos);
    match t2.kind {
        TokenKind::Operator(Op::Assign) => {
            let (p3, rhs_flow) = parse_assign(interp, src, p2)?;
            if let Flow::Signal(_) = rhs_flow {
                return Ok(Some((p3, rhs_flow)));
            }
            let rhs = value_of(rhs_flow).unwrap();
            let v = assign_name(interp, name, rhs)?;
            Ok(Some((p3, Flow::Value(v))))
        }
        TokenKind::Group(GroupKind::Bracket, idx_text) => {
            let (p3, t3) = peek(interp, src, p2);
            if let TokenKind::Operator(Op::Assign) = t3.kind {
                let (p4, rhs_flow) = parse_assign(interp, src, p3)?;
                if let Flow::Signal(_) = rhs_flow {
                    return Ok(Some((p4, rhs_flow)));
                }
                let rhs = value_of(rhs_flow).unwrap();
                let idx_values = evaluate_index_list(interp, idx_text)?;
                let v = assign_index(interp, name, &idx_values, rhs)?;
                Ok(Some((p4, Flow::Value(v))))
            } else {
                Ok(None)
            }
        }
        TokenKind::Group(GroupKind::Paren, args_text) => {
            let (p3, t3) = peek(interp, src, p2);
            if let TokenKind::Operator(Op::Assign) = t3.kind {
                // `name(args) = { body }` defines a script function; the
                // brace group is the function body text, never a
                // general-purpose expression (spec.md §4.4).
                let (p4, t4) = peek(interp, src, p3);
                match t4.kind {
                    TokenKind::Group(GroupKind::Brace, body) => {
                        let formals = parse_formals(interp, args_text)?;
                        interp.define_script_function(name, formals, Rc::from(body));
                        Ok(Some((p4, Flow::Value(Value::Unknown))))
                    }
                    _ => Err(GuaError::new(Status::UnexpectedToken, "expected a '{ }' function body")),
                }
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

fn parse_function_assign(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (p1, t1) = peek(interp, src, pos);
    let name = match t1.kind {
        TokenKind::Variable(n) | TokenKind::FunctionName(n) | TokenKind::UnboundIdent(n) => n.to_string(),
        _ => return Err(GuaError::new(Status::UnexpectedToken, "expected function name")),
    };
    let (p2, t2) = peek(interp, src, p1);
    let args_text = match t2.kind {
        TokenKind::Group(GroupKind::Paren, text) => text,
        _ => return Err(GuaError::new(Status::UnexpectedToken, "expected formal argument list")),
    };
    let (p3, t3) = peek(interp, src, p2);
    match t3.kind {
        TokenKind::Operator(Op::Assign) => {
            // `function name() = NULL` unsets the function (spec.md §4.4).
            let (p4, rhs_flow) = parse_assign(interp, src, p3)?;
            if let Flow::Signal(_) = rhs_flow {
                return Ok((p4, rhs_flow));
            }
            let rhs = value_of(rhs_flow).unwrap();
            if !rhs.is_unknown() {
                return Err(GuaError::illegal_assignment("function unset only accepts NULL on the right-hand side"));
            }
            interp.namespaces.unset_function(&name);
            Ok((p4, Flow::Value(Value::Unknown)))
        }
        TokenKind::Group(GroupKind::Brace, body) => {
            let formals = parse_formals(interp, args_text)?;
            interp.define_script_function(&name, formals, Rc::from(body));
            Ok((p3, Flow::Value(Value::Unknown)))
        }
        _ => Err(GuaError::new(Status::UnexpectedToken, "expected '= NULL' or a '{ }' function body")),
    }
}

fn parse_formals(interp: &mut Interpreter, text: &str) -> Result<Vec<crate::function::Argument>, GuaError> {
    let mut formals = Vec::new();
    for part in split_top_level(text, b',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(eq) = find_top_level_eq(part) {
            let name = part[..eq].trim();
            let default_src = &part[eq + 1..];
            let (_p, flow) = evaluate(interp, default_src, 0)?;
            let default_value = value_of(flow).unwrap_or(Value::Unknown);
            formals.push(crate::function::Argument { name: Rc::from(name), default_value });
        } else {
            formals.push(crate::function::Argument { name: Rc::from(part), default_value: Value::Unknown });
        }
    }
    Ok(formals)
}

fn find_top_level_eq(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn try_parse_macro_assign(interp: &mut Interpreter, src: &str, pos: usize) -> Result<Option<(usize, Flow)>, GuaError> {
    let (p2, t2) = peek(interp, src, pos);
    match t2.kind {
        TokenKind::Variable(name) | TokenKind::FunctionName(name) | TokenKind::UnboundIdent(name) => {
            let name = name.to_string();
            let (p3, t3) = peek(interp, src, p2);
            if let TokenKind::Operator(Op::Assign) = t3.kind {
                let (p4, rhs_flow) = parse_assign(interp, src, p3)?;
                if let Flow::Signal(_) = rhs_flow {
                    return Ok(Some((p4, rhs_flow)));
                }
                let rhs = value_of(rhs_flow).unwrap();
                if constants::is_constant_name(&name) {
                    return Err(GuaError::illegal_assignment("constant names cannot be rebound"));
                }
                interp.namespaces.set(&name, rhs.clone(), Scope::Global);
                Ok(Some((p4, Flow::Value(rhs))))
            } else {
                Ok(None)
            }
        }
        TokenKind::Group(GroupKind::Paren, expr_text) => {
            let (p3, t3) = peek(interp, src, p2);
            match t3.kind {
                TokenKind::Group(GroupKind::Bracket, idx_text) => {
                    let (p4, t4) = peek(interp, src, p3);
                    if let TokenKind::Operator(Op::Assign) = t4.kind {
                        let (p5, rhs_flow) = parse_assign(interp, src, p4)?;
                        if let Flow::Signal(_) = rhs_flow {
                            return Ok(Some((p5, rhs_flow)));
                        }
                        let rhs = value_of(rhs_flow).unwrap();
                        let (_p, name_flow) = evaluate(interp, expr_text, 0)?;
                        let name = expect_string(value_of(name_flow).unwrap_or(Value::Unknown))?;
                        let idx_values = evaluate_index_list(interp, idx_text)?;
                        let v = assign_index(interp, &name, &idx_values, rhs)?;
                        Ok(Some((p5, Flow::Value(v))))
                    } else {
                        Ok(None)
                    }
                }
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

fn try_parse_indirect_assign(interp: &mut Interpreter, src: &str, pos: usize) -> Result<Option<(usize, Flow)>, GuaError> {
    let (p2, t2) = peek(interp, src, pos);
    let var_name = match t2.kind {
        TokenKind::Variable(name) => name.to_string(),
        _ => return Ok(None),
    };
    let (p3, t3) = peek(interp, src, p2);
    if let TokenKind::Operator(Op::Assign) = t3.kind {
        let (p4, rhs_flow) = parse_assign(interp, src, p3)?;
        if let Flow::Signal(_) = rhs_flow {
            return Ok(Some((p4, rhs_flow)));
        }
        let rhs = value_of(rhs_flow).unwrap();
        let target_value = interp.namespaces.get(&var_name, Scope::Stack);
        let target_name = expect_string(target_value)?;
        interp.namespaces.set(&target_name, rhs.clone(), Scope::Stack);
        Ok(Some((p4, Flow::Value(rhs))))
    } else {
        Ok(None)
    }
}

fn expect_string(v: Value) -> Result<String, GuaError> {
    match v {
        Value::String(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        _ => Err(GuaError::new(Status::IllegalOperand, "indirection/macro target must be a String")),
    }
}

fn assign_name(interp: &mut Interpreter, name: &str, value: Value) -> Result<Value, GuaError> {
    if constants::is_constant_name(name) {
        return Err(GuaError::illegal_assignment("constant names cannot be rebound"));
    }
    interp.namespaces.set(name, value.clone(), Scope::Local);
    Ok(value)
}

/// Evaluates the comma-separated index list inside a `[ ]` index group.
fn evaluate_index_list(interp: &mut Interpreter, text: &str) -> Result<Vec<Value>, GuaError> {
    let mut values = Vec::new();
    for part in split_top_level(text, b',') {
        let (_p, flow) = evaluate(interp, part, 0)?;
        values.push(value_of(flow).unwrap_or(Value::Unknown));
    }
    Ok(values)
}

/// Joins a multi-index into the single composite string key used for array
/// indexing with more than one index expression (spec.md §4.4,
/// "multi-index is joined into a composite string key via `ArgsToString`").
/// Resolved open decision (see DESIGN.md): indices are rendered with their
/// canonical unquoted text and joined with `,`.
fn args_to_string(values: &[Value]) -> String {
    values.iter().map(render_unquoted).collect::<Vec<_>>().join(",")
}

/// Splits an array-literal entry on a top-level `key=value` separator, if
/// one is present (resolved open decision, see DESIGN.md: the `{ }` literal
/// accepts both bare positional values and `key=value` pairs in the same
/// list, matching end-to-end scenario 4). Scans token-by-token so that a
/// nested group's own `=` (a sub-expression's assignment) never matches —
/// only a bare `Op::Assign` at this entry's own top level does. `==`/`<=`/
/// `>=`/`!=` never match since the scanner tokenizes them as distinct
/// operators via maximal munch.
fn split_key_value<'a>(interp: &Interpreter, part: &'a str) -> Option<(&'a str, &'a str)> {
    let mut pos = 0usize;
    loop {
        let (next_pos, token) = scanner::next_token(part, pos, &interp.namespaces);
        if token.is_end() {
            return None;
        }
        if matches!(token.kind, TokenKind::Operator(Op::Assign)) {
            return Some((&part[..pos], &part[next_pos..]));
        }
        pos = next_pos;
    }
}

pub(crate) fn render_unquoted(v: &Value) -> String {
    match v {
        Value::String(s) => String::from_utf8_lossy(s).into_owned(),
        other => other.to_string(),
    }
}

fn index_key(idx_values: &[Value]) -> Value {
    if idx_values.len() == 1 {
        idx_values[0].clone()
    } else {
        Value::string(args_to_string(idx_values).into_bytes())
    }
}

fn indices_as_usize(idx_values: &[Value]) -> Result<Vec<usize>, GuaError> {
    idx_values
        .iter()
        .map(|v| match v {
            Value::Integer(i) if *i >= 0 => Ok(*i as usize),
            _ => Err(GuaError::new(Status::IllegalOperand, "matrix index must be a non-negative Integer")),
        })
        .collect()
}

/// `name[idx...] = expr` (spec.md §4.4).
fn assign_index(interp: &mut Interpreter, name: &str, idx_values: &[Value], rhs: Value) -> Result<Value, GuaError> {
    let current = interp.namespaces.get(name, Scope::Stack);
    match current {
        Value::Matrix(m) => {
            let idx = indices_as_usize(idx_values)?;
            m.borrow_mut().set(&idx, rhs.clone())?;
            Ok(rhs)
        }
        Value::String(s) => {
            if idx_values.len() != 1 {
                return Err(GuaError::new(Status::IllegalOperand, "string index must be a single Integer"));
            }
            let i = match &idx_values[0] {
                Value::Integer(i) if *i >= 0 => *i as usize,
                _ => return Err(GuaError::new(Status::IllegalOperand, "string index must be a non-negative Integer")),
            };
            let byte = match &rhs {
                Value::String(bytes) if bytes.len() == 1 => bytes[0],
                Value::Integer(code) => {
                    // Open decision (DESIGN.md): byte codes outside 0..=255 are rejected
                    // rather than silently truncated.
                    if !(0..=255).contains(code) {
                        return Err(GuaError::new(Status::IndexOutOfBound, "byte code out of range 0..255"));
                    }
                    *code as u8
                }
                _ => return Err(GuaError::new(Status::IllegalOperand, "string element assignment requires a single-byte String or an Integer")),
            };
            if i >= s.len() {
                return Err(GuaError::new(Status::IndexOutOfBound, "string index out of bound"));
            }
            let mut bytes = s.to_vec();
            bytes[i] = byte;
            let new_value = Value::string(bytes);
            interp.namespaces.set(name, new_value.clone(), Scope::Stack);
            Ok(new_value)
        }
        Value::Array(a) => {
            let key = index_key(idx_values);
            if rhs.is_unknown() {
                let mut arr = a.borrow_mut();
                arr.unset(&key);
                let empty = arr.is_empty();
                drop(arr);
                if empty {
                    interp.namespaces.unset(name, Scope::Stack);
                }
            } else {
                a.borrow_mut().set(key, rhs.clone())?;
            }
            Ok(rhs)
        }
        Value::Unknown => {
            // auto-vivify as Array (spec.md §4.4: "If the named variable holds/creates an Array").
            let mut data = ArrayData::new();
            if !rhs.is_unknown() {
                data.set(index_key(idx_values), rhs.clone())?;
            }
            interp.namespaces.set(name, Value::Array(Rc::new(RefCell::new(data))), Scope::Local);
            Ok(rhs)
        }
        _ => Err(GuaError::new(Status::IllegalOperand, "value does not support indexed assignment")),
    }
}

// ---------------------------------------------------------------------
// Levels 15..10: ||, &&, &|, |, ^, &
// ---------------------------------------------------------------------

fn parse_logicor(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_logicand(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        if !matches!(t.kind, TokenKind::Operator(Op::LogicOr)) {
            break;
        }
        pos = p2;
        let (p3, right_flow) = parse_logicand(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = logic_combine(left, right, |a, b| a || b, |m1, m2| m1.or(&m2))?;
    }
    Ok((pos, Flow::Value(left)))
}

fn parse_logicand(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_logicandor(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        if !matches!(t.kind, TokenKind::Operator(Op::LogicAnd)) {
            break;
        }
        pos = p2;
        let (p3, right_flow) = parse_logicandor(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = logic_combine(left, right, |a, b| a && b, |m1, m2| m1.and(&m2))?;
    }
    Ok((pos, Flow::Value(left)))
}

fn logic_combine(
    a: Value,
    b: Value,
    int_op: impl Fn(bool, bool) -> bool,
    matrix_op: impl Fn(&MatrixData, &MatrixData) -> Result<MatrixData, GuaError>,
) -> Result<Value, GuaError> {
    match (&a, &b) {
        (Value::Matrix(m1), Value::Matrix(m2)) => {
            Ok(Value::Matrix(Rc::new(RefCell::new(matrix_op(&m1.borrow(), &m2.borrow())?))))
        }
        _ => {
            let (x, y) = (require_int(&a)?, require_int(&b)?);
            Ok(Value::Integer(int_op(x != 0, y != 0) as i64))
        }
    }
}

fn require_int(v: &Value) -> Result<i64, GuaError> {
    match v {
        Value::Integer(i) => Ok(*i),
        _ => Err(GuaError::new(Status::IllegalOperand, "logical/bitwise operator requires Integer operands")),
    }
}

fn parse_logicandor(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_bitor(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        if !matches!(t.kind, TokenKind::Operator(Op::LogicAndOr)) {
            break;
        }
        pos = p2;
        let (p3, right_flow) = parse_bitor(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = match (&left, &right) {
            (Value::Matrix(m1), Value::Matrix(m2)) => {
                Value::Matrix(Rc::new(RefCell::new(m1.borrow().and_or(&m2.borrow())?)))
            }
            _ => return Err(GuaError::new(Status::IllegalOperand, "'&|' requires Matrix operands")),
        };
    }
    Ok((pos, Flow::Value(left)))
}

fn parse_bitor(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    parse_bit_level(interp, src, pos, Op::BitOr, parse_bitxor, |a, b| a | b)
}

fn parse_bitxor(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    parse_bit_level(interp, src, pos, Op::BitXor, parse_bitand, |a, b| a ^ b)
}

fn parse_bitand(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    parse_bit_level(interp, src, pos, Op::BitAnd, parse_equality, |a, b| a & b)
}

fn parse_bit_level(
    interp: &mut Interpreter,
    src: &str,
    pos: usize,
    op: Op,
    next: fn(&mut Interpreter, &str, usize) -> ExprResult,
    apply: impl Fn(i64, i64) -> i64,
) -> ExprResult {
    let (mut pos, left_flow) = next(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        if !matches!(t.kind, TokenKind::Operator(o) if o == op) {
            break;
        }
        pos = p2;
        let (p3, right_flow) = next(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = Value::Integer(apply(require_int(&left)?, require_int(&right)?));
    }
    Ok((pos, Flow::Value(left)))
}

// ---------------------------------------------------------------------
// Level 9: equality
// ---------------------------------------------------------------------

fn parse_equality(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_relational(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        let op = match t.kind {
            TokenKind::Operator(op @ (Op::Eq | Op::Ne)) => op,
            _ => break,
        };
        pos = p2;
        let (p3, right_flow) = parse_relational(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        let eq = values_equal(&left, &right);
        left = Value::Integer((if op == Op::Eq { eq } else { !eq }) as i64);
    }
    Ok((pos, Flow::Value(left)))
}

/// Structural equality used by `==`/`!=` and array/matrix element
/// comparisons (spec.md §4.4 level 9).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Unknown, Value::Unknown) => true,
        (Value::Unknown, _) | (_, Value::Unknown) => false,
        (Value::String(x), Value::String(y)) => x.as_ref() == y.as_ref(),
        (Value::String(_), _) | (_, Value::String(_)) => false,
        (Value::Complex { re: ar, im: ai }, Value::Complex { re: br, im: bi }) => ar == br && ai == bi,
        (Value::Complex { .. }, _) | (_, Value::Complex { .. }) => false,
        (Value::Array(x), Value::Array(y)) => x.borrow().is_equal(&y.borrow()),
        (Value::Array(_), _) | (_, Value::Array(_)) => false,
        (Value::Matrix(x), Value::Matrix(y)) => x.borrow().is_equal(&y.borrow()),
        (Value::Matrix(_), _) | (_, Value::Matrix(_)) => false,
        (Value::File(_), Value::File(_)) | (Value::Handle(_), Value::Handle(_)) => a.same_payload(b),
        (Value::File(_), _) | (_, Value::File(_)) | (Value::Handle(_), _) | (_, Value::Handle(_)) => false,
        _ => match (numeric::Scalar::from_value(a), numeric::Scalar::from_value(b)) {
            (Some(sa), Some(sb)) => sa.as_f64() == sb.as_f64(),
            _ => false,
        },
    }
}

// ---------------------------------------------------------------------
// Level 8: relational
// ---------------------------------------------------------------------

fn parse_relational(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_shift(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        let op = match t.kind {
            TokenKind::Operator(op @ (Op::Lt | Op::Le | Op::Gt | Op::Ge)) => op,
            _ => break,
        };
        pos = p2;
        let (p3, right_flow) = parse_shift(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = relational_compare(op, left, right)?;
    }
    Ok((pos, Flow::Value(left)))
}

fn relational_compare(op: Op, a: Value, b: Value) -> Result<Value, GuaError> {
    let ordering = match (&a, &b) {
        (Value::String(x), Value::String(y)) => x.as_ref().cmp(y.as_ref()),
        (Value::String(_), _) | (_, Value::String(_)) => {
            // string-vs-number renders the number and string-compares (spec.md §4.4 level 8).
            let xs = render_unquoted(&a);
            let ys = render_unquoted(&b);
            xs.as_bytes().cmp(ys.as_bytes())
        }
        (Value::Array(x), Value::Array(y)) => x.borrow().len().cmp(&y.borrow().len()),
        (Value::Matrix(x), Value::Matrix(y)) => x.borrow().len().cmp(&y.borrow().len()),
        (Value::Array(_) | Value::Matrix(_), _) | (_, Value::Array(_) | Value::Matrix(_)) => {
            return Err(GuaError::new(Status::IllegalOperand, "relational"));
        }
        _ => numeric::compare(&a, &b)?,
    };
    let result = match op {
        Op::Lt => ordering.is_lt(),
        Op::Le => ordering.is_le(),
        Op::Gt => ordering.is_gt(),
        Op::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Integer(result as i64))
}

// ---------------------------------------------------------------------
// Level 7: shift
// ---------------------------------------------------------------------

fn parse_shift(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_addsub(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        let op = match t.kind {
            TokenKind::Operator(op @ (Op::Shl | Op::Shr)) => op,
            _ => break,
        };
        pos = p2;
        let (p3, right_flow) = parse_addsub(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        let (x, y) = (require_int(&left)?, require_int(&right)?);
        left = Value::Integer(if op == Op::Shl { x.wrapping_shl(y as u32) } else { x.wrapping_shr(y as u32) });
    }
    Ok((pos, Flow::Value(left)))
}

// ---------------------------------------------------------------------
// Level 6: +/-
// ---------------------------------------------------------------------

fn parse_addsub(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_muldiv(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        let op = match t.kind {
            TokenKind::Operator(op @ (Op::Plus | Op::Minus)) => op,
            _ => break,
        };
        pos = p2;
        let (p3, right_flow) = parse_muldiv(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = apply_addsub(op, left, right)?;
    }
    Ok((pos, Flow::Value(left)))
}

fn apply_addsub(op: Op, a: Value, b: Value) -> Result<Value, GuaError> {
    match op {
        Op::Plus => match (&a, &b) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                let mut bytes = string_bytes(&a);
                bytes.extend(string_bytes(&b));
                Ok(Value::string(bytes))
            }
            (Value::Matrix(m1), Value::Matrix(m2)) => {
                Ok(Value::Matrix(Rc::new(RefCell::new(m1.borrow().add(&m2.borrow())?))))
            }
            _ => numeric::add(&a, &b),
        },
        Op::Minus => match (&a, &b) {
            (Value::Matrix(m1), Value::Matrix(m2)) => {
                Ok(Value::Matrix(Rc::new(RefCell::new(m1.borrow().sub(&m2.borrow())?))))
            }
            (Value::String(_), _) | (_, Value::String(_)) => Err(GuaError::new(Status::IllegalOperand, "'-' does not apply to strings")),
            _ => numeric::sub(&a, &b),
        },
        _ => unreachable!(),
    }
}

/// Renders a value for string concatenation: strings pass their raw bytes
/// through; numbers render via `%ld`/`%g` (spec.md §4.4 level 6).
fn string_bytes(v: &Value) -> Vec<u8> {
    match v {
        Value::String(s) => s.to_vec(),
        other => render_unquoted(other).into_bytes(),
    }
}

// ---------------------------------------------------------------------
// Level 5: * / %
// ---------------------------------------------------------------------

fn parse_muldiv(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_pow(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        let op = match t.kind {
            TokenKind::Operator(op @ (Op::Mul | Op::Div | Op::Mod)) => op,
            _ => break,
        };
        pos = p2;
        let (p3, right_flow) = parse_pow(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = apply_muldiv(op, left, right)?;
    }
    Ok((pos, Flow::Value(left)))
}

fn apply_muldiv(op: Op, a: Value, b: Value) -> Result<Value, GuaError> {
    match op {
        Op::Mod => {
            let (x, y) = (require_int(&a)?, require_int(&b)?);
            if y == 0 {
                return Err(GuaError::division_by_zero());
            }
            Ok(Value::Integer(x % y))
        }
        Op::Mul => match (&a, &b) {
            (Value::Matrix(m1), Value::Matrix(m2)) => {
                Ok(Value::Matrix(Rc::new(RefCell::new(m1.borrow().matmul(&m2.borrow())?))))
            }
            (Value::Matrix(m), scalar) | (scalar, Value::Matrix(m)) if scalar.is_numeric() => {
                Ok(Value::Matrix(Rc::new(RefCell::new(m.borrow().scalar_mul(scalar)?))))
            }
            _ => numeric::mul(&a, &b),
        },
        Op::Div => match (&a, &b) {
            (Value::Matrix(m1), Value::Matrix(m2)) => {
                let inv = m2.borrow().inv()?;
                Ok(Value::Matrix(Rc::new(RefCell::new(m1.borrow().matmul(&inv)?))))
            }
            _ => numeric::div(&a, &b),
        },
        _ => unreachable!(),
    }
}

// ---------------------------------------------------------------------
// Level 4: ** (parsed left-folded per spec.md §4.4)
// ---------------------------------------------------------------------

fn parse_pow(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (mut pos, left_flow) = parse_unary(interp, src, pos)?;
    if let Flow::Signal(_) = left_flow {
        return Ok((pos, left_flow));
    }
    let mut left = value_of(left_flow).unwrap();
    loop {
        let (p2, t) = peek(interp, src, pos);
        if !matches!(t.kind, TokenKind::Operator(Op::Pow)) {
            break;
        }
        pos = p2;
        let (p3, right_flow) = parse_unary(interp, src, pos)?;
        pos = p3;
        if let Flow::Signal(_) = right_flow {
            return Ok((pos, right_flow));
        }
        let right = value_of(right_flow).unwrap();
        left = apply_pow(left, right)?;
    }
    Ok((pos, Flow::Value(left)))
}

fn apply_pow(base: Value, exp: Value) -> Result<Value, GuaError> {
    match &base {
        Value::Matrix(m) => {
            let n = match exp {
                Value::Integer(i) => i,
                _ => return Err(GuaError::new(Status::IllegalOperand, "matrix exponent must be Integer")),
            };
            return Ok(Value::Matrix(Rc::new(RefCell::new(m.borrow().pow(n)?))));
        }
        _ => {}
    }
    match &exp {
        Value::Integer(n) => match &base {
            // Int**Int truncates via `pow` then cast (spec.md §9 open
            // question (a), resolved in DESIGN.md): a negative exponent is
            // not special-cased, so e.g. `2**-1` truncates `0.5` to `0`,
            // not clamped up to `2**0`.
            Value::Integer(b) => Ok(Value::Integer((*b as f64).powf(*n as f64) as i64)),
            Value::Real(b) => Ok(Value::Real(b.powi(*n as i32))),
            Value::Complex { re, im } => {
                let r = (re * re + im * im).sqrt();
                let theta = im.atan2(*re);
                let rn = r.powi(*n as i32);
                let new_theta = theta * (*n as f64);
                Ok(Value::canonicalize_complex(rn * new_theta.cos(), rn * new_theta.sin()))
            }
            _ => Err(GuaError::new(Status::IllegalOperand, "**")),
        },
        Value::Real(n) => match &base {
            Value::Integer(b) => Ok(Value::Real((*b as f64).powf(*n))),
            Value::Real(b) => Ok(Value::Real(b.powf(*n))),
            _ => Err(GuaError::new(Status::IllegalOperand, "**")),
        },
        _ => Err(GuaError::new(Status::IllegalOperand, "** exponent must be Int or Real")),
    }
}

// ---------------------------------------------------------------------
// Level 3: unary +/-
// ---------------------------------------------------------------------

fn parse_unary(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (p1, t1) = peek(interp, src, pos);
    match t1.kind {
        TokenKind::Operator(op @ (Op::Plus | Op::Minus)) => {
            let (p2, operand_flow) = parse_unary(interp, src, p1)?;
            if let Flow::Signal(_) = operand_flow {
                return Ok((p2, operand_flow));
            }
            let operand = value_of(operand_flow).unwrap();
            let v = match (op, &operand) {
                (Op::Plus, _) => operand,
                (Op::Minus, Value::Matrix(m)) => Value::Matrix(Rc::new(RefCell::new(m.borrow().negate()?))),
                (Op::Minus, _) => numeric::neg(&operand)?,
                _ => unreachable!(),
            };
            Ok((p2, Flow::Value(v)))
        }
        _ => parse_not(interp, src, pos),
    }
}

// ---------------------------------------------------------------------
// Level 2: ! ~
// ---------------------------------------------------------------------

fn parse_not(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (p1, t1) = peek(interp, src, pos);
    match t1.kind {
        TokenKind::Operator(op @ (Op::Not | Op::BitNot)) => {
            let (p2, operand_flow) = parse_not(interp, src, p1)?;
            if let Flow::Signal(_) = operand_flow {
                return Ok((p2, operand_flow));
            }
            let operand = value_of(operand_flow).unwrap();
            let i = require_int(&operand)?;
            let v = Value::Integer(if op == Op::Not { (i == 0) as i64 } else { !i });
            Ok((p2, Flow::Value(v)))
        }
        _ => parse_primary(interp, src, pos),
    }
}

// ---------------------------------------------------------------------
// Level 1: primary / object
// ---------------------------------------------------------------------

fn parse_primary(interp: &mut Interpreter, src: &str, pos: usize) -> ExprResult {
    let (p1, t1) = peek(interp, src, pos);
    match t1.kind {
        TokenKind::Number(NumericLiteral::Int(i)) => Ok((p1, Flow::Value(Value::Integer(i)))),
        TokenKind::Number(NumericLiteral::Real(r)) => Ok((p1, Flow::Value(Value::Real(r)))),
        TokenKind::StringLit(raw) => Ok((p1, Flow::Value(Value::string(scanner::expand_escapes(raw))))),
        TokenKind::ScriptLit(raw) => Ok((p1, Flow::Value(Value::string(raw.as_bytes().to_vec())))),
        TokenKind::Group(GroupKind::Paren, inner) => {
            let flow = crate::stmt::evaluate_source(interp, inner)?;
            Ok((p1, flow))
        }
        TokenKind::Group(GroupKind::Bracket, inner) => {
            let m = parse_matrix_literal(interp, inner)?;
            Ok((p1, Flow::Value(Value::Matrix(Rc::new(RefCell::new(m))))))
        }
        TokenKind::Group(GroupKind::Brace, inner) => {
            let mut data = ArrayData::new();
            let mut next_index = 0i64;
            for part in split_top_level(inner, b',') {
                if part.trim().is_empty() {
                    continue;
                }
                match split_key_value(interp, part) {
                    Some((key_text, value_text)) => {
                        let key = value_of(evaluate(interp, key_text, 0)?.1).unwrap_or(Value::Unknown);
                        let value = value_of(evaluate(interp, value_text, 0)?.1).unwrap_or(Value::Unknown);
                        data.set(key, value)?;
                    }
                    None => {
                        let v = value_of(evaluate(interp, part, 0)?.1).unwrap_or(Value::Unknown);
                        data.set(Value::Integer(next_index), v)?;
                        next_index += 1;
                    }
                }
            }
            Ok((p1, Flow::Value(Value::Array(Rc::new(RefCell::new(data))))))
        }
        TokenKind::Variable(name) | TokenKind::UnboundIdent(name) => {
            let name = name.to_string();
            finish_variable_read(interp, src, p1, &name)
        }
        TokenKind::FunctionName(name) => {
            let name = name.to_string();
            let (p2, t2) = peek(interp, src, p1);
            match t2.kind {
                TokenKind::Group(GroupKind::Paren, args_text) => {
                    let flow = call_function(interp, &name, args_text)?;
                    match flow {
                        Flow::Signal(_) => Ok((p2, flow)),
                        Flow::Value(v) => {
                            let (pend, v) = maybe_index(interp, src, p2, v)?;
                            Ok((pend, Flow::Value(v)))
                        }
                    }
                }
                _ => finish_variable_read(interp, src, p1, &name),
            }
        }
        TokenKind::Operator(Op::Macro) => {
            let (p2, t2) = peek(interp, src, p1);
            let (p3, target_name) = match t2.kind {
                TokenKind::Variable(n) | TokenKind::FunctionName(n) | TokenKind::UnboundIdent(n) => (p2, n.to_string()),
                TokenKind::Group(GroupKind::Paren, inner) => {
                    let (_p, flow) = evaluate(interp, inner, 0)?;
                    let v = value_of(flow).unwrap_or(Value::Unknown);
                    (p2, expect_string(v)?)
                }
                _ => return Err(GuaError::new(Status::UnexpectedToken, "expected macro target")),
            };
            let value = interp.namespaces.get(&target_name, Scope::Global);
            let (pend, value) = maybe_index(interp, src, p3, value)?;
            Ok((pend, Flow::Value(value)))
        }
        TokenKind::Operator(Op::Indirect) => {
            let (p2, t2) = peek(interp, src, p1);
            let var_name = match t2.kind {
                TokenKind::Variable(n) => n.to_string(),
                _ => return Err(GuaError::new(Status::IllegalOperand, "'@' requires a bound Variable name")),
            };
            let target_value = interp.namespaces.get(&var_name, Scope::Stack);
            let target_name = expect_string(target_value)?;
            let value = interp.namespaces.get(&target_name, Scope::Stack);
            let (pend, value) = maybe_index(interp, src, p2, value)?;
            Ok((pend, Flow::Value(value)))
        }
        TokenKind::End => Ok((p1, Flow::Value(Value::Unknown))),
        TokenKind::Separator | TokenKind::ArgSeparator => Ok((pos, Flow::Value(Value::Unknown))),
        _ => Err(GuaError::new(Status::UnexpectedToken, format!("unexpected token '{}'", t1.text)).with_snippet(&src[pos..])),
    }
}

fn finish_variable_read(interp: &mut Interpreter, src: &str, pos: usize, name: &str) -> ExprResult {
    let value = interp.namespaces.get(name, Scope::Stack);
    let (pend, value) = maybe_index(interp, src, pos, value)?;
    Ok((pend, Flow::Value(value)))
}

/// Consumes an optional trailing `[idx...]` read on `value` (spec.md §4.4
/// level 1: array/matrix/string element read).
fn maybe_index(interp: &mut Interpreter, src: &str, pos: usize, value: Value) -> Result<(usize, Value), GuaError> {
    let (p2, t2) = peek(interp, src, pos);
    match t2.kind {
        TokenKind::Group(GroupKind::Bracket, idx_text) => {
            let idx_values = evaluate_index_list(interp, idx_text)?;
            let result = read_indexed(&value, &idx_values)?;
            Ok((p2, result))
        }
        _ => Ok((pos, value)),
    }
}

fn read_indexed(base: &Value, idx_values: &[Value]) -> Result<Value, GuaError> {
    match base {
        Value::Array(a) => Ok(a.borrow().get(&index_key(idx_values))),
        Value::Matrix(m) => {
            let idx = indices_as_usize(idx_values)?;
            m.borrow().get(&idx)
        }
        Value::String(s) => {
            if idx_values.len() != 1 {
                return Err(GuaError::new(Status::IllegalOperand, "string index requires a single Integer"));
            }
            let i = match &idx_values[0] {
                Value::Integer(i) if *i >= 0 => *i as usize,
                _ => return Err(GuaError::new(Status::IllegalOperand, "string index must be a non-negative Integer")),
            };
            if i >= s.len() {
                return Err(GuaError::new(Status::IndexOutOfBound, "string index out of bound"));
            }
            Ok(Value::string(vec![s[i]]))
        }
        Value::Unknown => Ok(Value::Unknown),
        _ => Err(GuaError::new(Status::IllegalOperand, "value does not support indexing")),
    }
}

fn call_function(interp: &mut Interpreter, name: &str, args_text: &str) -> Result<Flow, GuaError> {
    let func = interp
        .namespaces
        .lookup_function(name)
        .ok_or_else(|| GuaError::new(Status::Error, format!("undefined function '{name}'")))?;
    let mut args = Vec::new();
    for part in split_top_level(args_text, b',') {
        if part.trim().is_empty() {
            continue;
        }
        let (_p, flow) = evaluate(interp, part, 0)?;
        match flow {
            Flow::Signal(_) => return Ok(flow),
            Flow::Value(v) => args.push(v),
        }
    }
    crate::function::invoke(interp, func, args)
}

fn parse_matrix_literal(interp: &mut Interpreter, text: &str) -> Result<MatrixData, GuaError> {
    let rows: Vec<&str> = split_top_level(text, b';');
    let mut cols = 0usize;
    let mut cells = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        let parts = split_top_level(row, b',');
        if r == 0 {
            cols = parts.len();
        } else if parts.len() != cols {
            return Err(GuaError::new(Status::IllegalOperand, "matrix literal rows must have equal length"));
        }
        for part in parts {
            let (_p, flow) = evaluate(interp, part, 0)?;
            cells.push(value_of(flow).unwrap_or(Value::Unknown));
        }
    }
    MatrixData::from_rows(rows.len(), cols, cells)
}
