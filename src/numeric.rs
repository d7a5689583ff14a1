//! Numeric promotion shared by the expression evaluator (spec.md §4.4
//! precedence levels 4-6) and the matrix arithmetic (spec.md §4.3).
//!
//! Promotion rule, stated once here instead of duplicated at every call
//! site: `Int op Int -> Int`; any `Real` operand promotes both to `Real`;
//! any `Complex` operand promotes both to `Complex`. A `Complex` result with
//! exactly-zero imaginary part canonicalizes back to `Real` (invariant 6).

use crate::status::{GuaError, Status};
use crate::value::Value;

#[derive(Debug, Clone, Copy)]
pub enum Scalar {
    Int(i64),
    Real(f64),
    Complex(f64, f64),
}

impl Scalar {
    pub fn from_value(v: &Value) -> Option<Scalar> {
        match *v {
            Value::Integer(i) => Some(Scalar::Int(i)),
            Value::Real(r) => Some(Scalar::Real(r)),
            Value::Complex { re, im } => Some(Scalar::Complex(re, im)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Scalar::Int(i) => Value::Integer(i),
            Scalar::Real(r) => Value::Real(r),
            Scalar::Complex(re, im) => Value::canonicalize_complex(re, im),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(i) => i as f64,
            Scalar::Real(r) => r,
            Scalar::Complex(re, _) => re,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Promoted {
    Int(i64, i64),
    Real(f64, f64),
    Complex((f64, f64), (f64, f64)),
}

pub fn promote(a: Scalar, b: Scalar) -> Promoted {
    match (a, b) {
        (Scalar::Complex(ar, ai), b) => {
            let (br, bi) = to_complex(b);
            Promoted::Complex((ar, ai), (br, bi))
        }
        (a, Scalar::Complex(br, bi)) => {
            let (ar, ai) = to_complex(a);
            Promoted::Complex((ar, ai), (br, bi))
        }
        (Scalar::Int(x), Scalar::Int(y)) => Promoted::Int(x, y),
        (a, b) => Promoted::Real(a.as_f64(), b.as_f64()),
    }
}

fn to_complex(s: Scalar) -> (f64, f64) {
    match s {
        Scalar::Complex(re, im) => (re, im),
        other => (other.as_f64(), 0.0),
    }
}

pub fn illegal_operand(op: &str) -> GuaError {
    GuaError::illegal_operand(op)
}

pub fn add(a: &Value, b: &Value) -> Result<Value, GuaError> {
    let (sa, sb) = scalars(a, b, "+")?;
    Ok(match promote(sa, sb) {
        Promoted::Int(x, y) => Value::Integer(x.wrapping_add(y)),
        Promoted::Real(x, y) => Value::Real(x + y),
        Promoted::Complex((ar, ai), (br, bi)) => Value::canonicalize_complex(ar + br, ai + bi),
    })
}

pub fn sub(a: &Value, b: &Value) -> Result<Value, GuaError> {
    let (sa, sb) = scalars(a, b, "-")?;
    Ok(match promote(sa, sb) {
        Promoted::Int(x, y) => Value::Integer(x.wrapping_sub(y)),
        Promoted::Real(x, y) => Value::Real(x - y),
        Promoted::Complex((ar, ai), (br, bi)) => Value::canonicalize_complex(ar - br, ai - bi),
    })
}

pub fn mul(a: &Value, b: &Value) -> Result<Value, GuaError> {
    let (sa, sb) = scalars(a, b, "*")?;
    Ok(match promote(sa, sb) {
        Promoted::Int(x, y) => Value::Integer(x.wrapping_mul(y)),
        Promoted::Real(x, y) => Value::Real(x * y),
        Promoted::Complex((ar, ai), (br, bi)) => {
            Value::canonicalize_complex(ar * br - ai * bi, ar * bi + ai * br)
        }
    })
}

pub fn div(a: &Value, b: &Value) -> Result<Value, GuaError> {
    let (sa, sb) = scalars(a, b, "/")?;
    match promote(sa, sb) {
        Promoted::Int(x, y) => {
            if y == 0 {
                return Err(GuaError::division_by_zero());
            }
            // Int/Int stays Int even when inexact (spec.md §9 open question
            // (a): the same truncating discipline as `**`'s Int**Int — see
            // DESIGN.md), not promoted to Real.
            Ok(Value::Integer(x / y))
        }
        Promoted::Real(x, y) => {
            if y == 0.0 {
                return Err(GuaError::division_by_zero());
            }
            Ok(Value::Real(x / y))
        }
        Promoted::Complex((ar, ai), (br, bi)) => {
            let denom = br * br + bi * bi;
            if denom == 0.0 {
                return Err(GuaError::division_by_zero());
            }
            Ok(Value::canonicalize_complex((ar * br + ai * bi) / denom, (ai * br - ar * bi) / denom))
        }
    }
}

pub fn neg(a: &Value) -> Result<Value, GuaError> {
    match *a {
        Value::Integer(i) => Ok(Value::Integer(-i)),
        Value::Real(r) => Ok(Value::Real(-r)),
        Value::Complex { re, im } => Ok(Value::canonicalize_complex(-re, -im)),
        _ => Err(illegal_operand("unary -")),
    }
}

fn scalars(a: &Value, b: &Value, op: &str) -> Result<(Scalar, Scalar), GuaError> {
    let sa = Scalar::from_value(a).ok_or_else(|| illegal_operand(op))?;
    let sb = Scalar::from_value(b).ok_or_else(|| illegal_operand(op))?;
    Ok((sa, sb))
}

/// Numeric comparison for the relational ladder (spec.md §4.4 level 8),
/// `Int`/`Real` cross-comparable, `Complex` excluded (open question (b) of
/// spec.md §9: resolved in DESIGN.md as an explicit `IllegalOperand`).
pub fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, GuaError> {
    match (a, b) {
        (Value::Complex { .. }, _) | (_, Value::Complex { .. }) => {
            Err(GuaError::new(Status::IllegalOperand, "complex values are not ordered"))
        }
        _ => {
            let (sa, sb) = scalars(a, b, "relational")?;
            let (x, y) = (sa.as_f64(), sb.as_f64());
            x.partial_cmp(&y).ok_or_else(|| illegal_operand("relational"))
        }
    }
}
