//! The process-wide, immutable constants table (spec.md §3).
//!
//! Names here can never be rebound or unset (invariant 5); the namespace
//! assignment path checks [`is_constant_name`] before creating or
//! overwriting any binding.

use crate::value::Value;

pub const GUA_VERSION: &str = "1.0.0";

/// Returns the constant's value if `name` names one of the table entries.
///
/// Variable lookup falls back to this table when a name is not bound in any
/// reachable namespace frame (spec.md §4.2).
pub fn constant_value(name: &str) -> Option<Value> {
    Some(match name {
        "TRUE" => Value::Integer(1),
        "FALSE" => Value::Integer(0),
        "NULL" => Value::Unknown,
        "i" => Value::Complex { re: 0.0, im: 1.0 },
        "GUA_INTEGER" => Value::string("GUA_INTEGER"),
        "GUA_REAL" => Value::string("GUA_REAL"),
        "GUA_COMPLEX" => Value::string("GUA_COMPLEX"),
        "GUA_STRING" => Value::string("GUA_STRING"),
        "GUA_ARRAY" => Value::string("GUA_ARRAY"),
        "GUA_MATRIX" => Value::string("GUA_MATRIX"),
        "GUA_HANDLE" => Value::string("GUA_HANDLE"),
        "GUA_NAMESPACE" => Value::string("GUA_NAMESPACE"),
        "GUA_FILE" => Value::string("GUA_FILE"),
        "GUA_VERSION" => Value::string(GUA_VERSION),
        _ => return None,
    })
}

pub fn is_constant_name(name: &str) -> bool {
    constant_value(name).is_some()
}
