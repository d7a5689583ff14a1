//! Associative-array container operations (spec.md §4.3).
//!
//! Spec.md is explicit that `Set` is a *linear scan* of the element list,
//! not a hash lookup — this is the original's actual complexity, not an
//! implementation shortcut we're choosing, so `Vec<Element>` (insertion
//! order preserved, O(n) key search) is the faithful translation, per the
//! Design Note recommending "owned nodes inside a list" over the original's
//! intrusive doubly-linked list with raw back-pointers.

use crate::status::{GuaError, Status};
use crate::value::{format_string_literal, Value};

/// A single (key, value) entry (spec.md §3, "Element").
#[derive(Debug, Clone)]
pub struct Element {
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ArrayData {
    elements: Vec<Element>,
}

/// Key equality used by array lookups: `Integer` by integer equality,
/// `String` by byte-range comparison; cross-type keys never match
/// (spec.md §4.3).
pub fn keys_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::String(x), Value::String(y)) => x.as_ref() == y.as_ref(),
        _ => false,
    }
}

/// Validates that a value is legal as an array key (spec.md §3 invariant 2).
pub fn validate_key(key: &Value) -> Result<(), GuaError> {
    match key {
        Value::Integer(_) | Value::String(_) => Ok(()),
        _ => Err(GuaError::new(Status::IllegalAssignment, "array key must be Integer or String")),
    }
}

/// Validates that a value is legal as an array element (spec.md §3 invariant 2):
/// nested Array/Matrix values are rejected.
pub fn validate_element_value(value: &Value) -> Result<(), GuaError> {
    match value {
        Value::Array(_) | Value::Matrix(_) => {
            Err(GuaError::illegal_assignment("array elements cannot be nested Array or Matrix values"))
        }
        _ => Ok(()),
    }
}

impl ArrayData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.elements.iter().position(|e| keys_equal(&e.key, key))
    }

    pub fn get(&self, key: &Value) -> Value {
        self.position(key).map(|i| self.elements[i].value.clone()).unwrap_or(Value::Unknown)
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// `Set(array, key, value)`: linear scan; replace on key match, append on miss
    /// (spec.md §4.3).
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), GuaError> {
        validate_key(&key)?;
        validate_element_value(&value)?;
        match self.position(&key) {
            Some(i) => self.elements[i].value = value,
            None => self.elements.push(Element { key, value }),
        }
        Ok(())
    }

    /// Returns `true` if the key was present and has been removed.
    pub fn unset(&mut self, key: &Value) -> bool {
        match self.position(key) {
            Some(i) => {
                self.elements.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn deep_clone(&self) -> ArrayData {
        ArrayData {
            elements: self
                .elements
                .iter()
                .map(|e| Element { key: e.key.clone(), value: e.value.deep_clone() })
                .collect(),
        }
    }

    /// `Keys(array)`: an array with sequential integer keys 0..n holding the
    /// original keys, in insertion order (spec.md §4.3).
    pub fn keys(&self) -> ArrayData {
        let elements = self
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| Element { key: Value::Integer(i as i64), value: e.key.clone() })
            .collect();
        ArrayData { elements }
    }

    /// Order-sensitive structural equality (spec.md §4.3).
    pub fn is_equal(&self, other: &ArrayData) -> bool {
        if self.elements.len() != other.elements.len() {
            return false;
        }
        self.elements
            .iter()
            .zip(other.elements.iter())
            .all(|(a, b)| keys_equal(&a.key, &b.key) && crate::expr::values_equal(&a.value, &b.value))
    }

    /// Canonical literal rendering `{v1,v2,...}` (spec.md §4.3, §6). Array
    /// literals render only the values, not the keys, matching the `{ }`
    /// array-literal syntax.
    pub fn to_string_literal(&self) -> String {
        let mut out = String::from("{");
        for (i, e) in self.elements.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&render_element_value(&e.value));
        }
        out.push('}');
        out
    }
}

fn render_element_value(v: &Value) -> String {
    match v {
        Value::String(s) => format_string_literal(s),
        other => other.to_string(),
    }
}
