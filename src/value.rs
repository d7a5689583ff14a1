//! The tagged-value model (spec.md §3).
//!
//! The interpreter's universal value type. Per the Design Notes ("Cyclic /
//! shared ownership"), the container/aliasing variants (String, Array,
//! Matrix, File, Handle) carry `Rc<RefCell<_>>` payloads: cloning a `Value`
//! clones the `Rc` (a cheap pointer bump, with `Rc::ptr_eq` available for a
//! no-op fast path on identical pointers), while container-to-container
//! moves go through explicit `deep_clone` calls so that the default
//! copy-on-assign semantics spec.md §3 describes (array/matrix values are
//! never silently shared between two *different* variables) still hold.

use std::{any::Any, cell::RefCell, fmt, rc::Rc};

use crate::array::ArrayData;
use crate::matrix::MatrixData;

/// Threshold below which a real's magnitude renders as plain `0` (spec.md §6).
pub const ZERO: f64 = 1e-12;

pub type ArrayRef = Rc<RefCell<ArrayData>>;
pub type MatrixRef = Rc<RefCell<MatrixData>>;
pub type StringRef = Rc<[u8]>;

/// An opaque file resource. Lifecycle and I/O are owned by the embedder
/// (spec.md §1 explicitly keeps file/handle I/O backends out of scope); the
/// evaluator only ever clones the `Rc`.
#[derive(Clone)]
pub struct FileHandle(pub Rc<dyn Any>);

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle(<opaque>)")
    }
}

/// A generic resource handle: a type tag plus an opaque pointer, per
/// spec.md §3 (`Handle{type_tag, pointer}`).
#[derive(Clone)]
pub struct HandleValue {
    pub type_tag: Rc<str>,
    pub payload: Rc<dyn Any>,
}

impl fmt::Debug for HandleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleValue({})", self.type_tag)
    }
}

/// The tagged value sum of spec.md §3.
#[derive(Debug, Clone)]
pub enum Value {
    Unknown,
    Integer(i64),
    Real(f64),
    Complex { re: f64, im: f64 },
    String(StringRef),
    Array(ArrayRef),
    Matrix(MatrixRef),
    File(FileHandle),
    Handle(HandleValue),
}

impl Value {
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Value::String(Rc::from(bytes.into().into_boxed_slice()))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_) | Value::Complex { .. })
    }

    /// Canonicalizes a complex result with exactly-zero imaginary part back to
    /// `Real`, per invariant 6 of spec.md §3.
    pub fn canonicalize_complex(re: f64, im: f64) -> Value {
        if im == 0.0 { Value::Real(re) } else { Value::Complex { re, im } }
    }

    /// Type tag name, as surfaced by the `type()` built-in (spec.md §6).
    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Unknown => "GUA_UNKNOWN",
            Value::Integer(_) => "GUA_INTEGER",
            Value::Real(_) => "GUA_REAL",
            Value::Complex { .. } => "GUA_COMPLEX",
            Value::String(_) => "GUA_STRING",
            Value::Array(_) => "GUA_ARRAY",
            Value::Matrix(_) => "GUA_MATRIX",
            Value::File(_) => "GUA_FILE",
            Value::Handle(_) => "GUA_HANDLE",
        }
    }

    /// Pointer-identity check used by `Namespace::set`'s no-op optimization
    /// (spec.md §4.2): assigning a value back through the same heap payload
    /// is a no-op rather than a free-then-store cycle.
    pub fn same_payload(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Matrix(a), Value::Matrix(b)) => Rc::ptr_eq(a, b),
            (Value::File(a), Value::File(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Value::Handle(a), Value::Handle(b)) => Rc::ptr_eq(&a.payload, &b.payload),
            _ => false,
        }
    }

    /// Deep copy used whenever a value crosses from one owner into another
    /// (e.g. array-of-array element assignment would need this; since nested
    /// containers are rejected at assignment per invariant 2, this mostly
    /// matters for `Container::copy`-style built-ins).
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(a) => Value::Array(Rc::new(RefCell::new(a.borrow().deep_clone()))),
            Value::Matrix(m) => Value::Matrix(Rc::new(RefCell::new(m.borrow().clone()))),
            other => other.clone(),
        }
    }
}

/// Formats an `f64` the way the original's `%g` rendering does (spec.md §6):
/// shortest round-tripping representation, with magnitudes below [`ZERO`]
/// collapsed to `0`.
pub fn format_real(v: f64) -> String {
    if v == 0.0 || v.abs() < ZERO {
        return "0".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if v.is_nan() {
        return "nan".to_string();
    }
    // `%g`: use the shorter of fixed and exponential notation, trimming
    // trailing zeros, matching printf's default 6 significant digits.
    let mut s = format!("{v:.6e}");
    if let Some(exp_pos) = s.find('e') {
        let exp: i32 = s[exp_pos + 1..].parse().unwrap_or(0);
        if (-4..6).contains(&exp) {
            s = format!("{v}");
            if s.contains('.') {
                while s.ends_with('0') {
                    s.pop();
                }
                if s.ends_with('.') {
                    s.pop();
                }
            }
            return s;
        }
        let mantissa = &s[..exp_pos];
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        return format!("{mantissa}e{exp:+03}");
    }
    s
}

pub fn format_complex(re: f64, im: f64) -> String {
    format!("{}+{}*i", format_real(re), format_real(im))
}

pub fn format_string_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            _ => out.push(b as char),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => write!(f, ""),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{}", format_real(*r)),
            Value::Complex { re, im } => write!(f, "{}", format_complex(*re, *im)),
            Value::String(s) => write!(f, "{}", format_string_literal(s)),
            Value::Array(a) => write!(f, "{}", a.borrow().to_string_literal()),
            Value::Matrix(m) => write!(f, "{}", m.borrow().to_string_literal()),
            Value::File(_) => write!(f, "File<handle>"),
            Value::Handle(h) => write!(f, "<{}>{:p}", h.type_tag, Rc::as_ptr(&h.payload)),
        }
    }
}
