//! The scoped namespace of variables and functions (spec.md §3, §4.2).
//!
//! A plain `Vec<Namespace>` call stack with index 0 always the global frame,
//! rather than raw pointers shared between frames — index-based access to a
//! central stack keeps every frame's lifetime tied to the `Namespaces` owner.
//! `previous`/`next` links from spec.md §3 are the adjacent `Vec` entries;
//! `Scope::Stack` walks the stack from the top down to (and including) index
//! 0, which doubles as `Scope::Global`.
//!
//! Per spec.md's Non-goal "closures over lexical environments (functions
//! capture only the global namespace)": function invocation pushes a new
//! frame on top of this same stack, so `Scope::Stack` lookups inside a
//! function body still see every live caller frame (dynamic scoping through
//! the call stack), but a function never captures a snapshot of its
//! *defining* environment the way a lexical closure would.

use std::rc::Rc;

use crate::constants;
use crate::function::Function;
use crate::value::Value;

const BUCKETS: usize = 64;

/// `NamespaceSlot(name) = (sum of bytes) mod 64` (spec.md §4.2).
fn bucket_of(name: &str) -> usize {
    name.bytes().fold(0usize, |acc, b| acc.wrapping_add(b as usize)) % BUCKETS
}

#[derive(Debug, Clone)]
struct Variable {
    name: Rc<str>,
    value: Value,
}

/// Search policy for name resolution (spec.md §3, "Scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Touches only the current frame.
    Local,
    /// Walks `previous` links (here: the frame stack, top to bottom) until found.
    Stack,
    /// Jumps to the root frame.
    Global,
}

/// One call frame: a 64-bucket variable table and a 64-bucket function table
/// (spec.md §3, "Namespace").
#[derive(Debug)]
pub struct Namespace {
    variables: Vec<Vec<Variable>>,
    functions: Vec<Vec<Rc<Function>>>,
}

impl Namespace {
    fn new() -> Self {
        Self {
            variables: (0..BUCKETS).map(|_| Vec::new()).collect(),
            functions: (0..BUCKETS).map(|_| Vec::new()).collect(),
        }
    }

    fn var_bucket(&self, name: &str) -> &Vec<Variable> {
        &self.variables[bucket_of(name)]
    }

    fn var_bucket_mut(&mut self, name: &str) -> &mut Vec<Variable> {
        let b = bucket_of(name);
        &mut self.variables[b]
    }

    fn get_local(&self, name: &str) -> Option<&Value> {
        self.var_bucket(name).iter().find(|v| &*v.name == name).map(|v| &v.value)
    }

    fn has_local(&self, name: &str) -> bool {
        self.get_local(name).is_some()
    }

    /// Overwrite in place, or append new (spec.md §4.2, `Set` at `Local`).
    fn set_local(&mut self, name: &str, value: Value) {
        let bucket = self.var_bucket_mut(name);
        match bucket.iter_mut().find(|v| &*v.name == name) {
            Some(v) => v.value = value,
            None => bucket.push(Variable { name: Rc::from(name), value }),
        }
    }

    fn unset_local(&mut self, name: &str) -> bool {
        let bucket = self.var_bucket_mut(name);
        let before = bucket.len();
        bucket.retain(|v| &*v.name != name);
        bucket.len() != before
    }

    fn func_bucket(&self, name: &str) -> &Vec<Rc<Function>> {
        &self.functions[bucket_of(name)]
    }

    fn func_bucket_mut(&mut self, name: &str) -> &mut Vec<Rc<Function>> {
        let b = bucket_of(name);
        &mut self.functions[b]
    }

    fn get_function_local(&self, name: &str) -> Option<Rc<Function>> {
        self.func_bucket(name).iter().find(|f| &*f.name == name).cloned()
    }

    fn set_function_local(&mut self, f: Rc<Function>) {
        let bucket = self.func_bucket_mut(&f.name);
        match bucket.iter_mut().find(|existing| existing.name == f.name) {
            Some(slot) => *slot = f,
            None => bucket.push(f),
        }
    }

    fn unset_function_local(&mut self, name: &str) -> bool {
        let bucket = self.func_bucket_mut(name);
        let before = bucket.len();
        bucket.retain(|f| &*f.name != name);
        bucket.len() != before
    }
}

/// The call-stack chain of [`Namespace`] frames, index 0 always global
/// (spec.md §3, §4.2).
#[derive(Debug)]
pub struct Namespaces {
    frames: Vec<Namespace>,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespaces {
    pub fn new() -> Self {
        Self { frames: vec![Namespace::new()] }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Namespace::new());
    }

    pub fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the global frame");
        self.frames.pop();
    }

    fn current(&self) -> &Namespace {
        self.frames.last().expect("namespace stack is never empty")
    }

    fn current_mut(&mut self) -> &mut Namespace {
        self.frames.last_mut().expect("namespace stack is never empty")
    }

    fn global(&self) -> &Namespace {
        &self.frames[0]
    }

    fn global_mut(&mut self) -> &mut Namespace {
        &mut self.frames[0]
    }

    /// `Get(ns, name, scope)` (spec.md §4.2). Falls back to the constants
    /// table, then `Unknown`, on total lookup failure.
    pub fn get(&self, name: &str, scope: Scope) -> Value {
        let found = match scope {
            Scope::Local => self.current().get_local(name).cloned(),
            Scope::Global => self.global().get_local(name).cloned(),
            Scope::Stack => self.frames.iter().rev().find_map(|f| f.get_local(name).cloned()),
        };
        found.or_else(|| constants::constant_value(name)).unwrap_or(Value::Unknown)
    }

    /// True if `name` resolves to a bound variable anywhere reachable under
    /// `scope`, used by the scanner's late-binding classification
    /// (spec.md §4.1).
    pub fn is_bound_variable(&self, name: &str) -> bool {
        self.frames.iter().rev().any(|f| f.has_local(name)) || constants::is_constant_name(name)
    }

    /// `Set(ns, name, value, scope)` (spec.md §4.2).
    ///
    /// Local: overwrite-or-append in the current frame. Stack: overwrite
    /// wherever found on the chain, else create in the global frame ("deepest
    /// (global-bottom) frame" per spec.md). Global: create/overwrite at the
    /// root. A no-op when the incoming payload is physically identical to
    /// the variable's current value (spec.md §4.2).
    pub fn set(&mut self, name: &str, value: Value, scope: Scope) {
        match scope {
            Scope::Local => {
                if let Some(existing) = self.current().get_local(name) {
                    if existing.same_payload(&value) {
                        return;
                    }
                }
                self.current_mut().set_local(name, value);
            }
            Scope::Global => {
                if let Some(existing) = self.global().get_local(name) {
                    if existing.same_payload(&value) {
                        return;
                    }
                }
                self.global_mut().set_local(name, value);
            }
            Scope::Stack => {
                for f in self.frames.iter_mut().rev() {
                    if f.has_local(name) {
                        if f.get_local(name).unwrap().same_payload(&value) {
                            return;
                        }
                        f.set_local(name, value);
                        return;
                    }
                }
                self.global_mut().set_local(name, value);
            }
        }
    }

    /// `Unset(ns, name, scope)`.
    pub fn unset(&mut self, name: &str, scope: Scope) -> bool {
        match scope {
            Scope::Local => self.current_mut().unset_local(name),
            Scope::Global => self.global_mut().unset_local(name),
            Scope::Stack => {
                for f in self.frames.iter_mut().rev() {
                    if f.unset_local(name) {
                        return true;
                    }
                }
                false
            }
        }
    }

    /// `SearchFunction`: walks the stack from the current frame to global
    /// (spec.md §4.2).
    pub fn lookup_function(&self, name: &str) -> Option<Rc<Function>> {
        self.frames.iter().rev().find_map(|f| f.get_function_local(name))
    }

    pub fn is_bound_function(&self, name: &str) -> bool {
        self.lookup_function(name).is_some()
    }

    /// Defines (or overwrites) a script function in the current frame.
    pub fn define_function(&mut self, f: Rc<Function>) {
        self.current_mut().set_function_local(f);
    }

    /// Removes a function from wherever it is found on the chain (used by
    /// `function name() = NULL` per spec.md §4.4).
    pub fn unset_function(&mut self, name: &str) -> bool {
        for f in self.frames.iter_mut().rev() {
            if f.unset_function_local(name) {
                return true;
            }
        }
        false
    }
}
