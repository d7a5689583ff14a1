//! The wall-clock capability the `test` statement needs (spec.md §1, §5).
//!
//! Clock access is an injected capability (a boxed trait object on the
//! interpreter) rather than a hardwired syscall, the same way resource
//! tracking and output are injected rather than reached for directly inside
//! the evaluator — it keeps timing deterministic and swappable in tests.

use std::time::{Duration, Instant};

/// A source of monotonic timestamps for the `test` statement (spec.md §4.5).
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Default clock backed by [`std::time::Instant`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A deterministic test double: each call to `now()` advances by a fixed
/// step from a frozen origin, so `test` statement timing assertions are
/// reproducible in unit tests.
pub struct FrozenClock {
    origin: Instant,
    step: Duration,
    calls: std::cell::Cell<u32>,
}

impl FrozenClock {
    pub fn new(step: Duration) -> Self {
        Self { origin: Instant::now(), step, calls: std::cell::Cell::new(0) }
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> Instant {
        let n = self.calls.get();
        self.calls.set(n + 1);
        self.origin + self.step * n
    }
}
