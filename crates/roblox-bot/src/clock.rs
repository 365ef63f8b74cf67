//! Clock abstraction so cooldown windows can be tested without sleeping.
//!
//! - `SystemClock`: delegates to real `tokio::time`
//! - `MockClock`: returns a controllable instant

#[cfg(test)]
use std::sync::{Arc, Mutex, PoisonError};
#[cfg(test)]
use tokio::time::Duration;
use tokio::time::Instant;

/// Source of the current instant for admission decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Live implementation: delegates to real tokio time.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Mock clock for unit tests.
/// `now()` returns a fixed instant that advances only when you call `advance()`.
#[cfg(test)]
#[derive(Clone)]
pub struct MockClock {
    current: Arc<Mutex<Instant>>,
}

#[cfg(test)]
impl MockClock {
    /// Create a new mock clock fixed at `Instant::now()` at construction time.
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advance the mock clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }
}

#[cfg(test)]
impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
