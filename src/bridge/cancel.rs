//! Cooperative cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-writer, many-reader cancellation flag.
///
/// Monotonic: transitions `unset -> set` at most once per session and is
/// never reset. The producer polls it before each blocking push, so the
/// worst-case latency between a disconnect and the producer stopping is one
/// generation step.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    flag: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session as abandoned. Idempotent.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        assert!(!CancellationSignal::new().is_set());
    }

    #[test]
    fn set_is_visible_to_clones() {
        let signal = CancellationSignal::new();
        let observer = signal.clone();
        signal.set();
        assert!(observer.is_set());
    }

    #[test]
    fn set_is_idempotent() {
        let signal = CancellationSignal::new();
        signal.set();
        signal.set();
        assert!(signal.is_set());
    }
}
