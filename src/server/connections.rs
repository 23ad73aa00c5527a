//! Connection admission with a global limit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts active connections and refuses new ones past the limit.
pub struct ConnectionLimiter {
    active: AtomicUsize,
    max_connections: usize,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            max_connections: max_connections.max(1),
        })
    }

    /// Claim a slot. The permit is owned so it can move into the
    /// connection's task; the slot frees on drop.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionPermit> {
        let mut current = self.active.load(Ordering::Relaxed);
        loop {
            if current >= self.max_connections {
                return None;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(ConnectionPermit { limiter: self.clone() }),
                Err(observed) => current = observed,
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// RAII permit; releases its slot on drop.
pub struct ConnectionPermit {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limiter.active.fetch_sub(1, Ordering::SeqCst);
    }
}
