//! Graceful shutdown coordination.
//!
//! Tracks in-flight sessions with RAII guards and drains them before exit.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of a drain attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout { remaining: u32 },
}

/// Coordinates graceful shutdown across the server and its sessions.
pub struct ShutdownCoordinator {
    state: RwLock<ShutdownState>,
    in_flight: Arc<AtomicU32>,
    drained: Arc<Notify>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ShutdownState::Running),
            in_flight: Arc::new(AtomicU32::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    /// Whether new requests are still admitted.
    pub fn is_accepting(&self) -> bool {
        self.state
            .try_read()
            .map(|s| *s == ShutdownState::Running)
            .unwrap_or(false)
    }

    /// Track an in-flight request. `None` once draining has begun.
    pub fn track(&self) -> Option<InFlightGuard> {
        if !self.is_accepting() {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(InFlightGuard {
            counter: self.in_flight.clone(),
            drained: self.drained.clone(),
        })
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop admitting requests and wait for in-flight sessions to finish.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        {
            let mut state = self.state.write().await;
            *state = ShutdownState::Draining;
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for the wakeup before re-checking the count, so a
            // guard dropped in between cannot be missed.
            let wait = self.drained.notified();
            if self.in_flight_count() == 0 {
                break;
            }
            if tokio::time::timeout_at(deadline, wait).await.is_err() {
                let remaining = self.in_flight_count();
                if remaining == 0 {
                    break;
                }
                *self.state.write().await = ShutdownState::Stopped;
                return ShutdownResult::Timeout { remaining };
            }
        }

        *self.state.write().await = ShutdownState::Stopped;
        ShutdownResult::Complete
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop and wakes the drain loop.
pub struct InFlightGuard {
    counter: Arc<AtomicU32>,
    drained: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.drained.notify_waiters();
    }
}
