//! Session lifecycle: one generation request from acceptance to terminal event.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::engine::{GenerationEngine, SamplingParams};

use super::{CancellationSignal, RelayChannel, RelayEvent, RelaySender};

/// The engine behind its mutual-exclusion guard.
///
/// The engine holds mutable, non-reentrant accelerator state, so at most one
/// session may run against it at a time. tokio's mutex is fair: concurrent
/// sessions queue in arrival order. The owned guard travels into the
/// producer's blocking task and is dropped on every exit path, including
/// failure, cancellation, and panic.
pub type SharedEngine = Arc<Mutex<Box<dyn GenerationEngine>>>;

/// Wrap an engine for shared, serialized access.
pub fn shared_engine<E: GenerationEngine + 'static>(engine: E) -> SharedEngine {
    Arc::new(Mutex::new(Box::new(engine)))
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Failed,
            _ => Self::Cancelled,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 3,
            Self::Cancelled => 4,
        }
    }
}

/// Terminal outcome of a session. Exactly one per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The sequence exhausted normally or hit the token budget.
    Completed { chunks: usize },
    /// The engine raised an error; the reason is forwarded verbatim.
    Failed(String),
    /// The consumer abandoned the session before natural completion.
    Cancelled,
}

impl SessionOutcome {
    fn state(&self) -> SessionState {
        match self {
            Self::Completed { .. } => SessionState::Completed,
            Self::Failed(_) => SessionState::Failed,
            Self::Cancelled => SessionState::Cancelled,
        }
    }
}

#[derive(Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::Pending.as_u8())))
    }

    fn set(&self, state: SessionState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }
}

/// One in-flight generation: owns the relay consumer half, the cancellation
/// signal, and the supervising task.
pub struct GenerationSession {
    channel: RelayChannel,
    cancel: CancellationSignal,
    state: StateCell,
    supervisor: JoinHandle<SessionOutcome>,
}

impl GenerationSession {
    /// Start a session. Queues for exclusive engine access, then runs the
    /// blocking producer on a dedicated worker thread.
    pub fn spawn(
        engine: SharedEngine,
        prompt: String,
        params: SamplingParams,
        capacity: usize,
    ) -> Self {
        let (tx, channel) = RelayChannel::new(capacity);
        let cancel = CancellationSignal::new();
        let state = StateCell::new();
        let supervisor = tokio::spawn(supervise(
            engine,
            prompt,
            params,
            tx,
            cancel.clone(),
            state.clone(),
        ));
        Self { channel, cancel, state, supervisor }
    }

    /// Receive the next relay event. `None` means the producer is gone;
    /// with the signal set that is a cancelled session, otherwise the
    /// producer died without a terminal event.
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        self.channel.next().await
    }

    /// Abandon the session. The producer observes this before its next push.
    pub fn cancel(&self) {
        self.cancel.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Drop the consumer half and wait for the terminal outcome.
    ///
    /// Dropping the receiver unblocks a producer parked in a full channel;
    /// joining before the terminal event therefore resolves as `Cancelled`.
    pub async fn join(self) -> SessionOutcome {
        let GenerationSession { channel, supervisor, .. } = self;
        drop(channel);
        match supervisor.await {
            Ok(outcome) => outcome,
            Err(e) => SessionOutcome::Failed(format!("session supervisor failed: {e}")),
        }
    }
}

async fn supervise(
    engine: SharedEngine,
    prompt: String,
    params: SamplingParams,
    tx: RelaySender,
    cancel: CancellationSignal,
    state: StateCell,
) -> SessionOutcome {
    // Pending -> Running happens only once the guard is held.
    let guard = engine.lock_owned().await;
    if cancel.is_set() {
        state.set(SessionState::Cancelled);
        return SessionOutcome::Cancelled;
    }
    state.set(SessionState::Running);

    let worker_tx = tx.clone();
    let worker_cancel = cancel.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut guard = guard;
        let end = run_producer(&mut **guard, &prompt, &params, &worker_cancel, &worker_tx);
        match &end {
            ProducerEnd::Completed(_) => {
                let _ = worker_tx.push_blocking(RelayEvent::Done);
            }
            ProducerEnd::Failed(reason) => {
                let _ = worker_tx.push_blocking(RelayEvent::Error(reason.clone()));
            }
            // Cancellation surfaces as channel closure, never as an event.
            ProducerEnd::Cancelled => {}
        }
        end
    })
    .await;

    let outcome = match result {
        Ok(ProducerEnd::Completed(chunks)) => SessionOutcome::Completed { chunks },
        Ok(ProducerEnd::Failed(reason)) => SessionOutcome::Failed(reason),
        Ok(ProducerEnd::Cancelled) => SessionOutcome::Cancelled,
        Err(join_err) => {
            // A panic must never leave the consumer blocked forever: the
            // worker's sender died with the thread, so surface the failure
            // through the supervisor's clone.
            let reason = format!("generation worker panicked: {join_err}");
            let _ = tx.push(RelayEvent::Error(reason.clone())).await;
            SessionOutcome::Failed(reason)
        }
    };
    state.set(outcome.state());
    outcome
}

enum ProducerEnd {
    Completed(usize),
    Failed(String),
    Cancelled,
}

fn run_producer(
    engine: &mut dyn GenerationEngine,
    prompt: &str,
    params: &SamplingParams,
    cancel: &CancellationSignal,
    tx: &RelaySender,
) -> ProducerEnd {
    let iter = match engine.stream(prompt, params) {
        Ok(iter) => iter,
        Err(e) => return ProducerEnd::Failed(e.to_string()),
    };
    let mut chunks = 0usize;
    for item in iter {
        let text = match item {
            Ok(text) => text,
            Err(e) => return ProducerEnd::Failed(e.to_string()),
        };
        // Re-checked before every enqueue attempt: bounds disconnect-to-stop
        // latency at one generation step.
        if cancel.is_set() {
            return ProducerEnd::Cancelled;
        }
        if tx.push_blocking(RelayEvent::Chunk(text)).is_err() {
            return ProducerEnd::Cancelled;
        }
        chunks += 1;
    }
    ProducerEnd::Completed(chunks)
}
