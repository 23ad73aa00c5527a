//! Bounded hand-off channel between producer thread and stream consumer.

use tokio::sync::mpsc;

/// Default number of in-flight chunks before the producer blocks.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// One event flowing through the relay.
///
/// A session pushes any number of `Chunk`s followed by exactly one terminal
/// event (`Done` or `Error`), always last. Cancellation surfaces as channel
/// closure, not as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// One non-empty text increment, in generation order.
    Chunk(String),
    /// Generation exhausted its sequence or token budget.
    Done,
    /// The engine failed; carries its message verbatim.
    Error(String),
}

/// The consumer is gone; no further events can be delivered.
#[derive(Debug)]
pub struct RelayClosed;

impl std::fmt::Display for RelayClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay channel closed")
    }
}

impl std::error::Error for RelayClosed {}

/// Consumer half of the relay.
pub struct RelayChannel {
    receiver: mpsc::Receiver<RelayEvent>,
}

impl RelayChannel {
    /// Create a bounded relay with its producer half.
    pub fn new(capacity: usize) -> (RelaySender, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (RelaySender { sender }, Self { receiver })
    }

    /// Receive the next event. `None` once the producer side is gone.
    pub async fn next(&mut self) -> Option<RelayEvent> {
        self.receiver.recv().await
    }
}

/// Producer half of the relay. One producer per session, ever.
#[derive(Clone)]
pub struct RelaySender {
    sender: mpsc::Sender<RelayEvent>,
}

impl RelaySender {
    /// Push from the producer thread, blocking while the channel is full.
    ///
    /// This is the backpressure point: a slow consumer parks the producer
    /// here instead of letting memory grow. Must not be called from an async
    /// context.
    pub fn push_blocking(&self, event: RelayEvent) -> Result<(), RelayClosed> {
        self.sender.blocking_send(event).map_err(|_| RelayClosed)
    }

    /// Async push, used only off the producer thread (panic recovery path).
    pub async fn push(&self, event: RelayEvent) -> Result<(), RelayClosed> {
        self.sender.send(event).await.map_err(|_| RelayClosed)
    }
}
