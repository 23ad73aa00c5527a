//! The streaming generation bridge.
//!
//! Couples a blocking producer (the generation engine) to an async consumer
//! (the network writer) through a bounded relay channel, with cooperative
//! cancellation and full serialization of engine access.

mod cancel;
mod relay;
mod session;

pub use cancel::CancellationSignal;
pub use relay::{RelayChannel, RelayClosed, RelayEvent, RelaySender, DEFAULT_CHANNEL_CAPACITY};
pub use session::{
    shared_engine, GenerationSession, SessionOutcome, SessionState, SharedEngine,
};
