//! genrelay - streaming generation relay worker.
//!
//! Accepts generation requests over a framed TCP protocol, runs them against
//! a loaded, blocking, non-reentrant generation engine, and streams text
//! increments back as they become available.
//!
//! # Architecture
//!
//! - [`engine`]: the blocking [`engine::GenerationEngine`] collaborator.
//! - [`bridge`]: the core. A bounded relay channel couples the producer
//!   thread to the async consumer; a cooperative cancellation signal stops
//!   the producer within one generation step of a disconnect; a fair mutex
//!   serializes engine access so at most one session runs at a time.
//! - [`server`]: length-prefixed JSON frames over TCP, request validation,
//!   and stream emission.
//! - [`prompt`], [`config`], [`telemetry`], [`shutdown`]: collaborators for
//!   prompt construction, env configuration, observability, and graceful
//!   drain.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod prompt;
pub mod server;
pub mod shutdown;
pub mod telemetry;

pub use bridge::{
    shared_engine, CancellationSignal, GenerationSession, RelayEvent, SessionOutcome,
    SessionState, SharedEngine,
};
pub use engine::{EngineError, GenerationEngine, SamplingParams};
pub use server::{Server, ServerConfig};
