//! Generation engine interface and built-in backends.
//!
//! The engine is a blocking, non-reentrant collaborator: given a prompt and
//! sampling parameters it yields a lazy, finite sequence of text increments.
//! Serialization of concurrent access is the bridge's job, not the engine's.

mod error;
mod params;
mod scripted;
mod stub;

pub use error::EngineError;
pub use params::{SamplingParams, DEFAULT_MAX_TOKENS};
pub use scripted::{ScriptCounters, ScriptStep, ScriptedEngine};
pub use stub::StubEngine;

/// Lazy sequence of generated text increments.
///
/// Finite and non-restartable: once exhausted or failed, a new call to
/// [`GenerationEngine::stream`] is required.
pub type ChunkIter<'a> = Box<dyn Iterator<Item = Result<String, EngineError>> + 'a>;

/// A blocking token generator.
///
/// Implementations hold mutable accelerator or cache state and are not safe
/// for concurrent generations; callers must serialize access.
pub trait GenerationEngine: Send {
    /// Begin generation for one prompt.
    ///
    /// Blocks while producing; each yielded item is one non-empty text
    /// increment in generation order.
    fn stream<'a>(
        &'a mut self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<ChunkIter<'a>, EngineError>;
}
