//! Engine error types.

use thiserror::Error;

/// Errors raised by a generation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}
