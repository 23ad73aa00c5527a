//! Sampling parameters for a generation request.

use serde::{Deserialize, Serialize};

use super::EngineError;

/// Substituted when a request leaves `max_tokens` unset or zero.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// Parameters controlling one generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature. `0.0` disables sampling (greedy decoding).
    pub temperature: f32,
    /// Token budget. `0` means "use the default" (256), not "produce nothing".
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl SamplingParams {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self { temperature, max_tokens }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(EngineError::InvalidParams(
                "temperature must be a finite value >= 0".into(),
            ));
        }
        Ok(())
    }

    /// Token budget with the zero-means-default substitution applied.
    pub fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens == 0 {
            DEFAULT_MAX_TOKENS
        } else {
            self.max_tokens
        }
    }

    /// Whether a sampler should be constructed at all.
    pub fn sampling_enabled(&self) -> bool {
        self.temperature > 0.0
    }
}
