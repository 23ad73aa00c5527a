//! Deterministic stub backend.
//!
//! Stands in for a real accelerator-bound model so the worker runs end to end
//! without model weights. Echoes the prompt's words in a cycle until the
//! token budget is spent. Real backends plug in through the same
//! [`GenerationEngine`] trait.

use super::{ChunkIter, EngineError, GenerationEngine, SamplingParams};

/// Word-echo generator bounded by `effective_max_tokens`.
pub struct StubEngine {
    model_id: String,
}

impl StubEngine {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into() }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl GenerationEngine for StubEngine {
    fn stream<'a>(
        &'a mut self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<ChunkIter<'a>, EngineError> {
        params.validate()?;
        let budget = params.effective_max_tokens() as usize;
        let mut words: Vec<String> = prompt
            .split_whitespace()
            .map(|w| format!("{w} "))
            .collect();
        if words.is_empty() {
            words.push("... ".to_string());
        }
        let iter = (0..budget).map(move |i| Ok(words[i % words.len()].clone()));
        Ok(Box::new(iter))
    }
}
