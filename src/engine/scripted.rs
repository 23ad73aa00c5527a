//! Scripted backend for tests and failure injection.
//!
//! Replays a fixed sequence of chunk/failure steps per generation, with an
//! optional per-step delay to simulate compute-bound decoding. Shared
//! counters expose how far the engine actually got, which is what the
//! cancellation-latency and mutual-exclusion tests measure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ChunkIter, EngineError, GenerationEngine, SamplingParams};

/// One step of a scripted generation.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield one text increment.
    Chunk(String),
    /// Raise an engine failure with this message and stop.
    Fail(String),
}

/// Observation counters shared with the test harness.
#[derive(Debug, Clone, Default)]
pub struct ScriptCounters {
    /// Chunks yielded across all generations.
    pub produced: Arc<AtomicUsize>,
    /// Generations currently between `stream()` and iterator drop.
    pub in_flight: Arc<AtomicUsize>,
    /// High-water mark of `in_flight`.
    pub max_in_flight: Arc<AtomicUsize>,
}

impl ScriptCounters {
    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Engine that replays the same script on every `stream()` call.
pub struct ScriptedEngine {
    script: Vec<ScriptStep>,
    step_delay: Duration,
    counters: ScriptCounters,
}

impl ScriptedEngine {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            step_delay: Duration::ZERO,
            counters: ScriptCounters::default(),
        }
    }

    /// Script of `count` chunks named `c0..cN`.
    pub fn chunks(count: usize) -> Self {
        Self::new((0..count).map(|i| ScriptStep::Chunk(format!("c{i}"))).collect())
    }

    /// Sleep this long before each step, simulating decode latency.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn counters(&self) -> ScriptCounters {
        self.counters.clone()
    }
}

impl GenerationEngine for ScriptedEngine {
    fn stream<'a>(
        &'a mut self,
        _prompt: &str,
        params: &SamplingParams,
    ) -> Result<ChunkIter<'a>, EngineError> {
        params.validate()?;
        let entered = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(entered, Ordering::SeqCst);
        Ok(Box::new(ScriptIter {
            steps: self.script.clone().into_iter(),
            step_delay: self.step_delay,
            counters: self.counters.clone(),
            failed: false,
        }))
    }
}

struct ScriptIter {
    steps: std::vec::IntoIter<ScriptStep>,
    step_delay: Duration,
    counters: ScriptCounters,
    failed: bool,
}

impl Iterator for ScriptIter {
    type Item = Result<String, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let step = self.steps.next()?;
        if !self.step_delay.is_zero() {
            std::thread::sleep(self.step_delay);
        }
        match step {
            ScriptStep::Chunk(text) => {
                self.counters.produced.fetch_add(1, Ordering::SeqCst);
                Some(Ok(text))
            }
            ScriptStep::Fail(message) => {
                self.failed = true;
                Some(Err(EngineError::GenerationFailed(message)))
            }
        }
    }
}

impl Drop for ScriptIter {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
