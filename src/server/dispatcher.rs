//! Request dispatch: validate, build the prompt, run a session, supervise it.

use std::time::Instant;

use tokio::io::AsyncWrite;

use crate::bridge::{GenerationSession, SessionOutcome, SharedEngine};
use crate::prompt::build_prompt;
use crate::telemetry;

use super::emitter::{emit_stream, send_error};
use super::protocol::{GenerateRequest, CODE_INVALID_REQUEST};

/// How a dispatched stream ended, from the connection's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Stream closed cleanly after this many chunk frames.
    Completed { chunks: usize },
    /// Stream closed with an error frame.
    Failed,
    /// Request rejected before a session was created.
    Rejected,
    /// The peer went away; the connection is dead.
    Disconnected,
}

/// Accepts generation requests and drives each one to its terminal outcome.
pub struct RequestDispatcher {
    engine: SharedEngine,
    channel_capacity: usize,
    max_frame_size: usize,
}

impl RequestDispatcher {
    pub fn new(engine: SharedEngine, channel_capacity: usize, max_frame_size: usize) -> Self {
        Self {
            engine,
            channel_capacity: channel_capacity.max(1),
            max_frame_size,
        }
    }

    /// Handle one generation request on this connection's stream.
    pub async fn dispatch<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        request: GenerateRequest,
    ) -> StreamEnd {
        telemetry::record_request();
        let request_id = request.request_id;

        if let Err(e) = request.validate() {
            tracing::warn!(request_id = request_id.0, error = %e, "rejecting invalid request");
            telemetry::record_request_failure("invalid_request");
            let _ = send_error(
                writer,
                request_id,
                CODE_INVALID_REQUEST,
                &e.to_string(),
                self.max_frame_size,
            )
            .await;
            return StreamEnd::Rejected;
        }

        let params = request.sampling_params();
        let prompt = build_prompt(request.prompt.as_deref(), &request.messages);
        tracing::debug!(
            request_id = request_id.0,
            prompt_bytes = prompt.len(),
            max_tokens = params.effective_max_tokens(),
            temperature = params.temperature,
            "starting generation session"
        );

        let start = Instant::now();
        let mut session = GenerationSession::spawn(
            self.engine.clone(),
            prompt,
            params,
            self.channel_capacity,
        );
        let end = emit_stream(writer, request_id, &mut session, self.max_frame_size).await;
        let outcome = session.join().await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match end {
            StreamEnd::Completed { chunks } => {
                telemetry::record_chunks(chunks as u64);
                telemetry::record_request_success(latency_ms);
                tracing::info!(request_id = request_id.0, chunks, latency_ms, "generation completed");
            }
            StreamEnd::Failed => {
                telemetry::record_request_failure("engine_failure");
                let reason = match &outcome {
                    SessionOutcome::Failed(reason) => reason.as_str(),
                    _ => "unknown",
                };
                tracing::error!(request_id = request_id.0, reason, "generation failed");
            }
            StreamEnd::Disconnected => {
                telemetry::record_request_cancelled();
                tracing::info!(request_id = request_id.0, "client disconnected, session cancelled");
            }
            StreamEnd::Rejected => {}
        }
        end
    }
}
