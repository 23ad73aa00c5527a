//! Stream emission: drains a session's relay channel onto the wire.

use tokio::io::AsyncWrite;

use crate::bridge::{GenerationSession, RelayEvent};

use super::dispatcher::StreamEnd;
use super::framing::write_frame;
use super::protocol::{encode_message, RequestId, WireMessage, CODE_ENGINE_FAILURE};

/// Forward relay events to the client until the session reaches a terminal
/// event or the client goes away.
///
/// Each chunk becomes exactly one frame, in relay order. A failed write means
/// the peer is gone: the cancellation signal is set (the producer observes it
/// within one generation step), nothing further is emitted, and no error is
/// reported anywhere — a departing client is an expected outcome.
pub async fn emit_stream<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request_id: RequestId,
    session: &mut GenerationSession,
    max_frame_size: usize,
) -> StreamEnd {
    let mut chunks = 0usize;
    loop {
        match session.next_event().await {
            Some(RelayEvent::Chunk(text)) => {
                let message = WireMessage::Chunk { request_id, text };
                let frame = match encode_message(&message, max_frame_size) {
                    Ok(frame) => frame,
                    Err(e) => {
                        session.cancel();
                        let _ = send_error(
                            writer,
                            request_id,
                            CODE_ENGINE_FAILURE,
                            &e.to_string(),
                            max_frame_size,
                        )
                        .await;
                        return StreamEnd::Failed;
                    }
                };
                if write_frame(writer, &frame).await.is_err() {
                    session.cancel();
                    return StreamEnd::Disconnected;
                }
                chunks += 1;
            }
            Some(RelayEvent::Done) => {
                let message = WireMessage::Done { request_id };
                if let Ok(frame) = encode_message(&message, max_frame_size) {
                    let _ = write_frame(writer, &frame).await;
                }
                return StreamEnd::Completed { chunks };
            }
            Some(RelayEvent::Error(reason)) => {
                // Engine failures travel to the caller verbatim.
                let _ = send_error(
                    writer,
                    request_id,
                    CODE_ENGINE_FAILURE,
                    &reason,
                    max_frame_size,
                )
                .await;
                return StreamEnd::Failed;
            }
            None => {
                if session.is_cancelled() {
                    return StreamEnd::Disconnected;
                }
                // Producer vanished without a terminal event.
                let _ = send_error(
                    writer,
                    request_id,
                    CODE_ENGINE_FAILURE,
                    "generation worker terminated unexpectedly",
                    max_frame_size,
                )
                .await;
                return StreamEnd::Failed;
            }
        }
    }
}

/// Write a terminal error frame. Best effort: the peer may already be gone.
pub(crate) async fn send_error<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request_id: RequestId,
    code: u32,
    message: &str,
    max_frame_size: usize,
) -> std::io::Result<()> {
    let wire = WireMessage::Error {
        request_id,
        code,
        message: message.to_string(),
    };
    match encode_message(&wire, max_frame_size) {
        Ok(frame) => write_frame(writer, &frame).await,
        Err(_) => Ok(()),
    }
}
