//! TCP accept loop and per-connection handling.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::bridge::SharedEngine;
use crate::shutdown::ShutdownCoordinator;

use super::connections::ConnectionLimiter;
use super::dispatcher::{RequestDispatcher, StreamEnd};
use super::emitter::send_error;
use super::framing::{read_frame, FrameError};
use super::protocol::{
    decode_message, WireMessage, CODE_INVALID_REQUEST, CODE_UNAVAILABLE, DEFAULT_MAX_FRAME_SIZE,
};

/// Server tuning knobs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub channel_capacity: usize,
    pub max_frame_size: usize,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: crate::bridge::DEFAULT_CHANNEL_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: 64,
        }
    }
}

/// The worker's network front end.
pub struct Server {
    dispatcher: Arc<RequestDispatcher>,
    limiter: Arc<ConnectionLimiter>,
    coordinator: Arc<ShutdownCoordinator>,
    max_frame_size: usize,
}

impl Server {
    pub fn new(engine: SharedEngine, config: ServerConfig) -> Self {
        Self {
            dispatcher: Arc::new(RequestDispatcher::new(
                engine,
                config.channel_capacity,
                config.max_frame_size,
            )),
            limiter: ConnectionLimiter::new(config.max_connections),
            coordinator: Arc::new(ShutdownCoordinator::new()),
            max_frame_size: config.max_frame_size,
        }
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.coordinator.clone()
    }

    /// Accept connections until the shutdown token fires.
    pub async fn run(&self, listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "worker listening");
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!("server: shutdown signal received");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let Some(permit) = self.limiter.try_acquire() else {
                        tracing::warn!(%peer, "connection limit reached, refusing");
                        continue;
                    };
                    tracing::debug!(%peer, "connection accepted");
                    let dispatcher = self.dispatcher.clone();
                    let coordinator = self.coordinator.clone();
                    let max_frame_size = self.max_frame_size;
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) =
                            handle_connection(stream, dispatcher, coordinator, max_frame_size).await
                        {
                            tracing::debug!(%peer, error = %e, "connection ended with error");
                        }
                    });
                }
            }
        }
        Ok(())
    }
}

/// One request at a time per connection: a streaming response owns the
/// stream until its terminal frame.
async fn handle_connection(
    mut stream: TcpStream,
    dispatcher: Arc<RequestDispatcher>,
    coordinator: Arc<ShutdownCoordinator>,
    max_frame_size: usize,
) -> Result<(), FrameError> {
    loop {
        let Some(frame) = read_frame(&mut stream, max_frame_size).await? else {
            return Ok(());
        };
        let message = match decode_message(&frame, max_frame_size) {
            Ok(message) => message,
            Err(e) => {
                send_error(
                    &mut stream,
                    super::protocol::RequestId(0),
                    CODE_INVALID_REQUEST,
                    &e.to_string(),
                    max_frame_size,
                )
                .await?;
                continue;
            }
        };
        match message {
            WireMessage::Generate(request) => {
                let request_id = request.request_id;
                let Some(_in_flight) = coordinator.track() else {
                    send_error(
                        &mut stream,
                        request_id,
                        CODE_UNAVAILABLE,
                        "worker is shutting down",
                        max_frame_size,
                    )
                    .await?;
                    return Ok(());
                };
                if dispatcher.dispatch(&mut stream, request).await == StreamEnd::Disconnected {
                    return Ok(());
                }
            }
            WireMessage::Chunk { request_id, .. }
            | WireMessage::Done { request_id }
            | WireMessage::Error { request_id, .. } => {
                send_error(
                    &mut stream,
                    request_id,
                    CODE_INVALID_REQUEST,
                    "unexpected message type",
                    max_frame_size,
                )
                .await?;
            }
        }
    }
}
