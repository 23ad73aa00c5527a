//! Network surface: framed JSON protocol over TCP, request dispatch, and
//! stream emission.

mod connections;
mod dispatcher;
mod emitter;
pub mod framing;
pub mod protocol;
mod server;

pub use connections::{ConnectionLimiter, ConnectionPermit};
pub use dispatcher::{RequestDispatcher, StreamEnd};
pub use emitter::emit_stream;
pub use protocol::{
    decode_message, encode_message, GenerateRequest, ProtocolError, RequestId, WireMessage,
};
pub use server::{Server, ServerConfig};
