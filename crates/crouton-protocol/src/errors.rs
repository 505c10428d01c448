//! Error types for framing and message decoding.

use std::io;

use thiserror::Error;

/// Transport-level failures. Any of these leaves the connection unusable.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Reading from or writing to the socket failed.
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The buffered bytes are not a valid MessagePack value.
    #[error("malformed frame: {0}")]
    Decode(#[from] rmpv::decode::Error),
    /// A MessagePack header could not be read while finding the frame end.
    #[error("malformed frame header: {0}")]
    Header(#[from] rmp::decode::ValueReadError),
    /// A message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// The frame at the head of the stream needs more than the configured
    /// bound.
    #[error("frame of at least {buffered} bytes exceeds the {max_bytes} byte limit")]
    FrameTooLarge {
        /// Bytes the frame is known to need.
        buffered: usize,
        /// Configured limit.
        max_bytes: usize,
    },
    /// The peer closed the stream in the middle of a frame.
    #[error("stream ended with {buffered} bytes of an incomplete frame")]
    Truncated {
        /// Bytes left in the decoder.
        buffered: usize,
    },
}

/// A complete frame that does not describe a valid message.
///
/// The stream position is intact, so a server answers these with an error
/// response and keeps the connection open.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The value does not have the expected message shape.
    #[error("invalid message: {0}")]
    Shape(#[from] rmpv::ext::Error),
    /// The request action is not one of `open`, `close`, `execute`.
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}
