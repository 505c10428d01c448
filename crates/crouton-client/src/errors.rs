//! Error types surfaced by the client library.

use std::io;

use crouton_protocol::{CodecError, InstanceId, MessageError, Response};
use thiserror::Error;

/// Errors returned by [`Client`](crate::Client) and [`Proxy`](crate::Proxy)
/// operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an `error` response.
    #[error("remote error: {message}")]
    Remote {
        /// Message produced by the server.
        message: String,
    },
    /// The endpoint address could not be resolved.
    #[error("failed to resolve server address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being dialled.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Connecting to the server failed.
    #[error("failed to connect to server at {endpoint}: {source}")]
    Connect {
        /// Endpoint being dialled.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// This platform has no Unix domain sockets.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    /// The connection failed while exchanging a frame. The connection is
    /// unusable afterwards.
    #[error("connection failed: {0}")]
    Codec(#[from] CodecError),
    /// A frame arrived that is not a response.
    #[error("malformed response: {0}")]
    Message(#[from] MessageError),
    /// The server replied with a response of the wrong kind.
    #[error("unexpected response to {operation}: {response:?}")]
    InvalidResponse {
        /// Operation that was answered.
        operation: String,
        /// The response as received.
        response: Response,
    },
    /// A plain value had an unexpected type.
    #[error("expected {expected} from instance {id}, got {value}")]
    UnexpectedValue {
        /// Instance that produced the value.
        id: InstanceId,
        /// Description of the expected type.
        expected: &'static str,
        /// The value as received.
        value: crouton_protocol::Value,
    },
    /// The connection was closed locally or by the server.
    #[error("connection to {endpoint} is closed")]
    Closed {
        /// Endpoint of the closed connection.
        endpoint: String,
    },
}

impl ClientError {
    /// Message of a [`ClientError::Remote`] error.
    #[must_use]
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Remote { message } => Some(message),
            _ => None,
        }
    }

    /// Whether the connection can no longer carry requests.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::Closed { .. })
    }
}
