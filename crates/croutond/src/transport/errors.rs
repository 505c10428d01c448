//! Errors raised while binding an endpoint or supervising its connections.

use std::io;

use thiserror::Error;

/// Failures that keep the server from accepting on its endpoint.
///
/// Accept errors after startup are logged and retried rather than reported
/// here; a single connection failing never surfaces as a `ListenerError`.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host name resolved to nothing usable.
    #[error("cannot resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// The endpoint could not be bound or switched to polling accepts.
    #[error("cannot listen on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// A live server already answers on the Unix socket path.
    #[error("{endpoint} is already served by another process")]
    InUse { endpoint: String },
    /// The Unix socket path is taken by something that is not a socket.
    #[error("{path} exists and is not a socket")]
    NotASocket { path: String },
    /// A socket file left by an earlier server could not be checked or
    /// removed.
    #[error("cannot replace leftover socket {path}: {source}")]
    StaleSocket {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Unix domain sockets do not exist on this platform.
    #[error("unix socket endpoints are unavailable on this platform: {endpoint}")]
    UnixUnsupported { endpoint: String },
    /// The accept thread could not be started.
    #[error("cannot start the accept thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked; connection workers were still drained.
    #[error("accept thread panicked")]
    AcceptPanic,
}
