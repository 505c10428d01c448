use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port the server listens on.
pub const DEFAULT_TCP_PORT: u16 = 5000;

/// Default host the server binds and clients connect to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Largest frame a peer may send before the stream is dropped.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 2_147_483_647;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default upper bound on a buffered frame.
pub fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

/// Computes the default socket endpoint shared by server and clients.
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_HOST, DEFAULT_TCP_PORT)
}
