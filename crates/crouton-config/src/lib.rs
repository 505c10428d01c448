//! Shared configuration for the crouton object server and its clients.
//!
//! Both peers agree on where the server socket lives, how large one frame may
//! be before a connection is considered corrupt, and how logs are
//! rendered. Values are layered by [`ortho_config`]: built-in defaults, then a
//! configuration file (`--config-path` or `CROUTON_CONFIG_PATH`), then
//! `CROUTON_*` environment variables, then command-line flags.

mod defaults;
mod logging;
mod socket;

use serde::{Deserialize, Serialize};

use ortho_config::OrthoConfig;

pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_MAX_FRAME_BYTES, DEFAULT_TCP_PORT,
    default_log_filter, default_log_filter_string, default_log_format, default_max_frame_bytes,
    default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by `croutond` and `crouton-client`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CROUTON")]
pub struct Config {
    /// Socket the server listens on and clients dial.
    #[serde(default = "defaults::default_socket_endpoint")]
    pub socket: SocketEndpoint,
    /// `tracing` filter expression, e.g. `info` or `croutond::dispatch=debug`.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log records.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Upper bound on the size of one frame.
    #[serde(default = "defaults::default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Config {
    /// Socket endpoint of the object server.
    #[must_use]
    pub fn socket(&self) -> &SocketEndpoint {
        &self.socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Frame size bound applied by both codecs.
    #[must_use]
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_tcp_port() {
        let config = Config::default();
        assert_eq!(config.socket(), &SocketEndpoint::tcp("127.0.0.1", 5000));
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert_eq!(config.max_frame_bytes(), DEFAULT_MAX_FRAME_BYTES);
    }
}
