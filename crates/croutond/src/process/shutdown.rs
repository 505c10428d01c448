//! Waiting for the moment the server should stop.

use std::fmt;
use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

/// Signals that end a served namespace.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Why serving stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// One of [`TERMINATION_SIGNALS`] arrived.
    Signal(i32),
    /// The embedding code asked the server to stop.
    Requested,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Signal(SIGTERM) => formatter.write_str("SIGTERM"),
            Self::Signal(SIGINT) => formatter.write_str("SIGINT"),
            Self::Signal(SIGQUIT) => formatter.write_str("SIGQUIT"),
            Self::Signal(SIGHUP) => formatter.write_str("SIGHUP"),
            Self::Signal(other) => write!(formatter, "signal {other}"),
            Self::Requested => formatter.write_str("requested"),
        }
    }
}

/// Blocks the launching thread while the server runs.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once the server should stop accepting and drain.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when the wait cannot be set up at all.
    fn wait(&self) -> Result<ShutdownCause, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Waits for the first of [`TERMINATION_SIGNALS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds a signal listener.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<ShutdownCause, ShutdownError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        debug!(target: PROCESS_TARGET, "waiting for a termination signal");
        Ok(signals
            .forever()
            .next()
            .map_or(ShutdownCause::Requested, ShutdownCause::Signal))
    }
}
