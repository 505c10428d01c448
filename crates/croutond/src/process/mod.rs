//! Process lifecycle: launch sequencing and shutdown signalling.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{run_server, run_server_with};
pub use shutdown::{
    ShutdownCause, ShutdownError, ShutdownSignal, SystemShutdownSignal, TERMINATION_SIGNALS,
};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
