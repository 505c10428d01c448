//! Supervises server launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the server using the production collaborators.
///
/// Loads configuration, initialises telemetry, binds the configured socket
/// with the built-in types registered, and serves until a termination signal
/// arrives.
///
/// # Errors
///
/// Returns a [`LaunchError`] when any startup stage fails or the signal
/// handlers cannot be installed.
pub fn run_server() -> Result<(), LaunchError> {
    let reporter = Arc::new(StructuredHealthReporter::new());
    run_server_with(&SystemConfigLoader, reporter, &SystemShutdownSignal::new())
}

/// Runs the server with injected collaborators.
///
/// The listener is stopped, live connections are drained and
/// [`HealthReporter::shutdown`] is reported even when waiting for the
/// shutdown signal fails.
///
/// # Errors
///
/// Returns a [`LaunchError`] for the first stage that failed.
pub fn run_server_with<S>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &S,
) -> Result<(), LaunchError>
where
    S: ShutdownSignal + ?Sized,
{
    info!(target: PROCESS_TARGET, "starting server runtime");
    let daemon = bootstrap_with(loader, reporter)?;
    let running = daemon.serve()?;
    let waited = shutdown.wait();
    running.shutdown();
    if let Ok(cause) = &waited {
        info!(
            target: PROCESS_TARGET,
            %cause,
            connections = running.active_connections(),
            "stopping server"
        );
    }
    daemon.reporter().shutdown();
    running.join()?;
    waited?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
