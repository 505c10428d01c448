//! Test harness utilities for the server behavioural suite.

mod config_loader;
mod reporter;
mod world;

pub use config_loader::{EphemeralTcpConfigLoader, FailingConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{RefcountWorld, world};
