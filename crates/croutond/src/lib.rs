//! The crouton object server.
//!
//! `croutond` keeps a namespace of live objects and lets clients on other
//! processes drive them over a socket. A client opens an instance of a
//! registered type (or a named instance the server published), then
//! executes operations on it by name; plain results travel back by value and
//! objects travel back as references that the client holds until it closes
//! them or disconnects. An instance is destroyed once nobody holds it.
//!
//! The pieces, from the socket inwards:
//!
//! - [`transport`](crate::transport) accepts TCP and Unix domain connections
//!   and gives each one its own thread.
//! - [`dispatch`] runs one request at a time per connection and maps every
//!   failure to an `error` response.
//! - [`namespace`] owns instances, names, types and per-connection hold
//!   counts behind a single lock.
//! - [`object`] defines the [`RemoteObject`](object::RemoteObject) trait, the
//!   special-operation catalog and the built-in types.
//!
//! [`Server`] ties these together for embedding; [`run_server`] is the
//! configured, signal-driven entry point used by the binary.

mod bootstrap;
pub mod dispatch;
mod health;
pub mod namespace;
pub mod object;
mod process;
mod server;
pub mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use dispatch::DispatchError;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use namespace::{Namespace, NamespaceError};
pub use object::{Arguments, ExecError, Factory, Outcome, RemoteObject, SharedObject};
pub use process::{
    LaunchError, ShutdownCause, ShutdownError, ShutdownSignal, SystemShutdownSignal,
    TERMINATION_SIGNALS, run_server, run_server_with,
};
pub use server::{RunningServer, Server};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
