//! Socket listener for the server's TCP and Unix domain endpoints.
//!
//! The listener accepts connections on a background thread and hands every
//! accepted stream to a [`ConnectionHandler`] on a worker thread of its own,
//! so connections are served in parallel while each one stays strictly
//! serial. Live workers are tracked until they finish, which lets shutdown
//! end every connection and wait for its cleanup.

mod bind;
mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;
mod workers;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
