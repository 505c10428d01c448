//! Client library for the crouton object server.
//!
//! A [`Client`] holds one connection. Opening an instance, either by
//! constructing a registered type with [`Client::factory`] or by acquiring a
//! published one with [`Client::open_named`], yields a [`Proxy`]. Operations
//! on a proxy run on the server; plain results come back as values and
//! objects come back as further proxies ([`Returned`]). Dropping a proxy
//! releases its hold, and closing or losing the connection releases all of
//! them on the server side.
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//!
//! use crouton_client::{Client, Value};
//! use crouton_config::SocketEndpoint;
//!
//! # fn main() -> Result<(), crouton_client::ClientError> {
//! let client = Client::connect(&SocketEndpoint::tcp("127.0.0.1", 5000))?;
//! let counter = client.factory("Counter", Vec::new(), BTreeMap::new())?;
//! counter.invoke("increment", Vec::new(), BTreeMap::new())?;
//! assert_eq!(counter.get_attr("value")?.into_value()?, Value::from(1));
//! # Ok(())
//! # }
//! ```

mod client;
mod errors;
mod iter;
mod proxy;
mod transport;

pub use client::Client;
pub use crouton_protocol::{InstanceId, Value};
pub use errors::ClientError;
pub use iter::RemoteIter;
pub use proxy::{Proxy, Returned};

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

#[cfg(test)]
mod tests;
