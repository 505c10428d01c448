//! Request dispatch for client connections.
//!
//! Each accepted connection gets a [`ConnectionWorker`] that reads one
//! MessagePack request at a time, applies it to the shared
//! [`Namespace`](crate::namespace::Namespace), and writes exactly one
//! response before reading the next request.
//!
//! ## Actions
//!
//! - `open` with a `provider` constructs a registered type; with an
//!   `instance` it acquires another hold on an existing instance. Both reply
//!   with a `reference`.
//! - `close` drops one of the connection's holds and replies `null`.
//! - `execute` runs a catalog operation or named method. Plain results come
//!   back as a `value`; objects are registered and come back as a
//!   `reference`.
//!
//! Any failure while handling a request is answered with an `error`
//! response and the connection stays open. A transport failure ends the
//! connection, after which all of its holds are released.

mod acquisitions;
mod errors;
mod handler;
#[cfg(test)]
mod tests;
mod worker;

pub use self::errors::DispatchError;
pub(crate) use self::handler::DispatchConnectionHandler;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
