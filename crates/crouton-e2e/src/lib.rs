//! End-to-end tests for crouton components.
//!
//! The tests in this crate start a real server in-process on an ephemeral
//! TCP port and drive it through [`crouton_client`], so every exchange
//! crosses the wire codec, the dispatcher and the namespace.
//!
//! - [`fixtures`]: server startup and sample payloads shared by the tests

pub mod fixtures;

pub use fixtures::{FixtureError, TestServer};
