//! Shared fixtures for end-to-end tests.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crouton_client::{Client, ClientError, Value};
use crouton_config::SocketEndpoint;
use crouton_protocol::{InstanceId, InstanceKey};
use croutond::{ListenerError, Namespace, NamespaceError, RunningServer, Server};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Failures while starting a fixture server.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The built-in types could not be registered.
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    /// The listener could not be started.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// A server listening on `127.0.0.1` with an ephemeral port.
///
/// Dropping the fixture stops accepting, disconnects any clients still
/// connected and waits for their holds to be released.
#[derive(Debug)]
pub struct TestServer {
    running: Option<RunningServer>,
    endpoint: SocketEndpoint,
    namespace: Arc<Namespace>,
}

impl TestServer {
    /// Starts a server with the built-in types registered.
    ///
    /// # Errors
    ///
    /// Returns a [`FixtureError`] when registration or binding fails.
    pub fn start() -> Result<Self, FixtureError> {
        Self::start_with(Server::with_builtins()?)
    }

    /// Starts `server`, keeping any registrations already made on it.
    ///
    /// # Errors
    ///
    /// Returns a [`FixtureError`] when the listener cannot be bound.
    pub fn start_with(server: Server) -> Result<Self, FixtureError> {
        let running = server.start(&SocketEndpoint::tcp("127.0.0.1", 0))?;
        Ok(Self {
            endpoint: running.endpoint(),
            namespace: Arc::clone(running.namespace()),
            running: Some(running),
        })
    }

    /// Endpoint with the bound port filled in.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Opens a new client connection.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the connection is refused.
    pub fn connect(&self) -> Result<Client, ClientError> {
        Client::connect(&self.endpoint)
    }

    /// Total holds on `id` across every connection.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Poisoned`] when the namespace lock is
    /// poisoned.
    pub fn ref_count(&self, id: InstanceId) -> Result<u64, NamespaceError> {
        Ok(self.namespace.lock()?.ref_count(id))
    }

    /// Polls until `id` has `expected` holds or `timeout` elapses, returning
    /// whether the count was reached.
    ///
    /// Disconnect cleanup happens on the server's connection thread, so tests
    /// observe it with a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Poisoned`] when the namespace lock is
    /// poisoned.
    pub fn wait_for_ref_count(
        &self,
        id: InstanceId,
        expected: u64,
        timeout: Duration,
    ) -> Result<bool, NamespaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.ref_count(id)? == expected {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Whether `id` is still stored.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Poisoned`] when the namespace lock is
    /// poisoned.
    pub fn contains(&self, id: InstanceId) -> Result<bool, NamespaceError> {
        Ok(self.namespace.lock()?.contains(&InstanceKey::Id(id)))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown();
            let _joined = running.join();
        }
    }
}

/// The heterogeneous payload used by the list round-trip tests:
/// `[1.1, '1.1', 1, ['test', 1], {'key': 'value', 1: 1.1}, b'some_bytes', 'a_str']`.
#[must_use]
pub fn sample_values() -> Vec<Value> {
    vec![
        Value::F64(1.1),
        Value::from("1.1"),
        Value::from(1),
        Value::Array(vec![Value::from("test"), Value::from(1)]),
        Value::Map(vec![
            (Value::from("key"), Value::from("value")),
            (Value::from(1), Value::F64(1.1)),
        ]),
        Value::Binary(b"some_bytes".to_vec()),
        Value::from("a_str"),
    ]
}
