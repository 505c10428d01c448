//! In-process server facade.

use std::net::SocketAddr;
use std::sync::Arc;

use crouton_config::{DEFAULT_MAX_FRAME_BYTES, SocketEndpoint};
use crouton_protocol::InstanceId;

use crate::dispatch::DispatchConnectionHandler;
use crate::namespace::{Namespace, NamespaceError};
use crate::object::builtins::builtin_types;
use crate::object::{Factory, SharedObject};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

/// A namespace plus the settings needed to serve it.
///
/// Types and named instances can be registered before and after
/// [`Server::start`]; registrations are visible to every connection.
///
/// # Examples
///
/// ```rust,no_run
/// use crouton_config::SocketEndpoint;
/// use croutond::Server;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::with_builtins()?;
/// let running = server.start(&SocketEndpoint::tcp("127.0.0.1", 0))?;
/// println!("listening on {:?}", running.local_addr());
/// running.shutdown();
/// running.join()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Server {
    namespace: Arc<Namespace>,
    max_frame_bytes: usize,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Builds a server with an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: Arc::new(Namespace::new()),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Builds a server with `list`, `dict`, `Counter` and `Record`
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns a [`NamespaceError`] if the namespace lock is poisoned.
    pub fn with_builtins() -> Result<Self, NamespaceError> {
        let server = Self::new();
        for (name, factory) in builtin_types() {
            server.register_type(name, factory)?;
        }
        Ok(server)
    }

    /// Sets the upper bound on the size of one request frame.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Shared namespace backing this server.
    #[must_use]
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Makes `name` constructible through `open`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::TypeConflict`] when the name is taken.
    pub fn register_type(&self, name: &str, factory: Factory) -> Result<(), NamespaceError> {
        self.namespace.register_type(name, factory)
    }

    /// Publishes `object` under `name` for the lifetime of the server.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NameConflict`] when the name is bound.
    pub fn register_instance(
        &self,
        name: &str,
        object: SharedObject,
    ) -> Result<InstanceId, NamespaceError> {
        self.namespace.register_instance(name, object)
    }

    /// Binds `endpoint` and starts accepting connections in the background.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the endpoint cannot be bound or the
    /// accept thread cannot be started.
    pub fn start(&self, endpoint: &SocketEndpoint) -> Result<RunningServer, ListenerError> {
        let listener = SocketListener::bind(endpoint)?;
        let local_addr = listener.local_addr();
        let handler = Arc::new(DispatchConnectionHandler::new(
            Arc::clone(&self.namespace),
            self.max_frame_bytes,
        ));
        let handle = listener.start(handler)?;
        Ok(RunningServer {
            handle,
            endpoint: endpoint.clone(),
            local_addr,
            namespace: Arc::clone(&self.namespace),
        })
    }
}

/// A server whose listener is accepting connections.
///
/// Dropping the value stops accepting without waiting; live connections keep
/// running until their peers leave.
pub struct RunningServer {
    handle: ListenerHandle,
    endpoint: SocketEndpoint,
    local_addr: Option<SocketAddr>,
    namespace: Arc<Namespace>,
}

impl RunningServer {
    /// Bound TCP address, useful when the configured port was `0`.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Endpoint clients should dial, with an ephemeral TCP port resolved.
    #[must_use]
    pub fn endpoint(&self) -> SocketEndpoint {
        match (&self.endpoint, self.local_addr) {
            (SocketEndpoint::Tcp { .. }, Some(addr)) => {
                SocketEndpoint::tcp(addr.ip().to_string(), addr.port())
            }
            (endpoint, _) => endpoint.clone(),
        }
    }

    /// Namespace served by this listener.
    #[must_use]
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Stops accepting new connections. Established connections keep being
    /// served until their peers disconnect or [`RunningServer::join`] is
    /// called.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Connections currently being served.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.handle.active_connections()
    }

    /// Stops accepting, disconnects every remaining client and waits until
    /// each connection has released its holds.
    ///
    /// When this returns, every instance that only those connections held
    /// has been destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::AcceptPanic`] if the accept thread panicked.
    /// Connections are drained either way.
    pub fn join(self) -> Result<(), ListenerError> {
        self.handle.join()
    }
}

impl std::fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningServer")
            .field("endpoint", &self.endpoint)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}
