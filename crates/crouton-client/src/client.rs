//! Connection handle shared by every proxy created through it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crouton_config::{Config, DEFAULT_MAX_FRAME_BYTES, SocketEndpoint};
use crouton_protocol::{FramedStream, InstanceId, InstanceKey, Request, Response, Value};
use tracing::{debug, warn};

use crate::transport::{self, Connection};
use crate::{CLIENT_TARGET, ClientError, Proxy, Returned};

/// A connection to a crouton server.
///
/// Cloning is cheap: clones share one socket, and requests from different
/// clones are serialised so the connection never carries more than one
/// request at a time. Every [`Proxy`] keeps its client alive.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

struct Shared {
    endpoint: String,
    stream: Mutex<Option<FramedStream<Connection>>>,
}

impl Client {
    /// Connects to the server at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Resolve`] or [`ClientError::Connect`] when the
    /// endpoint cannot be reached within the connection timeout.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, ClientError> {
        Self::connect_with_limit(endpoint, DEFAULT_MAX_FRAME_BYTES)
    }

    /// Connects using the socket and frame bound from `config`.
    ///
    /// # Errors
    ///
    /// See [`Client::connect`].
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Self::connect_with_limit(config.socket(), config.max_frame_bytes())
    }

    fn connect_with_limit(
        endpoint: &SocketEndpoint,
        max_frame_bytes: usize,
    ) -> Result<Self, ClientError> {
        let connection = transport::connect(endpoint)?;
        debug!(target: CLIENT_TARGET, %endpoint, "connected");
        Ok(Self {
            shared: Arc::new(Shared {
                endpoint: endpoint.to_string(),
                stream: Mutex::new(Some(FramedStream::new(connection, max_frame_bytes))),
            }),
        })
    }

    /// Endpoint this client dialled.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Constructs a new instance of the registered type `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when the type is unknown or its
    /// constructor fails.
    pub fn factory(
        &self,
        provider: &str,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Proxy, ClientError> {
        let response = self.request(&Request::open(provider, args, kwargs))?;
        self.expect_reference("open", response)
    }

    /// Acquires a hold on the instance the server published as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when no instance has that name.
    pub fn open_named(&self, name: &str) -> Result<Proxy, ClientError> {
        self.open_existing(name)
    }

    /// Acquires another hold on an instance by id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when the instance does not exist.
    pub fn open_id(&self, id: InstanceId) -> Result<Proxy, ClientError> {
        self.open_existing(id)
    }

    fn open_existing(&self, key: impl Into<InstanceKey>) -> Result<Proxy, ClientError> {
        let response = self.request(&Request::open_existing(key))?;
        self.expect_reference("open", response)
    }

    /// Closes the connection. The server releases every hold this
    /// connection still has; proxies created through it become inert.
    pub fn close(&self) {
        let mut slot = self.lock();
        if let Some(stream) = slot.take()
            && let Err(error) = stream.get_ref().shutdown()
        {
            debug!(target: CLIENT_TARGET, %error, "socket shutdown failed");
        }
    }

    /// Whether the connection has been closed or lost.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Sends one request and waits for its response.
    ///
    /// A transport failure marks the connection closed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] on a closed connection and
    /// [`ClientError::Codec`] when the exchange fails.
    pub fn request(&self, request: &Request) -> Result<Response, ClientError> {
        let mut slot = self.lock();
        let Some(stream) = slot.as_mut() else {
            return Err(self.closed());
        };
        let exchanged = stream.send(request).and_then(|()| stream.receive());
        match exchanged {
            Ok(Some(frame)) => Ok(Response::from_value(frame)?),
            Ok(None) => {
                *slot = None;
                Err(self.closed())
            }
            Err(error) => {
                warn!(
                    target: CLIENT_TARGET,
                    endpoint = %self.shared.endpoint,
                    %error,
                    "connection lost"
                );
                *slot = None;
                Err(ClientError::Codec(error))
            }
        }
    }

    /// Turns a response into a value or a proxy owning the returned hold.
    pub(crate) fn returned(&self, response: Response) -> Result<Returned, ClientError> {
        match response {
            Response::Value(value) => Ok(Returned::Value(value)),
            Response::Reference(id) => Ok(Returned::Proxy(Proxy::new(self.clone(), id))),
            Response::Error(message) => Err(ClientError::Remote { message }),
        }
    }

    fn expect_reference(&self, operation: &str, response: Response) -> Result<Proxy, ClientError> {
        match self.returned(response)? {
            Returned::Proxy(proxy) => Ok(proxy),
            Returned::Value(value) => Err(ClientError::InvalidResponse {
                operation: operation.to_owned(),
                response: Response::Value(value),
            }),
        }
    }

    /// Drops one hold on `id` if the connection is still usable.
    pub(crate) fn release(&self, id: InstanceId) {
        if self.is_closed() {
            return;
        }
        match self.request(&Request::close(id)) {
            Ok(Response::Error(message)) => {
                debug!(target: CLIENT_TARGET, %id, %message, "close rejected");
            }
            Ok(_) => {}
            Err(error) => debug!(target: CLIENT_TARGET, %id, %error, "close failed"),
        }
    }

    fn closed(&self) -> ClientError {
        ClientError::Closed {
            endpoint: self.shared.endpoint.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<FramedStream<Connection>>> {
        // A poisoned slot counts as a lost connection.
        match self.shared.stream.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                *guard = None;
                guard
            }
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.shared.endpoint)
            .finish_non_exhaustive()
    }
}
