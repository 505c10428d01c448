//! Accept loop feeding connection workers.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crouton_config::SocketEndpoint;

use super::bind::{BoundSocket, remove_socket_file};
use super::workers::WorkerSet;
use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const IDLE_POLL: Duration = Duration::from_millis(25);
const ACCEPT_RETRY: Duration = Duration::from_millis(150);

/// An endpoint bound and ready to accept.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    socket: BoundSocket,
}

impl SocketListener {
    /// Binds `endpoint`, taking over a Unix socket file that no running
    /// server answers on.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let socket = BoundSocket::bind(endpoint)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr()
    }

    /// Starts the accept thread. Every accepted connection gets its own
    /// worker thread running `handler`.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        let endpoint = self.endpoint.clone();
        if let Err(source) = self.socket.poll_accepts() {
            remove_socket_file(&endpoint);
            return Err(ListenerError::Bind {
                endpoint: endpoint.to_string(),
                source,
            });
        }
        let stop = Arc::new(AtomicBool::new(false));
        let workers = Arc::new(WorkerSet::default());
        let accept_loop = AcceptLoop {
            listener: self,
            stop: Arc::clone(&stop),
            workers: Arc::clone(&workers),
            handler,
        };
        let accept = thread::Builder::new()
            .name("crouton-accept".to_owned())
            .spawn(move || accept_loop.run())
            .map_err(|source| {
                remove_socket_file(&endpoint);
                ListenerError::Spawn { source }
            })?;
        Ok(ListenerHandle {
            stop,
            accept: Some(accept),
            workers,
        })
    }
}

/// Controls a started listener and the workers it spawned.
///
/// Dropping the handle stops accepting but leaves live connections running.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    stop: Arc<AtomicBool>,
    accept: Option<JoinHandle<()>>,
    workers: Arc<WorkerSet>,
}

impl ListenerHandle {
    /// Stops accepting. Live connections are served until their peers
    /// disconnect or [`ListenerHandle::join`] is called.
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Connections whose workers are still running.
    pub(crate) fn active_connections(&self) -> usize {
        self.workers.len()
    }

    /// Stops accepting, waits for the accept thread, then disconnects every
    /// live connection and waits until each worker has finished its
    /// cleanup.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        self.shutdown();
        let accepted = match self.accept.take() {
            Some(accept) => accept.join().map_err(|_| ListenerError::AcceptPanic),
            None => Ok(()),
        };
        self.workers.disconnect_all();
        accepted
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct AcceptLoop {
    listener: SocketListener,
    stop: Arc<AtomicBool>,
    workers: Arc<WorkerSet>,
    handler: Arc<dyn ConnectionHandler>,
}

impl AcceptLoop {
    fn run(self) {
        let endpoint = &self.listener.endpoint;
        info!(target: LISTENER_TARGET, %endpoint, "accepting connections");
        let mut failing = None::<io::ErrorKind>;
        while !self.stop.load(Ordering::SeqCst) {
            match self.listener.socket.accept() {
                Ok(Some(stream)) => {
                    failing = None;
                    if let Err(error) = self.workers.spawn(stream, Arc::clone(&self.handler)) {
                        warn!(
                            target: LISTENER_TARGET,
                            %error,
                            "connection dropped, worker did not start"
                        );
                    }
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    // Log each run of identical failures once.
                    if failing.replace(error.kind()) != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, %error, "accept failed");
                    }
                    thread::sleep(ACCEPT_RETRY);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            %endpoint,
            live = self.workers.len(),
            "stopped accepting connections"
        );
        remove_socket_file(endpoint);
    }
}
