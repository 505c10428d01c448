//! Connection handler that runs a [`ConnectionWorker`] per connection.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::namespace::Namespace;
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::worker::ConnectionWorker;

/// Serves accepted connections against one shared namespace.
///
/// When a connection ends, for any reason, its socket is shut down first and
/// then every hold it still has is released before the thread exits.
#[derive(Debug)]
pub(crate) struct DispatchConnectionHandler {
    namespace: Arc<Namespace>,
    max_frame_bytes: usize,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(namespace: Arc<Namespace>, max_frame_bytes: usize) -> Self {
        Self {
            namespace,
            max_frame_bytes,
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let peer = stream.peer();
        let mut worker = ConnectionWorker::new(&self.namespace, stream, self.max_frame_bytes);
        let owner = worker.acquisitions().owner();
        info!(target: DISPATCH_TARGET, %peer, %owner, "connection accepted");

        match worker.run() {
            Ok(()) => debug!(target: DISPATCH_TARGET, %owner, "peer closed the connection"),
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                %owner,
                %error,
                "connection failed"
            ),
        }

        let (stream, acquisitions) = worker.into_parts();
        if let Err(error) = stream.shutdown() {
            debug!(target: DISPATCH_TARGET, %owner, %error, "socket shutdown failed");
        }
        drop(stream);
        let summary = acquisitions.release();
        info!(
            target: DISPATCH_TARGET,
            %peer,
            %owner,
            released = summary.released,
            destroyed = summary.destroyed,
            "connection closed"
        );
    }
}
