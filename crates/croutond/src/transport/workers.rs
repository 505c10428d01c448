//! Registry of live connection workers.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET};

/// Connection workers that have started and not yet finished.
///
/// Each entry keeps a second handle on its worker's socket, so
/// [`WorkerSet::disconnect_all`] can end every connection from outside and
/// let each worker run its own cleanup. A worker removes its entry when it
/// returns, whether or not it panicked.
#[derive(Debug, Default)]
pub(crate) struct WorkerSet {
    table: Mutex<WorkerTable>,
}

#[derive(Debug, Default)]
struct WorkerTable {
    next_id: u64,
    live: HashMap<u64, LiveWorker>,
}

#[derive(Debug)]
struct LiveWorker {
    socket: ConnectionStream,
    thread: Option<JoinHandle<()>>,
}

impl WorkerSet {
    /// Serves `stream` with `handler` on a new thread.
    ///
    /// The entry is inserted before the worker can observe the table, so a
    /// connection that ends immediately still leaves no entry behind.
    pub(crate) fn spawn(
        self: &Arc<Self>,
        stream: ConnectionStream,
        handler: Arc<dyn ConnectionHandler>,
    ) -> io::Result<()> {
        let socket = stream.try_clone()?;
        let mut table = self.table();
        let id = table.next_id;
        table.next_id = id.wrapping_add(1);
        let workers = Arc::clone(self);
        let thread = thread::Builder::new()
            .name(format!("crouton-conn-{id}"))
            .spawn(move || {
                let _finished = Finished { workers, id };
                handler.handle(stream);
            })?;
        table.live.insert(
            id,
            LiveWorker {
                socket,
                thread: Some(thread),
            },
        );
        Ok(())
    }

    /// Number of connections currently being served.
    pub(crate) fn len(&self) -> usize {
        self.table().live.len()
    }

    /// Shuts down every live socket and waits for each worker to finish.
    ///
    /// Workers see end of stream and release their holds before returning.
    /// A worker stuck inside a remote call is waited for until that call
    /// returns.
    pub(crate) fn disconnect_all(&self) {
        let threads: Vec<(u64, JoinHandle<()>)> = {
            let mut table = self.table();
            if !table.live.is_empty() {
                info!(
                    target: LISTENER_TARGET,
                    connections = table.live.len(),
                    "disconnecting live connections"
                );
            }
            table
                .live
                .iter_mut()
                .filter_map(|(id, worker)| {
                    if let Err(error) = worker.socket.shutdown() {
                        debug!(target: LISTENER_TARGET, worker = id, %error, "socket already closed");
                    }
                    worker.thread.take().map(|thread| (*id, thread))
                })
                .collect()
        };
        for (id, thread) in threads {
            if thread.join().is_err() {
                warn!(target: LISTENER_TARGET, worker = id, "connection worker panicked");
            }
        }
    }

    fn table(&self) -> MutexGuard<'_, WorkerTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drops the worker's entry when its thread finishes.
struct Finished {
    workers: Arc<WorkerSet>,
    id: u64,
}

impl Drop for Finished {
    fn drop(&mut self) {
        self.workers.table().live.remove(&self.id);
    }
}
