//! Test helpers for the transport module.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::{ConnectionHandler, ConnectionStream};

/// Keeps each connection open until the peer hangs up, the way a connection
/// worker does, and counts connections as they start and finish.
#[derive(Debug, Default)]
pub(crate) struct HoldingHandler {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl HoldingHandler {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ConnectionHandler for HoldingHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut discard = [0_u8; 256];
        while matches!(stream.read(&mut discard), Ok(read) if read > 0) {}
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Polls `condition` for up to two seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
