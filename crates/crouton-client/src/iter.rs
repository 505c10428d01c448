//! Iteration over server-side iterators.

use crate::{ClientError, Proxy, Returned};

/// Drives a remote iterator with `__next__` until the server reports that it
/// is exhausted.
///
/// Each item is a [`Returned`]; objects produced by the iterator arrive as
/// proxies. The first error ends the iteration.
#[derive(Debug)]
pub struct RemoteIter {
    iterator: Proxy,
    finished: bool,
}

impl RemoteIter {
    pub(crate) fn new(iterator: Proxy) -> Self {
        Self {
            iterator,
            finished: false,
        }
    }

    /// Proxy for the server-side iterator.
    #[must_use]
    pub fn proxy(&self) -> &Proxy {
        &self.iterator
    }
}

impl Iterator for RemoteIter {
    type Item = Result<Returned, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.iterator.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}
