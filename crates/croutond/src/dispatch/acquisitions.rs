//! Per-connection record of acquired instances.

use std::collections::HashSet;

use crouton_protocol::InstanceId;
use tracing::{debug, warn};

use crate::namespace::{Namespace, OwnerId};

use super::DISPATCH_TARGET;

/// Outcome of releasing a connection's holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReleaseSummary {
    /// Instances the connection still held.
    pub(crate) released: usize,
    /// Instances destroyed because no other owner held them.
    pub(crate) destroyed: usize,
}

/// Ids a connection has opened or received by reference.
///
/// This is a cache of what to release when the connection ends; the
/// namespace stays the source of truth. Dropping the set releases every
/// remaining hold, so cleanup also runs when the worker thread unwinds.
pub(crate) struct AcquisitionSet<'a> {
    namespace: &'a Namespace,
    owner: OwnerId,
    ids: HashSet<InstanceId>,
    released: bool,
}

impl<'a> AcquisitionSet<'a> {
    pub(crate) fn new(namespace: &'a Namespace, owner: OwnerId) -> Self {
        Self {
            namespace,
            owner,
            ids: HashSet::new(),
            released: false,
        }
    }

    pub(crate) const fn owner(&self) -> OwnerId {
        self.owner
    }

    pub(crate) fn record(&mut self, id: InstanceId) {
        self.ids.insert(id);
    }

    pub(crate) fn forget(&mut self, id: InstanceId) {
        self.ids.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: InstanceId) -> bool {
        self.ids.contains(&id)
    }

    /// Drops every hold the owner has on the recorded ids in one critical
    /// section.
    pub(crate) fn release(mut self) -> ReleaseSummary {
        self.release_inner()
    }

    fn release_inner(&mut self) -> ReleaseSummary {
        if self.released {
            return ReleaseSummary::default();
        }
        self.released = true;
        let released = self.ids.len();
        match self.namespace.lock() {
            Ok(mut guard) => {
                let destroyed = guard.release_all(&self.ids, self.owner);
                self.ids.clear();
                debug!(
                    target: DISPATCH_TARGET,
                    owner = %self.owner,
                    released,
                    destroyed,
                    "released connection holds"
                );
                ReleaseSummary {
                    released,
                    destroyed,
                }
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    owner = %self.owner,
                    %error,
                    "could not release connection holds"
                );
                ReleaseSummary::default()
            }
        }
    }
}

impl Drop for AcquisitionSet<'_> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
