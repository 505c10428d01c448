//! The process-wide object registry.
//!
//! The [`Namespace`] stores every live instance, the per-owner reference
//! counts that keep it alive, named instances, and registered types. All of it
//! sits behind one mutex. Callers take a [`NamespaceGuard`] with
//! [`Namespace::lock`] and perform check-then-act sequences on the guard, so
//! an `open` can never race a concurrent `close` or disconnect on the same id.
//!
//! An instance is stored iff at least one owner holds a reference to it. When
//! the last hold goes the instance is removed and dropped while the lock is
//! still held.

mod errors;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crouton_protocol::{InstanceId, InstanceKey};
use tracing::{debug, info};

pub use self::errors::NamespaceError;
use crate::object::{Factory, SharedObject};

const NAMESPACE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::namespace");

/// Identity of a reference holder: a connection or the server itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// The server process, owner of operator-registered named instances.
    pub const SERVER: Self = Self(0);

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::SERVER {
            formatter.write_str("server")
        } else {
            write!(formatter, "connection {}", self.0)
        }
    }
}

struct Entry {
    object: SharedObject,
    holders: HashMap<OwnerId, u64>,
}

impl Entry {
    fn total(&self) -> u64 {
        self.holders.values().sum()
    }
}

#[derive(Default)]
struct Registry {
    instances: HashMap<InstanceId, Entry>,
    names: HashMap<String, InstanceId>,
    types: HashMap<String, Factory>,
    last_id: u64,
}

/// Shared registry of instances, reference counts, names and types.
pub struct Namespace {
    registry: Mutex<Registry>,
    next_owner: AtomicU64,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Namespace")
            .field("next_owner", &self.next_owner)
            .finish_non_exhaustive()
    }
}

impl Namespace {
    /// Creates an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_owner: AtomicU64::new(1),
        }
    }

    /// Enters the namespace critical section.
    ///
    /// The lock is released when the guard drops, on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Poisoned`] when a thread panicked while
    /// holding the lock.
    pub fn lock(&self) -> Result<NamespaceGuard<'_>, NamespaceError> {
        self.registry
            .lock()
            .map(|registry| NamespaceGuard { registry })
            .map_err(|_| NamespaceError::Poisoned)
    }

    /// Allocates a fresh owner identity for a connection.
    pub fn new_owner(&self) -> OwnerId {
        OwnerId(self.next_owner.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a constructible type.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::TypeConflict`] when the name is taken.
    pub fn register_type(&self, name: &str, factory: Factory) -> Result<(), NamespaceError> {
        self.lock()?.register_type(name, factory)
    }

    /// Stores `object` under `name`, held by the server for the process
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NameConflict`] when the name is bound.
    pub fn register_instance(
        &self,
        name: &str,
        object: SharedObject,
    ) -> Result<InstanceId, NamespaceError> {
        let mut guard = self.lock()?;
        let id = guard.mint_id();
        guard.add(object, id, OwnerId::SERVER, Some(name))?;
        info!(target: NAMESPACE_TARGET, name, %id, "registered named instance");
        Ok(id)
    }
}

/// Exclusive access to the registry for the lifetime of the guard.
pub struct NamespaceGuard<'a> {
    registry: MutexGuard<'a, Registry>,
}

impl NamespaceGuard<'_> {
    /// Resolves a key to the id of a stored instance.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`] when nothing matches.
    pub fn resolve(&self, key: &InstanceKey) -> Result<InstanceId, NamespaceError> {
        let id = match key {
            InstanceKey::Id(id) => Some(*id),
            InstanceKey::Name(name) => self.registry.names.get(name).copied(),
        };
        id.filter(|id| self.registry.instances.contains_key(id))
            .ok_or_else(|| NamespaceError::NotFound(key.clone()))
    }

    /// Looks up an instance by id or name.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`] when nothing matches.
    pub fn lookup(&self, key: &InstanceKey) -> Result<(InstanceId, SharedObject), NamespaceError> {
        let id = self.resolve(key)?;
        self.registry
            .instances
            .get(&id)
            .map(|entry| (id, SharedObject::clone(&entry.object)))
            .ok_or_else(|| NamespaceError::NotFound(key.clone()))
    }

    /// Whether an instance is stored under the id or bound to the name.
    #[must_use]
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.resolve(key).is_ok()
    }

    /// Registers a constructible type.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::TypeConflict`] when the name is taken.
    pub fn register_type(&mut self, name: &str, factory: Factory) -> Result<(), NamespaceError> {
        if self.registry.types.contains_key(name) {
            return Err(NamespaceError::TypeConflict(name.to_owned()));
        }
        self.registry.types.insert(name.to_owned(), factory);
        info!(target: NAMESPACE_TARGET, name, "registered type");
        Ok(())
    }

    /// Factory registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::UnknownType`] when nothing is registered.
    pub fn factory(&self, name: &str) -> Result<Factory, NamespaceError> {
        self.registry
            .types
            .get(name)
            .cloned()
            .ok_or_else(|| NamespaceError::UnknownType(name.to_owned()))
    }

    /// Mints an id that has never been handed out before.
    pub fn mint_id(&mut self) -> InstanceId {
        self.registry.last_id += 1;
        InstanceId::new(self.registry.last_id)
    }

    /// Stores `object` under `id` with one hold for `owner`, or adds a hold
    /// when `id` is already stored. Binds `name` to `id` when given.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NameConflict`] when `name` is bound to a
    /// different instance; nothing is changed in that case.
    pub fn add(
        &mut self,
        object: SharedObject,
        id: InstanceId,
        owner: OwnerId,
        name: Option<&str>,
    ) -> Result<(), NamespaceError> {
        if let Some(name) = name
            && let Some(bound) = self.registry.names.get(name).copied()
            && bound != id
        {
            return Err(NamespaceError::NameConflict {
                name: name.to_owned(),
                bound,
            });
        }
        let entry = self.registry.instances.entry(id).or_insert_with(|| Entry {
            object,
            holders: HashMap::new(),
        });
        *entry.holders.entry(owner).or_insert(0) += 1;
        if let Some(name) = name {
            self.registry.names.insert(name.to_owned(), id);
        }
        debug!(target: NAMESPACE_TARGET, %id, %owner, "added reference");
        Ok(())
    }

    /// Adds one hold on `id` for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`] when `id` is not stored.
    pub fn acquire(&mut self, id: InstanceId, owner: OwnerId) -> Result<(), NamespaceError> {
        let entry = self
            .registry
            .instances
            .get_mut(&id)
            .ok_or(NamespaceError::NotFound(InstanceKey::Id(id)))?;
        *entry.holders.entry(owner).or_insert(0) += 1;
        Ok(())
    }

    /// Drops one hold on `id` for `owner`.
    ///
    /// Returns `true` when that was the owner's last hold. The instance is
    /// destroyed once no owner holds it.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`] when `id` is not stored and
    /// [`NamespaceError::NotHeld`] when `owner` holds no reference to it.
    pub fn release(&mut self, id: InstanceId, owner: OwnerId) -> Result<bool, NamespaceError> {
        let entry = self
            .registry
            .instances
            .get_mut(&id)
            .ok_or(NamespaceError::NotFound(InstanceKey::Id(id)))?;
        let count = entry
            .holders
            .get_mut(&owner)
            .ok_or(NamespaceError::NotHeld { id, owner })?;
        *count -= 1;
        if *count > 0 {
            return Ok(false);
        }
        entry.holders.remove(&owner);
        if entry.holders.is_empty() {
            self.destroy(id);
        }
        Ok(true)
    }

    /// Removes every hold `owner` has on the given ids in one step.
    ///
    /// Ids that are no longer stored or not held by `owner` are skipped.
    /// Returns the number of instances destroyed.
    pub fn release_all<'ids, I>(&mut self, ids: I, owner: OwnerId) -> usize
    where
        I: IntoIterator<Item = &'ids InstanceId>,
    {
        let mut destroyed = 0;
        for id in ids {
            let Some(entry) = self.registry.instances.get_mut(id) else {
                continue;
            };
            if entry.holders.remove(&owner).is_some() && entry.holders.is_empty() {
                self.destroy(*id);
                destroyed += 1;
            }
        }
        destroyed
    }

    fn destroy(&mut self, id: InstanceId) {
        if self.registry.instances.remove(&id).is_some() {
            self.registry.names.retain(|_, bound| *bound != id);
            debug!(target: NAMESPACE_TARGET, %id, "destroyed instance");
        }
    }

    /// Number of stored instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.registry.instances.len()
    }

    /// Total outstanding holds on `id` across all owners.
    #[must_use]
    pub fn ref_count(&self, id: InstanceId) -> u64 {
        self.registry
            .instances
            .get(&id)
            .map_or(0, Entry::total)
    }

    /// Holds `owner` has on `id`.
    #[must_use]
    pub fn owner_count(&self, id: InstanceId, owner: OwnerId) -> u64 {
        self.registry
            .instances
            .get(&id)
            .and_then(|entry| entry.holders.get(&owner).copied())
            .unwrap_or(0)
    }

    /// Ids stored at the moment of the call.
    #[must_use]
    pub fn instance_ids(&self) -> HashSet<InstanceId> {
        self.registry.instances.keys().copied().collect()
    }
}
