//! Errors raised by namespace operations.

use crouton_protocol::{InstanceId, InstanceKey};
use thiserror::Error;

use super::OwnerId;

/// A namespace precondition failed. The registry is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// No instance is stored under the id or bound to the name.
    #[error("instance {0} does not exist")]
    NotFound(InstanceKey),
    /// No type is registered under the name.
    #[error("unknown type '{0}'")]
    UnknownType(String),
    /// A type name is already registered.
    #[error("type '{0}' is already registered")]
    TypeConflict(String),
    /// An instance name is already bound to another instance.
    #[error("name '{name}' is already bound to instance {bound}")]
    NameConflict {
        /// Requested name.
        name: String,
        /// Instance currently bound to the name.
        bound: InstanceId,
    },
    /// The owner holds no reference to the instance.
    #[error("instance {id} is not held by {owner}")]
    NotHeld {
        /// Target instance.
        id: InstanceId,
        /// Owner that attempted the release.
        owner: OwnerId,
    },
    /// A thread panicked while holding the namespace lock.
    #[error("namespace lock poisoned")]
    Poisoned,
}

impl NamespaceError {
    /// Whether the error is a name collision on type or instance registration.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::TypeConflict(_) | Self::NameConflict { .. })
    }
}
