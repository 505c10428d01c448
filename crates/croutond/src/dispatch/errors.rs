//! Error types for request dispatch failures.
//!
//! Every variant here is answered with an `error` response and leaves the
//! connection open. Transport failures are [`CodecError`]s and never reach
//! this type.
//!
//! [`CodecError`]: crouton_protocol::CodecError

use crouton_protocol::MessageError;
use thiserror::Error;

use crate::namespace::NamespaceError;
use crate::object::ExecError;

/// Errors surfaced while handling one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The referenced instance or name does not exist, or is not held by the
    /// requesting connection.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A type or instance name is already taken.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// `open` named a type that is not registered.
    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    /// The action is not `open`, `close` or `execute`.
    #[error("invalid request action '{action}'")]
    UnknownAction { action: String },

    /// The invoked operation failed.
    #[error(transparent)]
    RemoteExecution(#[from] ExecError),

    /// The frame decoded but does not describe a usable request.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Internal error (e.g., lock poisoned).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DispatchError {
    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short label for log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::UnknownType { .. } => "unknown_type",
            Self::UnknownAction { .. } => "unknown_action",
            Self::RemoteExecution(_) => "remote_execution",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<NamespaceError> for DispatchError {
    fn from(error: NamespaceError) -> Self {
        match error {
            NamespaceError::NotFound(_) | NamespaceError::NotHeld { .. } => Self::NotFound {
                message: error.to_string(),
            },
            NamespaceError::TypeConflict(_) | NamespaceError::NameConflict { .. } => {
                Self::Conflict {
                    message: error.to_string(),
                }
            }
            NamespaceError::UnknownType(name) => Self::UnknownType { name },
            NamespaceError::Poisoned => Self::internal(error.to_string()),
        }
    }
}

impl From<MessageError> for DispatchError {
    fn from(error: MessageError) -> Self {
        match error {
            MessageError::UnknownAction(action) => Self::UnknownAction { action },
            MessageError::Shape(_) => Self::invalid_request(error.to_string()),
        }
    }
}
