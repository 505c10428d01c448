//! Failures raised while executing an operation on an instance.

use crouton_protocol::{STOP_ITERATION, Value};
use thiserror::Error;

use super::values::render_value;

/// An operation on a remote instance failed.
///
/// The display text is what the client receives in the error response.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The type has no method with this name.
    #[error("'{type_name}' object has no method '{method}'")]
    NoMethod {
        /// Type of the target.
        type_name: String,
        /// Requested method.
        method: String,
    },
    /// The type does not implement this special operation.
    #[error("'{type_name}' object does not support {operation}")]
    Unsupported {
        /// Type of the target.
        type_name: String,
        /// Human-readable operation description.
        operation: String,
    },
    /// Arguments do not fit the operation.
    #[error("invalid arguments: {0}")]
    Arguments(String),
    /// A sequence index is out of range.
    #[error("index {index} out of range for length {len}")]
    Index {
        /// Requested index.
        index: i64,
        /// Sequence length.
        len: usize,
    },
    /// A mapping key is absent.
    #[error("key not found: {0}")]
    Key(String),
    /// An attribute is absent.
    #[error("'{type_name}' object has no attribute '{name}'")]
    Attribute {
        /// Type of the target.
        type_name: String,
        /// Requested attribute.
        name: String,
    },
    /// An argument has the right shape but an unusable value.
    #[error("{0}")]
    Value(String),
    /// An iterator has no further items.
    #[error("{}", STOP_ITERATION)]
    StopIteration,
    /// The operation reported an application failure.
    #[error("{0}")]
    Failed(String),
    /// The operation panicked.
    #[error("operation panicked: {0}")]
    Panicked(String),
    /// An earlier panic poisoned the instance lock.
    #[error("instance is unusable after an earlier failure")]
    Poisoned,
}

impl ExecError {
    /// Builds a [`ExecError::NoMethod`].
    pub fn no_method(type_name: &str, method: &str) -> Self {
        Self::NoMethod {
            type_name: type_name.to_owned(),
            method: method.to_owned(),
        }
    }

    /// Builds an [`ExecError::Unsupported`].
    pub fn unsupported(type_name: &str, operation: &str) -> Self {
        Self::Unsupported {
            type_name: type_name.to_owned(),
            operation: operation.to_owned(),
        }
    }

    /// Builds an [`ExecError::Arguments`].
    pub fn arguments(message: impl Into<String>) -> Self {
        Self::Arguments(message.into())
    }

    /// Builds an [`ExecError::Key`] naming the rendered key.
    pub fn key(key: &Value) -> Self {
        Self::Key(render_value(key))
    }

    /// Builds an [`ExecError::Attribute`].
    pub fn attribute(type_name: &str, name: &str) -> Self {
        Self::Attribute {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
        }
    }

    /// Builds an [`ExecError::Value`].
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }

    /// Builds an [`ExecError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
