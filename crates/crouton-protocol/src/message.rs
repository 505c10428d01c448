//! Request and response messages.

use std::collections::BTreeMap;
use std::fmt;

use rmpv::Value;
use serde::{Deserialize, Serialize};

use crate::errors::MessageError;

/// Error message a server sends when an iterator is exhausted.
pub const STOP_ITERATION: &str = "StopIteration";

/// Server-minted token naming one remote instance.
///
/// Ids come from a process-wide counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Target of a request: a minted id (integer on the wire) or a bound name
/// (string on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceKey {
    /// Instance id.
    Id(InstanceId),
    /// Name bound by the server operator.
    Name(String),
}

impl From<InstanceId> for InstanceKey {
    fn from(id: InstanceId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for InstanceKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for InstanceKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(formatter, "{id}"),
            Self::Name(name) => write!(formatter, "'{name}'"),
        }
    }
}

/// Request action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Construct a registered type or acquire an existing instance.
    Open,
    /// Release the sender's hold on an instance.
    Close,
    /// Invoke an operation on an instance.
    Execute,
}

impl Action {
    /// Parses a wire action name.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::UnknownAction`] for anything other than
    /// `open`, `close` or `execute`.
    pub fn parse(value: &str) -> Result<Self, MessageError> {
        match value {
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            "execute" => Ok(Self::Execute),
            other => Err(MessageError::UnknownAction(other.to_owned())),
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Execute => "execute",
        }
    }
}

/// A client request.
///
/// The action is kept as text so that a well-framed request with an unknown
/// action can still be decoded and answered with an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// `open`, `close` or `execute`.
    pub action: String,
    /// Type to construct (`open` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Target instance id or name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceKey>,
    /// Operation name (`execute` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: BTreeMap<String, Value>,
}

impl Request {
    fn new(action: Action) -> Self {
        Self {
            action: action.as_str().to_owned(),
            provider: None,
            instance: None,
            method: None,
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Builds an `open` request constructing `provider`.
    #[must_use]
    pub fn open(
        provider: impl Into<String>,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            provider: Some(provider.into()),
            args,
            kwargs,
            ..Self::new(Action::Open)
        }
    }

    /// Builds an `open` request acquiring an existing instance.
    #[must_use]
    pub fn open_existing(instance: impl Into<InstanceKey>) -> Self {
        Self {
            instance: Some(instance.into()),
            ..Self::new(Action::Open)
        }
    }

    /// Builds a `close` request.
    #[must_use]
    pub fn close(instance: impl Into<InstanceKey>) -> Self {
        Self {
            instance: Some(instance.into()),
            ..Self::new(Action::Close)
        }
    }

    /// Builds an `execute` request.
    #[must_use]
    pub fn execute(
        instance: impl Into<InstanceKey>,
        method: impl Into<String>,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            instance: Some(instance.into()),
            method: Some(method.into()),
            args,
            kwargs,
            ..Self::new(Action::Execute)
        }
    }

    /// Decodes a request from a complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Shape`] when the value is not a request map.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        Ok(rmpv::ext::from_value(value)?)
    }

    /// Parsed action.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::UnknownAction`] for unsupported actions.
    pub fn action(&self) -> Result<Action, MessageError> {
        Action::parse(&self.action)
    }
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Response {
    /// A plain payload.
    Value(Value),
    /// An instance the receiver now holds one reference to.
    Reference(InstanceId),
    /// A human-readable failure description.
    Error(String),
}

impl Response {
    /// The `null` value reply.
    #[must_use]
    pub const fn null() -> Self {
        Self::Value(Value::Nil)
    }

    /// Builds an error reply from anything displayable.
    #[must_use]
    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error(message.to_string())
    }

    /// Decodes a response from a complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Shape`] when the value is not a response map.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        Ok(rmpv::ext::from_value(value)?)
    }
}
