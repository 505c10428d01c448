//! Local stand-ins for remote instances.

use std::collections::BTreeMap;
use std::fmt;

use crouton_protocol::{InstanceId, Request, Response, Value};

use crate::{Client, ClientError, RemoteIter};

/// Result of a remote operation: a plain value, or a proxy for an object the
/// server kept.
#[derive(Debug)]
pub enum Returned {
    /// A copied payload.
    Value(Value),
    /// A new hold on a server-side instance.
    Proxy(Proxy),
}

impl Returned {
    /// The plain value, if this is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Proxy(_) => None,
        }
    }

    /// Unwraps a plain value; a proxy is released and reported as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidResponse`] for a proxy.
    pub fn into_value(self) -> Result<Value, ClientError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Proxy(proxy) => Err(ClientError::InvalidResponse {
                operation: "a value-returning operation".to_owned(),
                response: Response::Reference(proxy.id()),
            }),
        }
    }

    /// Unwraps a proxy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidResponse`] for a plain value.
    pub fn into_proxy(self) -> Result<Proxy, ClientError> {
        match self {
            Self::Proxy(proxy) => Ok(proxy),
            Self::Value(value) => Err(ClientError::InvalidResponse {
                operation: "an object-returning operation".to_owned(),
                response: Response::Value(value),
            }),
        }
    }

    /// Whether the server kept the result and sent a reference.
    #[must_use]
    pub const fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }
}

/// One hold on a server-side instance.
///
/// Every operation is forwarded to the server as an `execute` request.
/// Dropping the proxy sends `close`, unless the connection is already closed
/// or lost.
pub struct Proxy {
    client: Client,
    id: InstanceId,
}

impl Proxy {
    pub(crate) fn new(client: Client, id: InstanceId) -> Self {
        Self { client, id }
    }

    /// Id of the remote instance.
    #[must_use]
    pub const fn id(&self) -> InstanceId {
        self.id
    }

    /// Connection this proxy uses.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Acquires another, independently released hold on the same instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the server rejects the request.
    pub fn try_clone(&self) -> Result<Self, ClientError> {
        self.client.open_id(self.id)
    }

    /// Invokes `method` with positional and keyword arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when the operation fails on the
    /// server.
    pub fn invoke(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Returned, ClientError> {
        let response = self
            .client
            .request(&Request::execute(self.id, method, args, kwargs))?;
        self.client.returned(response)
    }

    fn special(&self, method: &str, args: Vec<Value>) -> Result<Returned, ClientError> {
        self.invoke(method, args, BTreeMap::new())
    }

    fn value(&self, method: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        self.special(method, args)?.into_value()
    }

    fn text(&self, method: &str, args: Vec<Value>) -> Result<String, ClientError> {
        let value = self.value(method, args)?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.unexpected("a string", value))
    }

    fn flag(&self, method: &str, args: Vec<Value>) -> Result<bool, ClientError> {
        match self.value(method, args)? {
            Value::Boolean(flag) => Ok(flag),
            other => Err(self.unexpected("a boolean", other)),
        }
    }

    fn length(&self, method: &str) -> Result<usize, ClientError> {
        let value = self.value(method, Vec::new())?;
        value
            .as_u64()
            .and_then(|length| usize::try_from(length).ok())
            .ok_or_else(|| self.unexpected("a length", value))
    }

    fn proxy(&self, method: &str) -> Result<Self, ClientError> {
        self.special(method, Vec::new())?.into_proxy()
    }

    fn unexpected(&self, expected: &'static str, value: Value) -> ClientError {
        ClientError::UnexpectedValue {
            id: self.id,
            expected,
            value,
        }
    }

    /// `repr()` of the remote instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn repr(&self) -> Result<String, ClientError> {
        self.text("__repr__", Vec::new())
    }

    /// `str()` of the remote instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn str(&self) -> Result<String, ClientError> {
        self.text("__str__", Vec::new())
    }

    /// Byte rendering of the remote instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn bytes(&self) -> Result<Vec<u8>, ClientError> {
        match self.value("__bytes__", Vec::new())? {
            Value::Binary(bytes) => Ok(bytes),
            other => Err(self.unexpected("bytes", other)),
        }
    }

    /// Formats the remote instance with `spec`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn format(&self, spec: &str) -> Result<String, ClientError> {
        self.text("__format__", vec![Value::from(spec)])
    }

    /// `self < other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn lt(&self, other: impl Into<Value>) -> Result<bool, ClientError> {
        self.flag("__lt__", vec![other.into()])
    }

    /// `self <= other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn le(&self, other: impl Into<Value>) -> Result<bool, ClientError> {
        self.flag("__le__", vec![other.into()])
    }

    /// `self == other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn eq(&self, other: impl Into<Value>) -> Result<bool, ClientError> {
        self.flag("__eq__", vec![other.into()])
    }

    /// `self != other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn ne(&self, other: impl Into<Value>) -> Result<bool, ClientError> {
        self.flag("__ne__", vec![other.into()])
    }

    /// `self > other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn gt(&self, other: impl Into<Value>) -> Result<bool, ClientError> {
        self.flag("__gt__", vec![other.into()])
    }

    /// `self >= other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn ge(&self, other: impl Into<Value>) -> Result<bool, ClientError> {
        self.flag("__ge__", vec![other.into()])
    }

    /// Hash of the remote instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn hash(&self) -> Result<i64, ClientError> {
        let value = self.value("__hash__", Vec::new())?;
        value.as_i64().ok_or_else(|| self.unexpected("an integer", value))
    }

    /// Truthiness of the remote instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn truthy(&self) -> Result<bool, ClientError> {
        self.flag("__bool__", Vec::new())
    }

    /// Reads attribute `name`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the attribute does not exist.
    pub fn get_attr(&self, name: &str) -> Result<Returned, ClientError> {
        self.special("__getattr__", vec![Value::from(name)])
    }

    /// Sets attribute `name` to a plain value.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance rejects the attribute.
    pub fn set_attr(&self, name: &str, value: impl Into<Value>) -> Result<(), ClientError> {
        self.value("__setattr__", vec![Value::from(name), value.into()])
            .map(drop)
    }

    /// Deletes attribute `name`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the attribute does not exist.
    pub fn del_attr(&self, name: &str) -> Result<(), ClientError> {
        self.value("__delattr__", vec![Value::from(name)]).map(drop)
    }

    /// Names the remote instance exposes.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn dir(&self) -> Result<Vec<String>, ClientError> {
        match self.value("__dir__", Vec::new())? {
            Value::Array(names) => names
                .into_iter()
                .map(|name| {
                    name.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| self.unexpected("a list of names", name))
                })
                .collect(),
            other => Err(self.unexpected("a list of names", other)),
        }
    }

    /// Calls the remote instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance is not callable or the
    /// call fails.
    pub fn call(
        &self,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Returned, ClientError> {
        self.invoke("__call__", args, kwargs)
    }

    /// Number of items in the remote instance.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance has no length.
    pub fn len(&self) -> Result<usize, ClientError> {
        self.length("__len__")
    }

    /// Whether the remote instance has no items.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance has no length.
    pub fn is_empty(&self) -> Result<bool, ClientError> {
        self.len().map(|length| length == 0)
    }

    /// Estimated number of remaining items.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance offers no hint.
    pub fn length_hint(&self) -> Result<usize, ClientError> {
        self.length("__length_hint__")
    }

    /// `self[key]`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the key or index is absent.
    pub fn get_item(&self, key: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__getitem__", vec![key.into()])
    }

    /// Fallback lookup for an absent key.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance defines no fallback.
    pub fn missing(&self, key: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__missing__", vec![key.into()])
    }

    /// `self[key] = value`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the assignment fails.
    pub fn set_item(
        &self,
        key: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Result<(), ClientError> {
        self.value("__setitem__", vec![key.into(), value.into()])
            .map(drop)
    }

    /// `del self[key]`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the key or index is absent.
    pub fn del_item(&self, key: impl Into<Value>) -> Result<(), ClientError> {
        self.value("__delitem__", vec![key.into()]).map(drop)
    }

    /// Iterates the remote instance through a server-side iterator.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance is not iterable.
    pub fn iter(&self) -> Result<RemoteIter, ClientError> {
        self.proxy("__iter__").map(RemoteIter::new)
    }

    /// Iterates the remote instance in reverse.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance cannot be reversed.
    pub fn reversed(&self) -> Result<RemoteIter, ClientError> {
        self.proxy("__reversed__").map(RemoteIter::new)
    }

    /// Advances a remote iterator; `None` once it is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance is not an iterator.
    pub fn next_item(&self) -> Result<Option<Returned>, ClientError> {
        match self.special("__next__", Vec::new()) {
            Ok(returned) => Ok(Some(returned)),
            Err(ClientError::Remote { message }) if message == crouton_protocol::STOP_ITERATION => {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// `item in self`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance does not support
    /// membership tests.
    pub fn contains(&self, item: impl Into<Value>) -> Result<bool, ClientError> {
        self.flag("__contains__", vec![item.into()])
    }

    /// Enters the remote context manager.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance is not a context manager.
    pub fn enter(&self) -> Result<Returned, ClientError> {
        self.special("__enter__", Vec::new())
    }

    /// Leaves the remote context manager without an error; returns whether
    /// the instance asked to suppress one.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the instance is not a context manager.
    pub fn exit(&self) -> Result<bool, ClientError> {
        self.flag("__exit__", vec![Value::Nil, Value::Nil, Value::Nil])
    }

    /// `self + other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn add(&self, other: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__add__", vec![other.into()])
    }

    /// `self - other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn sub(&self, other: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__sub__", vec![other.into()])
    }

    /// `self * other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn mul(&self, other: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__mul__", vec![other.into()])
    }

    /// `self / other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn true_div(&self, other: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__truediv__", vec![other.into()])
    }

    /// `self // other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn floor_div(&self, other: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__floordiv__", vec![other.into()])
    }

    /// `self % other`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn rem(&self, other: impl Into<Value>) -> Result<Returned, ClientError> {
        self.special("__mod__", vec![other.into()])
    }

    /// `-self`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the operation fails.
    pub fn neg(&self) -> Result<Returned, ClientError> {
        self.special("__neg__", Vec::new())
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.client.release(self.id);
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id)
            .field("endpoint", &self.client.endpoint())
            .finish()
    }
}
