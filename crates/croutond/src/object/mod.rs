//! Server-side object model.
//!
//! Every instance a client can reach implements [`RemoteObject`]. Operations
//! arrive by name: names in the special-operation [`catalog`] map to one of the
//! trait's hooks, and every other name goes to [`RemoteObject::invoke`]. Each
//! hook has a default that rejects the operation, so a type only implements
//! what it supports.
//!
//! Results are classified by construction: a hook returns an [`Outcome`] that
//! is either a plain [`Value`], a new [`SharedObject`] the caller must receive
//! by reference, or the target itself.

mod arguments;
pub mod builtins;
pub mod catalog;
mod errors;
mod values;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crouton_protocol::Value;

pub use self::arguments::Arguments;
pub use self::errors::ExecError;
pub use self::values::{compare_values, render_value, values_equal};

/// Handle to an instance shared between the namespace and in-flight calls.
pub type SharedObject = Arc<Mutex<dyn RemoteObject>>;

/// Construction capability registered under a type name.
pub type Factory = Arc<dyn Fn(Arguments) -> Result<SharedObject, ExecError> + Send + Sync>;

/// Wraps an object for storage in the namespace.
pub fn share<T>(object: T) -> SharedObject
where
    T: RemoteObject,
{
    Arc::new(Mutex::new(object))
}

/// Builds a [`Factory`] from a typed constructor.
pub fn factory<T, F>(construct: F) -> Factory
where
    T: RemoteObject,
    F: Fn(Arguments) -> Result<T, ExecError> + Send + Sync + 'static,
{
    Arc::new(move |args| construct(args).map(share))
}

/// Rich comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    /// Applies the operator to an ordering result.
    #[must_use]
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
        }
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    TrueDiv,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
}

/// Result of an operation on a remote instance.
pub enum Outcome {
    /// Plain payload returned by value.
    Value(Value),
    /// A new instance returned by reference.
    Object(SharedObject),
    /// The target instance itself, returned by reference.
    This,
}

impl Outcome {
    /// The `null` outcome.
    #[must_use]
    pub const fn none() -> Self {
        Self::Value(Value::Nil)
    }

    /// Wraps a fresh object.
    pub fn object<T>(object: T) -> Self
    where
        T: RemoteObject,
    {
        Self::Object(share(object))
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => formatter.debug_tuple("Value").field(value).finish(),
            Self::Object(_) => formatter.write_str("Object(..)"),
            Self::This => formatter.write_str("This"),
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for Outcome {
    fn from(flag: bool) -> Self {
        Self::Value(Value::Boolean(flag))
    }
}

impl From<i64> for Outcome {
    fn from(number: i64) -> Self {
        Self::Value(Value::from(number))
    }
}

impl From<String> for Outcome {
    fn from(text: String) -> Self {
        Self::Value(Value::from(text))
    }
}

impl From<&str> for Outcome {
    fn from(text: &str) -> Self {
        Self::Value(Value::from(text))
    }
}

/// An object hosted by the server.
///
/// Hooks that take `&mut self` may mutate; the caller holds the instance's
/// mutex for the duration of one operation.
pub trait RemoteObject: Send + 'static {
    /// Type name used in error messages and default renderings.
    fn type_name(&self) -> &str;

    /// Generic named-method invocation, used for any name outside the catalog.
    fn invoke(&mut self, method: &str, args: Arguments) -> Result<Outcome, ExecError> {
        let _ = args;
        Err(ExecError::no_method(self.type_name(), method))
    }

    /// `__repr__`
    fn repr(&self) -> Result<String, ExecError> {
        Ok(format!("<{} object>", self.type_name()))
    }

    /// `__str__`
    fn display(&self) -> Result<String, ExecError> {
        self.repr()
    }

    /// `__bytes__`
    fn bytes(&self) -> Result<Vec<u8>, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "bytes()"))
    }

    /// `__format__`
    fn format(&self, spec: &str) -> Result<String, ExecError> {
        if spec.is_empty() {
            self.display()
        } else {
            Err(ExecError::invalid_value(format!(
                "unsupported format string '{spec}' for {}",
                self.type_name()
            )))
        }
    }

    /// Rich comparison against a plain value. By default an instance is equal
    /// to nothing but itself, and a plain value is never itself.
    fn compare(&self, op: Comparison, other: &Value) -> Result<bool, ExecError> {
        let _ = other;
        match op {
            Comparison::Eq => Ok(false),
            Comparison::Ne => Ok(true),
            _ => Err(ExecError::unsupported(self.type_name(), "ordering")),
        }
    }

    /// `__hash__`
    fn hash(&self) -> Result<i64, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "hash()"))
    }

    /// `__bool__`; defaults to non-empty when the object has a length.
    fn truthy(&self) -> Result<bool, ExecError> {
        Ok(self.len().map_or(true, |len| len > 0))
    }

    /// `__getattr__`
    fn get_attr(&mut self, name: &str) -> Result<Outcome, ExecError> {
        Err(ExecError::attribute(self.type_name(), name))
    }

    /// `__setattr__`
    fn set_attr(&mut self, name: &str, value: Value) -> Result<(), ExecError> {
        let _ = value;
        Err(ExecError::attribute(self.type_name(), name))
    }

    /// `__delattr__`
    fn del_attr(&mut self, name: &str) -> Result<(), ExecError> {
        Err(ExecError::attribute(self.type_name(), name))
    }

    /// `__dir__`
    fn dir(&self) -> Result<Vec<String>, ExecError> {
        Ok(Vec::new())
    }

    /// `__call__`
    fn call(&mut self, args: Arguments) -> Result<Outcome, ExecError> {
        let _ = args;
        Err(ExecError::unsupported(self.type_name(), "calls"))
    }

    /// `__len__`
    fn len(&self) -> Result<usize, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "len()"))
    }

    /// `__length_hint__`
    fn length_hint(&self) -> Result<usize, ExecError> {
        self.len()
    }

    /// `__getitem__`
    fn get_item(&mut self, key: &Value) -> Result<Outcome, ExecError> {
        let _ = key;
        Err(ExecError::unsupported(self.type_name(), "item access"))
    }

    /// `__missing__`, consulted by mappings when a key is absent.
    fn missing(&mut self, key: &Value) -> Result<Outcome, ExecError> {
        Err(ExecError::key(key))
    }

    /// `__setitem__`
    fn set_item(&mut self, key: Value, value: Value) -> Result<(), ExecError> {
        let _ = (key, value);
        Err(ExecError::unsupported(self.type_name(), "item assignment"))
    }

    /// `__delitem__`
    fn del_item(&mut self, key: &Value) -> Result<(), ExecError> {
        let _ = key;
        Err(ExecError::unsupported(self.type_name(), "item deletion"))
    }

    /// `__iter__`
    fn iter(&mut self) -> Result<Outcome, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "iteration"))
    }

    /// `__next__`
    fn next(&mut self) -> Result<Outcome, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "next()"))
    }

    /// `__reversed__`
    fn reversed(&mut self) -> Result<Outcome, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "reversed()"))
    }

    /// `__contains__`
    fn contains(&self, item: &Value) -> Result<bool, ExecError> {
        let _ = item;
        Err(ExecError::unsupported(self.type_name(), "membership tests"))
    }

    /// `__enter__`
    fn enter(&mut self) -> Result<Outcome, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "the context manager protocol"))
    }

    /// `__exit__`; a truthy result suppresses the exception described by `args`.
    fn exit(&mut self, args: Arguments) -> Result<Outcome, ExecError> {
        let _ = args;
        Err(ExecError::unsupported(self.type_name(), "the context manager protocol"))
    }

    /// Binary arithmetic with the instance on the left.
    fn binary(&mut self, op: BinaryOp, other: &Value) -> Result<Outcome, ExecError> {
        let _ = other;
        Err(ExecError::unsupported(self.type_name(), binary_op_name(op)))
    }

    /// `__neg__`
    fn negate(&mut self) -> Result<Outcome, ExecError> {
        Err(ExecError::unsupported(self.type_name(), "unary -"))
    }
}

fn binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::TrueDiv => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
    }
}

/// Runs `method` on `object` under the instance's mutex.
///
/// A panic inside the operation is caught and reported as
/// [`ExecError::Panicked`]; the mutex is released normally, so the instance
/// stays usable.
pub fn invoke(object: &SharedObject, method: &str, args: Arguments) -> Result<Outcome, ExecError> {
    let mut guard = object.lock().map_err(|_| ExecError::Poisoned)?;
    let target: &mut dyn RemoteObject = &mut *guard;
    panic::catch_unwind(AssertUnwindSafe(|| catalog::dispatch(target, method, args)))
        .unwrap_or_else(|payload| Err(ExecError::Panicked(panic_message(payload.as_ref()))))
}

/// Runs a registered factory, catching panics in the constructor.
pub fn construct(factory: &Factory, args: Arguments) -> Result<SharedObject, ExecError> {
    panic::catch_unwind(AssertUnwindSafe(|| factory(args)))
        .unwrap_or_else(|payload| Err(ExecError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
